//! Batch ingestion: attribution, timestamping and the bulk write

mod pipeline;

pub use pipeline::{prepare, IngestionPipeline, FAILURE_SAMPLE_SIZE};

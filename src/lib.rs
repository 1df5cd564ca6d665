//! LogVault: an authenticated log ingestion and search gateway in front of
//! Elasticsearch.
//!
//! Clients submit structured log batches with an API key, which an external
//! auth service resolves to a source identity. Entries are attributed to that
//! source, timestamped and bulk-written. Searches accept a free-text query
//! with positional `AND`/`OR`/`NOT` operators (see [`search::query`]).

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod search;
pub mod store;

pub use error::{AppError, Result};

use crate::config::IngestionConfig;
use crate::error::{AppError, Result};
use crate::metrics::{INGEST_FAILURES_TOTAL, LOGS_INGESTED_TOTAL};
use crate::models::{LogBatch, LogEntry, MetadataValue, SourceIdentity};
use crate::store::LogStore;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

/// Most failing items reported back to the client
pub const FAILURE_SAMPLE_SIZE: usize = 5;

const SOURCE_ID_KEY: &str = "sourceId";
const USER_ID_KEY: &str = "userId";

/// Attribute a batch to `identity` and stamp missing timestamps with `now`.
///
/// Every entry stamped here gets the same instant.
pub fn prepare(
    logs: Vec<LogEntry>,
    identity: &SourceIdentity,
    placeholder_source: &str,
    now: DateTime<Utc>,
) -> Vec<LogEntry> {
    let batch_instant = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    logs.into_iter()
        .map(|mut entry| {
            let source = entry.source.trim();
            if source.is_empty() || source == placeholder_source {
                entry.source = identity.name.clone();
            }

            if entry.timestamp.as_deref().map_or(true, |ts| ts.trim().is_empty()) {
                entry.timestamp = Some(batch_instant.clone());
            }

            entry
                .metadata
                .insert(SOURCE_ID_KEY.to_string(), MetadataValue::from(identity.id.as_str()));
            entry
                .metadata
                .insert(USER_ID_KEY.to_string(), MetadataValue::from(identity.user_id.as_str()));
            entry
        })
        .collect()
}

/// Validates, enriches and writes log batches
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn LogStore>,
    placeholder_source: String,
    max_batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn LogStore>, config: &IngestionConfig) -> Self {
        Self {
            store,
            placeholder_source: config.placeholder_source.clone(),
            max_batch_size: config.max_batch_size,
        }
    }

    /// Write a batch on behalf of `identity`, returning the number of entries indexed
    #[instrument(skip(self, batch, identity), fields(source = %identity.name, count = batch.len()))]
    pub async fn ingest(&self, batch: LogBatch, identity: &SourceIdentity) -> Result<usize> {
        if batch.len() > self.max_batch_size {
            return Err(AppError::Validation(format!(
                "batch of {} entries exceeds the limit of {}",
                batch.len(),
                self.max_batch_size
            )));
        }
        batch.validate()?;

        if batch.is_empty() {
            return Ok(0);
        }

        let entries = prepare(batch.logs, identity, &self.placeholder_source, Utc::now());
        let report = self.store.bulk_index(&entries).await.map_err(|e| {
            error!(error = %e, "Bulk write failed");
            AppError::from(e)
        })?;

        LOGS_INGESTED_TOTAL.inc_by(report.succeeded() as f64);

        if report.has_failures() {
            INGEST_FAILURES_TOTAL.inc_by(report.failures.len() as f64);
            error!(
                failed = report.failures.len(),
                total = report.total,
                "Bulk write reported item failures"
            );
            return Err(AppError::PartialWrite {
                failed: report.failures.len(),
                total: report.total,
                sample: report
                    .failures
                    .iter()
                    .take(FAILURE_SAMPLE_SIZE)
                    .map(ToString::to_string)
                    .collect(),
            });
        }

        info!(indexed = report.total, "Indexed log batch");
        Ok(report.total)
    }
}

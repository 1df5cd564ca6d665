//! Log storage backends
//!
//! The gateway talks to its datastore only through [`LogStore`]. Production
//! deployments use [`ElasticsearchStore`]; [`InMemoryStore`] evaluates the same
//! query shapes in-process for local development and tests.

mod bootstrap;
mod elasticsearch;
mod memory;

pub use bootstrap::{ensure_index, index_mapping, BootstrapOutcome};
pub use elasticsearch::ElasticsearchStore;
pub use memory::{InMemoryStore, StoreCalls};

use crate::config::{Config, StorageBackend};
use crate::error::{AppError, Result};
use crate::models::{LogEntry, StoredLog};
use crate::search::query::{EngineQuery, TIMESTAMP_FIELD};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while talking to the datastore
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Datastore answered with a non-success status
    #[error("Datastore returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Backend is switched off or unreachable
    #[error("Datastore unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Datastore(err.to_string())
    }
}

/// A paged, newest-first search against the log index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: EngineQuery,
    pub from: usize,
    pub size: usize,
}

impl SearchRequest {
    pub fn new(query: EngineQuery, from: usize, size: usize) -> Self {
        Self { query, from, size }
    }

    /// Request body for the `_search` endpoint
    pub fn to_json(&self) -> Value {
        json!({
            "query": self.query,
            "sort": [
                { TIMESTAMP_FIELD: { "order": "desc", "unmapped_type": "date" } }
            ],
            "from": self.from,
            "size": self.size,
            "track_total_hits": true,
        })
    }
}

/// One page of hits plus the total number of matching documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<StoredLog>,
}

/// Per-item outcome of a bulk write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub total: usize,
    pub failures: Vec<BulkItemFailure>,
}

impl BulkReport {
    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemFailure {
    /// Position of the entry in the submitted batch
    pub position: usize,
    pub status: u16,
    pub reason: String,
}

impl fmt::Display for BulkItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {} ({}): {}", self.position, self.status, self.reason)
    }
}

/// Operations the gateway needs from its datastore
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Name of the index holding log entries
    fn index_name(&self) -> &str;

    async fn index_exists(&self) -> StoreResult<bool>;

    /// Create the index, with `body` as settings/mappings when given
    async fn create_index(&self, body: Option<&Value>) -> StoreResult<()>;

    /// Apply a mapping body (`{"properties": ...}`) to an existing index
    async fn put_mapping(&self, body: &Value) -> StoreResult<()>;

    /// Write all entries in one request, visible to search on return
    async fn bulk_index(&self, entries: &[LogEntry]) -> StoreResult<BulkReport>;

    async fn search(&self, request: &SearchRequest) -> StoreResult<SearchHits>;

    /// Distinct values of a keyword field, most frequent first
    async fn distinct_values(&self, field: &str, size: usize) -> StoreResult<Vec<String>>;

    /// Cheap connectivity check
    async fn ping(&self) -> StoreResult<()>;

    /// Write a throwaway document, for deployments where `ping` is not allowed
    async fn write_probe(&self) -> StoreResult<()>;
}

/// Create a log store based on configuration
pub fn create_store(config: &Config) -> Result<Arc<dyn LogStore>> {
    match config.storage.backend {
        StorageBackend::Elasticsearch => {
            let store = ElasticsearchStore::new(&config.elasticsearch)?;
            tracing::info!(
                url = %store.base_url(),
                index = %store.index_name(),
                "Initializing Elasticsearch storage backend"
            );
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage backend, logs are lost on restart");
            Ok(Arc::new(InMemoryStore::with_index(&config.elasticsearch.index)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_body() {
        let request = SearchRequest::new(EngineQuery::MatchAll, 40, 20);
        let body = request.to_json();

        assert_eq!(body["query"], json!({ "match_all": {} }));
        assert_eq!(body["from"], 40);
        assert_eq!(body["size"], 20);
        assert_eq!(body["sort"][0]["timestamp"]["order"], "desc");
    }

    #[test]
    fn test_bulk_report_counts() {
        let report = BulkReport {
            total: 3,
            failures: vec![BulkItemFailure {
                position: 1,
                status: 400,
                reason: "mapper_parsing_exception".to_string(),
            }],
        };
        assert_eq!(report.succeeded(), 2);
        assert!(report.has_failures());
        assert_eq!(
            report.failures[0].to_string(),
            "item 1 (400): mapper_parsing_exception"
        );
    }

    #[test]
    fn test_store_error_maps_to_datastore() {
        let err: AppError = StoreError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(err, AppError::Datastore(_)));
    }
}

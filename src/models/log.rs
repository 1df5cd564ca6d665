use serde::{Deserialize, Serialize};
use validator::Validate;

use super::metadata::{null_as_default, Metadata, MetadataValue};

/// A single structured log line as submitted by a client and stored in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LogEntry {
    /// ISO-8601 timestamp; stamped with the batch instant when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Emitting source; empty or placeholder values are replaced on ingestion
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(max = 255))]
    pub source: String,

    /// Severity keyword (free-form)
    #[validate(length(max = 64))]
    pub level: String,

    pub message: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
}

impl LogEntry {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            source: String::new(),
            level: level.into(),
            message: message.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Request body of `POST /logs`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LogBatch {
    #[validate(nested)]
    pub logs: Vec<LogEntry>,
}

impl LogBatch {
    pub fn new(logs: Vec<LogEntry>) -> Self {
        Self { logs }
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

/// A search hit: the engine-assigned document id plus the stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLog {
    pub id: String,

    #[serde(flatten)]
    pub entry: LogEntry,
}

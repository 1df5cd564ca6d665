use super::{BulkItemFailure, BulkReport, LogStore, SearchHits, SearchRequest, StoreError, StoreResult};
use crate::models::{LogEntry, MetadataValue, StoredLog};
use crate::search::query::EngineQuery;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Number of datastore calls made, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub bulk: usize,
    pub search: usize,
    pub aggregations: usize,
}

#[derive(Debug, Clone)]
struct MemoryDoc {
    seq: u64,
    at: Option<DateTime<Utc>>,
    stored: StoredLog,
}

/// In-memory log store (for local development and testing).
///
/// Evaluates the same query shapes the translator emits, with a simplified
/// analyzer: text is lowercased and split on non-alphanumeric characters.
#[derive(Clone)]
pub struct InMemoryStore {
    index: String,
    docs: Arc<DashMap<String, MemoryDoc>>,
    seq: Arc<AtomicU64>,
    index_created: Arc<AtomicBool>,
    mapping: Arc<RwLock<Option<Value>>>,
    available: Arc<AtomicBool>,
    reject_custom_mappings: Arc<AtomicBool>,
    bulk_calls: Arc<AtomicUsize>,
    search_calls: Arc<AtomicUsize>,
    aggregation_calls: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_index("logs")
    }

    pub fn with_index(index: &str) -> Self {
        Self {
            index: index.to_string(),
            docs: Arc::new(DashMap::new()),
            seq: Arc::new(AtomicU64::new(0)),
            index_created: Arc::new(AtomicBool::new(false)),
            mapping: Arc::new(RwLock::new(None)),
            available: Arc::new(AtomicBool::new(true)),
            reject_custom_mappings: Arc::new(AtomicBool::new(false)),
            bulk_calls: Arc::new(AtomicUsize::new(0)),
            search_calls: Arc::new(AtomicUsize::new(0)),
            aggregation_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate an unreachable datastore
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Simulate managed deployments that refuse index creation with a body
    pub fn set_reject_custom_mappings(&self, reject: bool) {
        self.reject_custom_mappings.store(reject, Ordering::SeqCst);
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            bulk: self.bulk_calls.load(Ordering::SeqCst),
            search: self.search_calls.load(Ordering::SeqCst),
            aggregations: self.aggregation_calls.load(Ordering::SeqCst),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Mapping applied through `create_index` or `put_mapping`, if any
    pub fn mapping(&self) -> Option<Value> {
        self.mapping.read().clone()
    }

    /// All stored entries in insertion order
    pub fn entries(&self) -> Vec<StoredLog> {
        let mut docs: Vec<MemoryDoc> = self.docs.iter().map(|d| d.value().clone()).collect();
        docs.sort_by_key(|doc| doc.seq);
        docs.into_iter().map(|doc| doc.stored).collect()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the formats a `date` mapping accepts by default
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn analyze(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_value(entry: &LogEntry, field: &str) -> Option<String> {
    match field {
        "message" => Some(entry.message.clone()),
        "source" => Some(entry.source.clone()),
        "level" => Some(entry.level.clone()),
        "timestamp" => entry.timestamp.clone(),
        other => other
            .strip_prefix("metadata.")
            .and_then(|key| entry.metadata.get(key))
            .and_then(MetadataValue::as_str)
            .map(str::to_string),
    }
}

fn evaluate(query: &EngineQuery, entry: &LogEntry) -> bool {
    match query {
        EngineQuery::MatchAll => true,
        EngineQuery::Match { field, text } => {
            let Some(value) = field_value(entry, field) else {
                return false;
            };
            let haystack = analyze(&value);
            analyze(text).iter().any(|token| haystack.contains(token))
        }
        EngineQuery::Term { field, value } => {
            field_value(entry, field).as_deref() == Some(value.as_str())
        }
        EngineQuery::Bool(bool_query) => {
            if !bool_query.must.iter().all(|q| evaluate(q, entry)) {
                return false;
            }
            if bool_query.must_not.iter().any(|q| evaluate(q, entry)) {
                return false;
            }
            // Without MUST clauses, at least one SHOULD must match
            let default_minimum = if bool_query.must.is_empty() && !bool_query.should.is_empty() {
                1
            } else {
                0
            };
            let minimum = bool_query
                .minimum_should_match
                .map_or(default_minimum, |m| m as usize);
            bool_query.should.iter().filter(|q| evaluate(q, entry)).count() >= minimum
        }
    }
}

#[async_trait]
impl LogStore for InMemoryStore {
    fn index_name(&self) -> &str {
        &self.index
    }

    async fn index_exists(&self) -> StoreResult<bool> {
        self.ensure_available()?;
        Ok(self.index_created.load(Ordering::SeqCst))
    }

    async fn create_index(&self, body: Option<&Value>) -> StoreResult<()> {
        self.ensure_available()?;

        if self.index_created.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 400,
                body: format!("resource_already_exists_exception: index [{}]", self.index),
            });
        }

        if let Some(body) = body {
            if self.reject_custom_mappings.load(Ordering::SeqCst) {
                return Err(StoreError::Status {
                    status: 400,
                    body: "illegal_argument_exception: custom index settings are not supported"
                        .to_string(),
                });
            }
            *self.mapping.write() = body.get("mappings").cloned();
        }

        self.index_created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn put_mapping(&self, body: &Value) -> StoreResult<()> {
        self.ensure_available()?;
        if !self.index_created.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 404,
                body: format!("index_not_found_exception: no such index [{}]", self.index),
            });
        }
        *self.mapping.write() = Some(body.clone());
        Ok(())
    }

    async fn bulk_index(&self, entries: &[LogEntry]) -> StoreResult<BulkReport> {
        self.ensure_available()?;
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);

        let mut report = BulkReport {
            total: entries.len(),
            failures: Vec::new(),
        };

        for (position, entry) in entries.iter().enumerate() {
            let at = match entry.timestamp.as_deref() {
                Some(raw) => match parse_timestamp(raw) {
                    Some(at) => Some(at),
                    None => {
                        report.failures.push(BulkItemFailure {
                            position,
                            status: 400,
                            reason: format!(
                                "mapper_parsing_exception: failed to parse field [timestamp] of type [date]: [{}]",
                                raw
                            ),
                        });
                        continue;
                    }
                },
                None => None,
            };

            let id = Uuid::new_v4().to_string();
            let doc = MemoryDoc {
                seq: self.seq.fetch_add(1, Ordering::SeqCst),
                at,
                stored: StoredLog {
                    id: id.clone(),
                    entry: entry.clone(),
                },
            };
            self.docs.insert(id, doc);
        }

        Ok(report)
    }

    async fn search(&self, request: &SearchRequest) -> StoreResult<SearchHits> {
        self.ensure_available()?;
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        let mut matching: Vec<MemoryDoc> = self
            .docs
            .iter()
            .filter(|doc| evaluate(&request.query, &doc.stored.entry))
            .map(|doc| doc.value().clone())
            .collect();

        // Newest first; undated documents sort last
        matching.sort_by_key(|doc| (Reverse(doc.at), Reverse(doc.seq)));

        let total = matching.len() as u64;
        let hits = matching
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|doc| doc.stored)
            .collect();

        Ok(SearchHits { total, hits })
    }

    async fn distinct_values(&self, field: &str, size: usize) -> StoreResult<Vec<String>> {
        self.ensure_available()?;
        self.aggregation_calls.fetch_add(1, Ordering::SeqCst);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for doc in self.docs.iter() {
            if let Some(value) = field_value(&doc.stored.entry, field) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }

        let mut buckets: Vec<(String, usize)> = counts.into_iter().collect();
        buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(buckets
            .into_iter()
            .take(size)
            .map(|(key, _)| key)
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ensure_available()
    }

    async fn write_probe(&self) -> StoreResult<()> {
        self.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::translate;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .bulk_index(&[
                LogEntry::new("ERROR", "Database connection timeout")
                    .with_source("api")
                    .with_timestamp("2024-05-01T10:00:00Z"),
                LogEntry::new("WARN", "Slow query warning")
                    .with_source("api")
                    .with_timestamp("2024-05-01T11:00:00Z"),
                LogEntry::new("DEBUG", "timeout debug trace")
                    .with_source("worker")
                    .with_timestamp("2024-05-01T12:00:00Z"),
            ])
            .await
            .unwrap();
        store
    }

    async fn messages(store: &InMemoryStore, q: &str, source: Option<&str>) -> Vec<String> {
        let request = SearchRequest::new(translate(Some(q), source), 0, 100);
        store
            .search(&request)
            .await
            .unwrap()
            .hits
            .into_iter()
            .map(|hit| hit.entry.message)
            .collect()
    }

    #[tokio::test]
    async fn test_match_all_newest_first() {
        let store = seeded().await;
        let found = messages(&store, "*", None).await;
        assert_eq!(
            found,
            vec![
                "timeout debug trace",
                "Slow query warning",
                "Database connection timeout"
            ]
        );
    }

    #[tokio::test]
    async fn test_boolean_queries() {
        let store = seeded().await;

        assert_eq!(messages(&store, "timeout NOT debug", None).await.len(), 1);
        assert_eq!(messages(&store, "timeout AND database", None).await.len(), 1);
        assert_eq!(messages(&store, "timeout", Some("worker")).await.len(), 1);

        // MUST "query" plus at least one SHOULD
        let found = messages(&store, "query OR warning", None).await;
        assert_eq!(found, vec!["Slow query warning"]);
    }

    #[tokio::test]
    async fn test_pagination_window() {
        let store = seeded().await;
        let request = SearchRequest::new(EngineQuery::MatchAll, 2, 2);
        let hits = store.search(&request).await.unwrap();
        assert_eq!(hits.total, 3);
        assert_eq!(hits.hits.len(), 1);
        assert_eq!(hits.hits[0].entry.message, "Database connection timeout");
    }

    #[tokio::test]
    async fn test_bad_timestamp_is_item_failure() {
        let store = InMemoryStore::new();
        let report = store
            .bulk_index(&[
                LogEntry::new("INFO", "ok").with_timestamp("2024-05-01T10:00:00.123"),
                LogEntry::new("INFO", "bad").with_timestamp("yesterday"),
            ])
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].position, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_values_by_frequency() {
        let store = seeded().await;
        assert_eq!(
            store.distinct_values("source", 100).await.unwrap(),
            vec!["api".to_string(), "worker".to_string()]
        );
        assert_eq!(store.distinct_values("level", 1).await.unwrap().len(), 1);
        assert_eq!(store.calls().aggregations, 2);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.bulk_index(&[]).await.is_err());
    }
}

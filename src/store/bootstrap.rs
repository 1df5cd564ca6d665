use super::LogStore;
use serde_json::{json, Value};
use tracing::{error, info, warn};

fn mapping_properties() -> Value {
    json!({
        "timestamp": { "type": "date" },
        "source": { "type": "keyword" },
        "level": { "type": "keyword" },
        "message": { "type": "text" },
        "metadata": { "type": "object", "enabled": true }
    })
}

/// Index creation body for the log index
pub fn index_mapping() -> Value {
    json!({ "mappings": { "properties": mapping_properties() } })
}

/// What `ensure_index` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    AlreadyExists,
    Created,
    /// Created bare after the mapped create was refused
    CreatedWithoutMapping { mapping_applied: bool },
    Failed,
}

/// Make sure the log index exists. Failures are logged, never fatal: the
/// gateway keeps serving and the datastore creates the index on first write.
pub async fn ensure_index(store: &dyn LogStore) -> BootstrapOutcome {
    let index = store.index_name().to_string();

    let first_error = match store.index_exists().await {
        Ok(true) => {
            info!(index = %index, "Log index already exists");
            return BootstrapOutcome::AlreadyExists;
        }
        Ok(false) => match store.create_index(Some(&index_mapping())).await {
            Ok(()) => {
                info!(index = %index, "Created log index with mapping");
                return BootstrapOutcome::Created;
            }
            Err(e) => e,
        },
        Err(e) => e,
    };

    warn!(
        index = %index,
        error = %first_error,
        "Index setup with mapping failed, retrying without mapping"
    );

    // Another instance may have won the race
    if let Ok(true) = store.index_exists().await {
        info!(index = %index, "Log index created concurrently");
        return BootstrapOutcome::AlreadyExists;
    }

    if let Err(e) = store.create_index(None).await {
        error!(index = %index, error = %e, "Failed to create log index");
        return BootstrapOutcome::Failed;
    }

    let mapping_applied = match store.put_mapping(&json!({ "properties": mapping_properties() })).await {
        Ok(()) => {
            info!(index = %index, "Created log index and applied mapping");
            true
        }
        Err(e) => {
            warn!(
                index = %index,
                error = %e,
                "Created log index without mapping, field types will be inferred"
            );
            false
        }
    };

    BootstrapOutcome::CreatedWithoutMapping { mapping_applied }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogEntry;
    use crate::store::{BulkReport, InMemoryStore, SearchHits, SearchRequest, StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_mapping_field_types() {
        let mapping = index_mapping();
        let props = &mapping["mappings"]["properties"];
        assert_eq!(props["timestamp"]["type"], "date");
        assert_eq!(props["source"]["type"], "keyword");
        assert_eq!(props["level"]["type"], "keyword");
        assert_eq!(props["message"]["type"], "text");
        assert_eq!(props["metadata"]["enabled"], true);
    }

    #[tokio::test]
    async fn test_creates_missing_index() {
        let store = InMemoryStore::new();
        assert_eq!(ensure_index(&store).await, BootstrapOutcome::Created);
        assert_eq!(store.mapping().unwrap()["properties"]["level"]["type"], "keyword");

        assert_eq!(ensure_index(&store).await, BootstrapOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_falls_back_to_bare_create() {
        let store = InMemoryStore::new();
        store.set_reject_custom_mappings(true);

        assert_eq!(
            ensure_index(&store).await,
            BootstrapOutcome::CreatedWithoutMapping { mapping_applied: true }
        );
        assert!(store.mapping().is_some());
    }

    /// Fails the first existence check, then behaves like the wrapped store
    struct FlakyExists {
        inner: InMemoryStore,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl LogStore for FlakyExists {
        fn index_name(&self) -> &str {
            self.inner.index_name()
        }

        async fn index_exists(&self) -> StoreResult<bool> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Transport("connection reset".to_string()));
            }
            self.inner.index_exists().await
        }

        async fn create_index(&self, body: Option<&Value>) -> StoreResult<()> {
            self.inner.create_index(body).await
        }

        async fn put_mapping(&self, body: &Value) -> StoreResult<()> {
            self.inner.put_mapping(body).await
        }

        async fn bulk_index(&self, logs: &[LogEntry]) -> StoreResult<BulkReport> {
            self.inner.bulk_index(logs).await
        }

        async fn search(&self, request: &SearchRequest) -> StoreResult<SearchHits> {
            self.inner.search(request).await
        }

        async fn distinct_values(&self, field: &str, size: usize) -> StoreResult<Vec<String>> {
            self.inner.distinct_values(field, size).await
        }

        async fn ping(&self) -> StoreResult<()> {
            self.inner.ping().await
        }

        async fn write_probe(&self) -> StoreResult<()> {
            self.inner.write_probe().await
        }
    }

    #[tokio::test]
    async fn test_failed_existence_check_still_creates_index() {
        let store = FlakyExists {
            inner: InMemoryStore::new(),
            failed_once: AtomicBool::new(false),
        };

        assert_eq!(
            ensure_index(&store).await,
            BootstrapOutcome::CreatedWithoutMapping { mapping_applied: true }
        );
        assert!(store.inner.mapping().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_not_fatal() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert_eq!(ensure_index(&store).await, BootstrapOutcome::Failed);
    }
}

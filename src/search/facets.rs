use crate::error::Result;
use crate::store::LogStore;
use std::sync::Arc;

pub const SOURCE_FACET_SIZE: usize = 100;
pub const LEVEL_FACET_SIZE: usize = 20;

/// Distinct values of the keyword fields, for filter dropdowns
#[derive(Clone)]
pub struct FacetService {
    store: Arc<dyn LogStore>,
}

impl FacetService {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    pub async fn list_sources(&self) -> Result<Vec<String>> {
        Ok(self.store.distinct_values("source", SOURCE_FACET_SIZE).await?)
    }

    pub async fn list_levels(&self) -> Result<Vec<String>> {
        Ok(self.store.distinct_values("level", LEVEL_FACET_SIZE).await?)
    }
}

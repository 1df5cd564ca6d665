pub mod extractor;
pub mod handlers;
pub mod routes;

pub use extractor::ApiKeyIdentity;
pub use routes::*;

use crate::auth::IdentityProvider;
use crate::config::{Config, Environment};
use crate::ingestion::IngestionPipeline;
use crate::search::{FacetService, SearchService};
use crate::store::LogStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LogStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub pipeline: IngestionPipeline,
    pub search: SearchService,
    pub facets: FacetService,
    pub environment: Environment,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn LogStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            pipeline: IngestionPipeline::new(store.clone(), &config.ingestion),
            search: SearchService::new(store.clone(), &config.search),
            facets: FacetService::new(store.clone()),
            environment: config.deployment.environment,
            store,
            identity,
        }
    }
}

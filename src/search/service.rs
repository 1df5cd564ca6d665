use super::query::translate;
use crate::config::SearchConfig;
use crate::error::{AppError, Result};
use crate::metrics::SEARCHES_TOTAL;
use crate::models::{SourceIdentity, StoredLog};
use crate::store::{LogStore, SearchRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Largest `from + size` Elasticsearch serves without a scroll
pub const MAX_RESULT_WINDOW: u64 = 10_000;

/// Query string of `GET /search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub source: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// One page of results, newest first
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub logs: Vec<StoredLog>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
    pub query: Option<String>,
}

#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn LogStore>,
    default_page_size: u32,
    max_page_size: u32,
}

impl SearchService {
    pub fn new(store: Arc<dyn LogStore>, config: &SearchConfig) -> Self {
        Self {
            store,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    pub async fn search(&self, params: SearchParams, identity: &SourceIdentity) -> Result<SearchPage> {
        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(self.default_page_size);

        if page < 1 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }
        if limit < 1 || limit > self.max_page_size {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                self.max_page_size
            )));
        }

        let from = u64::from(page - 1) * u64::from(limit);
        if from + u64::from(limit) > MAX_RESULT_WINDOW {
            return Err(AppError::BadRequest(format!(
                "page * limit must not exceed {}",
                MAX_RESULT_WINDOW
            )));
        }

        let query = translate(params.q.as_deref(), params.source.as_deref());
        let request = SearchRequest::new(query, from as usize, limit as usize);

        debug!(
            caller = %identity.name,
            query = ?params.q,
            source = ?params.source,
            page,
            limit,
            "Executing search"
        );

        let hits = match self.store.search(&request).await {
            Ok(hits) => hits,
            Err(e) => {
                SEARCHES_TOTAL.with_label_values(&["failure"]).inc();
                error!(error = %e, query = ?params.q, "Search failed");
                return Err(AppError::SearchFailed(e.to_string()));
            }
        };
        SEARCHES_TOTAL.with_label_values(&["success"]).inc();

        Ok(SearchPage {
            pages: hits.total.div_ceil(limit as u64),
            total: hits.total,
            logs: hits.hits,
            page,
            limit,
            query: params.q,
        })
    }
}

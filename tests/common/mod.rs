//! Shared fixtures for router-level tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use logvault::{
    api::{build_router, AppState},
    auth::IdentityProvider,
    config::Config,
    models::SourceIdentity,
    store::InMemoryStore,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const VALID_KEY: &str = "lv_test_key";

/// Identity provider answering from a fixed key table
#[derive(Default)]
pub struct FakeIdentityProvider {
    keys: HashMap<String, SourceIdentity>,
    calls: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn with_key(mut self, key: &str, identity: SourceIdentity) -> Self {
        self.keys.insert(key.to_string(), identity);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn validate(&self, api_key: &str) -> Option<SourceIdentity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.get(api_key).cloned()
    }
}

pub fn checkout_identity() -> SourceIdentity {
    SourceIdentity {
        id: "src-1".to_string(),
        name: "checkout".to_string(),
        user_id: "user-9".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryStore,
    pub auth: Arc<FakeIdentityProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::defaults().expect("embedded defaults parse"))
    }

    pub fn with_config(config: Config) -> Self {
        let store = InMemoryStore::with_index(&config.elasticsearch.index);
        let auth = Arc::new(FakeIdentityProvider::default().with_key(VALID_KEY, checkout_identity()));
        let state = AppState::new(&config, Arc::new(store.clone()), auth.clone());

        Self {
            router: build_router(state),
            store,
            auth,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_logs(&self, body: Value, api_key: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/logs")
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap()).await
    }
}

/// Sample lines of one metric family in Prometheus text exposition
pub fn metric_samples<'a>(output: &'a str, metric_name: &str) -> Vec<&'a str> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(metric_name)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .collect()
}

/// Value of a sample line such as `name{label="x"} 3`
pub fn sample_value(line: &str) -> Option<f64> {
    line.rsplit_once(' ').and_then(|(_, value)| value.parse().ok())
}

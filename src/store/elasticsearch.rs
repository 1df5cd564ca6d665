use super::{BulkItemFailure, BulkReport, LogStore, SearchHits, SearchRequest, StoreError, StoreResult};
use crate::config::{ElasticsearchConfig, ElasticsearchCredentials};
use crate::error::{AppError, Result};
use crate::models::{LogEntry, StoredLog};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Elasticsearch REST backend
#[derive(Clone)]
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
    index: String,
    credentials: ElasticsearchCredentials,
}

impl ElasticsearchStore {
    /// Build the store with a shared HTTP client; no request is made here
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("logvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.endpoint()?,
            index: config.index.clone(),
            credentials: config.credentials(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        let builder = self.client.request(method, url);

        match &self.credentials {
            ElasticsearchCredentials::ApiKey(key) => {
                builder.header(header::AUTHORIZATION, format!("ApiKey {}", key))
            }
            ElasticsearchCredentials::Basic { username, password } => {
                builder.basic_auth(username, password.as_ref())
            }
            ElasticsearchCredentials::None => builder,
        }
    }

    /// Turn non-2xx responses into [`StoreError::Status`]
    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemResult>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    #[serde(default)]
    status: u16,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// `hits.total` is an object since 7.x and a bare number before that
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: LogEntry,
}

#[derive(Debug, Deserialize)]
struct AggregationResponse {
    aggregations: HashMap<String, TermsAggregation>,
}

#[derive(Debug, Deserialize)]
struct TermsAggregation {
    #[serde(default)]
    buckets: Vec<TermsBucket>,
}

#[derive(Debug, Deserialize)]
struct TermsBucket {
    key: Value,
}

fn describe_item_error(error: &Value) -> String {
    match (error.get("type"), error.get("reason")) {
        (Some(Value::String(kind)), Some(Value::String(reason))) => format!("{}: {}", kind, reason),
        _ => error.to_string(),
    }
}

#[async_trait]
impl LogStore for ElasticsearchStore {
    fn index_name(&self) -> &str {
        &self.index
    }

    async fn index_exists(&self) -> StoreResult<bool> {
        let response = self.request(Method::HEAD, &self.index).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::Status {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn create_index(&self, body: Option<&Value>) -> StoreResult<()> {
        let mut request = self.request(Method::PUT, &self.index);
        if let Some(body) = body {
            request = request.json(body);
        }

        Self::check(request.send().await?).await?;
        tracing::info!(index = %self.index, with_body = body.is_some(), "Created index");
        Ok(())
    }

    async fn put_mapping(&self, body: &Value) -> StoreResult<()> {
        let path = format!("{}/_mapping", self.index);
        Self::check(self.request(Method::PUT, &path).json(body).send().await?).await?;
        Ok(())
    }

    async fn bulk_index(&self, entries: &[LogEntry]) -> StoreResult<BulkReport> {
        let action = json!({ "index": { "_index": self.index } }).to_string();
        let mut body = String::new();
        for entry in entries {
            body.push_str(&action);
            body.push('\n');
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }

        let response = self
            .request(Method::POST, "_bulk?refresh=true")
            .header(header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let parsed: BulkResponse = Self::check(response).await?.json().await?;

        let mut report = BulkReport {
            total: entries.len(),
            failures: Vec::new(),
        };
        if !parsed.errors {
            return Ok(report);
        }

        for (position, item) in parsed.items.iter().enumerate() {
            for result in item.values() {
                if let Some(error) = &result.error {
                    report.failures.push(BulkItemFailure {
                        position,
                        status: result.status,
                        reason: describe_item_error(error),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn search(&self, request: &SearchRequest) -> StoreResult<SearchHits> {
        let path = format!("{}/_search", self.index);
        let response = self
            .request(Method::POST, &path)
            .json(&request.to_json())
            .send()
            .await?;
        let body: SearchResponseBody = Self::check(response).await?.json().await?;

        let hits: Vec<StoredLog> = body
            .hits
            .hits
            .into_iter()
            .map(|hit| StoredLog {
                id: hit.id,
                entry: hit.source,
            })
            .collect();

        let total = match body.hits.total {
            Some(TotalHits::Count(count)) | Some(TotalHits::Object { value: count }) => count,
            None => hits.len() as u64,
        };

        Ok(SearchHits { total, hits })
    }

    async fn distinct_values(&self, field: &str, size: usize) -> StoreResult<Vec<String>> {
        let path = format!("{}/_search", self.index);
        let query = json!({
            "size": 0,
            "aggs": {
                "values": {
                    "terms": { "field": field, "size": size }
                }
            }
        });

        let response = self.request(Method::POST, &path).json(&query).send().await?;
        let mut body: AggregationResponse = Self::check(response).await?.json().await?;
        let buckets = body
            .aggregations
            .remove("values")
            .ok_or_else(|| StoreError::Decode("missing 'values' aggregation".to_string()))?
            .buckets;

        Ok(buckets
            .into_iter()
            .map(|bucket| match bucket.key {
                Value::String(key) => key,
                other => other.to_string(),
            })
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Self::check(self.request(Method::GET, "").send().await?).await?;
        Ok(())
    }

    async fn write_probe(&self) -> StoreResult<()> {
        let path = format!("{}-test/_doc?refresh=true", self.index);
        let document = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "message": "Health check test",
            "level": "INFO",
            "source": "health-check",
        });

        Self::check(self.request(Method::POST, &path).json(&document).send().await?).await?;
        Ok(())
    }
}

use crate::api::{ApiKeyIdentity, AppState};
use crate::config::Environment;
use crate::error::{AppError, Result};
use crate::metrics::gather_metrics;
use crate::models::{LogBatch, SourceIdentity};
use crate::search::{SearchPage, SearchParams};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Index a batch of log entries
pub async fn ingest_logs(
    State(state): State<AppState>,
    ApiKeyIdentity(identity): ApiKeyIdentity,
    body: std::result::Result<Json<LogBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let Json(batch) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let written = state.pipeline.ingest(batch, &identity).await?;
    let message = if written == 0 {
        "No logs to index".to_string()
    } else {
        format!("Successfully indexed {} log entries", written)
    };

    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

/// Search logs
pub async fn search_logs(
    State(state): State<AppState>,
    ApiKeyIdentity(identity): ApiKeyIdentity,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchPage>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(state.search.search(params, &identity).await?))
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<String>,
}

/// Distinct log sources
pub async fn list_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>> {
    Ok(Json(SourcesResponse {
        sources: state.facets.list_sources().await?,
    }))
}

#[derive(Debug, Serialize)]
pub struct LevelsResponse {
    pub levels: Vec<String>,
}

/// Distinct log levels
pub async fn list_levels(State(state): State<AppState>) -> Result<Json<LevelsResponse>> {
    Ok(Json(LevelsResponse {
        levels: state.facets.list_levels().await?,
    }))
}

/// Echo the identity behind the caller's API key
pub async fn validate_key(ApiKeyIdentity(identity): ApiKeyIdentity) -> Json<SourceIdentity> {
    Json(identity)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub elasticsearch: &'static str,
    pub environment: Environment,
    pub app: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check endpoint; always answers 200
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let probe = match state.store.ping().await {
        Ok(()) => Ok(()),
        Err(ping_error) => {
            warn!(error = %ping_error, "Datastore ping failed, trying a write probe");
            state.store.write_probe().await
        }
    };

    let (status, elasticsearch, error) = match probe {
        Ok(()) => ("healthy", "connected", None),
        Err(e) => {
            warn!(error = %e, "Datastore health check failed");
            ("unhealthy", "not connected", Some(e.to_string()))
        }
    };

    Json(HealthResponse {
        status,
        elasticsearch,
        environment: state.environment,
        app: "running",
        error,
    })
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

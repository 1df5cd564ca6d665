use crate::api::{handlers, AppState};
use crate::error::AppError;
use crate::metrics::track_metrics;
use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Turn a panicking handler into a plain 500 without leaking the panic message
fn handle_panic(_panic: Box<dyn Any + Send + 'static>) -> Response {
    AppError::Internal("unexpected failure".to_string()).into_response()
}

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Ingestion and search
        .route("/logs", post(handlers::ingest_logs))
        .route("/search", get(handlers::search_logs))
        // Facets
        .route("/sources", get(handlers::list_sources))
        .route("/levels", get(handlers::list_levels))
        // Key check
        .route("/validate", get(handlers::validate_key))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(track_metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("index [logs] exploded at 10.0.0.7")
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_generic_500() {
        let router: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));

        let response = router
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(!body.to_string().contains("10.0.0.7"));
    }
}

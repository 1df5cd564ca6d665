//! Prometheus exposition through the router

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use common::{metric_samples, sample_value, TestApp, VALID_KEY};
use serde_json::json;
use tower::ServiceExt;

async fn scrape(app: &TestApp) -> (StatusCode, String, String) {
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_requests_and_domain_counters_are_exported() {
    // Registration is process-wide; another test may have done it already
    let _ = logvault::metrics::init_metrics();

    let app = TestApp::new();
    app.get("/health", None).await;
    app.get("/search", Some("bad-key")).await;
    app.post_logs(json!({"logs": [{"level": "INFO", "message": "hello"}]}), Some(VALID_KEY))
        .await;

    let (status, content_type, output) = scrape(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/plain"));

    let health = metric_samples(&output, "logvault_http_requests_total")
        .into_iter()
        .find(|line| line.contains(r#"path="/health""#) && line.contains(r#"status_code="200""#))
        .expect("health request recorded");
    assert!(sample_value(health).unwrap() >= 1.0);

    let rejections = metric_samples(&output, "logvault_auth_rejections_total");
    assert!(rejections.iter().any(|line| line.contains(r#"endpoint="/search""#)));

    let ingested = metric_samples(&output, "logvault_logs_ingested_total");
    assert!(sample_value(ingested[0]).unwrap() >= 1.0);
}

#[test]
fn test_sample_helpers() {
    let output = "# HELP x_total help\n# TYPE x_total counter\nx_total{a=\"b\"} 3\nx_total_other 1\n";
    let samples = metric_samples(output, "x_total");
    assert_eq!(samples, vec!["x_total{a=\"b\"} 3"]);
    assert_eq!(sample_value(samples[0]), Some(3.0));
}

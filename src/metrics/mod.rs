//! Prometheus metrics for the log gateway.
//!
//! Counters live in a process-wide registry and are exposed as text on
//! `GET /metrics`. Recording is always cheap; nothing is exported until
//! [`init_metrics`] has registered the collectors.
//!
//! ```no_run
//! use logvault::metrics::LOGS_INGESTED_TOTAL;
//!
//! LOGS_INGESTED_TOTAL.inc_by(25.0);
//! ```

mod middleware;

pub use middleware::track_metrics;

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "logvault";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Log entries written to the datastore
    pub static ref LOGS_INGESTED_TOTAL: Counter = Counter::with_opts(
        Opts::new("logs_ingested_total", "Total number of log entries indexed")
            .namespace(NAMESPACE)
    ).expect("Failed to create LOGS_INGESTED_TOTAL metric");

    /// Log entries the datastore refused
    pub static ref INGEST_FAILURES_TOTAL: Counter = Counter::with_opts(
        Opts::new("ingest_failures_total", "Total number of log entries that failed to index")
            .namespace(NAMESPACE)
    ).expect("Failed to create INGEST_FAILURES_TOTAL metric");

    /// Searches executed
    ///
    /// Labels: outcome (success, failure)
    pub static ref SEARCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("searches_total", "Total number of searches executed")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SEARCHES_TOTAL metric");

    /// Requests turned away for a missing or invalid API key
    ///
    /// Labels: endpoint
    pub static ref AUTH_REJECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("auth_rejections_total", "Total number of rejected API keys")
            .namespace(NAMESPACE),
        &["endpoint"]
    ).expect("Failed to create AUTH_REJECTIONS_TOTAL metric");
}

/// Register all collectors with [`PROMETHEUS_REGISTRY`].
///
/// Fails if called twice in the same process.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(LOGS_INGESTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INGEST_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(AUTH_REJECTIONS_TOTAL.clone()))?;

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

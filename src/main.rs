use logvault::{
    api::{build_router, AppState},
    auth::HttpAuthClient,
    config::Config,
    store::{create_store, ensure_index},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::defaults()?, Some(e)),
    };

    init_tracing(&config);

    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Failed to load configuration, using defaults");
    }

    tracing::info!("Starting LogVault v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(environment = %config.deployment.environment, "Deployment environment");

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = logvault::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Initialize storage backend
    let store = create_store(&config)?;
    let outcome = ensure_index(store.as_ref()).await;
    tracing::info!(outcome = ?outcome, "Index bootstrap finished");

    // Auth service client
    let identity = Arc::new(HttpAuthClient::new(&config.auth.service_url)?);
    tracing::info!(url = %identity.validate_url(), "Auth service configured");

    let state = AppState::new(&config, store, identity);
    let app = build_router(state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP API server listening on http://{}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "logvault={level},tower_http={level}",
            level = config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

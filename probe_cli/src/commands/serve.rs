use crate::commands::agent::build_exporter;
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use probe_config::parse_config_from_file;
use probe_metrics::{exporters::PrometheusExporter, ServiceExporter};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    start_time: Instant,
    exporter: Arc<ServiceExporter>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    target: String,
    collectors: Vec<String>,
    scrapes: u64,
}

pub async fn execute(config_file: PathBuf, listen: Option<String>) -> Result<()> {
    let mut config = parse_config_from_file(&config_file).await?;
    if let Some(listen) = listen {
        config.listen = listen;
    }
    let addr = config.listen_addr().map_err(anyhow::Error::msg)?;

    let exporter = Arc::new(build_exporter(&config)?);
    let state = AppState {
        start_time: Instant::now(),
        exporter: exporter.clone(),
    };

    let app = router(state);

    info!("Serving metrics for {} on {}", exporter.orchestrator().config().target(), addr);
    info!("Endpoints:");
    info!("  GET  /metrics  - Prometheus scrape");
    info!("  GET  /health   - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    exporter.orchestrator().shutdown();
    info!("Agent stopped");

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let mut families = state.exporter.gather().await;
    families.extend(state.exporter.metrics().registry().gather());

    match PrometheusExporter::render(&families) {
        Ok(body) => (
            [(header::CONTENT_TYPE, PrometheusExporter::content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = state.exporter.orchestrator();
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        target: orchestrator.config().target().to_string(),
        collectors: orchestrator.collector_names(),
        scrapes: state.exporter.metrics().scrapes(),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

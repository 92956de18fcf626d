use axum::{extract::State, http::StatusCode, routing::get, Router};
use tracing::error;
use vrm_metrics::ManagerMetrics;

/// Prometheus scrape and liveness endpoints
pub fn create_router(metrics: ManagerMetrics) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/health", get(|| async { "ok" }))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<ManagerMetrics>) -> Result<String, StatusCode> {
    metrics.gather().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

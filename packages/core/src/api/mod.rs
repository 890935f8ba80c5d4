//! HTTP surface: health, metrics and scheduler status.

pub mod health;
pub mod status;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::metrics::AppMetrics;
use crate::scheduler::SharedTickSummary;

/// Assemble the full router served by `main.rs`.
pub fn create_router(last_tick: SharedTickSummary, metrics: Arc<AppMetrics>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(render_metrics).with_state(metrics))
        .route(
            "/scheduler/status",
            get(status::scheduler_status).with_state(last_tick),
        )
        .layer(CorsLayer::permissive())
}

async fn render_metrics(State(metrics): State<Arc<AppMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .expect("metrics response should be valid"),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("metrics error"))
                .expect("metrics error response should be valid")
        }
    }
}

// HTTP routes

mod http;

use axum::{Router, routing::get};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::models::TrafficSnapshot;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshot_rx: watch::Receiver<TrafficSnapshot>,
}

pub fn app(snapshot_rx: watch::Receiver<TrafficSnapshot>, config: &AppConfig) -> Router {
    let state = AppState { snapshot_rx };
    Router::new()
        .route(&config.exporter.webhook_path, get(http::traffic_handler)) // GET <webhook path>
        .route("/health", get(http::health_handler)) // GET /health
        .route("/version", get(http::version_handler)) // GET /version
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

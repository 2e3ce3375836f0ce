use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, process};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let blob_root = state.local_blob_root().map(|root| root.to_path_buf());

    let mut router = Router::new()
        // Pipeline
        .route("/process_3d", any(process::process_3d))
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state);

    // Artifacts stored by the local backend
    if let Some(root) = blob_root {
        router = router.nest_service("/blobs", ServeDir::new(root));
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

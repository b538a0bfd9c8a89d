pub mod bulk;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config;
use crate::middleware::actor::resolve_actor;
use crate::store::EntryStore;

/// Shared handler state: the storage seam behind the bulk processor.
#[derive(Clone)]
pub struct AppState<S: EntryStore> {
    pub store: S,
}

/// Build the full application router over any store implementation.
pub fn router<S: EntryStore>(store: S) -> Router {
    let state = AppState { store };

    let bulk_api = Router::new()
        .route("/api/bulk/review", post(bulk::bulk_review::<S>))
        .route("/api/bulk/assignment", post(bulk::bulk_assignment::<S>))
        .route("/api/bulk/import", post(bulk::bulk_import::<S>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_actor::<S>,
        ))
        .layer(DefaultBodyLimit::max(config::config().api.max_upload_bytes));

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(bulk_api)
        .layer(CorsLayer::permissive());
    if config::config().api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app.with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "sims-api-rust",
        "description": "SIMS bulk operations API",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
    }))
}

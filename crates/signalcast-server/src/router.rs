//! Axum router construction.
//!
//! Assembles the entry page, the health probe, and both `WebSocket`
//! protocols into a single [`Router`] with CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /` -- entry page
/// - `GET /healthz` -- liveness probe
/// - `GET /ws` -- traffic update stream
/// - `GET /ws/echo` -- echo protocol
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(handlers::healthz))
        .route("/ws", get(ws::ws_traffic))
        .route("/ws/echo", get(ws::ws_echo))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

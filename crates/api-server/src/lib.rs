//! Library surface so integration tests can exercise the router in-process
//! (spec SPEC_FULL.md §E) without binding a real socket.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full app router (auth gate, CORS, tracing, every route) over
/// an already-constructed [`AppState`]. `main.rs` and integration tests both
/// go through this so the two never drift apart.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::webhook::router())
        .merge(routes::room::router())
        .route("/ws", get(ws::ws_handler))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_token))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

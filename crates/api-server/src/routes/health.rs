//! Liveness and root endpoints (spec §4.1 — these two paths bypass the
//! bearer-token gate unconditionally).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthCard {
    name: &'static str,
    version: &'static str,
    status: &'static str,
    authenticated: bool,
    time: i64,
}

impl HealthCard {
    fn for_state(state: &AppState) -> Self {
        Self {
            name: "swarm-coordination-hub",
            version: env!("CARGO_PKG_VERSION"),
            status: "ok",
            authenticated: state.auth_token().is_some(),
            time: hub_core::room::now_ms(),
        }
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthCard> {
    Json(HealthCard::for_state(&state))
}

async fn root(State(state): State<AppState>) -> Json<HealthCard> {
    Json(HealthCard::for_state(&state))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

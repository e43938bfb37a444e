//! Swarm coordination hub: HTTP + WebSocket gateway over `hub-core` rooms.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hub_server::config::Config;
use hub_server::state::AppState;
use hub_server::build_router;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hub_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(data_dir = ?config.data_dir, bind_addr = %config.bind_addr, "starting swarm coordination hub");

    if config.auth_token.is_none() {
        tracing::warn!("SWARM_AUTH_TOKEN not set, gateway is running open");
    }

    let state = AppState::new(&config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}

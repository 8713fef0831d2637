//! queuey-server — standalone HTTP server for Queuey.
//!
//! Reads config from env vars (see `config::Config`); defaults to the
//! in-memory backend so a local `cargo run` needs no cluster.

use std::sync::Arc;

use tokio::net::TcpListener;

use queuey_server::config::Config;
use queuey_server::router::build_router;
use queuey_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,queuey_server=debug".into()),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();

    let engine = config.build_engine().await.expect("failed to initialize storage/metadata backend");
    let state = AppState {
        engine: Arc::new(engine),
        app_keys: Arc::new(config.app_keys.clone()),
    };

    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("queuey-server listening on {bind_addr}");

    axum::serve(listener, app).await.expect("server error");
}

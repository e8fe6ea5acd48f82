//! Server lifecycle: bind the listener, serve, and shut down cleanly.
//!
//! No PID files, no server-info files, no port probing, no previous-instance
//! termination — the teacher's multi-instance coordination machinery has no
//! counterpart here. One process, one port, `ctrl_c()` to stop.

use std::net::SocketAddr;

use tracing::{error, info};

use crate::{app_state::AppState, config::ServerConfig, server::http_api::create_router};

/// Bind `host:port`, serve until `ctrl_c()` fires, then flush and close the store.
pub async fn run_server(
    app_state: std::sync::Arc<AppState>,
    server_config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(app_state.clone());

    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "image dispatch server listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, shutting down gracefully");
        }
    }

    app_state.shutdown().await;
    Ok(())
}

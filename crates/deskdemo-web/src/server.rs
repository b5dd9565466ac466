//! Listener setup for the web server.

use std::sync::Arc;

use tracing::info;

use crate::error::WebError;
use crate::routes::{AppState, create_router};

/// Run the web server until ctrl-c.
pub async fn run_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> Result<(), WebError> {
    let router = create_router(state, static_dir);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;

    info!("deskdemo listening on http://{}:{}", host, port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("deskdemo server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}

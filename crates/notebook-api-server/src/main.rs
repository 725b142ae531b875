use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

use notebook_api_server::{config::Settings, logging, routes, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    logging::init_logger(&settings.logging)?;
    info!("🚀 Starting Notebook API Server v{}...", env!("CARGO_PKG_VERSION"));
    info!(
        "✅ Configuration loaded (conversation backend: {:?})",
        settings.conversation.backend
    );

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let state = AppState::build(settings).await?;
    info!("✅ Services initialized");

    let app = routes::build_router(state);

    info!("🎯 Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

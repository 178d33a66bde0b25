use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod config;
mod render;
mod routes;
mod state;
mod upload;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facemoodd starting");

    let config = config::Config::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        upload_dir = %config.upload_dir.display(),
        db_path = %config.db_path.display(),
        model_path = %config.model_path.display(),
        profile = %config.model_profile,
        auto_download = config.auto_download,
        "configuration loaded"
    );

    let state = bootstrap::bootstrap(&config).await?;
    let app = routes::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "facemoodd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facemoodd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

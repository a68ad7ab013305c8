//! PixelForge MCP server
//!
//! MCP server for image generation, editing, and analysis with Google Gemini.

use anyhow::{Context, Result};
use clap::Parser;
use pixelforge_mcp::backend;
use pixelforge_mcp::{ImageHandler, PixelForgeServer};
use pixelforge_mcp_common::tracing::init_tracing;
use pixelforge_mcp_common::{ConfigStore, McpServerBuilder, TransportArgs};
use std::path::PathBuf;

/// Command-line arguments for the image server.
#[derive(Parser, Debug)]
#[command(name = "pixelforge-mcp")]
#[command(about = "MCP server for image generation using Google Gemini")]
struct Args {
    /// Transport configuration
    #[command(flatten)]
    transport: TransportArgs,

    /// Path to the YAML configuration file (default: config/config.yaml)
    #[arg(long, env = "PIXELFORGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let store = ConfigStore::load(args.config.clone()).context("Failed to load configuration")?;
    let config = store.snapshot().await;
    init_tracing(&config.server.log_level);

    tracing::info!(
        name = %config.server.name,
        version = %config.server.version,
        backend = ?config.imagen.backend,
        output_dir = %config.storage.output_dir.display(),
        "Configuration loaded"
    );
    if config.storage.use_s3 {
        tracing::warn!("S3 storage is configured but not supported; images are stored locally");
    }

    let backend = backend::from_config(&config.imagen)
        .await
        .context("Failed to initialize image backend")?;
    let handler = ImageHandler::new(store, backend);

    #[cfg(unix)]
    spawn_reload_on_hangup(handler.clone())?;

    let server = PixelForgeServer::new(handler);
    let transport = args.transport.into_transport();
    tracing::info!(transport = %transport, "Starting MCP server");

    McpServerBuilder::new(server)
        .with_transport(transport)
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Reload configuration whenever the process receives SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(handler: ImageHandler) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match handler.reload_config().await {
                Ok(()) => tracing::info!("Configuration reloaded on SIGHUP"),
                Err(e) => tracing::error!(error = %e, "Configuration reload failed, keeping previous"),
            }
        }
    });
    Ok(())
}

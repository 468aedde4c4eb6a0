//! # valet-server
//!
//! Remote shift store for valet devices.
//!
//! Devices push full shift snapshots and look shifts up by code. Concurrent
//! pushes for the same shift are merged rather than overwritten, so one
//! device's additions never erase another's. Snapshots are archived as JSON
//! files and reloaded on start.

mod api;
mod config;
mod error;
mod repository;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::repository::ShiftRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,valet_server=debug")),
        )
        .init();

    info!("Starting valet shift server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the shift archive (creates directory if missing)
    // -----------------------------------------------------------------------
    let repository = Arc::new(ShiftRepository::open(config.data_dir.clone()).await?);

    let http_addr = config.http_addr;
    let app_state = AppState {
        repository,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

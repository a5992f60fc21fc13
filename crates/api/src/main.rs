//! Predictive Maintenance API - Main Entry Point

use anyhow::Result;
use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    let _log_guard = init_logging(&config.logging)?;

    info!("=== Predictive Maintenance API v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        scaler = %config.model.scaler_path,
        model = %config.model.model_path,
        "Loading model artifacts"
    );

    run_server(config).await
}

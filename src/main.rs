// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, sync::Arc};
use table_detector_api::{
    api::{start_server, AppState},
    cli::Cli,
    version,
    vision::DetrTableDetector,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("Starting {}", version::get_version_string());

    let config = Cli::parse().into_config();
    config.validate().context("Invalid configuration")?;

    info!(
        "Loading detection model from {}",
        config.detector.model_path.display()
    );
    let detector = match DetrTableDetector::load(&config.detector) {
        Ok(detector) => detector,
        Err(e) => {
            error!("Failed to load detection model: {}", e);
            return Err(e.into());
        }
    };
    info!("Detection model loaded, default threshold {}", config.confidence_threshold);

    let state = AppState::new(Arc::new(detector), config);
    state
        .visualizations
        .ensure_dirs()
        .context("Failed to create visualization directory")?;

    start_server(state).await
}

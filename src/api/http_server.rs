// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use super::detect::detect_handler;
use super::detect_batch::detect_batch_handler;
use crate::config::ServiceConfig;
use crate::version::{self, VersionInfo};
use crate::vision::{TableDetector, VisualizationStore};

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn TableDetector>,
    pub visualizations: Arc<VisualizationStore>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(detector: Arc<dyn TableDetector>, config: ServiceConfig) -> Self {
        Self {
            detector,
            visualizations: Arc::new(VisualizationStore::new(config.static_dir.clone())),
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    #[serde(flatten)]
    pub version: VersionInfo,
}

pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.visualizations.static_dir());

    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Detection endpoints
        .route("/detect", post(detect_handler))
        .route("/detect-batch", post(detect_batch_handler))
        // Published visualizations
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(state.config.max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM, letting in-flight requests finish
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.detector.model_name().to_string(),
        version: version::get_version_info(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

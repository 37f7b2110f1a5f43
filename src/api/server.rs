// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::analyze::analyze_handler;
use super::handlers::{health_handler, metrics_handler, model_info_handler};
use crate::config::ServerConfig;
use crate::metrics::ApiMetrics;
use crate::vision::ModelManager;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub model_manager: Arc<ModelManager>,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(model_manager: ModelManager) -> Result<Self> {
        let metrics = ApiMetrics::new().context("Failed to register metrics")?;
        Ok(Self {
            model_manager: Arc::new(model_manager),
            metrics: Arc::new(metrics),
        })
    }
}

pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/model-info", get(model_info_handler))
        .route("/analyze", post(analyze_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🌐 API server listening on http://{}", addr);
    info!("   POST /analyze    - Analyze X-ray image");
    info!("   GET  /health     - Health check");
    info!("   GET  /model-info - Model information");
    info!("   GET  /metrics    - Prometheus metrics");

    axum::serve(listener, create_router(state, config.max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
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

    info!("🛑 Shutdown signal received, draining connections");
}

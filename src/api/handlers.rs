// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::analyze::response::unix_timestamp;
use super::server::AppState;
use crate::version;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" when the model is loaded, otherwise "degraded"
    pub status: String,
    pub model_loaded: bool,
    pub device: String,
    pub version: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub architecture: String,
    pub classes: Vec<String>,
    pub input_size: u32,
    pub device: String,
    pub model_loaded: bool,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let manager = &state.model_manager;
    let model_loaded = manager.is_loaded();
    state.metrics.record_request("/health", 200);

    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
        model_loaded,
        device: manager.device(),
        version: version::VERSION.to_string(),
        timestamp: unix_timestamp(),
    })
}

/// GET /model-info
pub async fn model_info_handler(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    let manager = &state.model_manager;
    let description = manager.description();
    state.metrics.record_request("/model-info", 200);

    Json(ModelInfoResponse {
        architecture: description.architecture,
        classes: description.classes,
        input_size: description.input_size,
        device: manager.device(),
        model_loaded: manager.is_loaded(),
    })
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

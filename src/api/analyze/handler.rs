// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze endpoint handler

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::request::AnalyzeRequest;
use super::response::AnalyzeResponse;
use crate::api::errors::{ApiError, TimedApiError};
use crate::api::server::AppState;
use crate::vision::analyze_base64_image;

const ENDPOINT: &str = "/analyze";

/// POST /analyze - Classify an X-ray image and explain the prediction
///
/// # Request
/// - `image`: Base64-encoded image, data URL prefix allowed (required)
/// - `filename`: Original file name, logged only
/// - `patient_data`: Object echoed back as `patient_meta`
/// - `target_class`: Grad-CAM target class index (defaults to the prediction)
/// - `ground_truth`: Expected label; adds `ground_truth` and `correct`
///
/// # Response
/// - `prediction`, `prediction_index`, `confidence`, `probabilities`
/// - `gradcam_image`: Base64 PNG heatmap overlay (or `null`)
/// - `model_info`, `processing_time` (seconds), `timestamp` (Unix seconds)
///
/// # Errors
/// Every error body is `{"error": ..., "processing_time": ...}`.
/// - 400 Bad Request: missing image, undecodable image, bad `target_class`
/// - 413 Payload Too Large: body over the configured limit
/// - 503 Service Unavailable: model not loaded
/// - 500 Internal Server Error: inference failed
pub async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, TimedApiError> {
    let start = Instant::now();
    let result = analyze(&state, payload, start).await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status(),
    };
    state.metrics.record_request(ENDPOINT, status.as_u16());
    state
        .metrics
        .observe_analyze_duration(start.elapsed().as_secs_f64());

    result
}

async fn analyze(
    state: &AppState,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
    start: Instant,
) -> Result<Json<AnalyzeResponse>, TimedApiError> {
    let classifier = state.model_manager.get_classifier().ok_or_else(|| {
        warn!("Analyze request rejected: model not loaded");
        ApiError::model_not_loaded().since(start)
    })?;

    let Json(request) = payload.map_err(|rejection| {
        warn!("Invalid analyze request body: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text()).since(start)
        } else {
            ApiError::missing_image().since(start)
        }
    })?;

    let image = request
        .image_data()
        .map_err(|e| {
            warn!("Analyze request without image data");
            e.since(start)
        })?
        .to_string();

    debug!(
        "Analyze request: file={}, {} base64 chars, target_class={:?}",
        request.filename.as_deref().unwrap_or("<unnamed>"),
        image.len(),
        request.target_class
    );

    let target_class = request.target_class;
    let worker = classifier.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        analyze_base64_image(&worker, &image, target_class)
    })
    .await
    .map_err(|e| {
        error!("Analysis task panicked or was cancelled: {}", e);
        ApiError::InternalError(format!("Analysis task failed: {}", e)).since(start)
    })?
    .map_err(|e| {
        let err = ApiError::from(e);
        if err.status_code() >= 500 {
            error!("Analysis failed: {}", err);
        } else {
            warn!("Analysis rejected: {}", err);
        }
        err.since(start)
    })?;

    let prediction = &outcome.prediction;
    state.metrics.record_prediction(&prediction.label);

    let processing_time = start.elapsed().as_secs_f64();
    info!(
        "🩻 {} -> {} ({:.1}%) in {:.3}s",
        request.filename.as_deref().unwrap_or("<unnamed>"),
        prediction.label,
        prediction.confidence * 100.0,
        processing_time
    );

    let response = AnalyzeResponse::new(
        prediction,
        classifier.class_names(),
        outcome.gradcam_image,
        state.model_manager.description(),
        processing_time,
    )
    .with_ground_truth(request.ground_truth.clone())
    .with_patient_meta(request.patient_meta());

    Ok(Json(response))
}

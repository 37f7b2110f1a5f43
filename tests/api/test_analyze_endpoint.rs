// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Analyze endpoint tests for POST /analyze
//!
//! These tests drive the full router with a stub feature extractor and verify:
//! - Successful analysis returns prediction, probabilities and a Grad-CAM PNG
//! - Optional request fields (ground truth, patient data) are echoed
//! - Every error path returns the right status and an error body with timing

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use fracture_detection_api::api::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::{
    classifier_with, decode_png, gray_png_base64, state_with_classifier, state_with_stub_model,
    state_without_model, FailingExtractor, TEST_INPUT_SIZE,
};

const BODY_LIMIT: usize = 16 * 1024 * 1024;

fn router(state: AppState) -> Router {
    create_router(state, BODY_LIMIT)
}

async fn post_analyze(app: Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
    post_analyze(app, body.to_string()).await
}

fn assert_error_body(body: &Value, expected: &str) {
    let message = body["error"].as_str().expect("error field");
    assert!(
        message.contains(expected),
        "expected '{}' in error '{}'",
        expected,
        message
    );
    assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
}

#[cfg(test)]
mod analyze_handler_tests {
    use super::*;

    // =============================================================================
    // Success Path
    // =============================================================================

    #[tokio::test]
    async fn test_analyze_returns_prediction_and_overlay() {
        let app = router(state_with_stub_model());
        let (status, body) = post_json(app, json!({ "image": gray_png_base64(100, 80) })).await;

        assert_eq!(status, StatusCode::OK, "body: {}", body);
        assert_eq!(body["prediction"], "fracture");
        assert_eq!(body["prediction_index"], 1);

        let expected = 1.0 / (1.0 + (-2.0f64).exp());
        assert!((body["confidence"].as_f64().unwrap() - expected).abs() < 1e-4);

        let normal = body["probabilities"]["normal"].as_f64().unwrap();
        let fracture = body["probabilities"]["fracture"].as_f64().unwrap();
        assert!((normal + fracture - 1.0).abs() < 1e-5);

        assert_eq!(body["model_info"]["architecture"], "DenseNet121");
        assert_eq!(body["model_info"]["input_size"], TEST_INPUT_SIZE);
        assert_eq!(body["model_info"]["classes"], json!(["normal", "fracture"]));
        assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
        assert!(body["timestamp"].as_f64().unwrap() > 0.0);

        let overlay = decode_png(body["gradcam_image"].as_str().unwrap());
        assert_eq!(overlay.dimensions(), (TEST_INPUT_SIZE, TEST_INPUT_SIZE));

        assert!(body.get("ground_truth").is_none());
        assert!(body.get("patient_meta").is_none());
    }

    #[tokio::test]
    async fn test_analyze_accepts_data_url() {
        let app = router(state_with_stub_model());
        let image = format!("data:image/png;base64,{}", gray_png_base64(16, 16));
        let (status, body) = post_json(app, json!({ "image": image, "filename": "hand.png" })).await;

        assert_eq!(status, StatusCode::OK, "body: {}", body);
        assert_eq!(body["prediction"], "fracture");
    }

    #[tokio::test]
    async fn test_analyze_accepts_line_wrapped_base64() {
        let app = router(state_with_stub_model());
        let encoded = gray_png_base64(64, 64);
        let wrapped = encoded
            .as_bytes()
            .chunks(64)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(wrapped.contains('\n'));

        let (status, body) = post_json(app, json!({ "image": wrapped })).await;
        assert_eq!(status, StatusCode::OK, "body: {}", body);
        assert_eq!(body["prediction"], "fracture");
    }

    #[tokio::test]
    async fn test_analyze_echoes_ground_truth_and_patient_meta() {
        let app = router(state_with_stub_model());
        let (status, body) = post_json(
            app,
            json!({
                "image": gray_png_base64(32, 32),
                "ground_truth": "normal",
                "patient_data": { "age": 57, "region": "wrist" }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ground_truth"], "normal");
        assert_eq!(body["correct"], false);
        assert_eq!(body["patient_meta"]["region"], "wrist");
    }

    #[tokio::test]
    async fn test_analyze_with_explicit_target_class() {
        let app = router(state_with_stub_model());
        let (status, body) = post_json(
            app,
            json!({ "image": gray_png_base64(32, 32), "target_class": 0 }),
        )
        .await;

        // the target only changes the explanation, not the prediction
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "fracture");
        assert!(body["gradcam_image"].is_string());
    }

    // =============================================================================
    // Client Errors
    // =============================================================================

    #[tokio::test]
    async fn test_missing_image_field() {
        let app = router(state_with_stub_model());
        let (status, body) = post_json(app, json!({ "filename": "x.png" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_body(&body, "No image data provided");
    }

    #[tokio::test]
    async fn test_empty_image_field() {
        let app = router(state_with_stub_model());
        let (status, body) = post_json(app, json!({ "image": "" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_body(&body, "No image data provided");
    }

    #[tokio::test]
    async fn test_malformed_json_body() {
        let app = router(state_with_stub_model());
        let (status, body) = post_analyze(app, "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_body(&body, "No image data provided");
    }

    #[tokio::test]
    async fn test_invalid_base64() {
        let app = router(state_with_stub_model());
        let (status, body) = post_json(app, json!({ "image": "!!!not-base64!!!" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_body(&body, "base64");
    }

    #[tokio::test]
    async fn test_base64_that_is_not_an_image() {
        let app = router(state_with_stub_model());
        // "hello world, not an image"
        let (status, body) =
            post_json(app, json!({ "image": "aGVsbG8gd29ybGQsIG5vdCBhbiBpbWFnZQ==" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_body(&body, "Unsupported image format");
    }

    #[tokio::test]
    async fn test_target_class_out_of_range() {
        let app = router(state_with_stub_model());
        let (status, body) = post_json(
            app,
            json!({ "image": gray_png_base64(8, 8), "target_class": 7 }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_body(&body, "out of range");
    }

    #[tokio::test]
    async fn test_body_over_limit() {
        let app = create_router(state_with_stub_model(), 1024);
        let (status, body) = post_json(app, json!({ "image": "A".repeat(4096) })).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["processing_time"].is_number());
    }

    // =============================================================================
    // Server Errors
    // =============================================================================

    #[tokio::test]
    async fn test_model_not_loaded() {
        let app = router(state_without_model());
        let (status, body) = post_json(app, json!({ "image": gray_png_base64(8, 8) })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_error_body(&body, "Model not loaded");
    }

    #[tokio::test]
    async fn test_inference_failure() {
        let state = state_with_classifier(classifier_with(Arc::new(FailingExtractor)));
        let app = router(state);
        let (status, body) = post_json(app, json!({ "image": gray_png_base64(8, 8) })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_error_body(&body, "session run failed");
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Health and model info endpoint tests

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use fracture_detection_api::{api::create_router, version};
use serde_json::Value;
use tower::ServiceExt;

use crate::common::{state_with_stub_model, state_without_model, TEST_INPUT_SIZE};

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_with_model() {
    let app = create_router(state_with_stub_model(), 1024);
    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["device"], "cpu");
    assert_eq!(body["version"], version::VERSION);
    assert!(body["timestamp"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_health_without_model_is_degraded() {
    let app = create_router(state_without_model(), 1024);
    let (status, body) = get_json(app, "/health").await;

    // health still answers so orchestrators can see why the model is missing
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_model_info() {
    let app = create_router(state_with_stub_model(), 1024);
    let (status, body) = get_json(app, "/model-info").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["architecture"], "DenseNet121");
    assert_eq!(body["classes"], serde_json::json!(["normal", "fracture"]));
    assert_eq!(body["input_size"], TEST_INPUT_SIZE);
    assert_eq!(body["device"], "cpu");
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_model_info_without_model() {
    let app = create_router(state_without_model(), 1024);
    let (_, body) = get_json(app, "/model-info").await;

    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["architecture"], "DenseNet121");
}

#[tokio::test]
async fn test_cors_headers_present() {
    let app = create_router(state_with_stub_model(), 1024);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_router(state_with_stub_model(), 1024);
    let response = app
        .oneshot(Request::builder().uri("/predict").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

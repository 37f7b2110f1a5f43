// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Prometheus metrics endpoint tests

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use fracture_detection_api::api::create_router;
use serde_json::json;
use tower::ServiceExt;

use crate::common::{gray_png_base64, state_with_stub_model};

#[tokio::test]
async fn test_metrics_count_analyze_requests() {
    let state = state_with_stub_model();

    let ok = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "image": gray_png_base64(8, 8) }).to_string()))
        .unwrap();
    let response = create_router(state.clone(), 1 << 20).oneshot(ok).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bad = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = create_router(state.clone(), 1 << 20).oneshot(bad).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = create_router(state, 1 << 20)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = String::from_utf8(
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();
    assert!(text.contains(r#"fracture_api_requests_total{endpoint="/analyze",status="200"} 1"#));
    assert!(text.contains(r#"fracture_api_requests_total{endpoint="/analyze",status="400"} 1"#));
    assert!(text.contains(r#"fracture_api_predictions_total{label="fracture"} 1"#));
    assert!(text.contains("fracture_api_analyze_duration_seconds_count 2"));
}

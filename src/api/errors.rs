// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::vision::AnalysisError;

/// JSON body returned for every failed `/analyze` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    /// Seconds spent before the failure
    pub processing_time: f64,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    InvalidImage(String),
    PayloadTooLarge(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn missing_image() -> Self {
        ApiError::InvalidRequest("No image data provided".to_string())
    }

    pub fn model_not_loaded() -> Self {
        ApiError::ServiceUnavailable("Model not loaded".to_string())
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::InvalidRequest(msg)
            | ApiError::InvalidImage(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::InternalError(msg) => msg,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) | ApiError::InvalidImage(_) => 400,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) => 500,
        }
    }

    pub fn to_response(&self, processing_time: f64) -> ErrorResponse {
        ErrorResponse {
            error: self.message().to_string(),
            processing_time,
        }
    }

    /// Attach the time elapsed since `start` so the error can be returned
    pub fn since(self, start: Instant) -> TimedApiError {
        TimedApiError {
            error: self,
            processing_time: start.elapsed().as_secs_f64(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match &err {
            AnalysisError::InvalidImage(_) => ApiError::InvalidImage(err.to_string()),
            AnalysisError::InvalidTargetClass { .. } => ApiError::InvalidRequest(err.to_string()),
            AnalysisError::Classifier(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

/// An [`ApiError`] with its processing time, ready to become a response
#[derive(Debug)]
pub struct TimedApiError {
    pub error: ApiError,
    pub processing_time: f64,
}

impl TimedApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for TimedApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.error.to_response(self.processing_time))).into_response()
    }
}

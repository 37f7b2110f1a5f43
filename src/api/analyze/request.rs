// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze request types and validation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::errors::ApiError;

/// Request body for POST /analyze
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64-encoded image, optionally with a `data:<mime>;base64,` prefix
    #[serde(default)]
    pub image: Option<String>,

    /// Original file name, used for logging only
    #[serde(default)]
    pub filename: Option<String>,

    /// Free-form patient fields, echoed back as `patient_meta`
    #[serde(default)]
    pub patient_data: Option<Map<String, Value>>,

    /// Grad-CAM target class; defaults to the predicted class
    #[serde(default)]
    pub target_class: Option<usize>,

    /// Known label, compared against the prediction
    #[serde(default)]
    pub ground_truth: Option<String>,
}

impl AnalyzeRequest {
    /// Return the image payload or the "no image" error
    pub fn image_data(&self) -> Result<&str, ApiError> {
        match self.image.as_deref().map(str::trim) {
            Some(image) if !image.is_empty() => Ok(image),
            _ => Err(ApiError::missing_image()),
        }
    }

    /// Patient fields worth echoing back: non-empty objects only
    pub fn patient_meta(&self) -> Option<Map<String, Value>> {
        self.patient_data
            .as_ref()
            .filter(|data| !data.is_empty())
            .cloned()
    }
}

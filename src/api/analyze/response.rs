// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::vision::{ModelDescription, Prediction};

/// Response from POST /analyze
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Predicted label
    pub prediction: String,
    pub prediction_index: usize,
    /// Softmax probability of the predicted class
    pub confidence: f32,
    /// Probability per label
    pub probabilities: BTreeMap<String, f32>,
    /// Seconds spent on the request
    pub processing_time: f64,
    /// Base64 PNG overlay, `null` if it could not be encoded
    pub gradcam_image: Option<String>,
    pub model_info: ModelDescription,
    /// Unix time in seconds
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
    /// Whether the prediction matches `ground_truth`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_meta: Option<Map<String, Value>>,
}

impl AnalyzeResponse {
    pub fn new(
        prediction: &Prediction,
        class_names: &[String],
        gradcam_image: Option<String>,
        model_info: ModelDescription,
        processing_time: f64,
    ) -> Self {
        let probabilities = class_names
            .iter()
            .cloned()
            .zip(prediction.probabilities.iter().copied())
            .collect();

        Self {
            prediction: prediction.label.clone(),
            prediction_index: prediction.class_index,
            confidence: prediction.confidence,
            probabilities,
            processing_time,
            gradcam_image,
            model_info,
            timestamp: unix_timestamp(),
            ground_truth: None,
            correct: None,
            patient_meta: None,
        }
    }

    /// Record the expected label; comparison ignores case and surrounding whitespace
    pub fn with_ground_truth(mut self, ground_truth: Option<String>) -> Self {
        if let Some(truth) = ground_truth {
            self.correct = Some(truth.trim().eq_ignore_ascii_case(&self.prediction));
            self.ground_truth = Some(truth);
        }
        self
    }

    pub fn with_patient_meta(mut self, meta: Option<Map<String, Value>>) -> Self {
        self.patient_meta = meta;
        self
    }
}

/// Current Unix time as fractional seconds
pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

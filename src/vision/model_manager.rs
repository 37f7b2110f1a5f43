// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classifier model manager: configuration, loading and availability

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::vision::classifier::{DevicePreference, FractureClassifier};
use crate::vision::preprocessing::DEFAULT_INPUT_SIZE;

/// Configuration for loading the fracture classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Architecture name reported by the API
    pub architecture: String,
    /// Class labels, in head output order
    pub class_names: Vec<String>,
    /// Square input size in pixels
    pub input_size: u32,
    /// ONNX export of `model.features`
    pub backbone_path: PathBuf,
    /// JSON export of `model.classifier`
    pub head_path: PathBuf,
    /// Execution device preference
    pub device: DevicePreference,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            architecture: "DenseNet121".to_string(),
            class_names: vec!["normal".to_string(), "fracture".to_string()],
            input_size: DEFAULT_INPUT_SIZE,
            backbone_path: PathBuf::from("api_server/densenet121_features.onnx"),
            head_path: PathBuf::from("api_server/classifier_head.json"),
            device: DevicePreference::Auto,
            intra_threads: 4,
        }
    }
}

/// Static model description for `/model-info` and `/analyze`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescription {
    pub architecture: String,
    pub input_size: u32,
    pub classes: Vec<String>,
}

/// Owns the classifier if it could be loaded
///
/// A failed load is kept as `None` so the server can still answer health
/// checks and report `model_loaded: false`.
pub struct ModelManager {
    config: ClassifierConfig,
    classifier: Option<Arc<FractureClassifier>>,
}

impl ModelManager {
    /// Load the classifier, failing if it cannot be loaded
    pub fn load(config: ClassifierConfig) -> anyhow::Result<Self> {
        let classifier = FractureClassifier::load(&config).with_context(|| {
            format!(
                "Failed to load classifier (backbone {}, head {})",
                config.backbone_path.display(),
                config.head_path.display()
            )
        })?;
        Ok(Self::with_classifier(config, Arc::new(classifier)))
    }

    /// Try to load the classifier; failures are logged, not returned
    pub fn new(config: ClassifierConfig) -> Self {
        let classifier = match FractureClassifier::load(&config) {
            Ok(model) => Some(Arc::new(model)),
            Err(e) => {
                tracing::warn!(
                    "⚠️ Failed to load classifier from {}: {:#}",
                    config.backbone_path.display(),
                    e
                );
                None
            }
        };

        Self { config, classifier }
    }

    /// Wrap an already loaded classifier
    pub fn with_classifier(config: ClassifierConfig, classifier: Arc<FractureClassifier>) -> Self {
        Self {
            config,
            classifier: Some(classifier),
        }
    }

    /// Manager with no model, for degraded startup
    pub fn unloaded(config: ClassifierConfig) -> Self {
        Self {
            config,
            classifier: None,
        }
    }

    pub fn get_classifier(&self) -> Option<Arc<FractureClassifier>> {
        self.classifier.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Device string: the actual device when loaded, otherwise the preference
    pub fn device(&self) -> String {
        match &self.classifier {
            Some(model) => model.device().to_string(),
            None => match self.config.device {
                DevicePreference::Cuda => "cuda".to_string(),
                _ => "cpu".to_string(),
            },
        }
    }

    pub fn description(&self) -> ModelDescription {
        ModelDescription {
            architecture: self.config.architecture.clone(),
            input_size: self.config.input_size,
            classes: self.config.class_names.clone(),
        }
    }
}

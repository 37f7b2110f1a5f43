// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! DenseNet121 fracture classifier
//!
//! The convolutional backbone (`model.features`) runs in ONNX Runtime and
//! returns the final feature map. The linear head, pooling and softmax are
//! applied here so the same feature map can feed Grad-CAM without a second
//! forward pass.

pub mod backbone;
pub mod head;
pub mod model;

use thiserror::Error;

pub use backbone::{DevicePreference, ExecutionDevice, FeatureExtractor, OnnxFeatureExtractor};
pub use head::{relu_global_average, ClassifierHead, HeadWeights};
pub use model::{argmax, softmax, FractureClassifier, Prediction};

/// Errors raised while loading or running the classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid classifier head: {0}")]
    InvalidHead(String),

    #[error("Class count mismatch: head has {head} outputs, config lists {configured} class names")]
    ClassCountMismatch { head: usize, configured: usize },

    #[error("Feature size mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Unexpected feature map shape: {0:?}")]
    UnexpectedOutputShape(Vec<usize>),

    #[error("Inference failed: {0}")]
    Inference(String),
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for X-ray fracture detection
//!
//! This module provides:
//! - Image decoding and ImageNet preprocessing
//! - DenseNet121 classification (ONNX backbone + linear head)
//! - Grad-CAM saliency maps and heatmap overlays

pub mod classifier;
pub mod gradcam;
pub mod image_utils;
pub mod model_manager;
pub mod overlay;
pub mod pipeline;
pub mod preprocessing;

pub use classifier::{FeatureExtractor, FractureClassifier, Prediction};
pub use image_utils::{decode_base64_image, decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use model_manager::{ClassifierConfig, ModelDescription, ModelManager};
pub use pipeline::{analyze_base64_image, AnalysisError, AnalysisOutcome};

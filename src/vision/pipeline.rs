// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end analysis of one image: decode, classify, explain, render

use image::RgbImage;
use ndarray::{Array2, Array4};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::vision::classifier::{ClassifierError, FractureClassifier, Prediction};
use crate::vision::gradcam::GradCamError;
use crate::vision::image_utils::{decode_base64_image, ImageError, ImageInfo};
use crate::vision::overlay::{blank_overlay, encode_png_base64, render_overlay, OverlayError};
use crate::vision::preprocessing::preprocess_for_classifier;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Error preprocessing image: {0}")]
    InvalidImage(#[from] ImageError),

    #[error("Target class {target} out of range (model has {num_classes} classes)")]
    InvalidTargetClass { target: usize, num_classes: usize },

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Everything the API needs to build a response
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub prediction: Prediction,
    /// Base64 PNG overlay; `None` only when PNG encoding failed
    pub gradcam_image: Option<String>,
    pub image_info: ImageInfo,
}

/// Run the full pipeline on a base64 image
///
/// Grad-CAM failures fall back to a blank overlay; they never fail the request.
/// This is CPU-bound and should run on a blocking thread.
pub fn analyze_base64_image(
    classifier: &FractureClassifier,
    image_b64: &str,
    target_class: Option<usize>,
) -> Result<AnalysisOutcome, AnalysisError> {
    if let Some(target) = target_class {
        if target >= classifier.num_classes() {
            return Err(AnalysisError::InvalidTargetClass {
                target,
                num_classes: classifier.num_classes(),
            });
        }
    }

    let (image, image_info) = decode_base64_image(image_b64)?;
    debug!(
        "Decoded image: {}x{}, {} bytes, {:?}",
        image_info.width, image_info.height, image_info.size_bytes, image_info.format
    );

    let input = preprocess_for_classifier(&image, classifier.input_size());
    let prediction = classifier.predict(&input)?;

    let overlay = overlay_or_blank(
        &input,
        classifier.explain(&prediction, target_class),
        classifier.input_size(),
    );
    let gradcam_image = encoded_or_none(encode_png_base64(&overlay));

    Ok(AnalysisOutcome {
        prediction,
        gradcam_image,
        image_info,
    })
}

/// Heatmap overlay for `input`, or a black `size` x `size` image if Grad-CAM
/// or rendering failed
pub fn overlay_or_blank(
    input: &Array4<f32>,
    explanation: Result<Array2<f32>, GradCamError>,
    size: u32,
) -> RgbImage {
    let rendered = explanation
        .map_err(|e| e.to_string())
        .and_then(|mask| render_overlay(input, &mask).map_err(|e| e.to_string()));
    match rendered {
        Ok(overlay) => overlay,
        Err(e) => {
            warn!("Grad-CAM generation failed: {}", e);
            blank_overlay(size)
        }
    }
}

/// Encoded overlay, or `None` if encoding failed
pub fn encoded_or_none(encoded: Result<String, OverlayError>) -> Option<String> {
    match encoded {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            error!("Error creating Grad-CAM overlay: {}", e);
            None
        }
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fracture classifier: backbone + linear head + softmax

use ndarray::{Array1, Array2, Array3, Array4, Axis};
use std::sync::Arc;
use tracing::{debug, info};

use super::backbone::{ExecutionDevice, FeatureExtractor, OnnxFeatureExtractor};
use super::head::{relu_global_average, ClassifierHead};
use super::ClassifierError;
use crate::vision::gradcam::{grad_cam, GradCamError};
use crate::vision::model_manager::ClassifierConfig;

/// Result of a single forward pass
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Index of the most probable class
    pub class_index: usize,
    /// Label of the most probable class
    pub label: String,
    /// Softmax probability of the predicted class
    pub confidence: f32,
    /// Softmax probabilities for every class
    pub probabilities: Vec<f32>,
    /// Raw logits
    pub logits: Vec<f32>,
    /// Feature map `[C, H, W]` kept for Grad-CAM
    pub features: Array3<f32>,
}

/// DenseNet121 fracture classifier
pub struct FractureClassifier {
    extractor: Arc<dyn FeatureExtractor>,
    head: ClassifierHead,
    class_names: Vec<String>,
    architecture: String,
    input_size: u32,
}

impl std::fmt::Debug for FractureClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FractureClassifier")
            .field("architecture", &self.architecture)
            .field("class_names", &self.class_names)
            .field("input_size", &self.input_size)
            .field("device", &self.extractor.device())
            .finish_non_exhaustive()
    }
}

impl FractureClassifier {
    /// Load the ONNX backbone and JSON head described by `config`
    pub fn load(config: &ClassifierConfig) -> anyhow::Result<Self> {
        if !config.backbone_path.exists() {
            return Err(ClassifierError::ModelNotFound(
                config.backbone_path.display().to_string(),
            )
            .into());
        }
        let head = ClassifierHead::from_file(&config.head_path)?;
        let extractor = OnnxFeatureExtractor::load(
            &config.backbone_path,
            config.device,
            config.intra_threads,
        )?;

        let classifier = Self::new(Arc::new(extractor), head, config)?;
        info!(
            "✅ {} classifier ready ({} classes on {})",
            classifier.architecture,
            classifier.class_names.len(),
            classifier.device()
        );
        Ok(classifier)
    }

    /// Assemble a classifier from an already constructed feature extractor
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        head: ClassifierHead,
        config: &ClassifierConfig,
    ) -> Result<Self, ClassifierError> {
        if head.num_classes() != config.class_names.len() {
            return Err(ClassifierError::ClassCountMismatch {
                head: head.num_classes(),
                configured: config.class_names.len(),
            });
        }

        Ok(Self {
            extractor,
            head,
            class_names: config.class_names.clone(),
            architecture: config.architecture.clone(),
            input_size: config.input_size,
        })
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn device(&self) -> ExecutionDevice {
        self.extractor.device()
    }

    /// Run the forward pass on a preprocessed `[1, 3, S, S]` tensor
    pub fn predict(&self, input: &Array4<f32>) -> Result<Prediction, ClassifierError> {
        let output = self
            .extractor
            .extract(input)
            .map_err(|e| ClassifierError::Inference(format!("{:#}", e)))?;

        let shape = output.shape().to_vec();
        if shape[0] != 1 || shape[2] == 0 || shape[3] == 0 {
            return Err(ClassifierError::UnexpectedOutputShape(shape));
        }
        if shape[1] != self.head.in_features() {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.head.in_features(),
                actual: shape[1],
            });
        }

        let features = output.index_axis_move(Axis(0), 0);
        let pooled = relu_global_average(&features);
        let logits = self.head.forward(&pooled)?;
        let probabilities = softmax(&logits);
        let class_index = argmax(&probabilities);

        debug!(
            "Logits: {:?}, probabilities: {:?}",
            logits.as_slice(),
            probabilities.as_slice()
        );

        Ok(Prediction {
            class_index,
            label: self.class_names[class_index].clone(),
            confidence: probabilities[class_index],
            probabilities: probabilities.to_vec(),
            logits: logits.to_vec(),
            features,
        })
    }

    /// Grad-CAM map for `target_class` (predicted class when `None`), upsampled to the input size
    pub fn explain(
        &self,
        prediction: &Prediction,
        target_class: Option<usize>,
    ) -> Result<Array2<f32>, GradCamError> {
        let target = target_class.unwrap_or(prediction.class_index);
        grad_cam(
            &prediction.features,
            &self.head,
            target,
            self.input_size as usize,
        )
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Index of the largest value; the first one wins on ties
pub fn argmax(values: &Array1<f32>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_val), (i, &v)| {
            if v > best_val {
                (i, v)
            } else {
                (best, best_val)
            }
        })
        .0
}

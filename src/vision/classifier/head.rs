// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Linear classifier head applied on top of the DenseNet121 feature map

use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ClassifierError;

/// On-disk layout of the head weights (`model.classifier` exported as JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadWeights {
    /// Weight matrix, one row per class
    pub weight: Vec<Vec<f32>>,
    /// Bias, one entry per class
    pub bias: Vec<f32>,
}

/// Final `nn.Linear(in_features, num_classes)` layer
#[derive(Debug, Clone)]
pub struct ClassifierHead {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl ClassifierHead {
    /// Build a head from a weight matrix `[num_classes, in_features]` and a bias `[num_classes]`
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self, ClassifierError> {
        let (num_classes, in_features) = weight.dim();
        if num_classes == 0 || in_features == 0 {
            return Err(ClassifierError::InvalidHead(
                "weight matrix is empty".to_string(),
            ));
        }
        if bias.len() != num_classes {
            return Err(ClassifierError::InvalidHead(format!(
                "bias has {} entries, expected {}",
                bias.len(),
                num_classes
            )));
        }
        Ok(Self { weight, bias })
    }

    /// Load head weights from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::ModelNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::InvalidHead(format!("failed to read {}: {}", path.display(), e))
        })?;
        let weights: HeadWeights = serde_json::from_str(&content).map_err(|e| {
            ClassifierError::InvalidHead(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Self::try_from(weights)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.weight.nrows()
    }

    /// Number of input features (channels of the feature map)
    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    /// Weight row for a single class
    pub fn class_weights(&self, class_index: usize) -> Option<ArrayView1<'_, f32>> {
        (class_index < self.num_classes()).then(|| self.weight.row(class_index))
    }

    /// Compute logits from pooled features
    pub fn forward(&self, pooled: &Array1<f32>) -> Result<Array1<f32>, ClassifierError> {
        if pooled.len() != self.in_features() {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.in_features(),
                actual: pooled.len(),
            });
        }
        Ok(self.weight.dot(pooled) + &self.bias)
    }
}

impl TryFrom<HeadWeights> for ClassifierHead {
    type Error = ClassifierError;

    fn try_from(weights: HeadWeights) -> Result<Self, Self::Error> {
        let num_classes = weights.weight.len();
        let in_features = weights.weight.first().map(|row| row.len()).unwrap_or(0);
        if weights.weight.iter().any(|row| row.len() != in_features) {
            return Err(ClassifierError::InvalidHead(
                "weight rows have different lengths".to_string(),
            ));
        }
        let flat: Vec<f32> = weights.weight.into_iter().flatten().collect();
        let weight = Array2::from_shape_vec((num_classes, in_features), flat)
            .map_err(|e| ClassifierError::InvalidHead(e.to_string()))?;
        Self::new(weight, Array1::from(weights.bias))
    }
}

/// `adaptive_avg_pool2d(relu(features), 1)` over a `[C, H, W]` feature map
pub fn relu_global_average(features: &Array3<f32>) -> Array1<f32> {
    let (_, h, w) = features.dim();
    let area = (h * w).max(1) as f32;
    features
        .mapv(|v| v.max(0.0))
        .sum_axis(Axis(2))
        .sum_axis(Axis(1))
        / area
}

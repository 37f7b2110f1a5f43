// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Grad-CAM over the last DenseNet121 feature layer
//!
//! The score of class `t` is `w_t · mean_hw(relu(A)) + b_t`, so its gradient
//! with respect to the feature map is `w_{t,k} / (H * W)` wherever
//! `A_{k,i,j} > 0` and zero elsewhere. Channel weights are the spatial mean of
//! that gradient. The target layer output is the post-ReLU activation, so
//! the map is `relu(sum_k alpha_k * relu(A_k))`.

use ndarray::{Array1, Array2, Array3, Axis};
use thiserror::Error;

use crate::vision::classifier::ClassifierHead;

/// Added to the denominator when rescaling a map to [0, 1]
const SCALE_EPSILON: f32 = 1e-7;

#[derive(Debug, Error)]
pub enum GradCamError {
    #[error("Target class {target} out of range (model has {num_classes} classes)")]
    TargetOutOfRange { target: usize, num_classes: usize },

    #[error("Feature map has {actual} channels, head expects {expected}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Feature map is empty")]
    EmptyFeatureMap,

    #[error("Output size must be positive")]
    InvalidOutputSize,
}

/// Per-channel Grad-CAM weights for `target_class`
pub fn channel_weights(
    features: &Array3<f32>,
    head: &ClassifierHead,
    target_class: usize,
) -> Result<Array1<f32>, GradCamError> {
    let (channels, h, w) = features.dim();
    if channels == 0 || h == 0 || w == 0 {
        return Err(GradCamError::EmptyFeatureMap);
    }
    if channels != head.in_features() {
        return Err(GradCamError::ChannelMismatch {
            expected: head.in_features(),
            actual: channels,
        });
    }
    let class_weights =
        head.class_weights(target_class)
            .ok_or(GradCamError::TargetOutOfRange {
                target: target_class,
                num_classes: head.num_classes(),
            })?;

    let area = (h * w) as f32;
    let mut alphas = Array1::<f32>::zeros(channels);
    for (k, channel) in features.axis_iter(Axis(0)).enumerate() {
        let active = channel.iter().filter(|&&v| v > 0.0).count() as f32;
        // mean over (i, j) of w_k / area * [A > 0]
        alphas[k] = class_weights[k] * active / (area * area);
    }
    Ok(alphas)
}

/// Raw (unscaled) class activation map at feature resolution
pub fn raw_cam(
    features: &Array3<f32>,
    head: &ClassifierHead,
    target_class: usize,
) -> Result<Array2<f32>, GradCamError> {
    let alphas = channel_weights(features, head, target_class)?;
    let (_, h, w) = features.dim();

    let mut cam = Array2::<f32>::zeros((h, w));
    for (channel, &alpha) in features.axis_iter(Axis(0)).zip(alphas.iter()) {
        if alpha != 0.0 {
            cam.scaled_add(alpha, &channel.mapv(|v| v.max(0.0)));
        }
    }
    cam.mapv_inplace(|v| v.max(0.0));
    Ok(cam)
}

/// Shift to zero minimum and divide by the maximum
pub fn scale_cam(cam: &Array2<f32>) -> Array2<f32> {
    let min = cam.fold(f32::INFINITY, |acc, &v| acc.min(v));
    let shifted = cam.mapv(|v| v - min);
    let max = shifted.fold(0.0f32, |acc, &v| acc.max(v));
    shifted / (SCALE_EPSILON + max)
}

/// Bilinear resize with half-pixel centers and clamped edges
pub fn resize_bilinear(src: &Array2<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    let mut out = Array2::<f32>::zeros((out_h, out_w));
    if in_h == 0 || in_w == 0 {
        return out;
    }

    let scale_y = in_h as f32 / out_h as f32;
    let scale_x = in_w as f32 / out_w as f32;

    for y in 0..out_h {
        let sy = ((y as f32 + 0.5) * scale_y - 0.5).max(0.0);
        let y0 = (sy.floor() as usize).min(in_h - 1);
        let y1 = (y0 + 1).min(in_h - 1);
        let fy = sy - y0 as f32;

        for x in 0..out_w {
            let sx = ((x as f32 + 0.5) * scale_x - 0.5).max(0.0);
            let x0 = (sx.floor() as usize).min(in_w - 1);
            let x1 = (x0 + 1).min(in_w - 1);
            let fx = sx - x0 as f32;

            let top = src[[y0, x0]] * (1.0 - fx) + src[[y0, x1]] * fx;
            let bottom = src[[y1, x0]] * (1.0 - fx) + src[[y1, x1]] * fx;
            out[[y, x]] = top * (1.0 - fy) + bottom * fy;
        }
    }

    out
}

/// Grad-CAM for `target_class`, in [0, 1] at `output_size` x `output_size`
pub fn grad_cam(
    features: &Array3<f32>,
    head: &ClassifierHead,
    target_class: usize,
    output_size: usize,
) -> Result<Array2<f32>, GradCamError> {
    if output_size == 0 {
        return Err(GradCamError::InvalidOutputSize);
    }

    let cam = raw_cam(features, head, target_class)?;
    let layer_cam = resize_bilinear(&scale_cam(&cam), output_size, output_size);

    // single target layer: clamp and rescale once more, as the multi-layer aggregation does
    let aggregated = layer_cam.mapv(|v| v.max(0.0));
    Ok(scale_cam(&aggregated))
}

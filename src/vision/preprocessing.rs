// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the DenseNet121 classifier

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

/// Default square input size for DenseNet121
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// ImageNet normalization mean values
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet normalization std values
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize to `input_size` x `input_size`, ignoring aspect ratio
pub fn resize_for_model(image: &DynamicImage, input_size: u32) -> RgbImage {
    image
        .resize_exact(input_size, input_size, FilterType::Triangle)
        .to_rgb8()
}

/// Preprocess an image for the classifier
///
/// Steps:
/// 1. Resize to `input_size` x `input_size` (bilinear, aspect ratio not kept)
/// 2. Convert to RGB
/// 3. Normalize with ImageNet mean/std: (pixel/255 - mean) / std
/// 4. Convert to NCHW tensor format [1, 3, H, W]
pub fn preprocess_for_classifier(image: &DynamicImage, input_size: u32) -> Array4<f32> {
    let rgb = resize_for_model(image, input_size);
    rgb_to_tensor(&rgb)
}

/// Convert an RGB image into a normalized NCHW tensor
pub fn rgb_to_tensor(rgb: &RgbImage) -> Array4<f32> {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    tensor
}

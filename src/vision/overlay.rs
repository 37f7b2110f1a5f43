// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Grad-CAM heatmap rendering and PNG encoding

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::{Array2, Array3, Array4};
use std::io::Cursor;
use thiserror::Error;

/// Weight of the background image in the blend
pub const IMAGE_WEIGHT: f32 = 0.5;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Mask is {mask_h}x{mask_w} but image is {image_h}x{image_w}")]
    SizeMismatch {
        mask_h: usize,
        mask_w: usize,
        image_h: usize,
        image_w: usize,
    },

    #[error("Expected a [1, 3, H, W] tensor, got {0:?}")]
    InvalidTensor(Vec<usize>),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Jet colormap, `value` in [0, 1] -> RGB in [0, 1]
pub fn jet(value: f32) -> [f32; 3] {
    let v = value.clamp(0.0, 1.0);
    let channel = |offset: f32| (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Min-max rescale the normalized input tensor back to an HWC image in [0, 1]
pub fn tensor_to_unit_image(tensor: &Array4<f32>) -> Result<Array3<f32>, OverlayError> {
    let shape = tensor.shape();
    if shape[0] != 1 || shape[1] != 3 {
        return Err(OverlayError::InvalidTensor(shape.to_vec()));
    }
    let min = tensor.fold(f32::INFINITY, |acc, &v| acc.min(v));
    let max = tensor.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let range = max - min + 1e-8;

    let (h, w) = (shape[2], shape[3]);
    let mut image = Array3::zeros((h, w, 3));
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                image[[y, x, c]] = (tensor[[0, c, y, x]] - min) / range;
            }
        }
    }
    Ok(image)
}

/// Blend a jet-colored mask over the model input
///
/// The mask is quantized to u8 before coloring, the blend is
/// `0.5 * heatmap + 0.5 * image`, then divided by its maximum.
pub fn render_overlay(tensor: &Array4<f32>, mask: &Array2<f32>) -> Result<RgbImage, OverlayError> {
    let image = tensor_to_unit_image(tensor)?;
    let (h, w, _) = image.dim();
    let (mask_h, mask_w) = mask.dim();
    if (mask_h, mask_w) != (h, w) {
        return Err(OverlayError::SizeMismatch {
            mask_h,
            mask_w,
            image_h: h,
            image_w: w,
        });
    }

    let mut blended = Array3::zeros((h, w, 3));
    let mut peak = 0.0f32;
    for y in 0..h {
        for x in 0..w {
            let level = (255.0 * mask[[y, x]]).clamp(0.0, 255.0) as u8;
            let heat = jet(level as f32 / 255.0);
            for c in 0..3 {
                let value = (1.0 - IMAGE_WEIGHT) * heat[c] + IMAGE_WEIGHT * image[[y, x, c]];
                blended[[y, x, c]] = value;
                peak = peak.max(value);
            }
        }
    }

    let peak = if peak > 0.0 { peak } else { 1.0 };
    let mut out = RgbImage::new(w as u32, h as u32);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (yy, xx) = (y as usize, x as usize);
        *pixel = Rgb([
            to_u8(blended[[yy, xx, 0]] / peak),
            to_u8(blended[[yy, xx, 1]] / peak),
            to_u8(blended[[yy, xx, 2]] / peak),
        ]);
    }
    Ok(out)
}

fn to_u8(v: f32) -> u8 {
    (255.0 * v).clamp(0.0, 255.0) as u8
}

/// Black placeholder used when Grad-CAM cannot be computed
pub fn blank_overlay(size: u32) -> RgbImage {
    RgbImage::new(size, size)
}

/// Encode as PNG and base64 (no data URL prefix)
pub fn encode_png_base64(image: &RgbImage) -> Result<String, OverlayError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(STANDARD.encode(buffer.into_inner()))
}

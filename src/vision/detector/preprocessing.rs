// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the table detection model

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

/// Longest side of the model input
pub const DETR_MAX_SIZE: u32 = 800;

/// Mean values for normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Target dimensions after scaling the longer side to `max_size`
pub fn target_size(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_size, max_size);
    }

    let scale = max_size as f32 / width.max(height) as f32;
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    (new_w, new_h)
}

/// Preprocess an image for table detection
///
/// Steps:
/// 1. Resize so the longer side equals `DETR_MAX_SIZE`, preserving aspect ratio
/// 2. Convert to RGB
/// 3. Normalize with ImageNet mean/std: (pixel/255 - mean) / std
/// 4. Convert to NCHW tensor format [1, 3, H, W]
///
/// No padding is added, so predicted boxes normalised to the input map
/// directly onto the original image.
pub fn preprocess_for_detection(image: &DynamicImage) -> Array4<f32> {
    let (orig_w, orig_h) = image.dimensions();
    let (new_w, new_h) = target_size(orig_w, orig_h, DETR_MAX_SIZE);

    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut tensor = Array4::zeros((1, 3, new_h as usize, new_w as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let normalized = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            tensor[[0, c, y as usize, x as usize]] = normalized;
        }
    }

    tensor
}

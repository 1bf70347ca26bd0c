// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the handwriting encoder

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};
use ndarray::Array4;

/// Target size for the handwriting vision encoder
pub const HANDWRITING_INPUT_SIZE: u32 = 384;

/// Per-channel normalization mean
pub const MEAN: [f32; 3] = [0.5, 0.5, 0.5];

/// Per-channel normalization std
pub const STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Preprocess a cropped line for the handwriting encoder
///
/// Steps:
/// 1. Stretch to 384x384 (the encoder was trained on squashed lines)
/// 2. Replicate gray into three channels
/// 3. Normalize: (pixel/255 - mean) / std
/// 4. NCHW tensor [1, 3, 384, 384]
pub fn preprocess_for_handwriting(line: &GrayImage) -> Array4<f32> {
    let size = HANDWRITING_INPUT_SIZE;
    let resized = if line.width() == 0 || line.height() == 0 {
        GrayImage::from_pixel(size, size, Luma([255]))
    } else {
        DynamicImage::ImageLuma8(line.clone())
            .resize_exact(size, size, FilterType::Lanczos3)
            .to_luma8()
    };

    let n = size as usize;
    let mut tensor = Array4::zeros((1, 3, n, n));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let v = pixel[0] as f32 / 255.0;
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (v - MEAN[c]) / STD[c];
        }
    }

    tensor
}

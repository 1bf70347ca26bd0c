// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tensor preparation for the PaddleOCR detection and recognition models

use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, Rgb, RgbImage};
use ndarray::Array4;

/// Target size for PaddleOCR detection model
pub const OCR_INPUT_SIZE: u32 = 640;

/// Recognition model input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input
pub const REC_MAX_WIDTH: u32 = 320;

/// Narrowest recognition tensor; thinner crops are right-padded
pub const REC_MIN_WIDTH: u32 = 4;

/// Mean values for detection normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for detection normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Recognition normalization: (px/255 - 0.5) / 0.5, same for every channel
pub const REC_MEAN: f32 = 0.5;
pub const REC_STD: f32 = 0.5;

/// Letterbox a page to 640x640 and normalize it into an NCHW tensor
///
/// Grayscale input is replicated across the three channels the model
/// expects.
pub fn preprocess_for_detection(page: &GrayImage) -> (Array4<f32>, PreprocessInfo) {
    let image = DynamicImage::ImageLuma8(page.clone());
    let info = PreprocessInfo::new(&image, OCR_INPUT_SIZE);
    let resized = resize_with_padding(&image, OCR_INPUT_SIZE);

    let size = OCR_INPUT_SIZE as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));
    fill_normalized(&mut tensor, &resized);

    (tensor, info)
}

/// Resize a cropped text line to height 48 and normalize it to [-1, 1]
///
/// Width follows the aspect ratio up to REC_MAX_WIDTH. Lines narrower than
/// REC_MIN_WIDTH are right-padded with zeros instead of being stretched.
pub fn preprocess_for_recognition(line: &GrayImage) -> Array4<f32> {
    let (orig_w, orig_h) = line.dimensions();
    let orig_h = orig_h.max(1);

    let scale = REC_INPUT_HEIGHT as f32 / orig_h as f32;
    let resized_width = ((orig_w as f32 * scale).ceil() as u32).clamp(1, REC_MAX_WIDTH);
    let tensor_width = resized_width.max(REC_MIN_WIDTH);

    let resized = DynamicImage::ImageLuma8(line.clone())
        .resize_exact(resized_width, REC_INPUT_HEIGHT, FilterType::Lanczos3)
        .to_luma8();

    let mut tensor = Array4::zeros((1, 3, REC_INPUT_HEIGHT as usize, tensor_width as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let value = (pixel[0] as f32 / 255.0 - REC_MEAN) / REC_STD;
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = value;
        }
    }
    tensor
}

fn fill_normalized(tensor: &mut Array4<f32>, rgb: &RgbImage) {
    let (width, height) = rgb.dimensions();
    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x, y);
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
    }
}

/// Scale to fit `target_size` square, centered on a gray (128) canvas
pub fn resize_with_padding(image: &DynamicImage, target_size: u32) -> RgbImage {
    let (orig_w, orig_h) = image.dimensions();
    let mut output = RgbImage::from_pixel(target_size, target_size, Rgb([128, 128, 128]));

    if orig_w == 0 || orig_h == 0 {
        return output;
    }

    let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

    let rgb = image
        .resize_exact(new_w, new_h, FilterType::Lanczos3)
        .to_rgb8();

    let offset_x = (target_size - new_w) / 2;
    let offset_y = (target_size - new_h) / 2;
    image::imageops::replace(&mut output, &rgb, offset_x as i64, offset_y as i64);

    output
}

/// Scale and padding applied by `resize_with_padding`
///
/// Used to map detection boxes back into page coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl PreprocessInfo {
    pub fn new(image: &DynamicImage, target_size: u32) -> Self {
        let (orig_w, orig_h) = image.dimensions();

        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - new_w) / 2,
            offset_y: (target_size - new_h) / 2,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a point from model space back to the page, clamped to the page
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width as f32),
            orig_y.clamp(0.0, self.original_height as f32),
        )
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based scan analysis
//!
//! This module provides:
//! - Scan cleanup (denoise, contrast, binarization)
//! - Text detection and printed-text recognition via PaddleOCR
//! - Handwritten line recognition via an encoder/decoder model
//!
//! All models run on CPU only.

pub mod enhance;
pub mod handwriting;
pub mod image_utils;
pub mod model_manager;
pub mod ocr;

pub use enhance::{enhance, EnhancedImage};
pub use image_utils::{decode_image_bytes, detect_format, encode_png_base64, ImageError, ImageInfo};
pub use model_manager::{VisionModelConfig, VisionModelInfo, VisionModelManager};

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR API endpoint module
//!
//! Provides POST /ocr for cleaning up scans and reading their text.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::ocr_handler;
pub use request::{OcrMode, OcrQuery, UploadedImage};
pub use response::{LineResponse, OcrResponse};

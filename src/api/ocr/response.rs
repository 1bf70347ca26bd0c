// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::{Deserialize, Serialize};

use super::request::OcrMode;
use crate::vision::ocr::{RegionsResult, TextLine, TextResult};

/// Bounding box for a text line, in page pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognized line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineResponse {
    pub text: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    /// Recognizer that produced the text
    pub recognizer: String,
}

impl From<&TextLine> for LineResponse {
    fn from(line: &TextLine) -> Self {
        let b = &line.bounding_box;
        Self {
            text: line.text.clone(),
            confidence: line.confidence,
            bounding_box: BoundingBox {
                x: b.x.round().max(0.0) as u32,
                y: b.y.round().max(0.0) as u32,
                width: b.width.round().max(0.0) as u32,
                height: b.height.round().max(0.0) as u32,
            },
            recognizer: line.recognizer.to_string(),
        }
    }
}

/// Successful response from `POST /ocr`
///
/// Regions mode fills `image` and `regions`; text mode fills `text` and
/// `lines`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub success: bool,
    pub mode: OcrMode,
    /// Base64 PNG of the cleaned page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Number of text regions kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<usize>,
    /// Recognized lines joined with newlines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<LineResponse>>,
    pub processing_time_ms: u64,
}

impl OcrResponse {
    pub fn regions(result: RegionsResult) -> Self {
        Self {
            success: true,
            mode: OcrMode::Regions,
            image: Some(result.image_base64),
            regions: Some(result.regions),
            text: None,
            lines: None,
            processing_time_ms: result.processing_time_ms,
        }
    }

    pub fn text(result: TextResult) -> Self {
        Self {
            success: true,
            mode: OcrMode::Text,
            image: None,
            regions: None,
            lines: Some(result.lines.iter().map(LineResponse::from).collect()),
            text: Some(result.text),
            processing_time_ms: result.processing_time_ms,
        }
    }
}

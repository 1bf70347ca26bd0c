// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR integration for text extraction from scanned pages
//!
//! Components:
//! - `detection` - Text region detection (DB detector)
//! - `lines` - Grouping boxes into lines, padding and rendering
//! - `recognition` - Printed text recognition (CTC)
//! - `preprocessing` - Tensor preparation for both models
//! - `pipeline` - Per-request page processing

pub mod detection;
pub mod lines;
pub mod pipeline;
pub mod preprocessing;
pub mod recognition;

pub use detection::{OcrDetectionModel, TextBox, TextDetector};
pub use pipeline::{OcrError, OcrPipeline, PipelineSettings, RegionsResult, TextLine, TextResult};
pub use recognition::{LineRecognizer, OcrRecognitionModel, RecognizedText};

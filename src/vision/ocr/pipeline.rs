// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end page processing: cleanup, detection, and either region
//! rendering or line recognition

use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GrayImage};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::detection::{TextBox, TextDetector};
use super::lines::{crop, merge_into_lines, pad_box, render_regions, DEFAULT_HEIGHT_THS, DEFAULT_WIDTH_THS};
use super::recognition::{LineRecognizer, RecognizedText};
use crate::vision::enhance::{enhance, EnhancedImage};
use crate::vision::image_utils::{encode_png_base64, ImageError};

/// Errors from a pipeline run
#[derive(Debug, Error)]
pub enum OcrError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("No text recognizer loaded")]
    NoRecognizer,

    #[error("Text detection failed: {0}")]
    Detection(String),

    #[error("Text recognition failed: {0}")]
    Recognition(String),
}

/// Tunables for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Merged lines whose longer side is not above this many pixels are dropped
    pub min_size: f32,
    pub width_ths: f32,
    pub height_ths: f32,
    /// Pixels added on every side of a line before rendering or cropping
    pub region_padding: u32,
    /// Recognized lines below this confidence are dropped
    pub min_line_confidence: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_size: 10.0,
            width_ths: DEFAULT_WIDTH_THS,
            height_ths: DEFAULT_HEIGHT_THS,
            region_padding: 5,
            min_line_confidence: 0.3,
        }
    }
}

/// One recognized line of text
#[derive(Debug, Clone)]
pub struct TextLine {
    pub text: String,
    pub confidence: f32,
    /// Merged line box in page coordinates (before padding)
    pub bounding_box: TextBox,
    /// Name of the recognizer whose reading won
    pub recognizer: &'static str,
}

/// Output of `extract_regions`
#[derive(Debug, Clone)]
pub struct RegionsResult {
    /// PNG of the cleaned page, standard base64
    pub image_base64: String,
    /// Number of text lines kept on the page
    pub regions: usize,
    pub processing_time_ms: u64,
}

/// Output of `extract_text`
#[derive(Debug, Clone)]
pub struct TextResult {
    /// Lines joined with `\n` in reading order
    pub text: String,
    pub lines: Vec<TextLine>,
    pub processing_time_ms: u64,
}

/// Detector plus recognizers with their settings
#[derive(Clone)]
pub struct OcrPipeline {
    detector: Arc<dyn TextDetector>,
    recognizers: Vec<Arc<dyn LineRecognizer>>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for OcrPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrPipeline")
            .field("detector", &self.detector.name())
            .field(
                "recognizers",
                &self.recognizers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("settings", &self.settings)
            .finish()
    }
}

impl OcrPipeline {
    pub fn new(
        detector: Arc<dyn TextDetector>,
        recognizers: Vec<Arc<dyn LineRecognizer>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            detector,
            recognizers,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn has_recognizer(&self) -> bool {
        !self.recognizers.is_empty()
    }

    /// Clean the page and keep only the detected text lines
    pub fn extract_regions(&self, image: &DynamicImage) -> Result<RegionsResult, OcrError> {
        let start = Instant::now();

        let enhanced = enhance(image);
        let lines = self.detect_lines(&enhanced)?;

        let (width, height) = enhanced.binary.dimensions();
        let rects: Vec<_> = lines
            .iter()
            .map(|line| pad_box(line, self.settings.region_padding, width, height))
            .collect();

        let cleaned = render_regions(&enhanced.binary, &rects);
        let image_base64 = encode_png_base64(&cleaned)?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Region extraction: {} regions on {}x{} page in {}ms",
            lines.len(),
            width,
            height,
            processing_time_ms
        );

        Ok(RegionsResult {
            image_base64,
            regions: lines.len(),
            processing_time_ms,
        })
    }

    /// Recognize every detected line
    pub fn extract_text(&self, image: &DynamicImage) -> Result<TextResult, OcrError> {
        if self.recognizers.is_empty() {
            return Err(OcrError::NoRecognizer);
        }

        let start = Instant::now();

        let enhanced = enhance(image);
        let boxes = self.detect_lines(&enhanced)?;
        let (width, height) = enhanced.contrast.dimensions();

        let mut lines = Vec::new();
        for bounding_box in boxes {
            let rect = pad_box(&bounding_box, self.settings.region_padding, width, height);
            if rect.is_empty() {
                continue;
            }

            let crop = crop(&enhanced.contrast, rect);
            let (reading, recognizer) = self.best_reading(&crop)?;

            if reading.is_empty() {
                continue;
            }
            if reading.confidence < self.settings.min_line_confidence {
                debug!(
                    "Dropping line '{}' from {} (confidence {:.2})",
                    reading.text, recognizer, reading.confidence
                );
                continue;
            }

            lines.push(TextLine {
                text: reading.text,
                confidence: reading.confidence,
                bounding_box,
                recognizer,
            });
        }

        let text = lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Text extraction: {} lines, {} chars in {}ms",
            lines.len(),
            text.len(),
            processing_time_ms
        );

        Ok(TextResult {
            text,
            lines,
            processing_time_ms,
        })
    }

    fn detect_lines(&self, enhanced: &EnhancedImage) -> Result<Vec<TextBox>, OcrError> {
        let boxes = self
            .detector
            .detect(&enhanced.binary)
            .map_err(|e| OcrError::Detection(format!("{:#}", e)))?;

        let merged = merge_into_lines(&boxes, self.settings.width_ths, self.settings.height_ths);
        let merged_count = merged.len();
        let lines: Vec<TextBox> = merged
            .into_iter()
            .filter(|b| b.width.max(b.height) > self.settings.min_size)
            .collect();

        debug!(
            "{}: {} boxes detected, {} merged lines, {} above min size",
            self.detector.name(),
            boxes.len(),
            merged_count,
            lines.len()
        );

        Ok(lines)
    }

    /// Ask every recognizer and keep the most confident reading
    ///
    /// A failing recognizer is skipped as long as another one answers.
    fn best_reading(&self, line: &GrayImage) -> Result<(RecognizedText, &'static str), OcrError> {
        let mut best: Option<(RecognizedText, &'static str)> = None;
        let mut last_error = None;

        for recognizer in &self.recognizers {
            match recognizer.recognize_line(line) {
                Ok(reading) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |(current, _)| reading.confidence > current.confidence);
                    if better {
                        best = Some((reading, recognizer.name()));
                    }
                }
                Err(e) => {
                    warn!("Recognizer {} failed on line: {:#}", recognizer.name(), e);
                    last_error = Some(format!("{}: {:#}", recognizer.name(), e));
                }
            }
        }

        best.ok_or_else(|| OcrError::Recognition(last_error.unwrap_or_default()))
    }
}

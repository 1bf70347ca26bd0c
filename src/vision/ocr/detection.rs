// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text detection model
//!
//! Finds text regions on the cleaned page and returns axis-aligned boxes in
//! page coordinates.

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use ndarray::{ArrayViewD, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::{preprocess_for_detection, PreprocessInfo, OCR_INPUT_SIZE};

/// Expected input size for detection model
pub const DETECTION_INPUT_SIZE: u32 = OCR_INPUT_SIZE;

/// Default probability threshold for text pixels
pub const DEFAULT_TEXT_THRESHOLD: f32 = 0.2;

/// Components with fewer pixels than this are noise
pub const MIN_COMPONENT_PIXELS: usize = 10;

/// A detected text box in page coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Mean text probability over the component (0.0-1.0)
    pub confidence: f32,
}

impl TextBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.confidence > 0.0
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Anything that can locate text on a binarized page
#[cfg_attr(test, mockall::automock)]
pub trait TextDetector: Send + Sync {
    /// Model name reported by /health
    fn name(&self) -> &'static str;

    /// Detect text boxes, in page coordinates, on a binarized page
    fn detect(&self, page: &GrayImage) -> Result<Vec<TextBox>>;
}

/// PaddleOCR DB detection model (CPU-only)
#[derive(Clone)]
pub struct OcrDetectionModel {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
    confidence_threshold: f32,
}

impl std::fmt::Debug for OcrDetectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrDetectionModel")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

impl OcrDetectionModel {
    /// Load the detection model (det_model.onnx)
    ///
    /// # Errors
    /// Returns error if the file is missing or ONNX Runtime cannot load it.
    pub async fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!(
                "OCR detection model not found: {}",
                model_path.display()
            );
        }

        info!("Loading OCR detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load OCR detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "sigmoid_0.tmp_0".to_string());

        debug!(
            "Detection model loaded - input: {}, output: {}",
            input_name, output_name
        );

        info!("✅ OCR detection model loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            confidence_threshold: DEFAULT_TEXT_THRESHOLD,
        })
    }

    /// Set the text-pixel probability threshold
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    fn run(&self, page: &GrayImage) -> Result<Vec<TextBox>> {
        let (input, info) = preprocess_for_detection(page);

        let probability_map = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow!("Detection session lock poisoned"))?;

            let input_value =
                Value::from_array(input).context("Failed to create input tensor")?;

            let outputs = session
                .run(ort::inputs![&self.input_name => input_value])
                .context("Detection inference failed")?;

            outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?
                .to_owned()
        };

        debug!("Detection output shape: {:?}", probability_map.shape());

        let size = DETECTION_INPUT_SIZE as usize;
        let boxes = boxes_from_probability_map(
            probability_map.view(),
            size,
            size,
            self.confidence_threshold,
        )?;

        Ok(boxes
            .into_iter()
            .map(|b| to_page_coordinates(&b, &info))
            .filter(TextBox::is_valid)
            .collect())
    }
}

impl TextDetector for OcrDetectionModel {
    fn name(&self) -> &'static str {
        "paddleocr-det"
    }

    fn detect(&self, page: &GrayImage) -> Result<Vec<TextBox>> {
        self.run(page)
    }
}

/// Map a box from model space to page space via the letterbox info
pub fn to_page_coordinates(b: &TextBox, info: &PreprocessInfo) -> TextBox {
    let (x0, y0) = info.map_to_original(b.x, b.y);
    let (x1, y1) = info.map_to_original(b.right(), b.bottom());
    TextBox::new(x0, y0, x1 - x0, y1 - y0, b.confidence)
}

/// Threshold a DB probability map and turn connected components into boxes
///
/// The map is `[1, 1, H, W]` or `[1, H, W]`; boxes come back in input-tensor
/// coordinates, sorted top-to-bottom then left-to-right.
pub fn boxes_from_probability_map(
    output: ArrayViewD<f32>,
    input_height: usize,
    input_width: usize,
    threshold: f32,
) -> Result<Vec<TextBox>> {
    let shape = output.shape();
    let (prob_height, prob_width) = match shape.len() {
        4 => (shape[2], shape[3]),
        3 => (shape[1], shape[2]),
        _ => anyhow::bail!("Unexpected output shape: {:?}", shape),
    };

    if prob_height == 0 || prob_width == 0 {
        return Ok(Vec::new());
    }

    let is_4d = shape.len() == 4;
    let prob_at = |x: usize, y: usize| -> f32 {
        if is_4d {
            output[IxDyn(&[0, 0, y, x])]
        } else {
            output[IxDyn(&[0, y, x])]
        }
    };

    let scale_y = input_height as f32 / prob_height as f32;
    let scale_x = input_width as f32 / prob_width as f32;

    let mut visited = vec![false; prob_width * prob_height];
    let mut text_boxes = Vec::new();

    for y in 0..prob_height {
        for x in 0..prob_width {
            if visited[y * prob_width + x] || prob_at(x, y) < threshold {
                continue;
            }

            // Flood fill one 4-connected component
            let mut stack = vec![(x, y)];
            let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
            let mut count = 0usize;
            let mut sum_conf = 0.0f32;

            while let Some((cx, cy)) = stack.pop() {
                let idx = cy * prob_width + cx;
                if visited[idx] {
                    continue;
                }
                let prob = prob_at(cx, cy);
                if prob < threshold {
                    continue;
                }

                visited[idx] = true;
                count += 1;
                sum_conf += prob;
                min_x = min_x.min(cx);
                max_x = max_x.max(cx);
                min_y = min_y.min(cy);
                max_y = max_y.max(cy);

                if cx > 0 {
                    stack.push((cx - 1, cy));
                }
                if cx + 1 < prob_width {
                    stack.push((cx + 1, cy));
                }
                if cy > 0 {
                    stack.push((cx, cy - 1));
                }
                if cy + 1 < prob_height {
                    stack.push((cx, cy + 1));
                }
            }

            if count >= MIN_COMPONENT_PIXELS {
                text_boxes.push(TextBox::new(
                    min_x as f32 * scale_x,
                    min_y as f32 * scale_y,
                    (max_x - min_x + 1) as f32 * scale_x,
                    (max_y - min_y + 1) as f32 * scale_y,
                    sum_conf / count as f32,
                ));
            }
        }
    }

    sort_reading_order(&mut text_boxes);
    Ok(text_boxes)
}

/// Sort boxes top-to-bottom, then left-to-right
pub fn sort_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });
}

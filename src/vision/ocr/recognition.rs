// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text recognition model
//!
//! Reads the text of one cropped line with a CTC recognizer.

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use ndarray::{Array4, ArrayViewD, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::{preprocess_for_recognition, REC_INPUT_HEIGHT};

/// Recognition model input height (PP-OCR English model uses 48)
pub const RECOGNITION_INPUT_HEIGHT: u32 = REC_INPUT_HEIGHT;

/// CTC blank class index
pub const CTC_BLANK_INDEX: usize = 0;

/// Recognized text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    /// The recognized text content
    pub text: String,
    /// Overall confidence score (0.0-1.0)
    pub confidence: f32,
    /// Per-character confidences (if available)
    pub char_confidences: Vec<f32>,
}

impl RecognizedText {
    pub fn new(text: String, confidence: f32) -> Self {
        Self {
            text,
            confidence,
            char_confidences: Vec::new(),
        }
    }

    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Something that can read the text of a single cropped line
///
/// Implemented by the printed-text CTC model and the handwriting
/// encoder/decoder. Calls are blocking and may run on any thread.
#[cfg_attr(test, mockall::automock)]
pub trait LineRecognizer: Send + Sync {
    /// Stable identifier reported in logs and health output
    fn name(&self) -> &'static str;

    fn recognize_line(&self, line: &GrayImage) -> Result<RecognizedText>;
}

/// PaddleOCR text recognition model
///
/// Runs on CPU only.
#[derive(Clone)]
pub struct OcrRecognitionModel {
    session: Arc<Mutex<Session>>,
    /// Character table; class `i` maps to `dictionary[i - 1]`
    dictionary: Arc<Vec<char>>,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for OcrRecognitionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRecognitionModel")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

impl OcrRecognitionModel {
    /// Load the OCR recognition model from files
    ///
    /// # Arguments
    /// - `model_path`: Path to the ONNX model file (rec_model.onnx)
    /// - `dict_path`: Path to the character dictionary (ppocr_keys_v1.txt)
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - Dictionary file not found
    /// - ONNX Runtime initialization fails
    pub async fn new<P: AsRef<Path>>(model_path: P, dict_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let dict_path = dict_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("OCR recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!(
                "OCR character dictionary not found: {}",
                dict_path.display()
            );
        }

        info!(
            "Loading OCR recognition model from {}",
            model_path.display()
        );

        let dictionary = load_dictionary(dict_path)?;
        info!(
            "Loaded character dictionary with {} characters",
            dictionary.len()
        );

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
                "Failed to load OCR recognition model from {}",
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
            .unwrap_or_else(|| "softmax_0.tmp_0".to_string());

        debug!(
            "Recognition model loaded - input: {}, output: {}",
            input_name, output_name
        );

        info!("✅ OCR recognition model loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
            output_name,
        })
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    /// Recognize text from a preprocessed tensor of shape [1, 3, 48, W]
    pub fn recognize(&self, input: &Array4<f32>) -> Result<RecognizedText> {
        let shape = input.shape();
        if shape[0] != 1
            || shape[1] != 3
            || shape[2] != RECOGNITION_INPUT_HEIGHT as usize
            || shape[3] < 4
        {
            anyhow::bail!(
                "Invalid input shape: {:?}, expected [1, 3, {}, W>=4]",
                shape,
                RECOGNITION_INPUT_HEIGHT
            );
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Recognition session lock poisoned"))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Recognition inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        debug!("Recognition output shape: {:?}", output_tensor.shape());

        ctc_greedy_decode(output_tensor.view(), &self.dictionary)
    }
}

impl LineRecognizer for OcrRecognitionModel {
    fn name(&self) -> &'static str {
        "paddleocr-rec"
    }

    fn recognize_line(&self, line: &GrayImage) -> Result<RecognizedText> {
        let input = preprocess_for_recognition(line);
        self.recognize(&input)
    }
}

/// Load a character dictionary, one character per line
///
/// A trailing space class is appended when the file does not list one.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
    let file = File::open(path.as_ref()).context(format!(
        "Failed to open dictionary: {}",
        path.as_ref().display()
    ))?;

    let reader = BufReader::new(file);
    let mut dictionary = Vec::new();

    for line in reader.lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }

    if !dictionary.contains(&' ') {
        dictionary.push(' ');
    }

    Ok(dictionary)
}

/// Greedy (best path) CTC decoding
///
/// Accepts `[batch, seq_len, classes]` or `[seq_len, classes]` scores.
/// Repeats collapse unless separated by a blank.
pub fn ctc_greedy_decode(output: ArrayViewD<'_, f32>, dictionary: &[char]) -> Result<RecognizedText> {
    let shape = output.shape().to_vec();

    let (seq_len, num_classes) = match shape.len() {
        3 => (shape[1], shape[2]),
        2 => (shape[0], shape[1]),
        _ => anyhow::bail!("Unexpected output shape: {:?}", shape),
    };

    let mut text = String::new();
    let mut char_confidences = Vec::new();
    let mut prev_index: Option<usize> = None;

    for t in 0..seq_len {
        let mut max_prob = f32::NEG_INFINITY;
        let mut max_index = CTC_BLANK_INDEX;

        for c in 0..num_classes {
            let prob = if shape.len() == 3 {
                output[IxDyn(&[0, t, c])]
            } else {
                output[IxDyn(&[t, c])]
            };

            if prob > max_prob {
                max_prob = prob;
                max_index = c;
            }
        }

        if max_index != CTC_BLANK_INDEX && Some(max_index) != prev_index {
            if let Some(&ch) = dictionary.get(max_index - 1) {
                text.push(ch);
                char_confidences.push(max_prob);
            }
        }

        prev_index = (max_index != CTC_BLANK_INDEX).then_some(max_index);
    }

    let confidence = if char_confidences.is_empty() {
        0.0
    } else {
        let mean = char_confidences.iter().sum::<f32>() / char_confidences.len() as f32;
        mean.clamp(0.0, 1.0)
    };

    Ok(RecognizedText {
        text: text.trim().to_string(),
        confidence,
        char_confidences,
    })
}

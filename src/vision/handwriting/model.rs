// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handwriting line recognizer combining the encoder and decoder

use anyhow::{Context, Result};
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::decoder::HandwritingDecoder;
use super::encoder::HandwritingEncoder;
use super::preprocessing::preprocess_for_handwriting;
use crate::vision::ocr::{LineRecognizer, RecognizedText};

/// Encoder file names, in lookup order
pub const ENCODER_FILE_NAMES: &[&str] = &["encoder_model.onnx", "encoder.onnx"];

/// Decoder file names, in lookup order
pub const DECODER_FILE_NAMES: &[&str] = &["decoder_model.onnx", "decoder.onnx"];

/// Handwritten-line recognizer
///
/// Runs on CPU only.
#[derive(Clone)]
pub struct HandwritingModel {
    encoder: HandwritingEncoder,
    decoder: HandwritingDecoder,
    model_dir: String,
}

impl std::fmt::Debug for HandwritingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandwritingModel")
            .field("model_dir", &self.model_dir)
            .finish_non_exhaustive()
    }
}

impl HandwritingModel {
    /// Load the handwriting models from a directory
    ///
    /// Expected files:
    /// - encoder_model.onnx or encoder.onnx
    /// - decoder_model.onnx or decoder.onnx
    /// - tokenizer.json
    pub async fn new<P: AsRef<Path>>(model_dir: P) -> Result<Self> {
        let model_dir = model_dir.as_ref();

        if !model_dir.exists() {
            anyhow::bail!(
                "Handwriting model directory not found: {}",
                model_dir.display()
            );
        }

        info!("Loading handwriting models from {}", model_dir.display());

        let encoder_path = find_model_file(model_dir, ENCODER_FILE_NAMES)?;
        let decoder_path = find_model_file(model_dir, DECODER_FILE_NAMES)?;
        let tokenizer_path = model_dir.join("tokenizer.json");

        let encoder = HandwritingEncoder::new(&encoder_path)
            .await
            .context("Failed to load handwriting encoder")?;

        let decoder = HandwritingDecoder::new(&decoder_path, &tokenizer_path)
            .await
            .context("Failed to load handwriting decoder")?;

        info!("✅ Handwriting recognizer ready (CPU-only)");

        Ok(Self {
            encoder,
            decoder,
            model_dir: model_dir.to_string_lossy().to_string(),
        })
    }

    /// Limit generated tokens per line
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.decoder = self.decoder.with_max_tokens(max_tokens);
        self
    }

    /// Read one cropped line
    pub fn read_line(&self, line: &GrayImage) -> Result<RecognizedText> {
        let start = Instant::now();

        let input = preprocess_for_handwriting(line);
        let hidden_states = self
            .encoder
            .encode(&input)
            .context("Failed to encode line image")?;
        let reading = self
            .decoder
            .generate(&hidden_states)
            .context("Failed to decode line text")?;

        debug!(
            "Handwriting line {}x{} -> '{}' in {}ms",
            line.width(),
            line.height(),
            reading.text,
            start.elapsed().as_millis()
        );

        Ok(reading)
    }
}

impl LineRecognizer for HandwritingModel {
    fn name(&self) -> &'static str {
        "trocr-handwritten"
    }

    fn recognize_line(&self, line: &GrayImage) -> Result<RecognizedText> {
        self.read_line(line)
    }
}

/// Find a model file by trying multiple possible names
pub fn find_model_file(dir: &Path, names: &[&str]) -> Result<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Model file not found in {}. Tried: {:?}",
                dir.display(),
                names
            )
        })
}

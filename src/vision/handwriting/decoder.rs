// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handwriting text decoder
//!
//! Autoregressive greedy decoding over the encoder's hidden states.

use anyhow::{anyhow, Context, Result};
use ndarray::{Array2, Array3, ArrayViewD, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::vision::ocr::RecognizedText;

/// Default maximum tokens to generate for one line
pub const DEFAULT_MAX_TOKENS: usize = 64;

/// Minimum tokens to generate
pub const MIN_TOKENS: usize = 4;

/// Maximum tokens to generate
pub const MAX_TOKENS: usize = 256;

/// Handwriting text decoder
///
/// Runs on CPU only.
#[derive(Clone)]
pub struct HandwritingDecoder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    max_tokens: usize,
    vocab_size: usize,
    /// Token the decoder is primed with
    start_token_id: u32,
    eos_token_id: u32,
}

impl std::fmt::Debug for HandwritingDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandwritingDecoder")
            .field("max_tokens", &self.max_tokens)
            .field("vocab_size", &self.vocab_size)
            .field("start_token_id", &self.start_token_id)
            .field("eos_token_id", &self.eos_token_id)
            .finish_non_exhaustive()
    }
}

impl HandwritingDecoder {
    /// Load the decoder from files
    ///
    /// # Arguments
    /// - `model_path`: Path to the ONNX model file (decoder_model.onnx)
    /// - `tokenizer_path`: Path to the tokenizer file (tokenizer.json)
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - Tokenizer file not found
    /// - ONNX Runtime initialization fails
    pub async fn new<P: AsRef<Path>>(model_path: P, tokenizer_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!(
                "Handwriting decoder model not found: {}",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Handwriting tokenizer not found: {}",
                tokenizer_path.display()
            );
        }

        info!("Loading handwriting decoder from {}", model_path.display());

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let vocab_size = tokenizer.get_vocab_size(true);
        info!("Loaded tokenizer with {} tokens", vocab_size);

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
                "Failed to load handwriting decoder model from {}",
                model_path.display()
            ))?;

        let input_names: Vec<_> = session.inputs.iter().map(|i| &i.name).collect();
        debug!("Decoder inputs: {:?}", input_names);

        // The decoder is primed with `</s>`, which also ends the sequence
        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("[SEP]"))
            .unwrap_or(2);
        let start_token_id = eos_token_id;

        debug!(
            "Special tokens - start: {}, EOS: {}",
            start_token_id, eos_token_id
        );

        info!("✅ Handwriting decoder loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            max_tokens: DEFAULT_MAX_TOKENS,
            vocab_size,
            start_token_id,
            eos_token_id,
        })
    }

    /// Set the maximum tokens to generate
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.clamp(MIN_TOKENS, MAX_TOKENS);
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Generate the text of one line from encoder hidden states
    ///
    /// Stops at EOS or after `max_tokens`. Confidence is the mean softmax
    /// probability of every chosen token, EOS included.
    pub fn generate(&self, encoder_hidden_states: &Array3<f32>) -> Result<RecognizedText> {
        let mut tokens = vec![self.start_token_id];
        let mut token_probs = Vec::new();

        for step in 0..self.max_tokens {
            let logits = self.forward(encoder_hidden_states, &tokens)?;
            let (next_token, prob) =
                softmax_argmax(&logits).ok_or_else(|| anyhow!("Decoder returned empty logits"))?;

            token_probs.push(prob);

            if next_token == self.eos_token_id {
                debug!("Generation stopped at EOS after {} steps", step + 1);
                break;
            }

            tokens.push(next_token);
        }

        let text = self
            .tokenizer
            .decode(&tokens[1..], true)
            .map_err(|e| anyhow!("Decoding failed: {}", e))?
            .trim()
            .to_string();

        let confidence = if token_probs.is_empty() {
            0.0
        } else {
            token_probs.iter().sum::<f32>() / token_probs.len() as f32
        };

        debug!(
            "Generated {} tokens: '{}' (confidence {:.2})",
            tokens.len() - 1,
            text,
            confidence
        );

        Ok(RecognizedText {
            text,
            confidence,
            char_confidences: token_probs,
        })
    }

    /// Run a single forward pass and return logits for the last position
    fn forward(&self, encoder_hidden_states: &Array3<f32>, input_ids: &[u32]) -> Result<Vec<f32>> {
        let ids: Vec<i64> = input_ids.iter().map(|&t| t as i64).collect();
        let input_ids_array = Array2::from_shape_vec((1, ids.len()), ids)
            .context("Failed to shape input IDs")?;

        let input_ids_value =
            Value::from_array(input_ids_array).context("Failed to create input IDs tensor")?;
        let encoder_value = Value::from_array(encoder_hidden_states.to_owned())
            .context("Failed to create encoder hidden states tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Decoder session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_value,
                "encoder_hidden_states" => encoder_value
            ])
            .context("Decoder inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        last_position_logits(output_tensor.view())
    }
}

/// Logits of the last sequence position from `[batch, seq, vocab]` or `[seq, vocab]`
pub fn last_position_logits(output: ArrayViewD<'_, f32>) -> Result<Vec<f32>> {
    let shape = output.shape();

    let (last_pos, vocab_size) = match shape.len() {
        3 if shape[1] > 0 => (shape[1] - 1, shape[2]),
        2 if shape[0] > 0 => (shape[0] - 1, shape[1]),
        _ => anyhow::bail!("Unexpected decoder output shape: {:?}", shape),
    };

    let logits = (0..vocab_size)
        .map(|v| {
            if shape.len() == 3 {
                output[IxDyn(&[0, last_pos, v])]
            } else {
                output[IxDyn(&[last_pos, v])]
            }
        })
        .collect();

    Ok(logits)
}

/// Greedy pick: index of the largest logit and its softmax probability
pub fn softmax_argmax(logits: &[f32]) -> Option<(u32, f32)> {
    let (max_idx, &max_logit) = logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;

    let denom: f32 = logits.iter().map(|&l| (l - max_logit).exp()).sum();
    let prob = if denom > 0.0 { 1.0 / denom } else { 0.0 };

    Some((max_idx as u32, prob))
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handwriting vision encoder
//!
//! Turns a preprocessed line image into the hidden states the decoder
//! attends over.

use anyhow::{anyhow, Context, Result};
use ndarray::{Array3, Array4, ArrayViewD, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::HANDWRITING_INPUT_SIZE;

/// Expected input size for the encoder
pub const ENCODER_INPUT_SIZE: u32 = HANDWRITING_INPUT_SIZE;

/// Handwriting vision encoder model
///
/// Runs on CPU only.
#[derive(Clone)]
pub struct HandwritingEncoder {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for HandwritingEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandwritingEncoder")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

impl HandwritingEncoder {
    /// Load the encoder from a file (encoder_model.onnx)
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub async fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!(
                "Handwriting encoder model not found: {}",
                model_path.display()
            );
        }

        info!(
            "Loading handwriting encoder from {}",
            model_path.display()
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
                "Failed to load handwriting encoder model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "last_hidden_state".to_string());

        debug!(
            "Handwriting encoder loaded - input: {}, output: {}",
            input_name, output_name
        );

        info!("✅ Handwriting encoder loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
        })
    }

    /// Encode a [1, 3, 384, 384] tensor into hidden states [1, seq_len, dim]
    pub fn encode(&self, input: &Array4<f32>) -> Result<Array3<f32>> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        if shape[2] != ENCODER_INPUT_SIZE as usize || shape[3] != ENCODER_INPUT_SIZE as usize {
            debug!(
                "Input size {}x{} differs from expected {}x{}",
                shape[2], shape[3], ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE
            );
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Encoder session lock poisoned"))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Encoder inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        debug!("Encoder output shape: {:?}", output_tensor.shape());

        hidden_states_from_output(output_tensor.view())
    }
}

/// Normalize encoder output to [1, seq_len, dim]
///
/// Accepts `[batch, seq, dim]` (first batch is used) or `[seq, dim]`.
pub fn hidden_states_from_output(output: ArrayViewD<'_, f32>) -> Result<Array3<f32>> {
    match output.ndim() {
        3 => {
            let states = output
                .into_dimensionality::<Ix3>()
                .context("Encoder output is not three-dimensional")?;
            let (_, seq_len, dim) = states.dim();
            let first = states.slice(ndarray::s![0..1, .., ..]).to_owned();
            debug!("Parsed encoder output: {} positions x {} dims", seq_len, dim);
            Ok(first)
        }
        2 => {
            let shape = output.shape().to_vec();
            let states = output
                .to_owned()
                .into_shape_with_order((1, shape[0], shape[1]))
                .context("Failed to reshape encoder output")?;
            Ok(states)
        }
        _ => anyhow::bail!("Unexpected encoder output shape: {:?}", output.shape()),
    }
}

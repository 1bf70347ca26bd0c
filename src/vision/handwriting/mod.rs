// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handwriting recognition for cropped text lines
//!
//! Components:
//! - `encoder` - Vision encoder producing hidden states
//! - `decoder` - Autoregressive text decoder
//! - `model` - Combined recognizer
//! - `preprocessing` - Line image preparation

pub mod decoder;
pub mod encoder;
pub mod model;
pub mod preprocessing;

pub use decoder::HandwritingDecoder;
pub use encoder::HandwritingEncoder;
pub use model::HandwritingModel;

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision model manager for loading the OCR and handwriting models

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::vision::handwriting::HandwritingModel;
use crate::vision::ocr::detection::DEFAULT_TEXT_THRESHOLD;
use crate::vision::ocr::{
    LineRecognizer, OcrDetectionModel, OcrPipeline, OcrRecognitionModel, PipelineSettings,
    TextDetector,
};

/// Configuration for loading vision models
#[derive(Debug, Clone)]
pub struct VisionModelConfig {
    /// PaddleOCR directory (det_model.onnx, rec_model.onnx, ppocr_keys_v1.txt)
    pub ocr_model_dir: Option<String>,
    /// Handwriting directory (encoder, decoder, tokenizer.json)
    pub handwriting_model_dir: Option<String>,
    /// Detection probability threshold
    pub text_threshold: f32,
}

impl Default for VisionModelConfig {
    fn default() -> Self {
        Self {
            ocr_model_dir: Some("./models/paddleocr-onnx".to_string()),
            handwriting_model_dir: Some("./models/trocr-handwritten-onnx".to_string()),
            text_threshold: DEFAULT_TEXT_THRESHOLD,
        }
    }
}

/// Information about a vision model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionModelInfo {
    pub name: String,
    /// detection or recognition
    pub model_type: String,
    pub available: bool,
}

impl VisionModelInfo {
    fn new(name: &str, model_type: &str, available: bool) -> Self {
        Self {
            name: name.to_string(),
            model_type: model_type.to_string(),
            available,
        }
    }
}

/// Holds the loaded detector and recognizers
///
/// Missing models are logged and skipped; the node still starts.
pub struct VisionModelManager {
    detector: Option<Arc<dyn TextDetector>>,
    recognizers: Vec<Arc<dyn LineRecognizer>>,
    models: Vec<VisionModelInfo>,
}

impl std::fmt::Debug for VisionModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionModelManager")
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

impl VisionModelManager {
    /// Load every model whose files are present
    pub async fn new(config: VisionModelConfig) -> anyhow::Result<Self> {
        let mut detector: Option<Arc<dyn TextDetector>> = None;
        let mut recognizers: Vec<Arc<dyn LineRecognizer>> = Vec::new();
        let mut printed_loaded = false;
        let mut handwriting_loaded = false;

        if let Some(ref dir) = config.ocr_model_dir {
            let dir = Path::new(dir);

            match OcrDetectionModel::new(dir.join("det_model.onnx")).await {
                Ok(model) => {
                    let model = model.with_confidence_threshold(config.text_threshold);
                    tracing::info!("✅ OCR detection model loaded from {}", dir.display());
                    detector = Some(Arc::new(model));
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Failed to load OCR detection model from {}: {:#}",
                        dir.display(),
                        e
                    );
                }
            }

            match OcrRecognitionModel::new(dir.join("rec_model.onnx"), dir.join("ppocr_keys_v1.txt"))
                .await
            {
                Ok(model) => {
                    tracing::info!("✅ OCR recognition model loaded from {}", dir.display());
                    recognizers.push(Arc::new(model));
                    printed_loaded = true;
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Failed to load OCR recognition model from {}: {:#}",
                        dir.display(),
                        e
                    );
                }
            }
        }

        if let Some(ref dir) = config.handwriting_model_dir {
            match HandwritingModel::new(dir).await {
                Ok(model) => {
                    tracing::info!("✅ Handwriting model loaded from {}", dir);
                    recognizers.push(Arc::new(model));
                    handwriting_loaded = true;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to load handwriting model from {}: {:#}", dir, e);
                }
            }
        }

        let models = vec![
            VisionModelInfo::new("paddleocr-det", "detection", detector.is_some()),
            VisionModelInfo::new("paddleocr-rec", "recognition", printed_loaded),
            VisionModelInfo::new("trocr-handwritten", "recognition", handwriting_loaded),
        ];

        Ok(Self {
            detector,
            recognizers,
            models,
        })
    }

    /// Build a manager from already-constructed parts
    pub fn from_parts(
        detector: Option<Arc<dyn TextDetector>>,
        recognizers: Vec<Arc<dyn LineRecognizer>>,
    ) -> Self {
        let mut models = Vec::new();
        if let Some(ref d) = detector {
            models.push(VisionModelInfo::new(d.name(), "detection", true));
        }
        for r in &recognizers {
            models.push(VisionModelInfo::new(r.name(), "recognition", true));
        }

        Self {
            detector,
            recognizers,
            models,
        }
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn has_recognizer(&self) -> bool {
        !self.recognizers.is_empty()
    }

    /// Pipeline over the loaded models, or None without a detector
    pub fn pipeline(&self, settings: PipelineSettings) -> Option<OcrPipeline> {
        let detector = self.detector.clone()?;
        Some(OcrPipeline::new(detector, self.recognizers.clone(), settings))
    }

    /// List all known vision models and whether they loaded
    pub fn list_models(&self) -> Vec<VisionModelInfo> {
        self.models.clone()
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Vision model manager tests
//!
//! Loading is best-effort: missing or broken model directories must leave
//! the manager usable and report the model as unavailable.

use fabstir_ocr_node::vision::{
    ocr::PipelineSettings, VisionModelConfig, VisionModelInfo, VisionModelManager,
};
use std::fs;
use tempfile::tempdir;

// Model paths (downloaded by the model scripts)
const OCR_MODEL_DIR: &str = "./models/paddleocr-onnx";
const HANDWRITING_MODEL_DIR: &str = "./models/trocr-handwritten-onnx";

#[cfg(test)]
mod model_manager_tests {
    use super::*;

    #[test]
    fn test_default_config_has_expected_paths() {
        let config = VisionModelConfig::default();

        assert!(config.ocr_model_dir.as_ref().unwrap().contains("paddleocr"));
        assert!(config
            .handwriting_model_dir
            .as_ref()
            .unwrap()
            .contains("trocr"));
    }

    #[tokio::test]
    async fn test_empty_directories_load_nothing() {
        let ocr_dir = tempdir().unwrap();
        let hw_dir = tempdir().unwrap();

        let config = VisionModelConfig {
            ocr_model_dir: Some(ocr_dir.path().to_string_lossy().to_string()),
            handwriting_model_dir: Some(hw_dir.path().to_string_lossy().to_string()),
            text_threshold: 0.2,
        };
        let manager = VisionModelManager::new(config).await.unwrap();

        assert!(!manager.has_detector());
        assert!(!manager.has_recognizer());
        assert!(manager.pipeline(PipelineSettings::default()).is_none());

        let names: Vec<String> = manager.list_models().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["paddleocr-det", "paddleocr-rec", "trocr-handwritten"]);
    }

    #[tokio::test]
    async fn test_corrupt_model_file_is_skipped() {
        let ocr_dir = tempdir().unwrap();
        fs::write(ocr_dir.path().join("det_model.onnx"), b"not an onnx graph").unwrap();

        let config = VisionModelConfig {
            ocr_model_dir: Some(ocr_dir.path().to_string_lossy().to_string()),
            handwriting_model_dir: None,
            text_threshold: 0.2,
        };
        let manager = VisionModelManager::new(config).await.unwrap();

        assert!(!manager.has_detector());
        assert!(!manager.list_models()[0].available);
    }

    #[tokio::test]
    #[ignore] // Requires downloaded models
    async fn test_real_models_load() {
        let config = VisionModelConfig {
            ocr_model_dir: Some(OCR_MODEL_DIR.to_string()),
            handwriting_model_dir: Some(HANDWRITING_MODEL_DIR.to_string()),
            text_threshold: 0.2,
        };
        let manager = VisionModelManager::new(config).await.unwrap();

        assert!(manager.has_detector());
        assert!(manager.has_recognizer());
        assert!(manager
            .list_models()
            .iter()
            .all(|m: &VisionModelInfo| m.available));
    }
}

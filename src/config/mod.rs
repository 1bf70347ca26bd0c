// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration from command-line flags and environment variables

use std::net::{IpAddr, SocketAddr};

use clap::Parser;

use crate::api::{ApiSettings, OcrMode};
use crate::vision::ocr::PipelineSettings;
use crate::vision::VisionModelConfig;

/// Fabstir OCR Node
#[derive(Parser, Debug, Clone)]
#[command(name = "fabstir-ocr-node")]
#[command(version)]
#[command(about = "HTTP node that cleans up scans and reads their text", long_about = None)]
pub struct ServiceConfig {
    /// Address to bind the API server to
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// API server port
    #[arg(long, env = "API_PORT", default_value_t = 5001)]
    pub port: u16,

    /// Allowed CORS origins (comma separated, `*` for any)
    #[arg(
        long,
        env = "CORS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:8010"
    )]
    pub cors_origins: Vec<String>,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// PaddleOCR model directory (empty to skip)
    #[arg(long, env = "OCR_MODEL_PATH", default_value = "./models/paddleocr-onnx")]
    pub ocr_model_path: String,

    /// Handwriting model directory (empty to skip)
    #[arg(
        long,
        env = "HANDWRITING_MODEL_PATH",
        default_value = "./models/trocr-handwritten-onnx"
    )]
    pub handwriting_model_path: String,

    /// Mode used when a request does not pass `?mode=`
    #[arg(long, env = "OCR_DEFAULT_MODE", default_value = "regions", value_parser = parse_mode)]
    pub default_mode: OcrMode,

    /// Text-pixel probability threshold for detection
    #[arg(long, env = "OCR_TEXT_THRESHOLD", default_value_t = 0.2)]
    pub text_threshold: f32,

    /// Text lines are kept when their longer side exceeds this many pixels
    #[arg(long, env = "OCR_MIN_SIZE", default_value_t = 10.0)]
    pub min_size: f32,

    /// Padding added around each text line, in pixels
    #[arg(long, env = "OCR_REGION_PADDING", default_value_t = 5)]
    pub region_padding: u32,

    /// Recognized lines below this confidence are dropped
    #[arg(long, env = "OCR_MIN_LINE_CONFIDENCE", default_value_t = 0.3)]
    pub min_line_confidence: f32,
}

fn parse_mode(s: &str) -> Result<OcrMode, String> {
    s.parse::<OcrMode>().map_err(|e| e.to_string())
}

fn non_empty(path: &str) -> Option<String> {
    let path = path.trim();
    (!path.is_empty()).then(|| path.to_string())
}

impl ServiceConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn vision_model_config(&self) -> VisionModelConfig {
        VisionModelConfig {
            ocr_model_dir: non_empty(&self.ocr_model_path),
            handwriting_model_dir: non_empty(&self.handwriting_model_path),
            text_threshold: self.text_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            min_size: self.min_size.max(0.0),
            region_padding: self.region_padding,
            min_line_confidence: self.min_line_confidence.clamp(0.0, 1.0),
            ..PipelineSettings::default()
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            default_mode: self.default_mode,
            max_upload_bytes: self.max_upload_bytes,
            cors_origins: self
                .cors_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            pipeline: self.pipeline_settings(),
        }
    }
}

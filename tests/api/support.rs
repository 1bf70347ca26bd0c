// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared helpers for the HTTP tests: a fixed-output detector and
//! recognizer, test pages, and a hand-built multipart body.

use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use fabstir_ocr_node::{
    api::{create_router, ApiSettings, AppState},
    vision::{
        ocr::{LineRecognizer, RecognizedText, TextBox, TextDetector},
        VisionModelManager,
    },
};
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BOUNDARY: &str = "fabstir-test-boundary";

pub const PAGE_WIDTH: u32 = 200;
pub const PAGE_HEIGHT: u32 = 100;

/// Detector that always reports the two text rows drawn by `test_page_png`
pub struct FixedDetector;

impl TextDetector for FixedDetector {
    fn name(&self) -> &'static str {
        "fixed-det"
    }

    fn detect(&self, _page: &GrayImage) -> Result<Vec<TextBox>> {
        Ok(vec![
            TextBox::new(20.0, 20.0, 160.0, 12.0, 0.9),
            TextBox::new(20.0, 60.0, 160.0, 12.0, 0.9),
        ])
    }
}

/// Detector that fails every call
pub struct BrokenDetector;

impl TextDetector for BrokenDetector {
    fn name(&self) -> &'static str {
        "broken-det"
    }

    fn detect(&self, _page: &GrayImage) -> Result<Vec<TextBox>> {
        Err(anyhow!("session exploded"))
    }
}

/// Recognizer that answers "line 1", "line 2", ... in call order
#[derive(Default)]
pub struct CountingRecognizer {
    calls: AtomicUsize,
}

impl LineRecognizer for CountingRecognizer {
    fn name(&self) -> &'static str {
        "counting-rec"
    }

    fn recognize_line(&self, _line: &GrayImage) -> Result<RecognizedText> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RecognizedText::new(format!("line {}", n), 0.9))
    }
}

pub fn settings() -> ApiSettings {
    ApiSettings::default()
}

pub fn router_with(
    detector: Option<Arc<dyn TextDetector>>,
    recognizers: Vec<Arc<dyn LineRecognizer>>,
    settings: ApiSettings,
) -> Router {
    let manager = VisionModelManager::from_parts(detector, recognizers);
    create_router(AppState::new(manager, settings))
}

/// Router with the fixed detector and a counting recognizer
pub fn full_router() -> Router {
    router_with(
        Some(Arc::new(FixedDetector)),
        vec![Arc::new(CountingRecognizer::default())],
        settings(),
    )
}

/// White page with two dark text-like bars, encoded as PNG
pub fn test_page_png() -> Vec<u8> {
    let mut page = GrayImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, Luma([255]));
    for y in (20..32).chain(60..72) {
        for x in 20..180 {
            page.put_pixel(x, y, Luma([20]));
        }
    }

    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(page)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Multipart body with a single field
pub fn multipart_body(field_name: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field_name, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Multipart body with one text field and no file
pub fn multipart_text_only(field_name: &str, value: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{v}\r\n--{b}--\r\n",
        b = BOUNDARY,
        n = field_name,
        v = value
    )
    .into_bytes()
}

pub fn ocr_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

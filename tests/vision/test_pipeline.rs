// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OCR pipeline tests over the real cleanup chain
//!
//! The detector here scans the binarized page for dark rows, so these tests
//! check that enhancement, line merging, cropping and rendering fit together
//! without ONNX models. Tests that need the downloaded models are ignored.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fabstir_ocr_node::vision::{
    enhance,
    ocr::{
        LineRecognizer, OcrDetectionModel, OcrPipeline, PipelineSettings, RecognizedText,
        TextBox, TextDetector,
    },
};
use image::{DynamicImage, GrayImage, Luma};
use std::sync::{Arc, Mutex};

const OCR_MODEL_DIR: &str = "./models/paddleocr-onnx";

/// Reports one box per run of rows that contain black pixels
struct RowScanDetector;

impl TextDetector for RowScanDetector {
    fn name(&self) -> &'static str {
        "row-scan"
    }

    fn detect(&self, page: &GrayImage) -> Result<Vec<TextBox>> {
        let (width, height) = page.dimensions();
        let mut boxes = Vec::new();
        let mut run: Option<(u32, u32, u32)> = None; // (top, min_x, max_x)

        for y in 0..=height {
            let dark: Vec<u32> = if y < height {
                (0..width).filter(|&x| page.get_pixel(x, y)[0] == 0).collect()
            } else {
                Vec::new()
            };

            match (dark.first(), dark.last(), run) {
                (Some(&first), Some(&last), None) => run = Some((y, first, last)),
                (Some(&first), Some(&last), Some((top, min_x, max_x))) => {
                    run = Some((top, min_x.min(first), max_x.max(last)))
                }
                (None, _, Some((top, min_x, max_x))) => {
                    boxes.push(TextBox::new(
                        min_x as f32,
                        top as f32,
                        (max_x - min_x + 1) as f32,
                        (y - top) as f32,
                        0.9,
                    ));
                    run = None;
                }
                _ => {}
            }
        }

        Ok(boxes)
    }
}

/// Records the size of every crop and answers with its index
#[derive(Default)]
struct RecordingRecognizer {
    crops: Mutex<Vec<(u32, u32)>>,
}

impl LineRecognizer for RecordingRecognizer {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn recognize_line(&self, line: &GrayImage) -> Result<RecognizedText> {
        let mut crops = self.crops.lock().unwrap();
        crops.push(line.dimensions());
        Ok(RecognizedText::new(format!("row {}", crops.len()), 0.8))
    }
}

/// 300x160 page: two dark bars, one faint speck too small to be text
fn test_page() -> DynamicImage {
    let mut page = GrayImage::from_pixel(300, 160, Luma([250]));
    for y in (30..46).chain(90..106) {
        for x in 40..260 {
            page.put_pixel(x, y, Luma([15]));
        }
    }
    for y in 140..144 {
        for x in 10..14 {
            page.put_pixel(x, y, Luma([15]));
        }
    }
    DynamicImage::ImageLuma8(page)
}

#[test]
fn test_enhance_binarizes_text_bars() {
    let enhanced = enhance(&test_page());

    assert_eq!(enhanced.binary.dimensions(), (300, 160));
    assert_eq!(enhanced.binary.get_pixel(150, 38)[0], 0);
    assert_eq!(enhanced.binary.get_pixel(150, 70)[0], 255);
    assert!(enhanced.binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
}

#[test]
fn test_regions_keep_text_and_whiten_the_rest() {
    let pipeline = OcrPipeline::new(
        Arc::new(RowScanDetector),
        vec![],
        PipelineSettings::default(),
    );

    let result = pipeline.extract_regions(&test_page()).unwrap();
    assert_eq!(result.regions, 2);

    let png = STANDARD.decode(&result.image_base64).unwrap();
    let cleaned = image::load_from_memory(&png).unwrap().to_luma8();

    assert_eq!(cleaned.dimensions(), (300, 160));
    assert_eq!(cleaned.get_pixel(150, 38)[0], 0);
    assert_eq!(cleaned.get_pixel(150, 98)[0], 0);
    // The speck is below the minimum box size
    assert_eq!(cleaned.get_pixel(11, 141)[0], 255);
    assert_eq!(cleaned.get_pixel(150, 70)[0], 255);
}

#[test]
fn test_text_reads_lines_in_order_with_padded_crops() {
    let recognizer = Arc::new(RecordingRecognizer::default());
    let pipeline = OcrPipeline::new(
        Arc::new(RowScanDetector),
        vec![recognizer.clone()],
        PipelineSettings::default(),
    );

    let result = pipeline.extract_text(&test_page()).unwrap();

    assert_eq!(result.text, "row 1\nrow 2");
    assert_eq!(result.lines.len(), 2);
    assert!(result.lines[0].bounding_box.y < result.lines[1].bounding_box.y);
    assert!(result.lines.iter().all(|l| l.recognizer == "recording"));

    let crops = recognizer.crops.lock().unwrap();
    assert_eq!(crops.len(), 2);
    for &(w, h) in crops.iter() {
        // Bar plus padding on each side
        assert!((220..=230).contains(&w), "crop width {}", w);
        assert!((16..=26).contains(&h), "crop height {}", h);
    }
}

#[test]
fn test_blank_page_has_no_regions() {
    let pipeline = OcrPipeline::new(
        Arc::new(RowScanDetector),
        vec![Arc::new(RecordingRecognizer::default())],
        PipelineSettings::default(),
    );
    let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(120, 80, Luma([255])));

    let regions = pipeline.extract_regions(&blank).unwrap();
    assert_eq!(regions.regions, 0);

    let text = pipeline.extract_text(&blank).unwrap();
    assert!(text.text.is_empty());
    assert!(text.lines.is_empty());
}

#[tokio::test]
#[ignore] // Requires the PaddleOCR detection model
async fn test_real_detector_finds_bars() {
    let detector = OcrDetectionModel::new(format!("{}/det_model.onnx", OCR_MODEL_DIR))
        .await
        .expect("Failed to load detection model");
    let pipeline = OcrPipeline::new(Arc::new(detector), vec![], PipelineSettings::default());

    let result = pipeline.extract_regions(&test_page()).unwrap();
    assert!(result.regions >= 1);
}

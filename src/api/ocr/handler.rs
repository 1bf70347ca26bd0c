// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use axum_extra::extract::{multipart::MultipartRejection, Multipart};
use tracing::{debug, info, warn};

use super::request::{OcrMode, OcrQuery, UploadedImage};
use super::response::OcrResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::decode_image_bytes;

/// POST /ocr - Clean up a scan or read its text
///
/// Accepts a `multipart/form-data` upload with the image in the `file`
/// field. Runs on CPU.
///
/// # Query
/// - `mode`: `regions` (cleaned PNG + region count) or `text` (recognized
///   lines). Defaults to the server's configured mode.
///
/// # Response
/// - regions: `success`, `image` (base64 PNG), `regions`, `processingTimeMs`
/// - text: `success`, `text`, `lines`, `processingTimeMs`
///
/// # Errors
/// Always `{"success": false, "error": "..."}`:
/// - 400 Bad Request: no file, empty file, not an image, unknown mode,
///   malformed query string, body that is not multipart
/// - 413 Payload Too Large: upload above the size limit
/// - 503 Service Unavailable: detector (or, in text mode, every recognizer) not loaded
/// - 500 Internal Server Error: model inference failed
pub async fn ocr_handler(
    State(state): State<AppState>,
    query: Result<Query<OcrQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    // 1. Validate request
    let Query(query) = query.map_err(|e| {
        warn!("OCR query rejected: {}", e);
        ApiError::from(e)
    })?;
    let multipart = multipart.map_err(|e| {
        warn!("OCR body rejected: {}", e);
        ApiError::from(e)
    })?;

    let mode = query.resolve_mode(state.settings.default_mode).map_err(|e| {
        warn!("OCR validation failed: {}", e);
        e
    })?;

    let upload = UploadedImage::from_multipart(multipart, state.settings.max_upload_bytes)
        .await
        .map_err(|e| {
            warn!("OCR upload rejected: {}", e);
            e
        })?;

    debug!(
        "OCR request: mode={}, field='{}', file={:?}, {} bytes",
        mode,
        upload.field_name,
        upload.file_name,
        upload.bytes.len()
    );

    // 2. Get the pipeline from the loaded models
    let pipeline = state
        .vision_model_manager
        .pipeline(state.settings.pipeline.clone())
        .ok_or_else(|| {
            warn!("OCR detection model not loaded");
            ApiError::ServiceUnavailable("OCR detection model not loaded".to_string())
        })?;

    if mode == OcrMode::Text && !pipeline.has_recognizer() {
        warn!("No text recognizer loaded");
        return Err(ApiError::ServiceUnavailable(
            "No text recognizer loaded".to_string(),
        ));
    }

    // 3. Decode image
    let (image, image_info) =
        decode_image_bytes(&upload.bytes, state.settings.max_upload_bytes).map_err(|e| {
            warn!("Failed to decode image: {}", e);
            ApiError::from(e)
        })?;

    debug!(
        "Decoded image: {}x{} {:?}, {} bytes",
        image_info.width, image_info.height, image_info.format, image_info.size_bytes
    );

    // 4. Run the pipeline off the async workers
    let response = tokio::task::spawn_blocking(move || match mode {
        OcrMode::Regions => pipeline.extract_regions(&image).map(OcrResponse::regions),
        OcrMode::Text => pipeline.extract_text(&image).map(OcrResponse::text),
    })
    .await
    .map_err(|e| {
        warn!("OCR worker failed: {}", e);
        ApiError::InternalError(format!("OCR worker failed: {}", e))
    })?
    .map_err(|e| {
        warn!("OCR processing failed: {}", e);
        ApiError::from(e)
    })?;

    info!(
        "OCR complete: mode={}, {}x{}, {}ms",
        mode, image_info.width, image_info.height, response.processing_time_ms
    );

    Ok(Json(response))
}

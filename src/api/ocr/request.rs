// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR request types and upload parsing

use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::errors::ApiError;

/// Preferred multipart field name for the image
pub const FILE_FIELD: &str = "file";

/// What the endpoint returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Cleaned image with only the text regions kept
    #[default]
    Regions,
    /// Recognized text lines
    Text,
}

impl OcrMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrMode::Regions => "regions",
            OcrMode::Text => "text",
        }
    }
}

impl fmt::Display for OcrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrMode {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regions" => Ok(OcrMode::Regions),
            "text" => Ok(OcrMode::Text),
            other => Err(ApiError::InvalidRequest(format!(
                "unsupported mode '{}', supported: [\"regions\", \"text\"]",
                other
            ))),
        }
    }
}

/// Query string of `POST /ocr`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

impl OcrQuery {
    /// Requested mode, or `default` when the query leaves it out
    pub fn resolve_mode(&self, default: OcrMode) -> Result<OcrMode, ApiError> {
        match self.mode.as_deref() {
            None | Some("") => Ok(default),
            Some(mode) => mode.parse(),
        }
    }
}

/// Image bytes pulled out of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// Read the `file` field, or the first field that carries data
    ///
    /// Uploads larger than `max_bytes` are rejected with 413.
    pub async fn from_multipart(mut multipart: Multipart, max_bytes: usize) -> Result<Self, ApiError> {
        let mut fallback: Option<UploadedImage> = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;

            if bytes.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge(format!(
                    "File exceeds maximum size of {} bytes",
                    max_bytes
                )));
            }

            debug!(
                "Multipart field '{}' ({:?}, {:?}): {} bytes",
                field_name,
                file_name,
                content_type,
                bytes.len()
            );

            let upload = UploadedImage {
                field_name,
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            };

            if upload.field_name == FILE_FIELD {
                if upload.bytes.is_empty() {
                    return Err(ApiError::InvalidRequest("Uploaded file is empty".to_string()));
                }
                return Ok(upload);
            }

            if fallback.is_none() && !upload.bytes.is_empty() {
                fallback = Some(upload);
            }
        }

        fallback.ok_or_else(|| ApiError::InvalidRequest("No file uploaded".to_string()))
    }
}

fn multipart_error(err: axum_extra::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::InvalidRequest(format!("Invalid multipart upload: {}", err.body_text()))
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::http_server::AppState;
use crate::version::{VERSION, VERSION_NUMBER};
use crate::vision::VisionModelInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" with a detector loaded, "degraded" otherwise
    pub status: String,
    pub version: String,
    pub build: String,
    pub models: Vec<VisionModelInfo>,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let manager = &state.vision_model_manager;
    let status = if manager.has_detector() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: VERSION_NUMBER.to_string(),
        build: VERSION.to_string(),
        models: manager.list_models(),
    })
}

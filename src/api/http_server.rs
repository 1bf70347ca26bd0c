// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::health_handler;
use super::ocr::{ocr_handler, OcrMode};
use crate::vision::image_utils::DEFAULT_MAX_IMAGE_BYTES;
use crate::vision::ocr::PipelineSettings;
use crate::vision::VisionModelManager;

/// Room for multipart boundaries and part headers on top of the file itself
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Per-server OCR settings shared by every request
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub default_mode: OcrMode,
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; `*` allows any origin without credentials
    pub cors_origins: Vec<String>,
    pub pipeline: PipelineSettings,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            default_mode: OcrMode::Regions,
            max_upload_bytes: DEFAULT_MAX_IMAGE_BYTES,
            cors_origins: vec!["http://localhost:8010".to_string()],
            pipeline: PipelineSettings::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub vision_model_manager: Arc<VisionModelManager>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(vision_model_manager: VisionModelManager, settings: ApiSettings) -> Self {
        Self {
            vision_model_manager: Arc::new(vision_model_manager),
            settings: Arc::new(settings),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let cors = cors_layer(&state.settings.cors_origins);

    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // OCR endpoint
        .route("/ocr", post(ocr_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins
///
/// Credentials are allowed for explicit origins, which rules out wildcard
/// methods and headers, so those mirror the preflight request instead.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use fabstir_ocr_node::{
    api::{start_server, AppState},
    config::ServiceConfig,
    version,
    vision::VisionModelManager,
};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::parse();

    tracing::info!("🚀 Starting {}", version::get_version_string());
    tracing::info!("📅 Build Date: {}", version::BUILD_DATE);

    // Load models; missing ones are reported and skipped
    tracing::info!("🧠 Loading vision models...");
    let manager = VisionModelManager::new(config.vision_model_config()).await?;
    for model in manager.list_models() {
        tracing::info!(
            "   {} ({}): {}",
            model.name,
            model.model_type,
            if model.available { "loaded" } else { "unavailable" }
        );
    }
    if !manager.has_detector() {
        tracing::warn!("⚠️ No text detector loaded, /ocr will answer 503");
    }

    let api_settings = config.api_settings();
    tracing::info!(
        "Default mode: {}, max upload: {} bytes, CORS origins: {:?}",
        api_settings.default_mode,
        api_settings.max_upload_bytes,
        api_settings.cors_origins
    );

    let state = AppState::new(manager, api_settings);
    start_server(config.socket_addr(), state).await
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod version;
pub mod vision;

pub use api::{create_router, start_server, ApiError, ApiSettings, AppState, OcrMode};
pub use config::ServiceConfig;
pub use vision::{VisionModelConfig, VisionModelManager};

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GET /health tests

use axum::{body::Body, http::Request, http::StatusCode};
use fabstir_ocr_node::version::VERSION_NUMBER;
use std::sync::Arc;
use tower::ServiceExt;

use super::support::*;

fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_with_models_is_healthy() {
    let response = full_router().oneshot(health_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], VERSION_NUMBER);

    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["name"], "fixed-det");
    assert_eq!(models[0]["modelType"], "detection");
    assert_eq!(models[1]["name"], "counting-rec");
    assert_eq!(models[1]["available"], true);
}

#[tokio::test]
async fn test_health_without_detector_is_degraded() {
    let router = router_with(None, vec![Arc::new(CountingRecognizer::default())], settings());
    let response = router.oneshot(health_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
}

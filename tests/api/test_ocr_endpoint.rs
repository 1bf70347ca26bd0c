// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /ocr tests
//!
//! Drive the full router with a fixed detector and recognizer so request
//! validation, mode selection and error mapping run without model files.

use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fabstir_ocr_node::api::{ApiSettings, OcrMode};
use std::sync::Arc;
use tower::ServiceExt;

use super::support::*;

#[cfg(test)]
mod ocr_endpoint_tests {
    use super::*;

    // =============================================================================
    // Successful requests
    // =============================================================================

    #[tokio::test]
    async fn test_regions_mode_returns_cleaned_png() {
        let body = multipart_body("file", "page.png", &test_page_png());
        let response = full_router()
            .oneshot(ocr_request("/ocr?mode=regions", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;

        assert_eq!(json["success"], true);
        assert_eq!(json["mode"], "regions");
        assert_eq!(json["regions"], 2);
        assert!(json["processingTimeMs"].is_u64());
        assert!(json.get("text").is_none());

        let png = STANDARD.decode(json["image"].as_str().unwrap()).unwrap();
        let cleaned = image::load_from_memory(&png).unwrap();
        assert_eq!(cleaned.width(), PAGE_WIDTH);
        assert_eq!(cleaned.height(), PAGE_HEIGHT);
    }

    #[tokio::test]
    async fn test_default_mode_is_regions() {
        let body = multipart_body("file", "page.png", &test_page_png());
        let response = full_router()
            .oneshot(ocr_request("/ocr", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["mode"], "regions");
    }

    #[tokio::test]
    async fn test_configured_default_mode_is_used() {
        let settings = ApiSettings {
            default_mode: OcrMode::Text,
            ..settings()
        };
        let router = router_with(
            Some(Arc::new(FixedDetector)),
            vec![Arc::new(CountingRecognizer::default())],
            settings,
        );

        let body = multipart_body("file", "page.png", &test_page_png());
        let response = router.oneshot(ocr_request("/ocr", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["mode"], "text");
    }

    #[tokio::test]
    async fn test_text_mode_returns_lines_top_to_bottom() {
        let body = multipart_body("file", "page.png", &test_page_png());
        let response = full_router()
            .oneshot(ocr_request("/ocr?mode=text", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;

        assert_eq!(json["success"], true);
        assert_eq!(json["mode"], "text");
        assert_eq!(json["text"], "line 1\nline 2");

        let lines = json["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["recognizer"], "counting-rec");
        assert_eq!(lines[0]["boundingBox"]["y"], 20);
        assert_eq!(lines[1]["boundingBox"]["y"], 60);
        assert!(json.get("image").is_none());
    }

    #[tokio::test]
    async fn test_first_non_empty_field_is_accepted() {
        let body = multipart_body("upload", "page.png", &test_page_png());
        let response = full_router()
            .oneshot(ocr_request("/ocr", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    // =============================================================================
    // Validation errors
    // =============================================================================

    #[tokio::test]
    async fn test_missing_file_returns_400() {
        let body = multipart_text_only("note", "");
        let response = full_router()
            .oneshot(ocr_request("/ocr", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("No file"));
    }

    #[tokio::test]
    async fn test_empty_file_returns_400() {
        let body = multipart_body("file", "empty.png", b"");
        let response = full_router()
            .oneshot(ocr_request("/ocr", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_non_image_returns_400() {
        let body = multipart_body("file", "notes.txt", b"this is not an image at all");
        let response = full_router()
            .oneshot(ocr_request("/ocr", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_mode_returns_400() {
        let body = multipart_body("file", "page.png", &test_page_png());
        let response = full_router()
            .oneshot(ocr_request("/ocr?mode=pdf", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("pdf"));
    }

    #[tokio::test]
    async fn test_non_multipart_body_returns_json_400() {
        let request = Request::builder()
            .method("POST")
            .uri("/ocr")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(r#"{"image":"abc"}"#))
            .unwrap();

        let response = full_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("multipart"));
    }

    #[tokio::test]
    async fn test_duplicate_mode_returns_json_400() {
        let body = multipart_body("file", "page.png", &test_page_png());
        let response = full_router()
            .oneshot(ocr_request("/ocr?mode=text&mode=regions", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("Invalid query"));
    }

    #[tokio::test]
    async fn test_oversized_upload_returns_413() {
        let settings = ApiSettings {
            max_upload_bytes: 1024,
            ..settings()
        };
        let router = router_with(
            Some(Arc::new(FixedDetector)),
            vec![Arc::new(CountingRecognizer::default())],
            settings,
        );

        let body = multipart_body("file", "big.png", &vec![0u8; 4096]);
        let response = router.oneshot(ocr_request("/ocr", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    // =============================================================================
    // Missing or failing models
    // =============================================================================

    #[tokio::test]
    async fn test_no_detector_returns_503() {
        let router = router_with(None, vec![], settings());

        let body = multipart_body("file", "page.png", &test_page_png());
        let response = router.oneshot(ocr_request("/ocr", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("detection"));
    }

    #[tokio::test]
    async fn test_text_mode_without_recognizer_returns_503() {
        let router = router_with(Some(Arc::new(FixedDetector)), vec![], settings());

        let body = multipart_body("file", "page.png", &test_page_png());
        let response = router
            .oneshot(ocr_request("/ocr?mode=text", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_regions_mode_without_recognizer_succeeds() {
        let router = router_with(Some(Arc::new(FixedDetector)), vec![], settings());

        let body = multipart_body("file", "page.png", &test_page_png());
        let response = router
            .oneshot(ocr_request("/ocr?mode=regions", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_detector_failure_returns_500() {
        let router = router_with(Some(Arc::new(BrokenDetector)), vec![], settings());

        let body = multipart_body("file", "page.png", &test_page_png());
        let response = router.oneshot(ocr_request("/ocr", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("session exploded"));
    }

    // =============================================================================
    // CORS
    // =============================================================================

    #[tokio::test]
    async fn test_preflight_allows_configured_origin() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/ocr")
            .header(header::ORIGIN, "http://localhost:8010")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = full_router().oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:8010"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[tokio::test]
    async fn test_wildcard_origin_allows_any() {
        let settings = ApiSettings {
            cors_origins: vec!["*".to_string()],
            ..settings()
        };
        let router = router_with(Some(Arc::new(FixedDetector)), vec![], settings);

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/ocr")
            .header(header::ORIGIN, "https://anywhere.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}

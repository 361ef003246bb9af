// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use table_detector_api::version;

use crate::common::{router_with, send_json, test_config, StubDetector};

#[tokio::test]
async fn test_health_reports_model_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(StubDetector::with_scores(&[]), test_config(dir.path()));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model"], "stub-detector");
    assert_eq!(json["version"], version::VERSION_NUMBER);
    assert_eq!(json["build"], version::VERSION);
    assert_eq!(json["date"], version::BUILD_DATE);

    let features: Vec<&str> = json["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert_eq!(features, version::FEATURES);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(StubDetector::with_scores(&[]), test_config(dir.path()));

    let request = Request::builder()
        .uri("/v1/models")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Tests for POST /detect
//!
//! Runs the real router against a stub engine whose candidate scores are
//! fixed, so counts depend only on the request threshold.

use axum::http::StatusCode;
use std::time::Duration;

use crate::common::{
    artifact_count, corrupted_png, jpeg_bytes, multipart_request, png_bytes, router_with,
    send_json, test_config, Part, StubDetector,
};

fn two_tables() -> StubDetector {
    StubDetector::with_scores(&[0.95, 0.4])
}

#[tokio::test]
async fn test_detect_two_tables_with_visualization() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request(
        "/detect",
        &[
            Part::file("file", "page.png", png_bytes(200, 100)),
            Part::text("confidence", "0.3"),
            Part::text("visualize", "true"),
        ],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["num_detections"], 2);
    assert_eq!(json["detections"].as_array().unwrap().len(), 2);
    assert_eq!(json["detections"][0]["label"], "table");
    assert_eq!(json["detections"][0]["bbox"].as_array().unwrap().len(), 4);
    assert_eq!(json["image_info"]["width"], 200);
    assert_eq!(json["image_info"]["height"], 100);
    assert_eq!(json["image_info"]["format"], "PNG");
    assert_eq!(json["image_info"]["channels"], 3);

    let url = json["visualization_url"].as_str().unwrap();
    assert!(url.starts_with("/static/visualizations/vis_"));
    assert_eq!(artifact_count(dir.path()), 1);
}

#[tokio::test]
async fn test_default_threshold_applies_without_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request(
        "/detect",
        &[
            Part::file("file", "page.png", png_bytes(64, 64)),
            Part::text("visualize", "false"),
        ],
    );
    let (status, json) = send_json(router, request).await;

    // default 0.7 keeps only the 0.95 candidate
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_detections"], 1);
    assert!(json.get("visualization_url").is_none());
}

#[tokio::test]
async fn test_threshold_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(
        StubDetector::with_scores(&[0.2, 0.55, 0.9]),
        test_config(dir.path()),
    );

    let mut previous = usize::MAX;
    for threshold in ["0.0", "0.3", "0.6", "0.95", "1.0"] {
        let request = multipart_request(
            "/detect",
            &[
                Part::file("file", "page.png", png_bytes(80, 80)),
                Part::text("confidence", threshold),
                Part::text("visualize", "false"),
            ],
        );
        let (status, json) = send_json(router.clone(), request).await;
        assert_eq!(status, StatusCode::OK);

        let count = json["num_detections"].as_u64().unwrap() as usize;
        assert!(count <= previous, "count rose at threshold {}", threshold);
        previous = count;
    }
    assert_eq!(previous, 0);
}

#[tokio::test]
async fn test_detections_sorted_by_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(
        StubDetector::with_scores(&[0.5, 0.99, 0.75]),
        test_config(dir.path()),
    );

    let request = multipart_request(
        "/detect?confidence=0.1&visualize=false",
        &[Part::file("file", "page.jpg", jpeg_bytes(120, 160))],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image_info"]["format"], "JPEG");
    let scores: Vec<f64> = json["detections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["confidence"].as_f64().unwrap())
        .collect();
    assert_eq!(scores.len(), 3);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_zero_detections_has_no_visualization() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(StubDetector::with_scores(&[0.1]), test_config(dir.path()));

    let request = multipart_request(
        "/detect",
        &[
            Part::file("file", "blank.png", png_bytes(50, 50)),
            Part::text("confidence", "0.5"),
            Part::text("visualize", "true"),
        ],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_detections"], 0);
    assert!(json.get("visualization_url").is_none());
    assert_eq!(artifact_count(dir.path()), 0);
}

#[tokio::test]
async fn test_form_field_overrides_query() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request(
        "/detect?confidence=0.99&visualize=true",
        &[
            Part::file("file", "page.png", png_bytes(64, 64)),
            Part::text("confidence", "0.3"),
            Part::text("visualize", "False"),
        ],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_detections"], 2);
    assert!(json.get("visualization_url").is_none());
}

#[tokio::test]
async fn test_invalid_visualize_value_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request(
        "/detect",
        &[
            Part::file("file", "page.png", png_bytes(64, 64)),
            Part::text("visualize", "yes"),
        ],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "validation_error");
    assert!(json["detail"].as_str().unwrap().contains("visualize"));
}

#[tokio::test]
async fn test_out_of_range_confidence_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request(
        "/detect?confidence=1.5",
        &[Part::file("file", "page.png", png_bytes(64, 64))],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("confidence"));
}

#[tokio::test]
async fn test_missing_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request("/detect", &[Part::text("confidence", "0.5")]);
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["detail"], "file is required");
}

#[tokio::test]
async fn test_non_image_upload_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request(
        "/detect",
        &[Part::file("file", "notes.txt", b"just some text".to_vec())],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "invalid_image");
    assert!(json["detail"].as_str().unwrap().contains("Invalid image"));
}

#[tokio::test]
async fn test_empty_upload_is_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request("/detect", &[Part::file("file", "empty.png", vec![])]);
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "unsupported_format");
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .contains("Unsupported image format"));
}

#[tokio::test]
async fn test_corrupted_upload_creates_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = multipart_request(
        "/detect",
        &[
            Part::file("file", "broken.png", corrupted_png()),
            Part::text("confidence", "0.1"),
        ],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!json["detail"].as_str().unwrap().is_empty());
    assert_eq!(artifact_count(dir.path()), 0);
}

#[tokio::test]
async fn test_oversized_image_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.decode_limits.max_dimension = 100;
    let router = router_with(two_tables(), config);

    let request = multipart_request(
        "/detect",
        &[Part::file("file", "huge.png", png_bytes(150, 20))],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "image_too_large");
}

#[tokio::test]
async fn test_detection_failure_is_500_with_reason() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(
        StubDetector::failing("model produced non-finite values"),
        test_config(dir.path()),
    );

    let request = multipart_request(
        "/detect",
        &[Part::file("file", "page.png", png_bytes(64, 64))],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json["detail"],
        "detection failed: model produced non-finite values"
    );
    assert_eq!(artifact_count(dir.path()), 0);
}

#[tokio::test]
async fn test_engine_error_hides_detail() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(
        StubDetector::erroring("onnx session poisoned at 0xdeadbeef"),
        test_config(dir.path()),
    );

    let request = multipart_request(
        "/detect",
        &[Part::file("file", "page.png", png_bytes(64, 64))],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error_type"], "internal_error");
    assert!(!json["detail"].as_str().unwrap().contains("deadbeef"));
}

#[tokio::test]
async fn test_unwritable_artifact_dir_is_visualization_failure() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    // Replace the artifact directory with a plain file
    let artifacts = dir.path().join("visualizations");
    std::fs::remove_dir_all(&artifacts).unwrap();
    std::fs::write(&artifacts, b"blocked").unwrap();

    let request = multipart_request(
        "/detect",
        &[
            Part::file("file", "page.png", png_bytes(80, 60)),
            Part::text("confidence", "0.3"),
            Part::text("visualize", "true"),
        ],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error_type"], "visualization_failed");
    assert_eq!(json["detail"], "failed to generate visualization");
    assert!(json.get("visualization_url").is_none());

    let leftovers: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("vis_") || name.starts_with(".vis-"))
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
    assert_eq!(std::fs::read(&artifacts).unwrap(), b"blocked");
}

#[tokio::test]
async fn test_inference_timeout_is_504() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.inference_timeout = Some(Duration::from_millis(20));
    let router = router_with(StubDetector::sleeping(Duration::from_millis(300)), config);

    let request = multipart_request(
        "/detect",
        &[Part::file("file", "page.png", png_bytes(32, 32))],
    );
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["detail"], "request timed out");
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(
        StubDetector::with_scores(&[0.3, 0.6, 0.9]),
        test_config(dir.path()),
    );

    let requests = ["0.1", "0.95", "0.5", "0.8"].map(|threshold| {
        let request = multipart_request(
            "/detect",
            &[
                Part::file("file", "page.png", png_bytes(40, 40)),
                Part::text("confidence", threshold),
                Part::text("visualize", "false"),
            ],
        );
        send_json(router.clone(), request)
    });

    let [a, b, c, d] = requests;
    let (a, b, c, d) = tokio::join!(a, b, c, d);

    assert_eq!(a.1["num_detections"], 3);
    assert_eq!(b.1["num_detections"], 0);
    assert_eq!(c.1["num_detections"], 2);
    assert_eq!(d.1["num_detections"], 1);
}

#[tokio::test]
async fn test_non_multipart_body_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(two_tables(), test_config(dir.path()));

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/detect")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{}"))
        .unwrap();
    let (status, json) = send_json(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "invalid_request");
}

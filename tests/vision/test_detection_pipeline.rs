// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Decode → engine → batch assembly without the HTTP layer

use bytes::Bytes;
use table_detector_api::api::detect_batch::detect_uploads;
use table_detector_api::api::upload::UploadedFile;
use table_detector_api::vision::{
    decode_image_bytes, DecodeLimits, DecodedImage, ImageError, TableDetector,
};

use crate::common::{corrupted_png, png_bytes, StubDetector};

fn upload(name: &str, bytes: Vec<u8>) -> UploadedFile {
    UploadedFile {
        filename: Some(name.to_string()),
        bytes: Bytes::from(bytes),
    }
}

#[test]
fn test_decoded_image_feeds_engine() {
    let decoded = DecodedImage::from(
        decode_image_bytes(&png_bytes(300, 200), &DecodeLimits::default()).unwrap(),
    );
    let detector = StubDetector::with_scores(&[0.9, 0.8]);

    let result = detector.predict(&decoded, 0.85).unwrap();

    assert!(result.success());
    assert_eq!(result.num_detections(), 1);
    let bbox = result.detections()[0].bbox;
    assert!(bbox.x_max <= 300.0 && bbox.y_max <= 200.0);
    assert_eq!(result.image_info.unwrap().width, 300);
}

#[test]
fn test_decode_errors_are_client_errors() {
    let limits = DecodeLimits::default();

    let err = decode_image_bytes(&[], &limits).unwrap_err();
    assert!(matches!(err, ImageError::UnsupportedFormat(_)));

    let err = decode_image_bytes(b"GIF? no", &limits).unwrap_err();
    assert!(err.is_client_error());

    let err = decode_image_bytes(&corrupted_png(), &limits).unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn test_batch_result_counters_are_consistent() {
    let detector = StubDetector::with_scores(&[0.75]);
    let files = vec![
        upload("ok-1.png", png_bytes(10, 10)),
        upload("broken.png", corrupted_png()),
        upload("ok-2.png", png_bytes(12, 10)),
        upload("empty.png", vec![]),
    ];

    let limits = DecodeLimits::default();
    for threshold in [0.0, 0.5, 0.8, 1.0] {
        let batch = detect_uploads(&detector, &files, &limits, threshold, Some(1));
        assert_eq!(batch.total_images(), 4);
        assert_eq!(
            batch.successful_detections() + batch.failed_detections(),
            batch.total_images()
        );
        assert_eq!(batch.successful_detections(), 2);
    }
}

#[test]
fn test_batch_threshold_monotonic_per_item() {
    let detector = StubDetector::with_scores(&[0.3, 0.6, 0.9]);
    let files = vec![upload("page.png", png_bytes(50, 50))];
    let limits = DecodeLimits::default();

    let counts: Vec<usize> = [0.1, 0.5, 0.7, 0.95]
        .iter()
        .map(|t| {
            detect_uploads(&detector, &files, &limits, *t, None).results()[0].num_detections()
        })
        .collect();

    assert_eq!(counts, vec![3, 2, 1, 0]);
}

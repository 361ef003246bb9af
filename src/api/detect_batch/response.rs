// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch response types

use serde::{Deserialize, Serialize};

use crate::api::detect::DetectionItem;
use crate::vision::{BatchDetectionResult, DetectionOutcome, DetectionResult};

/// Per-image entry; exactly one of `detections` and `error` is present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResponse {
    pub filename: Option<String>,
    pub success: bool,
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<DetectionItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResponse {
    pub fn new(filename: Option<String>, result: &DetectionResult) -> Self {
        let (detections, error) = match &result.outcome {
            DetectionOutcome::Detected(detections) => (
                Some(detections.iter().map(DetectionItem::from).collect()),
                None,
            ),
            DetectionOutcome::Failed(reason) => (None, Some(reason.clone())),
        };

        Self {
            filename,
            success: result.success(),
            processing_time: result.processing_time,
            detections,
            error,
        }
    }
}

/// Response from POST /detect-batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDetectResponse {
    pub total_images: usize,
    pub successful_detections: usize,
    pub failed_detections: usize,
    pub total_processing_time: f64,
    pub results: Vec<BatchItemResponse>,
}

impl BatchDetectResponse {
    /// Pair each result with the filename at the same position
    pub fn assemble(filenames: Vec<Option<String>>, batch: &BatchDetectionResult) -> Self {
        let results = filenames
            .into_iter()
            .zip(batch.results())
            .map(|(filename, result)| BatchItemResponse::new(filename, result))
            .collect();

        Self {
            total_images: batch.total_images(),
            successful_detections: batch.successful_detections(),
            failed_detections: batch.failed_detections(),
            total_processing_time: batch.total_processing_time(),
            results,
        }
    }
}

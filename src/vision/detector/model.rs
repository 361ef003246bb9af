// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection result types and the engine contract

use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};

use crate::vision::image_utils::{DecodedImage, ImageInfo};

/// Axis-aligned box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    /// Build a box, rejecting degenerate or non-finite coordinates
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Option<Self> {
        let finite = [x_min, y_min, x_max, y_max].iter().all(|v| v.is_finite());
        if !finite || x_min >= x_max || y_min >= y_max {
            return None;
        }
        Some(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// `[x_min, y_min, x_max, y_max]`
    pub fn to_array(&self) -> [f32; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

/// A single predicted table region
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Location in the source image
    pub bbox: BoundingBox,
    /// Class label (e.g. "table")
    pub label: String,
}

/// What the engine produced for one image
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    /// Detections in engine order
    Detected(Vec<Detection>),
    /// Engine-reported failure with its reason
    Failed(String),
}

/// Result of running detection on one image
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub outcome: DetectionOutcome,
    /// Wall-clock seconds spent on this image
    pub processing_time: f64,
    /// Source image description, absent when the upload never decoded
    pub image_info: Option<ImageInfo>,
}

impl DetectionResult {
    pub fn detected(
        detections: Vec<Detection>,
        processing_time: f64,
        image_info: ImageInfo,
    ) -> Self {
        Self {
            outcome: DetectionOutcome::Detected(detections),
            processing_time,
            image_info: Some(image_info),
        }
    }

    pub fn failed(
        error_message: impl Into<String>,
        processing_time: f64,
        image_info: Option<ImageInfo>,
    ) -> Self {
        Self {
            outcome: DetectionOutcome::Failed(error_message.into()),
            processing_time,
            image_info,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, DetectionOutcome::Detected(_))
    }

    /// Detections, empty for a failed result
    pub fn detections(&self) -> &[Detection] {
        match &self.outcome {
            DetectionOutcome::Detected(detections) => detections,
            DetectionOutcome::Failed(_) => &[],
        }
    }

    pub fn num_detections(&self) -> usize {
        self.detections().len()
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            DetectionOutcome::Detected(_) => None,
            DetectionOutcome::Failed(message) => Some(message),
        }
    }
}

/// Results for a batch, one entry per input in input order
///
/// Counters are derived from `results` on construction.
#[derive(Debug, Clone)]
pub struct BatchDetectionResult {
    total_images: usize,
    successful_detections: usize,
    failed_detections: usize,
    total_processing_time: f64,
    results: Vec<DetectionResult>,
}

impl BatchDetectionResult {
    pub fn from_results(results: Vec<DetectionResult>, total_processing_time: f64) -> Self {
        let successful_detections = results.iter().filter(|r| r.success()).count();
        Self {
            total_images: results.len(),
            successful_detections,
            failed_detections: results.len() - successful_detections,
            total_processing_time,
            results,
        }
    }

    pub fn total_images(&self) -> usize {
        self.total_images
    }

    pub fn successful_detections(&self) -> usize {
        self.successful_detections
    }

    pub fn failed_detections(&self) -> usize {
        self.failed_detections
    }

    pub fn total_processing_time(&self) -> f64 {
        self.total_processing_time
    }

    pub fn results(&self) -> &[DetectionResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<DetectionResult> {
        self.results
    }
}

/// Failure to bring the engine up; fatal at startup
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Detection model not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load detection model from {}: {reason}", path.display())]
    Session { path: PathBuf, reason: String },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// Exceptional engine failure, distinct from an engine-reported `Failed` outcome
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Table detection engine
///
/// The confidence threshold is passed on every call; implementations must not
/// keep per-request state, since one instance serves all requests.
pub trait TableDetector: Send + Sync {
    /// Identifier reported by the health endpoint
    fn model_name(&self) -> &str;

    /// Detect tables in one decoded image.
    ///
    /// Ordinary detection failure is reported as `DetectionOutcome::Failed`;
    /// `Err` is reserved for exceptional internal errors.
    fn predict(&self, input: &DecodedImage, threshold: f32)
        -> Result<DetectionResult, EngineError>;

    /// Detect tables in several images.
    ///
    /// The default implementation runs `predict` one image at a time;
    /// `max_batch_size` only groups those calls into chunks. Engines that can
    /// run several images in one pass override this. An error on one image
    /// becomes that image's failed result and never aborts the rest.
    fn predict_batch(
        &self,
        inputs: &[DecodedImage],
        threshold: f32,
        max_batch_size: Option<usize>,
    ) -> BatchDetectionResult {
        let start = Instant::now();
        let chunk_size = max_batch_size
            .filter(|size| *size > 0)
            .unwrap_or_else(|| inputs.len().max(1));

        let mut results = Vec::with_capacity(inputs.len());
        for (index, chunk) in inputs.chunks(chunk_size).enumerate() {
            debug!("Running detection chunk {} ({} images)", index, chunk.len());
            for input in chunk {
                let item_start = Instant::now();
                let result = self.predict(input, threshold).unwrap_or_else(|e| {
                    warn!("Detection failed for batch item: {}", e);
                    DetectionResult::failed(
                        e.to_string(),
                        item_start.elapsed().as_secs_f64(),
                        Some(input.info.clone()),
                    )
                });
                results.push(result);
            }
        }

        BatchDetectionResult::from_results(results, start.elapsed().as_secs_f64())
    }
}

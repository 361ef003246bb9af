// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect response types

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::{Detection, DetectionOutcome, DetectionResult, ImageInfo};

/// One detected table as reported to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionItem {
    pub confidence: f32,
    /// `[x_min, y_min, x_max, y_max]` in source-image pixels
    pub bbox: [f32; 4],
    pub label: String,
}

impl From<&Detection> for DetectionItem {
    fn from(detection: &Detection) -> Self {
        Self {
            confidence: detection.confidence,
            bbox: detection.bbox.to_array(),
            label: detection.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageInfoResponse {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub channels: u8,
}

impl From<&ImageInfo> for ImageInfoResponse {
    fn from(info: &ImageInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            format: info.format_name().to_string(),
            channels: info.channels,
        }
    }
}

/// Response from POST /detect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub success: bool,
    pub num_detections: usize,
    /// Seconds spent in detection
    pub processing_time: f64,
    pub detections: Vec<DetectionItem>,
    pub image_info: ImageInfoResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization_url: Option<String>,
}

impl DetectResponse {
    /// Assemble the success body, or the detection error for a failed outcome
    pub fn from_result(
        result: DetectionResult,
        visualization_url: Option<String>,
    ) -> Result<Self, ApiError> {
        let detections = match &result.outcome {
            DetectionOutcome::Detected(detections) => {
                detections.iter().map(DetectionItem::from).collect::<Vec<_>>()
            }
            DetectionOutcome::Failed(reason) => {
                return Err(ApiError::DetectionFailed(reason.clone()))
            }
        };

        let image_info = result.image_info.as_ref().ok_or_else(|| {
            ApiError::InternalError("detection result carries no image info".to_string())
        })?;

        Ok(Self {
            success: true,
            num_detections: detections.len(),
            processing_time: result.processing_time,
            detections,
            image_info: ImageInfoResponse::from(image_info),
            visualization_url,
        })
    }
}

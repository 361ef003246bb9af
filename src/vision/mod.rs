// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for table detection
//!
//! This module provides:
//! - Decoding and classification of uploaded images
//! - The table detection engine adapter
//! - Rendering and publishing of detection visualizations
//!
//! Inference runs on CPU only.

pub mod detector;
pub mod image_utils;
pub mod visualization;

pub use detector::{
    BatchDetectionResult, BoundingBox, Detection, DetectionOutcome, DetectionResult, DetrConfig,
    DetrTableDetector, EngineError, ModelLoadError, TableDetector,
};
pub use image_utils::{
    decode_image_bytes, detect_format, DecodeLimits, DecodedImage, ImageError, ImageInfo,
};
pub use visualization::{VisualizationError, VisualizationStore};

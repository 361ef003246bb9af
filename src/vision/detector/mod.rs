// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Table detection engine adapter
//!
//! Components:
//! - `model` - Result types and the `TableDetector` contract
//! - `preprocessing` - Image preprocessing for the model
//! - `detr` - ONNX Runtime backed DETR implementation

pub mod detr;
pub mod model;
pub mod preprocessing;

pub use detr::{DetrConfig, DetrTableDetector, DEFAULT_LABELS};
pub use model::{
    BatchDetectionResult, BoundingBox, Detection, DetectionOutcome, DetectionResult, EngineError,
    ModelLoadError, TableDetector,
};

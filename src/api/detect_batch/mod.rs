// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch detection endpoint
//!
//! Provides POST /detect-batch. Each image succeeds or fails on its own; the
//! request as a whole only fails on malformed input or internal errors.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{detect_batch_handler, detect_uploads};
pub use request::{DetectBatchQuery, DetectBatchRequest};
pub use response::{BatchDetectResponse, BatchItemResponse};

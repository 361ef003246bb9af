// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;
pub mod detect_batch;
pub mod errors;
pub mod http_server;
pub mod upload;

pub use detect::{DetectResponse, DetectionItem, ImageInfoResponse};
pub use detect_batch::{BatchDetectResponse, BatchItemResponse};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_router, start_server, AppState, HealthResponse};

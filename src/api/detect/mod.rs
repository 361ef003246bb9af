// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-image detection endpoint
//!
//! Provides POST /detect for locating tables in one uploaded image.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::detect_handler;
pub use request::{DetectQuery, DetectRequest};
pub use response::{DetectResponse, DetectionItem, ImageInfoResponse};

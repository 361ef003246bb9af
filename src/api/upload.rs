// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared pieces of the multipart endpoints: field parsing and blocking work

use axum_extra::extract::multipart::{Field, MultipartError, MultipartRejection};
use bytes::Bytes;
use std::time::Duration;

use crate::api::errors::ApiError;

/// One file part of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub async fn from_field(field: Field) -> Result<Self, ApiError> {
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        Ok(Self { filename, bytes })
    }
}

pub async fn read_text(field: Field) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

pub fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::InvalidRequest(format!("malformed multipart body: {}", err))
}

pub fn multipart_rejection(err: MultipartRejection) -> ApiError {
    ApiError::InvalidRequest(err.to_string())
}

/// Parse a confidence threshold, which must lie in [0, 1]
pub fn parse_confidence(value: &str) -> Result<f32, ApiError> {
    let confidence: f32 = value.trim().parse().map_err(|_| {
        ApiError::validation("confidence", format!("confidence must be a number, got '{}'", value))
    })?;

    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(ApiError::validation(
            "confidence",
            format!("confidence must be between 0 and 1, got {}", value),
        ));
    }

    Ok(confidence)
}

/// Accepts `true`/`false` in any letter case
pub fn parse_visualize(value: &str) -> Result<bool, ApiError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ApiError::validation(
            "visualize",
            format!("visualize must be 'true' or 'false', got '{}'", value),
        ))
    }
}

pub fn parse_max_batch_size(value: &str) -> Result<usize, ApiError> {
    match value.trim().parse::<usize>() {
        Ok(size) if size >= 1 => Ok(size),
        _ => Err(ApiError::validation(
            "max_batch_size",
            format!("max_batch_size must be a positive integer, got '{}'", value),
        )),
    }
}

/// Run CPU-bound work off the async runtime, bounded by an optional timeout
///
/// On timeout the worker keeps running to completion but its result is dropped.
pub async fn run_blocking<T, F>(timeout: Option<Duration>, work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);

    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| ApiError::Timeout)?,
        None => task.await,
    };

    joined.map_err(|e| ApiError::InternalError(format!("worker task failed: {}", e)))?
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};

use crate::vision::{EngineError, ImageError, VisualizationError};

/// JSON body of every error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    /// Upload bytes are not a decodable image
    InvalidImage(String),
    /// Upload is a recognised but unsupported format, or empty
    UnsupportedFormat(String),
    /// Upload exceeds the configured size or dimension bounds
    ImageTooLarge(String),
    ValidationError {
        field: String,
        message: String,
    },
    InvalidRequest(String),
    /// Engine reported a failed outcome for a decoded image
    DetectionFailed(String),
    VisualizationFailed(String),
    InternalError(String),
    Timeout,
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, detail) = match self {
            ApiError::InvalidImage(msg) => ("invalid_image", msg.clone()),
            ApiError::UnsupportedFormat(msg) => ("unsupported_format", msg.clone()),
            ApiError::ImageTooLarge(msg) => ("image_too_large", msg.clone()),
            ApiError::ValidationError { message, .. } => ("validation_error", message.clone()),
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone()),
            ApiError::DetectionFailed(reason) => {
                ("detection_failed", format!("detection failed: {}", reason))
            }
            ApiError::VisualizationFailed(_) => (
                "visualization_failed",
                "failed to generate visualization".to_string(),
            ),
            ApiError::InternalError(_) => ("internal_error", "internal server error".to_string()),
            ApiError::Timeout => ("timeout", "request timed out".to_string()),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            detail,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidImage(_)
            | ApiError::UnsupportedFormat(_)
            | ApiError::ImageTooLarge(_)
            | ApiError::ValidationError { .. }
            | ApiError::InvalidRequest(_) => 400,
            ApiError::DetectionFailed(_)
            | ApiError::VisualizationFailed(_)
            | ApiError::InternalError(_) => 500,
            ApiError::Timeout => 504,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidImage(msg)
            | ApiError::UnsupportedFormat(msg)
            | ApiError::ImageTooLarge(msg) => write!(f, "{}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::DetectionFailed(reason) => write!(f, "Detection failed: {}", reason),
            ApiError::VisualizationFailed(msg) => write!(f, "Visualization failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        let message = err.to_string();
        match err {
            ImageError::InvalidImage(_) => ApiError::InvalidImage(message),
            ImageError::UnsupportedFormat(_) => ApiError::UnsupportedFormat(message),
            ImageError::TooLarge(_) => ApiError::ImageTooLarge(message),
            ImageError::Processing(_) => ApiError::InternalError(message),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<VisualizationError> for ApiError {
    fn from(err: VisualizationError) -> Self {
        ApiError::VisualizationFailed(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.is_client_error() {
            warn!("Rejected request: {}", self);
        } else {
            error!("Request failed: {}", self);
        }

        (status, Json(self.to_response())).into_response()
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect endpoint handler

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use tracing::{debug, info};

use super::request::{DetectQuery, DetectRequest};
use super::response::DetectResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::upload::{multipart_rejection, run_blocking};
use crate::vision::{decode_image_bytes, DecodedImage};

/// POST /detect - Locate tables in one uploaded image
///
/// # Request (multipart/form-data)
/// - `file`: the image (required)
/// - `confidence`: threshold in [0, 1], defaults to the configured value
/// - `visualize`: `true`/`false`, defaults to `true`
///
/// `confidence` and `visualize` may also be given as query parameters; form
/// fields take precedence.
///
/// # Errors
/// - 400 Bad Request: missing file, undecodable or unsupported image, bad parameter
/// - 500 Internal Server Error: detection or visualization failed
/// - 504 Gateway Timeout: detection exceeded the configured timeout
pub async fn detect_handler(
    State(state): State<AppState>,
    Query(query): Query<DetectQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let multipart = multipart.map_err(multipart_rejection)?;
    let request = DetectRequest::from_multipart(query, multipart).await?;

    let threshold = request
        .confidence
        .unwrap_or(state.config.confidence_threshold);
    debug!(
        "Detect request: file={:?}, {} bytes, threshold={}, visualize={}",
        request.file.filename,
        request.file.bytes.len(),
        threshold,
        request.visualize
    );

    let detector = state.detector.clone();
    let limits = state.config.decode_limits;
    let bytes = request.file.bytes;

    let (decoded, result) = run_blocking(state.config.inference_timeout, move || {
        let decoded = DecodedImage::from(decode_image_bytes(&bytes, &limits)?);
        let result = detector.predict(&decoded, threshold)?;
        Ok((decoded, result))
    })
    .await?;
    debug!(
        "Decoded image: {}x{} {}, {} bytes",
        decoded.info.width,
        decoded.info.height,
        decoded.info.format_name(),
        decoded.info.size_bytes
    );

    // No artifact for failed or empty results
    let visualization_url = if request.visualize && result.num_detections() > 0 {
        let store = state.visualizations.clone();
        let detections = result.detections().to_vec();
        let url = run_blocking(None, move || {
            store
                .publish(&decoded.image, &detections)
                .map_err(ApiError::from)
        })
        .await?;
        Some(url)
    } else {
        None
    };

    let response = DetectResponse::from_result(result, visualization_url)?;

    info!(
        "Detection complete: {} tables in {:.3}s",
        response.num_detections, response.processing_time
    );

    Ok(Json(response))
}

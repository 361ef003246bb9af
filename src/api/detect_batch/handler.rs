// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch detection endpoint handler

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::request::{DetectBatchQuery, DetectBatchRequest};
use super::response::BatchDetectResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::upload::{multipart_rejection, run_blocking, UploadedFile};
use crate::vision::{
    decode_image_bytes, BatchDetectionResult, DecodeLimits, DecodedImage, DetectionResult,
    TableDetector,
};

/// POST /detect-batch - Locate tables in several uploaded images
///
/// # Request (multipart/form-data)
/// - `files`: one part per image (at least one)
/// - `confidence`: threshold in [0, 1], defaults to the configured value
/// - `max_batch_size`: positive chunk size handed to the engine
///
/// Undecodable images are reported as failed entries in `results` at their
/// upload position. Batch responses never carry visualizations.
pub async fn detect_batch_handler(
    State(state): State<AppState>,
    Query(query): Query<DetectBatchQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchDetectResponse>, ApiError> {
    let multipart = multipart.map_err(multipart_rejection)?;
    let request = DetectBatchRequest::from_multipart(query, multipart).await?;

    let threshold = request
        .confidence
        .unwrap_or(state.config.confidence_threshold);
    debug!(
        "Batch request: {} files, threshold={}, max_batch_size={:?}",
        request.files.len(),
        threshold,
        request.max_batch_size
    );

    let filenames: Vec<Option<String>> =
        request.files.iter().map(|f| f.filename.clone()).collect();
    let detector = state.detector.clone();
    let limits = state.config.decode_limits;
    let max_batch_size = request.max_batch_size;
    let files = request.files;

    let batch = run_blocking(state.config.inference_timeout, move || {
        Ok(detect_uploads(
            detector.as_ref(),
            &files,
            &limits,
            threshold,
            max_batch_size,
        ))
    })
    .await?;

    info!(
        "Batch complete: {}/{} images succeeded in {:.3}s",
        batch.successful_detections(),
        batch.total_images(),
        batch.total_processing_time()
    );

    Ok(Json(BatchDetectResponse::assemble(filenames, &batch)))
}

/// Decode every upload and run the engine over the ones that decoded
///
/// Decode failures become failed results at the upload's position; the
/// remaining engine results fill the other positions in order.
pub fn detect_uploads(
    detector: &dyn TableDetector,
    files: &[UploadedFile],
    limits: &DecodeLimits,
    threshold: f32,
    max_batch_size: Option<usize>,
) -> BatchDetectionResult {
    let start = Instant::now();

    let mut decoded = Vec::with_capacity(files.len());
    // `None` marks a slot filled by the engine
    let mut slots: Vec<Option<DetectionResult>> = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
        let item_start = Instant::now();
        match decode_image_bytes(&file.bytes, limits) {
            Ok(pair) => {
                decoded.push(DecodedImage::from(pair));
                slots.push(None);
            }
            Err(e) => {
                if e.is_client_error() {
                    warn!(
                        "Batch item {} ({:?}) failed to decode: {}",
                        index, file.filename, e
                    );
                } else {
                    error!(
                        "Batch item {} ({:?}) could not be processed: {}",
                        index, file.filename, e
                    );
                }
                slots.push(Some(DetectionResult::failed(
                    e.to_string(),
                    item_start.elapsed().as_secs_f64(),
                    None,
                )));
            }
        }
    }

    let mut engine_results = if decoded.is_empty() {
        Vec::new().into_iter()
    } else {
        detector
            .predict_batch(&decoded, threshold, max_batch_size)
            .into_results()
            .into_iter()
    };

    let results = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                engine_results.next().unwrap_or_else(|| {
                    DetectionResult::failed("engine returned no result for image", 0.0, None)
                })
            })
        })
        .collect();

    BatchDetectionResult::from_results(results, start.elapsed().as_secs_f64())
}

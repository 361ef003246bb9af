// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! DETR table detection model
//!
//! Runs a Table Transformer (DETR architecture) ONNX export on CPU and turns
//! its per-query class logits and normalised boxes into pixel-space detections.

use anyhow::{Context, Result};
use ndarray::{ArrayD, ArrayView1, ArrayView2, Axis, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

use super::model::{
    BoundingBox, Detection, DetectionResult, EngineError, ModelLoadError, TableDetector,
};
use super::preprocessing::preprocess_for_detection;
use crate::vision::image_utils::DecodedImage;

/// Labels of the Table Transformer detection checkpoint, in class-id order
pub const DEFAULT_LABELS: &[&str] = &["table", "table rotated"];

/// Configuration for loading the detection model
#[derive(Debug, Clone)]
pub struct DetrConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Class labels in class-id order, excluding the no-object class
    pub labels: Vec<String>,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for DetrConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/table-transformer-detection.onnx"),
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            intra_threads: 4,
        }
    }
}

/// Table detector backed by ONNX Runtime
pub struct DetrTableDetector {
    /// ONNX Runtime session, one inference at a time
    session: Mutex<Session>,
    /// Model input name
    input_name: String,
    labels: Vec<String>,
    model_name: String,
}

impl std::fmt::Debug for DetrTableDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetrTableDetector")
            .field("input_name", &self.input_name)
            .field("labels", &self.labels)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl DetrTableDetector {
    /// Load the detection model
    ///
    /// # Errors
    /// Returns error if:
    /// - No labels are configured
    /// - Model file not found
    /// - ONNX Runtime cannot build a session from the file
    pub fn load(config: &DetrConfig) -> Result<Self, ModelLoadError> {
        if config.labels.is_empty() {
            return Err(ModelLoadError::InvalidConfig(
                "at least one class label is required".to_string(),
            ));
        }

        let model_path = config.model_path.as_path();
        if !model_path.exists() {
            return Err(ModelLoadError::NotFound(model_path.to_path_buf()));
        }

        info!("Loading table detection model from {}", model_path.display());

        let session =
            build_session(model_path, config.intra_threads).map_err(|e| ModelLoadError::Session {
                path: model_path.to_path_buf(),
                reason: format!("{:#}", e),
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());

        if session.outputs.len() < 2 {
            return Err(ModelLoadError::Session {
                path: model_path.to_path_buf(),
                reason: format!(
                    "expected logits and pred_boxes outputs, found {}",
                    session.outputs.len()
                ),
            });
        }

        let model_name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "table-transformer".to_string());

        info!(
            "✅ Table detection model loaded (input: {}, labels: {:?})",
            input_name, config.labels
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            labels: config.labels.clone(),
            model_name,
        })
    }

    /// Run the session and return owned `(logits, pred_boxes)`
    fn run(&self, input: &DecodedImage) -> Result<(ArrayD<f32>, ArrayD<f32>), EngineError> {
        let tensor = preprocess_for_detection(&input.image);

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::Inference("session lock poisoned".to_string()))?;

        let input_value =
            Value::from_array(tensor).map_err(|e| EngineError::Inference(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| EngineError::UnexpectedOutput(format!("logits: {}", e)))?
            .to_owned();
        let boxes = outputs[1]
            .try_extract_array::<f32>()
            .map_err(|e| EngineError::UnexpectedOutput(format!("pred_boxes: {}", e)))?
            .to_owned();

        Ok((logits, boxes))
    }
}

fn build_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context("Failed to commit model file")?;
    Ok(session)
}

impl TableDetector for DetrTableDetector {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn predict(
        &self,
        input: &DecodedImage,
        threshold: f32,
    ) -> Result<DetectionResult, EngineError> {
        let start = Instant::now();
        let (logits, boxes) = self.run(input)?;

        let logits = logits
            .into_dimensionality::<Ix3>()
            .map_err(|e| EngineError::UnexpectedOutput(format!("logits: {}", e)))?;
        let boxes = boxes
            .into_dimensionality::<Ix3>()
            .map_err(|e| EngineError::UnexpectedOutput(format!("pred_boxes: {}", e)))?;

        if logits.shape()[1] != boxes.shape()[1] || boxes.shape()[2] != 4 || logits.shape()[2] < 2
        {
            return Err(EngineError::UnexpectedOutput(format!(
                "incompatible shapes: logits {:?}, pred_boxes {:?}",
                logits.shape(),
                boxes.shape()
            )));
        }

        if logits.iter().chain(boxes.iter()).any(|v| !v.is_finite()) {
            return Ok(DetectionResult::failed(
                "model produced non-finite values",
                start.elapsed().as_secs_f64(),
                Some(input.info.clone()),
            ));
        }

        let detections = decode_predictions(
            logits.index_axis(Axis(0), 0),
            boxes.index_axis(Axis(0), 0),
            &self.labels,
            threshold,
            input.info.width,
            input.info.height,
        );

        debug!(
            "Detected {} tables above {:.2} in {}x{} image",
            detections.len(),
            threshold,
            input.info.width,
            input.info.height
        );

        Ok(DetectionResult::detected(
            detections,
            start.elapsed().as_secs_f64(),
            input.info.clone(),
        ))
    }
}

fn softmax(values: ArrayView1<f32>) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Convert per-query outputs into detections
///
/// `logits` is `[queries, classes + 1]` with the no-object class last, `boxes`
/// is `[queries, 4]` as normalised `(cx, cy, w, h)`. Boxes are clamped to the
/// image and degenerate ones dropped. Results are sorted by descending
/// confidence.
pub fn decode_predictions(
    logits: ArrayView2<f32>,
    boxes: ArrayView2<f32>,
    labels: &[String],
    threshold: f32,
    width: u32,
    height: u32,
) -> Vec<Detection> {
    let (w, h) = (width as f32, height as f32);
    let mut detections = Vec::new();

    for (query_logits, query_box) in logits.outer_iter().zip(boxes.outer_iter()) {
        let probs = softmax(query_logits);
        let object_probs = &probs[..probs.len() - 1];

        let Some((class_id, &score)) = object_probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            continue;
        };

        if score < threshold {
            continue;
        }

        let (cx, cy, bw, bh) = (query_box[0], query_box[1], query_box[2], query_box[3]);
        let bbox = BoundingBox::new(
            ((cx - bw / 2.0) * w).clamp(0.0, w),
            ((cy - bh / 2.0) * h).clamp(0.0, h),
            ((cx + bw / 2.0) * w).clamp(0.0, w),
            ((cy + bh / 2.0) * h).clamp(0.0, h),
        );

        if let Some(bbox) = bbox {
            let label = labels
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", class_id));
            detections.push(Detection {
                confidence: score.clamp(0.0, 1.0),
                bbox,
                label,
            });
        }
    }

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    detections
}

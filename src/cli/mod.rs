// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ServiceConfig, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_REQUEST_BYTES};
use crate::vision::detector::DetrConfig;
use crate::vision::image_utils::{DecodeLimits, MAX_IMAGE_DIMENSION, MAX_IMAGE_SIZE};

/// Table Detector API server
#[derive(Parser, Debug)]
#[command(name = "table-detector-api")]
#[command(version)]
#[command(about = "HTTP service detecting tables in document images", long_about = None)]
pub struct Cli {
    /// Listen address
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Path to the table detection ONNX model
    #[arg(
        long,
        env = "MODEL_PATH",
        default_value = "./models/table-transformer-detection.onnx"
    )]
    pub model_path: PathBuf,

    /// Comma-separated class labels in class-id order
    #[arg(
        long,
        env = "MODEL_LABELS",
        value_delimiter = ',',
        default_value = "table,table rotated"
    )]
    pub labels: Vec<String>,

    /// Confidence threshold used when a request does not supply one
    #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence_threshold: f32,

    /// Directory served under /static (visualizations are written below it)
    #[arg(long, env = "STATIC_DIR", default_value = "./static")]
    pub static_dir: PathBuf,

    /// Maximum encoded size of one uploaded image
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = MAX_IMAGE_SIZE)]
    pub max_image_bytes: usize,

    /// Maximum width or height of one uploaded image
    #[arg(long, env = "MAX_IMAGE_DIMENSION", default_value_t = MAX_IMAGE_DIMENSION)]
    pub max_image_dimension: u32,

    /// Maximum size of a whole request body
    #[arg(long, env = "MAX_REQUEST_BYTES", default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,

    /// Abort a detection call after this many seconds (unbounded if unset)
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS")]
    pub inference_timeout_secs: Option<u64>,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,
}

impl Cli {
    pub fn into_config(self) -> ServiceConfig {
        let labels = self
            .labels
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        ServiceConfig {
            host: self.host,
            port: self.port,
            detector: DetrConfig {
                model_path: self.model_path,
                labels,
                intra_threads: self.intra_threads,
            },
            confidence_threshold: self.confidence_threshold,
            static_dir: self.static_dir,
            decode_limits: DecodeLimits {
                max_bytes: self.max_image_bytes,
                max_dimension: self.max_image_dimension,
            },
            max_request_bytes: self.max_request_bytes,
            inference_timeout: self.inference_timeout_secs.map(Duration::from_secs),
        }
    }
}

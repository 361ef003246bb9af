// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::vision::detector::DetrConfig;
use crate::vision::image_utils::DecodeLimits;

/// Default confidence threshold when a request does not supply one
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Default limit on a whole request body (all uploaded files)
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("at least one model label is required")]
    NoLabels,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Detection model location and labels
    pub detector: DetrConfig,
    /// Threshold used when a request does not override it
    pub confidence_threshold: f32,
    /// Root directory served under `/static`
    pub static_dir: PathBuf,
    pub decode_limits: DecodeLimits,
    pub max_request_bytes: usize,
    /// Upper bound on a single blocking detection call, unbounded when `None`
    pub inference_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            detector: DetrConfig::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            static_dir: PathBuf::from("./static"),
            decode_limits: DecodeLimits::default(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            inference_timeout: None,
        }
    }
}

impl ServiceConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
        }
        if self.detector.labels.is_empty() {
            return Err(ConfigError::NoLabels);
        }
        if self.decode_limits.max_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_image_bytes"));
        }
        if self.decode_limits.max_dimension == 0 {
            return Err(ConfigError::ZeroLimit("max_image_dimension"));
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_request_bytes"));
        }
        if self.detector.intra_threads == 0 {
            return Err(ConfigError::ZeroLimit("intra_threads"));
        }
        Ok(())
    }
}

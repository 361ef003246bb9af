// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Table Detector API

use serde::{Deserialize, Serialize};

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-table-detection-2025-11-04";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

/// Build date
pub const BUILD_DATE: &str = "2025-11-04";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "single-image-detection",
    "batch-detection",
    "partial-failure-isolation",
    "per-request-threshold",
    "visualization-artifacts",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Table Detector API {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Version details reported by `/health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub build: String,
    pub date: String,
    pub features: Vec<String>,
}

/// Get full version info for API responses
pub fn get_version_info() -> VersionInfo {
    VersionInfo {
        version: VERSION_NUMBER.to_string(),
        build: VERSION.to_string(),
        date: BUILD_DATE.to_string(),
        features: FEATURES.iter().map(|f| f.to_string()).collect(),
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect request types and multipart parsing

use axum_extra::extract::Multipart;
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::upload::{
    multipart_error, parse_confidence, parse_visualize, read_text, UploadedFile,
};

/// Query-string form of the detect parameters
///
/// Values stay raw so that invalid ones are reported with the service's own
/// error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectQuery {
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub visualize: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DetectRequest {
    pub file: UploadedFile,
    /// Falls back to the configured default when absent
    pub confidence: Option<f32>,
    pub visualize: bool,
}

impl DetectRequest {
    /// Build from the multipart body; form fields override query parameters
    pub async fn from_multipart(
        query: DetectQuery,
        mut multipart: Multipart,
    ) -> Result<Self, ApiError> {
        let mut file = None;
        let mut confidence = query.confidence;
        let mut visualize = query.visualize;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") if file.is_none() => {
                    file = Some(UploadedFile::from_field(field).await?);
                }
                Some("confidence") => confidence = Some(read_text(field).await?),
                Some("visualize") => visualize = Some(read_text(field).await?),
                _ => {}
            }
        }

        Self::from_parts(file, confidence.as_deref(), visualize.as_deref())
    }

    pub fn from_parts(
        file: Option<UploadedFile>,
        confidence: Option<&str>,
        visualize: Option<&str>,
    ) -> Result<Self, ApiError> {
        let file = file.ok_or_else(|| ApiError::validation("file", "file is required"))?;
        let confidence = confidence.map(parse_confidence).transpose()?;
        let visualize = visualize.map(parse_visualize).transpose()?.unwrap_or(true);

        Ok(Self {
            file,
            confidence,
            visualize,
        })
    }
}

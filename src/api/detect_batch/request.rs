// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch request types and multipart parsing

use axum_extra::extract::Multipart;
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::upload::{
    multipart_error, parse_confidence, parse_max_batch_size, read_text, UploadedFile,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectBatchQuery {
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub max_batch_size: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DetectBatchRequest {
    /// Uploads in the order they appeared in the body
    pub files: Vec<UploadedFile>,
    pub confidence: Option<f32>,
    pub max_batch_size: Option<usize>,
}

impl DetectBatchRequest {
    /// Build from the multipart body; form fields override query parameters
    pub async fn from_multipart(
        query: DetectBatchQuery,
        mut multipart: Multipart,
    ) -> Result<Self, ApiError> {
        let mut files = Vec::new();
        let mut confidence = query.confidence;
        let mut max_batch_size = query.max_batch_size;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("files") => files.push(UploadedFile::from_field(field).await?),
                Some("confidence") => confidence = Some(read_text(field).await?),
                Some("max_batch_size") => max_batch_size = Some(read_text(field).await?),
                _ => {}
            }
        }

        Self::from_parts(files, confidence.as_deref(), max_batch_size.as_deref())
    }

    pub fn from_parts(
        files: Vec<UploadedFile>,
        confidence: Option<&str>,
        max_batch_size: Option<&str>,
    ) -> Result<Self, ApiError> {
        if files.is_empty() {
            return Err(ApiError::validation("files", "at least one file is required"));
        }

        Ok(Self {
            files,
            confidence: confidence.map(parse_confidence).transpose()?,
            max_batch_size: max_batch_size.map(parse_max_batch_size).transpose()?,
        })
    }
}

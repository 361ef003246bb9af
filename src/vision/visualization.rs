// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Rendering of detections and publishing of visualization artifacts
//!
//! Artifacts are written into `<static_dir>/visualizations/` and served back
//! under `/static/visualizations/<file>`. They are never expired here.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use ab_glyph::{FontRef, InvalidFont, PxScale};
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, info};

use crate::vision::detector::Detection;

/// Directory below the static root holding artifacts
pub const VISUALIZATION_SUBDIR: &str = "visualizations";

/// URL prefix the static root is mounted under
pub const STATIC_URL_PREFIX: &str = "/static";

const LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
const LABEL_SCALE: f32 = 16.0;
const LABEL_PADDING: i32 = 2;

const BOX_THICKNESS: i32 = 2;
const MAX_NAME_ATTEMPTS: u32 = 100;

const HIGH_CONFIDENCE_COLOR: [u8; 3] = [0, 200, 0];
const MEDIUM_CONFIDENCE_COLOR: [u8; 3] = [255, 165, 0];
const LOW_CONFIDENCE_COLOR: [u8; 3] = [220, 0, 0];
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];

#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error("I/O error while publishing visualization: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode visualization: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to load label font: {0}")]
    Font(#[from] InvalidFont),

    #[error("No free artifact name for timestamp {0}")]
    NameExhausted(i64),
}

fn color_for(confidence: f32) -> Rgb<u8> {
    if confidence >= 0.8 {
        Rgb(HIGH_CONFIDENCE_COLOR)
    } else if confidence >= 0.5 {
        Rgb(MEDIUM_CONFIDENCE_COLOR)
    } else {
        Rgb(LOW_CONFIDENCE_COLOR)
    }
}

/// Caption drawn above each box, e.g. `table: 0.95`
pub fn label_text(detection: &Detection) -> String {
    format!("{}: {:.2}", detection.label, detection.confidence)
}

/// Draw each detection as a 2-pixel outline captioned with label and score
pub fn render_detections(
    image: &DynamicImage,
    detections: &[Detection],
) -> Result<RgbImage, VisualizationError> {
    let font = FontRef::try_from_slice(LABEL_FONT)?;
    let scale = PxScale::from(LABEL_SCALE);

    let mut canvas = image.to_rgb8();
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);

    for detection in detections {
        let color = color_for(detection.confidence);
        let [x0, y0, x1, y1] = detection.bbox.to_array();

        let x_min = (x0.floor() as i32).clamp(0, w - 1);
        let y_min = (y0.floor() as i32).clamp(0, h - 1);
        let x_max = (x1.ceil() as i32).clamp(0, w - 1);
        let y_max = (y1.ceil() as i32).clamp(0, h - 1);

        if x_min >= x_max || y_min >= y_max {
            continue;
        }

        for t in 0..BOX_THICKNESS {
            let rect_w = x_max - x_min + 1 - 2 * t;
            let rect_h = y_max - y_min + 1 - 2 * t;
            if rect_w <= 0 || rect_h <= 0 {
                break;
            }
            let rect = Rect::at(x_min + t, y_min + t).of_size(rect_w as u32, rect_h as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }

        let caption = label_text(detection);
        let (text_w, text_h) = text_size(scale, &font, &caption);
        let tag_w = text_w as i32 + 2 * LABEL_PADDING;
        let tag_h = text_h as i32 + 2 * LABEL_PADDING;

        // Above the box when there is room, otherwise inside its top edge
        let tag_y = if y_min >= tag_h { y_min - tag_h } else { y_min };
        let tag = Rect::at(x_min, tag_y).of_size(tag_w as u32, tag_h as u32);
        draw_filled_rect_mut(&mut canvas, tag, color);
        draw_text_mut(
            &mut canvas,
            Rgb(LABEL_TEXT_COLOR),
            x_min + LABEL_PADDING,
            tag_y + LABEL_PADDING,
            scale,
            &font,
            &caption,
        );
    }

    Ok(canvas)
}

/// `vis_<millis>.jpg`, with `_<n>` appended for the n-th retry
pub fn artifact_filename(timestamp_millis: i64, attempt: u32) -> String {
    if attempt == 0 {
        format!("vis_{}.jpg", timestamp_millis)
    } else {
        format!("vis_{}_{}.jpg", timestamp_millis, attempt)
    }
}

/// Publishes annotated images into the static directory
#[derive(Debug, Clone)]
pub struct VisualizationStore {
    static_dir: PathBuf,
}

impl VisualizationStore {
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
        }
    }

    /// Root served under `/static`
    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Directory holding published artifacts
    pub fn artifact_dir(&self) -> PathBuf {
        self.static_dir.join(VISUALIZATION_SUBDIR)
    }

    /// Create the artifact directory if missing
    pub fn ensure_dirs(&self) -> Result<(), VisualizationError> {
        fs::create_dir_all(self.artifact_dir())?;
        Ok(())
    }

    /// Render, publish and return the public relative URL
    ///
    /// The rendering is written to a temporary file inside the artifact
    /// directory, then renamed without overwriting into its timestamped name.
    /// The temporary file is removed on every failure path.
    pub fn publish(
        &self,
        image: &DynamicImage,
        detections: &[Detection],
    ) -> Result<String, VisualizationError> {
        self.publish_at(image, detections, Utc::now().timestamp_millis())
    }

    fn publish_at(
        &self,
        image: &DynamicImage,
        detections: &[Detection],
        millis: i64,
    ) -> Result<String, VisualizationError> {
        let annotated = render_detections(image, detections)?;

        let dir = self.artifact_dir();
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".vis-")
            .suffix(".jpg")
            .tempfile_in(&dir)?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            DynamicImage::ImageRgb8(annotated).write_to(&mut writer, ImageFormat::Jpeg)?;
            writer.flush()?;
        }
        debug!("Rendered visualization to {}", tmp.path().display());

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = artifact_filename(millis, attempt);
            match tmp.persist_noclobber(dir.join(&filename)) {
                Ok(_) => {
                    info!("Published visualization {}", filename);
                    return Ok(format!(
                        "{}/{}/{}",
                        STATIC_URL_PREFIX, VISUALIZATION_SUBDIR, filename
                    ));
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    tmp = e.file;
                }
                Err(e) => return Err(VisualizationError::Io(e.error)),
            }
        }

        Err(VisualizationError::NameExhausted(millis))
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and classification of upload failures

use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;

/// Maximum encoded upload size (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum width or height accepted before decoding pixels
pub const MAX_IMAGE_DIMENSION: u32 = 10_000;

/// Formats the service decodes
const SUPPORTED_FORMATS: &str = "PNG, JPEG, WEBP, GIF, BMP, TIFF";

/// Failures while turning uploaded bytes into an image.
///
/// The first three variants are caused by the upload itself and are reported
/// to the caller verbatim. `Processing` covers everything else.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large: {0}")]
    TooLarge(String),

    #[error("Image processing failed: {0}")]
    Processing(String),
}

impl ImageError {
    /// Whether the failure is attributable to the uploaded bytes
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ImageError::Processing(_))
    }
}

/// Bounds applied while decoding
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    /// Maximum encoded size in bytes
    pub max_bytes: usize,
    /// Maximum width or height in pixels
    pub max_dimension: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMAGE_SIZE,
            max_dimension: MAX_IMAGE_DIMENSION,
        }
    }
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Number of colour channels in the decoded image
    pub channels: u8,
    /// Size of the encoded upload in bytes
    pub size_bytes: usize,
}

impl ImageInfo {
    /// Upper-case format name as reported to clients
    pub fn format_name(&self) -> &'static str {
        format_name(self.format)
    }
}

/// A decoded upload together with its description
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub info: ImageInfo,
}

impl From<(DynamicImage, ImageInfo)> for DecodedImage {
    fn from((image, info): (DynamicImage, ImageInfo)) -> Self {
        Self { image, info }
    }
}

/// Decode raw image bytes (multipart uploads)
///
/// # Returns
/// * `Ok((DynamicImage, ImageInfo))` - The decoded image and metadata
/// * `Err(ImageError)` - Classified failure
pub fn decode_image_bytes(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::UnsupportedFormat(
            "empty file contains no image data".to_string(),
        ));
    }

    if bytes.len() > limits.max_bytes {
        return Err(ImageError::TooLarge(format!(
            "{} bytes exceeds maximum of {} bytes",
            bytes.len(),
            limits.max_bytes
        )));
    }

    let format = match detect_format(bytes) {
        Some(format) => format,
        None => {
            return Err(match image::guess_format(bytes) {
                Ok(other) => ImageError::UnsupportedFormat(format!(
                    "{:?} is not supported, supported: {}",
                    other, SUPPORTED_FORMATS
                )),
                Err(_) => ImageError::InvalidImage("cannot identify image file".to_string()),
            })
        }
    };

    // Check the header before allocating pixel buffers
    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(classify_decode_error)?;

    if width > limits.max_dimension || height > limits.max_dimension {
        return Err(ImageError::TooLarge(format!(
            "{}x{} exceeds maximum dimension of {} pixels",
            width, height, limits.max_dimension
        )));
    }

    let img =
        image::load_from_memory_with_format(bytes, format).map_err(classify_decode_error)?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::InvalidImage(
            "image has zero width or height".to_string(),
        ));
    }

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        channels: img.color().channel_count(),
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

fn classify_decode_error(err: image::ImageError) -> ImageError {
    match err {
        image::ImageError::Decoding(e) => ImageError::InvalidImage(e.to_string()),
        image::ImageError::Unsupported(e) => ImageError::UnsupportedFormat(e.to_string()),
        image::ImageError::Limits(e) => ImageError::TooLarge(e.to_string()),
        // Reads come from memory, so these only surface for truncated data
        image::ImageError::IoError(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
            ) =>
        {
            ImageError::InvalidImage(e.to_string())
        }
        other => ImageError::Processing(other.to_string()),
    }
}

/// Detect a supported image format from magic bytes
///
/// Returns `None` when the bytes do not start with the signature of a
/// format this service decodes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.len() < 4 {
        return None;
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Some(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Some(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some(ImageFormat::Tiff),

        _ => None,
    }
}

/// Get the format name as reported in `image_info`
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        _ => "UNKNOWN",
    }
}

use std::io::Cursor;

use chrono::{DateTime, Utc};
use image::io::Reader as ImageReader;
use image::{ImageFormat, RgbaImage};

use super::CaptureError;

pub const PNG_MIME: &str = "image/png";

/// An encoded single-frame image produced by a capture.
///
/// The buffer is never mutated after creation. The type is deliberately not
/// `Clone`: an artifact is handed to exactly one consumer.
#[derive(Debug, PartialEq, Eq)]
pub struct RasterArtifact {
    bytes: Vec<u8>,
    mime_type: &'static str,
    width: u32,
    height: u32,
    created_at: DateTime<Utc>,
}

impl RasterArtifact {
    pub(crate) fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            mime_type: PNG_MIME,
            width,
            height,
            created_at: Utc::now(),
        }
    }

    /// Wraps already-encoded PNG bytes, reading the dimensions from the header.
    pub fn from_png(bytes: Vec<u8>) -> Result<Self, CaptureError> {
        let reader = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| CaptureError::InvalidRaster(e.to_string()))?;
        if reader.format() != Some(ImageFormat::Png) {
            return Err(CaptureError::InvalidRaster(
                "buffer is not a PNG image".to_string(),
            ));
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| CaptureError::InvalidRaster(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidRaster(
                "PNG declares an empty image".to_string(),
            ));
        }
        Ok(Self::new(bytes, width, height))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes the buffer back into RGBA pixels.
    pub fn decode(&self) -> Result<RgbaImage, image::ImageError> {
        Ok(image::load_from_memory_with_format(&self.bytes, ImageFormat::Png)?.to_rgba8())
    }
}

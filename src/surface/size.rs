use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Largest edge, in CSS pixels, a surface may declare.
pub const MAX_SURFACE_EDGE: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSize {
    /// A 9:19.5 phone screen, the frame the preview simulates.
    fn default() -> Self {
        Self {
            width: 390,
            height: 844,
        }
    }
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Device pixel dimensions after applying `pixel_ratio`.
    pub fn scaled(&self, pixel_ratio: f32) -> (u32, u32) {
        let w = (self.width as f32 * pixel_ratio).round().max(0.0) as u32;
        let h = (self.height as f32 * pixel_ratio).round().max(0.0) as u32;
        (w, h)
    }
}

#[derive(Debug, Error)]
pub enum SurfaceSizeParseError {
    #[error("Invalid surface size: expected WIDTHxHEIGHT (e.g., 390x844)")]
    InvalidFormat,
    #[error("Invalid width: {0}")]
    InvalidWidth(String),
    #[error("Invalid height: {0}")]
    InvalidHeight(String),
    #[error("Width must be between 1 and {MAX_SURFACE_EDGE}")]
    WidthOutOfRange,
    #[error("Height must be between 1 and {MAX_SURFACE_EDGE}")]
    HeightOutOfRange,
}

impl FromStr for SurfaceSize {
    type Err = SurfaceSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or(SurfaceSizeParseError::InvalidFormat)?;
        if h.contains(['x', 'X']) {
            return Err(SurfaceSizeParseError::InvalidFormat);
        }

        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| SurfaceSizeParseError::InvalidWidth(w.to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| SurfaceSizeParseError::InvalidHeight(h.to_string()))?;

        if width == 0 || width > MAX_SURFACE_EDGE {
            return Err(SurfaceSizeParseError::WidthOutOfRange);
        }
        if height == 0 || height > MAX_SURFACE_EDGE {
            return Err(SurfaceSizeParseError::HeightOutOfRange);
        }

        Ok(SurfaceSize { width, height })
    }
}

impl std::fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

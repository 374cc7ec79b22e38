//! Raster capture: turns a live [`Surface`] into an encoded PNG artifact.
//!
//! Capture runs in stages, each of which may suspend: option validation and
//! the detach check, the stylesheet pass, font resolution, concurrent image
//! loading, painting on a blocking worker, and PNG encoding.

mod fonts;
mod paint;
mod raster;
pub mod resources;

use std::time::Duration;

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use url::Url;

use crate::surface::{Color, Node, Surface};
use paint::PaintPlan;

pub use fonts::{resolve_face, FontTable, DEFAULT_FAMILY};
pub use raster::{RasterArtifact, PNG_MIME};
pub use resources::{
    read_as_data_url, read_to_buffer, ResourceError, ResourceLoader, DEFAULT_RESOURCE_TIMEOUT,
};

/// Largest canvas edge, in device pixels, the engine will allocate.
pub const MAX_CANVAS_EDGE: u32 = 16_384;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Surface is detached; there is nothing to capture")]
    SurfaceDetached,

    #[error("Stylesheet '{0}' is cross-origin and cannot be inlined")]
    CrossOriginStylesheet(String),

    #[error("Invalid capture options: {0}")]
    InvalidOptions(String),

    #[error("Paint failed: {0}")]
    Paint(String),

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Capture engine setup failed: {0}")]
    Setup(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureOptions {
    /// Strip stylesheet links before serialization instead of inlining them.
    pub exclude_external_stylesheets: bool,
    /// Family laid out for every text run, overriding run and surface
    /// families; Pango maps it onto an installed face.
    pub force_font_family: Option<String>,
    /// 0.0 to 1.0. PNG is lossless, so this only trades encode time for size.
    pub quality: f32,
    pub pixel_ratio: f32,
    /// Overrides the surface background.
    pub background: Option<Color>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            exclude_external_stylesheets: true,
            force_font_family: None,
            quality: 1.0,
            pixel_ratio: 1.0,
            background: None,
        }
    }
}

impl CaptureOptions {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(CaptureError::InvalidOptions(format!(
                "quality must be between 0.0 and 1.0, got {}",
                self.quality
            )));
        }
        if !self.pixel_ratio.is_finite() || self.pixel_ratio <= 0.0 {
            return Err(CaptureError::InvalidOptions(format!(
                "pixel ratio must be positive, got {}",
                self.pixel_ratio
            )));
        }
        Ok(())
    }

    fn compression(&self) -> CompressionType {
        if self.quality >= 0.75 {
            CompressionType::Best
        } else if self.quality >= 0.35 {
            CompressionType::Default
        } else {
            CompressionType::Fast
        }
    }
}

/// Serializes surfaces into [`RasterArtifact`]s.
#[derive(Debug, Clone)]
pub struct CaptureEngine {
    loader: ResourceLoader,
}

impl CaptureEngine {
    pub fn new(resource_timeout: Duration) -> Result<Self, CaptureError> {
        Ok(Self {
            loader: ResourceLoader::new(resource_timeout)?,
        })
    }

    pub fn with_loader(loader: ResourceLoader) -> Self {
        Self { loader }
    }

    /// Captures `surface` as it is now. The shared borrow keeps the surface
    /// from being mutated for the whole capture.
    ///
    /// Image resources that cannot be loaded leave their region transparent;
    /// they never fail the capture.
    pub async fn capture(
        &self,
        surface: &Surface,
        options: &CaptureOptions,
    ) -> Result<RasterArtifact, CaptureError> {
        options.validate()?;
        let root = surface.root.as_ref().ok_or(CaptureError::SurfaceDetached)?;

        if surface.size.is_empty() {
            return Err(CaptureError::Paint("surface has zero area".to_string()));
        }
        let (width, height) = surface.size.scaled(options.pixel_ratio);
        if width == 0 || height == 0 || width > MAX_CANVAS_EDGE || height > MAX_CANVAS_EDGE {
            return Err(CaptureError::Paint(format!(
                "canvas {width}x{height} is outside 1..={MAX_CANVAS_EDGE} pixels per edge"
            )));
        }
        log::debug!(
            "Capturing {} surface at {}x ({}x{} device px)",
            surface.size,
            options.pixel_ratio,
            width,
            height
        );

        let mut root = root.clone();
        prepare_stylesheets(&mut root, surface.origin.as_ref(), options)?;

        let fonts = FontTable::resolve(
            &root,
            surface.font_family.as_deref(),
            options.force_font_family.as_deref(),
        );

        let sources = collect_image_sources(&root);
        let images = self.loader.load_all(&sources, surface.origin.as_ref()).await;
        log::debug!("Loaded {}/{} image resources", images.len(), sources.len());

        let plan = PaintPlan {
            root,
            width,
            height,
            scale: options.pixel_ratio,
            background: options
                .background
                .or(surface.background)
                .unwrap_or(Color::TRANSPARENT),
            fonts,
            images,
        };
        let canvas = task::spawn_blocking(move || plan.paint())
            .await
            .map_err(|e| CaptureError::Paint(format!("paint worker failed: {e}")))?
            .map_err(|e| CaptureError::Paint(e.to_string()))?;

        let bytes = encode_png(&canvas, options.compression())?;
        log::info!(
            "Captured {}x{} raster ({} bytes)",
            width,
            height,
            bytes.len()
        );
        Ok(RasterArtifact::new(bytes, width, height))
    }
}

fn prepare_stylesheets(
    root: &mut Node,
    origin: Option<&Url>,
    options: &CaptureOptions,
) -> Result<(), CaptureError> {
    if options.exclude_external_stylesheets {
        let removed = root.retain_descendants(&|node| !matches!(node, Node::Stylesheet { .. }));
        if removed > 0 {
            log::debug!("Stripped {removed} stylesheet link(s) before capture");
        }
        return Ok(());
    }

    let mut cross_origin = None;
    root.walk(&mut |node| {
        if let Node::Stylesheet { href } = node {
            if cross_origin.is_none() && is_cross_origin(href, origin) {
                cross_origin = Some(href.clone());
            }
        }
    });
    match cross_origin {
        Some(href) => Err(CaptureError::CrossOriginStylesheet(href)),
        None => Ok(()),
    }
}

/// Relative and `data:` stylesheets are always inlinable; absolute ones only
/// when they share the surface origin.
fn is_cross_origin(href: &str, origin: Option<&Url>) -> bool {
    match Url::parse(href) {
        Ok(url) if url.scheme() == "data" => false,
        Ok(url) => match origin {
            Some(origin) => url.origin() != origin.origin(),
            None => true,
        },
        Err(_) => false,
    }
}

fn collect_image_sources(root: &Node) -> Vec<String> {
    let mut sources = Vec::new();
    root.walk(&mut |node| {
        if let Node::Image { src, .. } = node {
            if !src.trim().is_empty() {
                sources.push(src.clone());
            }
        }
    });
    sources
}

fn encode_png(canvas: &RgbaImage, compression: CompressionType) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut bytes, compression, PngFilter::Adaptive);
    encoder
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            ColorType::Rgba8,
        )
        .map_err(|e| CaptureError::Paint(format!("PNG encoding failed: {e}")))?;
    Ok(bytes)
}

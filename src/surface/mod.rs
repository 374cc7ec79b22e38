//! The renderable surface handed over by the compositor.
//!
//! A [`Surface`] is an already laid-out composition of the simulated phone
//! screen. This crate never lays anything out; it only reads the composition
//! while capturing it.

mod builder;
mod color;
mod node;
mod size;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use builder::SurfaceBuilder;
pub use color::{Color, ColorParseError};
pub use node::{ImageFit, Node, Rect, DEFAULT_FONT_SIZE};
pub use size::{SurfaceSize, SurfaceSizeParseError, MAX_SURFACE_EDGE};

#[derive(Debug, Error)]
pub enum SurfaceLoadError {
    #[error("Surface file not found: {0}")]
    NotFound(String),
    #[error("Failed to read surface file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid surface JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid surface YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unsupported surface extension '{0}'. Supported: json, yaml, yml.")]
    UnsupportedExtension(String),
}

/// Handle to a visual composition at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surface {
    #[serde(default)]
    pub size: SurfaceSize,
    /// Origin of the document the composition lives in; used to classify
    /// stylesheet links as same- or cross-origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// `None` once the composition has been torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Node>,
}

impl Surface {
    pub fn new(size: SurfaceSize, root: Node) -> Self {
        Self {
            size,
            origin: None,
            background: None,
            font_family: None,
            root: Some(root),
        }
    }

    pub fn detached(size: SurfaceSize) -> Self {
        Self {
            size,
            origin: None,
            background: None,
            font_family: None,
            root: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.root.is_some()
    }

    /// Loads a surface description from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Surface, SurfaceLoadError> {
        if !path.exists() {
            return Err(SurfaceLoadError::NotFound(path.display().to_string()));
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let raw = std::fs::read_to_string(path)?;
        match extension.as_str() {
            "json" => Ok(serde_json::from_str(&raw)?),
            "yaml" | "yml" => Ok(serde_yaml::from_str(&raw)?),
            other => Err(SurfaceLoadError::UnsupportedExtension(other.to_string())),
        }
    }

    /// Points the image bound to upload slot `index` at `src`.
    /// Returns `false` when no image node carries that slot.
    pub fn fill_slot(&mut self, index: usize, src: impl Into<String>) -> bool {
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        let src = src.into();
        let mut filled = false;
        root.walk_mut(&mut |node| {
            if let Node::Image {
                slot: Some(slot),
                src: current,
                ..
            } = node
            {
                if *slot == index {
                    *current = src.clone();
                    filled = true;
                }
            }
        });
        filled
    }

    /// Image sources referenced by the composition, in paint order, skipping
    /// unpopulated slots.
    pub fn image_sources(&self) -> Vec<&str> {
        let mut sources = Vec::new();
        if let Some(root) = &self.root {
            root.walk(&mut |node| {
                if let Node::Image { src, .. } = node {
                    if !src.trim().is_empty() {
                        sources.push(src.as_str());
                    }
                }
            });
        }
        sources
    }

    pub fn stylesheets(&self) -> Vec<&str> {
        let mut hrefs = Vec::new();
        if let Some(root) = &self.root {
            root.walk(&mut |node| {
                if let Node::Stylesheet { href } = node {
                    hrefs.push(href.as_str());
                }
            });
        }
        hrefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn slotted_surface() -> Surface {
        SurfaceBuilder::new(SurfaceSize::new(100, 200))
            .image_slot(0, Rect::new(0.0, 0.0, 20.0, 20.0))
            .image_slot(1, Rect::new(20.0, 0.0, 20.0, 20.0))
            .stylesheet("https://fonts.example.com/poppins.css")
            .build()
    }

    #[test]
    fn detached_surface_reports_unattached() {
        assert!(!Surface::detached(SurfaceSize::default()).is_attached());
        assert!(slotted_surface().is_attached());
    }

    #[test]
    fn fill_slot_updates_only_matching_image() {
        let mut surface = slotted_surface();
        assert!(surface.image_sources().is_empty());

        assert!(surface.fill_slot(1, "data:image/png;base64,AAAA"));
        assert!(!surface.fill_slot(7, "ignored.png"));
        assert_eq!(surface.image_sources(), vec!["data:image/png;base64,AAAA"]);
    }

    #[test]
    fn stylesheets_are_collected() {
        let surface = slotted_surface();
        assert_eq!(
            surface.stylesheets(),
            vec!["https://fonts.example.com/poppins.css"]
        );
    }

    #[test]
    fn load_reads_json_and_yaml() {
        let dir = TempDir::new().expect("tempdir");
        let surface = slotted_surface();

        let json_path = dir.path().join("surface.json");
        std::fs::write(&json_path, serde_json::to_string(&surface).unwrap()).unwrap();
        assert_eq!(Surface::load(&json_path).expect("load json"), surface);

        let yaml_path = dir.path().join("surface.yaml");
        std::fs::write(&yaml_path, serde_yaml::to_string(&surface).unwrap()).unwrap();
        assert_eq!(Surface::load(&yaml_path).expect("load yaml"), surface);
    }

    #[test]
    fn load_rejects_missing_and_unknown_files() {
        let dir = TempDir::new().expect("tempdir");
        assert!(matches!(
            Surface::load(&dir.path().join("missing.json")),
            Err(SurfaceLoadError::NotFound(_))
        ));

        let txt = dir.path().join("surface.txt");
        std::fs::write(&txt, "{}").unwrap();
        assert!(matches!(
            Surface::load(&txt),
            Err(SurfaceLoadError::UnsupportedExtension(_))
        ));
    }
}

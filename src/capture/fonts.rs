//! Font family selection for text runs.
//!
//! Families are plain names here; Pango (through fontconfig) maps them onto
//! installed faces when the paint worker lays the text out.

use std::collections::BTreeSet;

use pango::prelude::*;

use crate::surface::Node;

/// Family used when neither the run, the surface nor the options name one.
pub const DEFAULT_FAMILY: &str = "Sans";

/// First entry of a CSS `font-family` list, with CSS generic names mapped to
/// their fontconfig aliases.
pub fn primary_family(font_family: &str) -> Option<String> {
    let first = font_family.split(',').next().unwrap_or_default();
    let cleaned = first.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if cleaned.is_empty() {
        return None;
    }
    let family = match cleaned.to_ascii_lowercase().as_str() {
        "sans-serif" | "system-ui" => "Sans".to_string(),
        "serif" => "Serif".to_string(),
        "monospace" => "Monospace".to_string(),
        _ => cleaned.to_string(),
    };
    Some(family)
}

/// Family choice for every text run of a composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontTable {
    forced: Option<String>,
    default: String,
    requested: BTreeSet<String>,
}

impl Default for FontTable {
    fn default() -> Self {
        Self {
            forced: None,
            default: DEFAULT_FAMILY.to_string(),
            requested: BTreeSet::new(),
        }
    }
}

impl FontTable {
    /// Forced family wins over a run's own family, which wins over the
    /// surface default.
    pub fn resolve(root: &Node, surface_family: Option<&str>, forced: Option<&str>) -> Self {
        let forced = forced.and_then(primary_family);
        let default = surface_family
            .and_then(primary_family)
            .unwrap_or_else(|| DEFAULT_FAMILY.to_string());

        let mut table = Self {
            forced,
            default,
            requested: BTreeSet::new(),
        };
        let mut runs = Vec::new();
        root.walk(&mut |node| {
            if let Node::Text { font_family, .. } = node {
                runs.push(font_family.clone());
            }
        });
        table.requested = runs
            .iter()
            .map(|family| table.family_for(family.as_deref()))
            .collect();

        log::debug!(
            "Resolved fonts: forced={:?}, default={}, families={:?}",
            table.forced,
            table.default,
            table.requested
        );
        table
    }

    pub fn family_for(&self, run_family: Option<&str>) -> String {
        if let Some(forced) = &self.forced {
            return forced.clone();
        }
        run_family
            .and_then(primary_family)
            .unwrap_or_else(|| self.default.clone())
    }

    /// Distinct families the composition's text runs will be laid out with.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.requested.iter().map(String::as_str)
    }

    /// Pango description for a run, sized in user-space pixels.
    pub fn description(&self, run_family: Option<&str>, size_px: f64) -> pango::FontDescription {
        let mut desc = pango::FontDescription::new();
        desc.set_family(&self.family_for(run_family));
        desc.set_absolute_size(size_px * pango::SCALE as f64);
        desc
    }
}

/// Family of the installed face Pango selects for `family`, or `None` when no
/// font backend is usable.
pub fn resolve_face(family: &str) -> Option<String> {
    let surface = cairo::ImageSurface::create(cairo::Format::ARgb32, 1, 1).ok()?;
    let ctx = cairo::Context::new(&surface).ok()?;
    let layout = pangocairo::functions::create_layout(&ctx);
    let mut desc = pango::FontDescription::new();
    desc.set_family(family);
    let font = layout.context().load_font(&desc)?;
    font.describe().family().map(|name| name.to_string())
}

use url::Url;

use super::{Color, ImageFit, Node, Rect, Surface, SurfaceSize};

/// Fluent construction of a [`Surface`] for callers that compose in code.
#[derive(Debug, Clone)]
pub struct SurfaceBuilder {
    surface: Surface,
    children: Vec<Node>,
}

impl SurfaceBuilder {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            surface: Surface::detached(size),
            children: Vec::new(),
        }
    }

    pub fn origin(mut self, origin: Url) -> Self {
        self.surface.origin = Some(origin);
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.surface.background = Some(color);
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.surface.font_family = Some(family.into());
        self
    }

    pub fn rect(mut self, bounds: Rect, fill: Color) -> Self {
        self.children.push(Node::Rect {
            bounds,
            fill,
            children: Vec::new(),
        });
        self
    }

    pub fn text(mut self, x: f32, y: f32, text: impl Into<String>, font_size: f32) -> Self {
        self.children.push(Node::Text {
            x,
            y,
            text: text.into(),
            font_size,
            color: Color::WHITE,
            font_family: None,
        });
        self
    }

    pub fn image(mut self, bounds: Rect, src: impl Into<String>) -> Self {
        self.children.push(Node::Image {
            bounds,
            src: src.into(),
            fit: ImageFit::Cover,
            slot: None,
        });
        self
    }

    /// An image placeholder bound to an upload slot; empty until filled.
    pub fn image_slot(mut self, slot: usize, bounds: Rect) -> Self {
        self.children.push(Node::Image {
            bounds,
            src: String::new(),
            fit: ImageFit::Cover,
            slot: Some(slot),
        });
        self
    }

    pub fn stylesheet(mut self, href: impl Into<String>) -> Self {
        self.children.push(Node::Stylesheet { href: href.into() });
        self
    }

    pub fn node(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    pub fn build(self) -> Surface {
        let mut surface = self.surface;
        surface.root = Some(Node::Group {
            children: self.children,
        });
        surface
    }
}

use serde::{Deserialize, Serialize};

use super::color::Color;

pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// Axis-aligned bounds in CSS pixels, relative to the surface origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn scale(&self, factor: f32) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// How an image is fitted into its bounds (`object-fit`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    #[default]
    Cover,
    Contain,
    Fill,
}

/// A laid-out node of the composition. Coordinates are absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Group {
        #[serde(default)]
        children: Vec<Node>,
    },
    #[serde(rename_all = "camelCase")]
    Rect {
        bounds: Rect,
        fill: Color,
        #[serde(default)]
        children: Vec<Node>,
    },
    #[serde(rename_all = "camelCase")]
    Text {
        x: f32,
        y: f32,
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
        #[serde(default = "default_text_color")]
        color: Color,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_family: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        bounds: Rect,
        #[serde(default)]
        src: String,
        #[serde(default)]
        fit: ImageFit,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<usize>,
    },
    Stylesheet { href: String },
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

fn default_text_color() -> Color {
    Color::WHITE
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Group { children } | Node::Rect { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Group { children } | Node::Rect { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Pre-order traversal over this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
        visit(self);
        if let Some(children) = self.children_mut() {
            for child in children {
                child.walk_mut(visit);
            }
        }
    }

    /// Removes every descendant matching `predicate`; returns how many were removed.
    pub fn retain_descendants(&mut self, predicate: &impl Fn(&Node) -> bool) -> usize {
        let Some(children) = self.children_mut() else {
            return 0;
        };
        let before = children.len();
        children.retain(|child| predicate(child));
        let mut removed = before - children.len();
        for child in children.iter_mut() {
            removed += child.retain_descendants(predicate);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_tagged_nodes_with_defaults() {
        let json = r##"{
            "type": "rect",
            "bounds": {"x": 0, "y": 0, "width": 10, "height": 10},
            "fill": "#111827",
            "children": [
                {"type": "text", "x": 1, "y": 2, "text": "Porosity"},
                {"type": "image", "bounds": {"x": 0, "y": 0, "width": 4, "height": 4}, "slot": 2},
                {"type": "stylesheet", "href": "https://fonts.example.com/poppins.css"}
            ]
        }"##;

        let node: Node = serde_json::from_str(json).expect("parse node");
        let children = node.children();
        assert_eq!(children.len(), 3);
        match &children[0] {
            Node::Text {
                font_size, color, ..
            } => {
                assert_eq!(*font_size, DEFAULT_FONT_SIZE);
                assert_eq!(*color, Color::WHITE);
            }
            other => panic!("expected text node, got {other:?}"),
        }
        match &children[1] {
            Node::Image { src, fit, slot, .. } => {
                assert!(src.is_empty());
                assert_eq!(*fit, ImageFit::Cover);
                assert_eq!(*slot, Some(2));
            }
            other => panic!("expected image node, got {other:?}"),
        }
    }

    #[test]
    fn retain_descendants_strips_nested_matches() {
        let mut root = Node::Group {
            children: vec![
                Node::Stylesheet {
                    href: "a.css".into(),
                },
                Node::Group {
                    children: vec![Node::Stylesheet {
                        href: "b.css".into(),
                    }],
                },
            ],
        };

        let removed =
            root.retain_descendants(&|node| !matches!(node, Node::Stylesheet { .. }));
        assert_eq!(removed, 2);

        let mut count = 0;
        root.walk(&mut |_| count += 1);
        assert_eq!(count, 2);
    }
}

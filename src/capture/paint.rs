use std::collections::HashMap;

use image::{Rgba, RgbaImage};

use super::fonts::{resolve_face, FontTable};
use crate::surface::{Color, ImageFit, Node, Rect};

/// Everything the paint worker needs, owned so it can move to a blocking thread.
/// Cairo and Pango objects are created on that thread and never leave it.
pub(crate) struct PaintPlan {
    pub root: Node,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub background: Color,
    pub fonts: FontTable,
    pub images: HashMap<String, RgbaImage>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum PaintError {
    #[error("cairo: {0}")]
    Cairo(#[from] cairo::Error),

    #[error("canvas buffer unavailable: {0}")]
    Borrow(#[from] cairo::BorrowError),

    #[error("canvas {0}x{1} exceeds cairo limits")]
    Size(u32, u32),
}

impl PaintPlan {
    pub fn paint(self) -> Result<RgbaImage, PaintError> {
        let (width, height) = (
            i32::try_from(self.width).map_err(|_| PaintError::Size(self.width, self.height))?,
            i32::try_from(self.height).map_err(|_| PaintError::Size(self.width, self.height))?,
        );
        let mut canvas = cairo::ImageSurface::create(cairo::Format::ARgb32, width, height)?;

        {
            let ctx = cairo::Context::new(&canvas)?;
            ctx.set_antialias(cairo::Antialias::Best);
            set_color(&ctx, self.background);
            ctx.set_operator(cairo::Operator::Source);
            ctx.paint()?;
            ctx.set_operator(cairo::Operator::Over);
            ctx.scale(self.scale as f64, self.scale as f64);

            for family in self.fonts.families() {
                match resolve_face(family) {
                    Some(face) if face.eq_ignore_ascii_case(family) => {
                        log::debug!("Font '{family}' resolved to installed face '{face}'");
                    }
                    Some(face) => log::warn!("Font '{family}' is not installed; using '{face}'"),
                    None => log::warn!("No font backend available for '{family}'"),
                }
            }

            let painter = Painter {
                ctx: &ctx,
                viewport: Rect::new(
                    0.0,
                    0.0,
                    self.width as f32 / self.scale,
                    self.height as f32 / self.scale,
                ),
                fonts: &self.fonts,
                images: &self.images,
            };
            painter.paint_node(&self.root)?;
        }

        canvas.flush();
        let stride = canvas.stride() as usize;
        let data = canvas.data()?;
        Ok(RgbaImage::from_fn(self.width, self.height, |x, y| {
            let offset = y as usize * stride + x as usize * 4;
            let mut px = [0u8; 4];
            px.copy_from_slice(&data[offset..offset + 4]);
            unpremultiply(u32::from_ne_bytes(px))
        }))
    }
}

struct Painter<'a> {
    ctx: &'a cairo::Context,
    /// Canvas bounds in CSS pixels.
    viewport: Rect,
    fonts: &'a FontTable,
    images: &'a HashMap<String, RgbaImage>,
}

impl Painter<'_> {
    fn paint_node(&self, node: &Node) -> Result<(), PaintError> {
        match node {
            Node::Group { children } => {
                for child in children {
                    self.paint_node(child)?;
                }
            }
            Node::Rect {
                bounds,
                fill,
                children,
            } => {
                self.fill_rect(*bounds, *fill)?;
                for child in children {
                    self.paint_node(child)?;
                }
            }
            Node::Text {
                x,
                y,
                text,
                font_size,
                color,
                font_family,
            } => self.draw_text(*x, *y, text, *font_size, *color, font_family.as_deref())?,
            Node::Image {
                bounds, src, fit, ..
            } => {
                // Missing or failed resources paint nothing; the region stays as is.
                if let Some(img) = self.images.get(src) {
                    self.draw_image(*bounds, img, *fit)?;
                }
            }
            Node::Stylesheet { .. } => {}
        }
        Ok(())
    }

    fn fill_rect(&self, bounds: Rect, color: Color) -> Result<(), PaintError> {
        if color.is_transparent() {
            return Ok(());
        }
        let Some(visible) = intersect(bounds, self.viewport) else {
            return Ok(());
        };
        set_color(self.ctx, color);
        rectangle(self.ctx, visible);
        self.ctx.fill()?;
        Ok(())
    }

    /// Paints `img` through a scaled pattern clipped to the visible part of
    /// its placement, so cost follows the canvas, not the node bounds.
    fn draw_image(&self, bounds: Rect, img: &RgbaImage, fit: ImageFit) -> Result<(), PaintError> {
        let (src_w, src_h) = img.dimensions();
        if src_w == 0 || src_h == 0 || bounds.is_empty() {
            return Ok(());
        }
        let (src_w, src_h) = (src_w as f64, src_h as f64);
        let (box_w, box_h) = (bounds.width as f64, bounds.height as f64);

        let (sx, sy) = match fit {
            ImageFit::Fill => (box_w / src_w, box_h / src_h),
            ImageFit::Cover => {
                let s = (box_w / src_w).max(box_h / src_h);
                (s, s)
            }
            ImageFit::Contain => {
                let s = (box_w / src_w).min(box_h / src_h);
                (s, s)
            }
        };
        let placed = Rect::new(
            (bounds.x as f64 + (box_w - src_w * sx) / 2.0) as f32,
            (bounds.y as f64 + (box_h - src_h * sy) / 2.0) as f32,
            (src_w * sx) as f32,
            (src_h * sy) as f32,
        );
        let Some(visible) = intersect(bounds, placed).and_then(|r| intersect(r, self.viewport))
        else {
            return Ok(());
        };

        let source = to_cairo_surface(img)?;

        self.ctx.save()?;
        rectangle(self.ctx, visible);
        self.ctx.clip();
        self.ctx.translate(placed.x as f64, placed.y as f64);
        self.ctx.scale(sx, sy);
        let painted = self.ctx.set_source_surface(&source, 0.0, 0.0).and_then(|()| {
            let pattern = self.ctx.source();
            pattern.set_extend(cairo::Extend::Pad);
            pattern.set_filter(cairo::Filter::Good);
            self.ctx.paint()
        });
        self.ctx.restore()?;
        painted?;
        Ok(())
    }

    /// `(x, y)` is the top-left corner of the first line box.
    fn draw_text(
        &self,
        x: f32,
        y: f32,
        text: &str,
        font_size: f32,
        color: Color,
        family: Option<&str>,
    ) -> Result<(), PaintError> {
        if color.is_transparent() || font_size <= 0.0 || text.is_empty() {
            return Ok(());
        }
        self.ctx.save()?;
        let layout = pangocairo::functions::create_layout(self.ctx);
        let desc = self.fonts.description(family, font_size as f64);
        layout.set_font_description(Some(&desc));
        layout.set_text(text);

        set_color(self.ctx, color);
        self.ctx.move_to(x as f64, y as f64);
        pangocairo::functions::show_layout(self.ctx, &layout);
        self.ctx.restore()?;
        Ok(())
    }
}

fn set_color(ctx: &cairo::Context, color: Color) {
    let [r, g, b, a] = color.to_rgba().0;
    ctx.set_source_rgba(
        r as f64 / 255.0,
        g as f64 / 255.0,
        b as f64 / 255.0,
        a as f64 / 255.0,
    );
}

fn rectangle(ctx: &cairo::Context, rect: Rect) {
    ctx.rectangle(
        rect.x as f64,
        rect.y as f64,
        rect.width as f64,
        rect.height as f64,
    );
}

fn intersect(a: Rect, b: Rect) -> Option<Rect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.width).min(b.x + b.width);
    let y1 = (a.y + a.height).min(b.y + b.height);
    (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Straight RGBA into cairo's premultiplied native-endian ARGB32.
fn to_cairo_surface(img: &RgbaImage) -> Result<cairo::ImageSurface, PaintError> {
    let (width, height) = img.dimensions();
    let (w, h) = (
        i32::try_from(width).map_err(|_| PaintError::Size(width, height))?,
        i32::try_from(height).map_err(|_| PaintError::Size(width, height))?,
    );
    let mut surface = cairo::ImageSurface::create(cairo::Format::ARgb32, w, h)?;
    let stride = surface.stride() as usize;
    {
        let mut data = surface.data()?;
        for (x, y, pixel) in img.enumerate_pixels() {
            let offset = y as usize * stride + x as usize * 4;
            data[offset..offset + 4].copy_from_slice(&premultiply(*pixel).to_ne_bytes());
        }
    }
    Ok(surface)
}

fn premultiply(Rgba([r, g, b, a]): Rgba<u8>) -> u32 {
    let mul = |c: u8| (c as u32 * a as u32 + 127) / 255;
    (a as u32) << 24 | mul(r) << 16 | mul(g) << 8 | mul(b)
}

fn unpremultiply(argb: u32) -> Rgba<u8> {
    let a = (argb >> 24) & 0xff;
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let un = |shift: u32| ((((argb >> shift) & 0xff) * 255 + a / 2) / a).min(255) as u8;
    Rgba([un(16), un(8), un(0), a as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fonts::FontTable;

    fn plan(root: Node, images: HashMap<String, RgbaImage>) -> PaintPlan {
        let fonts = FontTable::resolve(&root, None, None);
        PaintPlan {
            root,
            width: 40,
            height: 40,
            scale: 1.0,
            background: Color::TRANSPARENT,
            fonts,
            images,
        }
    }

    #[test]
    fn premultiply_round_trips_opaque_and_clear_pixels() {
        for px in [Rgba([17, 24, 39, 255]), Rgba([255, 255, 255, 255])] {
            assert_eq!(unpremultiply(premultiply(px)), px);
        }
        assert_eq!(unpremultiply(premultiply(Rgba([90, 10, 10, 0]))), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn rect_fill_is_clipped_to_canvas() {
        let root = Node::Rect {
            bounds: Rect::new(30.0, 30.0, 50.0, 50.0),
            fill: Color::rgb(255, 0, 0),
            children: Vec::new(),
        };
        let canvas = plan(root, HashMap::new()).paint().unwrap();
        assert_eq!(canvas.get_pixel(39, 39), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(10, 10)[3], 0);
    }

    #[test]
    fn missing_image_leaves_region_transparent() {
        let root = Node::Image {
            bounds: Rect::new(0.0, 0.0, 20.0, 20.0),
            src: "nowhere.png".into(),
            fit: ImageFit::Cover,
            slot: None,
        };
        let canvas = plan(root, HashMap::new()).paint().unwrap();
        assert!(canvas.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn cover_fills_whole_bounds() {
        let mut images = HashMap::new();
        images.insert(
            "wide.png".to_string(),
            RgbaImage::from_pixel(30, 10, Rgba([0, 200, 0, 255])),
        );
        let root = Node::Image {
            bounds: Rect::new(5.0, 5.0, 10.0, 10.0),
            src: "wide.png".into(),
            fit: ImageFit::Cover,
            slot: None,
        };
        let canvas = plan(root, images).paint().unwrap();
        for y in 5..15 {
            for x in 5..15 {
                assert_eq!(canvas.get_pixel(x, y), &Rgba([0, 200, 0, 255]), "pixel {x},{y}");
            }
        }
        assert_eq!(canvas.get_pixel(16, 16)[3], 0);
    }

    #[test]
    fn contain_letterboxes_inside_bounds() {
        let mut images = HashMap::new();
        images.insert(
            "wide.png".to_string(),
            RgbaImage::from_pixel(20, 10, Rgba([0, 0, 200, 255])),
        );
        let root = Node::Image {
            bounds: Rect::new(0.0, 0.0, 20.0, 20.0),
            src: "wide.png".into(),
            fit: ImageFit::Contain,
            slot: None,
        };
        let canvas = plan(root, images).paint().unwrap();
        assert_eq!(canvas.get_pixel(10, 1)[3], 0, "top letterbox stays empty");
        assert_eq!(canvas.get_pixel(10, 10), &Rgba([0, 0, 200, 255]));
    }

    #[test]
    fn image_far_larger_than_canvas_paints_only_visible_part() {
        let mut images = HashMap::new();
        images.insert(
            "hero.png".to_string(),
            RgbaImage::from_pixel(2, 2, Rgba([200, 100, 0, 255])),
        );
        let root = Node::Image {
            bounds: Rect::new(0.0, 0.0, 40_000.0, 40_000.0),
            src: "hero.png".into(),
            fit: ImageFit::Cover,
            slot: None,
        };
        let canvas = plan(root, images).paint().unwrap();
        assert_eq!(canvas.dimensions(), (40, 40));
        assert_eq!(canvas.get_pixel(20, 20), &Rgba([200, 100, 0, 255]));
    }

    #[test]
    fn text_inks_pixels_near_its_origin() {
        let root = Node::Text {
            x: 2.0,
            y: 2.0,
            text: "59.77".into(),
            font_size: 14.0,
            color: Color::WHITE,
            font_family: None,
        };
        let canvas = plan(root, HashMap::new()).paint().unwrap();
        let inked: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!inked.is_empty(), "expected glyph ink");
        assert!(inked.iter().all(|&(_, y)| (2..24).contains(&y)));
    }
}

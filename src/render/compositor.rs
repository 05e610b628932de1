//! Turns a [`RenderProjection`] into pixels.
//!
//! Draw order is z ascending with insertion order breaking ties. Missing
//! raster sources degrade to a neutral placeholder fill and text elements
//! are skipped when no fonts are loaded; neither aborts the card.

use std::path::PathBuf;

use fontdue::Font;

use crate::{
    assets::{decode::PreparedImage, store::AssetStore},
    foundation::{
        color::Color,
        error::{CardsmithError, CardsmithResult},
    },
    project::{
        DrawOp, DrawKind, ImageSource, PLACEHOLDER_FILL, RenderProjection, ResolvedImage,
        ResolvedShape, ResolvedText,
    },
    render::{
        blur::blur_premul,
        surface::Surface,
        text::{FontLibrary, measure_line, wrap_greedy},
    },
};

/// Horizontal slant per row for synthesized italics, roughly 12 degrees.
const ITALIC_SHEAR: f32 = 0.21;

pub struct Compositor {
    store: AssetStore,
    fonts: FontLibrary,
    frame: Option<PathBuf>,
}

impl Compositor {
    pub fn new(fonts: FontLibrary) -> Self {
        Self {
            store: AssetStore::new(),
            fonts,
            frame: None,
        }
    }

    /// Overlay drawn above the background and below all elements,
    /// stretched to the canvas.
    pub fn with_frame(mut self, path: impl Into<PathBuf>) -> Self {
        self.frame = Some(path.into());
        self
    }

    #[tracing::instrument(skip_all, fields(card = proj.card_index))]
    pub fn render(&mut self, proj: &RenderProjection) -> CardsmithResult<image::RgbaImage> {
        let mut surface = Surface::new(proj.canvas.width, proj.canvas.height)?;
        surface.fill(proj.background.premul());

        if let Some(frame) = self.frame.clone() {
            match self.store.load(&frame) {
                Ok(img) => {
                    let stretched =
                        resize_premul(&img, proj.canvas.width, proj.canvas.height)?;
                    surface.blit(&stretched, proj.canvas.width, proj.canvas.height, 0, 0, 1.0);
                }
                Err(err) => {
                    tracing::warn!(%err, "frame asset unavailable, rendering without it");
                }
            }
        }

        for op in proj.sorted_ops() {
            match &op.kind {
                DrawKind::Image(img) => self.draw_image(&mut surface, op, img)?,
                DrawKind::Shape(shape) => draw_shape(&mut surface, op, shape),
                DrawKind::Text(text) => self.draw_text(&mut surface, proj, op, text)?,
            }
        }

        surface.into_rgba_image()
    }

    fn draw_image(
        &mut self,
        surface: &mut Surface,
        op: &DrawOp,
        img: &ResolvedImage,
    ) -> CardsmithResult<()> {
        let bw = img.size.w.max(0.0).round() as i64;
        let bh = img.size.h.max(0.0).round() as i64;
        if bw == 0 || bh == 0 {
            return Ok(());
        }
        let x = op.pos.x.round() as i64;
        let y = op.pos.y.round() as i64;

        let prepared = match &img.source {
            ImageSource::Placeholder(color) => {
                surface.fill_rect(x, y, bw, bh, color.premul(), op.opacity);
                return Ok(());
            }
            ImageSource::File(path) => match self.store.load(path) {
                Ok(prepared) => prepared,
                Err(err) => {
                    tracing::warn!(id = %op.id, %err, "using placeholder fill");
                    surface.fill_rect(x, y, bw, bh, PLACEHOLDER_FILL.premul(), op.opacity);
                    return Ok(());
                }
            },
        };

        // Aspect-preserving fit, centered inside the element box.
        let scale = (bw as f64 / f64::from(prepared.width))
            .min(bh as f64 / f64::from(prepared.height));
        let dw = ((f64::from(prepared.width) * scale).round() as i64).max(1);
        let dh = ((f64::from(prepared.height) * scale).round() as i64).max(1);
        let ox = x + (bw - dw) / 2;
        let oy = y + (bh - dh) / 2;

        let scaled = resize_premul(&prepared, dw as u32, dh as u32)?;
        surface.blit(&scaled, dw as u32, dh as u32, ox, oy, op.opacity);
        Ok(())
    }

    fn draw_text(
        &self,
        surface: &mut Surface,
        proj: &RenderProjection,
        op: &DrawOp,
        text: &ResolvedText,
    ) -> CardsmithResult<()> {
        let Some(font) = self
            .fonts
            .resolve(&text.font.family, text.font.bold, text.font.italic)
        else {
            tracing::warn!(id = %op.id, "no fonts loaded, skipping text element");
            return Ok(());
        };
        let px = text.font.size;
        if px <= 0.0 || text.text.is_empty() {
            return Ok(());
        }

        let (ascent, line_height) = font
            .horizontal_line_metrics(px)
            .map(|m| (m.ascent, m.new_line_size))
            .unwrap_or((px * 0.8, px * 1.2));

        let lines = match text.wrap_width {
            Some(max) => wrap_greedy(&text.text, max as f32, |s| measure_line(font, s, px)),
            None => text.text.split('\n').map(str::to_string).collect(),
        };
        let shear = if text.font.italic { ITALIC_SHEAR } else { 0.0 };

        let run = TextRun {
            font,
            lines: &lines,
            x: op.pos.x as f32,
            top: op.pos.y as f32,
            px,
            ascent,
            line_height,
            bold: text.font.bold,
            underline: text.font.underline,
            shear,
        };

        if let Some(shadow) = &text.shadow {
            let mut scratch = Surface::new(proj.canvas.width, proj.canvas.height)?;
            run.offset(shadow.offset[0] as f32, shadow.offset[1] as f32)
                .draw(&mut scratch, shadow.color, 1.0);
            let scratch = if shadow.blur > 0.0 {
                blur_premul(&scratch, shadow.blur.ceil() as u32, (shadow.blur / 2.0) as f32)?
            } else {
                scratch
            };
            surface.blit(
                scratch.data(),
                proj.canvas.width,
                proj.canvas.height,
                0,
                0,
                op.opacity,
            );
        }

        run.draw(surface, text.color, op.opacity);
        Ok(())
    }
}

/// One positioned block of laid-out lines, drawable more than once
/// (shadow pass, then the face itself).
struct TextRun<'a> {
    font: &'a Font,
    lines: &'a [String],
    x: f32,
    top: f32,
    px: f32,
    ascent: f32,
    line_height: f32,
    bold: bool,
    underline: bool,
    shear: f32,
}

impl TextRun<'_> {
    fn offset(&self, dx: f32, dy: f32) -> TextRun<'_> {
        TextRun {
            x: self.x + dx,
            top: self.top + dy,
            lines: self.lines,
            ..*self
        }
    }

    fn draw(&self, target: &mut Surface, color: Color, opacity: f32) {
        let premul = color.premul();
        for (i, line) in self.lines.iter().enumerate() {
            let baseline = self.top + self.ascent + i as f32 * self.line_height;
            self.draw_line(target, line, self.x, baseline, premul, opacity);
            if self.bold {
                // Synthesized bold: a second strike one pixel over.
                self.draw_line(target, line, self.x + 1.0, baseline, premul, opacity);
            }
            if self.underline && !line.is_empty() {
                let width = measure_line(self.font, line, self.px);
                let thickness = (self.px / 14.0).round().max(1.0) as i64;
                target.fill_rect(
                    self.x.round() as i64,
                    (baseline + thickness as f32).round() as i64,
                    width.round() as i64,
                    thickness,
                    premul,
                    opacity,
                );
            }
        }
    }

    fn draw_line(
        &self,
        target: &mut Surface,
        line: &str,
        x: f32,
        baseline: f32,
        premul: [u8; 4],
        opacity: f32,
    ) {
        let mut pen = x;
        for ch in line.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.px);
            if metrics.width > 0 && metrics.height > 0 {
                let gx = (pen + metrics.xmin as f32).round() as i64;
                let gy =
                    (baseline - metrics.ymin as f32 - metrics.height as f32).round() as i64;
                target.draw_mask(
                    &bitmap,
                    metrics.width as u32,
                    metrics.height as u32,
                    gx,
                    gy,
                    premul,
                    opacity,
                    self.shear,
                );
            }
            pen += metrics.advance_width;
        }
    }
}

fn draw_shape(surface: &mut Surface, op: &DrawOp, shape: &ResolvedShape) {
    let w = shape.size.w.max(0.0).round() as i64;
    let h = shape.size.h.max(0.0).round() as i64;
    if w == 0 || h == 0 {
        return;
    }
    let x = op.pos.x.round() as i64;
    let y = op.pos.y.round() as i64;

    if let Some(brush) = &shape.brush {
        surface.fill_rect(x, y, w, h, brush.color.premul(), op.opacity);
    }

    let pw = shape.pen.width.max(0.0).round() as i64;
    if pw > 0 {
        let premul = shape.pen.color.premul();
        surface.fill_rect(x, y, w, pw, premul, op.opacity);
        surface.fill_rect(x, y + h - pw, w, pw, premul, op.opacity);
        surface.fill_rect(x, y + pw, pw, h - 2 * pw, premul, op.opacity);
        surface.fill_rect(x + w - pw, y + pw, pw, h - 2 * pw, premul, op.opacity);
    }
}

fn resize_premul(img: &PreparedImage, dw: u32, dh: u32) -> CardsmithResult<Vec<u8>> {
    if dw == img.width && dh == img.height {
        return Ok(img.rgba8_premul.as_ref().clone());
    }
    let src = image::RgbaImage::from_raw(img.width, img.height, img.rgba8_premul.as_ref().clone())
        .ok_or_else(|| CardsmithError::render("prepared image buffer does not match dimensions"))?;
    Ok(image::imageops::resize(&src, dw, dh, image::imageops::FilterType::Lanczos3).into_raw())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use indexmap::IndexMap;

    use super::*;
    use crate::{
        data::deck::CardRow,
        foundation::geom::{Position, Size},
        layout::{BrushSpec, LayoutDocument, PenSpec},
        project::project,
    };

    fn write_png(path: &Path, w: u32, h: u32, rgba: [u8; 4]) {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(path, buf).unwrap();
    }

    fn shape_op(seq: usize, z: f64, pos: Position, size: Size, fill: Color) -> DrawOp {
        DrawOp {
            id: format!("shape{seq}"),
            pos,
            z,
            seq,
            opacity: 1.0,
            kind: DrawKind::Shape(ResolvedShape {
                size,
                pen: PenSpec {
                    color: fill,
                    width: 0.0,
                },
                brush: Some(BrushSpec { color: fill }),
            }),
        }
    }

    fn bare_projection(w: u32, h: u32, background: Color, ops: Vec<DrawOp>) -> RenderProjection {
        RenderProjection {
            canvas: crate::foundation::geom::Canvas::new(w, h).unwrap(),
            dpi: 300,
            background,
            card_index: 0,
            card_name: "test".into(),
            ops,
        }
    }

    #[test]
    fn background_fills_canvas() {
        let proj = bare_projection(4, 4, Color::rgb(28, 28, 28), Vec::new());
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [28, 28, 28, 255]);
        assert_eq!(img.get_pixel(3, 3).0, [28, 28, 28, 255]);
    }

    #[test]
    fn higher_z_draws_on_top() {
        let red = shape_op(0, 5.0, Position::new(0.0, 0.0), Size::new(4.0, 4.0), Color::rgb(255, 0, 0));
        let blue = shape_op(1, 1.0, Position::new(0.0, 0.0), Size::new(4.0, 4.0), Color::rgb(0, 0, 255));
        // Blue inserted after red but sits below it.
        let proj = bare_projection(4, 4, Color::BLACK, vec![red, blue]);
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();
        assert_eq!(img.get_pixel(2, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn equal_z_uses_insertion_order() {
        let first = shape_op(0, 3.0, Position::new(0.0, 0.0), Size::new(4.0, 4.0), Color::rgb(255, 0, 0));
        let second = shape_op(1, 3.0, Position::new(0.0, 0.0), Size::new(4.0, 4.0), Color::rgb(0, 255, 0));
        let proj = bare_projection(4, 4, Color::BLACK, vec![first, second]);
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();
        assert_eq!(img.get_pixel(2, 2).0, [0, 255, 0, 255]);
    }

    #[test]
    fn image_fit_letterboxes_and_centers() {
        let dir = tempfile::tempdir().unwrap();
        let art = dir.path().join("wide.png");
        write_png(&art, 2, 1, [255, 0, 0, 255]);

        let op = DrawOp {
            id: "artwork".into(),
            pos: Position::new(0.0, 0.0),
            z: 1.0,
            seq: 0,
            opacity: 1.0,
            kind: DrawKind::Image(ResolvedImage {
                source: ImageSource::File(art),
                size: Size::new(4.0, 4.0),
            }),
        };
        let proj = bare_projection(4, 4, Color::BLACK, vec![op]);
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();

        // A 2x1 source in a 4x4 box scales to 4x2 centered at y = 1..3.
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert!(img.get_pixel(1, 2).0[0] > 200);
        assert_eq!(img.get_pixel(0, 3).0, [0, 0, 0, 255]);
    }

    #[test]
    fn placeholder_source_fills_element_box() {
        let op = DrawOp {
            id: "artwork".into(),
            pos: Position::new(1.0, 1.0),
            z: 1.0,
            seq: 0,
            opacity: 1.0,
            kind: DrawKind::Image(ResolvedImage {
                source: ImageSource::Placeholder(PLACEHOLDER_FILL),
                size: Size::new(2.0, 2.0),
            }),
        };
        let proj = bare_projection(4, 4, Color::BLACK, vec![op]);
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();
        assert_eq!(img.get_pixel(1, 1).0, [45, 60, 75, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn element_opacity_blends_once() {
        let mut op = shape_op(0, 1.0, Position::new(0.0, 0.0), Size::new(2.0, 2.0), Color::WHITE);
        op.opacity = 0.5;
        let proj = bare_projection(2, 2, Color::BLACK, vec![op]);
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();
        let px = img.get_pixel(0, 0).0;
        assert!(px[0] > 110 && px[0] < 145, "got {px:?}");
    }

    #[test]
    fn shape_pen_strokes_border_only() {
        let op = DrawOp {
            id: "decor".into(),
            pos: Position::new(0.0, 0.0),
            z: 1.0,
            seq: 0,
            opacity: 1.0,
            kind: DrawKind::Shape(ResolvedShape {
                size: Size::new(4.0, 4.0),
                pen: PenSpec {
                    color: Color::rgb(255, 0, 0),
                    width: 1.0,
                },
                brush: None,
            }),
        };
        let proj = bare_projection(4, 4, Color::BLACK, vec![op]);
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(3, 1).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn default_template_renders_without_fonts_or_assets() {
        let doc = LayoutDocument::default_template();
        let proj = project(&doc, &CardRow::new(0, IndexMap::new())).unwrap();
        let img = Compositor::new(FontLibrary::empty()).render(&proj).unwrap();
        assert_eq!(img.width(), 744);
        assert_eq!(img.height(), 1038);
        // Background outside any element.
        assert_eq!(img.get_pixel(0, 0).0, [28, 28, 28, 255]);
        // Artwork placeholder fill inside its box (112,160 .. 632,480).
        assert_eq!(img.get_pixel(300, 300).0, [45, 60, 75, 255]);
    }

    #[test]
    fn missing_frame_is_tolerated() {
        let proj = bare_projection(2, 2, Color::BLACK, Vec::new());
        let img = Compositor::new(FontLibrary::empty())
            .with_frame("/no/frame.png")
            .render(&proj)
            .unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }
}

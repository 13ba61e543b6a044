use std::collections::HashMap;
use std::sync::Arc;

use fontdue::layout::{CoordinateSystem, GlyphRasterConfig, Layout, LayoutSettings, TextStyle};
use fontdue::Font;
use image::RgbaImage;
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint,
    PremultipliedColorU8, Transform,
};

use crate::error::SurfaceError;
use crate::style::Rgba8;
use crate::text::{check_mark_advance, FontMeasurer, MonospaceMeasurer, TextMeasurer};

pub use crate::text::CHECK_MARK;

#[derive(Debug, Clone, Copy, PartialEq)]
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

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// Drawing backend for one frame. Text is placed by its top edge.
pub trait DrawingSurface {
    type Output: Send;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn draw_image_scaled(&mut self, image: &RgbaImage, dest: Rect) -> Result<(), SurfaceError>;
    fn fill_rect(&mut self, rect: Rect, color: Rgba8);
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba8);
    fn fill_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Rgba8,
    ) -> Result<(), SurfaceError>;
    fn measure_text(&self, text: &str, font_size: f32) -> f32;
    fn finish(self) -> Result<Self::Output, SurfaceError>;
}

/// Largest usable corner radius; anything above half the short side would
/// make the outline cross itself.
pub fn clamp_corner_radius(width: f32, height: f32, radius: f32) -> f32 {
    let limit = (width.min(height) / 2.0).max(0.0);
    radius.clamp(0.0, limit)
}

pub fn rounded_rect_path(rect: Rect, radius: f32) -> Option<Path> {
    let Rect {
        x,
        y,
        width: w,
        height: h,
    } = rect;
    let r = clamp_corner_radius(w, h, radius);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(tiny_skia::Rect::from_xywh(x, y, w, h)?));
    }

    // Cubic approximation of a quarter circle.
    let k = 0.552_284_8 * r;
    let mut builder = PathBuilder::new();
    builder.move_to(x + r, y);
    builder.line_to(x + w - r, y);
    builder.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    builder.line_to(x + w, y + h - r);
    builder.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    builder.line_to(x + r, y + h);
    builder.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    builder.line_to(x, y + r);
    builder.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    builder.close();
    builder.finish()
}

fn check_mark_path(x: f32, y: f32, size: f32) -> Option<Path> {
    let point = |px: f32, py: f32| (x + px * size, y + py * size);
    let outline = [
        point(0.08, 0.55),
        point(0.20, 0.43),
        point(0.38, 0.61),
        point(0.76, 0.23),
        point(0.88, 0.35),
        point(0.38, 0.85),
    ];

    let mut builder = PathBuilder::new();
    builder.move_to(outline[0].0, outline[0].1);
    for (px, py) in &outline[1..] {
        builder.line_to(*px, *py);
    }
    builder.close();
    builder.finish()
}

fn solid_paint(color: Rgba8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

#[derive(Debug, Clone)]
struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

/// CPU canvas backed by a tiny-skia pixmap with fontdue glyph rasterization.
pub struct PixmapSurface {
    pixmap: Pixmap,
    font: Option<FontMeasurer>,
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        let pixmap = Pixmap::new(width, height).ok_or(SurfaceError::Allocate { width, height })?;
        Ok(Self {
            pixmap,
            font: None,
            glyph_cache: HashMap::new(),
        })
    }

    pub fn with_font(mut self, font: Arc<Font>) -> Self {
        self.font = Some(FontMeasurer::new(font));
        self
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    fn draw_run(&mut self, font: &Font, text: &str, x: f32, y: f32, font_size: f32, color: Rgba8) {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x,
            y,
            max_width: None,
            max_height: None,
            horizontal_align: fontdue::layout::HorizontalAlign::Left,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: fontdue::layout::WrapStyle::Letter,
            wrap_hard_breaks: false,
        });
        layout.append(&[font], &TextStyle::new(text, font_size, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let glyph_bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, bitmap) = font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    bitmap,
                }
            });

            blend_glyph(
                &mut self.pixmap,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                glyph_bitmap,
                color,
            );
        }
    }
}

impl DrawingSurface for PixmapSurface {
    type Output = RgbaImage;

    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn draw_image_scaled(&mut self, image: &RgbaImage, dest: Rect) -> Result<(), SurfaceError> {
        let (source_width, source_height) = image.dimensions();
        if source_width == 0 || source_height == 0 || dest.width <= 0.0 || dest.height <= 0.0 {
            return Ok(());
        }

        let mut source = Pixmap::new(source_width, source_height).ok_or(SurfaceError::Allocate {
            width: source_width,
            height: source_height,
        })?;
        for (target, pixel) in source.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = pixel.0;
            *target = ColorU8::from_rgba(r, g, b, a).premultiply();
        }

        let transform = Transform::from_row(
            dest.width / source_width as f32,
            0.0,
            0.0,
            dest.height / source_height as f32,
            dest.x,
            dest.y,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        let Some(area) = tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
            return;
        };
        self.pixmap
            .fill_rect(area, &solid_paint(color), Transform::identity(), None);
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba8) {
        let Some(path) = rounded_rect_path(rect, radius) else {
            return;
        };
        self.pixmap.fill_path(
            &path,
            &solid_paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    fn fill_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Rgba8,
    ) -> Result<(), SurfaceError> {
        let measurer = self.font.clone().ok_or(SurfaceError::MissingFont)?;

        let mut cursor = x;
        let mut run = String::new();
        for ch in text.chars() {
            if !measurer.draws_check_as_path(ch) {
                run.push(ch);
                continue;
            }
            if !run.is_empty() {
                self.draw_run(measurer.font(), &run, cursor, y, font_size, color);
                cursor += measurer.measure(&run, font_size);
                run.clear();
            }
            if let Some(path) = check_mark_path(cursor, y, font_size) {
                self.pixmap.fill_path(
                    &path,
                    &solid_paint(color),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
            cursor += check_mark_advance(font_size);
        }
        if !run.is_empty() {
            self.draw_run(measurer.font(), &run, cursor, y, font_size, color);
        }
        Ok(())
    }

    fn measure_text(&self, text: &str, font_size: f32) -> f32 {
        match &self.font {
            Some(measurer) => measurer.measure(text, font_size),
            None => MonospaceMeasurer::default().measure(text, font_size),
        }
    }

    fn finish(self) -> Result<RgbaImage, SurfaceError> {
        let mut image = RgbaImage::new(self.pixmap.width(), self.pixmap.height());
        for (target, pixel) in image.pixels_mut().zip(self.pixmap.pixels()) {
            let color = pixel.demultiply();
            *target = image::Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
        }
        Ok(image)
    }
}

fn blend_glyph(pixmap: &mut Pixmap, x: i32, y: i32, glyph: &GlyphBitmap, color: Rgba8) {
    let frame_width = pixmap.width() as i32;
    let frame_height = pixmap.height() as i32;

    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height {
            continue;
        }

        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width {
                continue;
            }

            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }

            let alpha = ((u16::from(mask) * u16::from(color.a)) / 255) as u8;
            blend_pixel(
                pixmap,
                px as u32,
                py as u32,
                Rgba8::rgba(color.r, color.g, color.b, alpha),
            );
        }
    }
}

fn blend_pixel(pixmap: &mut Pixmap, x: u32, y: u32, color: Rgba8) {
    if x >= pixmap.width() || y >= pixmap.height() || color.a == 0 {
        return;
    }

    let alpha = f32::from(color.a) / 255.0;
    let src = [
        f32::from(color.r) * alpha,
        f32::from(color.g) * alpha,
        f32::from(color.b) * alpha,
        f32::from(color.a),
    ];

    let index = (y * pixmap.width() + x) as usize;
    if let Some(pixel) = pixmap.pixels_mut().get_mut(index) {
        let dst = [
            f32::from(pixel.red()),
            f32::from(pixel.green()),
            f32::from(pixel.blue()),
            f32::from(pixel.alpha()),
        ];
        let out = |channel: usize| {
            (src[channel] + dst[channel] * (1.0 - alpha))
                .clamp(0.0, 255.0)
                .round() as u8
        };

        let alpha_out = out(3);
        let clamp = |value: u8| value.min(alpha_out);
        if let Some(blended) =
            PremultipliedColorU8::from_rgba(clamp(out(0)), clamp(out(1)), clamp(out(2)), alpha_out)
        {
            *pixel = blended;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Image { dest: Rect },
    Rect { rect: Rect, color: Rgba8 },
    RoundedRect { rect: Rect, radius: f32, color: Rgba8 },
    Text {
        text: String,
        x: f32,
        y: f32,
        font_size: f32,
        color: Rgba8,
    },
}

/// Keeps the draw calls instead of pixels. Lets layout checks and tests run
/// without a font file.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    measurer: MonospaceMeasurer,
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            measurer: MonospaceMeasurer::default(),
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }
}

impl DrawingSurface for RecordingSurface {
    type Output = Vec<DrawOp>;

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn draw_image_scaled(&mut self, _image: &RgbaImage, dest: Rect) -> Result<(), SurfaceError> {
        self.ops.push(DrawOp::Image { dest });
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.ops.push(DrawOp::Rect { rect, color });
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba8) {
        self.ops.push(DrawOp::RoundedRect {
            rect,
            radius: clamp_corner_radius(rect.width, rect.height, radius),
            color,
        });
    }

    fn fill_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Rgba8,
    ) -> Result<(), SurfaceError> {
        self.ops.push(DrawOp::Text {
            text: text.to_owned(),
            x,
            y,
            font_size,
            color,
        });
        Ok(())
    }

    fn measure_text(&self, text: &str, font_size: f32) -> f32 {
        self.measurer.measure(text, font_size)
    }

    fn finish(self) -> Result<Vec<DrawOp>, SurfaceError> {
        Ok(self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(surface: &PixmapSurface, x: u32, y: u32) -> [u8; 4] {
        let color = surface.pixmap().pixel(x, y).unwrap().demultiply();
        [color.red(), color.green(), color.blue(), color.alpha()]
    }

    #[test]
    fn corner_radius_is_clamped_to_half_short_side() {
        assert_eq!(clamp_corner_radius(100.0, 20.0, 34.0), 10.0);
        assert_eq!(clamp_corner_radius(100.0, 80.0, 34.0), 34.0);
        assert_eq!(clamp_corner_radius(4.0, 4.0, -3.0), 0.0);
    }

    #[test]
    fn tiny_bubble_path_is_still_valid() {
        let path = rounded_rect_path(Rect::new(10.0, 10.0, 6.0, 4.0), 40.0)
            .expect("clamped radius should give a valid path");
        let bounds = path.bounds();
        assert!(bounds.width() <= 6.0 + 1e-3);
        assert!(bounds.height() <= 4.0 + 1e-3);
    }

    #[test]
    fn fills_blend_over_opaque_background() {
        let mut surface = PixmapSurface::new(40, 40).unwrap();
        surface.fill_rect(Rect::new(0.0, 0.0, 40.0, 40.0), Rgba8::rgb(255, 255, 255));
        surface.fill_rect(Rect::new(0.0, 0.0, 20.0, 40.0), Rgba8::rgba(0, 0, 0, 128));
        surface.fill_rounded_rect(Rect::new(20.0, 0.0, 20.0, 20.0), 10.0, Rgba8::rgb(255, 0, 0));

        let shaded = pixel(&surface, 5, 30);
        assert!(shaded[0] > 110 && shaded[0] < 145, "got {shaded:?}");
        assert_eq!(shaded[3], 255);

        assert_eq!(pixel(&surface, 30, 10), [255, 0, 0, 255]);
        // Rounded corner leaves the extreme corner untouched.
        assert_eq!(pixel(&surface, 39, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn scaled_image_covers_destination() {
        let mut surface = PixmapSurface::new(32, 32).unwrap();
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([10, 200, 30, 255]));
        surface
            .draw_image_scaled(&image, Rect::new(0.0, 0.0, 32.0, 32.0))
            .unwrap();
        let output = surface.finish().unwrap();
        for (x, y) in [(16, 16), (0, 31), (31, 0)] {
            let got = output.get_pixel(x, y).0;
            for (channel, expected) in [10_u8, 200, 30, 255].into_iter().enumerate() {
                assert!(
                    got[channel].abs_diff(expected) <= 2,
                    "pixel ({x},{y}) = {got:?}"
                );
            }
        }
    }

    #[test]
    fn text_without_font_is_a_surface_error() {
        let mut surface = PixmapSurface::new(8, 8).unwrap();
        let error = surface
            .fill_text("hi", 0.0, 0.0, 12.0, Rgba8::rgb(0, 0, 0))
            .unwrap_err();
        assert!(matches!(error, SurfaceError::MissingFont));
    }

    #[test]
    fn zero_sized_canvas_fails_to_allocate() {
        assert!(matches!(
            PixmapSurface::new(0, 10),
            Err(SurfaceError::Allocate { .. })
        ));
    }

    #[test]
    fn recording_surface_keeps_clamped_radius() {
        let mut surface = RecordingSurface::new(100, 100);
        surface.fill_rounded_rect(Rect::new(0.0, 0.0, 30.0, 10.0), 34.0, Rgba8::rgb(1, 2, 3));
        let ops = surface.finish().unwrap();
        assert_eq!(
            ops,
            vec![DrawOp::RoundedRect {
                rect: Rect::new(0.0, 0.0, 30.0, 10.0),
                radius: 5.0,
                color: Rgba8::rgb(1, 2, 3),
            }]
        );
    }
}

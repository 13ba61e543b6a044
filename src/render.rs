use image::RgbaImage;

use crate::error::Result;
use crate::layout::PlacedBubble;
use crate::message::Sender;
use crate::status::ResolvedStatus;
use crate::style::{ChatStyle, Rgba8};
use crate::surface::{DrawingSurface, Rect, CHECK_MARK};
use crate::viewport::intersects;

const TYPING_DOT_COUNT: usize = 3;

/// Shared, read-only inputs for drawing any frame of one conversation.
pub struct FrameRenderer<'a> {
    statuses: &'a [Option<ResolvedStatus>],
    style: &'a ChatStyle,
    background: Option<&'a RgbaImage>,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(
        statuses: &'a [Option<ResolvedStatus>],
        style: &'a ChatStyle,
        background: Option<&'a RgbaImage>,
    ) -> Self {
        Self {
            statuses,
            style,
            background,
        }
    }

    /// Draws one frame's stacked bubbles and returns the message indices that
    /// actually hit the canvas.
    pub fn render<S: DrawingSurface>(
        &self,
        state: usize,
        bubbles: &[PlacedBubble],
        offset: f32,
        surface: &mut S,
    ) -> Result<Vec<usize>> {
        let canvas_width = surface.width() as f32;
        let canvas_height = surface.height() as f32;
        let canvas = Rect::new(0.0, 0.0, canvas_width, canvas_height);

        match self.background {
            Some(image) => {
                let (width, height) = image.dimensions();
                surface.draw_image_scaled(image, cover_rect(width, height, canvas))?
            }
            None => surface.fill_rect(canvas, self.style.theme.background),
        }

        let mut drawn = Vec::with_capacity(bubbles.len());
        for placed in bubbles {
            if !intersects(placed, offset, canvas_height) {
                continue;
            }
            self.draw_bubble(placed, state, offset, surface)?;
            drawn.push(placed.bubble.source_index);
        }

        self.draw_title(canvas_width, surface)?;
        Ok(drawn)
    }

    fn draw_bubble<S: DrawingSurface>(
        &self,
        placed: &PlacedBubble,
        state: usize,
        offset: f32,
        surface: &mut S,
    ) -> Result<()> {
        let style = self.style;
        let bubble = &placed.bubble;
        let body = Rect::new(placed.x, placed.y - offset, bubble.width, bubble.height);

        surface.fill_rounded_rect(
            body.translate(style.shadow.dx, style.shadow.dy),
            style.corner_radius,
            style.shadow.color,
        );

        let (fill, text_color) = match bubble.sender {
            Sender::Sender => (style.theme.sender_fill, style.theme.sender_text),
            Sender::Receiver => (style.theme.receiver_fill, style.theme.receiver_text),
        };
        surface.fill_rounded_rect(body, style.corner_radius, fill);

        if bubble.is_typing {
            self.draw_typing_dots(body, state, surface);
            return Ok(());
        }

        for (row, line) in bubble.lines.iter().enumerate() {
            surface.fill_text(
                line,
                body.x + style.padding_x,
                body.y + style.padding_y + row as f32 * bubble.line_height,
                style.font_size,
                text_color,
            )?;
        }

        if bubble.sender == Sender::Sender {
            let status = self
                .statuses
                .get(bubble.source_index)
                .copied()
                .flatten()
                .unwrap_or(ResolvedStatus::Delivered);
            self.draw_ticks(body, status, surface)?;
        }
        Ok(())
    }

    fn draw_typing_dots<S: DrawingSurface>(&self, body: Rect, state: usize, surface: &mut S) {
        let radius = (self.style.font_size * 0.16).max(1.0);
        let spacing = self.style.font_size * 0.55;
        let center_x = body.x + body.width / 2.0;
        let center_y = body.y + body.height / 2.0;
        let active = state % TYPING_DOT_COUNT;

        for dot in 0..TYPING_DOT_COUNT {
            let dx = (dot as f32 - 1.0) * spacing;
            let color = if dot == active {
                self.style.theme.typing_dot_active
            } else {
                self.style.theme.typing_dot
            };
            surface.fill_rounded_rect(
                Rect::new(
                    center_x + dx - radius,
                    center_y - radius,
                    radius * 2.0,
                    radius * 2.0,
                ),
                radius,
                color,
            );
        }
    }

    fn draw_ticks<S: DrawingSurface>(
        &self,
        body: Rect,
        status: ResolvedStatus,
        surface: &mut S,
    ) -> Result<()> {
        let (glyph, color) = tick_glyph(status, self.style);
        let size = self.style.tick_font_size();
        let width = surface.measure_text(&glyph, size);
        let (inset_x, inset_y) = self.style.tick_inset();
        let x = body.x + body.width - inset_x - width;
        let y = body.y + body.height - size - inset_y;
        surface.fill_text(&glyph, x, y, size, color)?;
        Ok(())
    }

    fn draw_title<S: DrawingSurface>(&self, canvas_width: f32, surface: &mut S) -> Result<()> {
        let Some(title) = self.style.title.as_deref().map(str::trim) else {
            return Ok(());
        };
        if title.is_empty() {
            return Ok(());
        }

        let band = self.style.title_band_height();
        surface.fill_rect(
            Rect::new(0.0, 0.0, canvas_width, band),
            self.style.theme.title_band,
        );

        let size = self.style.title_font_size();
        let width = surface.measure_text(title, size);
        surface.fill_text(
            title,
            ((canvas_width - width) / 2.0).max(0.0),
            (band - size) / 2.0,
            size,
            self.style.theme.title_text,
        )?;
        Ok(())
    }
}

/// Destination for an image scaled to fill `canvas` without distortion,
/// centred, with any overflow left for the surface to clip.
pub fn cover_rect(image_width: u32, image_height: u32, canvas: Rect) -> Rect {
    if image_width == 0 || image_height == 0 {
        return canvas;
    }
    let scale = (canvas.width / image_width as f32).max(canvas.height / image_height as f32);
    let width = image_width as f32 * scale;
    let height = image_height as f32 * scale;
    Rect::new(
        canvas.x + (canvas.width - width) / 2.0,
        canvas.y + (canvas.height - height) / 2.0,
        width,
        height,
    )
}

pub fn tick_glyph(status: ResolvedStatus, style: &ChatStyle) -> (String, Rgba8) {
    match status {
        ResolvedStatus::Sent => (CHECK_MARK.to_string(), style.theme.tick),
        ResolvedStatus::Delivered => ([CHECK_MARK; 2].iter().collect(), style.theme.tick),
        ResolvedStatus::Seen => ([CHECK_MARK; 2].iter().collect(), style.theme.tick_seen),
    }
}

use serde::Serialize;

use crate::error::Result;
use crate::message::{Message, Sender};
use crate::style::ChatStyle;
use crate::text::{measure_checked, wrap, TextMeasurer, CHECK_MARK};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bubble {
    pub source_index: usize,
    pub sender: Sender,
    pub is_typing: bool,
    pub lines: Vec<String>,
    pub line_height: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedBubble {
    #[serde(flatten)]
    pub bubble: Bubble,
    pub x: f32,
    pub y: f32,
}

impl PlacedBubble {
    pub fn bottom(&self) -> f32 {
        self.y + self.bubble.height
    }
}

/// Every bubble of a conversation in arrival order with absolute canvas
/// positions. Built once and shared by all frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    bubbles: Vec<PlacedBubble>,
}

impl LayoutPlan {
    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlacedBubble> {
        self.bubbles.get(index)
    }

    pub fn bubbles(&self) -> &[PlacedBubble] {
        &self.bubbles
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedBubble> {
        self.bubbles.iter()
    }
}

pub fn measure_bubble<M>(
    index: usize,
    message: &Message,
    style: &ChatStyle,
    measurer: &M,
) -> Result<Bubble>
where
    M: TextMeasurer + ?Sized,
{
    let line_height = style.line_height();

    if message.typing {
        let (width, height) = style.typing_bubble_size();
        return Ok(Bubble {
            source_index: index,
            sender: message.sender,
            is_typing: true,
            lines: Vec::new(),
            line_height,
            width: width.min(style.max_bubble_width()),
            height,
        });
    }

    let lines = wrap(
        message.text.trim(),
        style.text_max_width(),
        style.font_size,
        measurer,
    )?;

    let mut widest = 0.0_f32;
    for line in &lines {
        widest = widest.max(measure_checked(measurer, line, style.font_size)?);
    }

    let mut width = (widest.ceil() + 2.0 * style.padding_x).min(style.max_bubble_width());
    let mut height = (lines.len() as f32 * line_height + 2.0 * style.padding_y).ceil();

    if message.sender == Sender::Sender {
        (width, height) = reserve_tick_room(&lines, width, height, style, measurer)?;
    }

    Ok(Bubble {
        source_index: index,
        sender: message.sender,
        is_typing: false,
        lines,
        line_height,
        width,
        height,
    })
}

/// Grows a sender bubble so its bottom-right ticks clear the last text line:
/// wider when the ticks fit beside that line under the width cap, otherwise
/// taller by a tick row.
fn reserve_tick_room<M>(
    lines: &[String],
    width: f32,
    height: f32,
    style: &ChatStyle,
    measurer: &M,
) -> Result<(f32, f32)>
where
    M: TextMeasurer + ?Sized,
{
    // Delivered and seen use the widest glyph.
    let widest_ticks: String = [CHECK_MARK; 2].iter().collect();
    let tick_size = style.tick_font_size();
    let tick_width = measure_checked(measurer, &widest_ticks, tick_size)?;
    let (inset_x, inset_y) = style.tick_inset();

    let last_width = match lines.last() {
        Some(line) => measure_checked(measurer, line, style.font_size)?,
        None => 0.0,
    };
    let beside =
        (style.padding_x + last_width + style.tick_spacing() + tick_width + inset_x).ceil();
    if beside <= width {
        return Ok((width, height));
    }
    if beside <= style.max_bubble_width() {
        return Ok((beside, height));
    }

    let last_bottom = style.padding_y
        + lines.len().saturating_sub(1) as f32 * style.line_height()
        + style.font_size;
    let tick_top = height - tick_size - inset_y;
    Ok((width, height + (last_bottom - tick_top).max(0.0).ceil()))
}

pub fn layout<M>(messages: &[Message], style: &ChatStyle, measurer: &M) -> Result<LayoutPlan>
where
    M: TextMeasurer + ?Sized,
{
    let mut bubbles = Vec::with_capacity(messages.len());
    let mut y = style.content_top();

    for (index, message) in messages.iter().enumerate() {
        let bubble = measure_bubble(index, message, style, measurer)?;
        let x = match bubble.sender {
            Sender::Sender => style.width as f32 - style.margin_sides - bubble.width,
            Sender::Receiver => style.margin_sides,
        };
        let height = bubble.height;
        bubbles.push(PlacedBubble { bubble, x, y });
        y += height + style.gap;
    }

    Ok(LayoutPlan { bubbles })
}

use std::sync::Arc;

use fontdue::Font;

use crate::error::{ChatError, Result};

/// Width of `text` at `font_size`, in layout units. Implementations must be pure.
pub trait TextMeasurer: Send + Sync {
    fn measure(&self, text: &str, font_size: f32) -> f32;
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for &T {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        (**self).measure(text, font_size)
    }
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for Arc<T> {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        (**self).measure(text, font_size)
    }
}

pub const CHECK_MARK: char = '\u{2713}';

/// Advance reserved for a check mark the font has no glyph for. Surfaces draw
/// it as a vector path of this width.
pub fn check_mark_advance(font_size: f32) -> f32 {
    font_size * 0.62
}

/// Advance widths plus horizontal kerning from a loaded font. Shared by layout
/// and the pixmap surface so both agree on every width.
#[derive(Clone)]
pub struct FontMeasurer {
    font: Arc<Font>,
}

impl FontMeasurer {
    pub fn new(font: Arc<Font>) -> Self {
        Self { font }
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    /// A check mark the font cannot draw.
    pub fn draws_check_as_path(&self, ch: char) -> bool {
        ch == CHECK_MARK && self.font.lookup_glyph_index(ch) == 0
    }
}

impl TextMeasurer for FontMeasurer {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        let mut width = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            if self.draws_check_as_path(ch) {
                width += check_mark_advance(font_size);
                previous = None;
                continue;
            }
            if let Some(left) = previous {
                width += self
                    .font
                    .horizontal_kern(left, ch, font_size)
                    .unwrap_or(0.0);
            }
            width += self.font.metrics(ch, font_size).advance_width;
            previous = Some(ch);
        }
        width
    }
}

/// Fixed advance per character. Used for dry runs without a font and in tests.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMeasurer {
    pub char_width_factor: f32,
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self {
            char_width_factor: 0.55,
        }
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.char_width_factor
    }
}

pub fn measure_checked<M>(measurer: &M, text: &str, font_size: f32) -> Result<f32>
where
    M: TextMeasurer + ?Sized,
{
    let width = measurer.measure(text, font_size);
    if !width.is_finite() || width < 0.0 {
        return Err(ChatError::MeasurementFailure {
            text: text.to_owned(),
            width,
        });
    }
    Ok(width)
}

/// Greedy word wrap. Words wider than `max_width` on their own are split per
/// character; the last fragment stays open so following words can join it.
pub fn wrap<M>(text: &str, max_width: f32, font_size: f32, measurer: &M) -> Result<Vec<String>>
where
    M: TextMeasurer + ?Sized,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_owned()
        } else {
            format!("{current} {word}")
        };
        if measure_checked(measurer, &candidate, font_size)? <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if measure_checked(measurer, word, font_size)? <= max_width {
            current = word.to_owned();
            continue;
        }

        for ch in word.chars() {
            let mut tentative = current.clone();
            tentative.push(ch);
            if !current.is_empty() && measure_checked(measurer, &tentative, font_size)? > max_width
            {
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            } else {
                current = tentative;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines)
}

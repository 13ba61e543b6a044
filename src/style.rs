use std::path::PathBuf;

use serde::{de::Error as DeError, Deserialize, Deserializer};

use crate::error::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn parse_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |start: usize| u8::from_str_radix(&hex[start..start + 2], 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Rgba8 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ColorRepr {
            Hex(String),
            Channels(Vec<u8>),
        }

        match ColorRepr::deserialize(deserializer)? {
            ColorRepr::Hex(raw) => Self::parse_hex(&raw).ok_or_else(|| {
                D::Error::custom(format!(
                    "invalid colour '{raw}'. Hint: use #RRGGBB or #RRGGBBAA"
                ))
            }),
            ColorRepr::Channels(channels) => match channels.as_slice() {
                [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Self::rgba(*r, *g, *b, *a)),
                _ => Err(D::Error::custom(format!(
                    "colour arrays need 3 or 4 channels, got {}",
                    channels.len()
                ))),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Theme {
    pub background: Rgba8,
    pub sender_fill: Rgba8,
    pub receiver_fill: Rgba8,
    pub sender_text: Rgba8,
    pub receiver_text: Rgba8,
    pub typing_dot: Rgba8,
    pub typing_dot_active: Rgba8,
    pub tick: Rgba8,
    pub tick_seen: Rgba8,
    pub title_band: Rgba8,
    pub title_text: Rgba8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Rgba8::rgb(236, 229, 221),
            sender_fill: Rgba8::rgb(217, 253, 211),
            receiver_fill: Rgba8::rgb(255, 255, 255),
            sender_text: Rgba8::rgb(17, 27, 33),
            receiver_text: Rgba8::rgb(17, 27, 33),
            typing_dot: Rgba8::rgb(170, 178, 184),
            typing_dot_active: Rgba8::rgb(102, 119, 129),
            tick: Rgba8::rgb(134, 150, 160),
            tick_seen: Rgba8::rgb(83, 189, 235),
            title_band: Rgba8::rgba(7, 94, 84, 235),
            title_text: Rgba8::rgb(255, 255, 255),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Shadow {
    pub dx: f32,
    pub dy: f32,
    pub color: Rgba8,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            dx: 0.0,
            dy: 4.0,
            color: Rgba8::rgba(0, 0, 0, 48),
        }
    }
}

/// Every knob the layout engine and renderer read. All fields are optional in
/// scripts; missing ones fall back to a 1080x1920 story canvas.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatStyle {
    pub width: u32,
    pub height: u32,
    pub margin_sides: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    pub gap: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub font_size: f32,
    pub max_bubble_width_ratio: f32,
    pub corner_radius: f32,
    pub shadow: Shadow,
    pub background: Option<PathBuf>,
    pub title: Option<String>,
    pub font_path: Option<PathBuf>,
    pub parallel: bool,
    pub theme: Theme,
}

impl Default for ChatStyle {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            margin_sides: 40.0,
            padding_x: 28.0,
            padding_y: 18.0,
            gap: 16.0,
            margin_top: 80.0,
            margin_bottom: 80.0,
            font_size: 40.0,
            max_bubble_width_ratio: 0.72,
            corner_radius: 34.0,
            shadow: Shadow::default(),
            background: None,
            title: None,
            font_path: None,
            parallel: false,
            theme: Theme::default(),
        }
    }
}

impl ChatStyle {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ChatError::invalid_input(format!(
                "canvas must be positive, got {}x{}",
                self.width, self.height
            )));
        }

        for (label, value) in [
            ("margin_sides", self.margin_sides),
            ("padding_x", self.padding_x),
            ("padding_y", self.padding_y),
            ("gap", self.gap),
            ("margin_top", self.margin_top),
            ("margin_bottom", self.margin_bottom),
            ("corner_radius", self.corner_radius),
            ("shadow.dx", self.shadow.dx),
            ("shadow.dy", self.shadow.dy),
        ] {
            if !value.is_finite() {
                return Err(ChatError::invalid_input(format!("{label} must be finite")));
            }
            if value < 0.0 && !label.starts_with("shadow") {
                return Err(ChatError::invalid_input(format!("{label} must be >= 0")));
            }
        }

        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(ChatError::invalid_input("font_size must be > 0"));
        }

        if !(self.max_bubble_width_ratio > 0.0 && self.max_bubble_width_ratio <= 1.0) {
            return Err(ChatError::invalid_input(format!(
                "max_bubble_width_ratio must be in (0, 1], got {}",
                self.max_bubble_width_ratio
            )));
        }

        if self.max_bubble_width() > self.width as f32 - 2.0 * self.margin_sides {
            return Err(ChatError::invalid_input(format!(
                "bubbles up to {}px wide do not fit between {}px side margins on a {}px canvas",
                self.max_bubble_width(),
                self.margin_sides,
                self.width
            )));
        }

        if self.max_bubble_width() <= 2.0 * self.padding_x {
            return Err(ChatError::invalid_input(
                "padding_x leaves no room for text inside a bubble",
            ));
        }

        Ok(())
    }

    pub fn max_bubble_width(&self) -> f32 {
        (self.width as f32 * self.max_bubble_width_ratio).floor()
    }

    pub fn text_max_width(&self) -> f32 {
        self.max_bubble_width() - 2.0 * self.padding_x
    }

    pub fn line_height(&self) -> f32 {
        (self.font_size * 1.12).max(self.font_size + 6.0)
    }

    pub fn typing_bubble_size(&self) -> (f32, f32) {
        (
            (self.font_size * 3.5).ceil(),
            (self.font_size * 2.0).ceil(),
        )
    }

    pub fn title_font_size(&self) -> f32 {
        (self.font_size * 1.1).round()
    }

    /// Height of the fixed header band; zero without a title.
    pub fn title_band_height(&self) -> f32 {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => (self.title_font_size() * 2.4).ceil(),
            _ => 0.0,
        }
    }

    pub fn content_top(&self) -> f32 {
        self.margin_top + self.title_band_height()
    }

    pub fn tick_font_size(&self) -> f32 {
        (self.font_size * 0.55).round().max(8.0)
    }

    /// Gap between the ticks and the bubble's right and bottom edges.
    pub fn tick_inset(&self) -> (f32, f32) {
        (self.padding_x * 0.5, self.padding_y * 0.35)
    }

    /// Minimum space between the last text line and ticks placed beside it.
    pub fn tick_spacing(&self) -> f32 {
        (self.font_size * 0.2).round()
    }
}

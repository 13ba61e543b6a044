use std::path::Path;
use std::sync::Arc;

use fontdue::Font;
use image::{ImageReader, RgbaImage};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result, SurfaceError};
use crate::layout::{layout, LayoutPlan, PlacedBubble};
use crate::message::Message;
use crate::render::FrameRenderer;
use crate::status::{resolve, ResolvedStatus};
use crate::style::ChatStyle;
use crate::surface::{DrawingSurface, PixmapSurface};
use crate::text::{FontMeasurer, TextMeasurer};
use crate::typing::visible_indices;
use crate::viewport::{stack, window};

/// One rendered conversation state. `index` is the state: messages `0..=index` have arrived.
#[derive(Debug, Clone, Serialize)]
pub struct Frame<P> {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub offset: f32,
    pub visible: Vec<usize>,
    pub drawn: Vec<usize>,
    #[serde(skip)]
    pub payload: P,
}

/// Layout work shared by every frame of one conversation.
#[derive(Debug, Clone)]
pub struct PreparedConversation {
    pub plan: LayoutPlan,
    pub statuses: Vec<Option<ResolvedStatus>>,
}

/// What one state shows: visible message indices, their bubbles restacked
/// for this frame, and the scroll offset.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameWindow {
    pub visible: Vec<usize>,
    pub bubbles: Vec<PlacedBubble>,
    pub offset: f32,
}

impl PreparedConversation {
    pub fn frame_window(&self, state: usize, style: &ChatStyle) -> FrameWindow {
        let visible = visible_indices(self.plan.bubbles(), state);
        let bubbles = stack(
            self.plan.bubbles(),
            &visible,
            style.content_top(),
            style.gap,
        );
        let offset = window(&bubbles, style.height as f32, style.margin_bottom);
        FrameWindow {
            visible,
            bubbles,
            offset,
        }
    }
}

pub struct FrameSequencer<'a, M: ?Sized> {
    style: &'a ChatStyle,
    measurer: &'a M,
}

impl<'a, M> FrameSequencer<'a, M>
where
    M: TextMeasurer + ?Sized,
{
    pub fn new(style: &'a ChatStyle, measurer: &'a M) -> Self {
        Self { style, measurer }
    }

    pub fn prepare(&self, messages: &[Message]) -> Result<PreparedConversation> {
        if messages.is_empty() {
            return Err(ChatError::invalid_input("conversation has no messages"));
        }
        if let Some(index) = messages.iter().position(|message| !message.is_renderable()) {
            return Err(ChatError::invalid_input(format!(
                "message {index} has no text and is not a typing event"
            )));
        }
        self.style.validate()?;

        let statuses = messages
            .iter()
            .map(|message| resolve(&message.status))
            .collect();
        let plan = layout(messages, self.style, self.measurer)?;
        Ok(PreparedConversation { plan, statuses })
    }

    /// One frame per state, in state order. `new_surface` is called once per
    /// frame with the canvas size.
    pub fn generate<S, F>(&self, messages: &[Message], new_surface: F) -> Result<Vec<Frame<S::Output>>>
    where
        S: DrawingSurface,
        F: Fn(u32, u32) -> std::result::Result<S, SurfaceError> + Sync,
    {
        let prepared = self.prepare(messages)?;
        let background = self.style.background.as_deref().and_then(load_background);
        let renderer = FrameRenderer::new(&prepared.statuses, self.style, background.as_ref());

        info!(
            frames = messages.len(),
            width = self.style.width,
            height = self.style.height,
            parallel = self.style.parallel,
            "rendering conversation"
        );

        let render_state = |state: usize| -> Result<Frame<S::Output>> {
            let FrameWindow {
                visible,
                bubbles,
                offset,
            } = prepared.frame_window(state, self.style);
            debug!(state, offset, visible = visible.len(), "frame window");

            let mut surface = new_surface(self.style.width, self.style.height)?;
            let drawn = renderer.render(state, &bubbles, offset, &mut surface)?;
            Ok(Frame {
                index: state,
                width: self.style.width,
                height: self.style.height,
                offset,
                visible,
                drawn,
                payload: surface.finish()?,
            })
        };

        let frames = if self.style.parallel {
            (0..messages.len())
                .into_par_iter()
                .map(render_state)
                .collect::<Result<Vec<_>>>()?
        } else {
            (0..messages.len())
                .map(render_state)
                .collect::<Result<Vec<_>>>()?
        };

        info!(frames = frames.len(), "conversation rendered");
        Ok(frames)
    }
}

/// Decodes the background once per sequence. Failures only cost the image:
/// frames fall back to the theme colour.
pub fn load_background(path: &Path) -> Option<RgbaImage> {
    let decoded = ImageReader::open(path)
        .map_err(|error| error.to_string())
        .and_then(|reader| {
            reader
                .with_guessed_format()
                .map_err(|error| error.to_string())
        })
        .and_then(|reader| reader.decode().map_err(|error| error.to_string()));

    match decoded {
        Ok(image) => Some(image.to_rgba8()),
        Err(error) => {
            warn!(
                path = %path.display(),
                %error,
                "background image unavailable, using solid colour"
            );
            None
        }
    }
}

/// Renders every state of `messages` to RGBA images with the given font.
pub fn render_conversation(
    messages: &[Message],
    style: &ChatStyle,
    font: Arc<Font>,
) -> Result<Vec<Frame<RgbaImage>>> {
    let measurer = FontMeasurer::new(Arc::clone(&font));
    FrameSequencer::new(style, &measurer).generate(messages, |width, height| {
        Ok(PixmapSurface::new(width, height)?.with_font(Arc::clone(&font)))
    })
}

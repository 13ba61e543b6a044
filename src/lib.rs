//! Headless renderer that turns a scripted chat conversation into one frame
//! per conversation state.

pub mod error;
pub mod fonts;
pub mod layout;
pub mod message;
pub mod render;
pub mod script;
pub mod sequencer;
pub mod sink;
pub mod status;
pub mod style;
pub mod surface;
pub mod text;
pub mod typing;
pub mod viewport;

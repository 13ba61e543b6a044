use std::fmt;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::Serialize;

use crate::status::StatusHint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The phone owner's side; right-aligned and carries delivery ticks.
    Sender,
    Receiver,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }

    /// Case-insensitive side name as written in scripts.
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sender" | "me" | "right" | "outgoing" => Some(Self::Sender),
            "receiver" | "them" | "left" | "incoming" => Some(Self::Receiver),
            _ => None,
        }
    }
}

// Parsed inside the scalar visitor so format errors point at the value itself.
struct SenderVisitor;

impl Visitor<'_> for SenderVisitor {
    type Value = Sender;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sender name")
    }

    fn visit_str<E>(self, raw: &str) -> Result<Sender, E>
    where
        E: de::Error,
    {
        Sender::from_name(raw).ok_or_else(|| {
            E::custom(format!(
                "unknown sender '{raw}'. Hint: use sender|me|right|outgoing or receiver|them|left|incoming"
            ))
        })
    }
}

impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(SenderVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    pub typing: bool,
    pub status: StatusHint,
}

impl Message {
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender,
            typing: false,
            status: StatusHint::default(),
        }
    }

    pub fn typing(sender: Sender) -> Self {
        Self {
            text: String::new(),
            sender,
            typing: true,
            status: StatusHint::default(),
        }
    }

    pub fn with_status(mut self, status: StatusHint) -> Self {
        self.status = status;
        self
    }

    /// A frame is only worth producing for typing events or messages with visible text.
    pub fn is_renderable(&self) -> bool {
        self.typing || !self.text.trim().is_empty()
    }
}

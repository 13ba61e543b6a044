use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedStatus {
    Sent,
    Delivered,
    Seen,
}

impl ResolvedStatus {
    fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "seen" | "read" => Some(Self::Seen),
            _ => None,
        }
    }
}

/// One recognised shape of delivery information found on an input message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSignal {
    /// `status`, `state` or `tick` string field.
    Explicit(String),
    Flags { seen: bool, delivered: bool },
    Timestamps { read_at: bool, delivered_at: bool },
}

impl StatusSignal {
    fn precedence(&self) -> u8 {
        match self {
            Self::Explicit(_) => 0,
            Self::Flags { .. } => 1,
            Self::Timestamps { .. } => 2,
        }
    }

    fn resolve(&self) -> Option<ResolvedStatus> {
        match self {
            Self::Explicit(label) => ResolvedStatus::from_label(label),
            Self::Flags { seen, delivered }
            | Self::Timestamps {
                read_at: seen,
                delivered_at: delivered,
            } => {
                if *seen {
                    Some(ResolvedStatus::Seen)
                } else if *delivered {
                    Some(ResolvedStatus::Delivered)
                } else {
                    None
                }
            }
        }
    }
}

/// Status fields as they arrived, kept unresolved until [`resolve`] runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusHint {
    signals: Vec<StatusSignal>,
}

impl StatusHint {
    pub fn new(signals: Vec<StatusSignal>) -> Self {
        let mut signals = signals;
        signals.sort_by_key(StatusSignal::precedence);
        Self { signals }
    }

    pub fn explicit(label: impl Into<String>) -> Self {
        Self::new(vec![StatusSignal::Explicit(label.into())])
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn signals(&self) -> &[StatusSignal] {
        &self.signals
    }
}

/// Explicit labels beat boolean flags, which beat timestamp presence. A signal
/// that does not name a status hands over to the next one.
pub fn resolve(hint: &StatusHint) -> Option<ResolvedStatus> {
    hint.signals.iter().find_map(StatusSignal::resolve)
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::error::ChatError;
use crate::message::{Message, Sender};
use crate::status::{StatusHint, StatusSignal};
use crate::style::ChatStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    Json,
    Yaml,
}

impl ScriptFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "json" => Self::Json,
            _ => Self::Yaml,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub style: ChatStyle,
    pub messages: Vec<Message>,
    /// Script positions of messages dropped for having neither text nor a typing flag.
    pub dropped: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMessage {
    #[serde(default)]
    text: Option<String>,
    #[serde(alias = "side", alias = "from")]
    sender: Sender,
    #[serde(default)]
    typing: bool,
    #[serde(default, alias = "state", alias = "tick")]
    status: Option<String>,
    #[serde(default)]
    seen: Option<bool>,
    #[serde(default)]
    read: Option<bool>,
    #[serde(default)]
    delivered: Option<bool>,
    #[serde(default, alias = "seen_at")]
    read_at: Option<serde_json::Value>,
    #[serde(default)]
    delivered_at: Option<serde_json::Value>,
}

impl RawMessage {
    fn status_hint(&self) -> StatusHint {
        let mut signals = Vec::new();
        if let Some(label) = &self.status {
            signals.push(StatusSignal::Explicit(label.clone()));
        }
        if self.seen.is_some() || self.read.is_some() || self.delivered.is_some() {
            signals.push(StatusSignal::Flags {
                seen: self.seen.unwrap_or(false) || self.read.unwrap_or(false),
                delivered: self.delivered.unwrap_or(false),
            });
        }
        if self.read_at.is_some() || self.delivered_at.is_some() {
            signals.push(StatusSignal::Timestamps {
                read_at: self.read_at.is_some(),
                delivered_at: self.delivered_at.is_some(),
            });
        }
        StatusHint::new(signals)
    }

    fn into_message(self) -> Message {
        let status = self.status_hint();
        Message {
            text: if self.typing {
                String::new()
            } else {
                self.text.unwrap_or_default()
            },
            sender: self.sender,
            typing: self.typing,
            status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FullScript {
    #[serde(default)]
    style: ChatStyle,
    messages: Vec<RawMessage>,
}

pub fn load_conversation(path: &Path) -> Result<Conversation> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read chat script {}", path.display()))?;
    let mut conversation = parse_conversation(&contents, ScriptFormat::from_path(path))
        .with_context(|| format!("invalid chat script {}", path.display()))?;

    let script_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    resolve_relative(&mut conversation.style.background, &script_dir);
    resolve_relative(&mut conversation.style.font_path, &script_dir);
    Ok(conversation)
}

pub fn parse_conversation(raw: &str, format: ScriptFormat) -> Result<Conversation> {
    let (style, raw_messages) = match format {
        ScriptFormat::Json => parse_json(raw)?,
        ScriptFormat::Yaml => parse_yaml(raw)?,
    };

    let mut messages = Vec::with_capacity(raw_messages.len());
    let mut dropped = Vec::new();
    for (index, raw_message) in raw_messages.into_iter().enumerate() {
        let message = raw_message.into_message();
        if message.is_renderable() {
            messages.push(message);
        } else {
            warn!(index, "dropping message with no text and no typing flag");
            dropped.push(index);
        }
    }

    if messages.is_empty() {
        return Err(ChatError::invalid_input("chat script has no renderable messages").into());
    }
    style.validate().context("invalid style")?;

    Ok(Conversation {
        style,
        messages,
        dropped,
    })
}

fn parse_yaml(raw: &str) -> Result<(ChatStyle, Vec<RawMessage>)> {
    let probe: serde_yaml::Value = serde_yaml::from_str(raw).map_err(yaml_error)?;
    if probe.is_sequence() {
        let messages = serde_yaml::from_str(raw).map_err(yaml_error)?;
        Ok((ChatStyle::default(), messages))
    } else {
        let script: FullScript = serde_yaml::from_str(raw).map_err(yaml_error)?;
        Ok((script.style, script.messages))
    }
}

fn parse_json(raw: &str) -> Result<(ChatStyle, Vec<RawMessage>)> {
    let probe: serde_json::Value = serde_json::from_str(raw).map_err(json_error)?;
    if probe.is_array() {
        let messages = serde_json::from_str(raw).map_err(json_error)?;
        Ok((ChatStyle::default(), messages))
    } else {
        let script: FullScript = serde_json::from_str(raw).map_err(json_error)?;
        Ok((script.style, script.messages))
    }
}

fn yaml_error(error: serde_yaml::Error) -> anyhow::Error {
    let location = error
        .location()
        .map(|location| format!("line {}, column {}", location.line(), location.column()))
        .unwrap_or_else(|| "unknown location".to_owned());
    ChatError::invalid_input(format!("failed to parse yaml at {}: {}", location, error)).into()
}

fn json_error(error: serde_json::Error) -> anyhow::Error {
    ChatError::invalid_input(format!(
        "failed to parse json at line {}, column {}: {}",
        error.line(),
        error.column(),
        error
    ))
    .into()
}

fn resolve_relative(path: &mut Option<PathBuf>, base: &Path) {
    if let Some(value) = path.as_mut() {
        if value.is_relative() {
            *value = base.join(&*value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::error::{find_chat_error, INVALID_INPUT};
    use crate::status::{resolve, ResolvedStatus};

    #[test]
    fn bare_yaml_list_parses_with_aliases_and_status_shapes() {
        let raw = r#"
- text: "hey, you up?"
  from: them
- typing: true
  side: me
- text: "yeah"
  sender: Me
  status: READ
- text: "cool"
  sender: outgoing
  delivered_at: "2024-01-01T10:00:00Z"
- text: "see you"
  sender: right
  seen: true
  status: sent
"#;
        let conversation = parse_conversation(raw, ScriptFormat::Yaml).unwrap();
        let messages = &conversation.messages;
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].sender, Sender::Receiver);
        assert!(messages[1].typing);
        assert_eq!(messages[1].sender, Sender::Sender);
        assert_eq!(resolve(&messages[0].status), None);
        assert_eq!(resolve(&messages[2].status), Some(ResolvedStatus::Seen));
        assert_eq!(resolve(&messages[3].status), Some(ResolvedStatus::Delivered));
        assert_eq!(resolve(&messages[4].status), Some(ResolvedStatus::Sent));
    }

    #[test]
    fn json_document_with_style_block() {
        let raw = r#"{
  "style": { "width": 720, "height": 1280, "title": "Sam" },
  "messages": [
    { "text": "hi", "sender": "receiver" },
    { "text": "hello", "sender": "sender", "read_at": 1700000000 }
  ]
}"#;
        let conversation = parse_conversation(raw, ScriptFormat::Json).unwrap();
        assert_eq!(conversation.style.width, 720);
        assert_eq!(conversation.style.title.as_deref(), Some("Sam"));
        assert_eq!(
            resolve(&conversation.messages[1].status),
            Some(ResolvedStatus::Seen)
        );
    }

    #[test]
    fn blank_messages_are_dropped_with_their_positions() {
        let raw = "- text: hi\n  sender: me\n- text: '   '\n  sender: them\n- sender: them\n";
        let conversation = parse_conversation(raw, ScriptFormat::Yaml).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.dropped, vec![1, 2]);
    }

    #[test]
    fn script_without_renderable_messages_is_invalid_input() {
        for raw in ["[]", "messages: []\n", "- text: '  '\n  sender: me\n"] {
            let error = parse_conversation(raw, ScriptFormat::Yaml).unwrap_err();
            assert!(error.to_string().contains("no renderable messages"));
            let coded = find_chat_error(&error).expect("empty script should carry a code");
            assert_eq!(coded.code(), INVALID_INPUT);
        }
    }

    #[test]
    fn malformed_json_is_invalid_input_with_position() {
        let raw = "[{\"text\": \"hi\",\n \"sender\": \"bot\"}]";
        let error = parse_conversation(raw, ScriptFormat::Json).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("line 2"), "{message}");
        assert_eq!(find_chat_error(&error).map(ChatError::code), Some(INVALID_INPUT));
    }

    #[test]
    fn unknown_sender_and_fields_report_location() {
        let error = parse_conversation("- text: hi\n  sender: robot\n", ScriptFormat::Yaml)
            .unwrap_err()
            .to_string();
        assert!(error.contains("line 2"), "{error}");
        assert!(error.contains("robot"), "{error}");

        let error = parse_conversation("- text: hi\n  sender: me\n  colour: red\n", ScriptFormat::Yaml)
            .unwrap_err()
            .to_string();
        assert!(error.contains("colour"), "{error}");
    }

    #[test]
    fn invalid_style_is_rejected() {
        let raw = "style:\n  font_size: 0\nmessages:\n  - text: hi\n    sender: me\n";
        let error = parse_conversation(raw, ScriptFormat::Yaml).unwrap_err();
        assert!(format!("{error:#}").contains("font_size"));
    }

    #[test]
    fn load_resolves_asset_paths_against_script_directory() {
        let dir = tempdir().expect("tempdir should create");
        let script = dir.path().join("chat.yaml");
        fs::write(
            &script,
            "style:\n  background: bg.png\n  font_path: /abs/font.ttf\nmessages:\n  - text: hi\n    sender: me\n",
        )
        .unwrap();

        let conversation = load_conversation(&script).unwrap();
        assert_eq!(
            conversation.style.background.as_deref(),
            Some(dir.path().join("bg.png").as_path())
        );
        assert_eq!(
            conversation.style.font_path.as_deref(),
            Some(Path::new("/abs/font.ttf"))
        );
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ScriptFormat::from_path(Path::new("a.JSON")), ScriptFormat::Json);
        assert_eq!(ScriptFormat::from_path(Path::new("a.yml")), ScriptFormat::Yaml);
        assert_eq!(ScriptFormat::from_path(Path::new("chat")), ScriptFormat::Yaml);
    }
}

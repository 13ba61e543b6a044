use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fontdue::Font;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::message::Message;

pub const FONT_ENV_VAR: &str = "CHATREEL_FONT";

#[derive(Clone)]
pub struct LoadedFont {
    pub font: Arc<Font>,
    pub path: PathBuf,
    pub sha256: String,
}

pub fn load_font(path: &Path) -> Result<LoadedFont> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file '{}'", path.display()))?;
    let sha256 = sha256_hex(&bytes);
    let font = Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|error| anyhow!("failed to parse font {}: {error}", path.display()))?;

    info!(path = %path.display(), %sha256, "loaded font");
    Ok(LoadedFont {
        font: Arc::new(font),
        path: path.to_path_buf(),
        sha256,
    })
}

/// First configured font location: explicit flag, then script style, then `CHATREEL_FONT`.
pub fn resolve_font_path(explicit: Option<&Path>, from_style: Option<&Path>) -> Option<PathBuf> {
    explicit
        .or(from_style)
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(FONT_ENV_VAR).map(PathBuf::from))
}

pub fn unsupported_codepoints(font: &Font, text: &str) -> Vec<char> {
    let mut missing = Vec::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            continue;
        }
        if font.lookup_glyph_index(ch) == 0 && !missing.contains(&ch) {
            missing.push(ch);
        }
    }
    missing
}

/// Missing glyphs render as the font's fallback box; flag them up front.
pub fn warn_unsupported_codepoints(font: &Font, messages: &[Message]) -> usize {
    let mut flagged = 0;
    for (index, message) in messages.iter().enumerate() {
        let missing = unsupported_codepoints(font, &message.text);
        if missing.is_empty() {
            continue;
        }
        flagged += 1;
        let listed = missing
            .iter()
            .map(|ch| format!("U+{:04X}", *ch as u32))
            .collect::<Vec<_>>()
            .join(", ");
        warn!(index, codepoints = %listed, "font has no glyph for some characters");
    }
    flagged
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

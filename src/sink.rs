use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{ImageFormat, RgbaImage};
use serde::Serialize;
use tracing::debug;

use crate::fonts::sha256_hex;
use crate::sequencer::Frame;

pub const FRAME_INDEX_FILE: &str = "frames.json";

/// Receives finished frames in state order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame<RgbaImage>) -> Result<()>;
    fn finish(self) -> Result<SinkReport>
    where
        Self: Sized;
}

/// Per-call output settings. Nothing about where frames go is process-global.
#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub write_index: bool,
}

impl SinkOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: "frame".to_owned(),
            write_index: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub index: usize,
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub offset: f32,
    pub visible: Vec<usize>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkReport {
    pub output_dir: PathBuf,
    pub frame_count: usize,
    pub frames: Vec<FrameRecord>,
}

/// Writes `<prefix>_00000.png`, ... plus a `frames.json` index.
pub struct PngDirectorySink {
    options: SinkOptions,
    records: Vec<FrameRecord>,
}

impl PngDirectorySink {
    pub fn create(options: SinkOptions) -> Result<Self> {
        fs::create_dir_all(&options.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                options.output_dir.display()
            )
        })?;
        Ok(Self {
            options,
            records: Vec::new(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.options.output_dir
    }
}

impl FrameSink for PngDirectorySink {
    fn write_frame(&mut self, frame: &Frame<RgbaImage>) -> Result<()> {
        let expected = self.records.len();
        if frame.index != expected {
            bail!(
                "frames must arrive in state order: expected {}, got {}",
                expected,
                frame.index
            );
        }

        let mut bytes = Vec::new();
        frame
            .payload
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .with_context(|| format!("failed to encode frame {} as png", frame.index))?;

        let file = format!("{}_{:05}.png", self.options.file_prefix, frame.index);
        let path = self.options.output_dir.join(&file);
        fs::write(&path, &bytes)
            .with_context(|| format!("failed to write frame {}", path.display()))?;
        debug!(index = frame.index, path = %path.display(), "wrote frame");

        self.records.push(FrameRecord {
            index: frame.index,
            file,
            width: frame.width,
            height: frame.height,
            offset: frame.offset,
            visible: frame.visible.clone(),
            sha256: sha256_hex(&bytes),
        });
        Ok(())
    }

    fn finish(self) -> Result<SinkReport> {
        let report = SinkReport {
            output_dir: self.options.output_dir.clone(),
            frame_count: self.records.len(),
            frames: self.records,
        };

        if self.options.write_index {
            let path = self.options.output_dir.join(FRAME_INDEX_FILE);
            let json = serde_json::to_string_pretty(&report)
                .context("failed to serialize frame index")?;
            fs::write(&path, json)
                .with_context(|| format!("failed to write frame index {}", path.display()))?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn frame(index: usize) -> Frame<RgbaImage> {
        Frame {
            index,
            width: 4,
            height: 2,
            offset: 0.0,
            visible: (0..=index).collect(),
            drawn: (0..=index).collect(),
            payload: RgbaImage::from_pixel(4, 2, image::Rgba([index as u8, 0, 0, 255])),
        }
    }

    #[test]
    fn writes_pngs_and_index() {
        let dir = tempdir().expect("tempdir should create");
        let out = dir.path().join("frames");
        let mut sink = PngDirectorySink::create(SinkOptions::new(&out)).unwrap();
        sink.write_frame(&frame(0)).unwrap();
        sink.write_frame(&frame(1)).unwrap();
        let report = sink.finish().unwrap();

        assert_eq!(report.frame_count, 2);
        assert!(out.join("frame_00000.png").is_file());
        assert!(out.join("frame_00001.png").is_file());
        assert_ne!(report.frames[0].sha256, report.frames[1].sha256);

        let decoded = image::open(out.join("frame_00001.png")).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 0, 0, 255]);

        let index: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(FRAME_INDEX_FILE)).unwrap())
                .unwrap();
        assert_eq!(index["frame_count"], 2);
        assert_eq!(index["frames"][1]["file"], "frame_00001.png");
    }

    #[test]
    fn out_of_order_frames_are_rejected() {
        let dir = tempdir().expect("tempdir should create");
        let mut sink = PngDirectorySink::create(SinkOptions::new(dir.path())).unwrap();
        let error = sink.write_frame(&frame(1)).unwrap_err();
        assert!(error.to_string().contains("state order"));
    }

    #[test]
    fn index_can_be_skipped() {
        let dir = tempdir().expect("tempdir should create");
        let mut options = SinkOptions::new(dir.path());
        options.write_index = false;
        options.file_prefix = "chat".to_owned();
        let mut sink = PngDirectorySink::create(options).unwrap();
        sink.write_frame(&frame(0)).unwrap();
        sink.finish().unwrap();
        assert!(dir.path().join("chat_00000.png").is_file());
        assert!(!dir.path().join(FRAME_INDEX_FILE).exists());
    }
}

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatreel::error::find_chat_error;
use chatreel::fonts::{load_font, resolve_font_path, warn_unsupported_codepoints, FONT_ENV_VAR};
use chatreel::script::{load_conversation, Conversation};
use chatreel::sequencer::{render_conversation, FrameSequencer};
use chatreel::sink::{FrameSink, PngDirectorySink, SinkOptions};
use chatreel::text::MonospaceMeasurer;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CHATREEL_GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "chatreel")]
#[command(about = "Render scripted chat conversations to per-state frames")]
#[command(version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render one PNG per conversation state.
    Render {
        script: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[command(flatten)]
        overrides: StyleOverrides,
        #[arg(long)]
        json: bool,
    },
    /// Validate a script and lay it out with a monospace estimate. No font needed.
    Check {
        script: PathBuf,
        #[command(flatten)]
        overrides: StyleOverrides,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct StyleOverrides {
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long = "font-size")]
    font_size: Option<f32>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    background: Option<PathBuf>,
    #[arg(long)]
    parallel: bool,
}

impl StyleOverrides {
    fn apply(&self, conversation: &mut Conversation) {
        let style = &mut conversation.style;
        if let Some(width) = self.width {
            style.width = width;
        }
        if let Some(height) = self.height {
            style.height = height;
        }
        if let Some(font_size) = self.font_size {
            style.font_size = font_size;
        }
        if let Some(title) = &self.title {
            style.title = Some(title.clone());
        }
        if let Some(background) = &self.background {
            style.background = Some(background.clone());
        }
        if self.parallel {
            style.parallel = true;
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Render {
            script,
            output,
            overrides,
            json,
        } => run_render(&script, &output, &overrides, json),
        Commands::Check {
            script,
            overrides,
            json,
        } => run_check(&script, &overrides, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match find_chat_error(&error) {
                Some(coded) => eprintln!("error[{}]: {:#}", coded.code(), error),
                None => eprintln!("error: {:#}", error),
            }
            ExitCode::FAILURE
        }
    }
}

fn load(script: &Path, overrides: &StyleOverrides) -> Result<Conversation> {
    let mut conversation = load_conversation(script)?;
    overrides.apply(&mut conversation);
    if !conversation.dropped.is_empty() {
        warn!(dropped = ?conversation.dropped, "script messages skipped");
    }
    Ok(conversation)
}

fn run_check(script: &Path, overrides: &StyleOverrides, json: bool) -> Result<()> {
    let conversation = load(script, overrides)?;
    let style = &conversation.style;
    let measurer = MonospaceMeasurer::default();
    let prepared = FrameSequencer::new(style, &measurer).prepare(&conversation.messages)?;

    let frames = (0..conversation.messages.len())
        .map(|state| {
            let window = prepared.frame_window(state, style);
            let tops = window
                .bubbles
                .iter()
                .map(|placed| placed.y)
                .collect::<Vec<_>>();
            json!({
                "index": state,
                "offset": window.offset,
                "visible": window.visible,
                "tops": tops,
            })
        })
        .collect::<Vec<_>>();

    if json {
        let report = json!({
            "script": script.display().to_string(),
            "width": style.width,
            "height": style.height,
            "frame_count": frames.len(),
            "dropped": conversation.dropped,
            "frames": frames,
            "bubbles": prepared.plan.bubbles(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "OK: {} ({}x{}, {} frames, {} dropped)",
        script.display(),
        style.width,
        style.height,
        frames.len(),
        conversation.dropped.len()
    );
    Ok(())
}

fn run_render(
    script: &Path,
    output: &Path,
    overrides: &StyleOverrides,
    json: bool,
) -> Result<()> {
    let conversation = load(script, overrides)?;
    let font_path = resolve_font_path(
        overrides.font.as_deref(),
        conversation.style.font_path.as_deref(),
    )
    .ok_or_else(|| {
        anyhow!("no font configured. Hint: pass --font, set style.font_path, or export {FONT_ENV_VAR}")
    })?;
    let font = load_font(&font_path)?;
    warn_unsupported_codepoints(&font.font, &conversation.messages);

    let frames = render_conversation(&conversation.messages, &conversation.style, font.font)
        .with_context(|| format!("failed to render {}", script.display()))?;

    let mut sink = PngDirectorySink::create(SinkOptions::new(output))?;
    for frame in &frames {
        sink.write_frame(frame)?;
    }
    let report = sink.finish()?;
    info!(frames = report.frame_count, output = %output.display(), "frames written");

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Wrote {} frames to {}", report.frame_count, output.display());
    }
    Ok(())
}

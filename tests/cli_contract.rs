use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

const SCRIPT: &str = r#"
style:
  width: 540
  height: 960
  font_size: 24
messages:
  - text: "are you coming tonight?"
    from: them
  - typing: true
    side: me
  - text: "yes! leaving in 10"
    sender: me
    status: seen
  - text: ""
    sender: them
"#;

fn write_script(dir: &Path, name: &str, yaml: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, yaml).expect("script should write");
    path
}

fn run_chatreel(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chatreel"))
        .current_dir(cwd)
        .env_remove("CHATREEL_FONT")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("chatreel command should run")
}

fn system_font() -> Option<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/Library/Fonts/Arial.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .find(|path| path.is_file())
}

#[test]
fn check_json_reports_one_frame_per_state() {
    let dir = tempdir().expect("tempdir should create");
    write_script(dir.path(), "chat.yaml", SCRIPT);

    let first = run_chatreel(dir.path(), &["check", "chat.yaml", "--json"]);
    assert!(
        first.status.success(),
        "check should succeed: {}",
        String::from_utf8_lossy(&first.stderr)
    );
    let second = run_chatreel(dir.path(), &["check", "chat.yaml", "--json"]);
    assert_eq!(first.stdout, second.stdout, "json output should be stable");

    let parsed: Value = serde_json::from_slice(&first.stdout).expect("json should parse");
    assert_eq!(parsed["width"], 540);
    assert_eq!(parsed["frame_count"], 3);
    assert_eq!(parsed["dropped"], serde_json::json!([3]));

    let visible = parsed["frames"]
        .as_array()
        .expect("frames should be an array")
        .iter()
        .map(|frame| frame["visible"].clone())
        .collect::<Vec<_>>();
    assert_eq!(
        visible,
        vec![
            serde_json::json!([0]),
            serde_json::json!([0, 1]),
            serde_json::json!([0, 2]),
        ]
    );
    assert_eq!(parsed["bubbles"][1]["is_typing"], true);
    // The reply takes over the slot its typing placeholder held.
    assert_eq!(parsed["frames"][2]["tops"][1], parsed["frames"][1]["tops"][1]);
}

#[test]
fn check_plain_output_is_one_line_summary() {
    let dir = tempdir().expect("tempdir should create");
    write_script(dir.path(), "chat.yaml", SCRIPT);
    let output = run_chatreel(dir.path(), &["check", "chat.yaml", "--width", "720"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("OK: chat.yaml (720x960, 3 frames, 1 dropped)"), "{stdout}");
}

#[test]
fn invalid_override_is_reported_with_error_code() {
    let dir = tempdir().expect("tempdir should create");
    write_script(dir.path(), "chat.yaml", SCRIPT);
    let output = run_chatreel(dir.path(), &["check", "chat.yaml", "--font-size", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[INVALID_INPUT]"), "{stderr}");
    assert!(stderr.contains("font_size"), "{stderr}");
}

#[test]
fn empty_script_is_reported_as_invalid_input() {
    let dir = tempdir().expect("tempdir should create");
    write_script(dir.path(), "empty.yaml", "messages: []\n");
    let output = run_chatreel(dir.path(), &["check", "empty.yaml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[INVALID_INPUT]"), "{stderr}");
    assert!(stderr.contains("no renderable messages"), "{stderr}");
}

#[test]
fn malformed_script_points_at_line() {
    let dir = tempdir().expect("tempdir should create");
    write_script(
        dir.path(),
        "bad.yaml",
        "messages:\n  - text: hi\n    sender: me\n    bogus: 1\n",
    );
    let output = run_chatreel(dir.path(), &["check", "bad.yaml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[INVALID_INPUT]"), "{stderr}");
    assert!(stderr.contains("line "), "{stderr}");
    assert!(stderr.contains("bogus"), "{stderr}");
}

#[test]
fn render_without_font_explains_how_to_configure_one() {
    let dir = tempdir().expect("tempdir should create");
    write_script(dir.path(), "chat.yaml", SCRIPT);
    let output = run_chatreel(dir.path(), &["render", "chat.yaml", "-o", "out"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CHATREEL_FONT"), "{stderr}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn version_includes_build_hash() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_chatreel(dir.path(), &["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("chatreel 0.1.0 ("), "{stdout}");
}

#[test]
fn render_writes_frames_and_index_when_a_font_is_available() {
    let Some(font) = system_font() else {
        eprintln!("skipping: no system font available");
        return;
    };
    let dir = tempdir().expect("tempdir should create");
    write_script(dir.path(), "chat.yaml", SCRIPT);
    let font = font.to_string_lossy().to_string();

    let output = run_chatreel(
        dir.path(),
        &["render", "chat.yaml", "-o", "out", "--font", &font, "--json"],
    );
    assert!(
        output.status.success(),
        "render should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("json should parse");
    assert_eq!(report["frame_count"], 3);
    for index in 0..3 {
        let frame = dir.path().join(format!("out/frame_{index:05}.png"));
        let image = image::open(&frame).expect("frame should decode").to_rgba8();
        assert_eq!(image.dimensions(), (540, 960));
    }
    assert!(dir.path().join("out/frames.json").is_file());
}

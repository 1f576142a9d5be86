use super::*;
use crate::encode::encoder::{BoundInput, InputMode};
use crate::foundation::core::PixelFormat;
use crate::graph::filter_script::FilterScript;
use crate::graph::ir::{InputIndex, VideoFormat};
use crate::plan::stage::{CodecProfile, StreamLayout};

fn stage(codec: CodecProfile, inputs: Vec<BoundInput>, limit: Option<f64>) -> BoundStage {
    BoundStage {
        name: "render".to_string(),
        inputs,
        filter_script: None,
        maps: vec!["0:v".to_string()],
        codec,
        format: VideoFormat {
            canvas: Canvas::default(),
            fps: 30,
            pixel_format: PixelFormat::Yuv420p,
        },
        duration_limit_sec: limit,
        output: PathBuf::from("/tmp/out.mp4"),
        expected: StreamLayout {
            video: Some(Canvas::default()),
            audio: true,
            duration_sec: 3.0,
        },
    }
}

fn input(i: u32, path: &str, mode: InputMode) -> BoundInput {
    BoundInput {
        index: InputIndex(i),
        path: PathBuf::from(path),
        mode,
    }
}

fn window<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[test]
fn still_inputs_are_looped_for_their_duration() {
    let s = stage(
        CodecProfile::VideoIntermediate,
        vec![input(0, "/w/clip_000.png", InputMode::Still { duration_sec: 2.5 })],
        None,
    );
    let args = stage_args(&s);
    let expected: Vec<String> = [
        "-framerate", "30", "-loop", "1", "-t", "2.5", "-i", "/w/clip_000.png",
    ]
    .map(String::from)
    .to_vec();
    assert!(args.windows(expected.len()).any(|w| w == expected.as_slice()), "{args:?}");
    assert!(args.contains(&"-an".to_string()));
    assert_eq!(window(&args, "-c:v"), Some("libx264"));
    assert_eq!(window(&args, "-pix_fmt"), Some("yuv420p"));
    assert!(!args.contains(&"-shortest".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
}

#[test]
fn concat_stage_copies_streams() {
    let s = stage(
        CodecProfile::StreamCopy,
        vec![input(0, "/w/concat.txt", InputMode::ConcatManifest)],
        None,
    );
    let args = stage_args(&s);
    assert_eq!(window(&args, "-f"), Some("concat"));
    assert_eq!(window(&args, "-safe"), Some("0"));
    assert_eq!(window(&args, "-c"), Some("copy"));
}

#[test]
fn final_stage_is_bounded_by_target_duration() {
    let mut s = stage(
        CodecProfile::FinalEncode,
        vec![
            input(0, "/w/voice.mp3", InputMode::Media),
            input(1, "/w/clip_000.png", InputMode::Still { duration_sec: 3.0 }),
        ],
        Some(2.25),
    );
    s.filter_script = Some(FilterScript::render(&[]).unwrap());
    let args = stage_args(&s);
    assert!(args.contains(&"-shortest".to_string()));
    let tail: Vec<String> = ["-shortest", "-t", "2.250", "-movflags", "+faststart", "/tmp/out.mp4"]
        .map(String::from)
        .to_vec();
    assert!(args.ends_with(&tail), "{args:?}");
    assert_eq!(window(&args, "-c:a"), Some("aac"));
    assert!(!args.contains(&"-filter_complex".to_string()));
}

#[test]
fn final_copy_keeps_encoded_video() {
    let s = stage(
        CodecProfile::FinalCopyVideo,
        vec![input(0, "/w/voice.wav", InputMode::Media)],
        Some(4.0),
    );
    let args = stage_args(&s);
    assert_eq!(window(&args, "-c:v"), Some("copy"));
    assert_eq!(window(&args, "-b:a"), Some("192k"));
}

#[test]
fn missing_binary_is_a_process_failure() {
    let out = run_bounded(
        "probe",
        Command::new("newsreel-definitely-missing-binary"),
        true,
        Duration::from_secs(1),
    );
    assert!(matches!(
        out,
        Err(NewsreelError::EncodingFailure {
            kind: FailureKind::Process,
            ..
        })
    ));
}

#[cfg(unix)]
#[test]
fn runaway_process_is_killed_at_deadline() {
    let mut cmd = Command::new("sleep");
    cmd.arg("10");
    let started = Instant::now();
    let out = run_bounded("render", cmd, false, Duration::from_millis(150)).unwrap();
    assert!(out.status.is_none());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn stderr_is_captured() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo 'Invalid data found when processing input' >&2; exit 1"]);
    let out = run_bounded("render", cmd, false, Duration::from_secs(10)).unwrap();
    assert!(!out.status.unwrap().success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Invalid data"));
}

#[test]
fn configured_binaries_decide_tool_availability() {
    let missing = FfmpegEncoder::new("/nonexistent/bin/ffmpeg", "/nonexistent/bin/ffprobe");
    assert!(!missing.tools_available());
}

#[cfg(unix)]
#[test]
fn tool_check_uses_the_configured_paths_not_path_lookup() {
    let Some(ok) = ["/bin/true", "/usr/bin/true"]
        .into_iter()
        .map(Path::new)
        .find(|p| p.is_file())
    else {
        return;
    };
    assert!(FfmpegEncoder::new(ok, ok).tools_available());
    assert!(!FfmpegEncoder::new(ok, "/nonexistent/bin/ffprobe").tools_available());
}

use super::*;
use crate::encode::encoder::{BoundInput, InputMode};
use crate::foundation::core::{Canvas, PixelFormat};
use crate::graph::ir::{InputIndex, VideoFormat};
use crate::plan::stage::{CodecProfile, StreamLayout};

fn stage(dir: &Path, name: &str, input: PathBuf, limit: Option<f64>) -> BoundStage {
    BoundStage {
        name: name.to_string(),
        inputs: vec![BoundInput {
            index: InputIndex(0),
            path: input,
            mode: InputMode::Media,
        }],
        filter_script: None,
        maps: vec!["0:v".to_string()],
        codec: CodecProfile::FinalEncode,
        format: VideoFormat {
            canvas: Canvas::default(),
            fps: 30,
            pixel_format: PixelFormat::Yuv420p,
        },
        duration_limit_sec: limit,
        output: dir.join(format!("{name}.mp4")),
        expected: StreamLayout {
            video: Some(Canvas::default()),
            audio: true,
            duration_sec: 10.0,
        },
    }
}

#[test]
fn records_writes_and_reports_expected_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("voice.wav");
    std::fs::write(&src, b"x").unwrap();

    let enc = DryRunEncoder::new(7.0);
    let s = stage(dir.path(), "render", src.clone(), Some(7.0));
    let inv = enc.invoke(&s, Duration::from_secs(1)).unwrap();
    assert!(inv.success);
    assert_eq!(std::fs::read(&s.output).unwrap(), DRY_RUN_PAYLOAD);

    let info = enc.probe(&s.output, Duration::from_secs(1)).unwrap();
    assert_eq!(info.duration_sec, 7.0);
    assert_eq!(info.video, Some(Canvas::default()));
    assert!(info.has_audio);

    let voice = enc.probe(&src, Duration::from_secs(1)).unwrap();
    assert_eq!(voice.duration_sec, 7.0);
    assert_eq!(voice.video, None);

    assert_eq!(enc.stage_names(), ["render"]);
    assert!(enc.invocations()[0].args.contains(&src.display().to_string()));
}

#[test]
fn scripted_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.png");
    std::fs::write(&src, b"x").unwrap();
    let enc = DryRunEncoder::default()
        .with_failure("concat", "No space left on device")
        .with_timeout("mux");

    let failed = enc
        .invoke(&stage(dir.path(), "concat", src.clone(), None), Duration::from_secs(1))
        .unwrap();
    assert!(!failed.success);
    assert!(failed.diagnostics.contains("No space"));

    let hung = enc.invoke(&stage(dir.path(), "mux", src, None), Duration::from_secs(2));
    assert!(matches!(
        hung,
        Err(NewsreelError::Timeout { limit, .. }) if limit == Duration::from_secs(2)
    ));
}

#[test]
fn missing_inputs_fail_like_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let enc = DryRunEncoder::default();
    let s = stage(dir.path(), "render", dir.path().join("absent.png"), None);
    let inv = enc.invoke(&s, Duration::from_secs(1)).unwrap();
    assert!(!inv.success);
    assert!(inv.diagnostics.contains("No such file or directory"));
    assert!(!s.output.exists());
    assert!(enc.probe(&s.output, Duration::from_secs(1)).is_err());
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::foundation::core::Canvas;
use crate::foundation::error::NewsreelResult;
use crate::graph::filter_script::FilterScript;
use crate::graph::ir::{InputIndex, VideoFormat};
use crate::plan::stage::{CodecProfile, StreamLayout};

/// How a bound input file is opened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputMode {
    /// Regular media file.
    Media,
    /// Still image looped for `duration_sec`.
    Still {
        /// Loop length.
        duration_sec: f64,
    },
    /// Concat-demuxer manifest.
    ConcatManifest,
}

/// A stage input resolved to a file in the run workspace.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundInput {
    /// Stage-local index.
    pub index: InputIndex,
    /// File to read.
    pub path: PathBuf,
    /// How to open it.
    pub mode: InputMode,
}

/// A stage ready to run: concrete paths, verified filter script, rendered maps.
#[derive(Clone, Debug)]
pub struct BoundStage {
    /// Stage name.
    pub name: String,
    /// Inputs in index order.
    pub inputs: Vec<BoundInput>,
    /// Verified filter script; `None` when the stage only remaps streams.
    pub filter_script: Option<FilterScript>,
    /// `-map` arguments.
    pub maps: Vec<String>,
    /// Codec settings.
    pub codec: CodecProfile,
    /// Canonical format.
    pub format: VideoFormat,
    /// Hard output length bound, applied to final outputs.
    pub duration_limit_sec: Option<f64>,
    /// Output file.
    pub output: PathBuf,
    /// Expected output metadata.
    pub expected: StreamLayout,
}

/// Outcome of one finished encoder process.
#[derive(Clone, Debug)]
pub struct Invocation {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured diagnostic output (unbounded; truncate before exposing).
    pub diagnostics: String,
    /// Wall time.
    pub elapsed: Duration,
}

/// Probed container metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaInfo {
    /// Container duration.
    pub duration_sec: f64,
    /// Resolution of the first video stream.
    pub video: Option<Canvas>,
    /// Whether an audio stream is present.
    pub has_audio: bool,
}

/// The external encoding collaborator.
///
/// Contract: `invoke` returns `Err` only when the process could not be run to completion
/// (spawn failure, timeout); a process that ran and failed is `Ok` with `success == false`.
pub trait MediaEncoder: Send + Sync {
    /// Run one bound stage, killing it when `timeout` elapses.
    fn invoke(&self, stage: &BoundStage, timeout: Duration) -> NewsreelResult<Invocation>;

    /// Read container metadata of `path`.
    fn probe(&self, path: &Path, timeout: Duration) -> NewsreelResult<MediaInfo>;
}

impl<E: MediaEncoder + ?Sized> MediaEncoder for &E {
    fn invoke(&self, stage: &BoundStage, timeout: Duration) -> NewsreelResult<Invocation> {
        (**self).invoke(stage, timeout)
    }

    fn probe(&self, path: &Path, timeout: Duration) -> NewsreelResult<MediaInfo> {
        (**self).probe(path, timeout)
    }
}

impl<E: MediaEncoder + ?Sized> MediaEncoder for std::sync::Arc<E> {
    fn invoke(&self, stage: &BoundStage, timeout: Duration) -> NewsreelResult<Invocation> {
        (**self).invoke(stage, timeout)
    }

    fn probe(&self, path: &Path, timeout: Duration) -> NewsreelResult<MediaInfo> {
        (**self).probe(path, timeout)
    }
}

/// Build the encoder argument list for a bound stage.
pub fn stage_args(stage: &BoundStage) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error"]
        .map(String::from)
        .to_vec();

    for input in &stage.inputs {
        match input.mode {
            InputMode::Media => {}
            InputMode::Still { duration_sec } => {
                args.extend([
                    "-framerate".to_string(),
                    stage.format.fps.to_string(),
                    "-loop".to_string(),
                    "1".to_string(),
                    "-t".to_string(),
                    duration_sec.to_string(),
                ]);
            }
            InputMode::ConcatManifest => {
                args.extend(["-f", "concat", "-safe", "0"].map(String::from));
            }
        }
        args.push("-i".to_string());
        args.push(input.path.display().to_string());
    }

    if let Some(script) = stage.filter_script.as_ref().filter(|s| !s.is_empty()) {
        args.push("-filter_complex".to_string());
        args.push(script.as_str().to_string());
    }
    for m in &stage.maps {
        args.push("-map".to_string());
        args.push(m.clone());
    }

    let h264 = |args: &mut Vec<String>| {
        args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-pix_fmt".to_string(),
            stage.format.pixel_format.as_ffmpeg().to_string(),
            "-r".to_string(),
            stage.format.fps.to_string(),
        ]);
    };
    let aac = |args: &mut Vec<String>| {
        args.extend(["-c:a", "aac", "-b:a", "192k"].map(String::from));
    };
    match stage.codec {
        CodecProfile::VideoIntermediate => {
            h264(&mut args);
            args.push("-an".to_string());
        }
        CodecProfile::StreamCopy => {
            args.extend(["-c", "copy"].map(String::from));
        }
        CodecProfile::FinalEncode => {
            h264(&mut args);
            aac(&mut args);
        }
        CodecProfile::FinalCopyVideo => {
            args.extend(["-c:v", "copy"].map(String::from));
            aac(&mut args);
        }
    }
    if stage.codec.is_final() {
        args.push("-shortest".to_string());
        if let Some(limit) = stage.duration_limit_sec {
            args.push("-t".to_string());
            args.push(format!("{limit:.3}"));
        }
        args.extend(["-movflags", "+faststart"].map(String::from));
    }

    args.push(stage.output.display().to_string());
    args
}

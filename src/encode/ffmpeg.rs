use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::encode::encoder::{BoundStage, Invocation, MediaEncoder, MediaInfo, stage_args};
use crate::foundation::core::Canvas;
use crate::foundation::error::{FailureKind, NewsreelError, NewsreelResult};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const PROCESS_ERROR_BYTES: usize = 512;

/// Encoder that shells out to the system `ffmpeg` / `ffprobe`.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegEncoder {
    /// Encoder using the given binaries.
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Return `true` when both configured binaries answer `-version`.
    pub fn tools_available(&self) -> bool {
        tool_runs(&self.ffmpeg_bin) && tool_runs(&self.ffprobe_bin)
    }
}

struct BoundedOutput {
    /// `None` when the deadline passed and the process was killed.
    status: Option<ExitStatus>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    elapsed: Duration,
}

fn process_error(stage: &str, msg: String) -> NewsreelError {
    NewsreelError::encoding(stage, FailureKind::Process, &msg, PROCESS_ERROR_BYTES)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_drain(
    stage: &str,
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
) -> NewsreelResult<Vec<u8>> {
    match handle {
        Some(h) => h
            .join()
            .map_err(|_| process_error(stage, "pipe drain thread panicked".to_string()))?
            .map_err(|e| process_error(stage, format!("pipe read failed: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Wait for `child` until `deadline`; kill and reap it past the deadline.
fn wait_until(
    stage: &str,
    child: &mut Child,
    deadline: Instant,
) -> NewsreelResult<Option<ExitStatus>> {
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| process_error(stage, format!("failed to poll process: {e}")))?
        {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            if let Err(e) = child.kill() {
                tracing::warn!(stage, error = %e, "failed to kill timed-out process");
            }
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Spawn `cmd`, drain its pipes on threads and enforce `timeout`.
fn run_bounded(
    stage: &str,
    mut cmd: Command,
    capture_stdout: bool,
    timeout: Duration,
) -> NewsreelResult<BoundedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(if capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|e| {
        process_error(
            stage,
            format!(
                "failed to spawn '{}' (is it installed and on PATH?): {e}",
                cmd.get_program().to_string_lossy()
            ),
        )
    })?;
    let stdout_drain = child.stdout.take().map(drain);
    let stderr_drain = child.stderr.take().map(drain);

    let status = wait_until(stage, &mut child, started + timeout)?;
    let stdout = join_drain(stage, stdout_drain)?;
    let stderr = join_drain(stage, stderr_drain)?;
    Ok(BoundedOutput {
        status,
        stdout,
        stderr,
        elapsed: started.elapsed(),
    })
}

impl MediaEncoder for FfmpegEncoder {
    fn invoke(&self, stage: &BoundStage, timeout: Duration) -> NewsreelResult<Invocation> {
        ensure_parent_dir(&stage.output)?;
        let args = stage_args(stage);
        tracing::debug!(stage = %stage.name, ?args, "invoking ffmpeg");

        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(&args);
        let out = run_bounded(&stage.name, cmd, false, timeout)?;
        let Some(status) = out.status else {
            return Err(NewsreelError::Timeout {
                stage: stage.name.clone(),
                limit: timeout,
            });
        };
        Ok(Invocation {
            success: status.success(),
            exit_code: status.code(),
            diagnostics: String::from_utf8_lossy(&out.stderr).into_owned(),
            elapsed: out.elapsed,
        })
    }

    fn probe(&self, path: &Path, timeout: Duration) -> NewsreelResult<MediaInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            #[serde(default)]
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let mut cmd = Command::new(&self.ffprobe_bin);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path);
        let out = run_bounded("probe", cmd, true, timeout)?;
        let Some(status) = out.status else {
            return Err(NewsreelError::Timeout {
                stage: "probe".to_string(),
                limit: timeout,
            });
        };
        if !status.success() {
            return Err(NewsreelError::encoding(
                "probe",
                FailureKind::CorruptAsset,
                &format!(
                    "ffprobe failed for '{}': {}",
                    path.display(),
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
                PROCESS_ERROR_BYTES,
            ));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| process_error("probe", format!("ffprobe json parse failed: {e}")))?;
        let parse_secs =
            |s: &Option<String>| s.as_deref().and_then(|d| d.trim().parse::<f64>().ok());
        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .and_then(|s| {
                Some(Canvas {
                    width: s.width?,
                    height: s.height?,
                })
            });
        let has_audio = parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));
        let duration_sec = parsed
            .format
            .as_ref()
            .and_then(|f| parse_secs(&f.duration))
            .or_else(|| {
                parsed
                    .streams
                    .iter()
                    .filter_map(|s| parse_secs(&s.duration))
                    .reduce(f64::max)
            })
            .unwrap_or(0.0);

        Ok(MediaInfo {
            duration_sec,
            video,
            has_audio,
        })
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> NewsreelResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_runs(Path::new("ffmpeg"))
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn ffmpeg_tools_available() -> bool {
    FfmpegEncoder::default().tools_available()
}

fn tool_runs(bin: &Path) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;

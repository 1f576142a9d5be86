use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::encode::encoder::{BoundStage, Invocation, MediaEncoder, MediaInfo, stage_args};
use crate::encode::ffmpeg::ensure_parent_dir;
use crate::foundation::error::{NewsreelError, NewsreelResult};

/// Placeholder written in place of real media.
pub const DRY_RUN_PAYLOAD: &[u8] = b"newsreel dry-run artifact\n";

/// One recorded stage invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedInvocation {
    /// Stage name.
    pub stage: String,
    /// Full argument list the real encoder would receive.
    pub args: Vec<String>,
}

#[derive(Clone, Debug)]
enum Scripted {
    Fail(String),
    Hang,
}

/// Encoder stand-in for tests and `--dry-run`: records invocations, writes placeholder files
/// and reports each stage's expected metadata on probe.
#[derive(Debug)]
pub struct DryRunEncoder {
    audio_duration_sec: f64,
    scripted: HashMap<String, Scripted>,
    recorded: Mutex<Vec<RecordedInvocation>>,
    outputs: Mutex<HashMap<PathBuf, MediaInfo>>,
}

impl Default for DryRunEncoder {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl DryRunEncoder {
    /// Dry-run encoder whose probed audio inputs last `audio_duration_sec`.
    pub fn new(audio_duration_sec: f64) -> Self {
        Self {
            audio_duration_sec,
            scripted: HashMap::new(),
            recorded: Mutex::new(Vec::new()),
            outputs: Mutex::new(HashMap::new()),
        }
    }

    /// Make stage `stage` exit non-zero with `diagnostics` on stderr.
    pub fn with_failure(
        mut self,
        stage: impl Into<String>,
        diagnostics: impl Into<String>,
    ) -> Self {
        self.scripted
            .insert(stage.into(), Scripted::Fail(diagnostics.into()));
        self
    }

    /// Make stage `stage` exceed its time bound.
    pub fn with_timeout(mut self, stage: impl Into<String>) -> Self {
        self.scripted.insert(stage.into(), Scripted::Hang);
        self
    }

    /// Invocations recorded so far, in completion order.
    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Names of the stages invoked so far, in completion order.
    pub fn stage_names(&self) -> Vec<String> {
        self.invocations().into_iter().map(|r| r.stage).collect()
    }
}

impl MediaEncoder for DryRunEncoder {
    fn invoke(&self, stage: &BoundStage, timeout: Duration) -> NewsreelResult<Invocation> {
        let started = Instant::now();
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedInvocation {
                stage: stage.name.clone(),
                args: stage_args(stage),
            });

        let failed = |diagnostics: String| Invocation {
            success: false,
            exit_code: Some(1),
            diagnostics,
            elapsed: started.elapsed(),
        };
        match self.scripted.get(&stage.name) {
            Some(Scripted::Fail(diagnostics)) => return Ok(failed(diagnostics.clone())),
            Some(Scripted::Hang) => {
                return Err(NewsreelError::Timeout {
                    stage: stage.name.clone(),
                    limit: timeout,
                });
            }
            None => {}
        }
        if let Some(missing) = stage.inputs.iter().find(|i| !i.path.exists()) {
            return Ok(failed(format!(
                "{}: No such file or directory",
                missing.path.display()
            )));
        }

        ensure_parent_dir(&stage.output)?;
        {
            use anyhow::Context as _;
            std::fs::write(&stage.output, DRY_RUN_PAYLOAD)
                .with_context(|| format!("write '{}'", stage.output.display()))?;
        }

        let duration_sec = match stage.duration_limit_sec {
            Some(limit) => stage.expected.duration_sec.min(limit),
            None => stage.expected.duration_sec,
        };
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                stage.output.clone(),
                MediaInfo {
                    duration_sec,
                    video: stage.expected.video,
                    has_audio: stage.expected.audio,
                },
            );

        Ok(Invocation {
            success: true,
            exit_code: Some(0),
            diagnostics: String::new(),
            elapsed: started.elapsed(),
        })
    }

    fn probe(&self, path: &Path, _timeout: Duration) -> NewsreelResult<MediaInfo> {
        if let Some(info) = self
            .outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
        {
            return Ok(*info);
        }
        if !path.exists() {
            return Err(NewsreelError::asset_decode(format!(
                "'{}' does not exist",
                path.display()
            )));
        }
        Ok(MediaInfo {
            duration_sec: self.audio_duration_sec,
            video: None,
            has_audio: true,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/dry_run.rs"]
mod tests;

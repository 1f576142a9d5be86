use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::encode::encoder::MediaEncoder;
use crate::encode::ffmpeg::ensure_parent_dir;
use crate::exec::executor::MuxedOutput;
use crate::foundation::error::{FailureKind, NewsreelError, NewsreelResult};
use crate::request::config::PlanMode;

/// Allowed gap between the probed and the target duration before we warn.
pub const DURATION_TOLERANCE_SEC: f64 = 0.25;

const STAGE: &str = "assemble";

/// Handle to a finished, fully written artifact.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactHandle {
    /// Published file.
    pub path: PathBuf,
    /// Filename suggested to downloading clients.
    pub suggested_filename: String,
    /// Run that produced it.
    pub run_id: uuid::Uuid,
    /// Probed duration.
    pub duration_sec: f64,
    /// Video width.
    pub width: u32,
    /// Video height.
    pub height: u32,
    /// Whether an audio stream is present.
    pub has_audio: bool,
    /// Plan shape that produced it.
    pub plan_mode: PlanMode,
    /// Fingerprint of the composition graph.
    pub graph_fingerprint: u64,
}

/// Run facts recorded on the handle.
#[derive(Clone, Copy, Debug)]
pub struct RunFacts {
    /// Run id.
    pub run_id: uuid::Uuid,
    /// Resolved plan shape.
    pub plan_mode: PlanMode,
    /// Graph fingerprint.
    pub graph_fingerprint: u64,
}

/// Checks the muxed output and publishes it.
pub struct OutputAssembler<'e> {
    encoder: &'e dyn MediaEncoder,
    probe_timeout: Duration,
    excerpt_bytes: usize,
    suggested_filename: String,
}

impl<'e> OutputAssembler<'e> {
    /// Assembler probing through `encoder`.
    pub fn new(
        encoder: &'e dyn MediaEncoder,
        probe_timeout: Duration,
        excerpt_bytes: usize,
        suggested_filename: impl Into<String>,
    ) -> Self {
        Self {
            encoder,
            probe_timeout,
            excerpt_bytes,
            suggested_filename: suggested_filename.into(),
        }
    }

    /// Shortest-duration policy: the output ends with whichever of the slideshow and the audio
    /// ends first. Nothing is looped or extended.
    pub fn target_duration(video_sec: f64, audio_sec: f64) -> f64 {
        video_sec.min(audio_sec)
    }

    /// Verify `muxed`, then publish it at `dest`. `dest` is only ever observed complete.
    #[tracing::instrument(skip_all, fields(dest = %dest.display()))]
    pub fn assemble(
        &self,
        muxed: &MuxedOutput,
        dest: &Path,
        target_sec: f64,
        facts: RunFacts,
    ) -> NewsreelResult<ArtifactHandle> {
        let size = std::fs::metadata(&muxed.path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(self.failure(format!(
                "muxed output '{}' is missing or empty",
                muxed.path.display()
            )));
        }

        let info = self.encoder.probe(&muxed.path, self.probe_timeout)?;
        let Some(canvas) = info.video else {
            return Err(self.failure("muxed output has no video stream".to_string()));
        };
        if !info.has_audio {
            return Err(self.failure("muxed output has no audio stream".to_string()));
        }
        if Some(canvas) != muxed.expected.video {
            tracing::warn!(
                width = canvas.width,
                height = canvas.height,
                "muxed resolution differs from the canonical canvas"
            );
        }
        if (info.duration_sec - target_sec).abs() > DURATION_TOLERANCE_SEC {
            tracing::warn!(
                probed = info.duration_sec,
                target = target_sec,
                "muxed duration deviates from target"
            );
        }

        publish(&muxed.path, dest)?;
        tracing::info!(bytes = size, duration = info.duration_sec, "published artifact");

        Ok(ArtifactHandle {
            path: dest.to_path_buf(),
            suggested_filename: self.suggested_filename.clone(),
            run_id: facts.run_id,
            duration_sec: info.duration_sec,
            width: canvas.width,
            height: canvas.height,
            has_audio: info.has_audio,
            plan_mode: facts.plan_mode,
            graph_fingerprint: facts.graph_fingerprint,
        })
    }

    fn failure(&self, msg: String) -> NewsreelError {
        NewsreelError::encoding(STAGE, FailureKind::Unknown, &msg, self.excerpt_bytes)
    }
}

/// Copy to a sibling `.partial` file, then rename over `dest`.
fn publish(src: &Path, dest: &Path) -> NewsreelResult<()> {
    ensure_parent_dir(dest)?;
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let copied = std::fs::copy(src, &partial)
        .with_context(|| format!("copy '{}' to '{}'", src.display(), partial.display()))
        .and_then(|_| {
            std::fs::rename(&partial, dest)
                .with_context(|| format!("rename '{}' to '{}'", partial.display(), dest.display()))
        });
    if let Err(e) = copied {
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/output/assembler.rs"]
mod tests;

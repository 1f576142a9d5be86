use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::core::{Canvas, FitPolicy, PixelFormat, Rgb8};
use crate::foundation::error::{NewsreelError, NewsreelResult};

/// Which execution plan shape to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Pick based on clip count and isolation settings.
    #[default]
    Auto,
    /// One encoder invocation for the whole graph.
    Monolithic,
    /// One invocation per stage with intermediate artifacts.
    Staged,
}

/// Logo placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogoConfig {
    /// Logo width in pixels after scaling; height follows the aspect ratio.
    pub width: u32,
    /// Offset from the top-left corner, both axes.
    pub margin: u32,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            width: 150,
            margin: 20,
        }
    }
}

/// Planner knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerConfig {
    /// Requested plan shape.
    pub mode: PlanMode,
    /// In `auto` mode, go staged when the clip count exceeds this.
    pub staged_clip_threshold: usize,
    /// In `auto` mode, always go staged for per-stage diagnostics.
    pub isolate_stages: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mode: PlanMode::Auto,
            staged_clip_threshold: 8,
            isolate_stages: false,
        }
    }
}

/// Executor knobs.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorConfig {
    /// Time bound for a single encoder invocation.
    pub stage_timeout_secs: u64,
    /// Run per-clip normalization stages concurrently.
    pub parallel_clips: bool,
    /// Worker thread count for parallel clip stages. `None` uses rayon defaults.
    pub threads: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 300,
            parallel_clips: true,
            threads: None,
        }
    }
}

impl ExecutorConfig {
    /// Stage timeout as a [`Duration`].
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// Full render configuration. Every field has a default; JSON documents may be partial.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// Canonical output resolution.
    pub canvas: Canvas,
    /// Canonical frame rate.
    pub fps: u32,
    /// Canonical pixel format.
    pub pixel_format: PixelFormat,
    /// How clip images are fitted into the canvas.
    pub fit: FitPolicy,
    /// Pad color for `contain`.
    pub fill: Rgb8,
    /// Logo placement.
    pub logo: LogoConfig,
    /// Gain applied to background music, strictly inside (0, 1).
    pub music_gain: f64,
    /// Planner knobs.
    pub planner: PlannerConfig,
    /// Executor knobs.
    pub executor: ExecutorConfig,
    /// Admission limit on concurrently running renders.
    pub max_concurrent_renders: usize,
    /// Upper bound on diagnostic text surfaced in errors.
    pub diagnostic_excerpt_bytes: usize,
    /// Parent directory for run workspaces. `None` uses the system temp dir.
    pub scratch_root: Option<PathBuf>,
    /// Filename suggested to clients downloading the result.
    pub suggested_filename: String,
    /// Encoder binary.
    pub ffmpeg_bin: PathBuf,
    /// Probe binary.
    pub ffprobe_bin: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            fps: 30,
            pixel_format: PixelFormat::default(),
            fit: FitPolicy::default(),
            fill: Rgb8::default(),
            logo: LogoConfig::default(),
            music_gain: 0.1,
            planner: PlannerConfig::default(),
            executor: ExecutorConfig::default(),
            max_concurrent_renders: 2,
            diagnostic_excerpt_bytes: 2048,
            scratch_root: None,
            suggested_filename: "news_video.mp4".to_string(),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
        }
    }
}

impl RenderConfig {
    /// Load a (possibly partial) JSON config over the defaults and validate it.
    pub fn from_json_file(path: &Path) -> NewsreelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| NewsreelError::config(format!("config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges.
    pub fn validate(&self) -> NewsreelResult<()> {
        self.canvas.validate()?;
        if self.fps == 0 {
            return Err(NewsreelError::config("fps must be non-zero"));
        }
        if !(self.music_gain > 0.0 && self.music_gain < 1.0) {
            return Err(NewsreelError::config(format!(
                "musicGain must be strictly between 0 and 1 (got {})",
                self.music_gain
            )));
        }
        if self.logo.width == 0 {
            return Err(NewsreelError::config("logo width must be non-zero"));
        }
        if self.logo.width >= self.canvas.width {
            return Err(NewsreelError::config("logo width must be below canvas width"));
        }
        if self.executor.stage_timeout_secs == 0 {
            return Err(NewsreelError::config("stageTimeoutSecs must be non-zero"));
        }
        if self.executor.threads == Some(0) {
            return Err(NewsreelError::config("executor threads must be >= 1 when set"));
        }
        if self.max_concurrent_renders == 0 {
            return Err(NewsreelError::config("maxConcurrentRenders must be >= 1"));
        }
        if self.diagnostic_excerpt_bytes < 16 {
            return Err(NewsreelError::config(
                "diagnosticExcerptBytes must be at least 16",
            ));
        }
        if self.suggested_filename.trim().is_empty() {
            return Err(NewsreelError::config("suggestedFilename must be non-empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/request/config.rs"]
mod tests;

//! Newsreel turns a narration track and an ordered list of still images into an MP4 slideshow.
//!
//! The request is compiled into a typed composition graph, lowered into one or more encoder
//! invocations and run against an external encoder:
//!
//! - Decode the request assets ([`AssetResolver`])
//! - Build and validate a [`CompositionGraph`] ([`GraphBuilder`])
//! - Lower it to an [`ExecutionPlan`] ([`ExecutionPlanner`])
//! - Run the plan in an isolated workspace and publish the result ([`RenderSession`])
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod foundation;

/// Encoding collaborators.
pub mod encode;
pub(crate) mod exec;
pub(crate) mod graph;
pub(crate) mod output;
pub(crate) mod plan;
pub(crate) mod request;
pub(crate) mod session;

pub use crate::foundation::core::{Canvas, FitPolicy, PixelFormat, Rgb8};
pub use crate::foundation::diag::excerpt_tail;
pub use crate::foundation::error::{
    ErrorKind, ErrorReport, FailureKind, NewsreelError, NewsreelResult,
};

pub use crate::assets::resolver::{Asset, AssetKind, AssetResolver, AssetRole, ResolvedAssets};
pub use crate::encode::dry_run::{DryRunEncoder, RecordedInvocation};
pub use crate::encode::encoder::{
    BoundInput, BoundStage, InputMode, Invocation, MediaEncoder, MediaInfo, stage_args,
};
pub use crate::encode::ffmpeg::{FfmpegEncoder, ffmpeg_tools_available, is_ffmpeg_on_path};
pub use crate::exec::admission::{AdmissionGate, AdmissionPermit};
pub use crate::exec::classify::classify_failure;
pub use crate::exec::executor::{ExecutionContext, Executor, MuxedOutput};
pub use crate::exec::workspace::{MaterializedAssets, RunWorkspace};
pub use crate::graph::builder::GraphBuilder;
pub use crate::graph::filter_script::FilterScript;
pub use crate::graph::ir::{
    CompositionGraph, InputBinding, InputIndex, MixDuration, Node, NodeId, Operation, StreamKind,
    StreamLabel, StreamRef, VideoFormat,
};
pub use crate::output::assembler::{ArtifactHandle, OutputAssembler, RunFacts};
pub use crate::plan::planner::{ExecutionPlan, ExecutionPlanner};
pub use crate::plan::stage::{
    CodecProfile, StageInput, StageOutput, StageSource, StageSpec, StreamLayout,
};
pub use crate::request::config::{
    ExecutorConfig, LogoConfig, PlanMode, PlannerConfig, RenderConfig,
};
pub use crate::request::model::{AssetRef, Clip, DEFAULT_CLIP_DURATION_SECS, RenderRequest};
pub use crate::session::render_session::{PreparedRender, RenderSession};

#[cfg(test)]
#[path = "../tests/unit/support.rs"]
mod test_support;

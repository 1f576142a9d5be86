use crate::assets::resolver::AssetRole;
use crate::foundation::core::Canvas;
use crate::foundation::error::NewsreelResult;
use crate::graph::filter_script::FilterScript;
use crate::graph::ir::{InputIndex, Node, StreamRef, VideoFormat};

/// Where a stage input comes from.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum StageSource {
    /// A materialized request asset.
    Asset(AssetRole),
    /// An artifact written by an earlier stage.
    Intermediate(String),
    /// A concat-demuxer manifest listing earlier artifacts in order.
    ConcatManifest(Vec<String>),
}

/// One registered input of a stage invocation.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StageInput {
    /// Stage-local input index.
    pub index: InputIndex,
    /// Origin of the input.
    pub source: StageSource,
    /// For still images: how long the looped input lasts.
    pub still_duration_sec: Option<f64>,
}

/// Encoder settings applied to a stage output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecProfile {
    /// Video-only H.264 intermediate in the canonical format.
    VideoIntermediate,
    /// Stream copy; used for the concat demuxer.
    StreamCopy,
    /// Final H.264 + AAC output from filtered streams.
    FinalEncode,
    /// Final output reusing an encoded video intermediate, audio encoded to AAC.
    FinalCopyVideo,
}

impl CodecProfile {
    /// `true` for profiles that write the deliverable.
    pub fn is_final(self) -> bool {
        matches!(self, Self::FinalEncode | Self::FinalCopyVideo)
    }
}

/// Where a stage writes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "name")]
pub enum StageOutput {
    /// Named artifact inside the run workspace.
    Intermediate(String),
    /// The muxed deliverable.
    Final,
}

/// Stream layout and length a stage output is expected to have.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct StreamLayout {
    /// Video resolution, when a video stream is present.
    pub video: Option<Canvas>,
    /// Whether an audio stream is present.
    pub audio: bool,
    /// Expected duration before any audio-driven truncation.
    pub duration_sec: f64,
}

/// Pure description of one encoder invocation.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StageSpec {
    /// Stage name used in logs and errors.
    pub name: String,
    /// Clip index for per-clip normalization stages; these may run in parallel.
    pub clip: Option<usize>,
    /// Registered inputs in index order.
    pub inputs: Vec<StageInput>,
    /// Filter nodes, already lowered to stage-local indices.
    pub nodes: Vec<Node>,
    /// Streams mapped into the output.
    pub maps: Vec<StreamRef>,
    /// Codec settings.
    pub codec: CodecProfile,
    /// Canonical format.
    pub format: VideoFormat,
    /// Output target.
    pub output: StageOutput,
    /// Expected output metadata.
    pub expected: StreamLayout,
}

impl StageSpec {
    /// Render this stage's filter script.
    pub fn filter_script(&self) -> NewsreelResult<FilterScript> {
        FilterScript::render(&self.nodes)
    }

    /// Render and re-parse the filter script against this stage's inputs and maps.
    pub fn verified_script(&self) -> NewsreelResult<FilterScript> {
        let script = self.filter_script()?;
        script.verify_against(&self.nodes, self.inputs.len(), &self.maps)?;
        Ok(script)
    }

    /// Intermediate artifacts this stage reads.
    pub fn consumed_intermediates(&self) -> impl Iterator<Item = &str> + '_ {
        self.inputs.iter().flat_map(|i| match &i.source {
            StageSource::Intermediate(name) => vec![name.as_str()],
            StageSource::ConcatManifest(names) => names.iter().map(String::as_str).collect(),
            StageSource::Asset(_) => Vec::new(),
        })
    }
}

use std::collections::HashMap;

use crate::assets::resolver::{AssetKind, AssetRole};
use crate::foundation::core::{Canvas, FitPolicy, PixelFormat, Rgb8};
use crate::foundation::error::{NewsreelError, NewsreelResult};

/// Position of an asset in the encoder's input list.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct InputIndex(pub u32);

impl InputIndex {
    /// Index as `usize`.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for InputIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node in [`CompositionGraph::nodes`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u32);

/// Name of an intermediate stream produced by exactly one node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct StreamLabel(String);

impl StreamLabel {
    /// Create a label; only `[A-Za-z0-9_]` is allowed so it can never break the script syntax.
    pub fn new(label: impl Into<String>) -> NewsreelResult<Self> {
        let label = label.into();
        if !is_valid_label(&label) {
            return Err(NewsreelError::graph(format!(
                "invalid stream label '{label}' (expected [A-Za-z0-9_]+)"
            )));
        }
        Ok(Self(label))
    }

    /// Raw label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

pub(crate) fn is_valid_label(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Elementary stream type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
}

impl StreamKind {
    /// Stream specifier letter.
    pub fn specifier(self) -> &'static str {
        match self {
            Self::Video => "v",
            Self::Audio => "a",
        }
    }
}

/// A node input: either a stream of a registered input or a labelled intermediate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StreamRef {
    /// Stream `kind` of input `index`.
    Input {
        /// Registered input index.
        index: InputIndex,
        /// Which stream of that input.
        kind: StreamKind,
    },
    /// Output of another node.
    Label {
        /// Producer's output label.
        label: StreamLabel,
    },
}

impl StreamRef {
    /// Reference to a stream of a registered input.
    pub fn input(index: InputIndex, kind: StreamKind) -> Self {
        Self::Input { index, kind }
    }

    /// Reference to a labelled intermediate.
    pub fn label(label: &StreamLabel) -> Self {
        Self::Label {
            label: label.clone(),
        }
    }

    /// Pad syntax used inside a filter script: `[3:v]` or `[base]`.
    pub fn pad(&self) -> String {
        match self {
            Self::Input { index, kind } => format!("[{index}:{}]", kind.specifier()),
            Self::Label { label } => format!("[{}]", label.as_str()),
        }
    }

    /// Argument for `-map`: `3:v` for input streams, `[base]` for labels.
    pub fn map_arg(&self) -> String {
        match self {
            Self::Input { index, kind } => format!("{index}:{}", kind.specifier()),
            Self::Label { label } => format!("[{}]", label.as_str()),
        }
    }
}

/// Mixdown length policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixDuration {
    /// Output length follows the first input (the voice).
    First,
}

/// Canonical output video format shared by every clip stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VideoFormat {
    /// Canonical resolution.
    pub canvas: Canvas,
    /// Canonical frame rate.
    pub fps: u32,
    /// Canonical pixel format.
    pub pixel_format: PixelFormat,
}

/// Stream transformation performed by a node.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Operation {
    /// Fit a still into the canonical format and hold it for `duration_sec`.
    NormalizeVideo {
        /// Target format.
        format: VideoFormat,
        /// Fit policy.
        fit: FitPolicy,
        /// Pad color for `contain`.
        fill: Rgb8,
        /// Hold duration.
        duration_sec: f64,
    },
    /// Concatenate `segments` video streams in input order.
    ConcatVideo {
        /// Number of inputs.
        segments: usize,
    },
    /// Scale the logo to a fixed width, keeping its aspect ratio.
    ScaleOverlaySource {
        /// Target width in pixels.
        width: u32,
    },
    /// Composite the second input over the first at a fixed offset.
    Overlay {
        /// Horizontal offset from the left edge.
        x: u32,
        /// Vertical offset from the top edge.
        y: u32,
    },
    /// Scale audio volume.
    Attenuate {
        /// Linear gain in (0, 1).
        gain: f64,
    },
    /// Mix audio streams.
    MixAudio {
        /// Number of inputs.
        inputs: usize,
        /// Length policy.
        duration: MixDuration,
    },
    /// Map the final video and audio streams into the container.
    Mux,
}

impl Operation {
    /// Short operation name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NormalizeVideo { .. } => "normalizeVideo",
            Self::ConcatVideo { .. } => "concatVideo",
            Self::ScaleOverlaySource { .. } => "scaleOverlaySource",
            Self::Overlay { .. } => "overlay",
            Self::Attenuate { .. } => "attenuate",
            Self::MixAudio { .. } => "mixAudio",
            Self::Mux => "mux",
        }
    }

    /// Expected input stream kinds, in input order.
    pub fn input_kinds(&self) -> Vec<StreamKind> {
        match self {
            Self::NormalizeVideo { .. } | Self::ScaleOverlaySource { .. } => {
                vec![StreamKind::Video]
            }
            Self::ConcatVideo { segments } => vec![StreamKind::Video; *segments],
            Self::Overlay { .. } => vec![StreamKind::Video, StreamKind::Video],
            Self::Attenuate { .. } => vec![StreamKind::Audio],
            Self::MixAudio { inputs, .. } => vec![StreamKind::Audio; *inputs],
            Self::Mux => vec![StreamKind::Video, StreamKind::Audio],
        }
    }

    /// Kind of the produced stream. `None` for [`Operation::Mux`], which produces a container.
    pub fn output_kind(&self) -> Option<StreamKind> {
        match self {
            Self::NormalizeVideo { .. }
            | Self::ConcatVideo { .. }
            | Self::ScaleOverlaySource { .. }
            | Self::Overlay { .. } => Some(StreamKind::Video),
            Self::Attenuate { .. } | Self::MixAudio { .. } => Some(StreamKind::Audio),
            Self::Mux => None,
        }
    }

    /// `true` for operations that become part of a filter script.
    pub fn is_filter(&self) -> bool {
        !matches!(self, Self::Mux)
    }
}

/// One operation with its wired inputs and its output label.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Node {
    /// Position in the graph.
    pub id: NodeId,
    /// What the node does.
    pub op: Operation,
    /// Inputs in operation order.
    pub inputs: Vec<StreamRef>,
    /// Produced stream.
    pub output: StreamLabel,
}

impl Node {
    /// Registered input indices this node reads directly.
    pub fn input_indices(&self) -> impl Iterator<Item = InputIndex> + '_ {
        self.inputs.iter().filter_map(|r| match r {
            StreamRef::Input { index, .. } => Some(*index),
            StreamRef::Label { .. } => None,
        })
    }
}

/// An asset registered with the encoder invocation under `index`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct InputBinding {
    /// Encoder input index.
    pub index: InputIndex,
    /// Which request asset this is.
    pub role: AssetRole,
    /// For stills: how long the looped image input lasts.
    pub still_duration_sec: Option<f64>,
}

impl InputBinding {
    /// `true` when this input carries a stream of `kind`.
    pub fn provides(&self, kind: StreamKind) -> bool {
        match self.role.expected_kind() {
            AssetKind::Image => kind == StreamKind::Video,
            AssetKind::Audio => kind == StreamKind::Audio,
        }
    }
}

/// Typed composition DAG. Nodes are stored in dependency order.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CompositionGraph {
    /// Canonical output format.
    pub format: VideoFormat,
    /// Registered inputs, ordered by index.
    pub inputs: Vec<InputBinding>,
    /// Nodes in dependency order; the last one is the mux.
    pub nodes: Vec<Node>,
}

impl CompositionGraph {
    /// Binding registered for `role`.
    pub fn binding(&self, role: AssetRole) -> Option<&InputBinding> {
        self.inputs.iter().find(|b| b.role == role)
    }

    /// Binding registered under `index`.
    pub fn binding_at(&self, index: InputIndex) -> Option<&InputBinding> {
        self.inputs.iter().find(|b| b.index == index)
    }

    /// Node producing `label`.
    pub fn producer(&self, label: &StreamLabel) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.output == label)
    }

    /// Nodes whose operation matches `pred`, in graph order.
    pub fn nodes_where<'a>(
        &'a self,
        pred: impl Fn(&Operation) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| pred(&n.op))
    }

    /// The final mux node.
    pub fn mux(&self) -> NewsreelResult<&Node> {
        self.nodes
            .last()
            .filter(|n| matches!(n.op, Operation::Mux))
            .ok_or_else(|| NewsreelError::graph("graph does not end with a mux node"))
    }

    /// Number of clip inputs.
    pub fn clip_count(&self) -> usize {
        self.inputs
            .iter()
            .filter(|b| matches!(b.role, AssetRole::Clip(_)))
            .count()
    }

    /// Length of the concatenated slideshow.
    pub fn video_duration_sec(&self) -> f64 {
        self.nodes
            .iter()
            .filter_map(|n| match n.op {
                Operation::NormalizeVideo { duration_sec, .. } => Some(duration_sec),
                _ => None,
            })
            .sum()
    }

    /// Structural hash over the canonical JSON encoding.
    pub fn fingerprint(&self) -> NewsreelResult<u64> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| NewsreelError::graph(format!("graph serialization failed: {e}")))?;
        Ok(xxhash_rust::xxh3::xxh3_64(&bytes))
    }

    /// Full consistency check: index bookkeeping, label wiring, concat compatibility and the
    /// optional logo/music paths.
    pub fn validate(&self) -> NewsreelResult<()> {
        self.validate_inputs()?;
        self.validate_wiring()?;
        self.validate_concat()?;
        self.validate_optional_paths()?;
        Ok(())
    }

    fn validate_inputs(&self) -> NewsreelResult<()> {
        let mut owner_by_index = HashMap::<InputIndex, AssetRole>::new();
        for b in &self.inputs {
            if let Some(prev) = owner_by_index.insert(b.index, b.role) {
                return Err(NewsreelError::graph(format!(
                    "input index {} assigned to both {prev} and {}",
                    b.index, b.role
                )));
            }
        }
        for (pos, b) in self.inputs.iter().enumerate() {
            if b.index.as_usize() != pos {
                return Err(NewsreelError::graph(format!(
                    "input {} ({}) registered at position {pos}; indices must be contiguous from 0",
                    b.index, b.role
                )));
            }
        }

        let clips = self.clip_count();
        let mut expected = vec![AssetRole::Voice];
        expected.extend((0..clips).map(AssetRole::Clip));
        if self.binding(AssetRole::Logo).is_some() {
            expected.push(AssetRole::Logo);
        }
        if self.binding(AssetRole::Music).is_some() {
            expected.push(AssetRole::Music);
        }
        let actual: Vec<AssetRole> = self.inputs.iter().map(|b| b.role).collect();
        if actual != expected {
            return Err(NewsreelError::graph(format!(
                "input registration order {actual:?} does not match {expected:?}"
            )));
        }

        for b in &self.inputs {
            match (b.role, b.still_duration_sec) {
                (AssetRole::Clip(_), Some(d)) if d.is_finite() && d > 0.0 => {}
                (AssetRole::Clip(_), _) => {
                    return Err(NewsreelError::graph(format!(
                        "{} needs a positive still duration",
                        b.role
                    )));
                }
                (_, Some(_)) => {
                    return Err(NewsreelError::graph(format!(
                        "{} must not carry a still duration",
                        b.role
                    )));
                }
                (_, None) => {}
            }
        }
        Ok(())
    }

    fn validate_wiring(&self) -> NewsreelResult<()> {
        let mut produced = HashMap::<&StreamLabel, Option<StreamKind>>::new();
        let mut consumed = HashMap::<&StreamLabel, usize>::new();

        for (pos, node) in self.nodes.iter().enumerate() {
            if node.id.0 as usize != pos {
                return Err(NewsreelError::graph(format!(
                    "node {} stored at position {pos}",
                    node.id.0
                )));
            }
            let kinds = node.op.input_kinds();
            if kinds.len() != node.inputs.len() {
                return Err(NewsreelError::graph(format!(
                    "{} node {} expects {} inputs, has {}",
                    node.op.name(),
                    node.output,
                    kinds.len(),
                    node.inputs.len()
                )));
            }

            for (r, want) in node.inputs.iter().zip(kinds) {
                match r {
                    StreamRef::Input { index, kind } => {
                        let binding = self.binding_at(*index).ok_or_else(|| {
                            NewsreelError::graph(format!(
                                "{} node {} references unregistered input index {index}",
                                node.op.name(),
                                node.output
                            ))
                        })?;
                        if *kind != want || !binding.provides(*kind) {
                            return Err(NewsreelError::graph(format!(
                                "{} node {} reads {:?} from input {index} ({}), expected {:?}",
                                node.op.name(),
                                node.output,
                                kind,
                                binding.role,
                                want
                            )));
                        }
                    }
                    StreamRef::Label { label } => {
                        let Some(kind) = produced.get(label) else {
                            return Err(NewsreelError::graph(format!(
                                "{} node {} consumes {label} before any node produces it",
                                node.op.name(),
                                node.output
                            )));
                        };
                        if *kind != Some(want) {
                            return Err(NewsreelError::graph(format!(
                                "{} node {} consumes {label} as {want:?}",
                                node.op.name(),
                                node.output
                            )));
                        }
                        *consumed.entry(label).or_default() += 1;
                    }
                }
            }

            if produced.insert(&node.output, node.op.output_kind()).is_some() {
                return Err(NewsreelError::graph(format!(
                    "label {} produced more than once",
                    node.output
                )));
            }
        }

        let mux = self.mux()?;
        let mux_count = self.nodes_where(|op| matches!(op, Operation::Mux)).count();
        if mux_count != 1 {
            return Err(NewsreelError::graph(format!(
                "graph has {mux_count} mux nodes"
            )));
        }

        for (label, _) in produced {
            let uses = consumed.get(label).copied().unwrap_or(0);
            let want = if label == &mux.output { 0 } else { 1 };
            if uses != want {
                return Err(NewsreelError::graph(format!(
                    "label {label} consumed {uses} times, expected {want}"
                )));
            }
        }
        Ok(())
    }

    fn validate_concat(&self) -> NewsreelResult<()> {
        let concats: Vec<&Node> = self
            .nodes_where(|op| matches!(op, Operation::ConcatVideo { .. }))
            .collect();
        let [concat] = concats.as_slice() else {
            return Err(NewsreelError::graph(format!(
                "expected exactly one concat node, found {}",
                concats.len()
            )));
        };

        let clips = self.clip_count();
        if concat.inputs.len() != clips {
            return Err(NewsreelError::graph(format!(
                "concat has {} inputs for {clips} clips",
                concat.inputs.len()
            )));
        }
        let normalize_count = self
            .nodes_where(|op| matches!(op, Operation::NormalizeVideo { .. }))
            .count();
        if normalize_count != clips {
            return Err(NewsreelError::graph(format!(
                "{normalize_count} normalize nodes for {clips} clips"
            )));
        }

        for (k, r) in concat.inputs.iter().enumerate() {
            let StreamRef::Label { label } = r else {
                return Err(NewsreelError::graph(format!(
                    "concat input {k} bypasses normalization"
                )));
            };
            let producer = self
                .producer(label)
                .ok_or_else(|| NewsreelError::graph(format!("concat input {label} is dangling")))?;
            let Operation::NormalizeVideo { format, .. } = &producer.op else {
                return Err(NewsreelError::graph(format!(
                    "concat input {label} is not a normalized clip stream"
                )));
            };
            if *format != self.format {
                return Err(NewsreelError::graph(format!(
                    "concat input {label} has format {format:?}, canonical is {:?}",
                    self.format
                )));
            }
            let clip_index = self.binding(AssetRole::Clip(k)).map(|b| b.index);
            if producer.input_indices().next() != clip_index {
                return Err(NewsreelError::graph(format!(
                    "concat input {k} ({label}) does not carry clip {k}"
                )));
            }
        }
        Ok(())
    }

    fn validate_optional_paths(&self) -> NewsreelResult<()> {
        let count = |pred: fn(&Operation) -> bool| self.nodes_where(pred).count();
        let mux = self.mux()?;

        let has_logo = self.binding(AssetRole::Logo).is_some();
        let overlays = count(|op| matches!(op, Operation::Overlay { .. }));
        let logo_scales = count(|op| matches!(op, Operation::ScaleOverlaySource { .. }));
        if overlays != usize::from(has_logo) || logo_scales != usize::from(has_logo) {
            return Err(NewsreelError::graph(format!(
                "logo registered: {has_logo}, overlay nodes: {overlays}, logo scale nodes: {logo_scales}"
            )));
        }

        let video_tail = self
            .nodes_where(|op| {
                matches!(op, Operation::Overlay { .. } | Operation::ConcatVideo { .. })
            })
            .last()
            .map(|n| StreamRef::label(&n.output));
        if mux.inputs.first() != video_tail.as_ref() {
            return Err(NewsreelError::graph(
                "mux video input is not the final video stream",
            ));
        }

        let voice = StreamRef::input(InputIndex(0), StreamKind::Audio);
        let has_music = self.binding(AssetRole::Music).is_some();
        let attenuates: Vec<&Node> = self
            .nodes_where(|op| matches!(op, Operation::Attenuate { .. }))
            .collect();
        let mixes: Vec<&Node> = self
            .nodes_where(|op| matches!(op, Operation::MixAudio { .. }))
            .collect();
        if attenuates.len() != usize::from(has_music) || mixes.len() != usize::from(has_music) {
            return Err(NewsreelError::graph(format!(
                "music registered: {has_music}, attenuate nodes: {}, mix nodes: {}",
                attenuates.len(),
                mixes.len()
            )));
        }

        match mixes.first() {
            None => {
                if mux.inputs.get(1) != Some(&voice) {
                    return Err(NewsreelError::graph(
                        "without music the voice stream must pass straight to the mux",
                    ));
                }
            }
            Some(mix) => {
                if mix.inputs.first() != Some(&voice) {
                    return Err(NewsreelError::graph(
                        "mix must list the voice first so its length governs the mixdown",
                    ));
                }
                if mux.inputs.get(1) != Some(&StreamRef::label(&mix.output)) {
                    return Err(NewsreelError::graph("mux audio input is not the mixdown"));
                }
            }
        }
        for node in attenuates {
            if let Operation::Attenuate { gain } = node.op
                && !(gain > 0.0 && gain < 1.0)
            {
                return Err(NewsreelError::graph(format!(
                    "attenuation gain {gain} must be inside (0, 1)"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/ir.rs"]
mod tests;

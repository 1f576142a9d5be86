use crate::assets::resolver::{AssetRole, ResolvedAssets};
use crate::foundation::core::{FitPolicy, Rgb8};
use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::graph::ir::{
    CompositionGraph, InputBinding, InputIndex, MixDuration, Node, NodeId, Operation, StreamKind,
    StreamLabel, StreamRef, VideoFormat,
};
use crate::request::config::{LogoConfig, RenderConfig};
use crate::request::model::RenderRequest;

/// Hands out encoder input indices in registration order and refuses double registration.
#[derive(Debug, Default)]
struct InputRegistry {
    bindings: Vec<InputBinding>,
}

impl InputRegistry {
    fn register(
        &mut self,
        role: AssetRole,
        still_duration_sec: Option<f64>,
    ) -> NewsreelResult<InputIndex> {
        if let Some(prev) = self.bindings.iter().find(|b| b.role == role) {
            return Err(NewsreelError::graph(format!(
                "{role} already registered as input {}",
                prev.index
            )));
        }
        let index = u32::try_from(self.bindings.len())
            .map(InputIndex)
            .map_err(|_| NewsreelError::graph("too many encoder inputs"))?;
        self.bindings.push(InputBinding {
            index,
            role,
            still_duration_sec,
        });
        Ok(index)
    }
}

#[derive(Debug, Default)]
struct NodeList {
    nodes: Vec<Node>,
}

impl NodeList {
    fn push(
        &mut self,
        op: Operation,
        inputs: Vec<StreamRef>,
        output: &str,
    ) -> NewsreelResult<StreamLabel> {
        let output = StreamLabel::new(output)?;
        let id = u32::try_from(self.nodes.len())
            .map(NodeId)
            .map_err(|_| NewsreelError::graph("too many graph nodes"))?;
        self.nodes.push(Node {
            id,
            op,
            inputs,
            output: output.clone(),
        });
        Ok(output)
    }
}

/// Turns a request plus its resolved assets into a validated [`CompositionGraph`].
///
/// Registration order is fixed: voice is input 0, clips follow in request order, then the logo
/// and the music bed when present.
#[derive(Clone, Debug)]
pub struct GraphBuilder {
    format: VideoFormat,
    fit: FitPolicy,
    fill: Rgb8,
    logo: LogoConfig,
    music_gain: f64,
}

impl GraphBuilder {
    /// Capture the graph-relevant parts of `cfg`.
    pub fn new(cfg: &RenderConfig) -> Self {
        Self {
            format: VideoFormat {
                canvas: cfg.canvas,
                fps: cfg.fps,
                pixel_format: cfg.pixel_format,
            },
            fit: cfg.fit,
            fill: cfg.fill,
            logo: cfg.logo,
            music_gain: cfg.music_gain,
        }
    }

    /// Build and validate the graph.
    ///
    /// Never returns a graph that fails [`CompositionGraph::validate`].
    #[tracing::instrument(skip_all, fields(clips = req.clips.len()))]
    pub fn build(
        &self,
        req: &RenderRequest,
        assets: &ResolvedAssets,
    ) -> NewsreelResult<CompositionGraph> {
        if req.clips.is_empty() || assets.clips.is_empty() {
            return Err(NewsreelError::invalid_request("no clips to render"));
        }
        if assets.clips.len() != req.clips.len() {
            return Err(NewsreelError::graph(format!(
                "{} clips requested but {} resolved",
                req.clips.len(),
                assets.clips.len()
            )));
        }

        let mut registry = InputRegistry::default();
        let mut nodes = NodeList::default();

        let voice = registry.register(AssetRole::Voice, None)?;

        let mut segments = Vec::with_capacity(req.clips.len());
        for (k, (clip, asset)) in req.clips.iter().zip(&assets.clips).enumerate() {
            if asset.role != AssetRole::Clip(k) {
                return Err(NewsreelError::graph(format!(
                    "clip slot {k} holds the {} asset",
                    asset.role
                )));
            }
            let index = registry.register(AssetRole::Clip(k), Some(clip.duration_seconds))?;
            let label = nodes.push(
                Operation::NormalizeVideo {
                    format: self.format,
                    fit: self.fit,
                    fill: self.fill,
                    duration_sec: clip.duration_seconds,
                },
                vec![StreamRef::input(index, StreamKind::Video)],
                &format!("v{k}"),
            )?;
            segments.push(StreamRef::label(&label));
        }

        let base = nodes.push(
            Operation::ConcatVideo {
                segments: segments.len(),
            },
            segments,
            "base",
        )?;
        let mut video = StreamRef::label(&base);

        if assets.logo.is_some() {
            let index = registry.register(AssetRole::Logo, None)?;
            let logo = nodes.push(
                Operation::ScaleOverlaySource {
                    width: self.logo.width,
                },
                vec![StreamRef::input(index, StreamKind::Video)],
                "logo",
            )?;
            let overlaid = nodes.push(
                Operation::Overlay {
                    x: self.logo.margin,
                    y: self.logo.margin,
                },
                vec![video, StreamRef::label(&logo)],
                "vlogo",
            )?;
            video = StreamRef::label(&overlaid);
        }

        let mut audio = StreamRef::input(voice, StreamKind::Audio);
        if assets.music.is_some() {
            let index = registry.register(AssetRole::Music, None)?;
            let bed = nodes.push(
                Operation::Attenuate {
                    gain: self.music_gain,
                },
                vec![StreamRef::input(index, StreamKind::Audio)],
                "bgm",
            )?;
            let mixed = nodes.push(
                Operation::MixAudio {
                    inputs: 2,
                    duration: MixDuration::First,
                },
                vec![audio, StreamRef::label(&bed)],
                "aout",
            )?;
            audio = StreamRef::label(&mixed);
        }

        nodes.push(Operation::Mux, vec![video, audio], "out")?;

        let graph = CompositionGraph {
            format: self.format,
            inputs: registry.bindings,
            nodes: nodes.nodes,
        };
        graph.validate()?;
        tracing::debug!(
            inputs = graph.inputs.len(),
            nodes = graph.nodes.len(),
            "built composition graph"
        );
        Ok(graph)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/builder.rs"]
mod tests;

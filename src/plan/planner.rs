use std::collections::{HashMap, HashSet};

use crate::assets::resolver::AssetRole;
use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::graph::ir::{
    CompositionGraph, InputIndex, Node, Operation, StreamKind, StreamLabel, StreamRef,
};
use crate::plan::stage::{
    CodecProfile, StageInput, StageOutput, StageSource, StageSpec, StreamLayout,
};
use crate::request::config::{PlanMode, PlannerConfig};

/// Ordered encoder invocations for one graph.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ExecutionPlan {
    /// Resolved shape, never [`PlanMode::Auto`].
    pub mode: PlanMode,
    /// Stages in execution order; the last one writes the deliverable.
    pub stages: Vec<StageSpec>,
}

impl ExecutionPlan {
    /// The stage writing the deliverable.
    pub fn final_stage(&self) -> NewsreelResult<&StageSpec> {
        self.stages
            .last()
            .filter(|s| s.output == StageOutput::Final)
            .ok_or_else(|| NewsreelError::graph("plan does not end with a final stage"))
    }

    /// Check stage ordering and every stage's filter script.
    pub fn validate(&self) -> NewsreelResult<()> {
        let mut written = HashSet::<&str>::new();
        for (pos, stage) in self.stages.iter().enumerate() {
            for (i, input) in stage.inputs.iter().enumerate() {
                if input.index.as_usize() != i {
                    return Err(NewsreelError::graph(format!(
                        "stage '{}' input {} registered at position {i}",
                        stage.name, input.index
                    )));
                }
            }
            for name in stage.consumed_intermediates() {
                if !written.contains(name) {
                    return Err(NewsreelError::graph(format!(
                        "stage '{}' reads '{name}' before any stage writes it",
                        stage.name
                    )));
                }
            }
            stage.verified_script()?;
            match &stage.output {
                StageOutput::Intermediate(name) => {
                    if !written.insert(name.as_str()) {
                        return Err(NewsreelError::graph(format!(
                            "intermediate '{name}' written twice"
                        )));
                    }
                }
                StageOutput::Final if pos + 1 != self.stages.len() => {
                    return Err(NewsreelError::graph(format!(
                        "final stage '{}' is not last",
                        stage.name
                    )));
                }
                StageOutput::Final => {}
            }
        }
        self.final_stage()?;
        Ok(())
    }
}

/// Lowers a [`CompositionGraph`] into an [`ExecutionPlan`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutionPlanner {
    cfg: PlannerConfig,
}

impl ExecutionPlanner {
    /// Planner using `cfg`.
    pub fn new(cfg: PlannerConfig) -> Self {
        Self { cfg }
    }

    /// Resolve [`PlanMode::Auto`]: staged above the clip threshold or when stage isolation is
    /// requested, monolithic otherwise.
    pub fn select_mode(&self, graph: &CompositionGraph) -> PlanMode {
        match self.cfg.mode {
            PlanMode::Auto
                if graph.clip_count() > self.cfg.staged_clip_threshold
                    || self.cfg.isolate_stages =>
            {
                PlanMode::Staged
            }
            PlanMode::Auto => PlanMode::Monolithic,
            explicit => explicit,
        }
    }

    /// Produce a validated plan for `graph`.
    #[tracing::instrument(skip_all, fields(clips = graph.clip_count()))]
    pub fn plan(&self, graph: &CompositionGraph) -> NewsreelResult<ExecutionPlan> {
        graph.validate()?;
        let mode = self.select_mode(graph);
        let stages = match mode {
            PlanMode::Staged => lower_staged(graph)?,
            PlanMode::Monolithic | PlanMode::Auto => vec![lower_monolithic(graph)?],
        };
        let plan = ExecutionPlan { mode, stages };
        plan.validate()?;
        tracing::debug!(mode = ?plan.mode, stages = plan.stages.len(), "planned execution");
        Ok(plan)
    }
}

fn final_layout(graph: &CompositionGraph) -> StreamLayout {
    StreamLayout {
        video: Some(graph.format.canvas),
        audio: true,
        duration_sec: graph.video_duration_sec(),
    }
}

fn lower_monolithic(graph: &CompositionGraph) -> NewsreelResult<StageSpec> {
    let mux = graph.mux()?;
    let inputs = graph
        .inputs
        .iter()
        .map(|b| StageInput {
            index: b.index,
            source: StageSource::Asset(b.role),
            still_duration_sec: b.still_duration_sec,
        })
        .collect();
    Ok(StageSpec {
        name: "render".to_string(),
        clip: None,
        inputs,
        nodes: graph
            .nodes
            .iter()
            .filter(|n| n.op.is_filter())
            .cloned()
            .collect(),
        maps: mux.inputs.clone(),
        codec: CodecProfile::FinalEncode,
        format: graph.format,
        output: StageOutput::Final,
        expected: final_layout(graph),
    })
}

/// Per-stage re-indexing state.
#[derive(Default)]
struct Lowering {
    inputs: Vec<StageInput>,
    remap: HashMap<InputIndex, InputIndex>,
    substitutions: HashMap<StreamLabel, StreamRef>,
}

impl Lowering {
    fn register(
        &mut self,
        source: StageSource,
        still_duration_sec: Option<f64>,
    ) -> NewsreelResult<InputIndex> {
        let index = u32::try_from(self.inputs.len())
            .map(InputIndex)
            .map_err(|_| NewsreelError::graph("too many stage inputs"))?;
        self.inputs.push(StageInput {
            index,
            source,
            still_duration_sec,
        });
        Ok(index)
    }

    fn register_graph_input(
        &mut self,
        graph: &CompositionGraph,
        role: AssetRole,
    ) -> NewsreelResult<InputIndex> {
        let binding = graph
            .binding(role)
            .ok_or_else(|| NewsreelError::graph(format!("{role} is not registered")))?;
        let local = self.register(StageSource::Asset(role), binding.still_duration_sec)?;
        self.remap.insert(binding.index, local);
        Ok(local)
    }

    /// Feed `label` from an intermediate artifact instead of the node that produced it.
    fn register_intermediate(
        &mut self,
        name: &str,
        label: &StreamLabel,
        kind: StreamKind,
    ) -> NewsreelResult<()> {
        let local = self.register(StageSource::Intermediate(name.to_string()), None)?;
        self.substitutions
            .insert(label.clone(), StreamRef::input(local, kind));
        Ok(())
    }

    fn lower_ref(&self, r: &StreamRef) -> NewsreelResult<StreamRef> {
        match r {
            StreamRef::Input { index, kind } => {
                let local = self.remap.get(index).ok_or_else(|| {
                    NewsreelError::graph(format!("input {index} is not registered in this stage"))
                })?;
                Ok(StreamRef::input(*local, *kind))
            }
            StreamRef::Label { label } => Ok(self
                .substitutions
                .get(label)
                .cloned()
                .unwrap_or_else(|| r.clone())),
        }
    }

    fn lower_node(&self, node: &Node) -> NewsreelResult<Node> {
        Ok(Node {
            id: node.id,
            op: node.op.clone(),
            inputs: node
                .inputs
                .iter()
                .map(|r| self.lower_ref(r))
                .collect::<NewsreelResult<_>>()?,
            output: node.output.clone(),
        })
    }
}

fn single<'g>(
    graph: &'g CompositionGraph,
    pred: impl Fn(&Operation) -> bool + 'g,
    what: &str,
) -> NewsreelResult<&'g Node> {
    graph
        .nodes_where(pred)
        .next()
        .ok_or_else(|| NewsreelError::graph(format!("graph has no {what} node")))
}

fn lower_staged(graph: &CompositionGraph) -> NewsreelResult<Vec<StageSpec>> {
    let mut stages = Vec::new();
    let mut artifact_by_label = HashMap::<&StreamLabel, String>::new();

    for node in graph.nodes_where(|op| matches!(op, Operation::NormalizeVideo { .. })) {
        let Operation::NormalizeVideo { duration_sec, .. } = node.op else {
            continue;
        };
        let role = node
            .input_indices()
            .next()
            .and_then(|i| graph.binding_at(i))
            .map(|b| b.role)
            .ok_or_else(|| NewsreelError::graph(format!("{} has no clip input", node.output)))?;
        let AssetRole::Clip(k) = role else {
            return Err(NewsreelError::graph(format!(
                "{} normalizes the {role} asset",
                node.output
            )));
        };

        let mut lowering = Lowering::default();
        lowering.register_graph_input(graph, role)?;
        let name = format!("normalize_clip_{k:03}");
        let artifact = format!("clip_{k:03}.mp4");
        stages.push(StageSpec {
            name,
            clip: Some(k),
            nodes: vec![lowering.lower_node(node)?],
            inputs: lowering.inputs,
            maps: vec![StreamRef::label(&node.output)],
            codec: CodecProfile::VideoIntermediate,
            format: graph.format,
            output: StageOutput::Intermediate(artifact.clone()),
            expected: StreamLayout {
                video: Some(graph.format.canvas),
                audio: false,
                duration_sec,
            },
        });
        artifact_by_label.insert(&node.output, artifact);
    }

    let concat = single(
        graph,
        |op| matches!(op, Operation::ConcatVideo { .. }),
        "concat",
    )?;
    let manifest = concat
        .inputs
        .iter()
        .map(|r| match r {
            StreamRef::Label { label } => artifact_by_label.get(label).cloned(),
            StreamRef::Input { .. } => None,
        })
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| NewsreelError::graph("concat input without a clip artifact"))?;
    let video_layout = StreamLayout {
        video: Some(graph.format.canvas),
        audio: false,
        duration_sec: graph.video_duration_sec(),
    };
    let mut video_artifact = "base.mp4".to_string();
    let mut video_label = concat.output.clone();
    stages.push(StageSpec {
        name: "concat".to_string(),
        clip: None,
        inputs: vec![StageInput {
            index: InputIndex(0),
            source: StageSource::ConcatManifest(manifest),
            still_duration_sec: None,
        }],
        nodes: Vec::new(),
        maps: vec![StreamRef::input(InputIndex(0), StreamKind::Video)],
        codec: CodecProfile::StreamCopy,
        format: graph.format,
        output: StageOutput::Intermediate(video_artifact.clone()),
        expected: video_layout,
    });

    if graph.binding(AssetRole::Logo).is_some() {
        let scale = single(
            graph,
            |op| matches!(op, Operation::ScaleOverlaySource { .. }),
            "logo scale",
        )?;
        let overlay = single(graph, |op| matches!(op, Operation::Overlay { .. }), "overlay")?;

        let mut lowering = Lowering::default();
        lowering.register_intermediate(&video_artifact, &video_label, StreamKind::Video)?;
        lowering.register_graph_input(graph, AssetRole::Logo)?;
        let nodes = vec![lowering.lower_node(scale)?, lowering.lower_node(overlay)?];
        video_artifact = "overlay.mp4".to_string();
        stages.push(StageSpec {
            name: "overlay".to_string(),
            clip: None,
            inputs: lowering.inputs,
            nodes,
            maps: vec![StreamRef::label(&overlay.output)],
            codec: CodecProfile::VideoIntermediate,
            format: graph.format,
            output: StageOutput::Intermediate(video_artifact.clone()),
            expected: video_layout,
        });
        video_label = overlay.output.clone();
    }

    let mux = graph.mux()?;
    let mut lowering = Lowering::default();
    lowering.register_graph_input(graph, AssetRole::Voice)?;
    lowering.register_intermediate(&video_artifact, &video_label, StreamKind::Video)?;
    if graph.binding(AssetRole::Music).is_some() {
        lowering.register_graph_input(graph, AssetRole::Music)?;
    }
    let nodes = graph
        .nodes_where(|op| matches!(op, Operation::Attenuate { .. } | Operation::MixAudio { .. }))
        .map(|n| lowering.lower_node(n))
        .collect::<NewsreelResult<Vec<_>>>()?;
    let maps = mux
        .inputs
        .iter()
        .map(|r| lowering.lower_ref(r))
        .collect::<NewsreelResult<Vec<_>>>()?;
    stages.push(StageSpec {
        name: "mux".to_string(),
        clip: None,
        inputs: lowering.inputs,
        nodes,
        maps,
        codec: CodecProfile::FinalCopyVideo,
        format: graph.format,
        output: StageOutput::Final,
        expected: final_layout(graph),
    });

    Ok(stages)
}

#[cfg(test)]
#[path = "../../tests/unit/plan/planner.rs"]
mod tests;

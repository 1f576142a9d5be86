use std::path::Path;
use std::time::Duration;

use crate::assets::resolver::{AssetResolver, AssetRole, ResolvedAssets};
use crate::encode::encoder::{MediaEncoder, MediaInfo};
use crate::exec::admission::AdmissionGate;
use crate::exec::executor::{ExecutionContext, Executor};
use crate::exec::workspace::{MaterializedAssets, RunWorkspace};
use crate::foundation::error::{FailureKind, NewsreelError, NewsreelResult};
use crate::graph::builder::GraphBuilder;
use crate::graph::ir::CompositionGraph;
use crate::output::assembler::{ArtifactHandle, OutputAssembler, RunFacts};
use crate::plan::planner::{ExecutionPlan, ExecutionPlanner};
use crate::request::config::RenderConfig;
use crate::request::model::RenderRequest;

const FINAL_ARTIFACT: &str = "final.mp4";

/// Graph and plan for a request, without running anything.
#[derive(Clone, Debug, serde::Serialize)]
pub struct PreparedRender {
    /// Validated composition graph.
    pub graph: CompositionGraph,
    /// Validated execution plan.
    pub plan: ExecutionPlan,
    /// Graph fingerprint.
    pub fingerprint: u64,
}

/// Entry point of the pipeline: owns the configuration, the encoder and the admission gate.
///
/// A session is shared between concurrent callers; every [`RenderSession::render`] call gets its
/// own workspace and permit.
pub struct RenderSession<E> {
    config: RenderConfig,
    encoder: E,
    gate: AdmissionGate,
    resolver: AssetResolver,
}

impl<E: MediaEncoder> RenderSession<E> {
    /// Validate `config` and set up a session around `encoder`.
    pub fn new(config: RenderConfig, encoder: E) -> NewsreelResult<Self> {
        config.validate()?;
        let gate = AdmissionGate::new(config.max_concurrent_renders);
        Ok(Self {
            config,
            encoder,
            gate,
            resolver: AssetResolver::new(),
        })
    }

    /// Session configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The encoder collaborator.
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Admission gate shared by all renders of this session.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Resolve, build and plan without executing.
    pub fn prepare(&self, req: &RenderRequest) -> NewsreelResult<PreparedRender> {
        let assets = self.resolver.resolve_request(req)?;
        self.prepare_resolved(req, &assets)
    }

    fn prepare_resolved(
        &self,
        req: &RenderRequest,
        assets: &ResolvedAssets,
    ) -> NewsreelResult<PreparedRender> {
        let graph = GraphBuilder::new(&self.config).build(req, assets)?;
        let plan = ExecutionPlanner::new(self.config.planner).plan(&graph)?;
        let fingerprint = graph.fingerprint()?;
        Ok(PreparedRender {
            graph,
            plan,
            fingerprint,
        })
    }

    /// Probe an audio asset before any encoder invocation.
    ///
    /// Unreadable payloads become [`NewsreelError::AssetDecode`]; probe process failures and
    /// timeouts pass through unchanged.
    fn probe_audio(
        &self,
        assets: &MaterializedAssets,
        role: AssetRole,
        timeout: Duration,
    ) -> NewsreelResult<MediaInfo> {
        let info = self
            .encoder
            .probe(assets.path(role)?, timeout)
            .map_err(|e| match e {
                NewsreelError::EncodingFailure {
                    kind: FailureKind::CorruptAsset,
                    ..
                }
                | NewsreelError::AssetDecode(_) => {
                    NewsreelError::asset_decode(format!("{role} is unreadable: {e}"))
                }
                other => other,
            })?;
        if !info.has_audio {
            return Err(NewsreelError::asset_decode(format!("{role} has no audio stream")));
        }
        if !(info.duration_sec > 0.0) {
            return Err(NewsreelError::asset_decode(format!("{role} has no measurable duration")));
        }
        Ok(info)
    }

    /// Render `req` and publish the result at `out_path`.
    ///
    /// All scratch files live in a run workspace that is removed on every exit path.
    pub fn render(&self, req: &RenderRequest, out_path: &Path) -> NewsreelResult<ArtifactHandle> {
        let assets = self.resolver.resolve_request(req)?;
        let prepared = self.prepare_resolved(req, &assets)?;

        let _permit = self.gate.try_acquire()?;
        let workspace = RunWorkspace::create(self.config.scratch_root.as_deref())?;
        let span = tracing::info_span!("render", run_id = %workspace.run_id());
        let _enter = span.enter();
        tracing::info!(
            fingerprint = format_args!("{:016x}", prepared.fingerprint),
            mode = ?prepared.plan.mode,
            clips = prepared.graph.clip_count(),
            stages = prepared.plan.stages.len(),
            "render started"
        );

        let materialized = workspace.materialize(&assets)?;
        let has_music = assets.music.is_some();
        drop(assets);

        let timeout = self.config.executor.stage_timeout();
        let voice = self.probe_audio(&materialized, AssetRole::Voice, timeout)?;
        if has_music {
            self.probe_audio(&materialized, AssetRole::Music, timeout)?;
        }
        let video_sec = prepared.graph.video_duration_sec();
        let target = OutputAssembler::target_duration(video_sec, voice.duration_sec);
        tracing::debug!(video_sec, audio_sec = voice.duration_sec, target, "output length");

        let ctx = ExecutionContext {
            workspace: &workspace,
            assets: &materialized,
            final_output: workspace.intermediate(FINAL_ARTIFACT),
            duration_limit_sec: target,
        };
        let muxed = Executor::new(&self.encoder, &self.config).execute(&prepared.plan, &ctx)?;

        let handle = OutputAssembler::new(
            &self.encoder,
            timeout,
            self.config.diagnostic_excerpt_bytes,
            self.config.suggested_filename.clone(),
        )
        .assemble(
            &muxed,
            out_path,
            target,
            RunFacts {
                run_id: workspace.run_id(),
                plan_mode: prepared.plan.mode,
                graph_fingerprint: prepared.fingerprint,
            },
        )?;

        workspace.close();
        tracing::info!(
            duration = handle.duration_sec,
            invocations = muxed.invocations,
            "render finished"
        );
        Ok(handle)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/render_session.rs"]
mod tests;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use rayon::prelude::*;

use crate::encode::encoder::{BoundInput, BoundStage, InputMode, MediaEncoder};
use crate::exec::classify::classify_failure;
use crate::exec::workspace::{MaterializedAssets, RunWorkspace};
use crate::foundation::error::{FailureKind, NewsreelError, NewsreelResult};
use crate::plan::planner::ExecutionPlan;
use crate::plan::stage::{StageOutput, StageSource, StageSpec, StreamLayout};
use crate::request::config::RenderConfig;

/// Everything a run's stages are bound against.
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    /// Run workspace holding assets and intermediates.
    pub workspace: &'a RunWorkspace,
    /// Materialized request assets.
    pub assets: &'a MaterializedAssets,
    /// Where the final stage writes.
    pub final_output: PathBuf,
    /// Hard length bound for the final output.
    pub duration_limit_sec: f64,
}

/// The muxed, not yet published, output of a plan.
#[derive(Clone, Debug)]
pub struct MuxedOutput {
    /// File inside the run workspace.
    pub path: PathBuf,
    /// Expected layout of the final stage.
    pub expected: StreamLayout,
    /// Number of encoder invocations made.
    pub invocations: usize,
}

/// Runs an [`ExecutionPlan`] stage by stage against a [`MediaEncoder`].
pub struct Executor<'e> {
    encoder: &'e dyn MediaEncoder,
    timeout: Duration,
    parallel_clips: bool,
    threads: Option<usize>,
    excerpt_bytes: usize,
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("timeout", &self.timeout)
            .field("parallel_clips", &self.parallel_clips)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

impl<'e> Executor<'e> {
    /// Executor driving `encoder` with the limits from `cfg`.
    pub fn new(encoder: &'e dyn MediaEncoder, cfg: &RenderConfig) -> Self {
        Self {
            encoder,
            timeout: cfg.executor.stage_timeout(),
            parallel_clips: cfg.executor.parallel_clips,
            threads: cfg.executor.threads,
            excerpt_bytes: cfg.diagnostic_excerpt_bytes,
        }
    }

    /// Run every stage of `plan`. Consecutive per-clip stages form one batch that may run in
    /// parallel; everything else runs sequentially in plan order.
    #[tracing::instrument(skip_all, fields(mode = ?plan.mode, stages = plan.stages.len()))]
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: &ExecutionContext<'_>,
    ) -> NewsreelResult<MuxedOutput> {
        let final_stage = plan.final_stage()?;

        let mut rest = plan.stages.as_slice();
        while let Some(first) = rest.first() {
            let batch_len = if first.clip.is_some() {
                rest.iter().take_while(|s| s.clip.is_some()).count()
            } else {
                1
            };
            let (batch, tail) = rest.split_at(batch_len);
            if batch_len > 1 {
                self.run_clip_batch(batch, ctx)?;
            } else {
                self.run_stage(first, ctx)?;
            }
            rest = tail;
        }

        Ok(MuxedOutput {
            path: ctx.final_output.clone(),
            expected: final_stage.expected,
            invocations: plan.stages.len(),
        })
    }

    /// Run clip stages, in parallel when enabled. The reported failure is the one of the lowest
    /// clip index, regardless of completion order.
    fn run_clip_batch(
        &self,
        batch: &[StageSpec],
        ctx: &ExecutionContext<'_>,
    ) -> NewsreelResult<()> {
        let results: Vec<NewsreelResult<()>> = if self.parallel_clips {
            let pool = build_thread_pool(self.threads)?;
            pool.install(|| batch.par_iter().map(|s| self.run_stage(s, ctx)).collect())
        } else {
            batch.iter().map(|s| self.run_stage(s, ctx)).collect()
        };
        results.into_iter().collect()
    }

    fn run_stage(&self, stage: &StageSpec, ctx: &ExecutionContext<'_>) -> NewsreelResult<()> {
        let bound = self.bind(stage, ctx)?;
        let invocation = self.encoder.invoke(&bound, self.timeout)?;

        if !invocation.success {
            let kind = classify_failure(&invocation.diagnostics);
            if kind == FailureKind::MalformedGraph {
                tracing::error!(
                    stage = %stage.name,
                    "encoder rejected a verified filter graph"
                );
            } else {
                tracing::warn!(
                    stage = %stage.name,
                    %kind,
                    exit_code = ?invocation.exit_code,
                    "stage failed"
                );
            }
            return Err(NewsreelError::encoding(
                &stage.name,
                kind,
                &invocation.diagnostics,
                self.excerpt_bytes,
            ));
        }

        let size = std::fs::metadata(&bound.output).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(NewsreelError::encoding(
                &stage.name,
                FailureKind::Unknown,
                &format!(
                    "encoder reported success but '{}' is missing or empty",
                    bound.output.display()
                ),
                self.excerpt_bytes,
            ));
        }
        tracing::debug!(
            stage = %stage.name,
            elapsed_ms = invocation.elapsed.as_millis() as u64,
            bytes = size,
            "stage finished"
        );
        Ok(())
    }

    /// Resolve a stage against the run's files and verify its filter script before invocation.
    pub fn bind(
        &self,
        stage: &StageSpec,
        ctx: &ExecutionContext<'_>,
    ) -> NewsreelResult<BoundStage> {
        let mut inputs = Vec::with_capacity(stage.inputs.len());
        for input in &stage.inputs {
            let (path, mode) = match &input.source {
                StageSource::Asset(role) => {
                    let mode = match input.still_duration_sec {
                        Some(duration_sec) => InputMode::Still { duration_sec },
                        None => InputMode::Media,
                    };
                    (ctx.assets.path(*role)?.to_path_buf(), mode)
                }
                StageSource::Intermediate(name) => {
                    (existing_intermediate(stage, ctx.workspace, name)?, InputMode::Media)
                }
                StageSource::ConcatManifest(names) => {
                    let manifest = ctx.workspace.intermediate(&format!("{}.txt", stage.name));
                    write_concat_manifest(stage, ctx.workspace, names, &manifest)?;
                    (manifest, InputMode::ConcatManifest)
                }
            };
            inputs.push(BoundInput {
                index: input.index,
                path,
                mode,
            });
        }

        let script = stage.verified_script()?;
        let (output, duration_limit_sec) = match &stage.output {
            StageOutput::Intermediate(name) => (ctx.workspace.intermediate(name), None),
            StageOutput::Final => (ctx.final_output.clone(), Some(ctx.duration_limit_sec)),
        };

        Ok(BoundStage {
            name: stage.name.clone(),
            inputs,
            filter_script: (!script.is_empty()).then_some(script),
            maps: stage.maps.iter().map(|m| m.map_arg()).collect(),
            codec: stage.codec,
            format: stage.format,
            duration_limit_sec,
            output,
            expected: stage.expected,
        })
    }
}

fn existing_intermediate(
    stage: &StageSpec,
    workspace: &RunWorkspace,
    name: &str,
) -> NewsreelResult<PathBuf> {
    let path = workspace.intermediate(name);
    if !path.is_file() {
        return Err(NewsreelError::graph(format!(
            "stage '{}' needs '{name}', which no earlier stage produced",
            stage.name
        )));
    }
    Ok(path)
}

fn write_concat_manifest(
    stage: &StageSpec,
    workspace: &RunWorkspace,
    names: &[String],
    manifest: &Path,
) -> NewsreelResult<()> {
    let mut text = String::from("ffconcat version 1.0\n");
    for name in names {
        let path = existing_intermediate(stage, workspace, name)?;
        let escaped = path.display().to_string().replace('\'', r"'\''");
        text.push_str(&format!("file '{escaped}'\n"));
    }
    std::fs::write(manifest, text)
        .with_context(|| format!("write concat manifest '{}'", manifest.display()))?;
    Ok(())
}

/// Dedicated pool for parallel clip stages.
fn build_thread_pool(threads: Option<usize>) -> NewsreelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(NewsreelError::config(
            "executor 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .thread_name(|i| format!("newsreel-clip-{i}"))
        .build()
        .map_err(|e| NewsreelError::config(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/exec/executor.rs"]
mod tests;

use super::*;
use crate::encode::dry_run::DryRunEncoder;
use crate::plan::planner::ExecutionPlanner;
use crate::request::config::{PlanMode, PlannerConfig};
use crate::test_support::{graph, request, resolved};

struct Run {
    workspace: RunWorkspace,
    assets: MaterializedAssets,
    plan: ExecutionPlan,
}

fn run(durations: &[f64], logo: bool, music: bool, mode: PlanMode) -> Run {
    let workspace = RunWorkspace::create(None).unwrap();
    let assets = workspace
        .materialize(&resolved(&request(durations, logo, music)))
        .unwrap();
    let plan = ExecutionPlanner::new(PlannerConfig {
        mode,
        ..PlannerConfig::default()
    })
    .plan(&graph(durations, logo, music))
    .unwrap();
    Run {
        workspace,
        assets,
        plan,
    }
}

impl Run {
    fn ctx(&self, limit: f64) -> ExecutionContext<'_> {
        ExecutionContext {
            workspace: &self.workspace,
            assets: &self.assets,
            final_output: self.workspace.intermediate("final.mp4"),
            duration_limit_sec: limit,
        }
    }
}

fn serial() -> RenderConfig {
    let mut cfg = RenderConfig::default();
    cfg.executor.parallel_clips = false;
    cfg
}

#[test]
fn staged_run_invokes_every_stage_in_order() {
    let r = run(&[1.0, 2.0], true, true, PlanMode::Staged);
    let enc = DryRunEncoder::new(10.0);
    let out = Executor::new(&enc, &serial()).execute(&r.plan, &r.ctx(3.0)).unwrap();

    assert_eq!(
        enc.stage_names(),
        ["normalize_clip_000", "normalize_clip_001", "concat", "overlay", "mux"]
    );
    assert_eq!(out.invocations, 5);
    assert!(out.expected.audio);
    assert!(out.path.is_file());
    assert!(r.workspace.intermediate("clip_001.mp4").is_file());
}

#[test]
fn concat_manifest_lists_clips_in_order() {
    let r = run(&[1.0, 1.0, 1.0], false, false, PlanMode::Staged);
    let enc = DryRunEncoder::default();
    Executor::new(&enc, &RenderConfig::default())
        .execute(&r.plan, &r.ctx(3.0))
        .unwrap();

    let manifest = std::fs::read_to_string(r.workspace.intermediate("concat.txt")).unwrap();
    let mut lines = manifest.lines();
    assert_eq!(lines.next(), Some("ffconcat version 1.0"));
    let files: Vec<_> = lines.collect();
    assert_eq!(files.len(), 3);
    for (k, line) in files.iter().enumerate() {
        assert!(line.starts_with("file '"), "{line}");
        assert!(line.ends_with(&format!("clip_{k:03}.mp4'")), "{line}");
    }
}

#[test]
fn final_stage_is_bound_with_the_duration_limit() {
    let r = run(&[2.0], false, false, PlanMode::Monolithic);
    let enc = DryRunEncoder::default();
    let exec = Executor::new(&enc, &RenderConfig::default());
    let ctx = r.ctx(1.5);
    let bound = exec.bind(&r.plan.stages[0], &ctx).unwrap();

    assert_eq!(bound.duration_limit_sec, Some(1.5));
    assert_eq!(bound.output, ctx.final_output);
    assert_eq!(bound.inputs.len(), 2);
    assert!(matches!(bound.inputs[0].mode, InputMode::Media));
    assert!(matches!(
        bound.inputs[1].mode,
        InputMode::Still { duration_sec } if duration_sec == 2.0
    ));
    assert!(bound.filter_script.is_some());
}

#[test]
fn reading_an_unwritten_intermediate_is_a_graph_error() {
    let r = run(&[1.0, 1.0], false, false, PlanMode::Staged);
    let enc = DryRunEncoder::default();
    let exec = Executor::new(&enc, &RenderConfig::default());
    let concat = r.plan.stages.iter().find(|s| s.name == "concat").unwrap();

    let err = exec.bind(concat, &r.ctx(2.0)).unwrap_err();
    assert!(matches!(err, NewsreelError::GraphConstruction(_)), "{err}");
    assert!(enc.invocations().is_empty());
}

#[test]
fn lowest_clip_failure_wins_in_a_parallel_batch() {
    let r = run(&[1.0, 1.0, 1.0, 1.0], false, false, PlanMode::Staged);
    let enc = DryRunEncoder::default()
        .with_failure("normalize_clip_003", "Conversion failed!")
        .with_failure(
            "normalize_clip_001",
            "clip_001.png: Invalid data found when processing input",
        );
    let mut cfg = RenderConfig::default();
    cfg.executor.threads = Some(4);

    let err = Executor::new(&enc, &cfg)
        .execute(&r.plan, &r.ctx(4.0))
        .unwrap_err();
    match err {
        NewsreelError::EncodingFailure { stage, kind, .. } => {
            assert_eq!(stage, "normalize_clip_001");
            assert_eq!(kind, FailureKind::CorruptAsset);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!enc.stage_names().iter().any(|s| s == "concat"));
}

#[test]
fn encoder_graph_rejection_is_classified() {
    let r = run(&[1.0], true, false, PlanMode::Monolithic);
    let enc = DryRunEncoder::default().with_failure(
        "render",
        "[AVFilterGraph @ 0x55] No such filter: 'overlay'\nError initializing complex filters.",
    );
    let err = Executor::new(&enc, &RenderConfig::default())
        .execute(&r.plan, &r.ctx(1.0))
        .unwrap_err();
    assert!(matches!(
        err,
        NewsreelError::EncodingFailure {
            kind: FailureKind::MalformedGraph,
            ..
        }
    ));
}

#[test]
fn diagnostics_are_truncated_to_the_configured_bound() {
    let r = run(&[1.0], false, false, PlanMode::Monolithic);
    let noise = "x".repeat(10_000);
    let enc =
        DryRunEncoder::default().with_failure("render", format!("{noise}\nConversion failed!"));
    let mut cfg = serial();
    cfg.diagnostic_excerpt_bytes = 64;

    let err = Executor::new(&enc, &cfg)
        .execute(&r.plan, &r.ctx(1.0))
        .unwrap_err();
    match err {
        NewsreelError::EncodingFailure { excerpt, .. } => {
            assert!(excerpt.len() <= 64, "{}", excerpt.len());
            assert!(excerpt.ends_with("Conversion failed!"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn timeouts_propagate_unchanged() {
    let r = run(&[1.0, 1.0], false, false, PlanMode::Staged);
    let enc = DryRunEncoder::default().with_timeout("concat");
    let err = Executor::new(&enc, &serial())
        .execute(&r.plan, &r.ctx(2.0))
        .unwrap_err();
    assert!(matches!(err, NewsreelError::Timeout { ref stage, .. } if stage == "concat"));
}

#[test]
fn zero_threads_is_a_config_error() {
    assert!(matches!(
        build_thread_pool(Some(0)),
        Err(NewsreelError::Config(_))
    ));
    assert!(build_thread_pool(Some(2)).is_ok());
}

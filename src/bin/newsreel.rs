use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use sha2::Digest as _;

#[derive(Parser, Debug)]
#[command(name = "newsreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a request to MP4 (requires `ffmpeg` and `ffprobe` on PATH unless `--dry-run`).
    Render(RenderArgs),
    /// Print the composition graph and its filter script.
    Graph(InspectArgs),
    /// Print the execution plan.
    Plan(InspectArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Render request JSON.
    #[arg(long)]
    request: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Render config JSON (partial documents are merged over defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Record encoder invocations and write placeholder files instead of running ffmpeg.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Render request JSON.
    #[arg(long)]
    request: PathBuf,

    /// Render config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(clap::Args, Debug)]
struct Overrides {
    /// Override the plan shape.
    #[arg(long, value_enum)]
    plan: Option<PlanChoice>,

    /// Override the clip fit policy (`contain` or `cover`).
    #[arg(long)]
    fit: Option<newsreel::FitPolicy>,

    /// Override the per-stage timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlanChoice {
    Auto,
    Monolithic,
    Staged,
}

impl From<PlanChoice> for newsreel::PlanMode {
    fn from(c: PlanChoice) -> Self {
        match c {
            PlanChoice::Auto => Self::Auto,
            PlanChoice::Monolithic => Self::Monolithic,
            PlanChoice::Staged => Self::Staged,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Graph(args) => cmd_graph(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn read_request(path: &Path) -> anyhow::Result<newsreel::RenderRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("open request '{}'", path.display()))?;
    Ok(newsreel::RenderRequest::from_json_str(&text)?)
}

fn load_config(path: Option<&Path>, o: &Overrides) -> anyhow::Result<newsreel::RenderConfig> {
    let mut cfg = match path {
        Some(p) => newsreel::RenderConfig::from_json_file(p)?,
        None => newsreel::RenderConfig::default(),
    };
    if let Some(plan) = o.plan {
        cfg.planner.mode = plan.into();
    }
    if let Some(fit) = o.fit {
        cfg.fit = fit;
    }
    if let Some(secs) = o.timeout_secs {
        cfg.executor.stage_timeout_secs = secs;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let req = read_request(&args.request)?;
    let cfg = load_config(args.config.as_deref(), &args.overrides)?;

    let handle = if args.dry_run {
        let session = newsreel::RenderSession::new(cfg, newsreel::DryRunEncoder::default())?;
        let handle = session.render(&req, &args.out)?;
        for inv in session.encoder().invocations() {
            eprintln!("{}: ffmpeg {}", inv.stage, shell_join(&inv.args));
        }
        handle
    } else {
        let encoder = newsreel::FfmpegEncoder::new(cfg.ffmpeg_bin.clone(), cfg.ffprobe_bin.clone());
        if !encoder.tools_available() {
            anyhow::bail!(
                "ffmpeg ('{}') and ffprobe ('{}') are required for rendering, but could not be run",
                cfg.ffmpeg_bin.display(),
                cfg.ffprobe_bin.display()
            );
        }
        let session = newsreel::RenderSession::new(cfg, encoder)?;
        session.render(&req, &args.out)?
    };

    let bytes = std::fs::read(&handle.path)
        .with_context(|| format!("read artifact '{}'", handle.path.display()))?;
    eprintln!("wrote {}", handle.path.display());
    println!("{}  {}", sha256_hex(&bytes), handle.path.display());
    Ok(())
}

fn cmd_graph(args: InspectArgs) -> anyhow::Result<()> {
    let req = read_request(&args.request)?;
    let cfg = load_config(args.config.as_deref(), &args.overrides)?;
    let session = newsreel::RenderSession::new(cfg, newsreel::DryRunEncoder::default())?;
    let prepared = session.prepare(&req)?;

    let filter_nodes: Vec<newsreel::Node> = prepared
        .graph
        .nodes
        .iter()
        .filter(|n| n.op.is_filter())
        .cloned()
        .collect();
    let script = newsreel::FilterScript::render(&filter_nodes)?;

    let doc = serde_json::json!({
        "fingerprint": format!("{:016x}", prepared.fingerprint),
        "graph": prepared.graph,
        "filterScript": script,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn cmd_plan(args: InspectArgs) -> anyhow::Result<()> {
    let req = read_request(&args.request)?;
    let cfg = load_config(args.config.as_deref(), &args.overrides)?;
    let session = newsreel::RenderSession::new(cfg, newsreel::DryRunEncoder::default())?;
    let prepared = session.prepare(&req)?;

    println!("mode: {:?}", prepared.plan.mode);
    for stage in &prepared.plan.stages {
        let script = stage.filter_script()?;
        println!(
            "{:<20} inputs={} maps={} codec={:?}",
            stage.name,
            stage.inputs.len(),
            stage
                .maps
                .iter()
                .map(|m| m.map_arg())
                .collect::<Vec<_>>()
                .join(","),
            stage.codec
        );
        if !script.is_empty() {
            println!("    {script}");
        }
    }
    Ok(())
}

fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.chars().any(|c| c.is_whitespace() || "[];'\"".contains(c)) {
                format!("'{}'", a.replace('\'', r"'\''"))
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

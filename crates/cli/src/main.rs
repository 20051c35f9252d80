use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dp_analysis::analyze_with;
use dp_config::{load_config, ToolConfig};
use dp_encode::{build_encoder, encode_to_path, mapping_path_for, MetisEncoder, NodeIndexMapping, ScotchEncoder};
use dp_engines::{parse_comm_volume, parse_edgecut, run_gmap, run_gpmetis, EngineError};
use dp_graph::AttributedGraph;
use dp_partition::{
    build_strategy, imbalance, load_by_color, merge_partition, parse_by_position, render_load, sweep, AssignmentFormat,
    EngineRun, FirstSeenColors, GroupModuloColors, MergeReport, PartitionAssignment, WeightedGraphFile,
};
use dp_telemetry::{labels, profiling};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dagpart")]
#[command(about = "Task-graph metrics, partitioner file formats and partition coloring")]
#[command(version)]
struct Cli {
    /// Tool configuration (TOML); built-in defaults when omitted
    #[arg(global = true, long)]
    config: Option<PathBuf>,
    /// Optional JSONL profile path (sets DAGPART_PROFILE_JSONL if not set)
    #[arg(global = true, long)]
    profile_jsonl: Option<PathBuf>,
    /// More logging (-v debug, -vv trace)
    #[arg(global = true, short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Work, span, parallelism and stages of a DOT task graph
    Analyze(AnalyzeArgs),
    /// Write a DOT graph in a partitioner input format
    Encode(EncodeArgs),
    /// Encode, run the k-way partitioner and color the graph by part
    Partition(PartitionArgs),
    /// Encode, run the architecture mapper and color the graph by part
    Map(MapArgs),
    /// Color a DOT graph from an existing assignment file
    Merge(MergeArgs),
    /// Group weights and imbalance of one assignment
    Quality(QualityArgs),
    /// Run the partitioner over a range of k and collect the metrics
    Sweep(SweepArgs),
    /// Summarise a JSONL metric series as CSV
    Series(SeriesArgs),
    /// Computation cost per fill color of a colored graph
    Load(LoadArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncodeFormat {
    /// 1-based, with a mapping side file
    Metis,
    /// 0-based, placeholder `node` left out
    Scotch,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AssignmentKind {
    /// One group per line, line i is node id i
    Position,
    /// `<nodeId> <groupId>` lines
    Pairs,
}

impl EncodeFormat {
    fn encoder(self) -> &'static str {
        match self {
            EncodeFormat::Metis => "metis",
            EncodeFormat::Scotch => "scotch",
        }
    }
}

impl AssignmentKind {
    /// Encoder whose node numbering the assignment refers to.
    fn encoder(self) -> &'static str {
        match self {
            AssignmentKind::Position => "metis",
            AssignmentKind::Pairs => "scotch",
        }
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Input DOT file
    input: PathBuf,
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,
    /// Processor counts for slackness (comma-separated); overrides the config
    #[arg(long, value_delimiter = ',')]
    processors: Vec<u32>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    input: PathBuf,
    #[arg(long, value_enum, default_value = "metis")]
    format: EncodeFormat,
    /// Output path; defaults under the configured graph/scotch directory
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PartitionArgs {
    input: PathBuf,
    /// Number of parts
    k: u32,
    /// Colored DOT output; defaults to <dot_dir>/<name>.metis.dot
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MapArgs {
    input: PathBuf,
    /// Architecture description; overrides scotch.arch
    #[arg(long)]
    arch: Option<PathBuf>,
    /// Colored DOT output; defaults to <dot_dir>/<name>.scotch.dot
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MergeArgs {
    input: PathBuf,
    #[arg(long)]
    assignment: PathBuf,
    #[arg(long = "assignment-format", value_enum, default_value = "position")]
    assignment_format: AssignmentKind,
    /// Id -> name side file; when omitted the graph is re-encoded to number it
    #[arg(long)]
    mapping: Option<PathBuf>,
    /// `modulo` or `first-seen`
    #[arg(long, default_value = "modulo")]
    strategy: String,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct QualityArgs {
    /// Format A graph file
    graph: PathBuf,
    /// By-position assignment (`<graph>.part.<k>`)
    assignment: PathBuf,
    k: u32,
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Format A graph file
    graph: PathBuf,
    #[arg(long)]
    k_min: Option<u32>,
    #[arg(long)]
    k_max: Option<u32>,
    /// Keep a k only when both edge cut and communication volume are reported
    #[arg(long)]
    require_complete: bool,
    /// Append the series as JSONL metric records
    #[arg(long)]
    series_jsonl: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SeriesArgs {
    input: PathBuf,
}

#[derive(Args, Debug)]
struct LoadArgs {
    input: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    dp_telemetry::init_with_verbosity(cli.verbose);

    // works across subcommands; the analyzer and engines read it when built with 'profile'
    if let Some(p) = &cli.profile_jsonl {
        if std::env::var("DAGPART_PROFILE_JSONL").is_err() {
            std::env::set_var("DAGPART_PROFILE_JSONL", p);
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Analyze(args) => cmd_analyze(&cfg, args),
        Command::Encode(args) => cmd_encode(&cfg, args),
        Command::Partition(args) => cmd_partition(&cfg, args),
        Command::Map(args) => cmd_map(&cfg, args),
        Command::Merge(args) => cmd_merge(args),
        Command::Quality(args) => cmd_quality(args),
        Command::Sweep(args) => cmd_sweep(&cfg, args),
        Command::Series(args) => cmd_series(args),
        Command::Load(args) => cmd_load(args),
    }
}

/// File name without extension, used to name derived artifacts.
fn base_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("cannot derive a name from {}", path.display()))
}

fn cmd_analyze(cfg: &ToolConfig, args: AnalyzeArgs) -> Result<()> {
    let g = AttributedGraph::from_dot_path(&args.input)?;
    let processors = if args.processors.is_empty() { &cfg.analysis.processors } else { &args.processors };
    let m = analyze_with(&g, processors)?;
    match args.format {
        ReportFormat::Text => print!("{}", m.render_text()),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&m)?),
        ReportFormat::Yaml => print!("{}", serde_yaml::to_string(&m)?),
    }
    Ok(())
}

fn cmd_encode(cfg: &ToolConfig, args: EncodeArgs) -> Result<()> {
    let g = AttributedGraph::from_dot_path(&args.input)?;
    let name = base_name(&args.input)?;
    let enc = build_encoder(args.format.encoder())?;
    let out = args.out.unwrap_or_else(|| match args.format {
        EncodeFormat::Metis => cfg.output.graph_dir.join(format!("{name}.graph")),
        EncodeFormat::Scotch => cfg.output.scotch_dir.join(format!("{name}.grf")),
    });
    let encoded = encode_to_path(enc.as_ref(), &g, &out)?;
    println!(
        "{} graph written to {} ({} vertices, {} edges)",
        encoded.format,
        out.display(),
        encoded.vertices,
        encoded.header_edges
    );
    Ok(())
}

fn write_colored(report: &MergeReport, out: &Path) -> Result<()> {
    report.graph.write_dot(out)?;
    if report.is_complete() {
        println!("all DOT nodes matched with partition groups");
    } else {
        println!(
            "warning: {} node(s) not found in partition map: {:?}",
            report.missing.len(),
            report.missing
        );
    }
    println!("colored DOT file written to {}", out.display());
    Ok(())
}

fn cmd_partition(cfg: &ToolConfig, args: PartitionArgs) -> Result<()> {
    if args.k < 1 {
        bail!("k must be >= 1");
    }
    let g = AttributedGraph::from_dot_path(&args.input)?;
    let name = base_name(&args.input)?;
    let graph_file = cfg.output.graph_dir.join(format!("{name}.graph"));
    encode_to_path(&MetisEncoder, &g, &graph_file)?;

    let run = run_gpmetis(&cfg.metis, &graph_file, args.k)?;
    print!("{}", run.output);
    let mapping = NodeIndexMapping::read_json(mapping_path_for(&graph_file))?;
    let assignment = PartitionAssignment::read(&run.assignment_path, AssignmentFormat::ByPosition, &mapping)?;
    let report = merge_partition(&g, &assignment, &mapping, &mut FirstSeenColors::new());
    let out = args.out.unwrap_or_else(|| cfg.output.dot_dir.join(format!("{name}.metis.dot")));
    write_colored(&report, &out)
}

fn cmd_map(cfg: &ToolConfig, args: MapArgs) -> Result<()> {
    let g = AttributedGraph::from_dot_path(&args.input)?;
    let name = base_name(&args.input)?;
    let grf = cfg.output.scotch_dir.join(format!("{name}.grf"));
    let map_file = cfg.output.scotch_dir.join(format!("{name}.map"));
    let encoded = encode_to_path(&ScotchEncoder, &g, &grf)?;

    let mut scotch = cfg.scotch.clone();
    if let Some(arch) = args.arch {
        scotch.arch = arch;
    }
    let output = run_gmap(&scotch, &grf, &map_file)?;
    info!("mapper output:\n{output}");
    let assignment = PartitionAssignment::read(&map_file, AssignmentFormat::Pairs, &encoded.mapping)?;
    let report = merge_partition(&g, &assignment, &encoded.mapping, &mut GroupModuloColors);
    let out = args.out.unwrap_or_else(|| cfg.output.dot_dir.join(format!("{name}.scotch.dot")));
    write_colored(&report, &out)
}

fn cmd_merge(args: MergeArgs) -> Result<()> {
    let g = AttributedGraph::from_dot_path(&args.input)?;
    let format = match args.assignment_format {
        AssignmentKind::Position => AssignmentFormat::ByPosition,
        AssignmentKind::Pairs => AssignmentFormat::Pairs,
    };
    let mapping = match &args.mapping {
        Some(p) => NodeIndexMapping::read_json(p)?,
        None => build_encoder(args.assignment_format.encoder())?.encode(&g).mapping,
    };
    let assignment = PartitionAssignment::read(&args.assignment, format, &mapping)?;
    let mut strategy = build_strategy(&args.strategy)?;
    let report = merge_partition(&g, &assignment, &mapping, strategy.as_mut());
    write_colored(&report, &args.out)
}

fn cmd_quality(args: QualityArgs) -> Result<()> {
    let wg = WeightedGraphFile::read(&args.graph)?;
    let text = std::fs::read_to_string(&args.assignment)
        .with_context(|| format!("cannot read {}", args.assignment.display()))?;
    let groups = parse_by_position(&text).with_context(|| format!("invalid assignment {}", args.assignment.display()))?;
    let q = imbalance(&wg, &groups, args.k)?;
    match args.format {
        ReportFormat::Text => print!("{}", q.render_text()),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&q)?),
        ReportFormat::Yaml => print!("{}", serde_yaml::to_string(&q)?),
    }
    Ok(())
}

fn engine_run(cfg: &ToolConfig, graph: &Path, k: u32) -> Result<EngineRun> {
    match run_gpmetis(&cfg.metis, graph, k) {
        Ok(run) => {
            let assignment = std::fs::read_to_string(&run.assignment_path)
                .map_err(|e| warn!(k, "cannot read {}: {e}", run.assignment_path.display()))
                .ok();
            Ok(EngineRun { edgecut: run.edgecut, comm_volume: run.comm_volume, assignment })
        }
        // metrics may still be in the output even without a part file
        Err(EngineError::MissingOutput { output, .. }) => Ok(EngineRun {
            edgecut: parse_edgecut(&output),
            comm_volume: parse_comm_volume(&output),
            assignment: None,
        }),
        Err(e) => Err(e.into()),
    }
}

fn cmd_sweep(cfg: &ToolConfig, args: SweepArgs) -> Result<()> {
    let range = cfg.sweep.with_overrides(args.k_min, args.k_max, args.require_complete);
    range.validate()?;
    let wg = WeightedGraphFile::read(&args.graph)?;
    let series = sweep(&wg, range.ks(), range.require_complete, |k| engine_run(cfg, &args.graph, k));
    print!("{}", series.render_text());
    if series.points.is_empty() {
        warn!("no partitioning metrics collected");
    }

    if let Some(path) = &args.series_jsonl {
        let app = profiling::Appender::open(path)?;
        let name = base_name(&args.graph)?;
        for (metric, k, value) in series.records() {
            app.log(&profiling::ProfileRecord::now(metric, value, labels::sweep(&name, k, "metis")))?;
        }
        info!(records = series.records().len(), "series appended to {}", path.display());
    }
    Ok(())
}

fn cmd_series(args: SeriesArgs) -> Result<()> {
    let stats = profiling::summarize_jsonl(&args.input)?;
    print!("{}", profiling::summary_csv(&stats));
    Ok(())
}

fn cmd_load(args: LoadArgs) -> Result<()> {
    let g = AttributedGraph::from_dot_path(&args.input)?;
    print!("{}", render_load(&load_by_color(&g)));
    Ok(())
}

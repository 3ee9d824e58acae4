#![warn(missing_docs)]
//! benchmon CLI Library
//!
//! Command-line driver for benchmon suites. A suite lives in `benchmon.toml`;
//! each `[[benchmark]]` is a script template plus parameter axes. The driver
//! samples every grid, runs the active combinations in fresh child processes
//! and reports duration and peak memory.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     benchmon_cli::run()
//! }
//! ```

mod config;
mod executor;
mod metadata;
mod optional;
mod planner;
mod run_config;
mod suite;

pub use config::*;
pub use executor::Executor;
pub use metadata::build_report_meta;
pub use optional::{
    DEFAULT_IMPORT_CHECK, DependencyResolver, OptionalDependencyUnavailable, SystemResolver,
    resolve_in, try_import_optional, try_load_optional,
};
pub use planner::{
    ExecutionPlan, PlanError, PlanFilter, PlannedRun, build_plan, select_benchmarks,
};
pub use run_config::*;
pub use suite::{BenchmarkDef, SuiteError, validate_suite};

use anyhow::Context;
use benchmon_monitor::limits::{self, LimitError, LimitOutcome};
use benchmon_monitor::{ProcessMonitor, StrategyChoice, WAIT4_AVAILABLE};
use benchmon_report::{
    OutputFormat, Report, ReportSummary, RunStatus, format_bytes, render,
};
use benchmon_sampler::Activation;
use clap::{Parser, Subcommand};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// benchmon CLI arguments
#[derive(Parser, Debug)]
#[command(name = "benchmon")]
#[command(author, version, about = "benchmon - sampled, process-isolated benchmark runner")]
pub struct Cli {
    /// Optional subcommand (Run, List, Probe, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter benchmarks by regex pattern
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Suite file (default: nearest benchmon.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format: human, json, csv
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run benchmarks for this group only
    #[arg(long)]
    pub group: Option<String>,

    /// Filter by tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Skip benchmarks with this tag
    #[arg(long)]
    pub skip_tag: Option<String>,

    /// Run every parameter combination (same as BENCHMON_XSLOW=1)
    #[arg(long)]
    pub exhaustive: bool,

    /// Shuffle seed for bounded benchmarks
    #[arg(long)]
    pub seed: Option<u64>,

    /// Suite-wide bound on active combinations per benchmark
    #[arg(long)]
    pub max_combinations: Option<usize>,

    /// Measurement strategy: auto, wait4, poll
    #[arg(long)]
    pub strategy: Option<StrategyChoice>,

    /// Polling interval (e.g. "10ms")
    #[arg(long)]
    pub poll_interval: Option<String>,

    /// Runs per active combination
    #[arg(long, short = 'r')]
    pub repeat: Option<u32>,

    /// Cap the driver's address space at suite start
    #[arg(long)]
    pub limit_memory: bool,

    /// Explicit address-space cap in bytes (implies --limit-memory)
    #[arg(long)]
    pub max_memory: Option<u64>,

    /// Fail instead of skipping when an optional dependency is missing
    #[arg(long)]
    pub strict_imports: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run benchmarks (default)
    Run,
    /// List the plan: every combination with its activation
    List,
    /// Report the measurement strategy and memory facilities
    Probe,
    /// Print a default benchmon.toml
    Init,
}

impl Cli {
    /// Command-line overrides for run settings
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            exhaustive: self.exhaustive.then_some(true),
            seed: self.seed,
            max_combinations: self.max_combinations,
            strategy: self.strategy,
            poll_interval: self.poll_interval.clone(),
            repeat: self.repeat,
            limit_memory: self.limit_memory.then_some(true),
            max_memory: self.max_memory,
            strict_imports: self.strict_imports,
        }
    }
}

/// Run the benchmon CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the benchmon CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    let filter = if cli.verbose {
        "benchmon=debug"
    } else {
        "benchmon=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    if matches!(cli.command, Some(Commands::Init)) {
        print!("{}", BenchmonConfig::default_toml());
        return Ok(());
    }

    let (config_path, config) = load_config(cli.config.as_deref())?;
    match &config_path {
        Some(path) => debug!("Loaded suite from {}", path.display()),
        None => debug!("No benchmon.toml found, using defaults"),
    }

    let run_config = BenchmarkRunConfig::resolve(&config, &EnvSnapshot::capture(), &cli.overrides())?;
    validate_suite(&config.benchmarks)?;

    match cli.command {
        Some(Commands::Probe) => probe(&run_config),
        Some(Commands::List) => list_benchmarks(&cli, &config, &run_config),
        Some(Commands::Run) | None => run_benchmarks(&cli, &config, &run_config),
        Some(Commands::Init) => Ok(()),
    }
}

/// Load an explicit suite file, or discover one
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Option<PathBuf>, BenchmonConfig)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => BenchmonConfig::discover(),
    };
    match path {
        Some(path) => {
            let config = BenchmonConfig::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            Ok((Some(path), config))
        }
        None => Ok((None, BenchmonConfig::default())),
    }
}

fn plan_filter<'f>(cli: &'f Cli, pattern: &'f Regex) -> PlanFilter<'f> {
    PlanFilter {
        pattern: Some(pattern),
        group: cli.group.as_deref(),
        tag: cli.tag.as_deref(),
        skip_tag: cli.skip_tag.as_deref(),
    }
}

fn list_benchmarks(
    cli: &Cli,
    config: &BenchmonConfig,
    run_config: &BenchmarkRunConfig,
) -> anyhow::Result<()> {
    let pattern = Regex::new(&cli.filter).context("Invalid filter pattern")?;
    let plan = build_plan(
        &config.benchmarks,
        &plan_filter(cli, &pattern),
        run_config,
        &SystemResolver::new(run_config),
    )?;

    println!("benchmon Plan:");

    let mut groups: BTreeMap<&str, Vec<&BenchmarkDef>> = BTreeMap::new();
    for &bench in &plan.benchmarks {
        groups.entry(bench.group.as_str()).or_default().push(bench);
    }

    for (group, benches) in &groups {
        println!("├── group: {}", group);
        for bench in benches {
            let runs: Vec<&PlannedRun> = plan
                .runs
                .iter()
                .filter(|r| r.bench.id == bench.id)
                .collect();
            let active = runs.iter().filter(|r| r.activation.is_run()).count();
            let tags = if bench.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", bench.tags.join(", "))
            };
            println!(
                "│   ├── {}{} ({}/{} active)",
                bench.id,
                tags,
                active,
                runs.len()
            );
            for run in runs {
                let (mark, note) = match &run.activation {
                    Activation::Run => ("▶", String::new()),
                    Activation::Skip(reason) => ("⊘", format!("  {}", reason)),
                    Activation::Fail(reason) => ("✗", format!("  {}", reason)),
                };
                println!("│   │   ├── {} {}{}", mark, run.label(), note);
            }
        }
    }

    println!(
        "{} benchmarks, {} combinations, {} active.",
        plan.benchmarks.len(),
        plan.runs.len(),
        plan.runnable()
    );

    plan.check()?;
    Ok(())
}

fn probe(run_config: &BenchmarkRunConfig) -> anyhow::Result<()> {
    println!("benchmon Probe:");
    println!("├── wait4 compiled in: {}", WAIT4_AVAILABLE);
    match ProcessMonitor::probe(run_config.strategy, run_config.poll_interval) {
        Ok(monitor) => println!("├── strategy: {}", monitor.strategy_name()),
        Err(e) => println!("├── strategy: unavailable ({})", e),
    }
    match limits::memory_info() {
        Some(info) => println!(
            "├── memory: {} total, {} available",
            format_bytes(info.total),
            format_bytes(info.available)
        ),
        None => println!("├── memory: unknown"),
    }
    match limits::current_limit()? {
        Some(limit) => println!(
            "└── address space limit: soft {}, hard {}",
            limit.soft.map(format_bytes).unwrap_or_else(|| "unlimited".to_string()),
            limit.hard.map(format_bytes).unwrap_or_else(|| "unlimited".to_string())
        ),
        None => println!("└── address space limit: unsupported"),
    }
    Ok(())
}

/// Apply the address-space guard, returning the cap in effect
pub fn apply_guard(run_config: &BenchmarkRunConfig) -> anyhow::Result<Option<u64>> {
    let Some(guard) = run_config.memory_guard else {
        return Ok(None);
    };
    match limits::apply_memory_limit(guard.max_memory, guard.fraction) {
        Ok(LimitOutcome::Applied { limit }) => {
            info!("Address space limited to {}", format_bytes(limit));
            Ok(Some(limit))
        }
        Ok(LimitOutcome::Rejected { requested, reason }) => {
            debug!("Address space limit of {} bytes rejected: {}", requested, reason);
            Ok(None)
        }
        Ok(LimitOutcome::Unsupported) => {
            warn!("Address space limits are not supported on this platform");
            Ok(None)
        }
        Err(LimitError::MemoryInfoUnavailable) => {
            warn!("Memory size unknown; set --max-memory to apply a limit");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Plan, execute and summarize a suite.
///
/// Setup failures abort before any process is spawned.
pub fn run_suite(
    benchmarks: &[BenchmarkDef],
    filter: &PlanFilter<'_>,
    run_config: &BenchmarkRunConfig,
    show_progress: bool,
) -> anyhow::Result<Report> {
    let plan = build_plan(benchmarks, filter, run_config, &SystemResolver::new(run_config))?;
    plan.check()?;

    let monitor = ProcessMonitor::probe(run_config.strategy, run_config.poll_interval)?;
    let memory_limit = apply_guard(run_config)?;
    let executor = Executor::new(monitor, run_config).with_progress(show_progress);

    info!(
        "Running {} of {} combinations ({} strategy)",
        plan.runnable(),
        plan.runs.len(),
        executor.strategy_name()
    );

    let start_time = Instant::now();
    let results = executor.execute(&plan);
    let total_duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    let meta = build_report_meta(run_config, executor.strategy_name(), memory_limit);
    let summary = ReportSummary::from_results(&results, total_duration_ms);
    Ok(Report {
        meta,
        results,
        summary,
    })
}

fn run_benchmarks(
    cli: &Cli,
    config: &BenchmonConfig,
    run_config: &BenchmarkRunConfig,
) -> anyhow::Result<()> {
    let format = cli
        .format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse::<OutputFormat>()
        .map_err(|e| anyhow::anyhow!(e))?;

    let pattern = Regex::new(&cli.filter).context("Invalid filter pattern")?;
    let filter = plan_filter(cli, &pattern);
    if select_benchmarks(&config.benchmarks, &filter).is_empty() {
        println!("No benchmarks found.");
        return Ok(());
    }

    let report = run_suite(&config.benchmarks, &filter, run_config, true)?;
    let output = render(&report, format)?;

    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    if let Some(ref directory) = config.output.directory {
        let path = save_report(Path::new(directory), &report, format)?;
        info!("Report saved to {}", path.display());
    }

    let failed = report
        .results
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();
    if failed > 0 {
        eprintln!("\n{} combination(s) failed", failed);
        std::process::exit(1);
    }

    Ok(())
}

/// Write a report into `directory` as `report.<ext>`
fn save_report(directory: &Path, report: &Report, format: OutputFormat) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(directory)?;
    let extension = match format {
        OutputFormat::Json => "json",
        OutputFormat::Csv => "csv",
        OutputFormat::Human => "txt",
    };
    let path = directory.join(format!("report.{}", extension));
    std::fs::write(&path, render(report, format)?)?;
    Ok(path)
}

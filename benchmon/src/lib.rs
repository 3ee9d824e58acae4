#![warn(missing_docs)]
//! # benchmon
//!
//! Benchmark driver for script-based suites, with reproducible parameter
//! sampling and process-isolated measurement.
//!
//! ## Features
//!
//! - **Sampling**: seeded, bounded subsets of each benchmark's parameter grid
//! - **Isolation**: every combination runs in a fresh child process
//! - **Peak memory**: `wait4` rusage where available, `/proc` polling otherwise
//! - **Memory guard**: optional `RLIMIT_AS` cap on the driver
//! - **Output**: human, JSON and CSV reports
//!
//! ## Quick Start
//!
//! ```ignore
//! use benchmon::prelude::*;
//!
//! let space = ParameterSpace::new(vec![
//!     ParameterAxis::new("method", ["exact", "asymptotic"]),
//!     ParameterAxis::new("n", [100_i64, 1000, 10000]),
//! ])?;
//! let sampler = ParameterSampler::new(space, SelectionMode::Sampled(SelectionPolicy::new(1, 2)));
//!
//! let monitor = ProcessMonitor::probe(StrategyChoice::Auto, DEFAULT_POLL_INTERVAL)?;
//! for combo in sampler.active_set() {
//!     let work = Work::script(&["python3", "-c"], &format!("print({:?})", combo))?;
//!     let result = monitor.run(&work)?;
//!     println!("{:?} took {:?}", combo, result.duration);
//! }
//! ```

// Re-export sampler types
pub use benchmon_sampler::{
    Activation, DEFAULT_SEED, MAX_SPACE_LEN, ParamValue, ParameterAxis, ParameterSampler,
    ParameterSpace, SamplerError, SelectionMode, SelectionPolicy, SkipReason, select_indices,
};

// Re-export monitor types
pub use benchmon_monitor::{
    DEFAULT_POLL_INTERVAL, MaxRssUnit, MonitorError, PeakMemory, Polling, ProcessMetricsStrategy,
    ProcessMonitor, ProcessResult, RunState, StrategyChoice, WAIT4_AVAILABLE, Work, limits,
    normalize_max_rss, probe_strategy,
};

// Re-export report types
pub use benchmon_report::{
    BenchmarkKind, CombinationResult, OutputFormat, Report, RunMetrics, RunStatus, render,
};

// Re-export driver types
pub use benchmon_cli::{
    BenchmarkDef, BenchmarkRunConfig, BenchmonConfig, DependencyResolver, EnvSnapshot,
    ImportPolicy, OptionalDependencyUnavailable, PlanFilter, SystemResolver, build_plan,
    run_suite, try_import_optional, try_load_optional, validate_suite,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Activation, DEFAULT_POLL_INTERVAL, ParamValue, ParameterAxis, ParameterSampler,
        ParameterSpace, ProcessMonitor, SelectionMode, SelectionPolicy, StrategyChoice, Work,
    };
}

/// Run the benchmon CLI harness.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     benchmon::run()
/// }
/// ```
pub use benchmon_cli::run;

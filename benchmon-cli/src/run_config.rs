//! Run Configuration
//!
//! Every run-wide setting resolved once at startup into an immutable
//! [`BenchmarkRunConfig`]. Layering: CLI flag, then environment, then
//! benchmon.toml, then built-in default.

use crate::config::BenchmonConfig;
use crate::optional::MODULE_PLACEHOLDER;
use crate::suite::BenchmarkDef;
use anyhow::Context;
use benchmon_monitor::{DEFAULT_POLL_INTERVAL, StrategyChoice};
use benchmon_sampler::{SelectionMode, SelectionPolicy};
use std::time::Duration;

/// Non-zero integer selects exhaustive mode
pub const XSLOW_ENV: &str = "BENCHMON_XSLOW";
/// "0" or "false" makes missing optional dependencies fatal
pub const ALLOW_IMPORT_ERRORS_ENV: &str = "BENCHMON_ALLOW_IMPORT_ERRORS";

/// What happens when an optional dependency is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Skip the benchmark
    Suppress,
    /// Abort the run before anything is spawned
    Fatal,
}

/// Environment variables relevant to a run, captured once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    /// Raw `BENCHMON_XSLOW`
    pub xslow: Option<String>,
    /// Raw `BENCHMON_ALLOW_IMPORT_ERRORS`
    pub allow_import_errors: Option<String>,
}

impl EnvSnapshot {
    /// Read the process environment
    pub fn capture() -> Self {
        Self {
            xslow: std::env::var(XSLOW_ENV).ok(),
            allow_import_errors: std::env::var(ALLOW_IMPORT_ERRORS_ENV).ok(),
        }
    }
}

/// Interpret an xslow value: integer, non-zero means exhaustive.
///
/// Unparsable values count as "not exhaustive".
pub fn parse_xslow(value: &str) -> bool {
    value.trim().parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

/// Interpret an allow-import-errors value: only "0" and "false" disallow.
pub fn parse_allow_import_errors(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "0" | "false")
}

/// Settings given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// `--exhaustive`
    pub exhaustive: Option<bool>,
    /// `--seed`
    pub seed: Option<u64>,
    /// `--max-combinations`
    pub max_combinations: Option<usize>,
    /// `--strategy`
    pub strategy: Option<StrategyChoice>,
    /// `--poll-interval`, a duration string
    pub poll_interval: Option<String>,
    /// `--repeat`
    pub repeat: Option<u32>,
    /// `--limit-memory`
    pub limit_memory: Option<bool>,
    /// `--max-memory`, implies the guard
    pub max_memory: Option<u64>,
    /// `--strict-imports`
    pub strict_imports: bool,
}

/// Address-space guard request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryGuard {
    /// Explicit cap in bytes
    pub max_memory: Option<u64>,
    /// Fraction of total memory when no explicit cap is set
    pub fraction: f64,
}

/// Immutable settings for one `run` invocation
#[derive(Debug, Clone)]
pub struct BenchmarkRunConfig {
    /// Ignore every bound and run all combinations
    pub exhaustive: bool,
    /// Missing optional dependency handling
    pub import_policy: ImportPolicy,
    /// Interpreter script checking one module, with a `{module}` placeholder
    pub import_check: String,
    /// Default shuffle seed
    pub seed: u64,
    /// Suite-wide bound for benchmarks without their own
    pub max_combinations: Option<usize>,
    /// Measurement strategy
    pub strategy: StrategyChoice,
    /// Polling strategy interval
    pub poll_interval: Duration,
    /// Runs per active combination
    pub repeat: u32,
    /// Command prefix for scripts
    pub interpreter: Vec<String>,
    /// Guard applied at suite start, if any
    pub memory_guard: Option<MemoryGuard>,
}

impl Default for BenchmarkRunConfig {
    fn default() -> Self {
        let file = BenchmonConfig::default();
        Self {
            exhaustive: false,
            import_policy: ImportPolicy::Suppress,
            import_check: file.imports.check,
            seed: file.sampling.seed,
            max_combinations: None,
            strategy: StrategyChoice::Auto,
            poll_interval: DEFAULT_POLL_INTERVAL,
            repeat: file.runner.repeat,
            interpreter: file.runner.interpreter,
            memory_guard: None,
        }
    }
}

impl BenchmarkRunConfig {
    /// Layer CLI overrides, environment and file settings
    pub fn resolve(
        file: &BenchmonConfig,
        env: &EnvSnapshot,
        cli: &RunOverrides,
    ) -> anyhow::Result<Self> {
        let exhaustive = cli
            .exhaustive
            .or_else(|| env.xslow.as_deref().map(parse_xslow))
            .unwrap_or(file.sampling.exhaustive);

        let allow_errors = if cli.strict_imports {
            false
        } else {
            env.allow_import_errors
                .as_deref()
                .map(parse_allow_import_errors)
                .unwrap_or(file.imports.allow_errors)
        };
        let import_policy = if allow_errors {
            ImportPolicy::Suppress
        } else {
            ImportPolicy::Fatal
        };

        if !file.imports.check.contains(MODULE_PLACEHOLDER) {
            anyhow::bail!("[imports] check must contain {}", MODULE_PLACEHOLDER);
        }

        let strategy = match cli.strategy {
            Some(choice) => choice,
            None => file
                .runner
                .strategy
                .parse::<StrategyChoice>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid [runner] strategy")?,
        };

        let interval_str = cli
            .poll_interval
            .as_deref()
            .unwrap_or(&file.runner.poll_interval);
        let poll_interval = Duration::from_nanos(
            BenchmonConfig::parse_duration(interval_str).context("Invalid poll interval")?,
        );
        if poll_interval.is_zero() {
            anyhow::bail!("Poll interval must be positive");
        }

        let repeat = cli.repeat.unwrap_or(file.runner.repeat);
        if repeat == 0 {
            anyhow::bail!("Repeat count must be at least 1");
        }

        if file.runner.interpreter.is_empty() {
            anyhow::bail!("[runner] interpreter must name a program");
        }

        let limits_enabled = cli.limit_memory.unwrap_or(file.limits.enabled) || cli.max_memory.is_some();
        let memory_guard = limits_enabled.then(|| MemoryGuard {
            max_memory: cli.max_memory.or(file.limits.max_memory),
            fraction: file.limits.memory_fraction,
        });

        Ok(Self {
            exhaustive,
            import_policy,
            import_check: file.imports.check.clone(),
            seed: cli.seed.unwrap_or(file.sampling.seed),
            max_combinations: cli.max_combinations.or(file.sampling.max_combinations),
            strategy,
            poll_interval,
            repeat,
            interpreter: file.runner.interpreter.clone(),
            memory_guard,
        })
    }

    /// Selection mode for one benchmark.
    ///
    /// A benchmark is sampled only when a bound applies to it: its own
    /// `max_combinations`, else the suite-wide one.
    pub fn selection_mode(&self, bench: &BenchmarkDef) -> SelectionMode {
        if self.exhaustive {
            return SelectionMode::Exhaustive;
        }
        match bench.max_combinations.or(self.max_combinations) {
            Some(max) => SelectionMode::Sampled(SelectionPolicy::new(
                bench.seed.unwrap_or(self.seed),
                max,
            )),
            None => SelectionMode::Exhaustive,
        }
    }
}

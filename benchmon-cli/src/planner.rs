//! Benchmark Planner
//!
//! Builds the execution plan by filtering benchmarks and deciding, for every
//! parameter combination, whether it runs.
//!
//! Filtering options:
//! - Regex pattern matching on benchmark ID
//! - Group filtering
//! - Tag inclusion/exclusion
//!
//! Ordering: benchmarks are sorted alphabetically by ID, combinations follow
//! canonical grid order.
//!
//! Per-benchmark gates are checked before sampling: missing optional
//! dependencies first (executables, then modules; skip or fail per the import
//! policy), then the exhaustive-only flag.

use crate::optional::{DependencyResolver, OptionalDependencyUnavailable};
use crate::run_config::{BenchmarkRunConfig, ImportPolicy};
use crate::suite::{BenchmarkDef, SuiteError};
use benchmon_sampler::{Activation, ParamValue, ParameterSampler, SkipReason};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Planning errors
#[derive(Debug, Error)]
pub enum PlanError {
    /// A benchmark definition is malformed
    #[error(transparent)]
    Suite(#[from] SuiteError),

    /// Benchmarks whose setup failed, one message each
    #[error("Setup failed for {} benchmark(s):\n  {}", .0.len(), .0.join("\n  "))]
    SetupFailed(Vec<String>),
}

/// Benchmark selection criteria
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanFilter<'f> {
    /// Regex on benchmark ID
    pub pattern: Option<&'f Regex>,
    /// Exact group name
    pub group: Option<&'f str>,
    /// Required tag
    pub tag: Option<&'f str>,
    /// Excluded tag
    pub skip_tag: Option<&'f str>,
}

impl PlanFilter<'_> {
    fn matches(&self, bench: &BenchmarkDef) -> bool {
        if let Some(re) = self.pattern {
            if !re.is_match(&bench.id) {
                return false;
            }
        }
        if let Some(g) = self.group {
            if bench.group != g {
                return false;
            }
        }
        if let Some(t) = self.tag {
            if !bench.tags.iter().any(|tag| tag == t) {
                return false;
            }
        }
        if let Some(st) = self.skip_tag {
            if bench.tags.iter().any(|tag| tag == st) {
                return false;
            }
        }
        true
    }
}

/// One parameter combination and its activation decision
#[derive(Debug, Clone)]
pub struct PlannedRun<'a> {
    /// Owning benchmark
    pub bench: &'a BenchmarkDef,
    /// One value per axis
    pub params: Vec<ParamValue>,
    /// Run, skip or fail
    pub activation: Activation,
}

impl PlannedRun<'_> {
    /// `id(a=1, b=x)` label
    pub fn label(&self) -> String {
        self.bench.label(&self.params)
    }
}

/// Execution plan for benchmarks
#[derive(Debug, Default)]
pub struct ExecutionPlan<'a> {
    /// Selected benchmarks, sorted by ID
    pub benchmarks: Vec<&'a BenchmarkDef>,
    /// Every combination of every selected benchmark
    pub runs: Vec<PlannedRun<'a>>,
}

impl ExecutionPlan<'_> {
    /// Number of combinations that will execute
    pub fn runnable(&self) -> usize {
        self.runs.iter().filter(|r| r.activation.is_run()).count()
    }

    /// Refuse to proceed when any benchmark failed setup
    pub fn check(&self) -> Result<(), PlanError> {
        let mut failures: Vec<String> = self
            .runs
            .iter()
            .filter_map(|run| match &run.activation {
                Activation::Fail(reason) => Some(format!("{}: {}", run.bench.id, reason)),
                _ => None,
            })
            .collect();
        failures.dedup();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PlanError::SetupFailed(failures))
        }
    }
}

/// Filter benchmarks and return them sorted by ID
pub fn select_benchmarks<'a>(
    benchmarks: &'a [BenchmarkDef],
    filter: &PlanFilter<'_>,
) -> Vec<&'a BenchmarkDef> {
    let mut selected: Vec<&BenchmarkDef> =
        benchmarks.iter().filter(|b| filter.matches(b)).collect();
    selected.sort_by(|a, b| a.id.cmp(&b.id));
    selected
}

/// Build the execution plan.
///
/// `resolver` looks up optional dependencies; the host implementation is
/// [`SystemResolver`](crate::optional::SystemResolver).
pub fn build_plan<'a, D>(
    benchmarks: &'a [BenchmarkDef],
    filter: &PlanFilter<'_>,
    config: &BenchmarkRunConfig,
    resolver: &D,
) -> Result<ExecutionPlan<'a>, PlanError>
where
    D: DependencyResolver + ?Sized,
{
    let selected = select_benchmarks(benchmarks, filter);
    let mut runs = Vec::new();

    for &bench in &selected {
        let space = bench.parameter_space()?;

        let gate = benchmark_gate(bench, config, resolver);
        match gate {
            Some(activation) => {
                debug!("{}: {:?} for all {} combinations", bench.id, activation, space.len());
                runs.extend(space.iter().map(|params| PlannedRun {
                    bench,
                    params,
                    activation: activation.clone(),
                }));
            }
            None => {
                let sampler = ParameterSampler::new(space, config.selection_mode(bench));
                let space = sampler.space();
                runs.extend(space.iter().map(|params| {
                    let activation = sampler.activation(&params);
                    PlannedRun {
                        bench,
                        params,
                        activation,
                    }
                }));
                debug!(
                    "{}: {}/{} combinations active",
                    bench.id,
                    sampler.active_set().len(),
                    space.len()
                );
            }
        }
    }

    Ok(ExecutionPlan {
        benchmarks: selected,
        runs,
    })
}

/// Benchmark-wide activation overriding the sampler, if any
fn benchmark_gate<D>(
    bench: &BenchmarkDef,
    config: &BenchmarkRunConfig,
    resolver: &D,
) -> Option<Activation>
where
    D: DependencyResolver + ?Sized,
{
    let missing = bench
        .requires
        .iter()
        .find_map(|name| resolver.executable(name).err())
        .or_else(|| {
            bench
                .modules
                .iter()
                .find_map(|name| resolver.module(name).err())
        });

    if let Some(err) = missing {
        return Some(unavailable(bench, config.import_policy, err));
    }

    if bench.xslow_only && !config.exhaustive {
        return Some(Activation::Skip(SkipReason::SlowOnly));
    }

    None
}

fn unavailable(
    bench: &BenchmarkDef,
    policy: ImportPolicy,
    err: OptionalDependencyUnavailable,
) -> Activation {
    match policy {
        ImportPolicy::Suppress => {
            debug!("{}: {}", bench.id, err);
            Activation::Skip(SkipReason::MissingDependency(err.name))
        }
        ImportPolicy::Fatal => Activation::Fail(err.to_string()),
    }
}

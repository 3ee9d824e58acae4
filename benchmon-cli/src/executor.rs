//! Benchmark Execution
//!
//! Walks an [`ExecutionPlan`] in order. Each active combination is rendered
//! into a script and run `repeat` times under the [`ProcessMonitor`], one
//! child at a time.
//!
//! ```text
//! PlannedRun (bench, params, activation)
//!        │
//!        ▼
//!  render_script → Work
//!        │
//!        ▼
//! ┌──────────────────┐
//! │  ProcessMonitor  │  spawn → wait4 / poll → ProcessResult
//! └────────┬─────────┘
//!          │
//!          ▼
//!  CombinationResult (status, metrics, failure)
//! ```
//!
//! A failed invocation fails the whole combination; no retries.

use crate::planner::{ExecutionPlan, PlannedRun};
use crate::run_config::BenchmarkRunConfig;
use benchmon_monitor::{MonitorError, ProcessMonitor, Work};
use benchmon_report::{
    BenchmarkKind, CombinationResult, FailureInfo, RunMetrics, RunStatus,
};
use benchmon_sampler::Activation;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Sequential executor for a plan
#[derive(Debug)]
pub struct Executor {
    monitor: ProcessMonitor,
    interpreter: Vec<String>,
    repeat: u32,
    show_progress: bool,
}

impl Executor {
    /// Create an executor around a probed monitor
    pub fn new(monitor: ProcessMonitor, config: &BenchmarkRunConfig) -> Self {
        Self {
            monitor,
            interpreter: config.interpreter.clone(),
            repeat: config.repeat.max(1),
            show_progress: true,
        }
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Name of the measurement strategy
    pub fn strategy_name(&self) -> &'static str {
        self.monitor.strategy_name()
    }

    /// Execute every planned combination, in plan order
    pub fn execute(&self, plan: &ExecutionPlan<'_>) -> Vec<CombinationResult> {
        let pb = if self.show_progress {
            ProgressBar::new(plan.runnable() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut results = Vec::with_capacity(plan.runs.len());
        for run in &plan.runs {
            if run.activation.is_run() {
                pb.set_message(run.label());
                results.push(self.execute_single(run));
                pb.inc(1);
            } else {
                results.push(not_executed(run));
            }
        }

        pb.finish_with_message("Complete");
        results
    }

    /// Execute a single active combination
    fn execute_single(&self, run: &PlannedRun<'_>) -> CombinationResult {
        let label = run.label();
        let mut result = base_result(run, RunStatus::Passed);

        let script = run.bench.render_script(&run.params);
        let work = match Work::script(self.interpreter.as_slice(), &script) {
            Ok(work) => work,
            Err(e) => return failed(result, &e),
        };

        let mut samples = Vec::with_capacity(self.repeat as usize);
        for _ in 0..self.repeat {
            match self.monitor.run(&work) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    warn!("{} failed: {}", label, first_line(&e.to_string()));
                    return failed(result, &e);
                }
            }
        }

        let metrics = RunMetrics::from_results(&samples);
        if let Some(metrics) = &metrics {
            if run.bench.kind == BenchmarkKind::PeakMem && metrics.peak_memory_bytes.is_none() {
                warn!("{}: peak memory unavailable with {} strategy", label, self.strategy_name());
            }
            info!("{}: median {:.6}s", label, metrics.median_seconds);
        }
        result.metrics = metrics;
        result
    }
}

fn base_result(run: &PlannedRun<'_>, status: RunStatus) -> CombinationResult {
    CombinationResult {
        benchmark_id: run.bench.id.clone(),
        group: run.bench.group.clone(),
        kind: run.bench.kind,
        params: run.bench.bindings(&run.params),
        status,
        metrics: None,
        skip_reason: None,
        failure: None,
    }
}

/// Result for a combination that was skipped or failed setup
fn not_executed(run: &PlannedRun<'_>) -> CombinationResult {
    match &run.activation {
        Activation::Skip(reason) => {
            let mut result = base_result(run, RunStatus::Skipped);
            result.skip_reason = Some(reason.to_string());
            result
        }
        Activation::Fail(reason) => {
            let mut result = base_result(run, RunStatus::Failed);
            result.failure = Some(FailureInfo {
                kind: "setup-failed".to_string(),
                message: reason.clone(),
            });
            result
        }
        Activation::Run => base_result(run, RunStatus::Skipped),
    }
}

fn failed(mut result: CombinationResult, error: &MonitorError) -> CombinationResult {
    result.status = RunStatus::Failed;
    result.metrics = None;
    result.failure = Some(FailureInfo {
        kind: failure_kind(error).to_string(),
        message: error.to_string(),
    });
    result
}

fn failure_kind(error: &MonitorError) -> &'static str {
    match error {
        MonitorError::Spawn(_) => "spawn",
        MonitorError::Wait(_) => "wait",
        MonitorError::ExecutionFailed { .. } => "execution-failed",
        MonitorError::UnsupportedPlatform(_) => "unsupported-platform",
        MonitorError::InvalidWork(_) => "invalid-work",
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

//! Process Monitor
//!
//! Runs one unit of work per call under the selected strategy. Each call goes
//! `NotStarted → Running → {Succeeded, Failed}`; there are no retries and no
//! deadline. A caller that needs a timeout must kill the child itself.

use crate::MonitorError;
use crate::result::ProcessResult;
use crate::strategy::{ProcessMetricsStrategy, StrategyChoice, probe_strategy};
use crate::work::Work;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Lifecycle of a single monitored invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Work accepted, nothing spawned yet
    NotStarted,
    /// Child spawned and being measured
    Running,
    /// Child exited with success
    Succeeded,
    /// Child exited with a failure status
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::NotStarted => "not-started",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Runs work out-of-process and reports duration and peak memory
#[derive(Debug)]
pub struct ProcessMonitor {
    strategy: Box<dyn ProcessMetricsStrategy>,
}

impl ProcessMonitor {
    /// Wrap an explicit strategy
    pub fn new(strategy: Box<dyn ProcessMetricsStrategy>) -> Self {
        Self { strategy }
    }

    /// Probe the platform once and build a monitor around the chosen strategy
    pub fn probe(choice: StrategyChoice, poll_interval: Duration) -> Result<Self, MonitorError> {
        Ok(Self::new(probe_strategy(choice, poll_interval)?))
    }

    /// Name of the strategy in use
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Run `work` to completion.
    ///
    /// A non-success exit yields `ExecutionFailed` and no sample.
    pub fn run(&self, work: &Work) -> Result<ProcessResult, MonitorError> {
        let strategy = self.strategy.name();
        debug!(strategy, program = work.program(), state = %RunState::NotStarted, "monitoring work");

        let command = work.to_command();
        debug!(strategy, state = %RunState::Running, "spawning child");
        let observation = self.strategy.measure(command)?;

        if !observation.status.success() {
            debug!(
                strategy,
                state = %RunState::Failed,
                status = %observation.status,
                "child exited with failure"
            );
            return Err(MonitorError::ExecutionFailed {
                work: work.source().to_string(),
                status: observation.status,
            });
        }

        debug!(
            strategy,
            state = %RunState::Succeeded,
            duration_ms = observation.duration.as_secs_f64() * 1000.0,
            peak_memory = %observation.peak_memory,
            "child exited"
        );

        Ok(ProcessResult {
            duration: observation.duration,
            peak_memory: observation.peak_memory,
            succeeded: true,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::result::PeakMemory;
    use crate::strategy::DEFAULT_POLL_INTERVAL;

    fn sh(body: &str) -> Work {
        Work::script(&["sh", "-c"], body).unwrap()
    }

    #[test]
    fn test_success_path() {
        let monitor = ProcessMonitor::probe(StrategyChoice::Auto, DEFAULT_POLL_INTERVAL).unwrap();
        let result = monitor.run(&sh("exit 0")).unwrap();
        assert!(result.succeeded);
        assert!(result.is_valid_sample());
        assert!(result.duration > Duration::ZERO);
        if monitor.strategy_name() == "wait4" {
            assert!(matches!(result.peak_memory, PeakMemory::Bytes(b) if b > 0));
        }
    }

    #[test]
    fn test_failure_path_carries_source() {
        let monitor = ProcessMonitor::probe(StrategyChoice::Auto, DEFAULT_POLL_INTERVAL).unwrap();
        match monitor.run(&sh("  exit 1")) {
            Err(MonitorError::ExecutionFailed { work, status }) => {
                assert_eq!(work, "exit 1");
                assert_eq!(status.code(), Some(1));
            }
            other => panic!("expected ExecutionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let monitor = ProcessMonitor::probe(StrategyChoice::Auto, DEFAULT_POLL_INTERVAL).unwrap();
        let work = Work::command("/nonexistent/benchmon-no-such-binary", Vec::<String>::new());
        assert!(matches!(monitor.run(&work), Err(MonitorError::Spawn(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_polling_tracks_running_child() {
        let monitor =
            ProcessMonitor::probe(StrategyChoice::Poll, Duration::from_millis(5)).unwrap();
        assert_eq!(monitor.strategy_name(), "poll");
        let result = monitor.run(&sh("sleep 0.2")).unwrap();
        assert!(result.duration >= Duration::from_millis(150));
        assert!(matches!(result.peak_memory, PeakMemory::Bytes(b) if b > 0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_polling_failure_path() {
        let monitor = ProcessMonitor::probe(StrategyChoice::Poll, DEFAULT_POLL_INTERVAL).unwrap();
        assert!(matches!(
            monitor.run(&sh("exit 3")),
            Err(MonitorError::ExecutionFailed { .. })
        ));
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::NotStarted.to_string(), "not-started");
        assert_eq!(RunState::Failed.to_string(), "failed");
    }
}

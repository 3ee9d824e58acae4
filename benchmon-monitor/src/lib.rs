#![warn(missing_docs)]
//! benchmon Monitor
//!
//! Runs benchmark work in isolated child processes and measures:
//! - Wall-clock duration, bracketing spawn to confirmed exit
//! - Peak resident memory, via `wait4` rusage or `/proc` polling
//!
//! Also hosts the address-space guard applied to the driver at suite start.

pub mod limits;
mod monitor;
mod result;
mod strategy;
mod work;

pub use monitor::{ProcessMonitor, RunState};
pub use result::{MaxRssUnit, Observation, PeakMemory, ProcessResult, normalize_max_rss};
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub use strategy::WaitForExit;
pub use strategy::{
    DEFAULT_POLL_INTERVAL, Polling, ProcessMetricsStrategy, StrategyChoice, WAIT4_AVAILABLE,
    parse_vm_rss, probe_strategy,
};
pub use work::{Work, dedent};

use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised while running monitored work
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The child could not be started
    #[error("Failed to spawn process: {0}")]
    Spawn(std::io::Error),

    /// Waiting on the child failed
    #[error("Failed to wait for process: {0}")]
    Wait(std::io::Error),

    /// The child exited unsuccessfully
    #[error("Running failed ({status}):\n{work}")]
    ExecutionFailed {
        /// Program text that was run
        work: String,
        /// Exit status of the child
        status: ExitStatus,
    },

    /// The strategy cannot run on this platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The work description cannot be executed
    #[error("Invalid work: {0}")]
    InvalidWork(String),
}

//! Measurement Strategies
//!
//! Two ways to measure a child process:
//! - `WaitForExit`: block in `wait4(2)` and read `ru_maxrss` from the exit record
//! - `Polling`: sample `VmRSS` from `/proc/<pid>/status` until the child exits
//!
//! `probe_strategy` picks one once at startup.

use crate::MonitorError;
use crate::result::{Observation, PeakMemory};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default sampling interval for the polling strategy
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Whether this build can use the wait-for-exit strategy
pub const WAIT4_AVAILABLE: bool = cfg!(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
));

/// A way of running a command while measuring duration and peak memory
pub trait ProcessMetricsStrategy: Send + Sync + std::fmt::Debug {
    /// Short name for logs and reports
    fn name(&self) -> &'static str;

    /// Spawn `command`, wait for it to exit, and report what was observed
    fn measure(&self, command: Command) -> Result<Observation, MonitorError>;
}

/// Strategy requested by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyChoice {
    /// Prefer wait4, fall back to polling
    #[default]
    Auto,
    /// Require the wait-for-exit strategy
    Wait4,
    /// Require the polling strategy
    Poll,
}

impl std::str::FromStr for StrategyChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(StrategyChoice::Auto),
            "wait4" | "wait" => Ok(StrategyChoice::Wait4),
            "poll" | "polling" => Ok(StrategyChoice::Poll),
            other => Err(format!("Unknown measurement strategy: {}", other)),
        }
    }
}

/// Pick a strategy by capability. Runs once; failures surface before any work is spawned.
pub fn probe_strategy(
    choice: StrategyChoice,
    poll_interval: Duration,
) -> Result<Box<dyn ProcessMetricsStrategy>, MonitorError> {
    let polling_ok = Polling::is_supported();
    debug!(
        ?choice,
        wait4 = WAIT4_AVAILABLE,
        polling = polling_ok,
        "probing measurement strategies"
    );

    match choice {
        StrategyChoice::Auto if WAIT4_AVAILABLE => wait_for_exit(),
        StrategyChoice::Auto if polling_ok => Ok(Box::new(Polling::new(poll_interval))),
        StrategyChoice::Auto => Err(MonitorError::UnsupportedPlatform(format!(
            "no measurement strategy available on {}",
            std::env::consts::OS
        ))),
        StrategyChoice::Wait4 => wait_for_exit(),
        StrategyChoice::Poll if polling_ok => Ok(Box::new(Polling::new(poll_interval))),
        StrategyChoice::Poll => Err(MonitorError::UnsupportedPlatform(format!(
            "/proc/<pid>/status is not available on {}",
            std::env::consts::OS
        ))),
    }
}

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
fn wait_for_exit() -> Result<Box<dyn ProcessMetricsStrategy>, MonitorError> {
    Ok(Box::new(wait4::WaitForExit))
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn wait_for_exit() -> Result<Box<dyn ProcessMetricsStrategy>, MonitorError> {
    Err(MonitorError::UnsupportedPlatform(format!(
        "wait4 is not available on {}",
        std::env::consts::OS
    )))
}

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
pub use wait4::WaitForExit;

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
mod wait4 {
    use super::*;
    use crate::result::{MaxRssUnit, normalize_max_rss};
    use std::os::unix::process::ExitStatusExt;
    use std::process::{Child, ExitStatus};
    use tracing::warn;

    /// Blocks in `wait4(2)` and reads peak RSS from the child's rusage
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WaitForExit;

    impl ProcessMetricsStrategy for WaitForExit {
        fn name(&self) -> &'static str {
            "wait4"
        }

        fn measure(&self, mut command: Command) -> Result<Observation, MonitorError> {
            let start = Instant::now();
            let mut child = command.spawn().map_err(MonitorError::Spawn)?;
            let pid = child.id() as libc::pid_t;

            let mut raw_status: libc::c_int = 0;
            // SAFETY: rusage is plain old data; all-zero is a valid value.
            let mut usage: libc::rusage = unsafe { std::mem::zeroed() };

            loop {
                // SAFETY: pid belongs to our unreaped child; both out-pointers are valid.
                let ret = unsafe { libc::wait4(pid, &mut raw_status, 0, &mut usage) };
                if ret == pid {
                    break;
                }
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::Interrupted {
                    abandon(&mut child, &err);
                    return Err(MonitorError::Wait(err));
                }
            }
            let duration = start.elapsed();

            // Already reaped by wait4; dropping the handle does not wait again.
            drop(child);

            let max_rss = normalize_max_rss(usage.ru_maxrss as i64, MaxRssUnit::NATIVE);
            Ok(Observation {
                status: ExitStatus::from_raw(raw_status),
                duration,
                peak_memory: PeakMemory::Bytes(max_rss),
            })
        }
    }

    /// Kill and reap a child after `wait4` failed, so it is neither left
    /// running nor left as a zombie. ECHILD means it is no longer ours.
    pub(super) fn abandon(child: &mut Child, cause: &std::io::Error) {
        if cause.raw_os_error() == Some(libc::ECHILD) {
            return;
        }
        if let Err(e) = child.kill() {
            debug!("Failed to kill child {}: {}", child.id(), e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to reap child {}: {}", child.id(), e);
        }
    }
}

static VM_RSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)VmRSS:\s*(\d+)\s*kB").expect("VmRSS pattern is a valid regex")
});

/// Extract the resident set size in bytes from a `/proc/<pid>/status` body
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    VM_RSS
        .captures(status)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|kb| kb.saturating_mul(1024))
}

/// Samples `VmRSS` at a fixed interval while the child is alive.
///
/// Peak figures are rough estimates: a spike between two samples is missed.
/// When no sample could be read the peak is `PeakMemory::Unknown`.
#[derive(Debug, Clone)]
pub struct Polling {
    interval: Duration,
    proc_root: PathBuf,
}

impl Polling {
    /// Create a polling strategy with the given sampling interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Read `<root>/<pid>/status` instead of `/proc/<pid>/status`
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// Sampling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the per-process status file exists on this system
    pub fn is_supported() -> bool {
        Path::new("/proc/self/status").is_file()
    }
}

impl Default for Polling {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ProcessMetricsStrategy for Polling {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn measure(&self, mut command: Command) -> Result<Observation, MonitorError> {
        let start = Instant::now();
        let mut child = command.spawn().map_err(MonitorError::Spawn)?;
        let status_path = self
            .proc_root
            .join(child.id().to_string())
            .join("status");

        let mut peak: Option<u64> = None;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(MonitorError::Wait)? {
                break status;
            }

            // The child may exit between try_wait and the read
            if let Ok(body) = std::fs::read_to_string(&status_path) {
                if let Some(rss) = parse_vm_rss(&body) {
                    peak = Some(peak.map_or(rss, |p| p.max(rss)));
                }
            }

            std::thread::sleep(self.interval);
        };
        let duration = start.elapsed();

        Ok(Observation {
            status,
            duration,
            peak_memory: peak.map_or(PeakMemory::Unknown, PeakMemory::Bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tpython3\nVmPeak:\t  30000 kB\nVmRSS:\t   12345 kB\nThreads:\t1\n";

    #[test]
    fn test_parse_vm_rss() {
        assert_eq!(parse_vm_rss(STATUS), Some(12345 * 1024));
    }

    #[test]
    fn test_parse_vm_rss_case_insensitive() {
        assert_eq!(parse_vm_rss("vmrss: 7 KB"), Some(7 * 1024));
    }

    #[test]
    fn test_parse_vm_rss_missing() {
        assert_eq!(parse_vm_rss("Name:\tzombie\nState:\tZ (zombie)\n"), None);
    }

    #[test]
    fn test_strategy_choice_from_str() {
        assert_eq!("auto".parse::<StrategyChoice>(), Ok(StrategyChoice::Auto));
        assert_eq!("WAIT4".parse::<StrategyChoice>(), Ok(StrategyChoice::Wait4));
        assert_eq!("polling".parse::<StrategyChoice>(), Ok(StrategyChoice::Poll));
        assert!("sometimes".parse::<StrategyChoice>().is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_auto_prefers_wait4() {
        let strategy = probe_strategy(StrategyChoice::Auto, DEFAULT_POLL_INTERVAL).unwrap();
        assert_eq!(strategy.name(), "wait4");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_forced_poll() {
        let strategy =
            probe_strategy(StrategyChoice::Poll, Duration::from_millis(1)).unwrap();
        assert_eq!(strategy.name(), "poll");
    }

    #[cfg(unix)]
    #[test]
    fn test_polling_without_status_file_reports_unknown() {
        let empty = tempfile::tempdir().unwrap();
        let polling = Polling::new(Duration::from_millis(1)).with_proc_root(empty.path());

        let mut command = Command::new("sh");
        command.args(["-c", "sleep 0.05"]);
        let observation = polling.measure(command).unwrap();

        assert!(observation.status.success());
        assert!(observation.duration >= Duration::from_millis(50));
        assert_eq!(observation.peak_memory, PeakMemory::Unknown);
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn test_failed_wait_kills_and_reaps_child() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let cause = std::io::Error::from_raw_os_error(libc::EINVAL);
        wait4::abandon(&mut child, &cause);

        // Reaped: the status is cached and no second wait happens
        let status = child.try_wait().unwrap().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_poll_unsupported_without_procfs() {
        assert!(matches!(
            probe_strategy(StrategyChoice::Poll, DEFAULT_POLL_INTERVAL),
            Err(MonitorError::UnsupportedPlatform(_))
        ));
    }
}

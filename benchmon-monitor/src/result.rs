//! Process Results
//!
//! Measurement outcome of one child process, plus the platform unit table
//! for `ru_maxrss`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

/// Peak resident memory of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakMemory {
    /// Peak RSS in bytes
    Bytes(u64),
    /// No reading was obtained before the child exited
    Unknown,
}

impl PeakMemory {
    /// Bytes, if known
    pub fn bytes(self) -> Option<u64> {
        match self {
            PeakMemory::Bytes(b) => Some(b),
            PeakMemory::Unknown => None,
        }
    }
}

impl fmt::Display for PeakMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakMemory::Bytes(b) => write!(f, "{} bytes", b),
            PeakMemory::Unknown => f.write_str("unknown"),
        }
    }
}

/// Raw measurement from a strategy, before success is judged
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    /// Exit status reported by the OS
    pub status: ExitStatus,
    /// Wall-clock time from before spawn to confirmed exit
    pub duration: Duration,
    /// Peak resident memory
    pub peak_memory: PeakMemory,
}

/// Outcome of one monitored run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Wall-clock duration including interpreter startup
    pub duration: Duration,
    /// Peak resident memory
    pub peak_memory: PeakMemory,
    /// Whether the child exited successfully
    pub succeeded: bool,
}

impl ProcessResult {
    /// Duration in fractional seconds
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Peak memory in bytes, if known
    pub fn peak_memory_bytes(&self) -> Option<u64> {
        self.peak_memory.bytes()
    }

    /// Only successful runs count as benchmark samples
    pub fn is_valid_sample(&self) -> bool {
        self.succeeded
    }
}

/// Unit in which the OS reports `ru_maxrss`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxRssUnit {
    /// Linux, Android and the BSDs
    Kilobytes,
    /// macOS and iOS
    Bytes,
}

impl MaxRssUnit {
    /// Unit used by the platform this crate was compiled for.
    ///
    /// Unknown platforms report the raw value unchanged.
    pub const NATIVE: MaxRssUnit = if cfg!(any(target_os = "macos", target_os = "ios")) {
        MaxRssUnit::Bytes
    } else if cfg!(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )) {
        MaxRssUnit::Kilobytes
    } else {
        MaxRssUnit::Bytes
    };
}

/// Convert a raw `ru_maxrss` value to bytes. Negative values clamp to zero.
pub fn normalize_max_rss(raw: i64, unit: MaxRssUnit) -> u64 {
    let raw = raw.max(0) as u64;
    match unit {
        MaxRssUnit::Kilobytes => raw.saturating_mul(1024),
        MaxRssUnit::Bytes => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_kilobytes() {
        assert_eq!(normalize_max_rss(2048, MaxRssUnit::Kilobytes), 2048 * 1024);
        assert_eq!(normalize_max_rss(0, MaxRssUnit::Kilobytes), 0);
    }

    #[test]
    fn test_normalize_bytes() {
        assert_eq!(normalize_max_rss(123_456, MaxRssUnit::Bytes), 123_456);
    }

    #[test]
    fn test_normalize_clamps() {
        assert_eq!(normalize_max_rss(-5, MaxRssUnit::Kilobytes), 0);
        assert_eq!(normalize_max_rss(i64::MAX, MaxRssUnit::Kilobytes), u64::MAX);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_native_unit_linux() {
        assert_eq!(MaxRssUnit::NATIVE, MaxRssUnit::Kilobytes);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_native_unit_macos() {
        assert_eq!(MaxRssUnit::NATIVE, MaxRssUnit::Bytes);
    }

    #[test]
    fn test_peak_memory_accessors() {
        assert_eq!(PeakMemory::Bytes(10).bytes(), Some(10));
        assert_eq!(PeakMemory::Unknown.bytes(), None);
        assert_eq!(PeakMemory::Unknown.to_string(), "unknown");
    }
}

//! System Metadata Collection
//!
//! Collects host information for report metadata.
//!
//! ## Collected Data
//!
//! - **Git**: Current commit hash and branch name
//! - **OS**: Operating system name and architecture
//! - **CPU**: Core count
//! - **Memory**: Total and available RAM (Linux only)
//! - **Run**: Strategy, sampling mode, repeat count and memory cap

use crate::run_config::BenchmarkRunConfig;
use benchmon_monitor::limits::memory_info;
use benchmon_report::{ReportMeta, RunSettings, SCHEMA_VERSION, SystemInfo};
use chrono::Utc;

/// Build report metadata including system info and git details
pub fn build_report_meta(
    config: &BenchmarkRunConfig,
    strategy: &str,
    memory_limit_bytes: Option<u64>,
) -> ReportMeta {
    let memory = memory_info();
    let system = SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_cores: num_cpus(),
        memory_total_bytes: memory.map(|m| m.total),
        memory_available_bytes: memory.map(|m| m.available),
    };

    ReportMeta {
        schema_version: SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        git_commit: git(&["rev-parse", "HEAD"]),
        git_branch: git(&["rev-parse", "--abbrev-ref", "HEAD"]),
        system,
        run: RunSettings {
            strategy: strategy.to_string(),
            exhaustive: config.exhaustive,
            seed: config.seed,
            max_combinations: config.max_combinations,
            repeat: config.repeat,
            memory_limit_bytes,
        },
    }
}

fn git(args: &[&str]) -> Option<String> {
    std::process::Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Get number of available CPU cores
fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

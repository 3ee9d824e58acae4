//! Report Data Structures

use benchmon_monitor::ProcessResult;
use benchmon_sampler::ParamValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current report schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub results: Vec<CombinationResult>,
    pub summary: ReportSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub system: SystemInfo,
    pub run: RunSettings,
}

/// Host information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu_cores: u32,
    pub memory_total_bytes: Option<u64>,
    pub memory_available_bytes: Option<u64>,
}

/// Run configuration captured in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    pub strategy: String,
    pub exhaustive: bool,
    pub seed: u64,
    pub max_combinations: Option<usize>,
    pub repeat: u32,
    pub memory_limit_bytes: Option<u64>,
}

/// What a benchmark primarily tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkKind {
    /// Wall-clock duration
    #[default]
    Time,
    /// Peak resident memory
    PeakMem,
}

/// One axis value of a combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBinding {
    pub name: String,
    pub value: ParamValue,
}

/// Outcome of one parameter combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result for one benchmark combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationResult {
    pub benchmark_id: String,
    pub group: String,
    pub kind: BenchmarkKind,
    pub params: Vec<ParamBinding>,
    pub status: RunStatus,
    pub metrics: Option<RunMetrics>,
    pub skip_reason: Option<String>,
    pub failure: Option<FailureInfo>,
}

impl CombinationResult {
    /// `id(a=1, b=x)` label used in listings
    pub fn label(&self) -> String {
        if self.params.is_empty() {
            return self.benchmark_id.clone();
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        format!("{}({})", self.benchmark_id, params.join(", "))
    }
}

/// Summary over the successful runs of one combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub samples: usize,
    pub min_seconds: f64,
    pub median_seconds: f64,
    pub mean_seconds: f64,
    pub max_seconds: f64,
    /// Largest known peak across samples
    pub peak_memory_bytes: Option<u64>,
}

impl RunMetrics {
    /// Summarize valid samples; `None` when there are none.
    pub fn from_results(results: &[ProcessResult]) -> Option<Self> {
        let valid: Vec<&ProcessResult> = results.iter().filter(|r| r.is_valid_sample()).collect();
        if valid.is_empty() {
            return None;
        }

        let mut durations: Vec<f64> = valid.iter().map(|r| r.duration_seconds()).collect();
        durations.sort_by(|a, b| a.total_cmp(b));

        let n = durations.len();
        let median = if n % 2 == 1 {
            durations[n / 2]
        } else {
            (durations[n / 2 - 1] + durations[n / 2]) / 2.0
        };

        Some(Self {
            samples: n,
            min_seconds: durations[0],
            median_seconds: median,
            mean_seconds: durations.iter().sum::<f64>() / n as f64,
            max_seconds: durations[n - 1],
            peak_memory_bytes: valid.iter().filter_map(|r| r.peak_memory_bytes()).max(),
        })
    }
}

/// Failure information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: String,
    pub message: String,
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_combinations: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_ms: f64,
}

impl ReportSummary {
    /// Count statuses over a result list
    pub fn from_results(results: &[CombinationResult], total_duration_ms: f64) -> Self {
        let count = |status: RunStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            total_combinations: results.len(),
            passed: count(RunStatus::Passed),
            failed: count(RunStatus::Failed),
            skipped: count(RunStatus::Skipped),
            total_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchmon_monitor::PeakMemory;
    use std::time::Duration;

    fn sample(ms: u64, peak: PeakMemory, succeeded: bool) -> ProcessResult {
        ProcessResult {
            duration: Duration::from_millis(ms),
            peak_memory: peak,
            succeeded,
        }
    }

    #[test]
    fn test_metrics_from_valid_samples() {
        let results = [
            sample(30, PeakMemory::Bytes(100), true),
            sample(10, PeakMemory::Unknown, true),
            sample(20, PeakMemory::Bytes(300), true),
            sample(999, PeakMemory::Bytes(10_000), false),
        ];
        let metrics = RunMetrics::from_results(&results).unwrap();
        assert_eq!(metrics.samples, 3);
        assert!((metrics.min_seconds - 0.010).abs() < 1e-9);
        assert!((metrics.median_seconds - 0.020).abs() < 1e-9);
        assert!((metrics.max_seconds - 0.030).abs() < 1e-9);
        assert_eq!(metrics.peak_memory_bytes, Some(300));
    }

    #[test]
    fn test_metrics_even_count_median() {
        let results = [
            sample(10, PeakMemory::Unknown, true),
            sample(20, PeakMemory::Unknown, true),
        ];
        let metrics = RunMetrics::from_results(&results).unwrap();
        assert!((metrics.median_seconds - 0.015).abs() < 1e-9);
        assert_eq!(metrics.peak_memory_bytes, None);
    }

    #[test]
    fn test_metrics_none_without_valid_samples() {
        assert!(RunMetrics::from_results(&[]).is_none());
        assert!(RunMetrics::from_results(&[sample(1, PeakMemory::Bytes(1), false)]).is_none());
    }

    #[test]
    fn test_label() {
        let result = CombinationResult {
            benchmark_id: "dist_fit".to_string(),
            group: "stats".to_string(),
            kind: BenchmarkKind::Time,
            params: vec![
                ParamBinding { name: "dist".to_string(), value: ParamValue::from("gamma") },
                ParamBinding { name: "n".to_string(), value: ParamValue::Int(10) },
            ],
            status: RunStatus::Passed,
            metrics: None,
            skip_reason: None,
            failure: None,
        };
        assert_eq!(result.label(), "dist_fit(dist=gamma, n=10)");
    }
}

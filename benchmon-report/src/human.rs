//! Human-Readable Output
//!
//! Results grouped by benchmark group, with status icons (✓/✗/⊘). The
//! headline metric follows the benchmark kind: duration for `time`, peak
//! memory for `peakmem`.

use crate::report::{BenchmarkKind, CombinationResult, Report, RunStatus};
use std::collections::BTreeMap;

/// Format seconds with an adaptive unit
pub fn format_duration(seconds: f64) -> String {
    if seconds >= 1.0 {
        format!("{:.3} s", seconds)
    } else if seconds >= 1e-3 {
        format!("{:.3} ms", seconds * 1e3)
    } else if seconds >= 1e-6 {
        format!("{:.3} µs", seconds * 1e6)
    } else {
        format!("{:.0} ns", seconds * 1e9)
    }
}

/// Format a byte count with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Format a report for terminal display
pub fn format_human_output(report: &Report) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("benchmon Results\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "strategy: {}  mode: {}  repeat: {}\n\n",
        report.meta.run.strategy,
        if report.meta.run.exhaustive {
            "exhaustive".to_string()
        } else {
            match report.meta.run.max_combinations {
                Some(max) => format!("sampled (seed {}, max {})", report.meta.run.seed, max),
                None => format!("sampled (seed {}, per-benchmark bounds)", report.meta.run.seed),
            }
        },
        report.meta.run.repeat
    ));

    let mut groups: BTreeMap<&str, Vec<&CombinationResult>> = BTreeMap::new();
    for result in &report.results {
        groups.entry(&result.group).or_default().push(result);
    }

    for (group, results) in groups {
        output.push_str(&format!("Group: {}\n", group));
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for result in results {
            let icon = match result.status {
                RunStatus::Passed => "✓",
                RunStatus::Failed => "✗",
                RunStatus::Skipped => "⊘",
            };
            output.push_str(&format!("  {} {}\n", icon, result.label()));

            if let Some(metrics) = &result.metrics {
                let peak = metrics
                    .peak_memory_bytes
                    .map(format_bytes)
                    .unwrap_or_else(|| "unknown".to_string());
                match result.kind {
                    BenchmarkKind::Time => {
                        output.push_str(&format!(
                            "      median: {}  min: {}  max: {}  samples: {}\n",
                            format_duration(metrics.median_seconds),
                            format_duration(metrics.min_seconds),
                            format_duration(metrics.max_seconds),
                            metrics.samples
                        ));
                        output.push_str(&format!("      peak memory: {}\n", peak));
                    }
                    BenchmarkKind::PeakMem => {
                        output.push_str(&format!(
                            "      peak memory: {}  samples: {}\n",
                            peak, metrics.samples
                        ));
                        output.push_str(&format!(
                            "      median: {}\n",
                            format_duration(metrics.median_seconds)
                        ));
                    }
                }
            }

            if let Some(reason) = &result.skip_reason {
                output.push_str(&format!("      skipped: {}\n", reason));
            }
            if let Some(failure) = &result.failure {
                let first_line = failure.message.lines().next().unwrap_or("");
                output.push_str(&format!("      error: {}\n", first_line));
            }
        }
        output.push('\n');
    }

    let summary = &report.summary;
    output.push_str("Summary\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  Combinations: {}  Passed: {}  Failed: {}  Skipped: {}\n",
        summary.total_combinations, summary.passed, summary.failed, summary.skipped
    ));
    output.push_str(&format!(
        "  Total time: {}\n",
        format_duration(summary.total_duration_ms / 1000.0)
    ));

    output
}

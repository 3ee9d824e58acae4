//! CSV Output
//!
//! One row per combination. Parameters are flattened into a single
//! `name=value;name=value` column so the header stays fixed across suites.

use crate::report::{Report, RunStatus};

const HEADER: &str = "benchmark,group,kind,params,status,samples,min_s,median_s,mean_s,max_s,peak_memory_bytes,message";

/// Generate a CSV report
pub fn generate_csv_report(report: &Report) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');

    for result in &report.results {
        let params: Vec<String> = result
            .params
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        let kind = match result.kind {
            crate::BenchmarkKind::Time => "time",
            crate::BenchmarkKind::PeakMem => "peakmem",
        };
        let status = match result.status {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        };
        let message = result
            .failure
            .as_ref()
            .map(|f| f.message.as_str())
            .or(result.skip_reason.as_deref())
            .unwrap_or("");

        let metric_cols = match &result.metrics {
            Some(m) => format!(
                "{},{:.6},{:.6},{:.6},{:.6},{}",
                m.samples,
                m.min_seconds,
                m.median_seconds,
                m.mean_seconds,
                m.max_seconds,
                m.peak_memory_bytes.map(|b| b.to_string()).unwrap_or_default()
            ),
            None => ",,,,,".to_string(),
        };

        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            escape(&result.benchmark_id),
            escape(&result.group),
            kind,
            escape(&params.join(";")),
            status,
            metric_cols,
            escape(message)
        ));
    }

    out
}

/// Quote a field when it contains a separator, quote, or newline
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");
    }
}

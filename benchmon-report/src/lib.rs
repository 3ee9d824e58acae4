#![warn(missing_docs)]
//! benchmon Report
//!
//! Report model and output formats:
//! - JSON (machine-readable, reloadable)
//! - CSV (one row per combination)
//! - Human (terminal)

mod csv;
mod human;
mod json;
mod report;

pub use csv::generate_csv_report;
pub use human::{format_bytes, format_duration, format_human_output};
pub use json::{generate_json_report, parse_json_report};
pub use report::{
    BenchmarkKind, CombinationResult, FailureInfo, ParamBinding, Report, ReportMeta,
    ReportSummary, RunMetrics, RunSettings, RunStatus, SCHEMA_VERSION, SystemInfo,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty JSON
    Json,
    /// CSV for spreadsheets
    Csv,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Render a report in the requested format
pub fn render(report: &Report, format: OutputFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Csv => generate_csv_report(report),
        OutputFormat::Human => format_human_output(report),
    })
}

//! Configuration loading from benchmon.toml
//!
//! A suite is described by a `benchmon.toml` file: runner settings, sampling
//! defaults, the optional memory guard and the `[[benchmark]]` definitions.
//! The file is discovered by walking up from the current directory.

use crate::suite::BenchmarkDef;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name searched for during discovery
pub const CONFIG_FILE_NAME: &str = "benchmon.toml";

/// benchmon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchmonConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Sampling defaults
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Address-space guard
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Optional dependency policy
    #[serde(default)]
    pub imports: ImportsConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
    /// Benchmark definitions
    #[serde(default, rename = "benchmark")]
    pub benchmarks: Vec<BenchmarkDef>,
}

/// Runner configuration for benchmark execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Command prefix; the rendered script is appended as the last argument
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,
    /// Measurement strategy: "auto", "wait4" or "poll"
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Sampling interval of the polling strategy (e.g. "10ms")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// Runs per active combination
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            strategy: default_strategy(),
            poll_interval: default_poll_interval(),
            repeat: default_repeat(),
        }
    }
}

fn default_interpreter() -> Vec<String> {
    vec!["python3".to_string(), "-c".to_string()]
}
fn default_strategy() -> String {
    "auto".to_string()
}
fn default_poll_interval() -> String {
    "10ms".to_string()
}
fn default_repeat() -> u32 {
    1
}

/// Sampling defaults applied to benchmarks without their own settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Shuffle seed
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Suite-wide bound; unset leaves unbounded benchmarks exhaustive
    #[serde(default)]
    pub max_combinations: Option<usize>,
    /// Run every combination regardless of bounds
    #[serde(default)]
    pub exhaustive: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_combinations: None,
            exhaustive: false,
        }
    }
}

fn default_seed() -> u64 {
    benchmon_sampler::DEFAULT_SEED
}

/// Address-space guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Apply the guard at suite start
    #[serde(default)]
    pub enabled: bool,
    /// Fraction of total memory used when `max_memory` is unset
    #[serde(default = "default_memory_fraction")]
    pub memory_fraction: f64,
    /// Explicit cap in bytes
    #[serde(default)]
    pub max_memory: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            memory_fraction: default_memory_fraction(),
            max_memory: None,
        }
    }
}

fn default_memory_fraction() -> f64 {
    benchmon_monitor::limits::DEFAULT_MEMORY_FRACTION
}

/// Optional dependency policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportsConfig {
    /// Skip benchmarks whose dependencies are missing instead of failing
    #[serde(default = "default_allow_errors")]
    pub allow_errors: bool,
    /// Script run through the interpreter to check a `modules` entry
    #[serde(default = "default_import_check")]
    pub check: String,
}

impl Default for ImportsConfig {
    fn default() -> Self {
        Self {
            allow_errors: default_allow_errors(),
            check: default_import_check(),
        }
    }
}

fn default_allow_errors() -> bool {
    true
}

fn default_import_check() -> String {
    crate::optional::DEFAULT_IMPORT_CHECK.to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: human, json, csv
    #[serde(default = "default_format")]
    pub format: String,
    /// Directory receiving a report file after each run
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            directory: None,
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl BenchmonConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find the nearest benchmon.toml walking up from the current directory
    pub fn discover() -> Option<PathBuf> {
        Self::discover_from(&std::env::current_dir().ok()?)
    }

    /// Find the nearest benchmon.toml walking up from `start`
    pub fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# benchmon Configuration

[runner]
# Command prefix; the rendered script is passed as the last argument
interpreter = ["python3", "-c"]
# Measurement strategy: "auto", "wait4" or "poll"
strategy = "auto"
# Sampling interval for the poll strategy
poll_interval = "10ms"
# Runs per active combination
repeat = 1

[sampling]
# Shuffle seed for bounded benchmarks
seed = 1
# Suite-wide bound on active combinations (uncomment to enable)
# max_combinations = 20
# Run every combination (also BENCHMON_XSLOW=1)
exhaustive = false

[limits]
# Cap the driver's address space at suite start
enabled = false
# Fraction of total memory used when max_memory is unset
memory_fraction = 0.7
# Explicit cap in bytes (uncomment to enable)
# max_memory = 4294967296

[imports]
# Skip benchmarks with missing optional dependencies (also BENCHMON_ALLOW_IMPORT_ERRORS)
allow_errors = true
# Run through the interpreter for each `modules` entry; non-zero exit means missing
check = "import {module}"

[output]
# Default output format: human, json, csv
format = "human"
# Write a report file here after each run (uncomment to enable)
# directory = "target/benchmon"

# [[benchmark]]
# id = "sort"
# group = "example"
# kind = "time"
# max_combinations = 2
# modules = ["random"]
# script = """
#     import random
#     data = [random.random() for _ in range({n})]
#     sorted(data)
# """
# [[benchmark.axis]]
# name = "n"
# values = [1000, 10000, 100000]
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration number: {}", num_part));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BenchmonConfig::default();
        assert_eq!(config.runner.interpreter, vec!["python3", "-c"]);
        assert_eq!(config.runner.poll_interval, "10ms");
        assert_eq!(config.runner.repeat, 1);
        assert_eq!(config.sampling.seed, 1);
        assert_eq!(config.sampling.max_combinations, None);
        assert!(!config.limits.enabled);
        assert!(config.imports.allow_errors);
        assert!(config.benchmarks.is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(BenchmonConfig::parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(BenchmonConfig::parse_duration("10ms").unwrap(), 10_000_000);
        assert_eq!(BenchmonConfig::parse_duration("100us").unwrap(), 100_000);
        assert_eq!(BenchmonConfig::parse_duration("1000ns").unwrap(), 1000);
        assert_eq!(BenchmonConfig::parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(BenchmonConfig::parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert!(BenchmonConfig::parse_duration("").is_err());
        assert!(BenchmonConfig::parse_duration("fast").is_err());
        assert!(BenchmonConfig::parse_duration("3h").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            interpreter = ["sh", "-c"]
            strategy = "poll"

            [sampling]
            max_combinations = 5

            [[benchmark]]
            id = "kendall"
            script = "echo {method}"
            modules = ["scipy.stats"]

            [[benchmark.axis]]
            name = "method"
            values = ["exact", "asymptotic"]
        "#;

        let config: BenchmonConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.interpreter, vec!["sh", "-c"]);
        assert_eq!(config.runner.strategy, "poll");
        assert_eq!(config.sampling.max_combinations, Some(5));
        // Defaults should still apply
        assert_eq!(config.runner.poll_interval, "10ms");
        assert_eq!(config.output.format, "human");

        assert_eq!(config.benchmarks.len(), 1);
        let bench = &config.benchmarks[0];
        assert_eq!(bench.group, "default");
        assert_eq!(bench.axes[0].values.len(), 2);
        assert_eq!(bench.modules, vec!["scipy.stats"]);
        assert!(bench.requires.is_empty());
    }

    #[test]
    fn test_default_toml_parses() {
        let config: BenchmonConfig = toml::from_str(&BenchmonConfig::default_toml()).unwrap();
        assert_eq!(config.runner.strategy, "auto");
        assert!((config.limits.memory_fraction - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.imports.check, "import {module}");
    }

    #[test]
    fn test_discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILE_NAME), "[runner]\nrepeat = 3\n").unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = BenchmonConfig::discover_from(&nested).unwrap();
        assert_eq!(found, root.path().join(CONFIG_FILE_NAME));
        let config = BenchmonConfig::load(&found).unwrap();
        assert_eq!(config.runner.repeat, 3);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[runner\n").unwrap();
        assert!(BenchmonConfig::load(&path).is_err());
    }
}

//! Benchmark Suite
//!
//! `[[benchmark]]` entries of benchmon.toml. Each definition owns a script
//! template with `{axis}` placeholders and the axes of its parameter grid.

use benchmon_report::{BenchmarkKind, ParamBinding};
use benchmon_sampler::{ParamValue, ParameterAxis, ParameterSpace, SamplerError};
use fxhash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suite validation errors
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Benchmark with empty id")]
    EmptyId,

    #[error("Duplicate benchmark id: {0}")]
    DuplicateId(String),

    #[error("Benchmark {0} has an empty script")]
    EmptyScript(String),

    #[error("Benchmark {id}: {source}")]
    Space {
        id: String,
        #[source]
        source: SamplerError,
    },
}

/// A single benchmark definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkDef {
    /// Unique identifier
    pub id: String,
    /// Group name for reporting
    #[serde(default = "default_group")]
    pub group: String,
    /// Headline metric
    #[serde(default)]
    pub kind: BenchmarkKind,
    /// Script template; `{name}` is replaced by the value of axis `name`
    pub script: String,
    /// Parameter axes in declaration order
    #[serde(default, rename = "axis")]
    pub axes: Vec<ParameterAxis>,
    /// Seed override
    #[serde(default)]
    pub seed: Option<u64>,
    /// Bound on active combinations; opts the benchmark into sampling
    #[serde(default)]
    pub max_combinations: Option<usize>,
    /// Only run in exhaustive mode
    #[serde(default)]
    pub xslow_only: bool,
    /// Executables that must be on `PATH` for the benchmark to run
    #[serde(default)]
    pub requires: Vec<String>,
    /// Interpreter modules the script imports, e.g. `scipy.stats`
    #[serde(default)]
    pub modules: Vec<String>,
    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_group() -> String {
    "default".to_string()
}

impl BenchmarkDef {
    /// Minimal definition with no axes, mostly for tests and demos
    pub fn new(id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: default_group(),
            kind: BenchmarkKind::default(),
            script: script.into(),
            axes: Vec::new(),
            seed: None,
            max_combinations: None,
            xslow_only: false,
            requires: Vec::new(),
            modules: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Build the parameter grid
    pub fn parameter_space(&self) -> Result<ParameterSpace, SuiteError> {
        ParameterSpace::new(self.axes.clone()).map_err(|source| SuiteError::Space {
            id: self.id.clone(),
            source,
        })
    }

    /// Substitute one value per axis into the script template.
    ///
    /// A single left-to-right pass: inserted values are never rescanned.
    /// String values are inserted verbatim; quoting belongs in the template.
    pub fn render_script(&self, params: &[ParamValue]) -> String {
        let values: Vec<(&str, String)> = self
            .axes
            .iter()
            .zip(params)
            .map(|(axis, value)| (axis.name.as_str(), value.to_string()))
            .collect();

        let mut script = String::with_capacity(self.script.len());
        let mut rest = self.script.as_str();
        while let Some(open) = rest.find('{') {
            script.push_str(&rest[..open]);
            let tail = &rest[open + 1..];
            let hit = tail.find('}').and_then(|close| {
                let name = &tail[..close];
                values
                    .iter()
                    .find(|(axis, _)| *axis == name)
                    .map(|(_, value)| (close, value))
            });
            match hit {
                Some((close, value)) => {
                    script.push_str(value);
                    rest = &tail[close + 1..];
                }
                None => {
                    script.push('{');
                    rest = tail;
                }
            }
        }
        script.push_str(rest);
        script
    }

    /// Pair axis names with a combination's values
    pub fn bindings(&self, params: &[ParamValue]) -> Vec<ParamBinding> {
        self.axes
            .iter()
            .zip(params)
            .map(|(axis, value)| ParamBinding {
                name: axis.name.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// `id(a=1, b=x)` label
    pub fn label(&self, params: &[ParamValue]) -> String {
        if params.is_empty() {
            return self.id.clone();
        }
        let parts: Vec<String> = self
            .bindings(params)
            .iter()
            .map(|b| format!("{}={}", b.name, b.value))
            .collect();
        format!("{}({})", self.id, parts.join(", "))
    }
}

/// Check ids, scripts and parameter grids before anything runs
pub fn validate_suite(benchmarks: &[BenchmarkDef]) -> Result<(), SuiteError> {
    let mut seen = FxHashSet::default();
    for bench in benchmarks {
        if bench.id.trim().is_empty() {
            return Err(SuiteError::EmptyId);
        }
        if !seen.insert(bench.id.as_str()) {
            return Err(SuiteError::DuplicateId(bench.id.clone()));
        }
        if bench.script.trim().is_empty() {
            return Err(SuiteError::EmptyScript(bench.id.clone()));
        }
        bench.parameter_space()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist_bench() -> BenchmarkDef {
        let mut bench = BenchmarkDef::new(
            "dist_fit",
            "from scipy import stats\nstats.{dist}.fit(data[:{n}])",
        );
        bench.axes = vec![
            ParameterAxis::new("dist", ["norm", "gamma"]),
            ParameterAxis::new("n", [10_i64, 100]),
        ];
        bench
    }

    #[test]
    fn test_render_script() {
        let bench = dist_bench();
        let params = vec![ParamValue::from("gamma"), ParamValue::Int(100)];
        assert_eq!(
            bench.render_script(&params),
            "from scipy import stats\nstats.gamma.fit(data[:100])"
        );
    }

    #[test]
    fn test_render_leaves_other_braces() {
        let mut bench = BenchmarkDef::new("fmt", "print({'k': {n}})");
        bench.axes = vec![ParameterAxis::new("n", [3_i64])];
        assert_eq!(bench.render_script(&[ParamValue::Int(3)]), "print({'k': 3})");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let mut bench = BenchmarkDef::new("nested", "echo {a} {b}");
        bench.axes = vec![
            ParameterAxis::new("a", ["{b}"]),
            ParameterAxis::new("b", ["X"]),
        ];
        let params = [ParamValue::from("{b}"), ParamValue::from("X")];
        assert_eq!(bench.render_script(&params), "echo {b} X");

        let mut bench = BenchmarkDef::new("edges", "{{n}} {n}} {missing} {n");
        bench.axes = vec![ParameterAxis::new("n", [7_i64])];
        assert_eq!(
            bench.render_script(&[ParamValue::Int(7)]),
            "{7} 7} {missing} {n"
        );
    }

    #[test]
    fn test_label_and_bindings() {
        let bench = dist_bench();
        let params = vec![ParamValue::from("norm"), ParamValue::Int(10)];
        assert_eq!(bench.label(&params), "dist_fit(dist=norm, n=10)");
        assert_eq!(bench.bindings(&params)[1].name, "n");
        assert_eq!(BenchmarkDef::new("plain", "pass").label(&[]), "plain");
    }

    #[test]
    fn test_validate_suite() {
        assert!(validate_suite(&[dist_bench()]).is_ok());

        let dup = validate_suite(&[dist_bench(), dist_bench()]);
        assert!(matches!(dup, Err(SuiteError::DuplicateId(id)) if id == "dist_fit"));

        let empty = validate_suite(&[BenchmarkDef::new("blank", "   ")]);
        assert!(matches!(empty, Err(SuiteError::EmptyScript(_))));

        let mut bad = dist_bench();
        bad.axes.push(ParameterAxis::new("n", [1_i64]));
        assert!(matches!(
            validate_suite(&[bad]),
            Err(SuiteError::Space { source: SamplerError::DuplicateAxis(_), .. })
        ));
    }
}

//! Units of Work
//!
//! A `Work` is a self-contained program invocation. Script bodies are
//! dedented before they are handed to the interpreter so that suites can
//! indent them freely.

use crate::MonitorError;
use std::process::{Command, Stdio};

/// A program to run in a fresh child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    program: String,
    args: Vec<String>,
    source: String,
}

impl Work {
    /// Run `body` through an interpreter command line such as `["python3", "-c"]`.
    ///
    /// The dedented body is appended as the final argument.
    pub fn script<S: AsRef<str>>(interpreter: &[S], body: &str) -> Result<Self, MonitorError> {
        let (program, leading) = interpreter
            .split_first()
            .ok_or_else(|| MonitorError::InvalidWork("empty interpreter command".to_string()))?;

        let source = dedent(body);
        let mut args: Vec<String> = leading.iter().map(|a| a.as_ref().to_string()).collect();
        args.push(source.clone());

        Ok(Self {
            program: program.as_ref().to_string(),
            args,
            source,
        })
    }

    /// Run a program with explicit arguments
    pub fn command(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let program = program.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let source = std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            program,
            args,
            source,
        }
    }

    /// Program name or path
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Human-readable description of the work, attached to failures
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Build the child command: no stdin, stdout discarded, stderr inherited.
    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        command
    }
}

/// Remove the whitespace prefix shared by every non-blank line.
///
/// Whitespace-only lines are emptied and do not take part in the prefix.
pub fn dedent(text: &str) -> String {
    let prefix = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(|common, indent| {
            let shared = common
                .char_indices()
                .zip(indent.chars())
                .find(|((_, a), b)| a != b)
                .map(|((i, _), _)| i)
                .unwrap_or_else(|| common.len().min(indent.len()));
            &common[..shared]
        })
        .unwrap_or("");

    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.trim().is_empty() {
            continue;
        }
        out.push_str(line.strip_prefix(prefix).unwrap_or(line));
    }
    out
}

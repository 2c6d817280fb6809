//! Output comparison
//!
//! Stdout is compared after normalization; output files are compared
//! byte-for-byte; function results are compared structurally.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::runner::RunOutcome;
use crate::workspace::truncate_for_display;

/// What one run (reference or candidate) left behind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// The run ended in a runtime error or timeout
    pub failed: bool,
    /// Declared output files, `None` when the run did not create one
    pub output_files: BTreeMap<String, Option<Vec<u8>>>,
}

impl ExecutionResult {
    /// Capture of a finished run. When the run failed, `stderr` holds the
    /// failure description instead of the raw stream.
    pub fn from_run(outcome: &RunOutcome, output_files: BTreeMap<String, Option<Vec<u8>>>) -> Self {
        let failure = outcome.failure_message();
        Self {
            stdout: outcome.stdout.clone(),
            failed: failure.is_some(),
            stderr: failure.unwrap_or_else(|| outcome.stderr.clone()),
            timed_out: outcome.timed_out(),
            output_files,
        }
    }

    /// Screen output as reported: stdout, then the failure text of a failed
    /// run. Each part is cut to `limit` characters on its own.
    pub fn screen_output(&self, limit: usize) -> String {
        let stdout = truncate_for_display(&self.stdout, limit);
        if !self.failed {
            stdout
        } else if self.stdout.trim().is_empty() {
            truncate_for_display(&self.stderr, limit)
        } else {
            format!("{}\n{}", stdout.trim_end(), truncate_for_display(&self.stderr, limit))
        }
    }
}

/// Binary comparison outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub stdout_matches: bool,
    pub files_match: bool,
    pub fraction: f64,
}

impl Verdict {
    pub fn new(stdout_matches: bool, files_match: bool) -> Self {
        let fraction = if stdout_matches && files_match { 1.0 } else { 0.0 };
        Self {
            stdout_matches,
            files_match,
            fraction,
        }
    }

    /// Zero-score verdict for evaluations that never reached comparison
    pub fn failed() -> Self {
        Self::new(false, false)
    }

    pub fn passed(&self) -> bool {
        self.fraction == 1.0
    }
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("static regex"))
}

/// Normalize program output for comparison.
///
/// Unifies line endings, strips trailing whitespace per line, drops leading
/// and trailing blank lines, and collapses runs of spaces/tabs.
pub fn normalize_stdout(s: &str) -> String {
    let unified = s.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = unified.split('\n').map(str::trim_end).collect();

    let first = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    lines.drain(..first);
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines
        .iter()
        .map(|l| whitespace_run().replace_all(l, " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare two stdout texts after normalization
pub fn stdout_matches(reference: &str, candidate: &str) -> bool {
    normalize_stdout(reference) == normalize_stdout(candidate)
}

/// Compare the declared output files byte-for-byte. A missing file compares
/// as empty content.
pub fn files_match(
    reference: &BTreeMap<String, Option<Vec<u8>>>,
    candidate: &BTreeMap<String, Option<Vec<u8>>>,
    names: &[String],
) -> bool {
    let content = |files: &BTreeMap<String, Option<Vec<u8>>>, name: &String| -> Vec<u8> {
        files.get(name).cloned().flatten().unwrap_or_default()
    };
    names
        .iter()
        .all(|name| content(reference, name) == content(candidate, name))
}

/// Program-mode verdict. A failed candidate run never passes.
pub fn compare_program(
    reference: &ExecutionResult,
    candidate: &ExecutionResult,
    output_files: &[String],
) -> Verdict {
    let stdout_ok = !candidate.failed && stdout_matches(&reference.stdout, &candidate.stdout);
    let files_ok = !candidate.failed
        && files_match(&reference.output_files, &candidate.output_files, output_files);
    Verdict::new(stdout_ok, files_ok)
}

/// Function-mode verdict: deep equality of the returned values
pub fn compare_values(reference: &Value, candidate: &Value) -> Verdict {
    Verdict::new(values_equal(reference, candidate), true)
}

/// Structural equality where numbers compare by value: integers exactly at
/// any size, and an integral float equals the integer it represents.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => canonical_number(x) == canonical_number(y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

fn canonical_number(n: &Number) -> String {
    let text = n.to_string();
    if !text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        return if text == "-0" { "0".to_string() } else { text };
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.0}", f),
        Some(f) => format!("{:?}", f),
        None => text,
    }
}

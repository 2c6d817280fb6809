//! Feedback report
//!
//! Renders the candidate-vs-reference HTML fragment and the two-key result
//! record consumed by the grading system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::comparator::Verdict;
use crate::exercise::ExerciseKind;

pub const CANDIDATE_TITLE: &str = "ALUMNO";
pub const REFERENCE_TITLE: &str = "PATRÓN";

/// The only artifact handed back to the grading system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub fraction: f64,
    pub prologuehtml: String,
}

/// Everything one report column shows
#[derive(Debug, Clone, Default)]
pub struct RunView {
    /// Test driver excerpt
    pub test_code: String,
    pub stdin: String,
    /// Input file name -> display text (program mode)
    pub initial_files: BTreeMap<String, String>,
    /// Stdout (program mode) or returned value / error (function mode)
    pub screen_output: String,
    /// Output file name -> display text (program mode)
    pub final_files: BTreeMap<String, String>,
    /// Arguments used (function mode)
    pub arguments: Vec<Value>,
}

/// Build the two-column report for a completed comparison
pub fn build(
    mode: ExerciseKind,
    verdict: &Verdict,
    reference: &RunView,
    candidate: &RunView,
) -> EvaluationResult {
    let mut html = String::from("<div class=\"judge-report\">\n");
    html.push_str(&verdict_line(mode, verdict));
    html.push_str("<table class=\"judge-compare\">\n<tr>");
    html.push_str(&format!(
        "<th>{}</th><th>{}</th></tr>\n<tr>",
        html_escape(CANDIDATE_TITLE),
        html_escape(REFERENCE_TITLE)
    ));
    for view in [candidate, reference] {
        html.push_str("<td style=\"vertical-align:top\">\n");
        html.push_str(&column(mode, view));
        html.push_str("\n</td>");
    }
    html.push_str("</tr>\n</table>\n</div>");

    EvaluationResult {
        fraction: verdict.fraction,
        prologuehtml: html,
    }
}

/// Zero-score report for an evaluation that stopped before comparison
pub fn error_report(heading: &str, title: &str, details: &str) -> EvaluationResult {
    let html = format!(
        "<div class=\"judge-report\">\n<p class=\"judge-verdict judge-fail\">{}</p>\n{}</div>",
        html_escape(heading),
        block(title, details)
    );
    EvaluationResult {
        fraction: 0.0,
        prologuehtml: html,
    }
}

fn verdict_line(mode: ExerciseKind, verdict: &Verdict) -> String {
    let (class, text) = if verdict.passed() {
        ("judge-ok", "Correcto".to_string())
    } else {
        let mut reasons = Vec::new();
        if !verdict.stdout_matches {
            reasons.push(match mode {
                ExerciseKind::Program => "la salida por pantalla no coincide",
                ExerciseKind::Function => "el valor devuelto no coincide",
            });
        }
        if !verdict.files_match {
            reasons.push("los ficheros finales no coinciden");
        }
        ("judge-fail", format!("Incorrecto: {}", reasons.join("; ")))
    };
    format!(
        "<p class=\"judge-verdict {}\">{}</p>\n",
        class,
        html_escape(&text)
    )
}

fn column(mode: ExerciseKind, view: &RunView) -> String {
    let mut parts = vec!["<h4>Contexto del test</h4>".to_string()];

    if !view.test_code.trim().is_empty() {
        parts.push(block("Test a ejecutar", &strip_print(&view.test_code)));
    }

    match mode {
        ExerciseKind::Program => {
            if !view.stdin.trim().is_empty() {
                parts.push(block("Entrada por teclado", &view.stdin));
            }
            for (name, content) in &view.initial_files {
                parts.push(block(&format!("Fichero inicial: {}", name), content));
            }
        }
        ExerciseKind::Function => {
            parts.push(block("Argumentos", &render_arguments(&view.arguments)));
        }
    }

    parts.push("<h4>Resultado de la ejecución</h4>".to_string());

    match mode {
        ExerciseKind::Program => {
            if !view.screen_output.trim().is_empty() {
                parts.push(block("Salida por pantalla", &view.screen_output));
            }
            for (name, content) in &view.final_files {
                parts.push(block(&format!("Fichero final: {}", name), content));
            }
        }
        ExerciseKind::Function => {
            parts.push(block("Valor devuelto", &view.screen_output));
        }
    }

    parts.join("\n")
}

/// Render an argument list the way a call site would read
pub fn render_arguments(args: &[Value]) -> String {
    args.iter().map(render_value).collect::<Vec<_>>().join(", ")
}

/// Textual representation of a returned value
pub fn render_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// A bare `print(...)` test is shown without the wrapper
fn strip_print(test_code: &str) -> String {
    let s = test_code.trim();
    match s.strip_prefix("print(").and_then(|rest| rest.strip_suffix(')')) {
        Some(inner) => inner.trim().to_string(),
        None => s.to_string(),
    }
}

fn block(title: &str, content: &str) -> String {
    format!(
        "<strong>{}</strong>\n<pre>{}</pre>\n",
        html_escape(title),
        html_escape(content.trim_end())
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

//! Typed errors for the evaluation pipeline
//!
//! Process plumbing uses `anyhow`; these are the domain failures that the
//! pipeline turns into report text instead of propagating.

use thiserror::Error;

/// Failure to obtain a return value from a function-mode invocation
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The requested function is not defined by the source
    #[error("la función '{0}' no está definida")]
    MissingFunction(String),
    /// The function raised an error while running
    #[error("{0}")]
    Raised(String),
    /// The invocation exceeded the wall-clock budget
    #[error("Timeout expired ({0} ms)")]
    TimedOut(u32),
    /// The invocation finished but produced no readable return value
    #[error("valor devuelto no válido: {0}")]
    InvalidReturn(String),
    /// The runner itself failed
    #[error(transparent)]
    Runner(#[from] anyhow::Error),
}

/// Exercise parameters could not be parsed
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("parameters are not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("parameters must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

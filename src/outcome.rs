use serde::{Deserialize, Serialize};
use std::fmt;

/// How an evaluation ended, for logs and worker bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    WrongAnswer,
    /// Candidate crashed; scored like a wrong answer
    RuntimeError,
    /// Candidate ran out of time; scored like a wrong answer
    TimeLimitExceeded,
    RestrictionViolation,
    /// The reference could not run with the generated inputs
    ReferenceError,
    SystemError,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Accepted => "accepted",
            Outcome::WrongAnswer => "wrong_answer",
            Outcome::RuntimeError => "runtime_error",
            Outcome::TimeLimitExceeded => "time_limit_exceeded",
            Outcome::RestrictionViolation => "restriction_violation",
            Outcome::ReferenceError => "reference_error",
            Outcome::SystemError => "system_error",
        };
        write!(f, "{}", s)
    }
}

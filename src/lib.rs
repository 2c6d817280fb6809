//! Evaluation harness for programming exercises.
//!
//! Runs a candidate submission and a reference solution on identical,
//! per-submission reproducible inputs, compares what they produce and
//! renders a side-by-side feedback report.

pub mod comparator;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod exercise;
pub mod fingerprint;
pub mod generator;
pub mod invoker;
pub mod outcome;
pub mod report;
pub mod restrictions;
pub mod runner;
pub mod runtimes;
pub mod shuffle;
pub mod worker;
pub mod workspace;

pub use evaluator::{EvaluationRequest, Evaluator};
pub use report::EvaluationResult;

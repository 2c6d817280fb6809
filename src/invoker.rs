//! Function-mode invocation
//!
//! Calls a named function defined by a source text with a JSON argument list
//! and returns its JSON result. `DriverInvoker` goes through a `Runner` with the
//! runtime's function driver; `NativeFunctions` calls registered Rust closures
//! directly.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::InvocationError;
use crate::runner::{RunLimits, RunStatus, Runner};
use crate::runtimes::RuntimeConfig;

/// Line prefix the function driver prints before the JSON return value
pub const RESULT_SENTINEL: &str = "__JUDGE_RESULT__";

/// Driver exit code meaning "function not defined"
pub const MISSING_FUNCTION_EXIT: i32 = 3;

/// Calls a named function with an argument list
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(
        &self,
        source: &str,
        function: &str,
        args: &[Value],
        work_dir: &Path,
    ) -> Result<Value, InvocationError>;
}

/// Invoker that runs the runtime's function driver through a runner
pub struct DriverInvoker {
    runner: Arc<dyn Runner>,
    runtime: RuntimeConfig,
    limits: RunLimits,
}

impl DriverInvoker {
    pub fn new(runner: Arc<dyn Runner>, runtime: RuntimeConfig, limits: RunLimits) -> Self {
        Self {
            runner,
            runtime,
            limits,
        }
    }
}

#[async_trait]
impl FunctionInvoker for DriverInvoker {
    async fn invoke(
        &self,
        source: &str,
        function: &str,
        args: &[Value],
        work_dir: &Path,
    ) -> Result<Value, InvocationError> {
        let program = self.runtime.function_program(source, function).ok_or_else(|| {
            InvocationError::Raised("el entorno de ejecución no admite ejercicios de función".into())
        })?;
        let stdin = serde_json::to_string(args)
            .map_err(|e| InvocationError::InvalidReturn(e.to_string()))?;

        let outcome = self.runner.run(&program, &stdin, work_dir, &self.limits).await?;
        debug!(
            "Function {} finished with {:?} in {} ms",
            function, outcome.status, outcome.time_ms
        );

        match outcome.status {
            RunStatus::TimeLimitExceeded => return Err(InvocationError::TimedOut(self.limits.time_ms)),
            RunStatus::Exited(MISSING_FUNCTION_EXIT) => {
                return Err(InvocationError::MissingFunction(function.to_string()))
            }
            _ => {}
        }
        if let Some(message) = outcome.failure_message() {
            return Err(InvocationError::Raised(message));
        }

        parse_result(&outcome.stdout)
    }
}

/// Extract the JSON value following the last result sentinel
fn parse_result(stdout: &str) -> Result<Value, InvocationError> {
    let line = stdout
        .lines()
        .rev()
        .find_map(|l| l.strip_prefix(RESULT_SENTINEL))
        .ok_or_else(|| InvocationError::InvalidReturn("no se obtuvo ningún valor".into()))?;
    serde_json::from_str(line).map_err(|e| InvocationError::InvalidReturn(e.to_string()))
}

/// Native function signature
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// In-process registry of functions, looked up by name
#[derive(Clone, Default)]
pub struct NativeFunctions {
    functions: HashMap<String, NativeFn>,
}

impl NativeFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }
}

#[async_trait]
impl FunctionInvoker for NativeFunctions {
    async fn invoke(
        &self,
        _source: &str,
        function: &str,
        args: &[Value],
        _work_dir: &Path,
    ) -> Result<Value, InvocationError> {
        let f = self
            .functions
            .get(function)
            .ok_or_else(|| InvocationError::MissingFunction(function.to_string()))?;
        f(args).map_err(InvocationError::Raised)
    }
}

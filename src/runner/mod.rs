//! Runner module - program execution boundary
//!
//! The evaluator only needs "run this program text with this stdin inside this
//! directory, within this wall-clock budget". `ProcessRunner` provides that by
//! spawning the runtime's interpreter; other backends implement `Runner`.
//!
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Prepare or snapshot run directories
//! - Know about exercises

pub mod process;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Bytes kept from each of stdout and stderr before a run is stopped
pub const DEFAULT_OUTPUT_LIMIT: usize = 1 << 20;

/// Resource limits for execution
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Wall-clock limit in milliseconds
    pub time_ms: u32,
    /// Captured bytes per output stream
    pub output_bytes: usize,
}

impl RunLimits {
    pub fn new(time_ms: u32) -> Self {
        Self {
            time_ms,
            output_bytes: DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn with_output_limit(mut self, output_bytes: usize) -> Self {
        self.output_bytes = output_bytes;
        self
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TIMEOUT_MS)
    }
}

/// Execution status (raw, no verdict interpretation)
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Wall-clock limit exceeded
    TimeLimitExceeded,
    /// Wrote more than the capture limit; stopped early
    OutputLimitExceeded,
    /// Killed by signal
    Signaled(i32),
    /// System/internal error
    SystemError,
}

impl RunStatus {
    /// Check if execution was successful (exited with code 0)
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Exited(0))
    }
}

/// Outcome of running a program
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Wall time used in milliseconds
    pub time_ms: u32,
    /// Stdout content (at most the output limit)
    pub stdout: String,
    /// Stderr content (at most the output limit)
    pub stderr: String,
    /// Execution status
    pub status: RunStatus,
}

impl RunOutcome {
    pub fn timed_out(&self) -> bool {
        self.status == RunStatus::TimeLimitExceeded
    }

    /// Human-readable failure description, `None` on success
    pub fn failure_message(&self) -> Option<String> {
        if self.status.is_success() {
            return None;
        }
        let detail = self.stderr.trim_end();
        let with_detail = |head: String| {
            if detail.is_empty() {
                head
            } else {
                format!("{}\n{}", head, detail)
            }
        };
        Some(match &self.status {
            RunStatus::TimeLimitExceeded => with_detail(format!("Timeout expired ({} ms)", self.time_ms)),
            RunStatus::OutputLimitExceeded => {
                with_detail("Output limit exceeded: la salida es demasiado grande".to_string())
            }
            RunStatus::Exited(code) if detail.is_empty() => {
                format!("El programa terminó con código {}", code)
            }
            RunStatus::Signaled(sig) if detail.is_empty() => {
                format!("El programa terminó por la señal {}", sig)
            }
            RunStatus::SystemError if detail.is_empty() => {
                "Error interno al ejecutar el programa".to_string()
            }
            _ => detail.to_string(),
        })
    }
}

/// Runner trait for executing program texts
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run `program` inside `work_dir`, feeding `stdin`
    async fn run(
        &self,
        program: &str,
        stdin: &str,
        work_dir: &Path,
        limits: &RunLimits,
    ) -> Result<RunOutcome>;
}

// Re-exports
pub use process::ProcessRunner;

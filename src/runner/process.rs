//! Process runner implementation
//!
//! Writes the program into the run directory and executes it with the
//! runtime's interpreter. The child gets its own process group so a timeout
//! or an output overflow kills everything it spawned.

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{RunLimits, RunOutcome, RunStatus, Runner};
use crate::runtimes::RuntimeConfig;

/// Runner that executes program texts with a configured interpreter
pub struct ProcessRunner {
    runtime: RuntimeConfig,
}

impl ProcessRunner {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self { runtime }
    }

    /// Run a program text inside `work_dir`
    pub async fn execute(
        &self,
        program: &str,
        stdin_content: &str,
        work_dir: &Path,
        limits: &RunLimits,
    ) -> Result<RunOutcome> {
        let source_path = work_dir.join(&self.runtime.source_file);
        tokio::fs::write(&source_path, program)
            .await
            .with_context(|| format!("Failed to write program to {:?}", source_path))?;

        let (program_name, args) = self
            .runtime
            .run_command
            .split_first()
            .context("No command specified for execution")?;

        debug!(
            "Running {:?} {:?} in {:?} (limit {} ms)",
            program_name, args, work_dir, limits.time_ms
        );

        let mut cmd = Command::new(program_name);
        cmd.args(args)
            .current_dir(work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program_name))?;
        let pid = child.id();

        // Feed stdin from a separate task so a program that never reads it
        // cannot block us on a full pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let input = stdin_content.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!("Program closed stdin early: {}", e);
                }
            });
        }

        let stdout = child.stdout.take().context("Stdout was not captured")?;
        let stderr = child.stderr.take().context("Stderr was not captured")?;
        let cap = limits.output_bytes;

        let finished = tokio::time::timeout(Duration::from_millis(u64::from(limits.time_ms)), async {
            let (out, err) = tokio::join!(read_capped(stdout, cap, pid), read_capped(stderr, cap, pid));
            let status = child.wait().await.context("Failed to wait for program")?;
            anyhow::Ok((out?, err?, status))
        })
        .await;
        let time_ms = started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

        let Ok(finished) = finished else {
            kill_group(pid);
            return Ok(RunOutcome {
                time_ms,
                stdout: String::new(),
                stderr: String::new(),
                status: RunStatus::TimeLimitExceeded,
            });
        };
        let (out, err, exit) = finished?;

        let status = if out.overflowed || err.overflowed {
            warn!("Output limit of {} bytes exceeded, run stopped", cap);
            RunStatus::OutputLimitExceeded
        } else {
            match (exit.code(), exit.signal()) {
                (Some(code), _) => RunStatus::Exited(code),
                (None, Some(sig)) => RunStatus::Signaled(sig),
                (None, None) => RunStatus::SystemError,
            }
        };

        Ok(RunOutcome {
            time_ms,
            stdout: String::from_utf8_lossy(&out.bytes).into_owned(),
            stderr: String::from_utf8_lossy(&err.bytes).into_owned(),
            status,
        })
    }
}

/// Bytes read from one output stream
struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

/// Read `reader` to the end, keeping at most `cap` bytes. Past the cap the
/// process group is killed, which closes the other stream too.
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    cap: usize,
    pid: Option<u32>,
) -> Result<Captured> {
    let mut bytes = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await.context("Failed to read program output")?;
        if n == 0 {
            return Ok(Captured {
                bytes,
                overflowed: false,
            });
        }
        let room = cap - bytes.len();
        if n > room {
            bytes.extend_from_slice(&chunk[..room]);
            kill_group(pid);
            return Ok(Captured {
                bytes,
                overflowed: true,
            });
        }
        bytes.extend_from_slice(&chunk[..n]);
    }
}

fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("Failed to kill process group {}: {}", pid, e);
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        stdin: &str,
        work_dir: &Path,
        limits: &RunLimits,
    ) -> Result<RunOutcome> {
        self.execute(program, stdin, work_dir, limits).await
    }
}

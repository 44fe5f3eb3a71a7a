//! The command-execution interface and its `sh -c` implementation.
//!
//! The orchestrator only ever talks to [`CommandRunner`]; everything the
//! commands themselves do (builds, uploads, supervisor calls) is outside this
//! crate.

use crate::error::format_budget;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

/// How often a waiting runner checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output is capped to this many bytes, keeping the tail.
const MAX_OUTPUT: usize = 10 * 1024;

/// How long a killed command's pipes may take to reach EOF.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Shared flag set by an operator interrupt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// CommandSpec / CommandOutcome
// ---------------------------------------------------------------------------

pub struct CommandSpec<'a> {
    pub command: &'a str,
    pub cwd: &'a Path,
    /// Added to the inherited environment.
    pub env: &'a [(String, String)],
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cancel: &'a CancelToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The process ran to completion. `code` is `None` when it died by signal
    /// or could not be spawned.
    Exited { code: Option<i32> },
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub termination: Termination,
    pub success: bool,
    pub output: String,
}

impl CommandOutcome {
    fn failed(output: String) -> Self {
        Self {
            termination: Termination::Exited { code: None },
            success: false,
            output,
        }
    }
}

pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec<'_>) -> CommandOutcome;
}

// ---------------------------------------------------------------------------
// ShellRunner
// ---------------------------------------------------------------------------

/// Runs each command through `sh -c`, capturing stdout and stderr.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec<'_>) -> CommandOutcome {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(spec.command)
            .current_dir(spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a kill reaches everything the shell started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return CommandOutcome::failed(format!("failed to spawn: {e}")),
        };
        let child_pid = child.id();

        // Dedicated reader threads keep full pipes from blocking the child.
        let stdout_rx = spawn_reader(child.stdout.take());
        let stderr_rx = spawn_reader(child.stderr.take());

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(child.wait());
        });

        let deadline = spec.timeout.map(|t| Instant::now() + t);
        let wait_result = loop {
            if spec.cancel.is_cancelled() {
                kill_process_group(child_pid);
                return CommandOutcome {
                    termination: Termination::Cancelled,
                    success: false,
                    output: with_partial("cancelled by operator", &stdout_rx, &stderr_rx),
                };
            }
            let slice = match deadline {
                Some(d) => {
                    let left = d.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        kill_process_group(child_pid);
                        let budget = spec.timeout.unwrap_or_default().as_millis() as u64;
                        let reason = format!("timed out after {}", format_budget(budget));
                        return CommandOutcome {
                            termination: Termination::TimedOut,
                            success: false,
                            output: with_partial(&reason, &stdout_rx, &stderr_rx),
                        };
                    }
                    left.min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };
            match rx.recv_timeout(slice) {
                Ok(result) => break result,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return CommandOutcome::failed("wait failed: waiter thread exited".to_string())
                }
            }
        };

        let stdout_buf = stdout_rx.recv().unwrap_or_default();
        let stderr_buf = stderr_rx.recv().unwrap_or_default();

        let status = match wait_result {
            Ok(s) => s,
            Err(e) => return CommandOutcome::failed(format!("wait failed: {e}")),
        };

        CommandOutcome {
            termination: Termination::Exited {
                code: status.code(),
            },
            success: status.success(),
            output: format_output(&stdout_buf, &stderr_buf),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(handle: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(read_all(handle));
    });
    rx
}

/// `reason` followed by whatever the killed command had printed. A
/// descendant that left the process group can hold a pipe open, so the
/// readers get `DRAIN_GRACE` to finish.
fn with_partial(reason: &str, stdout: &mpsc::Receiver<String>, stderr: &mpsc::Receiver<String>) -> String {
    let out = stdout.recv_timeout(DRAIN_GRACE).unwrap_or_default();
    let err = stderr.recv_timeout(DRAIN_GRACE).unwrap_or_default();
    let partial = format_output(&out, &err);
    if partial.is_empty() {
        reason.to_string()
    } else {
        format!("{reason}\n{partial}")
    }
}

fn read_all<R: Read>(handle: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut r) = handle {
        let _ = r.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Combine stdout/stderr and cap to `MAX_OUTPUT` bytes, keeping the tail.
fn format_output(stdout: &str, stderr: &str) -> String {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    let trimmed = output.trim();
    if trimmed.len() <= MAX_OUTPUT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// SIGKILL the child's process group. Best-effort.
fn kill_process_group(pid: u32) {
    #[cfg(unix)]
    let target = format!("-{pid}");
    #[cfg(not(unix))]
    let target = pid.to_string();
    let _ = Command::new("kill")
        .args(["-9", "--", &target])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

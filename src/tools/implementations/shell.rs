// execute_command: shell execution with timeout, cancellation, and
// output-based failure classification
//
// Commands run under `bash -c` (or `cmd /C` on Windows). Cancellation is
// cooperative: the read loop polls the session signal, sends SIGTERM,
// waits a short grace period, then kills. Exit 0 does not guarantee
// success; output is run through the failure classifier.

use crate::session::cancel::CancellationSignal;
use crate::tools::failure::{FailureClassifier, PhraseListClassifier};
use crate::tools::registry::ToolHandler;
use crate::tools::types::{ToolInvocation, ToolKind, ToolResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const KILL_GRACE: Duration = Duration::from_secs(2);
const MAX_OUTPUT_CHARS: usize = 20_000;

// Substring blocklist, checked before permission gating so dangerous
// commands are refused in every mode.
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf",
    "del /f",
    "format c:",
    "fdisk",
    "mkfs",
    "dd if=",
    ":(){ :|:& };:",
];

/// True when the command matches the blocklist. Case-insensitive.
pub fn is_dangerous_command(command: &str) -> bool {
    let lower = command.to_lowercase();
    DANGEROUS_PATTERNS.iter().any(|p| lower.contains(p))
}

pub struct ShellTools {
    classifier: Box<dyn FailureClassifier>,
    timeout: Duration,
}

impl ShellTools {
    pub const KINDS: &'static [ToolKind] = &[ToolKind::ExecuteCommand];

    pub fn new(timeout: Duration) -> Self {
        Self {
            classifier: Box::new(PhraseListClassifier),
            timeout,
        }
    }

    pub fn with_classifier(timeout: Duration, classifier: Box<dyn FailureClassifier>) -> Self {
        Self { classifier, timeout }
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

#[cfg(unix)]
fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}

async fn stop_child(mut child: Child) {
    terminate(&child);
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
}

fn truncate_output(output: String) -> String {
    if output.chars().count() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let kept: String = output.chars().take(MAX_OUTPUT_CHARS).collect();
    format!("{}\n... (output truncated)", kept)
}

impl ShellTools {
    async fn run(&self, command: &str, cancel: &CancellationSignal) -> Result<ToolResult> {
        if is_dangerous_command(command) {
            return Ok(ToolResult::error(format!(
                "dangerous command blocked: '{}'",
                command
            )));
        }

        tracing::debug!(%command, "running shell command");
        let mut child = shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn shell")?;

        let stdout = child.stdout.take().context("child stdout missing")?;
        let stderr = child.stderr.take().context("child stderr missing")?;

        // Drain stderr concurrently so the child never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push(line);
            }
            collected
        });

        let token = cancel.token();
        let deadline = Instant::now() + self.timeout;
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut output_lines: Vec<String> = Vec::new();

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    stop_child(child).await;
                    stderr_task.abort();
                    tracing::info!(%command, "command cancelled");
                    return Ok(ToolResult::cancelled());
                }
                _ = tokio::time::sleep_until(deadline) => {
                    stop_child(child).await;
                    stderr_task.abort();
                    return Ok(ToolResult::error(format!(
                        "Command timed out after {}s: '{}'",
                        self.timeout.as_secs(),
                        command
                    )));
                }
                line = stdout_lines.next_line() => {
                    match line.context("failed reading command output")? {
                        Some(line) => output_lines.push(line),
                        None => break,
                    }
                }
            }
        }

        let stderr_lines = stderr_task.await.unwrap_or_default();
        let status = tokio::select! {
            _ = token.cancelled() => {
                stop_child(child).await;
                return Ok(ToolResult::cancelled());
            }
            _ = tokio::time::sleep_until(deadline) => {
                stop_child(child).await;
                return Ok(ToolResult::error(format!(
                    "Command timed out after {}s: '{}'",
                    self.timeout.as_secs(),
                    command
                )));
            }
            status = child.wait() => status.context("failed waiting for command")?,
        };

        let mut combined = output_lines.join("\n");
        if !stderr_lines.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr_lines.join("\n"));
        }
        let output = truncate_output(combined);
        let exit_code = status.code();

        if self.classifier.is_real_failure(&output, exit_code) {
            let code = exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Ok(ToolResult::error(format!(
                "Command failed (exit code {}):\n{}",
                code, output
            )));
        }

        if output.is_empty() {
            Ok(ToolResult::success("Command completed (no output)"))
        } else {
            Ok(ToolResult::success(output))
        }
    }
}

#[async_trait]
impl ToolHandler for ShellTools {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationSignal,
    ) -> Result<ToolResult> {
        match invocation {
            ToolInvocation::ExecuteCommand { command } => self.run(command, cancel).await,
            other => anyhow::bail!("shell handler cannot execute {}", other.kind()),
        }
    }
}

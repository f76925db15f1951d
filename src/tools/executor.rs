// Tool execution pipeline
//
// For each parsed call, in document order:
//   1. dangerous-command filter (before permission gating, so a blocked
//      command is refused identically in every mode)
//   2. permission gate for the active mode
//   3. optional per-call confirmation
//   4. dispatch to the registered handler
//
// Failures become error-status results; a tripped cancellation signal
// stops the batch, marking the remaining calls cancelled.

use crate::errors::AgentError;
use crate::session::cancel::CancellationSignal;
use crate::tools::implementations::shell::is_dangerous_command;
use crate::tools::permissions::{classify, PermissionCheck, PermissionMode};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ParsedCall, ToolInvocation, ToolResult};
use async_trait::async_trait;

// Cap on a single result message when folded back into the conversation.
const MAX_RESULT_CHARS: usize = 5_000;

/// Asks the user whether a mutating tool may run.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &str, cancel: &CancellationSignal) -> bool;
}

/// Reads y/n from stdin, treating cancellation or EOF as "no".
///
/// One reader is shared across prompts: a read abandoned by a cancelled
/// prompt stays buffered inside it, so the next prompt never races a
/// stale reader for the same line.
pub struct StdinConfirmer {
    lines: tokio::sync::Mutex<tokio::io::Lines<tokio::io::BufReader<tokio::io::Stdin>>>,
}

impl StdinConfirmer {
    pub fn new() -> Self {
        use tokio::io::AsyncBufReadExt;
        Self {
            lines: tokio::sync::Mutex::new(
                tokio::io::BufReader::new(tokio::io::stdin()).lines(),
            ),
        }
    }
}

impl Default for StdinConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, prompt: &str, cancel: &CancellationSignal) -> bool {
        println!("{} [y/N] ", prompt);
        let token = cancel.token();
        let mut lines = self.lines.lock().await;
        // biased: an already-tripped signal answers without touching
        // stdin at all.
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            line = lines.next_line() => matches!(
                line.ok().flatten().as_deref().map(|s| s.trim().to_lowercase()),
                Some(ref s) if s == "y" || s == "yes"
            ),
        }
    }
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    confirmer: Box<dyn Confirmer>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, confirmer: Box<dyn Confirmer>) -> Self {
        Self {
            registry,
            confirmer,
        }
    }

    /// Execute calls in order. The returned vector pairs 1:1 with the
    /// input; once the signal trips, remaining calls are marked cancelled
    /// without running.
    pub async fn execute_batch(
        &self,
        calls: &[ParsedCall],
        mode: PermissionMode,
        cancel: &CancellationSignal,
    ) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        let mut interrupted = false;

        for call in calls {
            if interrupted || cancel.is_cancelled() {
                interrupted = true;
                results.push(ToolResult::cancelled());
                continue;
            }
            let result = self.execute_one(call, mode, cancel).await;
            tracing::info!(
                tool = %call.invocation.kind(),
                status = result.status_label(),
                "tool executed"
            );
            results.push(result);
        }
        results
    }

    async fn execute_one(
        &self,
        call: &ParsedCall,
        mode: PermissionMode,
        cancel: &CancellationSignal,
    ) -> ToolResult {
        let invocation = &call.invocation;

        // Blocklist applies regardless of mode.
        if let ToolInvocation::ExecuteCommand { command } = invocation {
            if is_dangerous_command(command) {
                tracing::warn!(%command, "dangerous command blocked");
                return ToolResult::error(format!("dangerous command blocked: '{}'", command));
            }
        }

        match classify(mode, invocation.kind()) {
            PermissionCheck::Deny(reason) => {
                return ToolResult::error(AgentError::PermissionDenied(reason).to_string());
            }
            PermissionCheck::ConfirmRequired => {
                let prompt = format!("Allow {}?", invocation.describe());
                if !self.confirmer.confirm(&prompt, cancel).await {
                    if cancel.is_cancelled() {
                        return ToolResult::cancelled();
                    }
                    return ToolResult {
                        status: crate::tools::types::ToolStatus::Cancelled,
                        message: format!("skipped: user declined {}", invocation.describe()),
                        preview: Vec::new(),
                    };
                }
            }
            PermissionCheck::Allow => {}
        }

        // Loop-control tools have no side effects and no handler.
        match invocation {
            ToolInvocation::Plan { content } => {
                return ToolResult::success(format!("Plan noted:\n{}", content));
            }
            ToolInvocation::TaskComplete { summary } => {
                return ToolResult::success(format!("Task complete: {}", summary));
            }
            _ => {}
        }

        let Some(handler) = self.registry.get(invocation.kind()) else {
            return ToolResult::error(format!(
                "no handler registered for {}",
                invocation.kind()
            ));
        };

        match handler.execute(invocation, cancel).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %invocation.kind(), error = %e, "tool failed");
                ToolResult::error(AgentError::Execution(e.to_string()).to_string())
            }
        }
    }
}

/// Fold a batch of results into one feedback message for the model.
pub fn aggregate_results(calls: &[ParsedCall], results: &[ToolResult]) -> String {
    let mut out = String::from("Tool results:\n");
    for (i, (call, result)) in calls.iter().zip(results.iter()).enumerate() {
        let message = if result.message.chars().count() > MAX_RESULT_CHARS {
            let kept: String = result.message.chars().take(MAX_RESULT_CHARS).collect();
            format!("{}\n... (truncated)", kept)
        } else {
            result.message.clone()
        };
        out.push_str(&format!(
            "{}. [{}] {}: {}\n",
            i + 1,
            call.invocation.kind(),
            result.status_label(),
            message
        ));
    }
    out
}

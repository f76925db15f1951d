// Conversation loop
//
// One user message drives an iterate-until-done loop: ask the provider,
// extract tool calls, execute them under the permission gate, feed the
// results back, repeat. The loop ends on task_complete, a reply with no
// work left, the iteration cap, cancellation, repeated identical
// operations, or a second consecutive provider failure.
//
// Provider requests run as spawned tasks under a small pool so that a
// stalled request can be abandoned and superseded by a fresh one carrying
// a recovery prompt.

pub mod cancel;
pub mod stall;

use crate::context::ContextBudgetManager;
use crate::provider::{ChatProvider, ProviderError, Role};
use crate::tools::executor::{aggregate_results, ToolExecutor};
use crate::tools::parser::{corrective_feedback, parse_response};
use crate::tools::permissions::PermissionMode;
use crate::tools::types::ToolInvocation;
use cancel::CancellationSignal;
use stall::StallMonitor;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub const DEFAULT_MAX_ITERATIONS: usize = 100;

// In-flight provider requests per session: the live one plus at most one
// stale request being superseded.
const REQUEST_POOL_SIZE: usize = 2;

// Last-resort bound on waiting for a reply, after stall recovery has
// given up. Generous on purpose.
const HARD_REPLY_TIMEOUT: Duration = Duration::from_secs(300);

// Identical consecutive operation batches tolerated before stopping.
const REPEAT_LIMIT: usize = 3;

// A reply with no tool calls that still promises more work keeps the
// loop going with a nudge.
const CONTINUATION_KEYWORDS: &[&str] = &["continue", "next step", "继续", "接下来"];

fn wants_continuation(thought: &str) -> bool {
    let lower = thought.to_lowercase();
    CONTINUATION_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub system_prompt: String,
    pub mode: PermissionMode,
    pub max_iterations: usize,
    pub context_budget: usize,
    pub quiet_period: Duration,
    pub max_recovery_prompts: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            mode: PermissionMode::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            context_budget: crate::context::BUDGET_DEFAULT,
            quiet_period: stall::DEFAULT_QUIET_PERIOD,
            max_recovery_prompts: stall::RECOVERY_PROMPTS.len(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEnd {
    /// The model called task_complete.
    TaskComplete(String),
    /// A reply with no tool calls and no promise of more work.
    NoMoreWork,
    /// Iteration cap hit; manual intervention suggested.
    IterationCapReached,
    Cancelled,
    /// Two consecutive provider failures.
    ProviderFailed(String),
    /// The model repeated the same operation batch too many times.
    RepeatedOperation(String),
}

#[derive(Debug)]
pub struct LoopOutcome {
    pub end: LoopEnd,
    pub iterations: usize,
}

impl LoopOutcome {
    /// One-line notice for the REPL.
    pub fn notice(&self) -> String {
        match &self.end {
            LoopEnd::TaskComplete(summary) => format!("Task complete: {}", summary),
            LoopEnd::NoMoreWork => "Done.".to_string(),
            LoopEnd::IterationCapReached => format!(
                "Stopped after {} iterations without task_complete; continue manually if needed.",
                self.iterations
            ),
            LoopEnd::Cancelled => "Cancelled.".to_string(),
            LoopEnd::ProviderFailed(message) => message.clone(),
            LoopEnd::RepeatedOperation(op) => {
                format!("Stopped: the model kept repeating '{}'.", op)
            }
        }
    }
}

enum WaitError {
    Cancelled,
    Provider(ProviderError),
}

pub struct AgentSession {
    provider: Arc<dyn ChatProvider>,
    executor: ToolExecutor,
    context: ContextBudgetManager,
    cancel: CancellationSignal,
    stall: StallMonitor,
    request_pool: Arc<Semaphore>,
    mode: PermissionMode,
    system_prompt: String,
    max_iterations: usize,
    reply_listener: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl AgentSession {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        executor: ToolExecutor,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            executor,
            context: ContextBudgetManager::new(config.context_budget),
            cancel: CancellationSignal::new(),
            stall: StallMonitor::new(config.quiet_period, config.max_recovery_prompts),
            request_pool: Arc::new(Semaphore::new(REQUEST_POOL_SIZE)),
            mode: config.mode,
            system_prompt: config.system_prompt,
            max_iterations: config.max_iterations,
            reply_listener: None,
        }
    }

    /// Receive the prose portion of each model reply (for display).
    pub fn set_reply_listener(&mut self, listener: Box<dyn Fn(&str) + Send + Sync>) {
        self.reply_listener = Some(listener);
    }

    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    pub fn cycle_mode(&mut self) -> PermissionMode {
        self.mode = self.mode.cycle();
        tracing::info!(mode = %self.mode, "permission mode switched");
        self.mode
    }

    /// Clone of the session's cancellation signal, e.g. for a Ctrl+C hook.
    pub fn cancel_signal(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    pub fn context_stats(&self) -> crate::context::ContextStats {
        self.context.stats()
    }

    /// Pin a keyed fact (project layout, environment) into every prompt.
    pub fn set_context_entry(&mut self, key: &str, content: &str) {
        self.context
            .set_entry(key, content, crate::context::EntryPriority::High);
    }

    /// Run the full loop for one user message.
    pub async fn handle_user_message(&mut self, input: &str) -> LoopOutcome {
        self.cancel.reset();
        self.context.add_turn(Role::User, input);

        let mut stall_rx = self.stall.start();
        let outcome = self.run_loop(&mut stall_rx).await;
        self.stall.stop();

        tracing::info!(iterations = outcome.iterations, end = ?outcome.end, "loop finished");
        outcome
    }

    async fn run_loop(&mut self, stall_rx: &mut UnboundedReceiver<String>) -> LoopOutcome {
        let mut iterations = 0usize;
        let mut provider_failures = 0u32;
        let mut recent_batches: VecDeque<String> = VecDeque::new();

        loop {
            if self.cancel.is_cancelled() {
                return LoopOutcome {
                    end: LoopEnd::Cancelled,
                    iterations,
                };
            }

            let reply = match self.await_reply(stall_rx).await {
                Ok(reply) => {
                    provider_failures = 0;
                    reply
                }
                Err(WaitError::Cancelled) => {
                    return LoopOutcome {
                        end: LoopEnd::Cancelled,
                        iterations,
                    }
                }
                Err(WaitError::Provider(e)) => {
                    provider_failures += 1;
                    tracing::warn!(error = %e, attempt = provider_failures, "provider failed");
                    if provider_failures > 1 {
                        return LoopOutcome {
                            end: LoopEnd::ProviderFailed(e.user_message()),
                            iterations,
                        };
                    }
                    // One recoverable failure: surface it and ask again.
                    self.context.add_turn(
                        Role::User,
                        format!("{}. Please answer again.", e.user_message()),
                    );
                    continue;
                }
            };

            self.stall.touch();
            iterations += 1;

            let parsed = parse_response(&reply);
            self.context.add_turn(Role::Assistant, reply);

            if let Some(listener) = &self.reply_listener {
                if !parsed.thought.is_empty() {
                    listener(&parsed.thought);
                }
            }

            if !parsed.has_calls() {
                if parsed.has_incomplete() {
                    // Malformed tags are not prose; correct and retry.
                    // This consumes an iteration like any other step.
                    if iterations >= self.max_iterations {
                        return LoopOutcome {
                            end: LoopEnd::IterationCapReached,
                            iterations,
                        };
                    }
                    self.context
                        .add_turn(Role::User, corrective_feedback(&parsed.incomplete));
                    continue;
                }
                if wants_continuation(&parsed.thought) {
                    if iterations >= self.max_iterations {
                        return LoopOutcome {
                            end: LoopEnd::IterationCapReached,
                            iterations,
                        };
                    }
                    self.context
                        .add_turn(Role::User, "Please continue with the next step.");
                    continue;
                }
                return LoopOutcome {
                    end: LoopEnd::NoMoreWork,
                    iterations,
                };
            }

            let results = self
                .executor
                .execute_batch(&parsed.calls, self.mode, &self.cancel)
                .await;
            self.stall.touch();

            // A recorded plan stays pinned in the prompt.
            for call in &parsed.calls {
                if let ToolInvocation::Plan { content } = &call.invocation {
                    self.context
                        .set_entry("plan", content, crate::context::EntryPriority::High);
                }
            }

            // task_complete anywhere in the batch ends the task.
            if let Some(call) = parsed
                .calls
                .iter()
                .find(|c| matches!(c.invocation, ToolInvocation::TaskComplete { .. }))
            {
                let summary = match &call.invocation {
                    ToolInvocation::TaskComplete { summary } => summary.clone(),
                    _ => unreachable!(),
                };
                return LoopOutcome {
                    end: LoopEnd::TaskComplete(summary),
                    iterations,
                };
            }

            if self.cancel.is_cancelled() {
                return LoopOutcome {
                    end: LoopEnd::Cancelled,
                    iterations,
                };
            }

            // Guard against the model looping on the same operations.
            let signature = parsed
                .calls
                .iter()
                .map(|c| c.invocation.describe())
                .collect::<Vec<_>>()
                .join("; ");
            recent_batches.push_back(signature.clone());
            if recent_batches.len() > REPEAT_LIMIT {
                recent_batches.pop_front();
            }
            if recent_batches.len() == REPEAT_LIMIT
                && recent_batches.iter().all(|s| *s == signature)
            {
                return LoopOutcome {
                    end: LoopEnd::RepeatedOperation(signature),
                    iterations,
                };
            }

            if iterations >= self.max_iterations {
                return LoopOutcome {
                    end: LoopEnd::IterationCapReached,
                    iterations,
                };
            }

            // Broken tags alongside complete calls ride in the same
            // feedback turn, so the model knows part of its batch was
            // dropped.
            let mut feedback = aggregate_results(&parsed.calls, &results);
            if parsed.has_incomplete() {
                feedback.push('\n');
                feedback.push_str(&corrective_feedback(&parsed.incomplete));
            }
            self.context.add_turn(Role::User, feedback);
        }
    }

    fn spawn_request(&self) -> JoinHandle<Result<String, ProviderError>> {
        let messages = self.context.messages_for_provider(&self.system_prompt);
        let provider = Arc::clone(&self.provider);
        let pool = Arc::clone(&self.request_pool);
        tokio::spawn(async move {
            let _permit = pool
                .acquire_owned()
                .await
                .map_err(|_| ProviderError::Network("request pool closed".into()))?;
            provider.complete(&messages).await
        })
    }

    /// Wait for the in-flight request, superseding it with a fresh one
    /// whenever the stall monitor fires.
    async fn await_reply(
        &mut self,
        stall_rx: &mut UnboundedReceiver<String>,
    ) -> Result<String, WaitError> {
        // Prompts queued while a tool batch was running are stale;
        // activity has been observed since they fired.
        while stall_rx.try_recv().is_ok() {}

        let token = self.cancel.token();
        let deadline = tokio::time::Instant::now() + HARD_REPLY_TIMEOUT;
        let mut in_flight = self.spawn_request();

        loop {
            tokio::select! {
                joined = &mut in_flight => {
                    return match joined {
                        Ok(Ok(reply)) => Ok(reply),
                        Ok(Err(e)) => Err(WaitError::Provider(e)),
                        Err(_) => Err(WaitError::Provider(ProviderError::Network(
                            "request task aborted".into(),
                        ))),
                    };
                }
                _ = token.cancelled() => {
                    in_flight.abort();
                    return Err(WaitError::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    in_flight.abort();
                    return Err(WaitError::Provider(ProviderError::Timeout));
                }
                Some(prompt) = stall_rx.recv() => {
                    tracing::info!("superseding stalled request with recovery prompt");
                    in_flight.abort();
                    self.context.add_turn(Role::User, prompt);
                    in_flight = self.spawn_request();
                }
            }
        }
    }
}

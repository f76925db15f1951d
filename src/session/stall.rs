// Stall detection during long waits
//
// While the loop waits on the provider or a long tool, a watcher tracks
// the time since the last observed activity. After a quiet period it
// emits an escalating recovery prompt on a channel; the loop injects the
// prompt into the conversation and supersedes the stale request. Recovery
// is bounded: after `max_recoveries` prompts the watcher goes quiet and
// logs a warning instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
// tokio's Instant so paused-clock tests can drive the watcher.
use tokio::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default quiet period before a stall is declared.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(15);

/// Recovery prompts, in escalation order. The cap equals the list length.
pub const RECOVERY_PROMPTS: &[&str] = &[
    "No output for a while. Summarize your progress so far and continue with the next step.",
    "Still no progress detected. State what is blocking you, then either continue or finish with task_complete.",
    "Final reminder: summarize what has been done and call task_complete if the task is finished.",
];

struct StallState {
    last_activity: Mutex<Instant>,
    recoveries: AtomicUsize,
    max_recoveries: usize,
    quiet_period: Duration,
}

/// Watches for quiet periods and emits recovery prompts.
///
/// start/stop are idempotent; touch() may be called from anywhere that
/// observes activity (model output arriving, a tool producing output).
pub struct StallMonitor {
    state: Arc<StallState>,
    watcher: Option<(JoinHandle<()>, CancellationToken)>,
}

impl StallMonitor {
    pub fn new(quiet_period: Duration, max_recoveries: usize) -> Self {
        Self {
            state: Arc::new(StallState {
                last_activity: Mutex::new(Instant::now()),
                recoveries: AtomicUsize::new(0),
                max_recoveries,
                quiet_period,
            }),
            watcher: None,
        }
    }

    /// Record activity, pushing the next stall check out by the full
    /// quiet period.
    pub fn touch(&self) {
        *self
            .state
            .last_activity
            .lock()
            .expect("stall lock poisoned") = Instant::now();
    }

    pub fn recoveries_used(&self) -> usize {
        self.state.recoveries.load(Ordering::Relaxed)
    }

    /// Start the watcher for one user request. Returns the channel on
    /// which recovery prompts arrive. Calling start while already running
    /// restarts the watcher with a fresh recovery budget.
    pub fn start(&mut self) -> mpsc::UnboundedReceiver<String> {
        self.stop();
        self.touch();
        self.state.recoveries.store(0, Ordering::Relaxed);

        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::clone(&self.state);
        let stop_token = CancellationToken::new();
        let watcher_token = stop_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = watcher_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let quiet_for = {
                    let last = state.last_activity.lock().expect("stall lock poisoned");
                    last.elapsed()
                };
                if quiet_for < state.quiet_period {
                    continue;
                }

                let used = state.recoveries.load(Ordering::Relaxed);
                if used >= state.max_recoveries {
                    tracing::warn!(
                        recoveries = used,
                        "stall persists after all recovery prompts; giving up"
                    );
                    break;
                }

                let prompt = RECOVERY_PROMPTS[used.min(RECOVERY_PROMPTS.len() - 1)];
                tracing::info!(
                    attempt = used + 1,
                    quiet_secs = quiet_for.as_secs(),
                    "stall detected, sending recovery prompt"
                );
                state.recoveries.fetch_add(1, Ordering::Relaxed);
                {
                    let mut last = state.last_activity.lock().expect("stall lock poisoned");
                    *last = Instant::now();
                }
                if tx.send(prompt.to_string()).is_err() {
                    break;
                }
            }
        });

        self.watcher = Some((handle, stop_token));
        rx
    }

    /// Stop the watcher. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some((handle, token)) = self.watcher.take() {
            token.cancel();
            handle.abort();
        }
    }
}

impl Drop for StallMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

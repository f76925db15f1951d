// Cooperative cancellation
//
// A single signal is shared by the REPL, the conversation loop, and every
// long-running tool. Long operations poll it roughly every 100ms; Ctrl+C
// trips it. Tokens cannot be un-cancelled, so reset() swaps in a fresh one
// at the start of each user request.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll cadence for loops that check the signal.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resettable cancellation signal shared across the session.
#[derive(Clone)]
pub struct CancellationSignal {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Trip the signal. Every holder of the current token observes it.
    pub fn trigger(&self) {
        self.current
            .lock()
            .expect("cancellation lock poisoned")
            .cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.current
            .lock()
            .expect("cancellation lock poisoned")
            .is_cancelled()
    }

    /// Snapshot of the current token, for select!-style waits.
    pub fn token(&self) -> CancellationToken {
        self.current
            .lock()
            .expect("cancellation lock poisoned")
            .clone()
    }

    /// Arm a fresh token for the next request. A tripped token stays
    /// tripped for anything still holding it.
    pub fn reset(&self) {
        *self.current.lock().expect("cancellation lock poisoned") = CancellationToken::new();
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Route Ctrl+C to the signal. Installs a process-global handler, so call
/// at most once.
pub fn install_ctrlc_handler(signal: CancellationSignal) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, cancelling current operation");
        signal.trigger();
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_untripped() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_trigger_observed_by_clones() {
        let signal = CancellationSignal::new();
        let other = signal.clone();
        signal.trigger();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_reset_rearms() {
        let signal = CancellationSignal::new();
        signal.trigger();
        assert!(signal.is_cancelled());
        signal.reset();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_old_token_stays_tripped_after_reset() {
        let signal = CancellationSignal::new();
        let old = signal.token();
        signal.trigger();
        signal.reset();
        assert!(old.is_cancelled());
        assert!(!signal.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_token_wakes_waiters() {
        let signal = CancellationSignal::new();
        let token = signal.token();
        let waiter = tokio::spawn(async move {
            token.cancelled().await;
            true
        });
        signal.trigger();
        assert!(waiter.await.unwrap());
    }
}

//! Level-triggered wake signal for consumer workers
//!
//! Each consumer worker owns one `WakeSignal`; any number of producers may
//! `set()` it. Repeated sets before a wait collapse into a single wake. A
//! `set()` that lands between a wake and the waiter's `clear()` is preserved:
//! the next `wait()` returns immediately instead of losing the wake.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Why a `wait()` call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Woken,
    Canceled,
}

/// Binary wake flag bound to exactly one consumer
#[derive(Debug, Default)]
pub struct WakeSignal {
    ready: AtomicBool,
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark ready and wake a blocked waiter; idempotent
    ///
    /// `notify_one` stores at most one permit when no waiter is registered,
    /// which is what collapses repeated sets into a single wake.
    pub fn set(&self) {
        self.ready.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Reset to unset; called by the waiter right after waking, before
    /// re-reading shared state
    pub fn clear(&self) {
        self.ready.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Block until set or until the token is canceled
    pub async fn wait(&self, cancel: &CancellationToken) -> WakeReason {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Consumes a permit stored by a set() that arrived while nobody
        // was waiting (including one racing with a previous clear()).
        if notified.as_mut().enable() {
            return WakeReason::Woken;
        }
        // Level check: set but not yet cleared by the owner.
        if self.ready.load(Ordering::Acquire) {
            return WakeReason::Woken;
        }
        tokio::select! {
            _ = notified => WakeReason::Woken,
            _ = cancel.cancelled() => WakeReason::Canceled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_blocked_waiter_wakes_on_set() {
        let signal = Arc::new(WakeSignal::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let signal = signal.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { signal.wait(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.set();

        let reason = timeout(SHORT, waiter).await.unwrap().unwrap();
        assert_eq!(reason, WakeReason::Woken);
    }

    #[tokio::test]
    async fn test_repeated_sets_collapse_into_one_wake() {
        let signal = WakeSignal::new();
        let cancel = CancellationToken::new();

        signal.set();
        signal.set();
        signal.set();

        assert_eq!(signal.wait(&cancel).await, WakeReason::Woken);
        signal.clear();

        // No further wake pending: the second wait must block.
        assert!(timeout(SHORT, signal.wait(&cancel)).await.is_err());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_while_still_set() {
        let signal = WakeSignal::new();
        let cancel = CancellationToken::new();

        signal.set();
        assert_eq!(signal.wait(&cancel).await, WakeReason::Woken);
        // Owner did not clear: the level is still up.
        assert_eq!(signal.wait(&cancel).await, WakeReason::Woken);
    }

    #[tokio::test]
    async fn test_set_between_wake_and_clear_is_preserved() {
        let signal = WakeSignal::new();
        let cancel = CancellationToken::new();

        signal.set();
        assert_eq!(signal.wait(&cancel).await, WakeReason::Woken);

        // Producer fires again before the waiter clears.
        signal.set();
        signal.clear();

        assert_eq!(
            timeout(SHORT, signal.wait(&cancel)).await.unwrap(),
            WakeReason::Woken
        );
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_waiter() {
        let signal = Arc::new(WakeSignal::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let signal = signal.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { signal.wait(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let reason = timeout(SHORT, waiter).await.unwrap().unwrap();
        assert_eq!(reason, WakeReason::Canceled);
    }

    #[tokio::test]
    async fn test_clear_without_set_keeps_waiter_blocked() {
        let signal = WakeSignal::new();
        let cancel = CancellationToken::new();
        signal.clear();
        assert!(timeout(SHORT, signal.wait(&cancel)).await.is_err());
    }
}

//! Cooperative cancellation of in-flight tool work.

use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Single-fire interrupt surface.
///
/// Safe to trigger from any thread (signal-handler tasks, TUI keypress
/// handlers); consumers on the event loop observe it through [`check`],
/// [`wait`], or the [`CancellationToken`] handed to the scheduler.
///
/// Fires at most once per arming; `check` keeps reporting fired until an
/// explicit [`clear`].
///
/// [`check`]: InterruptManager::check
/// [`wait`]: InterruptManager::wait
/// [`clear`]: InterruptManager::clear
#[derive(Debug, Default)]
pub struct InterruptManager {
    armed: AtomicBool,
    fired: AtomicBool,
    notify: Notify,
    token: Mutex<CancellationToken>,
}

impl InterruptManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept interrupts.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Ignore interrupts until the next [`arm`](InterruptManager::arm).
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Trigger the interrupt. Returns whether this call actually fired;
    /// unarmed or already-fired managers ignore the trigger.
    pub fn fire(&self) -> bool {
        if !self.armed.load(Ordering::SeqCst) {
            return false;
        }
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!("interrupt fired");
        self.current_token().cancel();
        self.notify.notify_waiters();
        true
    }

    /// Non-blocking: has the interrupt fired since the last clear?
    pub fn check(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Wait for the interrupt, bounded by `timeout` when given. Returns
    /// whether it fired.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        if self.check() {
            return true;
        }
        match timeout {
            Some(timeout) => {
                let waited = tokio::time::timeout(timeout, self.notify.notified()).await;
                waited.is_ok() || self.check()
            }
            None => {
                self.notify.notified().await;
                true
            }
        }
    }

    /// Reset the fired state and install a fresh token for the next turn.
    pub fn clear(&self) {
        self.fired.store(false, Ordering::SeqCst);
        let mut token = self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *token = CancellationToken::new();
    }

    /// The token the scheduler should select on for the current turn.
    pub fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
#[path = "interrupt.test.rs"]
mod tests;

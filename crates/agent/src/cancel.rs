//! Cooperative cancellation for agent turns.
//!
//! Each running turn gets a [`CancelToken`]. The round loop polls it at its
//! suspension points; nothing is preempted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A cancellation token that can be checked by the round loop.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The token of the turn currently holding the agent, if any.
///
/// Kept outside the single-flight lock so an abort never waits on it.
#[derive(Default)]
pub struct ActiveTurn {
    slot: Mutex<Option<CancelToken>>,
}

impl ActiveTurn {
    /// Register the token of a turn that just acquired the agent.
    pub fn begin(&self, token: CancelToken) {
        *self.slot.lock() = Some(token);
    }

    /// Register `token` until the returned guard drops, so a turn that
    /// unwinds still leaves the agent idle.
    #[must_use = "the turn is unregistered when the guard drops"]
    pub fn register(&self, token: CancelToken) -> Registration<'_> {
        self.begin(token.clone());
        Registration { active: self, token }
    }

    /// Unregister `token`. A newer turn's token is left alone.
    pub fn finish(&self, token: &CancelToken) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|t| t.same_as(token)) {
            *slot = None;
        }
    }

    /// Cancel the running turn. Returns false when nothing was running.
    pub fn abort(&self) -> bool {
        match self.slot.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }
}

pub struct Registration<'a> {
    active: &'a ActiveTurn,
    token: CancelToken,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.active.finish(&self.token);
    }
}

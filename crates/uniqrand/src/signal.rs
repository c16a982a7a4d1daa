use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Broadcast-once stop signal shared by every task of a single run.
///
/// Cloning is cheap and every clone observes the same state. Firing is
/// idempotent: the first call flips the signal and wakes all waiters, later
/// calls have no effect. A fired signal can never be reset; a new run creates
/// a new signal.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal.
    ///
    /// Returns `true` only for the call that actually flipped it, which lets
    /// callers attribute the stop to a single origin.
    pub fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::AcqRel);
        self.token.cancel();
        first
    }

    /// Returns `true` once the signal has been fired.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been fired. Resolves immediately if it
    /// already was.
    pub fn fired(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

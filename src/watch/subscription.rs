use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::WatchInner;

/// Liveness flag shared by a subscription's handle, its registry entry and
/// its dispatcher. Callbacks run while the gate is held, so closing it from
/// another thread waits for a running callback to return. The lock is
/// reentrant: a callback may unsubscribe itself.
#[derive(Clone)]
pub(crate) struct ActiveGate(Arc<ReentrantMutex<Cell<bool>>>);

impl ActiveGate {
    pub(crate) fn new() -> Self {
        Self(Arc::new(ReentrantMutex::new(Cell::new(true))))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.0.lock().get()
    }

    /// Returns `false` when the gate was already closed.
    pub(crate) fn close(&self) -> bool {
        self.0.lock().replace(false)
    }

    /// Runs `f` if the gate is open. The gate cannot close while `f` runs.
    pub(crate) fn run_if_open<R>(
        &self,
        f: impl FnOnce() -> R,
    ) -> Option<R> {
        let guard = self.0.lock();
        if !guard.get() {
            return None;
        }
        Some(f())
    }

    /// Closes the gate and runs `f` under it, unless it was already closed.
    pub(crate) fn close_with(
        &self,
        f: impl FnOnce(),
    ) -> bool {
        let guard = self.0.lock();
        if !guard.replace(false) {
            return false;
        }
        f();
        true
    }
}

/// Handle to a live snapshot listener.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    id: u64,
    gate: ActiveGate,
    cancel: CancellationToken,
    inner: Arc<WatchInner>,
}

impl Subscription {
    pub(super) fn new(
        id: u64,
        gate: ActiveGate,
        cancel: CancellationToken,
        inner: Arc<WatchInner>,
    ) -> Self {
        Self {
            id,
            gate,
            cancel,
            inner,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once unsubscribed, shut down, or after the terminal error was delivered
    pub fn is_active(&self) -> bool {
        self.gate.is_open() && !self.cancel.is_cancelled()
    }

    /// Stops the listener. No callback starts after this returns, even for
    /// messages already in flight; a callback running on another thread is
    /// waited for. Safe to call any number of times, including from inside a
    /// callback.
    pub fn unsubscribe(&self) {
        self.gate.close();
        self.cancel.cancel();
        if self.inner.release(self.id) {
            trace!(subscription_id = self.id, "subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

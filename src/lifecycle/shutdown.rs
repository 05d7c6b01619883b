//! Shutdown coordination for the sidecar.
//!
//! A single [`Shutdown`] is created at process start and cloned into every
//! owner of a background activity or external resource. Owners register a
//! unit of pending work before they start and hold the returned
//! [`WorkGuard`] until they are done; the top level waits for the pending
//! count to reach zero before exiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{watch, Notify};

use crate::observability::metrics;

/// Coordinator for exactly-once, process-wide shutdown.
#[derive(Debug, Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Units of work that have registered and not yet completed.
    pending: AtomicUsize,
    /// Woken whenever `pending` drops to zero.
    idle: Notify,
    /// Flips to `true` once, on the first trigger.
    stop_tx: watch::Sender<bool>,
    /// Cause recorded by the first trigger.
    cause: OnceLock<StopCause>,
}

#[derive(Debug)]
struct StopCause {
    reason: String,
    /// Set when the stop was caused by a failure rather than a request.
    fault: bool,
}

impl Inner {
    fn complete(&self) {
        let prev = self.pending.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(pending = prev - 1, "Work completed");
        metrics::set_pending_work(prev - 1);
        if prev == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                stop_tx,
                cause: OnceLock::new(),
            }),
        }
    }

    /// Register one unit of pending work.
    ///
    /// The unit completes when the returned guard is dropped or
    /// [`WorkGuard::complete`] is called, so every early return releases it.
    #[must_use = "dropping the guard completes the work immediately"]
    pub fn register(&self) -> WorkGuard {
        let pending = self.inner.pending.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(pending, "Work registered");
        metrics::set_pending_work(pending);
        WorkGuard {
            inner: Some(Arc::clone(&self.inner)),
        }
    }

    /// Request shutdown.
    ///
    /// The first call records `reason` and broadcasts the stop signal.
    /// Later calls are no-ops. Returns `true` for the call that won.
    pub fn trigger(&self, reason: impl Into<String>) -> bool {
        self.stop(reason.into(), false)
    }

    /// Like [`trigger`](Self::trigger), but marks the stop as a failure so
    /// the process exits non-zero.
    pub fn trigger_fault(&self, reason: impl Into<String>) -> bool {
        self.stop(reason.into(), true)
    }

    fn stop(&self, reason: String, fault: bool) -> bool {
        match self.inner.cause.set(StopCause { reason, fault }) {
            Ok(()) => {
                let reason = self.inner.cause.get().map(|c| c.reason.as_str()).unwrap_or_default();
                tracing::warn!(reason = %reason, fault, "Shutdown triggered");
                self.inner.stop_tx.send_replace(true);
                true
            }
            Err(ignored) => {
                tracing::debug!(reason = %ignored.reason, "Shutdown already in progress");
                false
            }
        }
    }

    /// Subscribe to the stop broadcast.
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            rx: self.inner.stop_tx.subscribe(),
        }
    }

    /// Wait until every registered unit of work has completed.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register interest before reading the counter so a concurrent
            // final completion cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Whether shutdown has been triggered.
    pub fn is_stopped(&self) -> bool {
        *self.inner.stop_tx.borrow()
    }

    /// The reason recorded by the first trigger, if any.
    pub fn reason(&self) -> Option<String> {
        self.inner.cause.get().map(|c| c.reason.clone())
    }

    /// Whether the first trigger was a failure.
    pub fn is_fault(&self) -> bool {
        self.inner.cause.get().is_some_and(|c| c.fault)
    }

    /// Current number of registered, uncompleted units of work.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the stop broadcast.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolve once shutdown has been triggered. Resolves immediately if it
    /// already was.
    pub async fn stopped(&mut self) {
        // An error means every coordinator handle is gone; nothing is left
        // to wait for.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    /// Non-blocking check of the stop state.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

/// A registered unit of pending work. Completes on drop.
#[derive(Debug)]
pub struct WorkGuard {
    inner: Option<Arc<Inner>>,
}

impl WorkGuard {
    /// Mark the unit of work complete.
    pub fn complete(mut self) {
        if let Some(inner) = self.inner.take() {
            inner.complete();
        }
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.complete();
        }
    }
}

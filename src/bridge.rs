//! Exactly-once continuation bridge.
//!
//! Adapts one callback-style asynchronous call into a single awaitable.
//! External collaborators (the input surface, native speech engines) run
//! their callbacks on arbitrary threads; the bridge is the join point that
//! brings the result back into the sequential session loop. The awaiting
//! caller is resumed at most once; duplicate deliveries and post-cancel
//! firings are discarded silently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::trace;

struct Shared<T> {
    settled: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

/// The awaiting half of a continuation.
///
/// Dropping an unresolved continuation cancels it, so a bridge parked in a
/// `select!` arm is cancelled automatically when the other arm wins.
pub struct Continuation<T> {
    rx: Option<oneshot::Receiver<T>>,
    shared: Arc<Shared<T>>,
}

/// The resuming half, handed to the external callback. Cloneable so an
/// engine can capture it in more than one callback path.
pub struct Resumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Resumer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Create a linked continuation/resumer pair.
pub fn continuation<T>() -> (Continuation<T>, Resumer<T>) {
    let (tx, rx) = oneshot::channel();
    let shared = Arc::new(Shared {
        settled: AtomicBool::new(false),
        tx: Mutex::new(Some(tx)),
    });
    (
        Continuation {
            rx: Some(rx),
            shared: Arc::clone(&shared),
        },
        Resumer { shared },
    )
}

impl<T> Resumer<T> {
    /// Resume the awaiting caller with `value`.
    ///
    /// Returns `false` — and drops `value` — if the continuation was already
    /// settled by an earlier resume or by cancellation.
    pub fn resume(&self, value: T) -> bool {
        if self.shared.settled.swap(true, Ordering::AcqRel) {
            trace!("continuation already settled, discarding resume");
            return false;
        }
        let tx = match self.shared.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        match tx {
            // The receiver may already be gone; the value is dropped either way.
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether the continuation has already been resumed or cancelled.
    pub fn is_settled(&self) -> bool {
        self.shared.settled.load(Ordering::Acquire)
    }
}

impl<T> Continuation<T> {
    /// Wait for the resume.
    ///
    /// Returns `None` if the continuation was cancelled or every resumer was
    /// dropped without resuming.
    pub async fn wait(mut self) -> Option<T> {
        match self.rx.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }

    /// Cancel: later resumes are discarded and the caller is never resumed.
    pub fn cancel(&self) {
        if !self.shared.settled.swap(true, Ordering::AcqRel) {
            if let Ok(mut guard) = self.shared.tx.lock() {
                guard.take();
            }
        }
    }
}

impl<T> Drop for Continuation<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Synchronous, ordered publish-subscribe.
//!
//! Handlers fire on the emitting thread, in subscription order, with no
//! reentrancy protection beyond what each handler itself arranges.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Callback registered with an [`Emitter`].
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle for a registered handler. Cancellation is idempotent and also
/// happens on drop, so holding the handle is what keeps the subscription
/// alive.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// One event surface with a typed payload.
pub struct Emitter<T> {
    inner: Arc<EmitterInner<T>>,
}

struct EmitterInner<T> {
    next_seq: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<T>)>>,
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                next_seq: AtomicU64::new(0),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Emitter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Handler<T>) -> Subscription {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.lock().push((seq, handler));

        let inner: Weak<EmitterInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.handlers.lock().retain(|(id, _)| *id != seq);
            }
        })
    }

    /// Notify every handler, in subscription order.
    pub fn emit(&self, payload: &T) {
        // Snapshot outside the lock so handlers may subscribe or cancel
        // without deadlocking.
        let handlers: Vec<Handler<T>> = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(payload);
        }
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }
}

impl<T: 'static> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

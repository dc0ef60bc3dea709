//! Frame-coalesced refresh scheduling.
//!
//! Bounds notifications can arrive much faster than a display refreshes.
//! The [`RefreshGate`] collapses them: the first change arms the gate and
//! schedules one refresh; further changes while armed schedule nothing. The
//! gate releases when the scheduled refresh runs. A fallback deadline keeps
//! the pipeline alive if a scheduled refresh never fires: once a pending
//! refresh is older than the fallback, the next change may arm again.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

/// Runs a callback at the next rendering opportunity.
pub trait FrameScheduler: Send + Sync {
    fn schedule(&self, callback: Box<dyn FnOnce() + Send>);
}

/// Scheduler backed by a tokio delay task, approximating one display frame.
pub struct TokioFrameScheduler {
    frame: Duration,
}

impl TokioFrameScheduler {
    #[must_use]
    pub fn new(frame: Duration) -> Self {
        Self { frame }
    }
}

impl Default for TokioFrameScheduler {
    fn default() -> Self {
        // ~60Hz
        Self::new(Duration::from_millis(16))
    }
}

impl FrameScheduler for TokioFrameScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce() + Send>) {
        let frame = self.frame;
        tokio::spawn(async move {
            tokio::time::sleep(frame).await;
            callback();
        });
    }
}

/// Pending-refresh flag with a fallback deadline.
#[derive(Debug)]
pub struct RefreshGate {
    pending_since: Mutex<Option<Instant>>,
    fallback: Duration,
}

impl RefreshGate {
    pub const DEFAULT_FALLBACK: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn new(fallback: Duration) -> Self {
        Self {
            pending_since: Mutex::new(None),
            fallback,
        }
    }

    /// Try to arm the gate. Returns true if the caller should schedule a
    /// refresh; false while one is already pending and younger than the
    /// fallback deadline.
    pub fn try_arm(&self) -> bool {
        let mut pending = self.pending_since.lock();
        match *pending {
            Some(since) if since.elapsed() < self.fallback => false,
            Some(since) => {
                warn!(
                    pending_ms = since.elapsed().as_millis() as u64,
                    "scheduled refresh never fired; re-arming"
                );
                *pending = Some(Instant::now());
                true
            }
            None => {
                *pending = Some(Instant::now());
                true
            }
        }
    }

    /// Release the gate; called by the scheduled refresh itself.
    pub fn release(&self) {
        *self.pending_since.lock() = None;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending_since.lock().is_some()
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FALLBACK)
    }
}

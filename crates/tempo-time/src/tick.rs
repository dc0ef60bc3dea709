//! Tick sources drive Follow mode.
//!
//! A tick source is a pulse generator: `clock` sources fire on wall-clock
//! periods, `data` sources fire when new data arrives. Follow mode
//! subscribes to one source and re-centers the conductor's bounds on every
//! tick. Subscriptions are cancellable and cancel themselves on drop so a
//! destroyed mode cannot leak callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::values::TimeValue;

/// Discriminates what kind of pulse a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickSourceType {
    /// Periodic wall-clock pulse
    Clock,
    /// Pulse on data arrival (latest available data)
    Data,
}

impl std::fmt::Display for TickSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TickSourceType::Clock => write!(f, "clock"),
            TickSourceType::Data => write!(f, "data"),
        }
    }
}

/// Presentation metadata for a tick source, consumed by selection menus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMetadata {
    pub key: String,
    pub name: String,
    pub description: String,
    pub css_class: String,
}

impl TickMetadata {
    #[must_use]
    pub fn new(key: &str, name: &str, description: &str, css_class: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            css_class: css_class.to_string(),
        }
    }
}

/// Callback invoked with each tick value.
pub type TickListener = Arc<dyn Fn(TimeValue) + Send + Sync>;

/// A pulse generator that Follow mode can attach to.
pub trait TickSource: Send + Sync {
    fn source_type(&self) -> TickSourceType;

    fn metadata(&self) -> &TickMetadata;

    /// Register a listener. The listener fires synchronously on the thread
    /// that produced the tick, in subscription order.
    fn subscribe(&self, listener: TickListener) -> TickSubscription;
}

/// Handle for a registered tick listener.
///
/// Cancelling detaches the listener; cancellation is idempotent and also
/// happens on drop.
pub struct TickSubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl TickSubscription {
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
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

impl Drop for TickSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TickSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Ordered listener set shared by the built-in tick sources.
///
/// Listeners fire in subscription order; removal is by sequence number so
/// cancelling one subscription never disturbs the others.
#[derive(Clone, Default)]
pub struct TickFanout {
    inner: Arc<FanoutInner>,
}

#[derive(Default)]
struct FanoutInner {
    next_seq: AtomicU64,
    listeners: Mutex<Vec<(u64, TickListener)>>,
}

impl TickFanout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: TickListener) -> TickSubscription {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((seq, listener));

        let inner: Weak<FanoutInner> = Arc::downgrade(&self.inner);
        TickSubscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.lock().retain(|(id, _)| *id != seq);
            }
        })
    }

    /// Deliver a tick to every listener, in subscription order.
    pub fn emit(&self, tick: TimeValue) {
        // Snapshot outside the lock so a listener may subscribe or cancel
        // without deadlocking.
        let listeners: Vec<TickListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(tick);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// Periodic `clock` source backed by a tokio interval task.
///
/// The driver task is started explicitly (it needs a runtime) and aborted
/// on [`WallClockSource::stop`] or drop. Each tick carries the current UTC
/// epoch in milliseconds.
pub struct WallClockSource {
    metadata: TickMetadata,
    period: Duration,
    fanout: TickFanout,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl WallClockSource {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self::with_metadata(
            period,
            TickMetadata::new(
                "local-clock",
                "Local Clock",
                "Uses the system clock as the current time basis.",
                "icon-clock",
            ),
        )
    }

    #[must_use]
    pub fn with_metadata(period: Duration, metadata: TickMetadata) -> Self {
        Self {
            metadata,
            period,
            fanout: TickFanout::new(),
            driver: Mutex::new(None),
        }
    }

    /// Spawn the interval driver. Idempotent; requires a tokio runtime.
    pub fn start(&self) {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return;
        }
        let fanout = self.fanout.clone();
        let period = self.period;
        let key = self.metadata.key.clone();
        *driver = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = chrono::Utc::now().timestamp_millis() as TimeValue;
                trace!(source = %key, tick = now, "clock tick");
                fanout.emit(now);
            }
        }));
    }

    /// Abort the interval driver. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.driver.lock().is_some()
    }
}

impl TickSource for WallClockSource {
    fn source_type(&self) -> TickSourceType {
        TickSourceType::Clock
    }

    fn metadata(&self) -> &TickMetadata {
        &self.metadata
    }

    fn subscribe(&self, listener: TickListener) -> TickSubscription {
        self.fanout.subscribe(listener)
    }
}

impl Drop for WallClockSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `data` source advanced by whatever ingests telemetry.
///
/// Call [`LatestDataSource::notify`] with the timestamp of the newest datum;
/// subscribed Follow modes re-center on it.
pub struct LatestDataSource {
    metadata: TickMetadata,
    fanout: TickFanout,
}

impl LatestDataSource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_metadata(TickMetadata::new(
            "latest-data",
            "Latest Available Data",
            "Advances when new data becomes available.",
            "icon-database",
        ))
    }

    #[must_use]
    pub fn with_metadata(metadata: TickMetadata) -> Self {
        Self {
            metadata,
            fanout: TickFanout::new(),
        }
    }

    /// Report the timestamp of newly arrived data.
    pub fn notify(&self, timestamp: TimeValue) {
        trace!(source = %self.metadata.key, tick = timestamp, "data tick");
        self.fanout.emit(timestamp);
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.fanout.listener_count()
    }
}

impl Default for LatestDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for LatestDataSource {
    fn source_type(&self) -> TickSourceType {
        TickSourceType::Data
    }

    fn metadata(&self) -> &TickMetadata {
        &self.metadata
    }

    fn subscribe(&self, listener: TickListener) -> TickSubscription {
        self.fanout.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_listener() -> (TickListener, Arc<Mutex<Vec<TimeValue>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: TickListener = Arc::new(move |tick| sink.lock().push(tick));
        (listener, seen)
    }

    #[test]
    fn data_source_delivers_to_all_listeners_in_order() {
        let source = LatestDataSource::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _a = source.subscribe(Arc::new(move |_| first.lock().push("a")));
        let second = Arc::clone(&order);
        let _b = source.subscribe(Arc::new(move |_| second.lock().push("b")));

        source.notify(42.0);
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn cancelled_subscription_stops_receiving() {
        let source = LatestDataSource::new();
        let (listener, seen) = counting_listener();
        let mut sub = source.subscribe(listener);

        source.notify(1.0);
        sub.cancel();
        sub.cancel(); // idempotent
        source.notify(2.0);

        assert_eq!(*seen.lock(), vec![1.0]);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn dropping_subscription_detaches_listener() {
        let source = LatestDataSource::new();
        let (listener, seen) = counting_listener();
        {
            let _sub = source.subscribe(listener);
            source.notify(1.0);
        }
        source.notify(2.0);
        assert_eq!(*seen.lock(), vec![1.0]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn wall_clock_emits_periodic_ticks() {
        let clock = WallClockSource::new(Duration::from_millis(100));
        let (listener, seen) = counting_listener();
        let _sub = clock.subscribe(listener);

        clock.start();
        clock.start(); // idempotent
        tokio::time::sleep(Duration::from_millis(350)).await;
        clock.stop();

        let count = seen.lock().len();
        assert!(count >= 3, "expected at least 3 ticks, saw {count}");
    }

    #[test]
    fn source_type_display_matches_wire_names() {
        assert_eq!(TickSourceType::Clock.to_string(), "clock");
        assert_eq!(TickSourceType::Data.to_string(), "data");
    }
}

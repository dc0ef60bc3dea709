//! Testing utilities for the tempo workspace
//!
//! Shared fixtures: hand-driven tick sources that log their lifecycle, a
//! frame scheduler pumped explicitly by the test, an event recorder, and
//! canned time systems.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use tempo_conductor::{FrameScheduler, Handler};
use tempo_time::{
    Bounds, Deltas, TickFanout, TickListener, TickMetadata, TickSource, TickSourceType,
    TickSubscription, TimeSystem, TimeSystemDefaults,
};

/// Shared subscribe/unsubscribe log, so a test can assert ordering across
/// several sources (e.g. destroy-before-initialize on mode switches).
pub type SourceLog = Arc<Mutex<Vec<String>>>;

#[must_use]
pub fn source_log() -> SourceLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Tick source driven by the test, recording every subscribe/unsubscribe.
pub struct RecordingSource {
    source_type: TickSourceType,
    metadata: TickMetadata,
    fanout: TickFanout,
    log: SourceLog,
}

impl RecordingSource {
    #[must_use]
    pub fn clock() -> Self {
        Self::new(
            TickSourceType::Clock,
            TickMetadata::new(
                "manual-clock",
                "Manual Clock",
                "Clock advanced explicitly by the test.",
                "icon-clock",
            ),
        )
    }

    #[must_use]
    pub fn data() -> Self {
        Self::new(
            TickSourceType::Data,
            TickMetadata::new(
                "manual-data",
                "Manual Data",
                "Data pulse fired explicitly by the test.",
                "icon-database",
            ),
        )
    }

    #[must_use]
    pub fn new(source_type: TickSourceType, metadata: TickMetadata) -> Self {
        Self {
            source_type,
            metadata,
            fanout: TickFanout::new(),
            log: source_log(),
        }
    }

    /// Share a log with other sources to observe cross-source ordering.
    #[must_use]
    pub fn with_log(mut self, log: SourceLog) -> Self {
        self.log = log;
        self
    }

    /// Fire a tick at every listener.
    pub fn tick(&self, value: f64) {
        self.fanout.emit(value);
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.fanout.listener_count()
    }

    /// Entries look like `subscribe:manual-clock` / `unsubscribe:manual-clock`.
    #[must_use]
    pub fn log_entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl TickSource for RecordingSource {
    fn source_type(&self) -> TickSourceType {
        self.source_type
    }

    fn metadata(&self) -> &TickMetadata {
        &self.metadata
    }

    fn subscribe(&self, listener: TickListener) -> TickSubscription {
        self.log
            .lock()
            .push(format!("subscribe:{}", self.metadata.key));
        let mut inner = self.fanout.subscribe(listener);
        let log = Arc::clone(&self.log);
        let key = self.metadata.key.clone();
        TickSubscription::new(move || {
            log.lock().push(format!("unsubscribe:{key}"));
            inner.cancel();
        })
    }
}

/// Frame scheduler that queues refreshes until the test pumps them.
#[derive(Default)]
pub struct ManualFrameScheduler {
    queue: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    scheduled: AtomicUsize,
}

impl ManualFrameScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run everything scheduled so far; returns how many callbacks ran.
    pub fn pump(&self) -> usize {
        let drained: Vec<_> = std::mem::take(&mut *self.queue.lock());
        let count = drained.len();
        for callback in drained {
            callback();
        }
        count
    }

    /// Total schedule calls over this scheduler's lifetime.
    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// Callbacks queued and not yet pumped.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce() + Send>) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push(callback);
    }
}

/// Records every payload an emitter delivers.
pub struct EventRecorder<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T> Default for EventRecorder<T> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> EventRecorder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn handler(&self) -> Handler<T> {
        let events = Arc::clone(&self.events);
        Arc::new(move |payload: &T| events.lock().push(payload.clone()))
    }

    #[must_use]
    pub fn events(&self) -> Vec<T> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// UTC-based time system fixture with the given tick sources.
#[must_use]
pub fn utc_time_system(sources: Vec<Arc<dyn TickSource>>) -> Arc<TimeSystem> {
    let mut system = TimeSystem::new("utc", "UTC")
        .utc_based(true)
        .with_css_class("icon-clock")
        .with_format("utc")
        .with_format("millis")
        .with_defaults(TimeSystemDefaults {
            bounds: Bounds::new(0.0, 900_000.0),
            deltas: Deltas::new(900_000.0, 5_000.0),
        });
    for source in sources {
        system = system.with_tick_source(source);
    }
    Arc::new(system)
}

/// Relative (count-based) time system fixture with no tick sources.
#[must_use]
pub fn relative_time_system() -> Arc<TimeSystem> {
    Arc::new(
        TimeSystem::new("elapsed", "Elapsed")
            .with_format("millis")
            .with_defaults(TimeSystemDefaults {
                bounds: Bounds::new(0.0, 60_000.0),
                deltas: Deltas::new(60_000.0, 0.0),
            }),
    )
}

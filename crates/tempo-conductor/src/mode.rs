//! Conductor modes: Fixed and Follow.
//!
//! Exactly one mode is live per controller. Fixed shows a static,
//! user-edited window; Follow re-centers the window on every pulse from a
//! tick source (`realtime` follows a clock, `latest` follows data arrival).
//! Modes are constructed on switch, initialized once, and destroyed when
//! superseded; destruction detaches the tick subscription so a discarded
//! mode can never advance the conductor again.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tempo_time::{
    Deltas, TickSource, TickSourceType, TickSubscription, TimeSystem, TimeSystemDefaults,
    TimeSystemRegistry, TimeValue,
};

use crate::conductor::Conductor;

/// Identity of a conductor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKey {
    Fixed,
    Realtime,
    Latest,
}

impl ModeKey {
    /// The tick source type this mode needs, if any.
    #[must_use]
    pub fn tick_source_type(&self) -> Option<TickSourceType> {
        match self {
            ModeKey::Fixed => None,
            ModeKey::Realtime => Some(TickSourceType::Clock),
            ModeKey::Latest => Some(TickSourceType::Data),
        }
    }

    #[must_use]
    pub fn is_follow(&self) -> bool {
        self.tick_source_type().is_some()
    }
}

impl std::fmt::Display for ModeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeKey::Fixed => write!(f, "fixed"),
            ModeKey::Realtime => write!(f, "realtime"),
            ModeKey::Latest => write!(f, "latest"),
        }
    }
}

impl std::str::FromStr for ModeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(ModeKey::Fixed),
            "realtime" => Ok(ModeKey::Realtime),
            "latest" => Ok(ModeKey::Latest),
            other => Err(format!("unknown mode key: {other}")),
        }
    }
}

/// Static presentation descriptor for a mode-selection menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDescriptor {
    pub key: ModeKey,
    pub css_class: String,
    pub label: String,
    pub name: String,
    pub description: String,
    pub tick_source_type: Option<TickSourceType>,
}

/// Mode options applicable to a registry.
///
/// Fixed is always offered. Realtime and Latest are offered only when some
/// registered time system exposes a compatible tick source; absence
/// silently omits the option rather than erroring.
#[must_use]
pub fn available_modes(registry: &TimeSystemRegistry) -> IndexMap<ModeKey, ModeDescriptor> {
    let mut modes = IndexMap::new();
    modes.insert(
        ModeKey::Fixed,
        ModeDescriptor {
            key: ModeKey::Fixed,
            css_class: "icon-calendar".to_string(),
            label: "Fixed".to_string(),
            name: "Fixed Timespan Mode".to_string(),
            description: "Query and explore data that falls between two fixed datetimes."
                .to_string(),
            tick_source_type: None,
        },
    );

    if !registry.for_source_type(Some(TickSourceType::Clock)).is_empty() {
        modes.insert(
            ModeKey::Realtime,
            ModeDescriptor {
                key: ModeKey::Realtime,
                css_class: "icon-clock".to_string(),
                label: "Real-time".to_string(),
                name: "Real-time Mode".to_string(),
                description:
                    "Monitor real-time streaming data as it comes in. Displays advance with a clock."
                        .to_string(),
                tick_source_type: Some(TickSourceType::Clock),
            },
        );
    }

    if !registry.for_source_type(Some(TickSourceType::Data)).is_empty() {
        modes.insert(
            ModeKey::Latest,
            ModeDescriptor {
                key: ModeKey::Latest,
                css_class: "icon-database".to_string(),
                label: "LAD".to_string(),
                name: "LAD Mode".to_string(),
                description:
                    "Latest Available Data mode. Displays advance only when data becomes available."
                        .to_string(),
                tick_source_type: Some(TickSourceType::Data),
            },
        );
    }

    modes
}

/// Behavior variant mediating what "changing time" means.
pub trait ConductorMode: Send + Sync {
    fn key(&self) -> ModeKey;

    /// Called exactly once, after construction and tick source attachment.
    fn initialize(&mut self);

    /// Starting bounds/deltas this mode advertises for the form.
    fn defaults(&self) -> TimeSystemDefaults;

    /// Current deltas. `None` for modes that do not define them.
    fn deltas(&self) -> Option<Deltas>;

    /// Replace the deltas. Ignored by modes that do not define them;
    /// Follow re-centers the window immediately.
    fn set_deltas(&mut self, deltas: Deltas);

    fn time_system(&self) -> Arc<TimeSystem>;

    /// Re-base the mode onto a new time system, recomputing defaults.
    fn set_time_system(&mut self, time_system: Arc<TimeSystem>);

    /// Attach the pulse generator that advances this mode. Ignored by
    /// modes that do not tick; replaces any prior attachment.
    fn attach_tick_source(&mut self, source: Arc<dyn TickSource>);

    /// Detach from the tick source and conductor. Idempotent; must be
    /// called before the mode is discarded.
    fn destroy(&mut self);
}

/// Static time window; the user drives bounds through the form.
pub struct FixedMode {
    conductor: Arc<Conductor>,
    time_system: Arc<TimeSystem>,
}

impl FixedMode {
    #[must_use]
    pub fn new(conductor: Arc<Conductor>, time_system: Arc<TimeSystem>) -> Self {
        Self {
            conductor,
            time_system,
        }
    }
}

impl ConductorMode for FixedMode {
    fn key(&self) -> ModeKey {
        ModeKey::Fixed
    }

    fn initialize(&mut self) {
        // Keep whatever window the conductor already shows; re-basing onto
        // a time system's default window happens on time system switches.
        debug!(mode = %self.key(), "mode initialized");
    }

    fn defaults(&self) -> TimeSystemDefaults {
        self.time_system.defaults()
    }

    fn deltas(&self) -> Option<Deltas> {
        None
    }

    fn set_deltas(&mut self, _deltas: Deltas) {}

    fn time_system(&self) -> Arc<TimeSystem> {
        Arc::clone(&self.time_system)
    }

    fn set_time_system(&mut self, time_system: Arc<TimeSystem>) {
        let bounds = time_system.defaults().bounds;
        self.time_system = Arc::clone(&time_system);
        // Trusted defaults: a registered time system cannot carry an
        // unordered default window.
        let _ = self.conductor.set_time_system(time_system, Some(bounds));
    }

    fn attach_tick_source(&mut self, _source: Arc<dyn TickSource>) {}

    fn destroy(&mut self) {}
}

/// Tick-driven window: `[tick - start_delta, tick + end_delta]`.
pub struct FollowMode {
    key: ModeKey,
    conductor: Arc<Conductor>,
    time_system: Arc<TimeSystem>,
    deltas: Arc<RwLock<Deltas>>,
    last_tick: Arc<RwLock<Option<TimeValue>>>,
    subscription: Option<TickSubscription>,
}

impl FollowMode {
    #[must_use]
    pub fn new(key: ModeKey, conductor: Arc<Conductor>, time_system: Arc<TimeSystem>) -> Self {
        let deltas = time_system.defaults().deltas;
        Self {
            key,
            conductor,
            time_system,
            deltas: Arc::new(RwLock::new(deltas)),
            last_tick: Arc::new(RwLock::new(None)),
            subscription: None,
        }
    }

    /// Re-center the conductor's window on `tick` using the current deltas.
    fn recenter(&self, tick: TimeValue) {
        let bounds = self.deltas.read().around(tick);
        // Non-negative deltas keep start <= end, so this cannot fail
        // validation; a non-finite tick is declined like any other.
        let _ = self.conductor.set_bounds(bounds);
    }
}

impl ConductorMode for FollowMode {
    fn key(&self) -> ModeKey {
        self.key
    }

    fn initialize(&mut self) {
        // Derive the starting window from the last tick when the source has
        // already fired, otherwise anchor on the trailing edge of the
        // current window until the first pulse arrives.
        let anchor = self
            .last_tick
            .read()
            .unwrap_or_else(|| self.conductor.bounds().end);
        self.recenter(anchor);
        debug!(mode = %self.key, "mode initialized");
    }

    fn defaults(&self) -> TimeSystemDefaults {
        self.time_system.defaults()
    }

    fn deltas(&self) -> Option<Deltas> {
        Some(*self.deltas.read())
    }

    fn set_deltas(&mut self, deltas: Deltas) {
        *self.deltas.write() = deltas;
        let anchor = self
            .last_tick
            .read()
            .unwrap_or_else(|| self.conductor.bounds().end);
        self.recenter(anchor);
    }

    fn time_system(&self) -> Arc<TimeSystem> {
        Arc::clone(&self.time_system)
    }

    fn set_time_system(&mut self, time_system: Arc<TimeSystem>) {
        *self.deltas.write() = time_system.defaults().deltas;
        self.time_system = Arc::clone(&time_system);
        let _ = self.conductor.set_time_system(time_system, None);
        let anchor = self
            .last_tick
            .read()
            .unwrap_or_else(|| self.conductor.bounds().end);
        self.recenter(anchor);
    }

    fn attach_tick_source(&mut self, source: Arc<dyn TickSource>) {
        // Detach any prior source before the new one starts delivering.
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }

        let conductor = Arc::clone(&self.conductor);
        let deltas = Arc::clone(&self.deltas);
        let last_tick = Arc::clone(&self.last_tick);
        let subscription = source.subscribe(Arc::new(move |tick| {
            *last_tick.write() = Some(tick);
            let bounds = deltas.read().around(tick);
            let _ = conductor.set_bounds(bounds);
        }));

        debug!(mode = %self.key, source = source.metadata().key, "tick source attached");
        self.subscription = Some(subscription);
    }

    fn destroy(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
            debug!(mode = %self.key, "mode destroyed");
        }
    }
}

impl Drop for FollowMode {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_time::{Bounds, LatestDataSource};

    fn data_system() -> Arc<TimeSystem> {
        Arc::new(
            TimeSystem::new("lad", "Latest Data")
                .with_format("millis")
                .with_defaults(TimeSystemDefaults {
                    bounds: Bounds::new(0.0, 1000.0),
                    deltas: Deltas::new(1000.0, 0.0),
                })
                .with_tick_source(Arc::new(LatestDataSource::new())),
        )
    }

    #[test]
    fn follow_mode_recenters_on_tick() {
        let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 1000.0)));
        let source = Arc::new(LatestDataSource::new());
        let system = Arc::new(
            TimeSystem::new("lad", "Latest Data")
                .with_format("millis")
                .with_defaults(TimeSystemDefaults {
                    bounds: Bounds::new(0.0, 1000.0),
                    deltas: Deltas::new(1000.0, 0.0),
                })
                .with_tick_source(source.clone()),
        );

        let mut mode = FollowMode::new(ModeKey::Latest, Arc::clone(&conductor), system);
        mode.attach_tick_source(source.clone());
        mode.initialize();

        source.notify(10_000.0);
        assert_eq!(conductor.bounds(), Bounds::new(9_000.0, 10_000.0));

        mode.set_deltas(Deltas::new(500.0, 250.0));
        assert_eq!(conductor.bounds(), Bounds::new(9_500.0, 10_250.0));
    }

    #[test]
    fn destroy_is_idempotent_and_detaches() {
        let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 1000.0)));
        let source = Arc::new(LatestDataSource::new());
        let system = Arc::new(
            TimeSystem::new("lad", "Latest Data")
                .with_format("millis")
                .with_tick_source(source.clone()),
        );

        let mut mode = FollowMode::new(ModeKey::Latest, Arc::clone(&conductor), system);
        mode.attach_tick_source(source.clone());
        assert_eq!(source.listener_count(), 1);

        mode.destroy();
        mode.destroy();
        assert_eq!(source.listener_count(), 0);

        // Ticks after destruction no longer move the conductor.
        let before = conductor.bounds();
        source.notify(99_999.0);
        assert_eq!(conductor.bounds(), before);
    }

    #[test]
    fn fixed_mode_defines_no_deltas() {
        let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 1000.0)));
        let system = data_system();
        let mut mode = FixedMode::new(conductor, system);
        assert_eq!(mode.deltas(), None);
        mode.set_deltas(Deltas::new(1.0, 2.0));
        assert_eq!(mode.deltas(), None);
    }

    #[test]
    fn fixed_mode_rebases_bounds_on_time_system_switch() {
        let conductor = Arc::new(Conductor::new(Bounds::new(5.0, 6.0)));
        let system = data_system();
        let mut mode = FixedMode::new(Arc::clone(&conductor), system.clone());

        mode.initialize();
        assert_eq!(conductor.bounds(), Bounds::new(5.0, 6.0));

        mode.set_time_system(system);
        assert_eq!(conductor.bounds(), Bounds::new(0.0, 1000.0));
    }

    #[test]
    fn mode_key_round_trips_through_str() {
        for key in [ModeKey::Fixed, ModeKey::Realtime, ModeKey::Latest] {
            assert_eq!(key.to_string().parse::<ModeKey>().unwrap(), key);
        }
        assert!("legacy".parse::<ModeKey>().is_err());
    }

    #[test]
    fn available_modes_reflect_registry_sources() {
        let mut registry = TimeSystemRegistry::new();
        registry.register(data_system());

        let modes = available_modes(&registry);
        assert!(modes.contains_key(&ModeKey::Fixed));
        assert!(!modes.contains_key(&ModeKey::Realtime));
        assert!(modes.contains_key(&ModeKey::Latest));
    }
}

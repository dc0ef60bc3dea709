//! The conductor: single owner of the shared time window.
//!
//! One conductor exists per application instance. All views read through it
//! and mutate only via its setters, which validate and then emit. Event
//! surfaces: `bounds`, `time_system`, `follow` for canonical state, plus
//! `pan`, `pan_stop`, `zoom` relayed between views during gestures.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use tempo_time::{validate_bounds, Bounds, TimeSystem, ValidationError};

use crate::emitter::{Emitter, Handler, Subscription};

struct ConductorState {
    bounds: Bounds,
    time_system: Option<Arc<TimeSystem>>,
    follow: bool,
}

/// Canonical time-window state plus its event surfaces.
pub struct Conductor {
    state: RwLock<ConductorState>,
    bounds_events: Emitter<Bounds>,
    time_system_events: Emitter<Arc<TimeSystem>>,
    follow_events: Emitter<bool>,
    pan_events: Emitter<Bounds>,
    pan_stop_events: Emitter<()>,
    zoom_events: Emitter<Bounds>,
}

impl Conductor {
    /// Create a conductor with an initial window. The initial bounds are
    /// trusted (they come from configuration, not user input).
    #[must_use]
    pub fn new(initial_bounds: Bounds) -> Self {
        Self {
            state: RwLock::new(ConductorState {
                bounds: initial_bounds,
                time_system: None,
                follow: false,
            }),
            bounds_events: Emitter::new(),
            time_system_events: Emitter::new(),
            follow_events: Emitter::new(),
            pan_events: Emitter::new(),
            pan_stop_events: Emitter::new(),
            zoom_events: Emitter::new(),
        }
    }

    /// The displayed time window.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.state.read().bounds
    }

    /// Validate-then-commit a new time window. Emits `bounds` on success;
    /// on failure the prior window stays in place and nothing is emitted.
    pub fn set_bounds(&self, bounds: Bounds) -> Result<(), ValidationError> {
        validate_bounds(&bounds)?;
        {
            let mut state = self.state.write();
            state.bounds = bounds;
        }
        trace!(start = bounds.start, end = bounds.end, "bounds committed");
        self.bounds_events.emit(&bounds);
        Ok(())
    }

    /// Validation without commit, for callers probing form input.
    #[must_use]
    pub fn validate_bounds(&self, bounds: &Bounds) -> bool {
        validate_bounds(bounds).is_ok()
    }

    #[must_use]
    pub fn time_system(&self) -> Option<Arc<TimeSystem>> {
        self.state.read().time_system.clone()
    }

    /// Switch the time basis, optionally with the bounds that apply in the
    /// new system. Emits `time_system`, then `bounds` if bounds were given.
    pub fn set_time_system(
        &self,
        time_system: Arc<TimeSystem>,
        bounds: Option<Bounds>,
    ) -> Result<(), ValidationError> {
        if let Some(bounds) = bounds {
            validate_bounds(&bounds)?;
        }
        {
            let mut state = self.state.write();
            state.time_system = Some(Arc::clone(&time_system));
        }
        debug!(time_system = time_system.key(), "time system changed");
        self.time_system_events.emit(&time_system);
        if let Some(bounds) = bounds {
            self.set_bounds(bounds)?;
        }
        Ok(())
    }

    /// Whether the window is currently advancing under a tick source.
    #[must_use]
    pub fn follow(&self) -> bool {
        self.state.read().follow
    }

    pub fn set_follow(&self, follow: bool) {
        {
            let mut state = self.state.write();
            if state.follow == follow {
                return;
            }
            state.follow = follow;
        }
        debug!(follow, "follow flag changed");
        self.follow_events.emit(&follow);
    }

    pub fn on_bounds(&self, handler: Handler<Bounds>) -> Subscription {
        self.bounds_events.subscribe(handler)
    }

    pub fn on_time_system(&self, handler: Handler<Arc<TimeSystem>>) -> Subscription {
        self.time_system_events.subscribe(handler)
    }

    pub fn on_follow(&self, handler: Handler<bool>) -> Subscription {
        self.follow_events.subscribe(handler)
    }

    /// Relay a pan gesture's provisional bounds to other views.
    pub fn emit_pan(&self, provisional: Bounds) {
        self.pan_events.emit(&provisional);
    }

    pub fn on_pan(&self, handler: Handler<Bounds>) -> Subscription {
        self.pan_events.subscribe(handler)
    }

    pub fn emit_pan_stop(&self) {
        self.pan_stop_events.emit(&());
    }

    pub fn on_pan_stop(&self, handler: Handler<()>) -> Subscription {
        self.pan_stop_events.subscribe(handler)
    }

    /// Relay provisional zoom bounds to other views.
    pub fn emit_zoom(&self, provisional: Bounds) {
        self.zoom_events.emit(&provisional);
    }

    pub fn on_zoom(&self, handler: Handler<Bounds>) -> Subscription {
        self.zoom_events.subscribe(handler)
    }
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Conductor")
            .field("bounds", &state.bounds)
            .field(
                "time_system",
                &state.time_system.as_ref().map(|ts| ts.key().to_string()),
            )
            .field("follow", &state.follow)
            .finish()
    }
}

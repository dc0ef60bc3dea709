//! The controller: keeps conductor bounds, the active mode, and the form
//! model consistent under every kind of input.
//!
//! Inputs arrive five ways: conductor events, form edits, mode switches,
//! time system switches, and tick source pulses. The controller validates
//! before committing so a transient invalid state never reaches the
//! conductor, and coalesces bounds notifications so rapid ticks cost at
//! most one scheduled refresh per frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use tempo_time::{
    parse_deltas, Bounds, TickSourceType, TimeError, TimeSystem, TimeSystemRegistry,
};

use crate::conductor::Conductor;
use crate::emitter::{Emitter, Handler, Subscription};
use crate::error::ConductorError;
use crate::form::{derive_form, FormModel, ModeModel, TimeSystemModel};
use crate::frame::{FrameScheduler, RefreshGate};
use crate::mode::{available_modes, ConductorMode, FixedMode, FollowMode, ModeDescriptor, ModeKey};

/// Form-and-refresh state shared with the conductor event handlers.
///
/// Split out of the controller so the bounds handler captures only what it
/// needs: the form, the coalescing gate, and the scheduler.
struct ViewSync {
    form: RwLock<FormModel>,
    gate: RefreshGate,
    scheduler: Arc<dyn FrameScheduler>,
    refresh_events: Emitter<()>,
}

impl ViewSync {
    /// Conductor bounds changed: mirror into the form and schedule at most
    /// one refresh per frame.
    fn bounds_changed(this: &Arc<Self>, bounds: Bounds) {
        {
            let mut form = this.form.write();
            form.start = bounds.start;
            form.end = bounds.end;
        }
        if this.gate.try_arm() {
            let view = Arc::clone(this);
            this.scheduler.schedule(Box::new(move || {
                view.gate.release();
                view.refresh_events.emit(&());
            }));
        }
    }

    fn follow_changed(&self, follow: bool) {
        self.form.write().follow = follow;
    }
}

/// Orchestrates mode switches, time system switches, and form/model
/// synchronization over one conductor.
pub struct TimeConductorController {
    conductor: Arc<Conductor>,
    registry: TimeSystemRegistry,
    modes: IndexMap<ModeKey, ModeDescriptor>,
    active: Mutex<Option<Box<dyn ConductorMode>>>,
    view: Arc<ViewSync>,
    mode_epoch: AtomicU64,
    _subscriptions: Vec<Subscription>,
}

impl TimeConductorController {
    /// Wire a controller over a conductor and a populated registry.
    ///
    /// Subscribes to conductor `bounds`/`follow`, builds the mode options
    /// applicable to the registry, and activates Fixed mode.
    pub fn new(
        conductor: Arc<Conductor>,
        registry: TimeSystemRegistry,
        scheduler: Arc<dyn FrameScheduler>,
    ) -> Result<Self, ConductorError> {
        if registry.is_empty() {
            return Err(ConductorError::EmptyRegistry);
        }

        let modes = available_modes(&registry);
        let bounds = conductor.bounds();
        let form = FormModel {
            start: bounds.start,
            end: bounds.end,
            start_delta: "0".to_string(),
            end_delta: "0".to_string(),
            follow: conductor.follow(),
            time_system: TimeSystemModel::default(),
            mode: ModeModel {
                selected_key: ModeKey::Fixed,
                options: modes.values().cloned().collect(),
            },
        };

        let view = Arc::new(ViewSync {
            form: RwLock::new(form),
            gate: RefreshGate::default(),
            scheduler,
            refresh_events: Emitter::new(),
        });

        let bounds_view = Arc::clone(&view);
        let bounds_sub = conductor.on_bounds(Arc::new(move |bounds| {
            ViewSync::bounds_changed(&bounds_view, *bounds);
        }));
        let follow_view = Arc::clone(&view);
        let follow_sub = conductor.on_follow(Arc::new(move |follow| {
            follow_view.follow_changed(*follow);
        }));

        let controller = Self {
            conductor,
            registry,
            modes,
            active: Mutex::new(None),
            view,
            mode_epoch: AtomicU64::new(0),
            _subscriptions: vec![bounds_sub, follow_sub],
        };

        // Default to fixed mode, as a fresh conductor has no mode yet.
        controller.set_mode(ModeKey::Fixed, None)?;
        Ok(controller)
    }

    #[inline]
    #[must_use]
    pub fn conductor(&self) -> &Arc<Conductor> {
        &self.conductor
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TimeSystemRegistry {
        &self.registry
    }

    /// Mode options applicable to this controller's registry.
    #[must_use]
    pub fn modes(&self) -> Vec<ModeDescriptor> {
        self.modes.values().cloned().collect()
    }

    /// Snapshot of the form the presentation layer binds to.
    #[must_use]
    pub fn form(&self) -> FormModel {
        self.view.form.read().clone()
    }

    /// Key of the live mode.
    #[must_use]
    pub fn active_mode_key(&self) -> Option<ModeKey> {
        self.active.lock().as_ref().map(|mode| mode.key())
    }

    /// Incremented every time a mode is constructed; a stable value across
    /// an operation proves no destroy/initialize pair fired.
    #[must_use]
    pub fn mode_epoch(&self) -> u64 {
        self.mode_epoch.load(Ordering::Relaxed)
    }

    /// Register a handler for coalesced refresh notifications.
    pub fn on_refresh(&self, handler: Handler<()>) -> Subscription {
        self.view.refresh_events.subscribe(handler)
    }

    /// Whether a scheduled refresh is still outstanding.
    #[must_use]
    pub fn refresh_pending(&self) -> bool {
        self.view.gate.is_pending()
    }

    /// Rebuild a complete form projection from live state.
    #[must_use]
    pub fn derived_form(&self) -> FormModel {
        let active = self.active.lock();
        match active.as_ref() {
            Some(mode) => derive_form(
                &self.conductor,
                mode.as_ref(),
                self.modes.values().cloned().collect(),
                self.view.form.read().time_system.options.clone(),
            ),
            None => self.form(),
        }
    }

    /// Conductor bounds changed: mirror into the form, coalescing refresh
    /// notifications to one per frame. This is the conductor-to-form
    /// direction; it never writes back to the conductor.
    pub fn set_bounds(&self, bounds: Bounds) {
        ViewSync::bounds_changed(&self.view, bounds);
    }

    /// The user edited the bounds fields. Validates and, only on success,
    /// writes through to the conductor; the conductor's `bounds` event then
    /// feeds [`TimeConductorController::set_bounds`] again, which is
    /// idempotent for equal values.
    pub fn update_bounds_from_form(&self, form: &FormModel) -> Result<(), ConductorError> {
        let bounds = Bounds::new(form.start, form.end);
        self.conductor.set_bounds(bounds)?;
        Ok(())
    }

    /// The user edited the delta fields. For modes without deltas this is a
    /// no-op; otherwise the raw text is parsed as floats, validated, and
    /// committed onto the active mode.
    pub fn update_deltas_from_form(&self, form: &FormModel) -> Result<(), ConductorError> {
        let mut active = self.active.lock();
        let Some(mode) = active.as_mut() else {
            return Ok(());
        };
        if mode.deltas().is_none() {
            return Ok(());
        }

        let deltas = parse_deltas(&form.start_delta, &form.end_delta)?;
        mode.set_deltas(deltas);
        self.view.form.write().seed_deltas(Some(deltas));
        Ok(())
    }

    /// Switch the conductor mode.
    ///
    /// A no-op when the keys are equal or the requested mode is already
    /// live (watchers refire). Otherwise the outgoing mode is destroyed
    /// before the replacement initializes, the previously selected time
    /// system is retained when still compatible (first compatible system
    /// otherwise), tick sources are attached for Follow variants, and the
    /// form is reseeded from the new mode's defaults.
    pub fn set_mode(&self, new_key: ModeKey, old_key: Option<ModeKey>) -> Result<(), ConductorError> {
        if old_key == Some(new_key) {
            return Ok(());
        }
        let mut active = self.active.lock();
        if active.as_ref().map(|mode| mode.key()) == Some(new_key) {
            return Ok(());
        }

        let descriptor = self
            .modes
            .get(&new_key)
            .cloned()
            .ok_or(ConductorError::ModeUnavailable(new_key))?;
        let tick_type = descriptor.tick_source_type;
        debug!(from = ?old_key, to = %new_key, "mode switch");

        self.view.form.write().mode.selected_key = new_key;

        // The outgoing mode must be fully detached before the replacement
        // attaches its own listeners.
        if let Some(mut outgoing) = active.take() {
            outgoing.destroy();
        }

        let candidates = self.registry.for_source_type(tick_type);
        let selected_key = self
            .view
            .form
            .read()
            .time_system
            .selected
            .as_ref()
            .map(|descriptor| descriptor.key.clone());
        let time_system = candidates
            .iter()
            .find(|system| Some(system.key()) == selected_key.as_deref())
            .or_else(|| candidates.first())
            .cloned()
            .ok_or(ConductorError::ModeUnavailable(new_key))?;

        let mut mode: Box<dyn ConductorMode> = match new_key {
            ModeKey::Fixed => Box::new(FixedMode::new(
                Arc::clone(&self.conductor),
                Arc::clone(&time_system),
            )),
            follow_key => {
                let mut follow = FollowMode::new(
                    follow_key,
                    Arc::clone(&self.conductor),
                    Arc::clone(&time_system),
                );
                if let Some(tick_type) = tick_type {
                    follow.attach_tick_source(Self::tick_source(&time_system, tick_type)?);
                }
                Box::new(follow)
            }
        };
        mode.initialize();
        self.mode_epoch.fetch_add(1, Ordering::Relaxed);

        {
            let mut form = self.view.form.write();
            form.seed_deltas(mode.deltas());
            form.time_system.options = candidates
                .iter()
                .map(|system| system.descriptor())
                .collect();
        }

        self.conductor.set_follow(new_key.is_follow());
        *active = Some(mode);

        // Reconcile format and deltas unless the retained time system is
        // already the selected one.
        if selected_key.as_deref() != Some(time_system.key()) {
            if let Some(mode) = active.as_mut() {
                self.apply_time_system(mode, time_system)?;
            }
        }
        Ok(())
    }

    /// Switch the time basis. A no-op when the requested system is already
    /// selected; otherwise the active mode is re-based, display and delta
    /// formats refresh, deltas reseed from the recomputed defaults, and
    /// ticking modes reattach a source from the new system.
    pub fn set_time_system(&self, time_system: Arc<TimeSystem>) -> Result<(), ConductorError> {
        let selected = self
            .view
            .form
            .read()
            .time_system
            .selected
            .as_ref()
            .map(|descriptor| descriptor.key.clone());
        if selected.as_deref() == Some(time_system.key()) {
            return Ok(());
        }

        let mut active = self.active.lock();
        let Some(mode) = active.as_mut() else {
            return Ok(());
        };
        self.apply_time_system(mode, time_system)
    }

    /// Resolve a time system by key and delegate to
    /// [`TimeConductorController::set_time_system`].
    pub fn select_time_system_by_key(&self, key: &str) -> Result<(), ConductorError> {
        let time_system = self.registry.get(key)?;
        self.set_time_system(time_system)
    }

    /// Registered time systems compatible with a tick source type; all of
    /// them when no type is given.
    #[must_use]
    pub fn time_systems_for_source_type(
        &self,
        source_type: Option<TickSourceType>,
    ) -> Vec<Arc<TimeSystem>> {
        self.registry.for_source_type(source_type)
    }

    fn tick_source(
        time_system: &Arc<TimeSystem>,
        source_type: TickSourceType,
    ) -> Result<Arc<dyn tempo_time::TickSource>, ConductorError> {
        time_system
            .tick_source_of_type(source_type)
            .ok_or_else(|| {
                ConductorError::Time(TimeError::NoTickSource {
                    system: time_system.key().to_string(),
                    source_type: source_type.to_string(),
                })
            })
    }

    /// Push a time system into the active mode and resynchronize the form.
    /// Caller holds the active-mode lock and has ruled out the no-op case.
    fn apply_time_system(
        &self,
        mode: &mut Box<dyn ConductorMode>,
        time_system: Arc<TimeSystem>,
    ) -> Result<(), ConductorError> {
        // Resolve the tick source up front: a ticking mode must never be
        // re-based onto a system it cannot follow.
        let tick_source = match mode.key().tick_source_type() {
            Some(source_type) => Some(Self::tick_source(&time_system, source_type)?),
            None => None,
        };

        debug!(time_system = time_system.key(), mode = %mode.key(), "time system switch");
        mode.set_time_system(Arc::clone(&time_system));

        {
            let mut form = self.view.form.write();
            form.time_system.selected = Some(time_system.descriptor());
            form.time_system.format = time_system.default_format().to_string();
            form.time_system.delta_format = time_system.delta_format().to_string();
            form.seed_deltas(mode.deltas());
        }

        if let Some(source) = tick_source {
            mode.attach_tick_source(source);
        }
        Ok(())
    }
}

impl std::fmt::Debug for TimeConductorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeConductorController")
            .field("modes", &self.modes.keys().collect::<Vec<_>>())
            .field("active", &self.active_mode_key())
            .field("mode_epoch", &self.mode_epoch())
            .finish()
    }
}

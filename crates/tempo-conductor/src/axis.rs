//! Headless time axis: pixel/time scaling plus pan and zoom gestures.
//!
//! Tracks the conductor's window against a viewport width and converts pan
//! gestures from pixels into provisional bounds. Provisional bounds are
//! relayed over the conductor's `pan`/`zoom` surfaces while the gesture is
//! in flight and committed through the validated setter on `pan_stop`.
//! Rendering (tick marks, labels) is a presentation concern and lives
//! elsewhere.

use std::sync::Arc;

use parking_lot::Mutex;

use tempo_time::Bounds;

use crate::conductor::Conductor;
use crate::emitter::Subscription;

struct AxisState {
    bounds: Bounds,
    width_px: f64,
    ms_per_pixel: f64,
}

impl AxisState {
    fn rescale(&mut self) {
        if self.width_px > 0.0 {
            self.ms_per_pixel = self.bounds.span() / self.width_px;
        }
    }
}

/// Scale state for one horizontal time axis.
pub struct TimeAxis {
    conductor: Arc<Conductor>,
    state: Arc<Mutex<AxisState>>,
    _subscription: Subscription,
}

impl TimeAxis {
    #[must_use]
    pub fn new(conductor: Arc<Conductor>, width_px: f64) -> Self {
        let mut initial = AxisState {
            bounds: conductor.bounds(),
            width_px,
            ms_per_pixel: 0.0,
        };
        initial.rescale();
        let state = Arc::new(Mutex::new(initial));

        let axis_state = Arc::clone(&state);
        let subscription = conductor.on_bounds(Arc::new(move |bounds| {
            let mut state = axis_state.lock();
            state.bounds = *bounds;
            state.rescale();
        }));

        Self {
            conductor,
            state,
            _subscription: subscription,
        }
    }

    /// The axis's current (possibly provisional) window.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.state.lock().bounds
    }

    #[must_use]
    pub fn ms_per_pixel(&self) -> f64 {
        self.state.lock().ms_per_pixel
    }

    /// Viewport width changed; recompute the scale.
    pub fn resize(&self, width_px: f64) {
        let mut state = self.state.lock();
        state.width_px = width_px;
        state.rescale();
    }

    /// Drag gesture: shift the provisional window by a pixel delta.
    ///
    /// Suppressed while the conductor follows a tick source. Provisional
    /// bounds snap to whole seconds and are relayed on the `pan` surface
    /// without touching canonical state; returns the provisional window.
    pub fn pan(&self, delta_px: f64) -> Option<Bounds> {
        if self.conductor.follow() {
            return None;
        }

        let provisional = {
            let mut state = self.state.lock();
            let delta_ms = delta_px * state.ms_per_pixel;
            let provisional = Bounds {
                start: ((state.bounds.start - delta_ms) / 1000.0).floor() * 1000.0,
                end: ((state.bounds.end - delta_ms) / 1000.0).floor() * 1000.0,
            };
            state.bounds = provisional;
            state.rescale();
            provisional
        };

        self.conductor.emit_pan(provisional);
        Some(provisional)
    }

    /// Gesture ended: resynchronize the conductor with the panned window.
    pub fn pan_stop(&self) {
        let bounds = self.bounds();
        let _ = self.conductor.set_bounds(bounds);
        self.conductor.emit_pan_stop();
    }

    /// Adopt provisional zoom bounds and relay them on the `zoom` surface.
    pub fn zoom(&self, bounds: Bounds) {
        {
            let mut state = self.state.lock();
            state.bounds = bounds;
            state.rescale();
        }
        self.conductor.emit_zoom(bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_tracks_conductor_bounds() {
        let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 10_000.0)));
        let axis = TimeAxis::new(Arc::clone(&conductor), 1000.0);
        assert_eq!(axis.ms_per_pixel(), 10.0);

        conductor.set_bounds(Bounds::new(0.0, 20_000.0)).unwrap();
        assert_eq!(axis.ms_per_pixel(), 20.0);

        axis.resize(2000.0);
        assert_eq!(axis.ms_per_pixel(), 10.0);
    }

    #[test]
    fn pan_produces_snapped_provisional_bounds() {
        let conductor = Arc::new(Conductor::new(Bounds::new(10_000.0, 20_000.0)));
        let axis = TimeAxis::new(Arc::clone(&conductor), 1000.0);

        // 10 ms/px; dragging left 150 px shifts the window +1500 ms,
        // snapped down to the whole second.
        let provisional = axis.pan(-150.0).unwrap();
        assert_eq!(provisional, Bounds::new(11_000.0, 21_000.0));

        // Canonical state is untouched until the gesture ends.
        assert_eq!(conductor.bounds(), Bounds::new(10_000.0, 20_000.0));

        axis.pan_stop();
        assert_eq!(conductor.bounds(), Bounds::new(11_000.0, 21_000.0));
    }

    #[test]
    fn pan_is_suppressed_while_following() {
        let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 10_000.0)));
        conductor.set_follow(true);
        let axis = TimeAxis::new(Arc::clone(&conductor), 1000.0);
        assert_eq!(axis.pan(-50.0), None);
    }

    #[test]
    fn zoom_relays_provisional_bounds() {
        let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 10_000.0)));
        let axis = TimeAxis::new(Arc::clone(&conductor), 1000.0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = conductor.on_zoom(Arc::new(move |bounds| sink.lock().push(*bounds)));

        axis.zoom(Bounds::new(2_000.0, 8_000.0));
        assert_eq!(*seen.lock(), vec![Bounds::new(2_000.0, 8_000.0)]);
        assert_eq!(axis.ms_per_pixel(), 6.0);
    }
}

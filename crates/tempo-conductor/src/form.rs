//! The UI-facing projection of conductor + mode state.
//!
//! The form is never the source of truth. It is derived from the conductor
//! in one direction ([`derive_form`]) and reconciled back through the
//! controller's validated commit operations in the other. Delta fields stay
//! raw text: the single parse happens at the commit boundary.

use serde::{Deserialize, Serialize};

use tempo_time::{Deltas, TimeSystemDescriptor, TimeValue};

use crate::conductor::Conductor;
use crate::mode::{ConductorMode, ModeDescriptor, ModeKey};

/// Time system selection state for the form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeSystemModel {
    pub selected: Option<TimeSystemDescriptor>,
    /// Default display format key of the selected system.
    pub format: String,
    pub delta_format: String,
    pub options: Vec<TimeSystemDescriptor>,
}

/// Mode selection state for the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeModel {
    pub selected_key: ModeKey,
    pub options: Vec<ModeDescriptor>,
}

/// The complete form state a presentation layer binds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormModel {
    pub start: TimeValue,
    pub end: TimeValue,
    /// Raw text of the start-delta field, parsed as a float on commit.
    pub start_delta: String,
    pub end_delta: String,
    pub follow: bool,
    pub time_system: TimeSystemModel,
    pub mode: ModeModel,
}

impl FormModel {
    /// Write a mode's advertised deltas into the delta fields; modes
    /// without deltas zero them out.
    pub fn seed_deltas(&mut self, deltas: Option<Deltas>) {
        match deltas {
            Some(deltas) => {
                self.start_delta = deltas.start.to_string();
                self.end_delta = deltas.end.to_string();
            }
            None => {
                self.start_delta = "0".to_string();
                self.end_delta = "0".to_string();
            }
        }
    }
}

/// Project conductor + mode state into a fresh form.
#[must_use]
pub fn derive_form(
    conductor: &Conductor,
    mode: &dyn ConductorMode,
    mode_options: Vec<ModeDescriptor>,
    time_system_options: Vec<TimeSystemDescriptor>,
) -> FormModel {
    let bounds = conductor.bounds();
    let time_system = mode.time_system();

    let mut form = FormModel {
        start: bounds.start,
        end: bounds.end,
        start_delta: "0".to_string(),
        end_delta: "0".to_string(),
        follow: conductor.follow(),
        time_system: TimeSystemModel {
            selected: Some(time_system.descriptor()),
            format: time_system.default_format().to_string(),
            delta_format: time_system.delta_format().to_string(),
            options: time_system_options,
        },
        mode: ModeModel {
            selected_key: mode.key(),
            options: mode_options,
        },
    };
    form.seed_deltas(mode.deltas());
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::FixedMode;
    use std::sync::Arc;
    use tempo_time::{Bounds, TimeSystem};

    #[test]
    fn derive_form_projects_conductor_state() {
        let conductor = Arc::new(Conductor::new(Bounds::new(100.0, 200.0)));
        let system = Arc::new(TimeSystem::new("utc", "UTC").with_format("utc"));
        let mode = FixedMode::new(Arc::clone(&conductor), system.clone());

        let form = derive_form(&conductor, &mode, Vec::new(), vec![system.descriptor()]);

        assert_eq!(form.start, 100.0);
        assert_eq!(form.end, 200.0);
        assert_eq!(form.mode.selected_key, ModeKey::Fixed);
        assert_eq!(form.start_delta, "0");
        assert_eq!(form.time_system.format, "utc");
        assert_eq!(form.time_system.selected.unwrap().key, "utc");
    }

    #[test]
    fn seed_deltas_renders_numbers_as_text() {
        let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 1.0)));
        let system = Arc::new(TimeSystem::new("utc", "UTC"));
        let mode = FixedMode::new(conductor.clone(), system);
        let mut form = derive_form(&conductor, &mode, Vec::new(), Vec::new());

        form.seed_deltas(Some(Deltas::new(900_000.0, 0.0)));
        assert_eq!(form.start_delta, "900000");
        assert_eq!(form.end_delta, "0");

        form.seed_deltas(None);
        assert_eq!(form.start_delta, "0");
    }
}

use std::sync::Arc;

use pretty_assertions::assert_eq;

use tempo_conductor::{Conductor, ModeKey, TimeConductorController};
use tempo_time::{Bounds, TickSourceType, TimeSystemRegistry};
use tempo_test_utils::{
    relative_time_system, utc_time_system, EventRecorder, ManualFrameScheduler, RecordingSource,
};

struct Rig {
    controller: TimeConductorController,
    conductor: Arc<Conductor>,
    clock: Arc<RecordingSource>,
    scheduler: Arc<ManualFrameScheduler>,
}

/// Registry with one UTC system carrying a manual clock source, plus a
/// relative system with no sources.
fn clock_rig() -> Rig {
    let clock = Arc::new(RecordingSource::clock());
    let mut registry = TimeSystemRegistry::new();
    registry.register(utc_time_system(vec![clock.clone()]));
    registry.register(relative_time_system());

    let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 900_000.0)));
    let scheduler = Arc::new(ManualFrameScheduler::new());
    let controller = TimeConductorController::new(
        Arc::clone(&conductor),
        registry,
        scheduler.clone(),
    )
    .unwrap();
    // Drain the refresh scheduled by initial mode activation.
    scheduler.pump();

    Rig {
        controller,
        conductor,
        clock,
        scheduler,
    }
}

#[test]
fn construction_defaults_to_fixed_mode() {
    let rig = clock_rig();
    assert_eq!(rig.controller.active_mode_key(), Some(ModeKey::Fixed));
    assert!(!rig.conductor.follow());

    let form = rig.controller.form();
    assert_eq!(form.mode.selected_key, ModeKey::Fixed);
    assert_eq!(form.time_system.selected.unwrap().key, "utc");
    assert_eq!(form.time_system.format, "utc");
    assert_eq!(form.time_system.delta_format, "duration");
}

#[test]
fn modes_reflect_available_tick_sources() {
    // Clock source only: fixed and realtime, no latest.
    let rig = clock_rig();
    let keys: Vec<ModeKey> = rig.controller.modes().iter().map(|m| m.key).collect();
    assert_eq!(keys, vec![ModeKey::Fixed, ModeKey::Realtime]);
}

#[test]
fn update_bounds_from_form_writes_through_once() {
    let rig = clock_rig();
    let bounds_seen = EventRecorder::<Bounds>::new();
    let _sub = rig.conductor.on_bounds(bounds_seen.handler());

    let mut form = rig.controller.form();
    form.start = 100_000.0;
    form.end = 200_000.0;

    rig.controller.update_bounds_from_form(&form).unwrap();
    assert_eq!(rig.conductor.bounds(), Bounds::new(100_000.0, 200_000.0));
    assert_eq!(bounds_seen.count(), 1);

    // Idempotent feedback loop: committing the identical form again
    // produces the same bounds and exactly one more emission.
    rig.controller.update_bounds_from_form(&form).unwrap();
    assert_eq!(rig.conductor.bounds(), Bounds::new(100_000.0, 200_000.0));
    assert_eq!(bounds_seen.count(), 2);
}

#[test]
fn invalid_form_bounds_decline_and_keep_prior_state() {
    let rig = clock_rig();
    let before = rig.conductor.bounds();

    let mut form = rig.controller.form();
    form.start = 500_000.0;
    form.end = 100_000.0;
    assert!(rig.controller.update_bounds_from_form(&form).is_err());
    assert_eq!(rig.conductor.bounds(), before);

    form.start = f64::NAN;
    assert!(rig.controller.update_bounds_from_form(&form).is_err());
    assert_eq!(rig.conductor.bounds(), before);
}

#[test]
fn rapid_bounds_changes_coalesce_to_one_refresh() {
    let rig = clock_rig();
    let refreshes = EventRecorder::<()>::new();
    let _sub = rig.controller.on_refresh(refreshes.handler());
    let scheduled_before = rig.scheduler.scheduled_count();

    for i in 0..10 {
        rig.conductor
            .set_bounds(Bounds::new(f64::from(i), f64::from(i) + 1_000.0))
            .unwrap();
    }

    // Ten bounds events inside one frame arm the gate once.
    assert_eq!(rig.scheduler.scheduled_count() - scheduled_before, 1);
    assert_eq!(rig.scheduler.pump(), 1);
    assert_eq!(refreshes.count(), 1);

    // The gate released: the next change schedules again.
    rig.conductor.set_bounds(Bounds::new(0.0, 500.0)).unwrap();
    assert_eq!(rig.scheduler.scheduled_count() - scheduled_before, 2);
}

#[test]
fn form_mirrors_every_bounds_change_even_while_coalescing() {
    let rig = clock_rig();
    for i in 0..5 {
        let bounds = Bounds::new(f64::from(i) * 10.0, f64::from(i) * 10.0 + 1_000.0);
        rig.conductor.set_bounds(bounds).unwrap();
        let form = rig.controller.form();
        assert_eq!((form.start, form.end), (bounds.start, bounds.end));
    }
}

#[test]
fn switching_to_realtime_selects_utc_and_attaches_clock() {
    let rig = clock_rig();
    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();

    assert_eq!(rig.controller.active_mode_key(), Some(ModeKey::Realtime));
    assert!(rig.conductor.follow());
    assert_eq!(rig.clock.listener_count(), 1);

    // Deltas seeded from the mode's defaults.
    let form = rig.controller.form();
    assert_eq!(form.time_system.selected.unwrap().key, "utc");
    assert_eq!(form.start_delta, "900000");
    assert_eq!(form.end_delta, "5000");

    // Only clock-compatible systems are offered while following.
    let offered: Vec<String> = form
        .time_system
        .options
        .iter()
        .map(|descriptor| descriptor.key.clone())
        .collect();
    assert_eq!(offered, vec!["utc".to_string()]);
}

#[test]
fn ticks_advance_bounds_by_deltas() {
    let rig = clock_rig();
    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();

    rig.clock.tick(1_000_000.0);
    assert_eq!(rig.conductor.bounds(), Bounds::new(100_000.0, 1_005_000.0));

    rig.clock.tick(1_060_000.0);
    assert_eq!(rig.conductor.bounds(), Bounds::new(160_000.0, 1_065_000.0));
}

#[test]
fn set_mode_to_active_key_is_a_no_op() {
    let rig = clock_rig();
    let epoch = rig.controller.mode_epoch();
    let log_before = rig.clock.log_entries();

    // Watcher refire: equal keys.
    rig.controller
        .set_mode(ModeKey::Fixed, Some(ModeKey::Fixed))
        .unwrap();
    // Stale old key but the requested mode is already live.
    rig.controller
        .set_mode(ModeKey::Fixed, Some(ModeKey::Realtime))
        .unwrap();

    assert_eq!(rig.controller.mode_epoch(), epoch);
    assert_eq!(rig.clock.log_entries(), log_before);
    assert_eq!(rig.controller.active_mode_key(), Some(ModeKey::Fixed));
}

#[test]
fn latest_mode_is_rejected_without_a_data_source() {
    let rig = clock_rig();
    let result = rig
        .controller
        .set_mode(ModeKey::Latest, Some(ModeKey::Fixed));
    assert!(result.is_err());
    // The request fails before the outgoing mode is touched.
    assert_eq!(rig.controller.active_mode_key(), Some(ModeKey::Fixed));
}

#[test]
fn update_deltas_from_form_parses_text_under_follow() {
    let rig = clock_rig();
    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();
    rig.clock.tick(1_000_000.0);

    let mut form = rig.controller.form();
    form.start_delta = "5".to_string();
    form.end_delta = "10".to_string();
    rig.controller.update_deltas_from_form(&form).unwrap();

    // The committed deltas re-center the window on the last tick.
    assert_eq!(rig.conductor.bounds(), Bounds::new(999_995.0, 1_000_010.0));
    let form = rig.controller.form();
    assert_eq!(form.start_delta, "5");
    assert_eq!(form.end_delta, "10");
}

#[test]
fn update_deltas_from_form_is_a_no_op_under_fixed() {
    let rig = clock_rig();
    let before = rig.conductor.bounds();

    let mut form = rig.controller.form();
    form.start_delta = "5".to_string();
    form.end_delta = "10".to_string();
    // Fixed defines no deltas: accepted and ignored, even for garbage.
    rig.controller.update_deltas_from_form(&form).unwrap();
    form.start_delta = "fast".to_string();
    rig.controller.update_deltas_from_form(&form).unwrap();

    assert_eq!(rig.conductor.bounds(), before);
}

#[test]
fn invalid_delta_text_is_declined_under_follow() {
    let rig = clock_rig();
    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();
    rig.clock.tick(1_000_000.0);
    let before = rig.conductor.bounds();

    let mut form = rig.controller.form();
    form.start_delta = "-5".to_string();
    form.end_delta = "10".to_string();
    assert!(rig.controller.update_deltas_from_form(&form).is_err());

    form.start_delta = "oops".to_string();
    assert!(rig.controller.update_deltas_from_form(&form).is_err());

    assert_eq!(rig.conductor.bounds(), before);
    assert_eq!(rig.controller.form().start_delta, "900000");
}

#[test]
fn time_systems_for_source_type_filters_the_registry() {
    let rig = clock_rig();

    let all = rig.controller.time_systems_for_source_type(None);
    assert_eq!(all.len(), 2);

    let clocks = rig
        .controller
        .time_systems_for_source_type(Some(TickSourceType::Clock));
    assert_eq!(clocks.len(), 1);
    assert_eq!(clocks[0].key(), "utc");

    let data = rig
        .controller
        .time_systems_for_source_type(Some(TickSourceType::Data));
    assert!(data.is_empty());
}

#[test]
fn selecting_a_time_system_by_key_rebases_fixed_mode() {
    let rig = clock_rig();
    rig.controller.select_time_system_by_key("elapsed").unwrap();

    let form = rig.controller.form();
    assert_eq!(form.time_system.selected.unwrap().key, "elapsed");
    assert_eq!(form.time_system.format, "millis");
    // Fixed mode adopts the new system's default window.
    assert_eq!(rig.conductor.bounds(), Bounds::new(0.0, 60_000.0));
}

#[test]
fn selecting_the_current_time_system_changes_nothing() {
    let rig = clock_rig();
    let bounds_seen = EventRecorder::<Bounds>::new();
    let _sub = rig.conductor.on_bounds(bounds_seen.handler());

    rig.controller.select_time_system_by_key("utc").unwrap();
    assert_eq!(bounds_seen.count(), 0);
}

#[test]
fn unknown_time_system_key_is_an_error() {
    let rig = clock_rig();
    assert!(rig.controller.select_time_system_by_key("stardate").is_err());
}

#[test]
fn derived_form_matches_incremental_form() {
    let rig = clock_rig();
    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();
    rig.clock.tick(2_000_000.0);

    let incremental = rig.controller.form();
    let derived = rig.controller.derived_form();
    assert_eq!(derived.start, incremental.start);
    assert_eq!(derived.end, incremental.end);
    assert_eq!(derived.mode.selected_key, incremental.mode.selected_key);
    assert_eq!(
        derived.time_system.selected,
        incremental.time_system.selected
    );
}

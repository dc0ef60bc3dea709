//! Mode lifecycle ordering: the outgoing mode must be fully detached
//! before the incoming one attaches anything.

use std::sync::Arc;

use tempo_conductor::{Conductor, ModeKey, TimeConductorController};
use tempo_time::{Bounds, TimeSystemRegistry};
use tempo_test_utils::{
    source_log, utc_time_system, EventRecorder, ManualFrameScheduler, RecordingSource, SourceLog,
};

struct Rig {
    controller: TimeConductorController,
    conductor: Arc<Conductor>,
    clock: Arc<RecordingSource>,
    data: Arc<RecordingSource>,
    log: SourceLog,
}

/// One UTC system carrying both a clock and a data source, sharing a
/// lifecycle log so subscribe/unsubscribe ordering is observable across
/// sources.
fn dual_source_rig() -> Rig {
    let log = source_log();
    let clock = Arc::new(RecordingSource::clock().with_log(Arc::clone(&log)));
    let data = Arc::new(RecordingSource::data().with_log(Arc::clone(&log)));

    let mut registry = TimeSystemRegistry::new();
    registry.register(utc_time_system(vec![clock.clone(), data.clone()]));

    let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 900_000.0)));
    let controller = TimeConductorController::new(
        Arc::clone(&conductor),
        registry,
        Arc::new(ManualFrameScheduler::new()),
    )
    .unwrap();

    Rig {
        controller,
        conductor,
        clock,
        data,
        log,
    }
}

#[test]
fn all_three_modes_are_offered() {
    let rig = dual_source_rig();
    let keys: Vec<ModeKey> = rig.controller.modes().iter().map(|m| m.key).collect();
    assert_eq!(keys, vec![ModeKey::Fixed, ModeKey::Realtime, ModeKey::Latest]);
}

#[test]
fn outgoing_mode_detaches_before_incoming_attaches() {
    let rig = dual_source_rig();

    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();
    rig.controller
        .set_mode(ModeKey::Latest, Some(ModeKey::Realtime))
        .unwrap();
    rig.controller
        .set_mode(ModeKey::Fixed, Some(ModeKey::Latest))
        .unwrap();

    assert_eq!(
        *rig.log.lock(),
        vec![
            "subscribe:manual-clock",
            "unsubscribe:manual-clock",
            "subscribe:manual-data",
            "unsubscribe:manual-data",
        ]
    );
}

#[test]
fn round_trip_to_fixed_leaves_no_listeners_behind() {
    let rig = dual_source_rig();

    for _ in 0..3 {
        rig.controller
            .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
            .unwrap();
        rig.controller
            .set_mode(ModeKey::Fixed, Some(ModeKey::Realtime))
            .unwrap();
    }

    assert_eq!(rig.clock.listener_count(), 0);
    assert_eq!(rig.data.listener_count(), 0);

    // A stale clock tick after leaving follow must not move the window.
    let before = rig.conductor.bounds();
    rig.clock.tick(5_000_000.0);
    assert_eq!(rig.conductor.bounds(), before);
}

#[test]
fn follow_flag_tracks_mode_switches() {
    let rig = dual_source_rig();
    let follows = EventRecorder::<bool>::new();
    let _sub = rig.conductor.on_follow(follows.handler());

    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();
    assert!(rig.conductor.follow());

    // Realtime -> latest: both follow, the flag stays high with no churn.
    rig.controller
        .set_mode(ModeKey::Latest, Some(ModeKey::Realtime))
        .unwrap();
    assert!(rig.conductor.follow());

    rig.controller
        .set_mode(ModeKey::Fixed, Some(ModeKey::Latest))
        .unwrap();
    assert!(!rig.conductor.follow());

    assert_eq!(follows.events(), vec![true, false]);
}

#[test]
fn mode_epoch_counts_constructions_only() {
    let rig = dual_source_rig();
    let initial = rig.controller.mode_epoch();

    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Fixed))
        .unwrap();
    rig.controller
        .set_mode(ModeKey::Realtime, Some(ModeKey::Realtime))
        .unwrap();
    rig.controller
        .set_mode(ModeKey::Latest, Some(ModeKey::Realtime))
        .unwrap();

    assert_eq!(rig.controller.mode_epoch() - initial, 2);
}

#[test]
fn data_mode_advances_only_on_data() {
    let rig = dual_source_rig();
    rig.controller
        .set_mode(ModeKey::Latest, Some(ModeKey::Fixed))
        .unwrap();

    let before = rig.conductor.bounds();
    rig.clock.tick(2_000_000.0);
    assert_eq!(rig.conductor.bounds(), before);

    rig.data.tick(2_000_000.0);
    assert_eq!(
        rig.conductor.bounds(),
        Bounds::new(1_100_000.0, 2_005_000.0)
    );
}

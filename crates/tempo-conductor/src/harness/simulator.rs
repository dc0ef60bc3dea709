//! Conductor simulator: seeded random operation streams with invariant
//! checks after every step.
//!
//! Drives a live controller through bounds edits, delta edits, mode and
//! time system switches, ticks, and pan/zoom gestures - a mix of valid,
//! edge-case, and deliberately invalid input - and verifies that the
//! engine's invariants hold throughout.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

use tempo_time::{
    Bounds, LatestDataSource, TickFanout, TickListener, TickMetadata, TickSource, TickSourceType,
    TickSubscription, TimeSystem, TimeSystemDefaults, TimeSystemRegistry, TimeValue,
    validate_bounds, parse_deltas, Deltas,
};

use crate::axis::TimeAxis;
use crate::conductor::Conductor;
use crate::controller::TimeConductorController;
use crate::error::ConductorError;
use crate::frame::FrameScheduler;
use crate::mode::ModeKey;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Total operations to execute
    pub total_operations: u64,
    /// Distribution of operation types
    pub operation_distribution: OperationDistribution,
    /// Stop conditions
    pub stop_on_first_violation: bool,
    pub stop_on_error_count: Option<usize>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            total_operations: 10_000,
            operation_distribution: OperationDistribution::default(),
            stop_on_first_violation: true,
            stop_on_error_count: None,
        }
    }
}

/// Probability distribution for operation generation
#[derive(Debug, Clone)]
pub struct OperationDistribution {
    /// Valid operations (normal conductor traffic)
    pub valid_ops: f64,
    /// Edge cases (boundary values, redundant switches)
    pub edge_cases: f64,
    /// Invalid operations (should be declined)
    pub invalid_ops: f64,
}

impl Default for OperationDistribution {
    fn default() -> Self {
        Self {
            valid_ops: 0.70,
            edge_cases: 0.20,
            invalid_ops: 0.10,
        }
    }
}

/// All operations the simulator can generate
#[derive(Debug, Clone)]
pub enum SimulatedOperation {
    // Form edits
    EditBounds(Bounds),
    EditDeltas(String, String),

    // Switches
    SwitchMode(ModeKey),
    SwitchTimeSystem(String),

    // Tick traffic
    ClockTick(TimeValue),
    DataTick(TimeValue),

    // Gestures
    Pan(f64),
    PanStop,
    Zoom(Bounds),

    // Drain scheduled refreshes
    PumpRefresh,
}

impl SimulatedOperation {
    fn name(&self) -> &'static str {
        match self {
            SimulatedOperation::EditBounds(_) => "EditBounds",
            SimulatedOperation::EditDeltas(_, _) => "EditDeltas",
            SimulatedOperation::SwitchMode(_) => "SwitchMode",
            SimulatedOperation::SwitchTimeSystem(_) => "SwitchTimeSystem",
            SimulatedOperation::ClockTick(_) => "ClockTick",
            SimulatedOperation::DataTick(_) => "DataTick",
            SimulatedOperation::Pan(_) => "Pan",
            SimulatedOperation::PanStop => "PanStop",
            SimulatedOperation::Zoom(_) => "Zoom",
            SimulatedOperation::PumpRefresh => "PumpRefresh",
        }
    }
}

/// Expected result classification for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedResult {
    ShouldSucceed,
    ShouldFail,
}

/// A violation detected during simulation
#[derive(Debug, Clone)]
pub enum Violation {
    /// Operation outcome didn't match expectation
    UnexpectedOutcome {
        operation_index: u64,
        operation: SimulatedOperation,
        expected: ExpectedResult,
        actual: Result<String, String>,
    },
    /// Invariant was violated
    Invariant(InvariantViolation),
}

/// A specific invariant violation
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub check: InvariantCheck,
    pub details: String,
}

/// Types of invariant checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantCheck {
    BoundsAreOrdered,
    ActiveModeIsOffered,
    FollowFlagMatchesMode,
    NoLeakedTickListeners,
    FormMirrorsConductorBounds,
}

/// Statistics collected during simulation
#[derive(Debug, Clone, Default)]
pub struct OperationStats {
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub operations_by_type: HashMap<String, u64>,
}

impl OperationStats {
    fn record(&mut self, operation: &SimulatedOperation, result: &Result<String, String>) {
        self.total_operations += 1;
        *self
            .operations_by_type
            .entry(operation.name().to_string())
            .or_insert(0) += 1;
        match result {
            Ok(_) => self.successful_operations += 1,
            Err(_) => self.failed_operations += 1,
        }
    }
}

/// Final report from the simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: OperationStats,
    pub violations: Vec<Violation>,
    pub final_bounds: Bounds,
    pub final_mode: Option<ModeKey>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Conductor Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Total Operations: {}\n", self.stats.total_operations));
        report.push_str(&format!("Successful: {}\n", self.stats.successful_operations));
        report.push_str(&format!("Declined: {}\n", self.stats.failed_operations));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));
        report.push_str(&format!(
            "Final Bounds: [{}, {}]\n",
            self.final_bounds.start, self.final_bounds.end
        ));
        if let Some(mode) = self.final_mode {
            report.push_str(&format!("Final Mode: {mode}\n"));
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, violation) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, violation));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Clock tick source the simulator advances by hand.
struct ScriptedClock {
    metadata: TickMetadata,
    fanout: TickFanout,
}

impl ScriptedClock {
    fn new() -> Self {
        Self {
            metadata: TickMetadata::new(
                "script-clock",
                "Scripted Clock",
                "Clock advanced explicitly by the simulator.",
                "icon-clock",
            ),
            fanout: TickFanout::new(),
        }
    }

    fn tick(&self, value: TimeValue) {
        self.fanout.emit(value);
    }

    fn listener_count(&self) -> usize {
        self.fanout.listener_count()
    }
}

impl TickSource for ScriptedClock {
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

/// Frame scheduler that queues callbacks until pumped.
#[derive(Default)]
struct QueuedScheduler {
    queue: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl QueuedScheduler {
    fn pump(&self) -> usize {
        let drained: Vec<_> = std::mem::take(&mut *self.queue.lock());
        let count = drained.len();
        for callback in drained {
            callback();
        }
        count
    }
}

impl FrameScheduler for QueuedScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce() + Send>) {
        self.queue.lock().push(callback);
    }
}

struct SimulatorWorld {
    controller: TimeConductorController,
    axis: TimeAxis,
    clock: Arc<ScriptedClock>,
    data: Arc<LatestDataSource>,
    scheduler: Arc<QueuedScheduler>,
    /// Monotonic simulated wall clock, advanced by ClockTick operations.
    now: TimeValue,
}

fn build_world() -> SimulatorWorld {
    let clock = Arc::new(ScriptedClock::new());
    let data = Arc::new(LatestDataSource::new());

    let mut registry = TimeSystemRegistry::new();
    registry.register(Arc::new(
        TimeSystem::new("utc", "UTC")
            .utc_based(true)
            .with_format("utc")
            .with_format("millis")
            .with_defaults(TimeSystemDefaults {
                bounds: Bounds::new(0.0, 900_000.0),
                deltas: Deltas::new(900_000.0, 5_000.0),
            })
            .with_tick_source(clock.clone())
            .with_tick_source(data.clone()),
    ));
    registry.register(Arc::new(
        TimeSystem::new("elapsed", "Elapsed")
            .with_format("millis")
            .with_defaults(TimeSystemDefaults {
                bounds: Bounds::new(0.0, 60_000.0),
                deltas: Deltas::new(60_000.0, 0.0),
            }),
    ));

    let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 900_000.0)));
    let scheduler = Arc::new(QueuedScheduler::default());
    let controller =
        TimeConductorController::new(Arc::clone(&conductor), registry, scheduler.clone())
            .expect("simulator registry is non-empty");
    let axis = TimeAxis::new(conductor, 1000.0);

    SimulatorWorld {
        controller,
        axis,
        clock,
        data,
        scheduler,
        now: 1_000_000.0,
    }
}

/// Run the conductor simulator
#[must_use]
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut world = build_world();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = OperationStats::default();
    let mut violations = Vec::new();

    for i in 0..config.total_operations {
        let operation = generate_operation(&mut rng, &config.operation_distribution, &world);
        let expected = classify_expected_result(&operation, &world);
        let actual = execute_operation(&mut world, &operation);

        let outcome_matches = matches!(
            (expected, &actual),
            (ExpectedResult::ShouldSucceed, Ok(_)) | (ExpectedResult::ShouldFail, Err(_))
        );

        let actual_str: Result<String, String> = match &actual {
            Ok(message) => Ok(message.clone()),
            Err(error) => Err(error.to_string()),
        };

        if !outcome_matches {
            violations.push(Violation::UnexpectedOutcome {
                operation_index: i,
                operation: operation.clone(),
                expected,
                actual: actual_str.clone(),
            });
            if config.stop_on_first_violation {
                break;
            }
            if let Some(max_errors) = config.stop_on_error_count {
                if violations.len() >= max_errors {
                    break;
                }
            }
        }

        // Check all invariants after every operation
        if let Err(invariant_violations) = ConductorInvariants::check_all(&world) {
            violations.extend(invariant_violations.into_iter().map(Violation::Invariant));
            if config.stop_on_first_violation {
                break;
            }
        }

        stats.record(&operation, &actual_str);
    }

    // Drain anything still scheduled so the final form check is stable.
    world.scheduler.pump();

    SimulatorReport {
        config,
        stats,
        violations,
        final_bounds: world.controller.conductor().bounds(),
        final_mode: world.controller.active_mode_key(),
    }
}

fn generate_operation(
    rng: &mut StdRng,
    distribution: &OperationDistribution,
    world: &SimulatorWorld,
) -> SimulatedOperation {
    let r: f64 = rng.gen();
    if r < distribution.valid_ops {
        generate_valid_operation(rng, world)
    } else if r < distribution.valid_ops + distribution.edge_cases {
        generate_edge_case_operation(rng, world)
    } else {
        generate_invalid_operation(rng)
    }
}

fn generate_valid_operation(rng: &mut StdRng, world: &SimulatorWorld) -> SimulatedOperation {
    match rng.gen_range(0..9) {
        0 => {
            let start = rng.gen_range(0.0..2_000_000.0);
            let span = rng.gen_range(0.0..1_000_000.0);
            SimulatedOperation::EditBounds(Bounds::new(start, start + span))
        }
        1 => SimulatedOperation::EditDeltas(
            rng.gen_range(0..900_000).to_string(),
            rng.gen_range(0..10_000).to_string(),
        ),
        2 => {
            let key = match rng.gen_range(0..3) {
                0 => ModeKey::Fixed,
                1 => ModeKey::Realtime,
                _ => ModeKey::Latest,
            };
            SimulatedOperation::SwitchMode(key)
        }
        3 => {
            let key = if rng.gen_bool(0.5) { "utc" } else { "elapsed" };
            SimulatedOperation::SwitchTimeSystem(key.to_string())
        }
        4 => SimulatedOperation::ClockTick(world.now + rng.gen_range(1.0..5_000.0)),
        5 => SimulatedOperation::DataTick(world.now + rng.gen_range(1.0..5_000.0)),
        6 => SimulatedOperation::Pan(rng.gen_range(-500.0..500.0)),
        7 => SimulatedOperation::Zoom(Bounds::new(0.0, rng.gen_range(1_000.0..1_000_000.0))),
        _ => SimulatedOperation::PumpRefresh,
    }
}

fn generate_edge_case_operation(rng: &mut StdRng, world: &SimulatorWorld) -> SimulatedOperation {
    match rng.gen_range(0..6) {
        // Zero-width window
        0 => SimulatedOperation::EditBounds(Bounds::new(world.now, world.now)),
        // Zero deltas
        1 => SimulatedOperation::EditDeltas("0".to_string(), "0".to_string()),
        // Redundant switch to the current mode
        2 => {
            let current = world
                .controller
                .active_mode_key()
                .unwrap_or(ModeKey::Fixed);
            SimulatedOperation::SwitchMode(current)
        }
        // Redundant time system switch
        3 => {
            let current = world
                .controller
                .form()
                .time_system
                .selected
                .map_or_else(|| "utc".to_string(), |descriptor| descriptor.key);
            SimulatedOperation::SwitchTimeSystem(current)
        }
        4 => SimulatedOperation::PanStop,
        _ => SimulatedOperation::PumpRefresh,
    }
}

fn generate_invalid_operation(rng: &mut StdRng) -> SimulatedOperation {
    match rng.gen_range(0..5) {
        // Backwards window
        0 => {
            let start = rng.gen_range(1_000_000.0..2_000_000.0);
            SimulatedOperation::EditBounds(Bounds::new(start, start - 1.0))
        }
        // Non-finite bound
        1 => SimulatedOperation::EditBounds(Bounds::new(f64::NAN, 0.0)),
        // Garbage delta text
        2 => SimulatedOperation::EditDeltas("fast".to_string(), "10".to_string()),
        // Negative delta
        3 => SimulatedOperation::EditDeltas("-100".to_string(), "0".to_string()),
        // Unknown time system
        _ => SimulatedOperation::SwitchTimeSystem("stardate".to_string()),
    }
}

/// Classify whether an operation should succeed or be declined, given the
/// world it will run against.
fn classify_expected_result(
    operation: &SimulatedOperation,
    world: &SimulatorWorld,
) -> ExpectedResult {
    match operation {
        SimulatedOperation::EditBounds(bounds) => {
            if validate_bounds(bounds).is_ok() {
                ExpectedResult::ShouldSucceed
            } else {
                ExpectedResult::ShouldFail
            }
        }
        SimulatedOperation::EditDeltas(start, end) => {
            // Modes without deltas decline nothing: the edit is a no-op.
            let fixed = world.controller.active_mode_key() == Some(ModeKey::Fixed);
            if fixed || parse_deltas(start, end).is_ok() {
                ExpectedResult::ShouldSucceed
            } else {
                ExpectedResult::ShouldFail
            }
        }
        SimulatedOperation::SwitchTimeSystem(key) => {
            // Unknown keys are declined; so are systems the live mode
            // cannot follow (the presentation layer never offers those).
            let mode_source_type = world
                .controller
                .active_mode_key()
                .and_then(|mode| mode.tick_source_type());
            match world.controller.registry().get(key) {
                Err(_) => ExpectedResult::ShouldFail,
                Ok(system) => match mode_source_type {
                    Some(source_type) if !system.has_source_type(source_type) => {
                        ExpectedResult::ShouldFail
                    }
                    _ => ExpectedResult::ShouldSucceed,
                },
            }
        }
        _ => ExpectedResult::ShouldSucceed,
    }
}

fn execute_operation(
    world: &mut SimulatorWorld,
    operation: &SimulatedOperation,
) -> Result<String, ConductorError> {
    match operation {
        SimulatedOperation::EditBounds(bounds) => {
            let mut form = world.controller.form();
            form.start = bounds.start;
            form.end = bounds.end;
            world.controller.update_bounds_from_form(&form)?;
            Ok(format!("bounds [{}, {}]", bounds.start, bounds.end))
        }
        SimulatedOperation::EditDeltas(start, end) => {
            let mut form = world.controller.form();
            form.start_delta = start.clone();
            form.end_delta = end.clone();
            world.controller.update_deltas_from_form(&form)?;
            Ok(format!("deltas [{start}, {end}]"))
        }
        SimulatedOperation::SwitchMode(key) => {
            let current = world.controller.active_mode_key();
            world.controller.set_mode(*key, current)?;
            Ok(format!("mode {key}"))
        }
        SimulatedOperation::SwitchTimeSystem(key) => {
            world.controller.select_time_system_by_key(key)?;
            Ok(format!("time system {key}"))
        }
        SimulatedOperation::ClockTick(value) => {
            world.now = world.now.max(*value);
            world.clock.tick(*value);
            Ok(format!("clock tick {value}"))
        }
        SimulatedOperation::DataTick(value) => {
            world.now = world.now.max(*value);
            world.data.notify(*value);
            Ok(format!("data tick {value}"))
        }
        SimulatedOperation::Pan(delta_px) => {
            let moved = world.axis.pan(*delta_px).is_some();
            Ok(format!("pan {delta_px} (moved: {moved})"))
        }
        SimulatedOperation::PanStop => {
            world.axis.pan_stop();
            Ok("pan stop".to_string())
        }
        SimulatedOperation::Zoom(bounds) => {
            world.axis.zoom(*bounds);
            Ok(format!("zoom [{}, {}]", bounds.start, bounds.end))
        }
        SimulatedOperation::PumpRefresh => {
            let pumped = world.scheduler.pump();
            Ok(format!("pumped {pumped} refreshes"))
        }
    }
}

/// Conductor invariant checks
struct ConductorInvariants;

impl ConductorInvariants {
    fn check_all(world: &SimulatorWorld) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();
        let conductor = world.controller.conductor();

        let bounds = conductor.bounds();
        if validate_bounds(&bounds).is_err() {
            violations.push(InvariantViolation {
                check: InvariantCheck::BoundsAreOrdered,
                details: format!("committed bounds [{}, {}]", bounds.start, bounds.end),
            });
        }

        let active = world.controller.active_mode_key();
        match active {
            Some(key) => {
                if !world.controller.modes().iter().any(|mode| mode.key == key) {
                    violations.push(InvariantViolation {
                        check: InvariantCheck::ActiveModeIsOffered,
                        details: format!("active mode {key} is not an offered option"),
                    });
                }
                if conductor.follow() != key.is_follow() {
                    violations.push(InvariantViolation {
                        check: InvariantCheck::FollowFlagMatchesMode,
                        details: format!(
                            "mode {key} with follow flag {}",
                            conductor.follow()
                        ),
                    });
                }
                let expected_listeners = usize::from(key.is_follow());
                let attached = world.clock.listener_count() + world.data.listener_count();
                if attached != expected_listeners {
                    violations.push(InvariantViolation {
                        check: InvariantCheck::NoLeakedTickListeners,
                        details: format!(
                            "{attached} tick listeners attached in mode {key} (expected {expected_listeners})"
                        ),
                    });
                }
            }
            None => violations.push(InvariantViolation {
                check: InvariantCheck::ActiveModeIsOffered,
                details: "no active mode".to_string(),
            }),
        }

        let form = world.controller.form();
        if form.start != bounds.start || form.end != bounds.end {
            violations.push(InvariantViolation {
                check: InvariantCheck::FormMirrorsConductorBounds,
                details: format!(
                    "form [{}, {}] vs conductor [{}, {}]",
                    form.start, form.end, bounds.start, bounds.end
                ),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

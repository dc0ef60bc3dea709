//! Tempo Conductor - synchronized time windows for telemetry views
//!
//! The coordination engine that keeps every visualization in an application
//! reading from one shared time window:
//! - A [`Conductor`] owning the canonical bounds/time-system/follow state,
//!   with ordered synchronous event surfaces
//! - Fixed and Follow [modes](mode) mediating what "changing time" means
//! - A [`TimeConductorController`] orchestrating mode switches, time system
//!   switches, and form synchronization
//! - Frame-coalesced refresh scheduling and a headless pan/zoom axis
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tempo_conductor::{Conductor, TimeConductorController, TokioFrameScheduler};
//! use tempo_time::{Bounds, TimeSystemRegistry};
//!
//! let conductor = Arc::new(Conductor::new(Bounds::new(0.0, 900_000.0)));
//! let registry = TimeSystemRegistry::new(); // populated at startup
//! let controller = TimeConductorController::new(
//!     conductor,
//!     registry,
//!     Arc::new(TokioFrameScheduler::default()),
//! )?;
//! ```

#![allow(missing_docs)]

pub mod axis;
pub mod conductor;
pub mod controller;
pub mod emitter;
pub mod error;
pub mod form;
pub mod frame;
pub mod harness;
pub mod mode;

pub use axis::TimeAxis;
pub use conductor::Conductor;
pub use controller::TimeConductorController;
pub use emitter::{Emitter, Handler, Subscription};
pub use error::ConductorError;
pub use form::{derive_form, FormModel, ModeModel, TimeSystemModel};
pub use frame::{FrameScheduler, RefreshGate, TokioFrameScheduler};
pub use harness::{run_simulator, SimulatorConfig, SimulatorReport};
pub use mode::{
    available_modes, ConductorMode, FixedMode, FollowMode, ModeDescriptor, ModeKey,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

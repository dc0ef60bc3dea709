//! Tempo Time - time vocabulary for the conductor
//!
//! Foundational types shared by every conductor view:
//! - Bounds and deltas over an epoch-like numeric timeline
//! - Time systems (UTC-based or relative) and their registry
//! - Display formats for timestamps and deltas
//! - Tick sources (clock-driven or data-driven) with cancellable
//!   subscriptions
//! - Pure validation of bounds and deltas

#![allow(missing_docs)]

pub mod error;
pub mod format;
pub mod system;
pub mod tick;
pub mod validation;
pub mod values;

pub use error::{TimeError, ValidationError};
pub use format::{DurationFormat, FormatRegistry, MillisFormat, TimeFormat, UtcFormat};
pub use system::{TimeSystem, TimeSystemDescriptor, TimeSystemRegistry, TimeSystemDefaults};
pub use tick::{
    LatestDataSource, TickFanout, TickListener, TickMetadata, TickSource, TickSourceType,
    TickSubscription, WallClockSource,
};
pub use validation::{parse_deltas, validate_bounds, validate_deltas};
pub use values::{Bounds, Deltas, TimeValue};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

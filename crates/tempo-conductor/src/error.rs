//! Error types for the conductor engine.
//!
//! Everything here is recoverable: a failed operation declines the change
//! and leaves the conductor's prior state intact.

use crate::mode::ModeKey;
use tempo_time::{TimeError, ValidationError};

/// Main conductor error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConductorError {
    /// Bounds or deltas failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registry or format lookup failed
    #[error(transparent)]
    Time(#[from] TimeError),

    /// The requested mode was filtered out at construction (no compatible
    /// tick source in the registry)
    #[error("mode {0} is not available in this configuration")]
    ModeUnavailable(ModeKey),

    /// A controller cannot be built over an empty time system registry
    #[error("no time systems are registered")]
    EmptyRegistry,
}

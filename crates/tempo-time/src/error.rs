//! Error types for the time layer

/// A bounds or delta value failed validation.
///
/// Validation failures are recoverable: the attempted change is declined
/// and prior state stays intact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A bound is NaN or infinite
    #[error("bound is not a finite number: {value}")]
    NonFiniteBound { value: f64 },

    /// Start is after end
    #[error("start bound {start} must not exceed end bound {end}")]
    BackwardsBounds { start: f64, end: f64 },

    /// A delta is NaN or infinite
    #[error("delta is not a finite number: {value}")]
    NonFiniteDelta { value: f64 },

    /// A delta is negative
    #[error("delta must be non-negative: {value}")]
    NegativeDelta { value: f64 },

    /// A raw form field could not be parsed as a number
    #[error("delta field is not numeric: {raw:?}")]
    UnparseableDelta { raw: String },
}

/// Registry and format lookup errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    /// No time system registered under this key
    #[error("unknown time system: {0}")]
    UnknownTimeSystem(String),

    /// No format registered under this key
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// The time system exposes no tick source of the requested type
    #[error("time system {system} has no tick source of type {source_type}")]
    NoTickSource { system: String, source_type: String },

    /// A timestamp string did not match the format
    #[error("cannot parse {raw:?} with format {format}")]
    UnparseableTimestamp { format: String, raw: String },

    /// A numeric time value is outside the representable range of the format
    #[error("time value {value} is out of range for format {format}")]
    OutOfRange { format: String, value: f64 },
}

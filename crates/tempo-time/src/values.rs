use serde::{Deserialize, Serialize};

/// A point on the conductor's timeline.
///
/// Epoch-like numeric value: milliseconds for UTC-based time systems,
/// whatever unit the active time system implies otherwise. Kept as `f64`
/// because the form layer round-trips through free-text fields and the
/// validators must be able to reject non-finite input.
pub type TimeValue = f64;

/// The `{start, end}` time window currently displayed.
///
/// `start <= end` is enforced by validation before any commit, not by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub start: TimeValue,
    pub end: TimeValue,
}

impl Bounds {
    #[inline]
    #[must_use]
    pub fn new(start: TimeValue, end: TimeValue) -> Self {
        Self { start, end }
    }

    /// Width of the window.
    #[inline]
    #[must_use]
    pub fn span(&self) -> TimeValue {
        self.end - self.start
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, value: TimeValue) -> bool {
        value >= self.start && value <= self.end
    }

    /// Shift the whole window by `offset`, preserving its span.
    #[must_use]
    pub fn translate(&self, offset: TimeValue) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

/// Offsets applied before and after a tick to produce Follow-mode bounds.
///
/// Both offsets are non-negative by convention; `start` reaches backwards
/// from the tick, `end` reaches forwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deltas {
    pub start: TimeValue,
    pub end: TimeValue,
}

impl Deltas {
    #[inline]
    #[must_use]
    pub fn new(start: TimeValue, end: TimeValue) -> Self {
        Self { start, end }
    }

    /// The bounds produced by centering these deltas on `tick`:
    /// `[tick - start, tick + end]`.
    #[must_use]
    pub fn around(&self, tick: TimeValue) -> Bounds {
        Bounds {
            start: tick - self.start,
            end: tick + self.end,
        }
    }

    /// Total width of the window these deltas describe.
    #[inline]
    #[must_use]
    pub fn span(&self) -> TimeValue {
        self.start + self.end
    }
}

//! Display formats for timestamps and deltas.
//!
//! A time system names its formats by key; the first format key is the
//! default display format and `delta_format` renders Follow-mode offsets.
//! Formats are registered once at startup in a [`FormatRegistry`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use indexmap::IndexMap;

use crate::error::TimeError;
use crate::values::TimeValue;

/// Renders and parses a single representation of a time value.
pub trait TimeFormat: Send + Sync {
    /// Registry key, referenced by time system definitions.
    fn key(&self) -> &str;

    /// Render a time value for display. Infallible: values a format cannot
    /// represent fall back to their plain numeric form.
    fn format(&self, value: TimeValue) -> String;

    /// Parse user input back into a time value.
    fn parse(&self, raw: &str) -> Result<TimeValue, TimeError>;
}

const UTC_PATTERN: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

/// UTC wall-clock timestamps, millisecond epoch values.
#[derive(Debug, Default)]
pub struct UtcFormat;

impl TimeFormat for UtcFormat {
    fn key(&self) -> &str {
        "utc"
    }

    fn format(&self, value: TimeValue) -> String {
        match DateTime::from_timestamp_millis(value as i64) {
            Some(dt) => dt.format(UTC_PATTERN).to_string(),
            None => value.to_string(),
        }
    }

    fn parse(&self, raw: &str) -> Result<TimeValue, TimeError> {
        let raw = raw.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, UTC_PATTERN) {
            return Ok(dt.and_utc().timestamp_millis() as TimeValue);
        }
        // Accept RFC 3339 as typed by other tools
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.timestamp_millis() as TimeValue);
        }
        Err(TimeError::UnparseableTimestamp {
            format: self.key().to_string(),
            raw: raw.to_string(),
        })
    }
}

/// Plain numeric values for relative or count-based time systems.
#[derive(Debug, Default)]
pub struct MillisFormat;

impl TimeFormat for MillisFormat {
    fn key(&self) -> &str {
        "millis"
    }

    fn format(&self, value: TimeValue) -> String {
        value.to_string()
    }

    fn parse(&self, raw: &str) -> Result<TimeValue, TimeError> {
        raw.trim()
            .parse::<f64>()
            .map_err(|_| TimeError::UnparseableTimestamp {
                format: self.key().to_string(),
                raw: raw.to_string(),
            })
    }
}

/// `HH:MM:SS` rendering of millisecond offsets, used for deltas.
#[derive(Debug, Default)]
pub struct DurationFormat;

impl TimeFormat for DurationFormat {
    fn key(&self) -> &str {
        "duration"
    }

    fn format(&self, value: TimeValue) -> String {
        if !value.is_finite() || value < 0.0 {
            return value.to_string();
        }
        let total_seconds = (value / 1000.0).round() as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }

    fn parse(&self, raw: &str) -> Result<TimeValue, TimeError> {
        let raw = raw.trim();
        let parts: Vec<&str> = raw.split(':').collect();
        let unparseable = || TimeError::UnparseableTimestamp {
            format: "duration".to_string(),
            raw: raw.to_string(),
        };
        match parts.as_slice() {
            [h, m, s] => {
                let hours: u64 = h.parse().map_err(|_| unparseable())?;
                let minutes: u64 = m.parse().map_err(|_| unparseable())?;
                let seconds: u64 = s.parse().map_err(|_| unparseable())?;
                if minutes >= 60 || seconds >= 60 {
                    return Err(unparseable());
                }
                Ok(((hours * 3600 + minutes * 60 + seconds) * 1000) as TimeValue)
            }
            // Bare numbers are taken as milliseconds
            [n] => n.parse::<f64>().map_err(|_| unparseable()),
            _ => Err(unparseable()),
        }
    }
}

/// Registry of display formats, iterated in registration order.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: IndexMap<String, Arc<dyn TimeFormat>>,
}

impl FormatRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in formats.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UtcFormat));
        registry.register(Arc::new(MillisFormat));
        registry.register(Arc::new(DurationFormat));
        registry
    }

    pub fn register(&mut self, format: Arc<dyn TimeFormat>) {
        self.formats.insert(format.key().to_string(), format);
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn TimeFormat>, TimeError> {
        self.formats
            .get(key)
            .cloned()
            .ok_or_else(|| TimeError::UnknownFormat(key.to_string()))
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.formats.keys().map(String::as_str).collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

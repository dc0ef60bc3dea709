//! Time systems and their registry.
//!
//! A time system is a unit/format basis for time values: UTC-based wall
//! clock, or a relative/count-based scale. Each one declares the display
//! formats it supports (first is the default), a delta format, default
//! bounds and deltas, and the tick sources compatible with it. Time systems
//! are immutable once registered; the registry is populated at startup.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TimeError;
use crate::tick::{TickMetadata, TickSource, TickSourceType};
use crate::values::{Bounds, Deltas};

/// Starting bounds and deltas a time system advertises for new views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSystemDefaults {
    pub bounds: Bounds,
    pub deltas: Deltas,
}

impl Default for TimeSystemDefaults {
    fn default() -> Self {
        // A 15 minute window anchored at the epoch; concrete systems
        // override this with something meaningful for their scale.
        Self {
            bounds: Bounds::new(0.0, 900_000.0),
            deltas: Deltas::new(900_000.0, 0.0),
        }
    }
}

/// Presentation-facing identity of a time system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSystemDescriptor {
    pub key: String,
    pub name: String,
    pub css_class: String,
}

/// A unit/format basis for time values.
pub struct TimeSystem {
    key: String,
    name: String,
    css_class: String,
    utc_based: bool,
    formats: Vec<String>,
    delta_format: String,
    defaults: TimeSystemDefaults,
    tick_sources: Vec<Arc<dyn TickSource>>,
}

impl TimeSystem {
    #[must_use]
    pub fn new(key: &str, name: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            css_class: "icon-clock".to_string(),
            utc_based: false,
            formats: Vec::new(),
            delta_format: "duration".to_string(),
            defaults: TimeSystemDefaults::default(),
            tick_sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn utc_based(mut self, utc_based: bool) -> Self {
        self.utc_based = utc_based;
        self
    }

    #[must_use]
    pub fn with_css_class(mut self, css_class: &str) -> Self {
        self.css_class = css_class.to_string();
        self
    }

    /// Append a supported display format key. The first registered format
    /// is the default.
    #[must_use]
    pub fn with_format(mut self, format_key: &str) -> Self {
        self.formats.push(format_key.to_string());
        self
    }

    #[must_use]
    pub fn with_delta_format(mut self, format_key: &str) -> Self {
        self.delta_format = format_key.to_string();
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: TimeSystemDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_tick_source(mut self, source: Arc<dyn TickSource>) -> Self {
        self.tick_sources.push(source);
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn is_utc_based(&self) -> bool {
        self.utc_based
    }

    /// Supported display format keys, default first.
    #[inline]
    #[must_use]
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// The default display format: first of `formats`, or plain millis if
    /// the system declared none.
    #[must_use]
    pub fn default_format(&self) -> &str {
        self.formats.first().map_or("millis", String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn delta_format(&self) -> &str {
        &self.delta_format
    }

    #[inline]
    #[must_use]
    pub fn defaults(&self) -> TimeSystemDefaults {
        self.defaults
    }

    #[inline]
    #[must_use]
    pub fn tick_sources(&self) -> &[Arc<dyn TickSource>] {
        &self.tick_sources
    }

    #[must_use]
    pub fn has_source_type(&self, source_type: TickSourceType) -> bool {
        self.tick_sources
            .iter()
            .any(|source| source.source_type() == source_type)
    }

    /// First tick source of the requested type, if any.
    #[must_use]
    pub fn tick_source_of_type(
        &self,
        source_type: TickSourceType,
    ) -> Option<Arc<dyn TickSource>> {
        self.tick_sources
            .iter()
            .find(|source| source.source_type() == source_type)
            .cloned()
    }

    #[must_use]
    pub fn descriptor(&self) -> TimeSystemDescriptor {
        TimeSystemDescriptor {
            key: self.key.clone(),
            name: self.name.clone(),
            css_class: self.css_class.clone(),
        }
    }
}

impl std::fmt::Debug for TimeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSystem")
            .field("key", &self.key)
            .field("utc_based", &self.utc_based)
            .field("formats", &self.formats)
            .field("tick_sources", &self.tick_sources.len())
            .finish()
    }
}

/// Registry of time systems, iterated in registration order.
#[derive(Debug, Default, Clone)]
pub struct TimeSystemRegistry {
    systems: IndexMap<String, Arc<TimeSystem>>,
}

impl TimeSystemRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a time system. Re-registering a key replaces the earlier
    /// entry but keeps its position.
    pub fn register(&mut self, system: Arc<TimeSystem>) {
        self.systems.insert(system.key().to_string(), system);
    }

    pub fn get(&self, key: &str) -> Result<Arc<TimeSystem>, TimeError> {
        self.systems
            .get(key)
            .cloned()
            .ok_or_else(|| TimeError::UnknownTimeSystem(key.to_string()))
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.systems.contains_key(key)
    }

    /// All registered time systems, in registration order.
    #[must_use]
    pub fn systems(&self) -> Vec<Arc<TimeSystem>> {
        self.systems.values().cloned().collect()
    }

    /// Time systems compatible with a tick source type.
    ///
    /// `None` means no constraint: every registered system qualifies.
    /// Otherwise only systems exposing at least one source of that type are
    /// returned.
    #[must_use]
    pub fn for_source_type(&self, source_type: Option<TickSourceType>) -> Vec<Arc<TimeSystem>> {
        match source_type {
            None => self.systems(),
            Some(wanted) => self
                .systems
                .values()
                .filter(|system| system.has_source_type(wanted))
                .cloned()
                .collect(),
        }
    }

    /// Deduplicated tick source metadata across the registry, optionally
    /// restricted to one source type. Feeds clock-selection menus.
    #[must_use]
    pub fn tick_metadata(&self, source_type: Option<TickSourceType>) -> Vec<TickMetadata> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for system in self.systems.values() {
            for source in system.tick_sources() {
                if let Some(wanted) = source_type {
                    if source.source_type() != wanted {
                        continue;
                    }
                }
                let metadata = source.metadata();
                if !seen.contains(&metadata.key) {
                    seen.push(metadata.key.clone());
                    out.push(metadata.clone());
                }
            }
        }
        out
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

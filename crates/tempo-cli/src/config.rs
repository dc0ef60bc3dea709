//! TOML configuration for the demo session.
//!
//! Describes the time systems to register, which tick sources they carry,
//! and the conductor's starting window and mode.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use tempo_conductor::ModeKey;
use tempo_time::{
    Bounds, Deltas, LatestDataSource, TimeSystem, TimeSystemDefaults, TimeSystemRegistry,
    WallClockSource,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub conductor: ConductorSection,
    #[serde(default)]
    pub clock: ClockSection,
    #[serde(default = "default_time_systems")]
    pub time_systems: Vec<TimeSystemSection>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            conductor: ConductorSection::default(),
            clock: ClockSection::default(),
            time_systems: default_time_systems(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConductorSection {
    /// Initial window start, epoch millis
    pub start: f64,
    /// Initial window end, epoch millis
    pub end: f64,
    /// Mode key to activate: fixed | realtime | latest
    pub mode: String,
}

impl Default for ConductorSection {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 900_000.0,
            mode: "fixed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockSection {
    /// Wall clock tick period in milliseconds
    pub period_ms: u64,
}

impl Default for ClockSection {
    fn default() -> Self {
        Self { period_ms: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSystemSection {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub utc_based: bool,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default = "default_delta_format")]
    pub delta_format: String,
    /// Follow-mode deltas advertised as defaults, millis
    #[serde(default)]
    pub start_delta: f64,
    #[serde(default)]
    pub end_delta: f64,
    /// Attach a wall clock tick source
    #[serde(default)]
    pub clock: bool,
    /// Attach a latest-available-data tick source
    #[serde(default)]
    pub data: bool,
}

fn default_delta_format() -> String {
    "duration".to_string()
}

fn default_time_systems() -> Vec<TimeSystemSection> {
    vec![TimeSystemSection {
        key: "utc".to_string(),
        name: "Coordinated Universal Time".to_string(),
        utc_based: true,
        formats: vec!["utc".to_string(), "millis".to_string()],
        delta_format: default_delta_format(),
        start_delta: 900_000.0,
        end_delta: 5_000.0,
        clock: true,
        data: false,
    }]
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.time_systems.is_empty() {
            bail!("at least one time system must be configured");
        }
        if !(self.conductor.start.is_finite() && self.conductor.end.is_finite()) {
            bail!("conductor bounds must be finite");
        }
        if self.conductor.start > self.conductor.end {
            bail!(
                "conductor start {} is after end {}",
                self.conductor.start,
                self.conductor.end
            );
        }
        if self.clock.period_ms == 0 {
            bail!("clock period must be at least 1ms");
        }

        let mode: ModeKey = self
            .conductor
            .mode
            .parse()
            .map_err(|message: String| anyhow::anyhow!(message))?;
        match mode {
            ModeKey::Fixed => {}
            ModeKey::Realtime => {
                if !self.time_systems.iter().any(|section| section.clock) {
                    bail!("realtime mode needs a time system with a clock source");
                }
            }
            ModeKey::Latest => {
                if !self.time_systems.iter().any(|section| section.data) {
                    bail!("latest mode needs a time system with a data source");
                }
            }
        }

        for section in &self.time_systems {
            if section.start_delta < 0.0 || section.end_delta < 0.0 {
                bail!("time system {} has negative deltas", section.key);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn initial_bounds(&self) -> Bounds {
        Bounds::new(self.conductor.start, self.conductor.end)
    }

    pub fn mode(&self) -> anyhow::Result<ModeKey> {
        self.conductor
            .mode
            .parse()
            .map_err(|message: String| anyhow::anyhow!(message))
    }

    /// Build the registry plus handles to the sources that need driving.
    #[must_use]
    pub fn build_registry(&self) -> (TimeSystemRegistry, Vec<Arc<WallClockSource>>) {
        let mut registry = TimeSystemRegistry::new();
        let mut clocks = Vec::new();

        for section in &self.time_systems {
            let mut system = TimeSystem::new(&section.key, &section.name)
                .utc_based(section.utc_based)
                .with_delta_format(&section.delta_format)
                .with_defaults(TimeSystemDefaults {
                    bounds: self.initial_bounds(),
                    deltas: Deltas::new(section.start_delta, section.end_delta),
                });
            for format in &section.formats {
                system = system.with_format(format);
            }
            if section.clock {
                let clock = Arc::new(WallClockSource::new(Duration::from_millis(
                    self.clock.period_ms,
                )));
                clocks.push(clock.clone());
                system = system.with_tick_source(clock);
            }
            if section.data {
                system = system.with_tick_source(Arc::new(LatestDataSource::new()));
            }
            registry.register(Arc::new(system));
        }

        (registry, clocks)
    }
}

//! Counter simulation policies.
//!
//! A policy document names every simulated counter and how its value evolves:
//!
//! ```toml
//! title = "PFC storm"
//!
//! [app]
//! name = "countersim"
//!
//! [counters.pfc7_rx]
//! description = "PFC priority 7 frames received"
//! counter_path = "/COUNTERS/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS"
//! counter_type = "incrementing"
//! interval_sec = 2
//! start_count = 100
//! step_count = 5
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::path::CounterPath;

/// Value-evolution policy of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    /// Written once with the initial value.
    Fixed,
    /// Starts at the initial value and grows by `step` every interval.
    Incrementing,
    /// A fresh uniform draw from `[0, 1000)` every interval.
    Random,
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Incrementing => write!(f, "incrementing"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// A validated counter policy. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterPolicy {
    /// Counter name (the policy table key).
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Counter the policy drives.
    pub path: CounterPath,
    /// How the value evolves.
    pub kind: CounterKind,
    /// First value written (unused for random counters).
    pub initial_value: i64,
    /// Increment per tick for incrementing counters.
    pub step: i64,
    /// Time between ticks.
    pub interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCounter {
    #[serde(default)]
    description: String,
    counter_path: String,
    counter_type: String,
    #[serde(default)]
    counter_value: i64,
    #[serde(default)]
    interval_sec: u64,
    #[serde(default)]
    start_count: i64,
    #[serde(default)]
    step_count: i64,
}

/// The `[app]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppInfo {
    /// Application name.
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    app: AppInfo,
    #[serde(default)]
    counters: BTreeMap<String, RawCounter>,
}

/// Decoded policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    /// Document title.
    pub title: String,
    /// The `[app]` table.
    pub app: AppInfo,
    /// Counters in name order.
    pub counters: Vec<CounterPolicy>,
}

fn invalid(counter: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidPolicy {
        counter: counter.to_string(),
        reason: reason.into(),
    }
}

impl CounterPolicy {
    fn from_raw(name: &str, raw: RawCounter) -> Result<Self, ConfigError> {
        let kind = match raw.counter_type.trim().to_ascii_lowercase().as_str() {
            "fixed" => CounterKind::Fixed,
            "incrementing" => CounterKind::Incrementing,
            "random" => CounterKind::Random,
            other => return Err(invalid(name, format!("unknown counter_type '{other}'"))),
        };

        let path = CounterPath::parse(&raw.counter_path).map_err(|e| invalid(name, e.to_string()))?;

        if kind != CounterKind::Fixed && raw.interval_sec == 0 {
            return Err(invalid(name, format!("{kind} counters need interval_sec > 0")));
        }

        let initial_value = match kind {
            CounterKind::Fixed => raw.counter_value,
            CounterKind::Incrementing => raw.start_count,
            CounterKind::Random => 0,
        };

        Ok(Self {
            name: name.to_string(),
            description: raw.description,
            path,
            kind,
            initial_value,
            step: raw.step_count,
            interval: Duration::from_secs(raw.interval_sec),
        })
    }
}

impl PolicyDocument {
    /// Decode and validate a TOML policy document. Any malformed entry fails the whole document.
    pub fn from_toml_str(name: &str, text: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument = toml::from_str(text).map_err(|e| ConfigError::decode(name, e))?;

        let counters = raw
            .counters
            .into_iter()
            .map(|(counter, entry)| CounterPolicy::from_raw(&counter, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            title: raw.title,
            app: raw.app,
            counters,
        })
    }

    /// Read and decode a policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_toml_str(&path.display().to_string(), &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::CounterScope;

    const DOC: &str = r#"
        title = "sample"

        [app]
        name = "countersim"

        [counters.pfc7]
        description = "pfc frames"
        counter_path = "/COUNTERS/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS"
        counter_type = "incrementing"
        interval_sec = 2
        start_count = 100
        step_count = 5

        [counters.occupancy]
        counter_path = "/COUNTERS/Ethernet8/Queues/SAI_QUEUE_STAT_CURR_OCCUPANCY_BYTES"
        counter_type = "random"
        interval_sec = 1

        [counters.drops]
        counter_path = "/COUNTERS/Ethernet0/SAI_PORT_STAT_IF_IN_DISCARDS"
        counter_type = "Fixed"
        counter_value = 7
    "#;

    #[test]
    fn decodes_every_kind() {
        let doc = PolicyDocument::from_toml_str("policy", DOC).unwrap();
        assert_eq!(doc.title, "sample");
        assert_eq!(doc.app.name, "countersim");

        let names: Vec<&str> = doc.counters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["drops", "occupancy", "pfc7"]);

        let drops = &doc.counters[0];
        assert_eq!(drops.kind, CounterKind::Fixed);
        assert_eq!(drops.initial_value, 7);

        let occupancy = &doc.counters[1];
        assert_eq!(occupancy.kind, CounterKind::Random);
        assert_eq!(occupancy.path.scope(), CounterScope::Queue { index: None });
        assert_eq!(occupancy.interval, Duration::from_secs(1));

        let pfc = &doc.counters[2];
        assert_eq!(pfc.kind, CounterKind::Incrementing);
        assert_eq!(pfc.initial_value, 100);
        assert_eq!(pfc.step, 5);
        assert_eq!(pfc.description, "pfc frames");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = PolicyDocument::from_toml_str(
            "policy",
            "[counters.x]\ncounter_path = \"/C/E/S\"\ncounter_type = \"sawtooth\"\ninterval_sec = 1\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPolicy { ref counter, .. } if counter == "x"));
    }

    #[test]
    fn scheduled_kinds_need_an_interval() {
        let err = PolicyDocument::from_toml_str(
            "policy",
            "[counters.x]\ncounter_path = \"/C/E/S\"\ncounter_type = \"random\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("interval_sec"));
    }

    #[test]
    fn malformed_path_is_rejected() {
        let err = PolicyDocument::from_toml_str(
            "policy",
            "[counters.x]\ncounter_path = \"/C\"\ncounter_type = \"fixed\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPolicy { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PolicyDocument::load(dir.path().join("policy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

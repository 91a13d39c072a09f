//! Harness configuration.
//!
//! Decoded once from a TOML file at startup. Every section has defaults
//! matching the reference test bed (store on localhost, counters database 2,
//! gNMI service on port 8080, 15 second tick budget).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Store connection settings.
    pub store: StoreConfig,
    /// Telemetry service endpoint.
    pub telemetry: TelemetryConfig,
    /// Seed documents loaded at startup.
    pub seed: SeedConfig,
    /// Counter generator settings.
    pub simulation: SimulationConfig,
    /// Scenario battery settings.
    pub validation: ValidationConfig,
}

impl HarnessConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::decode(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.tick_budget_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "simulation.tick_budget_secs must be greater than zero".to_string(),
            });
        }
        if self.telemetry.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "telemetry.request_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.telemetry.endpoint.starts_with("https://") && self.telemetry.tls.is_none() {
            return Err(ConfigError::Invalid {
                reason: "telemetry.endpoint uses https but [telemetry.tls] is missing; \
                         a CA certificate is required, verification cannot be skipped"
                    .to_string(),
            });
        }
        if self.store.connection == ConnectionMode::Unix && self.store.socket_path.is_none() {
            return Err(ConfigError::Invalid {
                reason: "store.socket_path is required when store.connection = \"unix\"".to_string(),
            });
        }
        Ok(())
    }
}

/// How the store adapter reaches the store.
///
/// Passed explicitly through the adapter's constructor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// TCP to `address`.
    #[default]
    Tcp,
    /// Local unix socket at `socket_path`.
    Unix,
}

/// Where the counter store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// `host:port` used in TCP mode.
    pub address: String,
    /// Logical database index holding the counters.
    pub database: u8,
    /// Transport used to reach the store.
    pub connection: ConnectionMode,
    /// Socket path used in unix mode.
    pub socket_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            database: 2,
            connection: ConnectionMode::Tcp,
            socket_path: None,
        }
    }
}

impl StoreConfig {
    /// Connection URL understood by the store client.
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        match self.connection {
            ConnectionMode::Tcp => Ok(format!("redis://{}/{}", self.address, self.database)),
            ConnectionMode::Unix => {
                let socket = self.socket_path.as_ref().ok_or_else(|| ConfigError::Invalid {
                    reason: "store.socket_path is required for unix connections".to_string(),
                })?;
                Ok(format!("redis+unix://{}?db={}", socket.display(), self.database))
            }
        }
    }
}

/// How to reach the gNMI service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// gNMI endpoint URI.
    pub endpoint: String,
    /// Per-request and connect timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Dial with TLS when present.
    pub tls: Option<TlsConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: 10,
            tls: None,
        }
    }
}

impl TelemetryConfig {
    /// [`Self::request_timeout_secs`] as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// TLS settings for the gNMI channel.
///
/// The server certificate is always verified against `ca_certificate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// PEM file with the CA that signed the server certificate.
    pub ca_certificate: PathBuf,
    /// Name expected in the server certificate.
    pub domain_name: String,
}

/// One seed document and the store key it is loaded under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedTable {
    /// Store key for a single-record document. When absent the document is a
    /// map of store key -> record.
    pub key: Option<String>,
    /// File name relative to `seed.data_dir`.
    pub file: String,
}

impl SeedTable {
    fn keyed(key: &str, file: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            file: file.to_string(),
        }
    }
}

/// Seed documents and the directory they are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedConfig {
    /// Directory seed table files are relative to.
    pub data_dir: PathBuf,
    /// Documents to load, in order.
    pub tables: Vec<SeedTable>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tables: vec![
                SeedTable::keyed("COUNTERS_PORT_NAME_MAP", "COUNTERS_PORT_NAME_MAP.json"),
                SeedTable::keyed("COUNTERS_QUEUE_NAME_MAP", "COUNTERS_QUEUE_NAME_MAP.json"),
                SeedTable::keyed("COUNTERS:oid:0x1000000000002", "COUNTERS:Ethernet0.json"),
                SeedTable::keyed("COUNTERS:oid:0x1000000000004", "COUNTERS:Ethernet8.json"),
                SeedTable::keyed("COUNTERS:oid:0x1000000000013", "COUNTERS:Ethernet68.json"),
                SeedTable::keyed("COUNTERS:oid:0x15000000000025", "COUNTERS:Ethernet0:Queues.json"),
                SeedTable::keyed("COUNTERS:oid:0x1500000000004d", "COUNTERS:Ethernet8:Queues.json"),
                SeedTable::keyed("COUNTERS:oid:0x15000000000179", "COUNTERS:Ethernet68:Queues.json"),
            ],
        }
    }
}

/// Which queue a queue-scoped counter path addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueSelection {
    /// Always the interface's first queue (`<interface>:0`).
    #[default]
    FirstQueue,
    /// The queue index carried by the path, `0` when the path names none.
    PathIndex,
}

/// Counter generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// TOML counter policy document.
    pub policy_file: PathBuf,
    /// Ceiling for one value-generation-plus-write cycle.
    pub tick_budget_secs: u64,
    /// Which queue a queue-scoped path addresses.
    pub queue_selection: QueueSelection,
    /// JSON document whose field names make up a port counter row.
    pub port_template: Option<PathBuf>,
    /// JSON document whose field names make up a queue counter row.
    pub queue_template: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            policy_file: PathBuf::from("data/policy.toml"),
            tick_budget_secs: 15,
            queue_selection: QueueSelection::FirstQueue,
            port_template: None,
            queue_template: None,
        }
    }
}

impl SimulationConfig {
    /// [`Self::tick_budget_secs`] as a duration.
    #[must_use]
    pub const fn tick_budget(&self) -> Duration {
        Duration::from_secs(self.tick_budget_secs)
    }
}

/// Scenario battery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// TOML scenario battery. The built-in battery runs when absent.
    pub scenario_file: Option<PathBuf>,
    /// Namespace the built-in battery queries.
    pub target: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            scenario_file: None,
            target: "COUNTERS_DB".to_string(),
        }
    }
}

//! Entity-name to object-identifier lookup.
//!
//! The telemetry backend keys counter rows by opaque object identifiers
//! (`oid:0x1000000000004`). Human-readable port and queue names map to them
//! through two reference tables that are loaded once and never mutated.

use std::path::Path;

use crate::error::{ConfigError, HarnessError};
use crate::storage::{CounterStore, FieldMap};

/// Store key of the port name -> oid table.
pub const PORT_NAME_MAP: &str = "COUNTERS_PORT_NAME_MAP";
/// Store key of the queue name -> oid table.
pub const QUEUE_NAME_MAP: &str = "COUNTERS_QUEUE_NAME_MAP";

/// Read-only name -> object identifier map for ports and queues.
///
/// Safe to share between generators behind an `Arc` once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIdentifierMap {
    ports: FieldMap,
    queues: FieldMap,
}

fn decode_table(name: &str, json: &str) -> Result<FieldMap, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::decode(name, e))
}

impl ObjectIdentifierMap {
    /// Map from already decoded name tables.
    #[must_use]
    pub const fn new(ports: FieldMap, queues: FieldMap) -> Self {
        Self { ports, queues }
    }

    /// Decode both tables from JSON objects of name -> oid strings.
    pub fn from_json(ports_json: &str, queues_json: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            ports: decode_table(PORT_NAME_MAP, ports_json)?,
            queues: decode_table(QUEUE_NAME_MAP, queues_json)?,
        })
    }

    /// Load both tables from JSON files.
    pub fn load_files(ports: impl AsRef<Path>, queues: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let read = |path: &Path| -> Result<FieldMap, ConfigError> {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
            serde_json::from_str(&text).map_err(|e| ConfigError::decode(path, e))
        };
        Ok(Self {
            ports: read(ports.as_ref())?,
            queues: read(queues.as_ref())?,
        })
    }

    /// Load both tables from their store keys.
    ///
    /// A missing port table is a configuration error: nothing can resolve
    /// without it. A missing queue table only disables queue counters.
    pub async fn load_from_store(store: &dyn CounterStore) -> Result<Self, HarnessError> {
        let ports = store.read_record(PORT_NAME_MAP).await?;
        if ports.is_empty() {
            return Err(ConfigError::Invalid {
                reason: format!("{PORT_NAME_MAP} is missing from the store; seed it first"),
            }
            .into());
        }
        let queues = store.read_record(QUEUE_NAME_MAP).await?;
        Ok(Self { ports, queues })
    }

    /// Object identifier of a port, e.g. `Ethernet8`.
    pub fn port_oid(&self, name: &str) -> Result<&str, ConfigError> {
        self.ports
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownEntity {
                name: name.to_string(),
                table: PORT_NAME_MAP,
            })
    }

    /// Object identifier of a queue, e.g. `Ethernet8:0`.
    pub fn queue_oid(&self, name: &str) -> Result<&str, ConfigError> {
        self.queues
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownEntity {
                name: name.to_string(),
                table: QUEUE_NAME_MAP,
            })
    }

    /// Port name to object identifier.
    #[must_use]
    pub const fn ports(&self) -> &FieldMap {
        &self.ports
    }

    /// `<interface>:<queue>` to object identifier.
    #[must_use]
    pub const fn queues(&self) -> &FieldMap {
        &self.queues
    }
}

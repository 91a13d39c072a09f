//! One-time bulk load of synthetic device state.
//!
//! Seed documents are JSON. Every top-level value is classified once, at
//! decode time, as either a record (flat field table written with one
//! multi-field set) or a scalar (which has no hash representation and is
//! skipped).

use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::config::SeedConfig;
use crate::error::{ConfigError, HarnessResult, StoreError};
use crate::storage::{CounterStore, FieldMap};

/// A decoded seed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedValue {
    /// A lone value with no field structure.
    Scalar(String),
    /// A flat field -> value table.
    Record(FieldMap),
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

impl SeedValue {
    /// Classify a JSON value. Object members become record fields; nested
    /// structures inside a record are kept as their JSON text.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Self::Record(
                map.iter()
                    .map(|(field, v)| (field.clone(), scalar_text(v)))
                    .collect(),
            ),
            other => Self::Scalar(scalar_text(other)),
        }
    }
}

/// Decode one seed document into `(store key, value)` entries.
///
/// With a `key` the whole document is the record stored under it; without one
/// the document must be an object mapping store keys to values.
pub fn decode_document(name: &str, key: Option<&str>, json: &str) -> Result<Vec<(String, SeedValue)>, ConfigError> {
    let doc: JsonValue = serde_json::from_str(json).map_err(|e| ConfigError::decode(name, e))?;

    match key {
        Some(key) => Ok(vec![(key.to_string(), SeedValue::from_json(&doc))]),
        None => match doc {
            JsonValue::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| (k.clone(), SeedValue::from_json(v)))
                .collect()),
            _ => Err(ConfigError::decode(
                name,
                "a document without a key must be an object of key -> record",
            )),
        },
    }
}

/// Counts from a seeding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Records written to the store.
    pub records_written: usize,
    /// Keys whose value was not a record.
    pub skipped: Vec<String>,
}

/// Write every record entry; scalar entries are logged and skipped.
pub async fn load_entries(
    store: &dyn CounterStore,
    entries: Vec<(String, SeedValue)>,
) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    for (key, value) in entries {
        match value {
            SeedValue::Record(fields) if !fields.is_empty() => {
                store.write_record(&key, &fields).await?;
                debug!(key = %key, fields = fields.len(), "seeded record");
                report.records_written += 1;
            }
            SeedValue::Record(_) => {
                warn!(key = %key, "empty record in seed data, skipped");
                report.skipped.push(key);
            }
            SeedValue::Scalar(text) => {
                warn!(key = %key, value = %text, "invalid data for store: not a record, skipped");
                report.skipped.push(key);
            }
        }
    }

    Ok(report)
}

/// Read, decode and load every configured seed table.
///
/// Any unreadable or undecodable file fails the whole load before anything is
/// written.
pub async fn seed_store(store: &dyn CounterStore, config: &SeedConfig) -> HarnessResult<SeedReport> {
    let mut entries = Vec::new();
    for table in &config.tables {
        let path = config.data_dir.join(&table.file);
        entries.extend(read_document(&path, table.key.as_deref())?);
    }

    let report = load_entries(store, entries).await?;
    info!(
        records = report.records_written,
        skipped = report.skipped.len(),
        "seeded counter store"
    );
    Ok(report)
}

fn read_document(path: &Path, key: Option<&str>) -> Result<Vec<(String, SeedValue)>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    decode_document(&path.display().to_string(), key, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedTable;
    use crate::storage::InMemoryStore;

    #[test]
    fn objects_become_records_and_the_rest_scalars() {
        let doc: JsonValue = serde_json::from_str(r#"{"A": "1", "B": 2, "C": true}"#).unwrap();
        let SeedValue::Record(fields) = SeedValue::from_json(&doc) else {
            panic!("expected record");
        };
        assert_eq!(fields["A"], "1");
        assert_eq!(fields["B"], "2");
        assert_eq!(fields["C"], "true");

        assert_eq!(
            SeedValue::from_json(&JsonValue::String("x".into())),
            SeedValue::Scalar("x".into())
        );
        assert_eq!(
            SeedValue::from_json(&serde_json::json!(7)),
            SeedValue::Scalar("7".into())
        );
    }

    #[test]
    fn keyless_documents_must_be_objects() {
        let entries = decode_document("d", None, r#"{"K1": {"f": "1"}, "K2": "oops"}"#).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(decode_document("d", None, "[1, 2]").is_err());
        assert!(decode_document("d", Some("K"), "not json").is_err());
    }

    #[tokio::test]
    async fn scalars_are_skipped_not_written() {
        let store = InMemoryStore::new();
        let entries = decode_document("d", None, r#"{"K1": {"f": "1"}, "K2": "oops", "K3": {}}"#).unwrap();

        let report = load_entries(&store, entries).await.unwrap();
        assert_eq!(report.records_written, 1);
        assert_eq!(report.skipped, vec!["K2".to_string(), "K3".to_string()]);
        assert!(store.exists("K1").await.unwrap());
        assert!(!store.exists("K2").await.unwrap());
    }

    #[tokio::test]
    async fn seeds_configured_tables_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ports.json"), r#"{"Ethernet0": "oid:0x1"}"#).unwrap();
        std::fs::write(dir.path().join("rows.json"), r#"{"COUNTERS:oid:0x1": {"RX": "5"}}"#).unwrap();

        let config = SeedConfig {
            data_dir: dir.path().to_path_buf(),
            tables: vec![
                SeedTable {
                    key: Some("COUNTERS_PORT_NAME_MAP".to_string()),
                    file: "ports.json".to_string(),
                },
                SeedTable {
                    key: None,
                    file: "rows.json".to_string(),
                },
            ],
        };

        let store = InMemoryStore::new();
        let report = seed_store(&store, &config).await.unwrap();
        assert_eq!(report.records_written, 2);
        assert_eq!(store.read_record("COUNTERS:oid:0x1").await.unwrap()["RX"], "5");
    }

    #[tokio::test]
    async fn missing_seed_file_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rows.json"), r#"{"K": {"f": "1"}}"#).unwrap();

        let config = SeedConfig {
            data_dir: dir.path().to_path_buf(),
            tables: vec![
                SeedTable {
                    key: None,
                    file: "rows.json".to_string(),
                },
                SeedTable {
                    key: None,
                    file: "missing.json".to_string(),
                },
            ],
        };

        let store = InMemoryStore::new();
        let err = seed_store(&store, &config).await.unwrap_err();
        assert!(err.is_fatal_at_startup());
        assert!(store.keys().unwrap().is_empty());
    }
}

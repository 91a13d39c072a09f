//! Store-resident counter rows.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::storage::FieldMap;

/// Table prefix of every counter row key.
pub const COUNTERS_TABLE: &str = "COUNTERS";

/// Value every non-target field of a staged row is reset to.
pub const NEUTRAL_VALUE: &str = "0";

/// `<Table>:<ObjectIdentifier>` key of one counter row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreKey(String);

impl StoreKey {
    /// Key of the counter row for object identifier `oid`.
    #[must_use]
    pub fn counters(oid: &str) -> Self {
        Self(format!("{COUNTERS_TABLE}:{oid}"))
    }

    /// The full key, e.g. `COUNTERS:oid:0x1000000000002`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field names that make up a counter row of one scope (port or queue).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTemplate {
    fields: BTreeSet<String>,
}

impl RecordTemplate {
    /// Template holding `fields`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Template made of the field names of a JSON object (values are ignored).
    pub fn from_json(name: &str, json: &str) -> Result<Self, ConfigError> {
        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| ConfigError::decode(name, e))?;
        Ok(Self::new(doc.into_iter().map(|(k, _)| k)))
    }

    /// Read a template from a JSON object file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_json(&path.display().to_string(), &text)
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// True when the template names no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A full counter row staged for a whole-row write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    /// Row key.
    pub key: StoreKey,
    /// Field the tick targeted.
    pub target: String,
    /// Every field of the row, target included.
    pub fields: FieldMap,
}

impl CounterRecord {
    /// Stage a row: every known field reset to [`NEUTRAL_VALUE`], `target` set to `value`.
    ///
    /// Known fields are the template's plus whatever the current row holds.
    #[must_use]
    pub fn stage(
        key: StoreKey,
        template: &RecordTemplate,
        current: &FieldMap,
        target: &str,
        value: &str,
    ) -> Self {
        let mut fields: FieldMap = template
            .fields()
            .chain(current.keys().map(String::as_str))
            .map(|f| (f.to_string(), NEUTRAL_VALUE.to_string()))
            .collect();
        fields.insert(target.to_string(), value.to_string());

        Self {
            key,
            target: target.to_string(),
            fields,
        }
    }

    /// Value staged for the target field.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.fields.get(&self.target).map(String::as_str)
    }
}

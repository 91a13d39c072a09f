//! Abstract store adapter trait.
//!
//! The harness treats the counter store as a namespace of string keys, each
//! mapping to a flat field/value table. Backends only need hash-style
//! get/set-multiple semantics and key existence.

use std::collections::BTreeMap;

use crate::error::StoreError;

/// Flat field -> value table stored under one key.
pub type FieldMap = BTreeMap<String, String>;

/// Store adapter used by the seeder, the counter repository and the loopback
/// telemetry responder.
///
/// # Consistency
/// - `write_record` is a single multi-field set: fields not named in the
///   write are left untouched, fields named in it are overwritten together
/// - Implementations must be safe to share between concurrently running
///   counter generators
#[tonic::async_trait]
pub trait CounterStore: Send + Sync {
    /// Read every field stored under `key`. Returns an empty map when the key is absent.
    async fn read_record(&self, key: &str) -> Result<FieldMap, StoreError>;

    /// Set every field of `fields` under `key` in one operation.
    async fn write_record(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError>;

    /// Whether `key` exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Round-trip check against the backend.
    async fn ping(&self) -> Result<(), StoreError>;
}

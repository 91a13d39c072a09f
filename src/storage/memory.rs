//! In-memory store backend.
//!
//! Thread-safe implementation of [`CounterStore`] used for tests, the dry-run
//! mode of the binary, and as the reference for hash-record semantics.
//! Writes publish keyspace events to subscribers, the way the production store
//! is configured to (`notify-keyspace-events KEA`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::StoreError;
use crate::storage::traits::{CounterStore, FieldMap};

fn lock_err(context: &'static str) -> StoreError {
    StoreError::BackendError(format!("poisoned lock: {context}"))
}

/// Kind of mutation a keyspace event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceEventKind {
    /// One or more hash fields were set.
    HSet,
}

/// Notification emitted after a key is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceEvent {
    /// Key that changed.
    pub key: String,
    /// Operation that changed it.
    pub kind: KeyspaceEventKind,
    /// Field names written by the mutation, in field order.
    pub fields: Vec<String>,
}

/// In-memory hash-record store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, FieldMap>>,
    subscribers: Mutex<Vec<Sender<KeyspaceEvent>>>,
    dropped_events: AtomicU64,
}

impl InMemoryStore {
    /// Per-subscriber event buffer.
    pub const EVENT_CAPACITY: usize = 1024;

    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to keyspace events for every subsequent write.
    ///
    /// Writers never block on a slow subscriber: events that do not fit in the
    /// subscriber's buffer are dropped and counted.
    pub fn subscribe(&self) -> Result<Receiver<KeyspaceEvent>, StoreError> {
        let (tx, rx) = bounded(Self::EVENT_CAPACITY);
        self.subscribers
            .lock()
            .map_err(|_| lock_err("subscribers"))?
            .push(tx);
        Ok(rx)
    }

    /// Number of keyspace events dropped because a subscriber was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let guard = self.records.read().map_err(|_| lock_err("records"))?;
        let mut keys: Vec<String> = guard.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn publish(&self, event: &KeyspaceEvent) -> Result<(), StoreError> {
        let mut subs = self.subscribers.lock().map_err(|_| lock_err("subscribers"))?;
        subs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        Ok(())
    }
}

#[tonic::async_trait]
impl CounterStore for InMemoryStore {
    async fn read_record(&self, key: &str) -> Result<FieldMap, StoreError> {
        let guard = self.records.read().map_err(|_| lock_err("records"))?;
        Ok(guard.get(key).cloned().unwrap_or_default())
    }

    async fn write_record(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        if fields.is_empty() {
            // HMSET with no fields is rejected by the production store as well.
            return Err(StoreError::BackendError(format!(
                "wrong number of arguments for multi-field set on '{key}'"
            )));
        }

        {
            let mut guard = self.records.write().map_err(|_| lock_err("records"))?;
            let record = guard.entry(key.to_string()).or_default();
            for (field, value) in fields {
                record.insert(field.clone(), value.clone());
            }
        }

        self.publish(&KeyspaceEvent {
            key: key.to_string(),
            kind: KeyspaceEventKind::HSet,
            fields: fields.keys().cloned().collect(),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let guard = self.records.read().map_err(|_| lock_err("records"))?;
        Ok(guard.contains_key(key))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

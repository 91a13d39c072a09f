//! Counter state repository.
//!
//! Translates counter paths into store keys through the object identifier
//! map, stages whole counter rows, and writes them through the store adapter.

mod oid;
mod record;

use std::sync::Arc;

use crate::config::QueueSelection;
use crate::error::{ConfigError, StoreError};
use crate::path::{CounterPath, CounterScope};
use crate::storage::CounterStore;

pub use oid::{ObjectIdentifierMap, PORT_NAME_MAP, QUEUE_NAME_MAP};
pub use record::{CounterRecord, RecordTemplate, StoreKey, COUNTERS_TABLE, NEUTRAL_VALUE};

/// Outcome of resolving a counter path: where the row lives and which field to set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCounter {
    /// Row holding the counter.
    pub key: StoreKey,
    /// Name looked up in the identifier map, e.g. `Ethernet8` or `Ethernet8:0`.
    pub entity: String,
    /// Port or queue scope.
    pub scope: CounterScope,
    /// Statistic (field) the counter sets.
    pub field: String,
}

/// Resolves, stages and commits counter rows.
pub struct CounterRepository {
    store: Arc<dyn CounterStore>,
    oids: Arc<ObjectIdentifierMap>,
    queue_selection: QueueSelection,
    port_template: RecordTemplate,
    queue_template: RecordTemplate,
}

impl std::fmt::Debug for CounterRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterRepository")
            .field("queue_selection", &self.queue_selection)
            .field("ports", &self.oids.ports().len())
            .field("queues", &self.oids.queues().len())
            .finish_non_exhaustive()
    }
}

impl CounterRepository {
    /// Repository without templates, addressing the first queue of an interface.
    pub fn new(store: Arc<dyn CounterStore>, oids: Arc<ObjectIdentifierMap>) -> Self {
        Self {
            store,
            oids,
            queue_selection: QueueSelection::default(),
            port_template: RecordTemplate::default(),
            queue_template: RecordTemplate::default(),
        }
    }

    /// Choose how queue-scoped paths pick a queue.
    #[must_use]
    pub fn with_queue_selection(mut self, selection: QueueSelection) -> Self {
        self.queue_selection = selection;
        self
    }

    /// Field lists that make up port and queue rows.
    #[must_use]
    pub fn with_templates(mut self, port: RecordTemplate, queue: RecordTemplate) -> Self {
        self.port_template = port;
        self.queue_template = queue;
        self
    }

    /// The store this repository writes through.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Map a counter path to its row key.
    ///
    /// Queue-scoped paths address `<interface>:<queue>` in the queue table;
    /// which queue is decided by the configured [`QueueSelection`].
    pub fn resolve(&self, path: &CounterPath) -> Result<ResolvedCounter, ConfigError> {
        let (entity, oid) = match path.scope() {
            CounterScope::Port => {
                let entity = path.entity().to_string();
                let oid = self.oids.port_oid(&entity)?.to_string();
                (entity, oid)
            }
            CounterScope::Queue { index } => {
                let queue = match self.queue_selection {
                    QueueSelection::FirstQueue => 0,
                    QueueSelection::PathIndex => index.unwrap_or(0),
                };
                let entity = format!("{}:{queue}", path.entity());
                let oid = self.oids.queue_oid(&entity)?.to_string();
                (entity, oid)
            }
        };

        Ok(ResolvedCounter {
            key: StoreKey::counters(&oid),
            entity,
            scope: path.scope(),
            field: path.statistic().to_string(),
        })
    }

    fn template(&self, scope: CounterScope) -> &RecordTemplate {
        match scope {
            CounterScope::Port => &self.port_template,
            CounterScope::Queue { .. } => &self.queue_template,
        }
    }

    /// Read the current row and stage it with only the target field non-neutral.
    pub async fn stage(&self, counter: &ResolvedCounter, value: &str) -> Result<CounterRecord, StoreError> {
        let current = self.store.read_record(counter.key.as_str()).await?;
        Ok(CounterRecord::stage(
            counter.key.clone(),
            self.template(counter.scope),
            &current,
            &counter.field,
            value,
        ))
    }

    /// Write a staged row as one multi-field set.
    pub async fn commit(&self, record: &CounterRecord) -> Result<(), StoreError> {
        self.store.write_record(record.key.as_str(), &record.fields).await
    }

    /// Stage and commit `value` for `counter`.
    pub async fn update(&self, counter: &ResolvedCounter, value: i64) -> Result<CounterRecord, StoreError> {
        let record = self.stage(counter, &value.to_string()).await?;
        self.commit(&record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FieldMap, InMemoryStore};

    const PORTS: &str = r#"{"Ethernet8": "oid:0x1000000000004", "Ethernet68": "oid:0x1000000000013"}"#;
    const QUEUES: &str = r#"{"Ethernet8:0": "oid:0x1500000000004d", "Ethernet8:3": "oid:0x15000000000050"}"#;

    fn repository(store: Arc<InMemoryStore>) -> CounterRepository {
        let oids = ObjectIdentifierMap::from_json(PORTS, QUEUES).unwrap();
        CounterRepository::new(store, Arc::new(oids))
    }

    #[test]
    fn resolves_port_counter() {
        let repo = repository(Arc::new(InMemoryStore::new()));
        let path = CounterPath::parse("/Counters/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS").unwrap();

        let resolved = repo.resolve(&path).unwrap();
        assert_eq!(resolved.key.as_str(), "COUNTERS:oid:0x1000000000013");
        assert_eq!(resolved.entity, "Ethernet68");
        assert_eq!(resolved.field, "SAI_PORT_STAT_PFC_7_RX_PKTS");
    }

    #[test]
    fn first_queue_selection_ignores_path_index() {
        let repo = repository(Arc::new(InMemoryStore::new()));
        let path = CounterPath::parse("/Counters/Ethernet8/Queues[index=3]/SAI_QUEUE_STAT_PACKETS").unwrap();

        let resolved = repo.resolve(&path).unwrap();
        assert_eq!(resolved.entity, "Ethernet8:0");
        assert_eq!(resolved.key.as_str(), "COUNTERS:oid:0x1500000000004d");
    }

    #[test]
    fn path_index_selection_uses_path_queue() {
        let repo = repository(Arc::new(InMemoryStore::new())).with_queue_selection(QueueSelection::PathIndex);

        let path = CounterPath::parse("/Counters/Ethernet8/Queues[index=3]/SAI_QUEUE_STAT_PACKETS").unwrap();
        assert_eq!(repo.resolve(&path).unwrap().entity, "Ethernet8:3");

        let path = CounterPath::parse("/Counters/Ethernet8/Queues/SAI_QUEUE_STAT_PACKETS").unwrap();
        assert_eq!(repo.resolve(&path).unwrap().entity, "Ethernet8:0");
    }

    #[test]
    fn unknown_entity_fails_resolution() {
        let repo = repository(Arc::new(InMemoryStore::new()));
        let path = CounterPath::parse("/Counters/Ethernet99/SAI_PORT_STAT_IF_IN_OCTETS").unwrap();
        let err = repo.resolve(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEntity { ref name, .. } if name == "Ethernet99"));
    }

    #[tokio::test]
    async fn update_overwrites_whole_row_and_keeps_target() {
        let store = Arc::new(InMemoryStore::new());
        let seeded: FieldMap = [("SAI_PORT_STAT_PFC_7_RX_PKTS", "6"), ("SAI_PORT_STAT_IF_IN_OCTETS", "123")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        store
            .write_record("COUNTERS:oid:0x1000000000013", &seeded)
            .await
            .unwrap();

        let repo = repository(Arc::clone(&store))
            .with_templates(RecordTemplate::new(["SAI_PORT_STAT_IF_OUT_OCTETS"]), RecordTemplate::default());
        let path = CounterPath::parse("/Counters/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS").unwrap();
        let resolved = repo.resolve(&path).unwrap();

        let record = repo.update(&resolved, 42).await.unwrap();
        assert_eq!(record.value(), Some("42"));

        let row = store.read_record("COUNTERS:oid:0x1000000000013").await.unwrap();
        assert_eq!(row["SAI_PORT_STAT_PFC_7_RX_PKTS"], "42");
        assert_eq!(row["SAI_PORT_STAT_IF_IN_OCTETS"], NEUTRAL_VALUE);
        assert_eq!(row["SAI_PORT_STAT_IF_OUT_OCTETS"], NEUTRAL_VALUE);
        assert_eq!(row.len(), 3);
    }
}

//! In-process gNMI responder over a counter store.
//!
//! Answers `Get` the way the telemetry service under test is observed to:
//! an empty target is `Unimplemented`, an unknown target or container is
//! `NotFound`, a table or row comes back as a structured `json_ietf_val`, and
//! a single field comes back as a `string_val`. Counter rows are addressed by
//! port name (`COUNTERS/Ethernet68`) and resolved through the port name map.
//!
//! Used by `--dry-run` and by tests that need a service without a network.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tonic::{Request, Response, Status};
use tracing::debug;

use super::proto::g_nmi_server::{GNmi, GNmiServer};
use super::proto::{self, typed_value, Encoding, GetRequest, GetResponse};
use super::{from_proto_path, TelemetryClient};
use crate::error::StoreError;
use crate::path::{format_path, PathElement, QUEUES_ELEMENT};
use crate::repository::{StoreKey, COUNTERS_TABLE, PORT_NAME_MAP, QUEUE_NAME_MAP};
use crate::storage::{CounterStore, FieldMap};

/// Namespace the loopback serves unless configured otherwise.
pub const DEFAULT_TARGET: &str = "COUNTERS_DB";

enum Node {
    Tree(Vec<u8>),
    Leaf(String),
}

fn store_status(err: StoreError) -> Status {
    match err {
        StoreError::ConnectionError(msg) => Status::unavailable(msg),
        other => Status::internal(other.to_string()),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Status> {
    serde_json::to_vec(value).map_err(|e| Status::internal(format!("failed to encode JSON: {e}")))
}

/// gNMI `Get` responder backed by a [`CounterStore`].
#[derive(Clone)]
pub struct LoopbackTelemetry {
    store: Arc<dyn CounterStore>,
    targets: BTreeSet<String>,
}

impl std::fmt::Debug for LoopbackTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTelemetry")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

impl LoopbackTelemetry {
    /// Responder serving the default target.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            targets: BTreeSet::from([DEFAULT_TARGET.to_string()]),
        }
    }

    /// Serve `target` in addition to the default namespace.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.insert(target.into());
        self
    }

    /// Wrap as a tonic service.
    #[must_use]
    pub fn into_server(self) -> GNmiServer<Self> {
        GNmiServer::new(self)
    }

    async fn answer(&self, request: GetRequest) -> Result<GetResponse, Status> {
        let prefix = request.prefix.unwrap_or_default();
        if prefix.target.is_empty() {
            return Err(Status::unimplemented("no target specified in path prefix"));
        }
        if !self.targets.contains(&prefix.target) {
            return Err(Status::not_found(format!("target {} not found", prefix.target)));
        }
        match Encoding::try_from(request.encoding) {
            Ok(Encoding::JsonIetf | Encoding::Json) => {}
            _ => return Err(Status::unimplemented(format!("unsupported encoding {}", request.encoding))),
        }
        if request.path.is_empty() {
            return Err(Status::invalid_argument("request carries no path"));
        }

        let prefix_elems = from_proto_path(&prefix);
        let mut notification = Vec::with_capacity(request.path.len());
        for path in request.path {
            let mut elems = prefix_elems.clone();
            elems.extend(from_proto_path(&path));
            debug!(target = %prefix.target, path = %format_path(&elems), "loopback get");

            let value = match self.lookup(&elems).await? {
                Node::Tree(json) => typed_value::Value::JsonIetfVal(json),
                Node::Leaf(text) => typed_value::Value::StringVal(text),
            };

            notification.push(proto::Notification {
                timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
                prefix: Some(proto::Path {
                    target: prefix.target.clone(),
                    ..proto::Path::default()
                }),
                update: vec![proto::Update {
                    path: Some(path),
                    val: Some(proto::TypedValue { value: Some(value) }),
                    duplicates: 0,
                }],
                ..proto::Notification::default()
            });
        }

        Ok(GetResponse { notification })
    }

    async fn lookup(&self, elems: &[PathElement]) -> Result<Node, Status> {
        let not_found = || Status::not_found(format!("path {} not found", format_path(elems)));

        match elems {
            [] => Err(Status::invalid_argument("empty path")),
            [table] => {
                let record = self.read(&table.name).await?;
                if record.is_empty() {
                    return Err(not_found());
                }
                Ok(Node::Tree(encode(&record)?))
            }
            [table, entity, rest @ ..] => {
                let key = self.row_key(&table.name, &entity.name).await?.ok_or_else(not_found)?;
                match rest {
                    [] => {
                        let record = self.read(&key).await?;
                        Ok(Node::Tree(encode(&record)?))
                    }
                    [queues] if table.name == COUNTERS_TABLE && queues.name == QUEUES_ELEMENT => {
                        let rows = self.queue_rows(&entity.name).await?;
                        if rows.is_empty() {
                            return Err(not_found());
                        }
                        Ok(Node::Tree(encode(&rows)?))
                    }
                    [field] => {
                        let record = self.read(&key).await?;
                        record.get(&field.name).cloned().map(Node::Leaf).ok_or_else(not_found)
                    }
                    _ => Err(not_found()),
                }
            }
        }
    }

    async fn read(&self, key: &str) -> Result<FieldMap, Status> {
        self.store.read_record(key).await.map_err(store_status)
    }

    /// Key of the row `entity` names in `table`, if the row exists.
    async fn row_key(&self, table: &str, entity: &str) -> Result<Option<String>, Status> {
        if table == COUNTERS_TABLE {
            let ports = self.read(PORT_NAME_MAP).await?;
            if let Some(oid) = ports.get(entity) {
                return Ok(Some(StoreKey::counters(oid).as_str().to_string()));
            }
        }
        let key = format!("{table}:{entity}");
        let exists = self.store.exists(&key).await.map_err(store_status)?;
        Ok(exists.then_some(key))
    }

    /// Every queue row of an interface, keyed by queue name.
    async fn queue_rows(&self, interface: &str) -> Result<BTreeMap<String, FieldMap>, Status> {
        let queues = self.read(QUEUE_NAME_MAP).await?;
        let prefix = format!("{interface}:");
        let mut rows = BTreeMap::new();
        for (name, oid) in queues.iter().filter(|(name, _)| name.starts_with(&prefix)) {
            let row = self.read(StoreKey::counters(oid).as_str()).await?;
            if !row.is_empty() {
                rows.insert(name.clone(), row);
            }
        }
        Ok(rows)
    }
}

#[tonic::async_trait]
impl GNmi for LoopbackTelemetry {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        self.answer(request.into_inner()).await.map(Response::new)
    }
}

#[tonic::async_trait]
impl TelemetryClient for LoopbackTelemetry {
    async fn get(&self, request: GetRequest) -> Result<GetResponse, Status> {
        self.answer(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_path;
    use crate::storage::InMemoryStore;
    use crate::telemetry::build_get_request;
    use tonic::Code;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    async fn loopback() -> LoopbackTelemetry {
        let store = Arc::new(InMemoryStore::new());
        store
            .write_record(PORT_NAME_MAP, &fields(&[("Ethernet68", "oid:0x1000000000013")]))
            .await
            .unwrap();
        store
            .write_record(
                QUEUE_NAME_MAP,
                &fields(&[("Ethernet68:0", "oid:0x15000000000179"), ("Ethernet68:1", "oid:0x1500000000017a")]),
            )
            .await
            .unwrap();
        store
            .write_record("COUNTERS:oid:0x1000000000013", &fields(&[("SAI_PORT_STAT_PFC_7_RX_PKTS", "6")]))
            .await
            .unwrap();
        store
            .write_record("COUNTERS:oid:0x15000000000179", &fields(&[("SAI_QUEUE_STAT_PACKETS", "1")]))
            .await
            .unwrap();
        LoopbackTelemetry::new(store)
    }

    async fn get(svc: &LoopbackTelemetry, target: &str, path: &str) -> Result<GetResponse, Status> {
        let req = build_get_request(target, &parse_path(path).unwrap(), Encoding::JsonIetf);
        TelemetryClient::get(svc, req).await
    }

    fn single_value(resp: &GetResponse) -> &typed_value::Value {
        resp.notification[0].update[0]
            .val
            .as_ref()
            .and_then(|v| v.value.as_ref())
            .unwrap()
    }

    #[tokio::test]
    async fn empty_target_is_unimplemented() {
        let svc = loopback().await;
        let err = get(&svc, "", "/MyCounters").await.unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn unknown_target_and_container_are_not_found() {
        let svc = loopback().await;
        assert_eq!(get(&svc, "MY_DB", "/MyCounters").await.unwrap_err().code(), Code::NotFound);
        assert_eq!(get(&svc, DEFAULT_TARGET, "/MyCounters").await.unwrap_err().code(), Code::NotFound);
        assert_eq!(
            get(&svc, DEFAULT_TARGET, "/COUNTERS/Ethernet99").await.unwrap_err().code(),
            Code::NotFound
        );
        assert_eq!(
            get(&svc, DEFAULT_TARGET, "/COUNTERS/Ethernet68/NO_SUCH_STAT").await.unwrap_err().code(),
            Code::NotFound
        );
    }

    #[tokio::test]
    async fn tables_come_back_structured() {
        let svc = loopback().await;
        let resp = get(&svc, DEFAULT_TARGET, "/COUNTERS_PORT_NAME_MAP").await.unwrap();
        let typed_value::Value::JsonIetfVal(json) = single_value(&resp) else {
            panic!("expected json_ietf_val");
        };
        let tree: serde_json::Value = serde_json::from_slice(json).unwrap();
        assert_eq!(tree, serde_json::json!({"Ethernet68": "oid:0x1000000000013"}));
    }

    #[tokio::test]
    async fn port_rows_resolve_through_the_name_map() {
        let svc = loopback().await;
        let resp = get(&svc, DEFAULT_TARGET, "/COUNTERS/Ethernet68").await.unwrap();
        let typed_value::Value::JsonIetfVal(json) = single_value(&resp) else {
            panic!("expected json_ietf_val");
        };
        let tree: serde_json::Value = serde_json::from_slice(json).unwrap();
        assert_eq!(tree["SAI_PORT_STAT_PFC_7_RX_PKTS"], "6");
    }

    #[tokio::test]
    async fn leaf_comes_back_as_string() {
        let svc = loopback().await;
        let resp = get(&svc, DEFAULT_TARGET, "/COUNTERS/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS")
            .await
            .unwrap();
        assert_eq!(single_value(&resp), &typed_value::Value::StringVal("6".to_string()));
        assert_eq!(resp.notification[0].prefix.as_ref().unwrap().target, DEFAULT_TARGET);
    }

    #[tokio::test]
    async fn queues_collect_every_seeded_queue_row() {
        let svc = loopback().await;
        let resp = get(&svc, DEFAULT_TARGET, "/COUNTERS/Ethernet68/Queues").await.unwrap();
        let typed_value::Value::JsonIetfVal(json) = single_value(&resp) else {
            panic!("expected json_ietf_val");
        };
        let tree: serde_json::Value = serde_json::from_slice(json).unwrap();
        assert_eq!(tree, serde_json::json!({"Ethernet68:0": {"SAI_QUEUE_STAT_PACKETS": "1"}}));
    }

    #[tokio::test]
    async fn unsupported_encoding_is_rejected() {
        let svc = loopback().await;
        let path = parse_path("/COUNTERS_PORT_NAME_MAP").unwrap();
        let req = build_get_request(DEFAULT_TARGET, &path, Encoding::Proto);
        let err = TelemetryClient::get(&svc, req).await.unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn extra_targets_can_be_served() {
        let svc = loopback().await.with_target("COUNTERS_DB_ALT");
        assert!(get(&svc, "COUNTERS_DB_ALT", "/COUNTERS_PORT_NAME_MAP").await.is_ok());
    }
}

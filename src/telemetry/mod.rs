//! Telemetry query client.
//!
//! The harness speaks the gNMI `Get` RPC. [`TelemetryClient`] is the seam the
//! validation engine queries through; [`GnmiTelemetryClient`] dials a real
//! service and [`LoopbackTelemetry`] answers in-process from a counter store.

mod client;
mod loopback;

use tonic::Status;

use crate::path::PathElement;

/// Generated gNMI messages and service stubs.
#[allow(missing_docs)]
pub mod proto {
    tonic::include_proto!("gnmi");
}

pub use client::GnmiTelemetryClient;
pub use loopback::{LoopbackTelemetry, DEFAULT_TARGET};
pub use proto::Encoding;

/// Issues path queries against a telemetry service.
#[tonic::async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Send one `Get`. Protocol-level failures come back as a [`Status`]
    /// carrying the service's result code.
    async fn get(&self, request: proto::GetRequest) -> Result<proto::GetResponse, Status>;
}

/// Convert parsed path elements into a gNMI path.
#[must_use]
pub fn to_proto_path(elems: &[PathElement]) -> proto::Path {
    proto::Path {
        elem: elems
            .iter()
            .map(|e| proto::PathElem {
                name: e.name.clone(),
                key: e.keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            })
            .collect(),
        ..proto::Path::default()
    }
}

/// Path elements of a gNMI path. The deprecated string `element` form is
/// accepted when no structured elements are present.
#[must_use]
pub fn from_proto_path(path: &proto::Path) -> Vec<PathElement> {
    if path.elem.is_empty() {
        return path.element.iter().map(PathElement::new).collect();
    }
    path.elem
        .iter()
        .map(|e| PathElement {
            name: e.name.clone(),
            keys: e.key.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
        .collect()
}

/// Build a single-path `Get` with `target` carried in the prefix.
#[must_use]
pub fn build_get_request(target: &str, path: &[PathElement], encoding: Encoding) -> proto::GetRequest {
    proto::GetRequest {
        prefix: Some(proto::Path {
            target: target.to_string(),
            ..proto::Path::default()
        }),
        path: vec![to_proto_path(path)],
        encoding: encoding as i32,
        ..proto::GetRequest::default()
    }
}

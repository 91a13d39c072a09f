//! # countersim - device counter simulator and telemetry validation harness
//!
//! countersim seeds a key-value store with synthetic network-device counters,
//! keeps those counters moving according to a declarative policy, and checks
//! that a gNMI telemetry service reports them correctly.
//!
//! ## Core Concepts
//!
//! - **Counter path**: `/COUNTERS/<interface>[/Queues]/<statistic>`, resolved to a
//!   store row through the object identifier map
//! - **Counter policy**: fixed, incrementing or random value evolution on a timer
//! - **Generator**: one task per counter writing whole counter rows tick by tick
//! - **Scenario**: a gNMI `Get` with an expected status code and value
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use countersim::{CounterRepository, CounterSimulator, InMemoryStore, ObjectIdentifierMap};
//! use countersim::{LoopbackTelemetry, PolicyDocument, SimulationConfig};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let oids = ObjectIdentifierMap::load_from_store(store.as_ref()).await?;
//! let repository = Arc::new(CounterRepository::new(store.clone(), Arc::new(oids)));
//!
//! let policies = PolicyDocument::load("data/policy.toml")?;
//! let handle = CounterSimulator::new(repository, &SimulationConfig::default())
//!     .start(&policies.counters);
//!
//! let report = countersim::run_suite(&LoopbackTelemetry::new(store), &scenarios).await;
//! handle.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Ambient
pub mod config;
pub mod error;
pub mod logging;

// Store and counter state
pub mod path;
pub mod repository;
pub mod storage;

// Inputs
pub mod policy;
pub mod seed;

// Engines
pub mod simulation;
pub mod telemetry;
pub mod validation;

pub use config::{HarnessConfig, QueueSelection, SimulationConfig, StoreConfig, TelemetryConfig};
pub use error::{ConfigError, HarnessError, HarnessResult, ProtocolError, StoreError, TickError};
pub use path::{parse_path, CounterPath, CounterScope, PathElement};
pub use policy::{CounterKind, CounterPolicy, PolicyDocument};
pub use repository::{CounterRecord, CounterRepository, ObjectIdentifierMap, ResolvedCounter, StoreKey};
pub use seed::{seed_store, SeedReport, SeedValue};
pub use simulation::{CounterSimulator, SimulationHandle, TickReport};
pub use storage::{CounterStore, FieldMap, InMemoryStore};
#[cfg(feature = "redis-store")]
pub use storage::RedisStore;
pub use telemetry::{build_get_request, GnmiTelemetryClient, LoopbackTelemetry, TelemetryClient};
pub use validation::{
    default_battery, run_scenario, run_suite, ExpectedValue, ObservedValue, Outcome, QueryResult, QueryScenario,
    ResultCode, SuiteReport,
};

//! Store adapters.
//!
//! [`CounterStore`] is the contract; [`InMemoryStore`] backs tests and dry
//! runs, [`RedisStore`] backs real runs against the telemetry service.

mod memory;
#[cfg(feature = "redis-store")]
mod redis_store;
mod traits;

pub use memory::{InMemoryStore, KeyspaceEvent, KeyspaceEventKind};
#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
pub use traits::{CounterStore, FieldMap};

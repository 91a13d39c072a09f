//! Redis-backed store adapter.
//!
//! The telemetry service under test reads counters from Redis, so this is the
//! backend the harness seeds and mutates in a real run. One multiplexed
//! connection is shared by every counter generator.

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::config::StoreConfig;
use crate::error::{HarnessError, StoreError};
use crate::storage::traits::{CounterStore, FieldMap};

fn backend_err(err: &redis::RedisError) -> StoreError {
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
        StoreError::ConnectionError(err.to_string())
    } else {
        StoreError::BackendError(err.to_string())
    }
}

/// Store adapter over a Redis database.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect using the addressing mode carried by `config` and verify the
    /// connection with a ping.
    pub async fn connect(config: &StoreConfig) -> Result<Self, HarnessError> {
        let url = config.connection_url()?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| StoreError::ConnectionError(format!("invalid store url {url}: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| backend_err(&e))?;

        let store = Self { conn };
        store.ping().await?;
        Ok(store)
    }

    /// Enable keyspace notifications for every event class so that the
    /// telemetry service sees counter updates.
    pub async fn enable_keyspace_events(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("KEA")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| backend_err(&e))
    }
}

#[tonic::async_trait]
impl CounterStore for RedisStore {
    async fn read_record(&self, key: &str) -> Result<FieldMap, StoreError> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(|e| backend_err(&e))
    }

    async fn write_record(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect();
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(key, &items)
            .await
            .map_err(|e| backend_err(&e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(|e| backend_err(&e))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_err(&e))?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::ConnectionError(format!("unexpected ping reply: {reply}")))
        }
    }
}

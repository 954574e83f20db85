//! Shared counter store backed by Redis

use super::{CounterBackend, CounterError, CounterStore, WindowSpan};
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Bound on a single counter operation before the check fails open
const OPERATION_TIMEOUT: Duration = Duration::from_millis(500);

/// Counters shared by every replica through Redis `INCR`
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    prefix: String,
    op_timeout: Duration,
}

impl RedisCounterStore {
    /// Connect and verify the server answers, within `connect_timeout`
    pub async fn connect(url: &str, prefix: &str, connect_timeout: Duration) -> Result<Self, CounterError> {
        let client = ::redis::Client::open(url)?;
        let mut conn = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CounterError::Timeout(connect_timeout))??;

        let _: String = timeout(connect_timeout, ::redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|_| CounterError::Timeout(connect_timeout))??;

        debug!(prefix, "Shared counter store answered PING");
        Ok(Self {
            conn,
            prefix: prefix.trim_end_matches(':').to_string(),
            op_timeout: OPERATION_TIMEOUT,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: &WindowSpan) -> Result<u64, CounterError> {
        let key = self.namespaced(key);
        let mut conn = self.conn.clone();

        // INCR and expiry in one MULTI so a counter never outlives its window
        let mut pipe = ::redis::pipe();
        pipe.atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("PEXPIREAT")
            .arg(&key)
            .arg(window.end_ms)
            .ignore();

        let (count,): (u64,) = timeout(self.op_timeout, pipe.query_async(&mut conn))
            .await
            .map_err(|_| CounterError::Timeout(self.op_timeout))??;
        Ok(count)
    }

    fn backend(&self) -> CounterBackend {
        CounterBackend::Shared
    }
}

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::server_address::ServerAddress;

/// Ordering token attached to a primary's "I was elected" claim. Newer
/// elections compare greater, so a lexicographic compare of
/// `(set_version, election_id)` pairs decides which of two conflicting
/// primary claims wins.
#[derive(
    Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct ElectionId([u8; 12]);

impl ElectionId {
    pub fn new(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Builds an election id whose ordering matches the counter's. Handy for
    /// tests and for embedders that track elections numerically.
    pub fn from_counter(counter: u64) -> Self {
        let mut bytes = [0u8; 12];
        bytes[4..].copy_from_slice(&counter.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElectionId({self})")
    }
}

/// Reply to the capability-probe ("hello") command the monitor runs against
/// each tracked server. Field names follow the wire document; everything is
/// defaulted so partial replies from older servers still deserialize.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelloResponse {
    pub is_writable_primary: bool,
    pub secondary: bool,
    pub arbiter_only: bool,
    pub hidden: bool,
    /// Set by members of a replica set that are not yet initialized (ghosts).
    pub is_replica_set: bool,
    /// Router processes answer with `msg: "isdbgrid"`.
    pub msg: Option<String>,
    pub set_name: Option<String>,
    pub set_version: Option<u32>,
    pub election_id: Option<ElectionId>,
    /// The address this member believes it is reachable at.
    pub me: Option<String>,
    pub hosts: Vec<String>,
    pub passives: Vec<String>,
    pub arbiters: Vec<String>,
    pub tags: HashMap<String, String>,
    pub min_wire_version: i32,
    pub max_wire_version: i32,
    pub last_write_date: Option<SystemTime>,
    pub logical_session_timeout_minutes: Option<i64>,
}

/// Failure of a single heartbeat attempt. These never escape the engine as
/// API errors; they are recorded on the failed server's description and the
/// monitor retries on schedule.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum HeartbeatError {
    #[error("i/o failure: {0}")]
    Io(String),

    #[error("heartbeat timed out")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Opens monitoring connections. Implemented by the embedding driver; the
/// engine owns no wire format.
#[async_trait]
pub trait HeartbeatTransport: Send + Sync + 'static {
    async fn connect(
        &self,
        address: &ServerAddress,
        timeout: Duration,
    ) -> Result<Box<dyn HeartbeatStream>, HeartbeatError>;
}

/// A dedicated monitoring connection, reused across probe iterations while
/// healthy and dropped on the first failure.
#[async_trait]
pub trait HeartbeatStream: Send {
    async fn hello(&mut self) -> Result<HelloResponse, HeartbeatError>;
}

/// Application connection pool hook. The engine only ever asks the pool to
/// drop connections to a server whose heartbeat just failed; pool internals
/// are the embedder's business.
pub trait ConnectionPool: Send + Sync + 'static {
    fn invalidate(&self, address: &ServerAddress);
}

/// Default pool hook for embedders that don't pool connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopConnectionPool;

impl ConnectionPool for NoopConnectionPool {
    fn invalidate(&self, _address: &ServerAddress) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_ids_order_by_counter() {
        let older = ElectionId::from_counter(7);
        let newer = ElectionId::from_counter(8);

        assert!(newer > older);
        assert_eq!(older, ElectionId::from_counter(7));
    }

    #[test]
    fn partial_reply_deserializes_with_defaults() {
        let reply: HelloResponse = serde_json::from_str(
            r#"{
                "isWritablePrimary": true,
                "setName": "rs0",
                "hosts": ["a:27017", "b:27017"],
                "maxWireVersion": 17
            }"#,
        )
        .unwrap();

        assert!(reply.is_writable_primary);
        assert_eq!(reply.set_name.as_deref(), Some("rs0"));
        assert_eq!(reply.hosts.len(), 2);
        assert_eq!(reply.min_wire_version, 0);
        assert!(reply.last_write_date.is_none());
    }
}

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::hello::{ElectionId, HeartbeatError, HelloResponse};
use crate::server_address::ServerAddress;

/// The role a server reported on its last successful heartbeat.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ServerType {
    Unknown,
    Standalone,
    Mongos,
    RSPrimary,
    RSSecondary,
    RSArbiter,
    RSOther,
    RSGhost,
    LoadBalancer,
    /// A secondary named this address as the primary but we have not heard
    /// from it ourselves yet.
    PossiblePrimary,
}

impl ServerType {
    /// Whether a successful heartbeat has classified this server at all.
    pub fn is_known(&self) -> bool {
        !matches!(self, ServerType::Unknown | ServerType::PossiblePrimary)
    }

    /// Server types that can accept writes.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            ServerType::Standalone
                | ServerType::RSPrimary
                | ServerType::Mongos
                | ServerType::LoadBalancer
        )
    }

    /// Server types that hold data and can serve reads; arbiters, ghosts and
    /// hidden members don't count.
    pub fn is_data_bearing(&self) -> bool {
        matches!(
            self,
            ServerType::Standalone
                | ServerType::RSPrimary
                | ServerType::RSSecondary
                | ServerType::Mongos
                | ServerType::LoadBalancer
        )
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Immutable snapshot of one server's last known role and capabilities.
///
/// Every heartbeat result produces a brand-new value; nothing ever mutates a
/// description in place, so concurrent readers of a topology snapshot can
/// hold these freely.
#[derive(Clone, Debug)]
pub struct ServerDescription {
    pub address: ServerAddress,
    pub server_type: ServerType,
    pub set_name: Option<String>,
    pub set_version: Option<u32>,
    pub election_id: Option<ElectionId>,
    /// The address the server believes it is reachable at.
    pub me: Option<ServerAddress>,
    pub hosts: BTreeSet<ServerAddress>,
    pub passives: BTreeSet<ServerAddress>,
    pub arbiters: BTreeSet<ServerAddress>,
    /// Opaque to the engine; matched by read-preference tag sets.
    pub tags: HashMap<String, String>,
    pub min_wire_version: i32,
    pub max_wire_version: i32,
    /// Exponentially-weighted round-trip average, present once at least one
    /// heartbeat has succeeded.
    pub round_trip_time: Option<Duration>,
    pub last_update_time: SystemTime,
    pub last_write_date: Option<SystemTime>,
    pub logical_session_timeout_minutes: Option<i64>,
    /// Set when the last heartbeat failed; mutually exclusive with a
    /// successful role.
    pub error: Option<HeartbeatError>,
}

impl ServerDescription {
    /// A freshly discovered (or reset) server: type Unknown, no error.
    pub fn unknown(address: ServerAddress) -> Self {
        Self {
            address,
            server_type: ServerType::Unknown,
            set_name: None,
            set_version: None,
            election_id: None,
            me: None,
            hosts: BTreeSet::new(),
            passives: BTreeSet::new(),
            arbiters: BTreeSet::new(),
            tags: HashMap::new(),
            min_wire_version: 0,
            max_wire_version: 0,
            round_trip_time: None,
            last_update_time: SystemTime::now(),
            last_write_date: None,
            logical_session_timeout_minutes: None,
            error: None,
        }
    }

    /// Builds a description from a successful probe reply and the measured
    /// round-trip average.
    pub fn from_hello(
        address: ServerAddress,
        hello: &HelloResponse,
        round_trip_time: Duration,
    ) -> Self {
        Self {
            server_type: server_type_from_hello(hello),
            set_name: hello.set_name.clone(),
            set_version: hello.set_version,
            election_id: hello.election_id,
            me: hello.me.as_deref().and_then(|me| parse_reported(me)),
            hosts: parse_reported_set(&hello.hosts),
            passives: parse_reported_set(&hello.passives),
            arbiters: parse_reported_set(&hello.arbiters),
            tags: hello.tags.clone(),
            min_wire_version: hello.min_wire_version,
            max_wire_version: hello.max_wire_version,
            round_trip_time: Some(round_trip_time),
            last_update_time: SystemTime::now(),
            last_write_date: hello.last_write_date,
            logical_session_timeout_minutes: hello.logical_session_timeout_minutes,
            error: None,
            address,
        }
    }

    /// Builds the description a failed probe submits: role and metadata
    /// cleared, error retained.
    pub fn failed(address: ServerAddress, error: HeartbeatError) -> Self {
        Self {
            error: Some(error),
            ..Self::unknown(address)
        }
    }

    /// The full membership this server reported: hosts, passives and
    /// arbiters together.
    pub fn all_hosts(&self) -> impl Iterator<Item = &ServerAddress> {
        self.hosts
            .iter()
            .chain(self.passives.iter())
            .chain(self.arbiters.iter())
    }

    /// Equality for topology-diff purposes. Round-trip time and the update
    /// timestamp churn on every heartbeat and don't constitute a material
    /// change.
    pub fn topology_eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.server_type == other.server_type
            && self.set_name == other.set_name
            && self.set_version == other.set_version
            && self.election_id == other.election_id
            && self.me == other.me
            && self.hosts == other.hosts
            && self.passives == other.passives
            && self.arbiters == other.arbiters
            && self.tags == other.tags
            && self.min_wire_version == other.min_wire_version
            && self.max_wire_version == other.max_wire_version
            && self.logical_session_timeout_minutes == other.logical_session_timeout_minutes
            && self.error == other.error
    }
}

impl fmt::Display for ServerDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.server_type)?;
        if let Some(error) = &self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

fn server_type_from_hello(hello: &HelloResponse) -> ServerType {
    if hello.msg.as_deref() == Some("isdbgrid") {
        return ServerType::Mongos;
    }
    if hello.is_replica_set {
        return ServerType::RSGhost;
    }
    if hello.set_name.is_some() {
        if hello.hidden {
            ServerType::RSOther
        } else if hello.is_writable_primary {
            ServerType::RSPrimary
        } else if hello.secondary {
            ServerType::RSSecondary
        } else if hello.arbiter_only {
            ServerType::RSArbiter
        } else {
            ServerType::RSOther
        }
    } else {
        ServerType::Standalone
    }
}

fn parse_reported(raw: &str) -> Option<ServerAddress> {
    match raw.parse::<ServerAddress>() {
        Ok(address) => Some(address),
        Err(_) => {
            tracing::warn!("Ignoring unparseable address `{}` in hello reply", raw);
            None
        }
    }
}

fn parse_reported_set(raw: &[String]) -> BTreeSet<ServerAddress> {
    raw.iter().filter_map(|s| parse_reported(s)).collect()
}

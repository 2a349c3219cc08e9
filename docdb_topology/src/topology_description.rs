use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use crate::hello::ElectionId;
use crate::server_address::ServerAddress;
use crate::server_description::{ServerDescription, ServerType};

/// Wire-version range this engine knows how to talk to. Servers outside the
/// range mark the topology incompatible rather than being dropped, so the
/// embedder can surface a useful diagnostic.
pub const MIN_SUPPORTED_WIRE_VERSION: i32 = 6;
pub const MAX_SUPPORTED_WIRE_VERSION: i32 = 21;

/// The believed shape of the whole deployment.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TopologyType {
    Unknown,
    Single,
    ReplicaSetNoPrimary,
    ReplicaSetWithPrimary,
    Sharded,
    LoadBalanced,
}

/// Immutable snapshot of the cluster: what we believe every tracked address
/// is, plus the replica-set bookkeeping used to reject stale primary claims.
///
/// `update` is a pure function; the owning actor is the only writer and
/// every reader holds a complete snapshot, never a partially-applied one.
#[derive(Clone, Debug)]
pub struct TopologyDescription {
    pub topology_type: TopologyType,
    pub servers: BTreeMap<ServerAddress, ServerDescription>,
    pub set_name: Option<String>,
    pub max_set_version: Option<u32>,
    pub max_election_id: Option<ElectionId>,
    /// Minimum across data-bearing servers; None if any of them reports None.
    pub logical_session_timeout_minutes: Option<i64>,
    pub compatible: bool,
    pub compatibility_error: Option<String>,
    /// Carried for staleness math during selection.
    pub heartbeat_frequency: Duration,
    /// Width of the acceptable latency window around the fastest candidate.
    pub local_threshold: Duration,
}

impl TopologyDescription {
    /// Seeds a topology. A configured `set_name` starts discovery in
    /// `ReplicaSetNoPrimary`; load-balanced mode pins the single seed as
    /// immediately usable.
    pub fn new(
        seeds: Vec<ServerAddress>,
        set_name: Option<String>,
        load_balanced: bool,
        heartbeat_frequency: Duration,
        local_threshold: Duration,
    ) -> Self {
        let topology_type = if load_balanced {
            TopologyType::LoadBalanced
        } else if set_name.is_some() {
            TopologyType::ReplicaSetNoPrimary
        } else {
            TopologyType::Unknown
        };

        let servers = seeds
            .into_iter()
            .map(|address| {
                let mut description = ServerDescription::unknown(address.clone());
                if load_balanced {
                    description.server_type = ServerType::LoadBalancer;
                }
                (address, description)
            })
            .collect();

        Self::from_parts(
            topology_type,
            servers,
            set_name,
            None,
            None,
            heartbeat_frequency,
            local_threshold,
        )
    }

    /// Applies one server update through the discovery-and-monitoring
    /// transition table and returns the resulting snapshot.
    pub fn update(&self, incoming: ServerDescription) -> Self {
        // A monitor can race its own shutdown; updates for addresses we no
        // longer track are ignored.
        if !self.servers.contains_key(&incoming.address) {
            return self.clone();
        }

        let mut servers = self.servers.clone();
        let mut topology_type = self.topology_type;
        let mut set_name = self.set_name.clone();
        let mut max_set_version = self.max_set_version;
        let mut max_election_id = self.max_election_id;

        let server_type = incoming.server_type;
        servers.insert(incoming.address.clone(), incoming.clone());

        match topology_type {
            TopologyType::LoadBalanced | TopologyType::Single => {
                // These never change shape; the description replacement above
                // is the whole update.
            }
            TopologyType::Unknown => match server_type {
                ServerType::Standalone => {
                    topology_type = TopologyType::Single;
                    let keep = incoming.address.clone();
                    servers.retain(|address, _| *address == keep);
                }
                ServerType::Mongos => {
                    topology_type = TopologyType::Sharded;
                }
                ServerType::RSPrimary => {
                    update_rs_from_primary(
                        &mut servers,
                        &mut topology_type,
                        &mut set_name,
                        &mut max_set_version,
                        &mut max_election_id,
                        &incoming,
                    );
                }
                ServerType::RSSecondary | ServerType::RSArbiter | ServerType::RSOther => {
                    topology_type = TopologyType::ReplicaSetNoPrimary;
                    update_rs_no_primary_from_member(&mut servers, &mut set_name, &incoming);
                }
                _ => {}
            },
            TopologyType::Sharded => {
                if !matches!(server_type, ServerType::Mongos | ServerType::Unknown) {
                    servers.remove(&incoming.address);
                }
            }
            TopologyType::ReplicaSetNoPrimary => match server_type {
                ServerType::Standalone | ServerType::Mongos => {
                    servers.remove(&incoming.address);
                }
                ServerType::RSPrimary => {
                    update_rs_from_primary(
                        &mut servers,
                        &mut topology_type,
                        &mut set_name,
                        &mut max_set_version,
                        &mut max_election_id,
                        &incoming,
                    );
                }
                ServerType::RSSecondary | ServerType::RSArbiter | ServerType::RSOther => {
                    update_rs_no_primary_from_member(&mut servers, &mut set_name, &incoming);
                }
                _ => {}
            },
            TopologyType::ReplicaSetWithPrimary => match server_type {
                ServerType::Standalone | ServerType::Mongos => {
                    servers.remove(&incoming.address);
                    topology_type = check_has_primary(&servers);
                }
                ServerType::RSPrimary => {
                    update_rs_from_primary(
                        &mut servers,
                        &mut topology_type,
                        &mut set_name,
                        &mut max_set_version,
                        &mut max_election_id,
                        &incoming,
                    );
                }
                ServerType::RSSecondary | ServerType::RSArbiter | ServerType::RSOther => {
                    update_rs_with_primary_from_member(&mut servers, &set_name, &incoming);
                    topology_type = check_has_primary(&servers);
                }
                _ => {
                    topology_type = check_has_primary(&servers);
                }
            },
        }

        Self::from_parts(
            topology_type,
            servers,
            set_name,
            max_set_version,
            max_election_id,
            self.heartbeat_frequency,
            self.local_threshold,
        )
    }

    pub fn has_server(&self, address: &ServerAddress) -> bool {
        self.servers.contains_key(address)
    }

    pub fn primary(&self) -> Option<&ServerDescription> {
        self.servers
            .values()
            .find(|s| s.server_type == ServerType::RSPrimary)
    }

    /// Stable, total diff against a newer snapshot. Addresses come out in
    /// key order; `changed` uses field equality modulo round-trip time and
    /// update timestamps.
    pub fn diff(&self, newer: &Self) -> TopologyDescriptionDiff {
        let mut diff = TopologyDescriptionDiff::default();

        for (address, description) in &newer.servers {
            match self.servers.get(address) {
                None => diff.added.push(address.clone()),
                Some(previous) if !previous.topology_eq(description) => {
                    diff.changed.push(address.clone());
                }
                Some(_) => {}
            }
        }
        for address in self.servers.keys() {
            if !newer.servers.contains_key(address) {
                diff.removed.push(address.clone());
            }
        }

        diff
    }

    fn from_parts(
        topology_type: TopologyType,
        servers: BTreeMap<ServerAddress, ServerDescription>,
        set_name: Option<String>,
        max_set_version: Option<u32>,
        max_election_id: Option<ElectionId>,
        heartbeat_frequency: Duration,
        local_threshold: Duration,
    ) -> Self {
        let mut compatible = true;
        let mut compatibility_error = None;
        for server in servers.values().filter(|s| s.server_type.is_known()) {
            if server.min_wire_version > MAX_SUPPORTED_WIRE_VERSION {
                compatible = false;
                compatibility_error = Some(format!(
                    "Server at {} requires wire version {}, but this client only supports up to {}",
                    server.address, server.min_wire_version, MAX_SUPPORTED_WIRE_VERSION
                ));
            }
            if server.max_wire_version < MIN_SUPPORTED_WIRE_VERSION {
                compatible = false;
                compatibility_error = Some(format!(
                    "Server at {} reports wire version {}, but this client requires at least {}",
                    server.address, server.max_wire_version, MIN_SUPPORTED_WIRE_VERSION
                ));
                break;
            }
        }

        let mut logical_session_timeout_minutes = None;
        for server in servers
            .values()
            .filter(|s| s.server_type.is_data_bearing())
        {
            match server.logical_session_timeout_minutes {
                None => {
                    logical_session_timeout_minutes = None;
                    break;
                }
                Some(minutes) => {
                    logical_session_timeout_minutes = Some(
                        logical_session_timeout_minutes.map_or(minutes, |m: i64| m.min(minutes)),
                    );
                }
            }
        }

        Self {
            topology_type,
            servers,
            set_name,
            max_set_version,
            max_election_id,
            logical_session_timeout_minutes,
            compatible,
            compatibility_error,
            heartbeat_frequency,
            local_threshold,
        }
    }
}

impl fmt::Display for TopologyDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ Type: {:?}", self.topology_type)?;
        if let Some(set_name) = &self.set_name {
            write!(f, ", Set Name: {set_name}")?;
        }
        write!(f, ", Servers: [ ")?;
        for (i, server) in self.servers.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{server}")?;
        }
        write!(f, " ] }}")
    }
}

/// What changed between two consecutive snapshots.
#[derive(Clone, Debug, Default)]
pub struct TopologyDescriptionDiff {
    pub added: Vec<ServerAddress>,
    pub removed: Vec<ServerAddress>,
    pub changed: Vec<ServerAddress>,
}

impl TopologyDescriptionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Transition rules for an update coming from a server claiming to be the
/// primary. The claim is accepted only if its `(set_version, election_id)`
/// ordering pair is not older than the highest pair ever recorded; an
/// accepted primary's member list is authoritative for the whole set.
fn update_rs_from_primary(
    servers: &mut BTreeMap<ServerAddress, ServerDescription>,
    topology_type: &mut TopologyType,
    set_name: &mut Option<String>,
    max_set_version: &mut Option<u32>,
    max_election_id: &mut Option<ElectionId>,
    incoming: &ServerDescription,
) {
    if set_name.is_none() {
        *set_name = incoming.set_name.clone();
    }
    if *set_name != incoming.set_name {
        // This node belongs to a different cluster than the one we were
        // configured for; stop tracking it entirely.
        tracing::warn!(
            "Dropping {}: reported set name {:?} does not match {:?}",
            incoming.address,
            incoming.set_name,
            set_name
        );
        servers.remove(&incoming.address);
        *topology_type = check_has_primary(servers);
        return;
    }

    if let (Some(set_version), Some(election_id)) = (incoming.set_version, incoming.election_id) {
        if let (Some(max_sv), Some(max_eid)) = (*max_set_version, *max_election_id) {
            if (max_sv, max_eid) > (set_version, election_id) {
                // Stale primary claim: downgrade the claimant, keep the
                // recorded maxima untouched.
                tracing::debug!(
                    "Rejecting stale primary claim from {} (set version {}, election id {})",
                    incoming.address,
                    set_version,
                    election_id
                );
                servers.insert(
                    incoming.address.clone(),
                    ServerDescription::unknown(incoming.address.clone()),
                );
                *topology_type = check_has_primary(servers);
                return;
            }
        }
        *max_election_id = Some(election_id);
    }
    if let Some(set_version) = incoming.set_version {
        if max_set_version.map_or(true, |max_sv| set_version > max_sv) {
            *max_set_version = Some(set_version);
        }
    }

    // There can be at most one primary; an older one at a different address
    // is reset to Unknown until its monitor reports in again.
    let previous_primary = servers
        .iter()
        .find(|(address, server)| {
            server.server_type == ServerType::RSPrimary && **address != incoming.address
        })
        .map(|(address, _)| address.clone());
    if let Some(address) = previous_primary {
        servers.insert(address.clone(), ServerDescription::unknown(address));
    }

    // The primary's view of membership wins: discover what it lists, drop
    // what it doesn't.
    let reported: BTreeSet<ServerAddress> = incoming.all_hosts().cloned().collect();
    for address in &reported {
        if !servers.contains_key(address) {
            servers.insert(address.clone(), ServerDescription::unknown(address.clone()));
        }
    }
    servers.retain(|address, _| reported.contains(address));

    *topology_type = check_has_primary(servers);
}

fn update_rs_no_primary_from_member(
    servers: &mut BTreeMap<ServerAddress, ServerDescription>,
    set_name: &mut Option<String>,
    incoming: &ServerDescription,
) {
    if set_name.is_none() {
        *set_name = incoming.set_name.clone();
    }
    if *set_name != incoming.set_name {
        servers.remove(&incoming.address);
        return;
    }

    // Without a primary, member host lists are discovery hints only; nothing
    // is removed on their say-so.
    for address in incoming.all_hosts() {
        if !servers.contains_key(address) {
            servers.insert(address.clone(), ServerDescription::unknown(address.clone()));
        }
    }

    if let Some(me) = &incoming.me {
        if *me != incoming.address {
            servers.remove(&incoming.address);
        }
    }
}

fn update_rs_with_primary_from_member(
    servers: &mut BTreeMap<ServerAddress, ServerDescription>,
    set_name: &Option<String>,
    incoming: &ServerDescription,
) {
    let me_mismatch = incoming
        .me
        .as_ref()
        .map_or(false, |me| *me != incoming.address);

    if *set_name != incoming.set_name || me_mismatch {
        servers.remove(&incoming.address);
    }
}

fn check_has_primary(servers: &BTreeMap<ServerAddress, ServerDescription>) -> TopologyType {
    if servers
        .values()
        .any(|s| s.server_type == ServerType::RSPrimary)
    {
        TopologyType::ReplicaSetWithPrimary
    } else {
        TopologyType::ReplicaSetNoPrimary
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hello::{HeartbeatError, HelloResponse};

    const HEARTBEAT: Duration = Duration::from_secs(10);
    const THRESHOLD: Duration = Duration::from_millis(15);

    fn addr(s: &str) -> ServerAddress {
        s.parse().unwrap()
    }

    fn seeded(seeds: &[&str], set_name: Option<&str>) -> TopologyDescription {
        TopologyDescription::new(
            seeds.iter().map(|s| addr(s)).collect(),
            set_name.map(str::to_string),
            false,
            HEARTBEAT,
            THRESHOLD,
        )
    }

    fn member_hello(set_name: &str, hosts: &[&str]) -> HelloResponse {
        HelloResponse {
            set_name: Some(set_name.to_string()),
            hosts: hosts.iter().map(|s| s.to_string()).collect(),
            min_wire_version: 6,
            max_wire_version: 17,
            ..Default::default()
        }
    }

    fn primary(address: &str, set_name: &str, hosts: &[&str]) -> ServerDescription {
        primary_with_election(address, set_name, hosts, 1, 1)
    }

    fn primary_with_election(
        address: &str,
        set_name: &str,
        hosts: &[&str],
        set_version: u32,
        election: u64,
    ) -> ServerDescription {
        let hello = HelloResponse {
            is_writable_primary: true,
            set_version: Some(set_version),
            election_id: Some(ElectionId::from_counter(election)),
            ..member_hello(set_name, hosts)
        };
        ServerDescription::from_hello(addr(address), &hello, Duration::from_millis(5))
    }

    fn secondary(address: &str, set_name: &str, hosts: &[&str]) -> ServerDescription {
        let hello = HelloResponse {
            secondary: true,
            ..member_hello(set_name, hosts)
        };
        ServerDescription::from_hello(addr(address), &hello, Duration::from_millis(5))
    }

    fn standalone(address: &str) -> ServerDescription {
        let hello = HelloResponse {
            min_wire_version: 6,
            max_wire_version: 17,
            ..Default::default()
        };
        ServerDescription::from_hello(addr(address), &hello, Duration::from_millis(5))
    }

    fn mongos(address: &str) -> ServerDescription {
        let hello = HelloResponse {
            msg: Some("isdbgrid".to_string()),
            min_wire_version: 6,
            max_wire_version: 17,
            ..Default::default()
        };
        ServerDescription::from_hello(addr(address), &hello, Duration::from_millis(5))
    }

    #[test]
    fn standalone_seed_becomes_single_and_stays_single() {
        let topology = seeded(&["a:27017", "b:27017"], None);

        let topology = topology.update(standalone("a:27017"));

        assert_eq!(topology.topology_type, TopologyType::Single);
        assert_eq!(topology.servers.len(), 1);
        assert!(topology.has_server(&addr("a:27017")));

        // A heartbeat error leaves a single-node deployment in place.
        let topology = topology.update(ServerDescription::failed(
            addr("a:27017"),
            HeartbeatError::Timeout,
        ));
        assert_eq!(topology.topology_type, TopologyType::Single);
        assert!(topology.servers[&addr("a:27017")].error.is_some());
    }

    #[test]
    fn mongos_seed_becomes_sharded_and_drops_rs_members() {
        let topology = seeded(&["a:27017", "b:27017"], None);

        let topology = topology.update(mongos("a:27017"));
        assert_eq!(topology.topology_type, TopologyType::Sharded);

        let topology = topology.update(secondary("b:27017", "rs0", &["b:27017"]));
        assert_eq!(topology.topology_type, TopologyType::Sharded);
        assert!(!topology.has_server(&addr("b:27017")));
    }

    #[test]
    fn secondary_discovers_peers_without_primary() {
        let topology = seeded(&["b:27017"], None);

        let topology = topology.update(secondary(
            "b:27017",
            "rs0",
            &["a:27017", "b:27017", "c:27017"],
        ));

        assert_eq!(topology.topology_type, TopologyType::ReplicaSetNoPrimary);
        assert_eq!(topology.set_name.as_deref(), Some("rs0"));
        assert_eq!(topology.servers.len(), 3);
        assert_eq!(
            topology.servers[&addr("a:27017")].server_type,
            ServerType::Unknown
        );
    }

    #[test]
    fn primary_membership_is_authoritative() {
        let topology = seeded(&["a:27017", "d:27017"], None);

        let topology = topology.update(primary(
            "a:27017",
            "rs0",
            &["a:27017", "b:27017", "c:27017"],
        ));

        assert_eq!(topology.topology_type, TopologyType::ReplicaSetWithPrimary);
        // d was seeded but the primary doesn't list it; b and c are new.
        assert!(!topology.has_server(&addr("d:27017")));
        assert!(topology.has_server(&addr("b:27017")));
        assert!(topology.has_server(&addr("c:27017")));
        assert_eq!(topology.servers.len(), 3);
    }

    #[test]
    fn stale_primary_claim_is_rejected() {
        let hosts = ["a:27017", "b:27017"];
        let topology = seeded(&hosts, None);

        let topology = topology.update(primary_with_election("a:27017", "rs0", &hosts, 2, 5));
        assert_eq!(topology.primary().unwrap().address, addr("a:27017"));

        // b claims primary with an older (set_version, election_id) pair.
        let topology = topology.update(primary_with_election("b:27017", "rs0", &hosts, 2, 4));

        assert_eq!(topology.topology_type, TopologyType::ReplicaSetWithPrimary);
        assert_eq!(topology.primary().unwrap().address, addr("a:27017"));
        assert_eq!(
            topology.servers[&addr("b:27017")].server_type,
            ServerType::Unknown
        );
        // Bookkeeping still records the newest accepted election.
        assert_eq!(topology.max_set_version, Some(2));
        assert_eq!(topology.max_election_id, Some(ElectionId::from_counter(5)));
    }

    #[test]
    fn newer_primary_evicts_the_old_one() {
        let hosts = ["a:27017", "b:27017"];
        let topology = seeded(&hosts, None)
            .update(primary_with_election("a:27017", "rs0", &hosts, 1, 1))
            .update(primary_with_election("b:27017", "rs0", &hosts, 1, 2));

        assert_eq!(topology.primary().unwrap().address, addr("b:27017"));
        assert_eq!(
            topology.servers[&addr("a:27017")].server_type,
            ServerType::Unknown
        );
    }

    #[test]
    fn set_name_mismatch_drops_the_server() {
        let topology = seeded(&["a:27017", "b:27017"], Some("rs0"));
        assert_eq!(topology.topology_type, TopologyType::ReplicaSetNoPrimary);

        let topology = topology.update(secondary("b:27017", "other_set", &["b:27017"]));

        assert!(!topology.has_server(&addr("b:27017")));
        assert_eq!(topology.set_name.as_deref(), Some("rs0"));
    }

    #[test]
    fn me_mismatch_drops_member_without_primary() {
        let topology = seeded(&["a:27017"], Some("rs0"));

        let mut member = secondary("a:27017", "rs0", &["b:27017"]);
        member.me = Some(addr("b:27017"));
        let topology = topology.update(member);

        assert!(!topology.has_server(&addr("a:27017")));
        // Its host list was still used for discovery.
        assert!(topology.has_server(&addr("b:27017")));
    }

    #[test]
    fn losing_the_primary_degrades_to_no_primary() {
        let hosts = ["a:27017", "b:27017", "c:27017"];
        let topology = seeded(&hosts, None)
            .update(primary("a:27017", "rs0", &hosts))
            .update(secondary("b:27017", "rs0", &hosts))
            .update(secondary("c:27017", "rs0", &hosts));
        assert_eq!(topology.topology_type, TopologyType::ReplicaSetWithPrimary);

        let topology = topology.update(ServerDescription::failed(
            addr("a:27017"),
            HeartbeatError::Io("connection refused".to_string()),
        ));

        assert_eq!(topology.topology_type, TopologyType::ReplicaSetNoPrimary);
        assert!(topology.servers[&addr("a:27017")].error.is_some());
        assert_eq!(topology.servers.len(), 3);
    }

    #[test]
    fn standalone_in_replica_set_topology_is_removed() {
        let hosts = ["a:27017", "b:27017"];
        let topology = seeded(&hosts, None)
            .update(primary("a:27017", "rs0", &hosts))
            .update(standalone("b:27017"));

        assert_eq!(topology.topology_type, TopologyType::ReplicaSetWithPrimary);
        assert!(!topology.has_server(&addr("b:27017")));
    }

    #[test]
    fn update_is_deterministic_over_a_replayed_sequence() {
        let hosts = ["a:27017", "b:27017", "c:27017"];
        let updates = vec![
            secondary("b:27017", "rs0", &hosts),
            primary("a:27017", "rs0", &hosts),
            ServerDescription::failed(addr("c:27017"), HeartbeatError::Timeout),
            secondary("c:27017", "rs0", &hosts),
        ];

        let replay = |updates: &[ServerDescription]| {
            updates
                .iter()
                .fold(seeded(&["a:27017", "b:27017", "c:27017"], None), |t, u| {
                    t.update(u.clone())
                })
        };

        let first = replay(&updates);
        let second = replay(&updates);

        assert_eq!(first.topology_type, second.topology_type);
        assert_eq!(
            first.servers.keys().collect::<Vec<_>>(),
            second.servers.keys().collect::<Vec<_>>()
        );
        assert!(first
            .servers
            .values()
            .zip(second.servers.values())
            .all(|(a, b)| a.topology_eq(b)));
    }

    #[test]
    fn session_timeout_is_minimum_across_data_bearing_members() {
        let hosts = ["a:27017", "b:27017"];
        let with_timeout = |address: &str, secondary_role: bool, minutes: Option<i64>| {
            let hello = HelloResponse {
                is_writable_primary: !secondary_role,
                secondary: secondary_role,
                set_version: Some(1),
                election_id: Some(ElectionId::from_counter(1)),
                logical_session_timeout_minutes: minutes,
                ..member_hello("rs0", &hosts)
            };
            ServerDescription::from_hello(addr(address), &hello, Duration::from_millis(5))
        };

        let topology = seeded(&hosts, None)
            .update(with_timeout("a:27017", false, Some(30)))
            .update(with_timeout("b:27017", true, Some(20)));
        assert_eq!(topology.logical_session_timeout_minutes, Some(20));

        let topology = topology.update(with_timeout("b:27017", true, None));
        assert_eq!(topology.logical_session_timeout_minutes, None);
    }

    #[test]
    fn incompatible_wire_version_is_reported() {
        let topology = seeded(&["a:27017"], None);

        let hello = HelloResponse {
            min_wire_version: 0,
            max_wire_version: MIN_SUPPORTED_WIRE_VERSION - 1,
            ..Default::default()
        };
        let topology = topology.update(ServerDescription::from_hello(
            addr("a:27017"),
            &hello,
            Duration::from_millis(5),
        ));

        assert!(!topology.compatible);
        assert!(topology
            .compatibility_error
            .as_deref()
            .unwrap()
            .contains("a:27017"));
    }

    #[test]
    fn diff_reports_added_removed_and_changed() {
        let seeds = ["a:27017", "d:27017"];
        let before = seeded(&seeds, None);
        let after = before.update(primary("a:27017", "rs0", &["a:27017", "b:27017"]));

        let diff = before.diff(&after);

        assert_eq!(diff.added, vec![addr("b:27017")]);
        assert_eq!(diff.removed, vec![addr("d:27017")]);
        assert_eq!(diff.changed, vec![addr("a:27017")]);
        assert!(before.diff(&before).is_empty());
    }

    #[test]
    fn load_balanced_topology_is_immediately_usable() {
        let topology = TopologyDescription::new(
            vec![addr("lb:27017")],
            None,
            true,
            HEARTBEAT,
            THRESHOLD,
        );

        assert_eq!(topology.topology_type, TopologyType::LoadBalanced);
        assert_eq!(
            topology.servers[&addr("lb:27017")].server_type,
            ServerType::LoadBalancer
        );
    }
}

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::read_preference::{ReadPreference, ReadPreferenceMode};
use crate::server_address::ServerAddress;
use crate::server_description::{ServerDescription, ServerType};
use crate::topology_description::{TopologyDescription, TopologyType};
use crate::topology_error::TopologyError;

/// Default width of the latency window around the fastest candidate.
pub const DEFAULT_LOCAL_THRESHOLD: Duration = Duration::from_millis(15);

/// Allowance for how far behind a secondary may drift between a primary's
/// writes while the cluster is idle; folded into the minimum acceptable
/// staleness bound.
pub const IDLE_WRITE_PERIOD: Duration = Duration::from_secs(10);

/// What a caller needs from the server it is about to use.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionCriteria {
    /// A server that can accept writes for the current topology type.
    Writable,
    ReadPreference(ReadPreference),
}

impl fmt::Display for SelectionCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionCriteria::Writable => f.write_str("writable"),
            SelectionCriteria::ReadPreference(rp) => write!(f, "read preference {rp}"),
        }
    }
}

/// Pure selection over a topology snapshot: type eligibility, staleness,
/// tag sets, the latency window, then deprioritization. An empty result is a
/// valid outcome meaning "no suitable server yet"; errors are reserved for
/// contradictory criteria and for topologies marked wire-incompatible.
pub fn select_servers<'a>(
    topology: &'a TopologyDescription,
    criteria: &SelectionCriteria,
    deprioritized: &HashSet<ServerAddress>,
) -> Result<Vec<&'a ServerDescription>, TopologyError> {
    if !topology.compatible {
        let message = topology
            .compatibility_error
            .clone()
            .unwrap_or_else(|| "wire version out of supported range".to_string());
        return Err(TopologyError::Incompatible(message));
    }

    let candidates = match criteria {
        SelectionCriteria::Writable => {
            let writable = topology
                .servers
                .values()
                .filter(|s| s.server_type.is_writable())
                .collect();
            latency_window_filter(topology, writable)
        }
        SelectionCriteria::ReadPreference(read_preference) => {
            read_preference_candidates(topology, read_preference)?
        }
    };

    Ok(apply_deprioritized(candidates, deprioritized))
}

fn read_preference_candidates<'a>(
    topology: &'a TopologyDescription,
    read_preference: &ReadPreference,
) -> Result<Vec<&'a ServerDescription>, TopologyError> {
    let servers = || topology.servers.values();

    match topology.topology_type {
        TopologyType::Unknown => Ok(Vec::new()),
        TopologyType::LoadBalanced => Ok(servers()
            .filter(|s| s.server_type == ServerType::LoadBalancer)
            .collect()),
        // Single-server and router deployments ignore the read preference
        // mode; any classified server will do.
        TopologyType::Single | TopologyType::Sharded => Ok(latency_window_filter(
            topology,
            servers().filter(|s| s.server_type.is_known()).collect(),
        )),
        TopologyType::ReplicaSetNoPrimary | TopologyType::ReplicaSetWithPrimary => {
            validate_max_staleness(topology, read_preference)?;

            let primaries = || {
                servers()
                    .filter(|s| s.server_type == ServerType::RSPrimary)
                    .collect::<Vec<_>>()
            };
            let eligible_secondaries = |topology: &'a TopologyDescription| {
                let secondaries = servers()
                    .filter(|s| s.server_type == ServerType::RSSecondary)
                    .collect();
                let fresh = max_staleness_filter(topology, read_preference, secondaries);
                latency_window_filter(topology, tag_sets_filter(read_preference, fresh))
            };

            match read_preference.mode() {
                ReadPreferenceMode::Primary => Ok(primaries()),
                ReadPreferenceMode::PrimaryPreferred => {
                    let primary = primaries();
                    if primary.is_empty() {
                        Ok(eligible_secondaries(topology))
                    } else {
                        Ok(primary)
                    }
                }
                ReadPreferenceMode::Secondary => Ok(eligible_secondaries(topology)),
                ReadPreferenceMode::SecondaryPreferred => {
                    let secondaries = eligible_secondaries(topology);
                    if secondaries.is_empty() {
                        Ok(primaries())
                    } else {
                        Ok(secondaries)
                    }
                }
                ReadPreferenceMode::Nearest => {
                    let near = servers()
                        .filter(|s| {
                            matches!(
                                s.server_type,
                                ServerType::RSPrimary | ServerType::RSSecondary
                            )
                        })
                        .collect();
                    let fresh = max_staleness_filter(topology, read_preference, near);
                    Ok(latency_window_filter(
                        topology,
                        tag_sets_filter(read_preference, fresh),
                    ))
                }
            }
        }
    }
}

/// A staleness bound below what the heartbeat cadence can even measure is a
/// configuration mistake, rejected before any waiting starts.
fn validate_max_staleness(
    topology: &TopologyDescription,
    read_preference: &ReadPreference,
) -> Result<(), TopologyError> {
    let Some(max_staleness) = read_preference.max_staleness() else {
        return Ok(());
    };

    let smallest_usable = topology.heartbeat_frequency + IDLE_WRITE_PERIOD;
    if max_staleness < smallest_usable {
        return Err(TopologyError::InvalidReadPreference(format!(
            "maxStalenessSeconds must be at least {}s (heartbeat frequency plus {}s)",
            smallest_usable.as_secs(),
            IDLE_WRITE_PERIOD.as_secs()
        )));
    }
    Ok(())
}

/// Staleness is estimated against the primary's write date when one exists,
/// otherwise against the most recently written secondary, with one heartbeat
/// interval added on top.
fn max_staleness_filter<'a>(
    topology: &TopologyDescription,
    read_preference: &ReadPreference,
    servers: Vec<&'a ServerDescription>,
) -> Vec<&'a ServerDescription> {
    let Some(max_staleness) = read_preference.max_staleness() else {
        return servers;
    };
    let max_staleness_secs = max_staleness.as_secs_f64();
    let heartbeat_secs = topology.heartbeat_frequency.as_secs_f64();

    if topology.topology_type == TopologyType::ReplicaSetWithPrimary {
        let Some(primary) = topology.primary() else {
            return servers;
        };
        let Some(primary_write) = primary.last_write_date else {
            return servers;
        };
        let primary_lag = epoch_secs(primary.last_update_time) - epoch_secs(primary_write);

        servers
            .into_iter()
            .filter(|server| {
                if server.server_type == ServerType::RSPrimary {
                    return true;
                }
                let Some(write_date) = server.last_write_date else {
                    return false;
                };
                let server_lag = epoch_secs(server.last_update_time) - epoch_secs(write_date);
                server_lag - primary_lag + heartbeat_secs <= max_staleness_secs
            })
            .collect()
    } else {
        let Some(latest_write) = servers
            .iter()
            .filter_map(|s| s.last_write_date)
            .max()
        else {
            return Vec::new();
        };

        servers
            .into_iter()
            .filter(|server| {
                let Some(write_date) = server.last_write_date else {
                    return false;
                };
                epoch_secs(latest_write) - epoch_secs(write_date) + heartbeat_secs
                    <= max_staleness_secs
            })
            .collect()
    }
}

/// Ordered tag-set filtering: the first tag set matching a non-empty subset
/// of candidates wins; an empty tag-set list matches everything.
fn tag_sets_filter<'a>(
    read_preference: &ReadPreference,
    servers: Vec<&'a ServerDescription>,
) -> Vec<&'a ServerDescription> {
    if read_preference.tag_sets().is_empty() {
        return servers;
    }

    for tag_set in read_preference.tag_sets() {
        let matching: Vec<_> = servers
            .iter()
            .filter(|server| {
                tag_set
                    .iter()
                    .all(|(key, value)| server.tags.get(key) == Some(value))
            })
            .copied()
            .collect();
        if !matching.is_empty() {
            return matching;
        }
    }

    Vec::new()
}

/// Keeps only candidates within `local_threshold` of the fastest one.
fn latency_window_filter<'a>(
    topology: &TopologyDescription,
    servers: Vec<&'a ServerDescription>,
) -> Vec<&'a ServerDescription> {
    let Some(min_rtt) = servers.iter().filter_map(|s| s.round_trip_time).min() else {
        return servers;
    };

    let high = min_rtt + topology.local_threshold;
    servers
        .into_iter()
        .filter(|s| s.round_trip_time.map_or(false, |rtt| rtt <= high))
        .collect()
}

/// Drops recently failed servers from the candidates, unless doing so would
/// starve selection entirely.
fn apply_deprioritized<'a>(
    candidates: Vec<&'a ServerDescription>,
    deprioritized: &HashSet<ServerAddress>,
) -> Vec<&'a ServerDescription> {
    if deprioritized.is_empty() {
        return candidates;
    }

    let filtered: Vec<_> = candidates
        .iter()
        .filter(|s| !deprioritized.contains(&s.address))
        .copied()
        .collect();

    if filtered.is_empty() {
        candidates
    } else {
        filtered
    }
}

fn epoch_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

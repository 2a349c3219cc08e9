use std::sync::Arc;
use std::time::Duration;

use crate::error_chain_fmt;
use crate::topology_description::TopologyDescription;

#[derive(thiserror::Error)]
pub enum TopologyError {
    #[error("Invalid server address `{0}`")]
    InvalidAddress(String),

    #[error("Invalid read preference: {0}")]
    InvalidReadPreference(String),

    #[error("No seed addresses were supplied and a topology can't exist without at least one")]
    MissingSeeds,

    #[error("No heartbeat transport was supplied")]
    MissingTransport,

    #[error("Load-balanced mode requires exactly one seed and no replica set name")]
    InvalidLoadBalancedConfiguration,

    /// A tracked server reported a wire-version range this engine cannot
    /// speak. Selection fails until the server upgrades or leaves the
    /// topology.
    #[error("Incompatible topology: {0}")]
    Incompatible(String),

    /// No server matched the selection criteria before the deadline. Carries
    /// the last snapshot observed so callers can log what the engine believed
    /// the cluster looked like.
    #[error(
        "Server selection timed out after {elapsed:?}: no server found matching criteria, topology was: {topology}"
    )]
    SelectionTimeout {
        elapsed: Duration,
        topology: Arc<TopologyDescription>,
    },

    #[error("Topology has been closed")]
    Closed,

    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

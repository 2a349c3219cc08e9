mod topology_actor;
mod topology_builder;
mod topology_handle;

pub use topology_builder::*;
pub use topology_handle::*;

pub(crate) use topology_actor::{run_topology_actor, TopologyActor};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::events::EventSink;
use crate::hello::{ConnectionPool, HeartbeatTransport};
use crate::server_address::ServerAddress;
use crate::server_description::ServerDescription;

#[derive(Debug)]
pub(crate) enum TopologyMessage {
    /// A monitor's latest view of its server. Updates from one monitor
    /// arrive in submission order over the actor's mailbox.
    ServerUpdate { description: ServerDescription },
    /// Wake one monitor (or all of them) ahead of schedule.
    RequestCheck { address: Option<ServerAddress> },
    Close { respond_to: oneshot::Sender<()> },
}

/// Everything the actor needs to start monitoring, assembled by the builder.
pub(crate) struct TopologyConfig {
    pub(crate) seeds: Vec<ServerAddress>,
    pub(crate) set_name: Option<String>,
    pub(crate) load_balanced: bool,
    pub(crate) heartbeat_frequency: Duration,
    pub(crate) min_heartbeat_frequency: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) local_threshold: Duration,
    pub(crate) server_selection_timeout: Duration,
    pub(crate) transport: Arc<dyn HeartbeatTransport>,
    pub(crate) pool: Arc<dyn ConnectionPool>,
    pub(crate) event_sink: Option<EventSink>,
}

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::server_address::ServerAddress;
use crate::server_description::ServerDescription;
use crate::topology_description::{TopologyDescription, TopologyDescriptionDiff};

/// Lifecycle notifications pushed to the embedder's observability layer.
///
/// Events are immutable records sent through a channel; the engine never
/// calls observer code synchronously from inside its update critical
/// section.
#[derive(Clone, Debug)]
pub enum TopologyEvent {
    TopologyOpening,
    TopologyClosed,
    /// A monitor was started for a newly tracked address.
    ServerOpening { address: ServerAddress },
    /// An address left the topology and its monitor was stopped.
    ServerClosed { address: ServerAddress },
    ServerDescriptionChanged {
        address: ServerAddress,
        previous: ServerDescription,
        new: ServerDescription,
    },
    TopologyDescriptionChanged {
        previous: Arc<TopologyDescription>,
        new: Arc<TopologyDescription>,
        diff: TopologyDescriptionDiff,
    },
    /// A server reported a wire-version range outside what this engine
    /// supports; selection fails until the topology is compatible again.
    CompatibilityError { message: String },
}

/// Where the engine publishes its events. Sends are fire-and-forget; a
/// dropped receiver silently disables eventing.
pub type EventSink = mpsc::UnboundedSender<TopologyEvent>;

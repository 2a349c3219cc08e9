/*!
Cluster topology discovery and server selection for document database
deployments.

The crate keeps a live model of a deployment (which servers exist, what
role each plays, how fresh and how far away each one is) by running one
lightweight monitor task per server and folding their heartbeat results
into an immutable [`TopologyDescription`] owned by a single actor task.
Callers hold a cheap-to-clone [`Topology`] handle and ask it for servers:

```no_run
use std::sync::Arc;
use std::time::Duration;

use docdb_topology::{ReadPreference, SelectionCriteria, Topology};
# use docdb_topology::HeartbeatTransport;
# async fn demo(transport: Arc<dyn HeartbeatTransport>) -> Result<(), Box<dyn std::error::Error>> {
let topology = Topology::builder()
    .set_seeds(&["alpha.example.com:27017", "beta.example.com:27017"])
    .set_replica_set_name("rs0")
    .set_server_selection_timeout(Duration::from_secs(30))
    .set_transport(transport)
    .build()?;

let server = topology
    .select_server(&SelectionCriteria::ReadPreference(
        ReadPreference::secondary_preferred(),
    ))
    .await?;
tracing::info!("routing the read to {}", server.address);
# Ok(())
# }
```

Selection never blocks other callers: each request reads the latest
published snapshot, and only waits, bounded by the selection timeout, when
no server currently matches. Monitoring, role tracking and the
replica-set transition rules all run behind the handle.
*/
mod events;
mod hello;
mod monitor;
mod read_preference;
mod selection;
mod server_address;
mod server_description;
mod topology;
mod topology_description;
mod topology_error;

pub use events::*;
pub use hello::{
    ConnectionPool, ElectionId, HeartbeatError, HeartbeatStream, HeartbeatTransport,
    HelloResponse, NoopConnectionPool,
};
pub use read_preference::*;
pub use selection::{
    select_servers, SelectionCriteria, DEFAULT_LOCAL_THRESHOLD, IDLE_WRITE_PERIOD,
};
pub use server_address::*;
pub use server_description::*;
pub use topology::*;
pub use topology_description::*;
pub use topology_error::*;

/// Provides a formatted error chain for any error passed in. Use this in a
/// [`std::fmt::Debug`] implementation to log the whole causal chain.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

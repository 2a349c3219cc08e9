use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::IteratorRandom;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::instrument;

use crate::selection::{select_servers, SelectionCriteria};
use crate::server_address::ServerAddress;
use crate::server_description::ServerDescription;
use crate::topology::{
    run_topology_actor, TopologyActor, TopologyBuilder, TopologyConfig, TopologyMessage,
};
use crate::topology_description::TopologyDescription;
use crate::topology_error::TopologyError;

/**
A handle to the topology actor.

One actor per cluster tracks membership and roles; cloning this handle is
very cheap and does not start another actor, so clone it into every
component that needs to pick servers. Selection reads never lock anything:
they borrow the latest immutable snapshot published by the actor and run the
pure selector over it.
*/
#[derive(Clone, Debug)]
pub struct Topology {
    sender: mpsc::Sender<TopologyMessage>,
    snapshots: watch::Receiver<Arc<TopologyDescription>>,
    server_selection_timeout: Duration,
}

impl Topology {
    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::default()
    }

    // Only the builder creates handles; the configuration is validated by
    // the time it gets here.
    pub(crate) fn new(config: TopologyConfig) -> Self {
        let initial = Arc::new(TopologyDescription::new(
            config.seeds.clone(),
            config.set_name.clone(),
            config.load_balanced,
            config.heartbeat_frequency,
            config.local_threshold,
        ));
        let (sender, receiver) = mpsc::channel(256);
        let (snapshots_tx, snapshots_rx) = watch::channel(Arc::clone(&initial));
        let server_selection_timeout = config.server_selection_timeout;

        let actor = TopologyActor::new(receiver, sender.clone(), initial, snapshots_tx, &config);
        tokio::spawn(run_topology_actor(actor));

        Self {
            sender,
            snapshots: snapshots_rx,
            server_selection_timeout,
        }
    }

    /// Picks a server matching the criteria, waiting up to the configured
    /// selection timeout for the topology to produce one.
    pub async fn select_server(
        &self,
        criteria: &SelectionCriteria,
    ) -> Result<ServerDescription, TopologyError> {
        self.select_server_with_options(criteria, self.server_selection_timeout, &HashSet::new())
            .await
    }

    /// As [`select_server`](Self::select_server), with an explicit deadline
    /// and a set of recently failed addresses to avoid while alternatives
    /// exist.
    ///
    /// Waits by following the actor's snapshot stream: every applied update
    /// re-runs the selector exactly once. Contradictory criteria fail
    /// synchronously; an exhausted deadline fails with the last snapshot
    /// attached; a closed topology cancels the wait.
    #[instrument(
        level = "debug",
        name = "Actor Handle - Select Server",
        skip(self, deprioritized)
    )]
    pub async fn select_server_with_options(
        &self,
        criteria: &SelectionCriteria,
        timeout: Duration,
        deprioritized: &HashSet<ServerAddress>,
    ) -> Result<ServerDescription, TopologyError> {
        let started = Instant::now();
        let mut snapshots = self.snapshots.clone();

        loop {
            let snapshot: Arc<TopologyDescription> = snapshots.borrow_and_update().clone();

            let candidates = select_servers(&snapshot, criteria, deprioritized)?;
            if let Some(selected) = candidates.into_iter().choose(&mut rand::thread_rng()) {
                tracing::debug!("Selected server {}", selected.address);
                return Ok(selected.clone());
            }

            tracing::trace!("No server currently matches {criteria}; waiting for updates");
            // Nudge every monitor rather than waiting out a full heartbeat
            // interval.
            let _ = self
                .sender
                .try_send(TopologyMessage::RequestCheck { address: None });

            let remaining = match timeout.checked_sub(started.elapsed()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => {
                    return Err(TopologyError::SelectionTimeout {
                        elapsed: started.elapsed(),
                        topology: snapshot,
                    })
                }
            };
            match tokio::time::timeout(remaining, snapshots.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(TopologyError::Closed),
                Err(_) => {
                    return Err(TopologyError::SelectionTimeout {
                        elapsed: started.elapsed(),
                        topology: snapshots.borrow().clone(),
                    })
                }
            }
        }
    }

    /// Non-blocking: every server the criteria would currently accept.
    pub fn servers_matching(
        &self,
        criteria: &SelectionCriteria,
    ) -> Result<Vec<ServerDescription>, TopologyError> {
        let snapshot = self.snapshots.borrow().clone();
        Ok(select_servers(&snapshot, criteria, &HashSet::new())?
            .into_iter()
            .cloned()
            .collect())
    }

    /// The latest published snapshot, for diagnostics and eventing.
    pub fn description(&self) -> Arc<TopologyDescription> {
        self.snapshots.borrow().clone()
    }

    /// Wakes the monitor for one address ahead of schedule, e.g. after an
    /// application operation observed a "not primary" or "node is
    /// recovering" style error against it.
    pub async fn request_check(&self, address: ServerAddress) {
        let _ = self
            .sender
            .send(TopologyMessage::RequestCheck {
                address: Some(address),
            })
            .await;
    }

    /// Wakes all monitors ahead of schedule.
    pub async fn request_checks(&self) {
        let _ = self
            .sender
            .send(TopologyMessage::RequestCheck { address: None })
            .await;
    }

    /// Stops all monitors and fails any waiting selections. Safe to call
    /// more than once; later calls are no-ops.
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(TopologyMessage::Close { respond_to: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

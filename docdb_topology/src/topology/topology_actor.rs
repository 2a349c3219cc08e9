use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{instrument, Span};
use uuid::Uuid;

use crate::events::{EventSink, TopologyEvent};
use crate::hello::{ConnectionPool, HeartbeatTransport};
use crate::monitor::{start_monitor, MonitorHandle, MonitorOptions};
use crate::server_address::ServerAddress;
use crate::server_description::ServerDescription;
use crate::topology::{TopologyConfig, TopologyMessage};
use crate::topology_description::TopologyDescription;

/// Owns the authoritative topology state. All mutation flows through this
/// actor's mailbox, one message at a time; everyone else only ever sees the
/// immutable snapshots it publishes on the watch channel.
pub(crate) struct TopologyActor {
    receiver: mpsc::Receiver<TopologyMessage>,
    /// Cloned into monitors so they can submit their observations.
    sender_internal: mpsc::Sender<TopologyMessage>,
    description: Arc<TopologyDescription>,
    snapshots: watch::Sender<Arc<TopologyDescription>>,
    monitors: HashMap<ServerAddress, MonitorHandle>,
    monitor_options: MonitorOptions,
    load_balanced: bool,
    transport: Arc<dyn HeartbeatTransport>,
    pool: Arc<dyn ConnectionPool>,
    event_sink: Option<EventSink>,
}

impl TopologyActor {
    pub(crate) fn new(
        receiver: mpsc::Receiver<TopologyMessage>,
        sender_internal: mpsc::Sender<TopologyMessage>,
        initial: Arc<TopologyDescription>,
        snapshots: watch::Sender<Arc<TopologyDescription>>,
        config: &TopologyConfig,
    ) -> Self {
        Self {
            receiver,
            sender_internal,
            description: initial,
            snapshots,
            monitors: HashMap::new(),
            monitor_options: MonitorOptions {
                heartbeat_frequency: config.heartbeat_frequency,
                min_heartbeat_frequency: config.min_heartbeat_frequency,
                connect_timeout: config.connect_timeout,
            },
            load_balanced: config.load_balanced,
            transport: config.transport.clone(),
            pool: config.pool.clone(),
            event_sink: config.event_sink.clone(),
        }
    }

    /// Message handler for the TopologyActor.
    #[instrument(
        level = "debug",
        name = "Topology Actor - Handle Message",
        skip(self),
        fields(correlation_id)
    )]
    fn handle_message(&mut self, msg: TopologyMessage) {
        // Apply a correlation id to all child spans of this message handler
        Span::current().record("correlation_id", Uuid::new_v4().to_string());
        match msg {
            TopologyMessage::ServerUpdate { description } => {
                self.apply_server_update(description);
            }
            TopologyMessage::RequestCheck { address } => match address {
                Some(address) => {
                    if let Some(monitor) = self.monitors.get(&address) {
                        monitor.request_check();
                    }
                }
                None => {
                    for monitor in self.monitors.values() {
                        monitor.request_check();
                    }
                }
            },
            // Close is intercepted by the actor runner.
            TopologyMessage::Close { .. } => {}
        }
    }

    /// Applies one ServerDescription through the transition rules and, when
    /// accepted, publishes exactly one new snapshot so every waiting
    /// selection gets exactly one wakeup.
    fn apply_server_update(&mut self, incoming: ServerDescription) {
        if !self.description.has_server(&incoming.address) {
            tracing::trace!(
                "Discarding update from {}: no longer part of the topology",
                incoming.address
            );
            return;
        }

        let previous = Arc::clone(&self.description);
        let next = Arc::new(previous.update(incoming));
        let diff = previous.diff(&next);

        if previous.topology_type != next.topology_type {
            tracing::debug!(
                "Topology transitioned {:?} -> {:?}",
                previous.topology_type,
                next.topology_type
            );
        }

        self.reconcile_monitors(&next);
        self.description = Arc::clone(&next);

        for address in &diff.changed {
            if let (Some(before), Some(after)) =
                (previous.servers.get(address), next.servers.get(address))
            {
                self.emit(TopologyEvent::ServerDescriptionChanged {
                    address: address.clone(),
                    previous: before.clone(),
                    new: after.clone(),
                });
            }
        }
        if !diff.is_empty() || previous.topology_type != next.topology_type {
            self.emit(TopologyEvent::TopologyDescriptionChanged {
                previous: Arc::clone(&previous),
                new: Arc::clone(&next),
                diff,
            });
        }
        if !next.compatible && previous.compatible {
            if let Some(message) = &next.compatibility_error {
                tracing::error!("Topology became incompatible: {}", message);
                self.emit(TopologyEvent::CompatibilityError {
                    message: message.clone(),
                });
            }
        }

        // Publish unconditionally: each applied update is one wakeup for
        // blocked selections, whether or not anything material changed.
        let _ = self.snapshots.send(next);
    }

    /// Starts monitors for newly tracked addresses and stops those whose
    /// address fell out of the topology. Stopping one monitor never touches
    /// the others.
    fn reconcile_monitors(&mut self, next: &TopologyDescription) {
        let removed: Vec<ServerAddress> = self
            .monitors
            .keys()
            .filter(|address| !next.has_server(address))
            .cloned()
            .collect();
        for address in removed {
            if let Some(monitor) = self.monitors.remove(&address) {
                tracing::debug!("Stopping monitor for removed server {}", address);
                let _ = monitor.shutdown();
                self.emit(TopologyEvent::ServerClosed { address });
            }
        }

        let added: Vec<ServerAddress> = next
            .servers
            .keys()
            .filter(|address| !self.monitors.contains_key(*address))
            .cloned()
            .collect();
        for address in added {
            self.start_monitor_for(address);
        }
    }

    fn start_monitor_for(&mut self, address: ServerAddress) {
        self.emit(TopologyEvent::ServerOpening {
            address: address.clone(),
        });
        let monitor = start_monitor(
            address.clone(),
            self.monitor_options,
            self.transport.clone(),
            self.pool.clone(),
            self.sender_internal.clone(),
        );
        self.monitors.insert(address, monitor);
    }

    async fn close(&mut self, respond_to: oneshot::Sender<()>) {
        tracing::debug!("Closing topology");
        let monitors: Vec<(ServerAddress, MonitorHandle)> = self.monitors.drain().collect();
        let mut joins = Vec::with_capacity(monitors.len());
        for (address, monitor) in monitors {
            joins.push(monitor.shutdown());
            self.emit(TopologyEvent::ServerClosed { address });
        }
        // Cooperative, bounded shutdown: monitors exit at their next
        // suspension point, at worst one probe timeout away.
        for join in joins {
            let _ = tokio::time::timeout(
                self.monitor_options.connect_timeout + Duration::from_secs(1),
                join,
            )
            .await;
        }
        self.emit(TopologyEvent::TopologyClosed);
        let _ = respond_to.send(());
    }

    fn emit(&self, event: TopologyEvent) {
        if let Some(sink) = &self.event_sink {
            let _ = sink.send(event);
        }
    }
}

#[instrument(level = "debug", name = "Running Topology Actor", skip(actor))]
pub(crate) async fn run_topology_actor(mut actor: TopologyActor) {
    actor.emit(TopologyEvent::TopologyOpening);

    // Load-balanced deployments are not monitored; the seed is usable as-is.
    if !actor.load_balanced {
        let seeds: Vec<ServerAddress> = actor.description.servers.keys().cloned().collect();
        for address in seeds {
            actor.start_monitor_for(address);
        }
    }

    while let Some(msg) = actor.receiver.recv().await {
        if let TopologyMessage::Close { respond_to } = msg {
            actor.close(respond_to).await;
            break;
        }
        actor.handle_message(msg);
    }
    // Dropping the actor drops the watch sender, which cancels any
    // still-waiting selections.
}

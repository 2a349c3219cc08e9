use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::events::EventSink;
use crate::hello::{ConnectionPool, HeartbeatTransport, NoopConnectionPool};
use crate::selection::DEFAULT_LOCAL_THRESHOLD;
use crate::server_address::ServerAddress;
use crate::topology::{Topology, TopologyConfig};
use crate::topology_error::TopologyError;

pub const DEFAULT_HEARTBEAT_FREQUENCY: Duration = Duration::from_secs(10);
/// Floor on how often a server may be probed, even when checks are being
/// requested aggressively after failures.
pub const DEFAULT_MIN_HEARTBEAT_FREQUENCY: Duration = Duration::from_millis(500);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Assembles and validates the bootstrap configuration, then starts the
/// topology actor. The builder can be reused as a template; every `build`
/// call starts an independent engine.
pub struct TopologyBuilder {
    seeds: Vec<String>,
    set_name: Option<String>,
    load_balanced: bool,
    heartbeat_frequency: Duration,
    min_heartbeat_frequency: Duration,
    connect_timeout: Duration,
    local_threshold: Duration,
    server_selection_timeout: Duration,
    transport: Option<Arc<dyn HeartbeatTransport>>,
    pool: Option<Arc<dyn ConnectionPool>>,
    event_sink: Option<EventSink>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_seeds<T>(mut self, seeds: &[T]) -> Self
    where
        T: AsRef<str>,
    {
        for seed in seeds {
            self.seeds.push(seed.as_ref().to_string());
        }
        self
    }

    /// Names the replica set this topology is expected to be. Servers
    /// reporting a different set name are dropped from tracking.
    pub fn set_replica_set_name(mut self, set_name: &str) -> Self {
        self.set_name = Some(set_name.to_string());
        self
    }

    /// Pins the topology to load-balanced mode: the single seed is treated
    /// as immediately usable and is not monitored.
    pub fn set_load_balanced(mut self, load_balanced: bool) -> Self {
        self.load_balanced = load_balanced;
        self
    }

    pub fn set_heartbeat_frequency(mut self, frequency: Duration) -> Self {
        self.heartbeat_frequency = frequency;
        self
    }

    pub fn set_min_heartbeat_frequency(mut self, frequency: Duration) -> Self {
        self.min_heartbeat_frequency = frequency;
        self
    }

    pub fn set_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Width of the latency window around the fastest eligible server.
    pub fn set_local_threshold(mut self, threshold: Duration) -> Self {
        self.local_threshold = threshold;
        self
    }

    pub fn set_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }

    pub fn set_transport(mut self, transport: Arc<dyn HeartbeatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn set_connection_pool(mut self, pool: Arc<dyn ConnectionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn set_event_sink(mut self, sink: EventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Validates the configuration, spawns the topology actor and returns a
    /// handle to it.
    #[instrument(level = "debug", name = "Build Topology", skip(self))]
    pub fn build(&self) -> Result<Topology, TopologyError> {
        if self.seeds.is_empty() {
            tracing::error!(
                "No seed addresses were supplied and a topology can't exist without at least one"
            );
            return Err(TopologyError::MissingSeeds);
        }
        let seeds = self
            .seeds
            .iter()
            .map(|seed| seed.parse::<ServerAddress>())
            .collect::<Result<Vec<_>, _>>()?;

        if self.load_balanced && (seeds.len() != 1 || self.set_name.is_some()) {
            return Err(TopologyError::InvalidLoadBalancedConfiguration);
        }

        let transport = self
            .transport
            .clone()
            .ok_or(TopologyError::MissingTransport)?;
        let pool = self
            .pool
            .clone()
            .unwrap_or_else(|| Arc::new(NoopConnectionPool));

        let config = TopologyConfig {
            seeds,
            set_name: self.set_name.clone(),
            load_balanced: self.load_balanced,
            heartbeat_frequency: self.heartbeat_frequency,
            min_heartbeat_frequency: self.min_heartbeat_frequency,
            connect_timeout: self.connect_timeout,
            local_threshold: self.local_threshold,
            server_selection_timeout: self.server_selection_timeout,
            transport,
            pool,
            event_sink: self.event_sink.clone(),
        };

        Ok(Topology::new(config))
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            set_name: None,
            load_balanced: false,
            heartbeat_frequency: DEFAULT_HEARTBEAT_FREQUENCY,
            min_heartbeat_frequency: DEFAULT_MIN_HEARTBEAT_FREQUENCY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            local_threshold: DEFAULT_LOCAL_THRESHOLD,
            server_selection_timeout: DEFAULT_SERVER_SELECTION_TIMEOUT,
            transport: None,
            pool: None,
            event_sink: None,
        }
    }
}

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::hello::{ConnectionPool, HeartbeatError, HeartbeatStream, HeartbeatTransport, HelloResponse};
use crate::server_address::ServerAddress;
use crate::server_description::ServerDescription;
use crate::topology::TopologyMessage;

/// Weight of the newest sample in the round-trip average.
const RTT_ALPHA: f64 = 0.2;

#[derive(Debug)]
pub(crate) enum MonitorRequest {
    CheckNow,
}

/// The actor's grip on one monitor task. Dropping the handle (or calling
/// `shutdown`) closes the request channel, which the loop observes at its
/// next suspension point.
pub(crate) struct MonitorHandle {
    requests: mpsc::Sender<MonitorRequest>,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    /// Wakes a sleeping monitor ahead of schedule. Requests that arrive
    /// while a probe is already running are satisfied by that probe.
    pub(crate) fn request_check(&self) {
        let _ = self.requests.try_send(MonitorRequest::CheckNow);
    }

    pub(crate) fn shutdown(self) -> JoinHandle<()> {
        drop(self.requests);
        self.join
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct MonitorOptions {
    pub(crate) heartbeat_frequency: Duration,
    pub(crate) min_heartbeat_frequency: Duration,
    pub(crate) connect_timeout: Duration,
}

pub(crate) fn start_monitor(
    address: ServerAddress,
    options: MonitorOptions,
    transport: Arc<dyn HeartbeatTransport>,
    pool: Arc<dyn ConnectionPool>,
    updates: mpsc::Sender<TopologyMessage>,
) -> MonitorHandle {
    let (requests, requests_rx) = mpsc::channel(4);
    let monitor = Monitor {
        requests: requests_rx,
        updates,
        options,
        worker: ProbeWorker {
            address,
            transport,
            pool,
            connect_timeout: options.connect_timeout,
            stream: None,
            round_trip_time: None,
        },
    };
    let join = tokio::spawn(run_monitor(monitor));

    MonitorHandle { requests, join }
}

struct Monitor {
    requests: mpsc::Receiver<MonitorRequest>,
    updates: mpsc::Sender<TopologyMessage>,
    options: MonitorOptions,
    worker: ProbeWorker,
}

struct ProbeWorker {
    address: ServerAddress,
    transport: Arc<dyn HeartbeatTransport>,
    pool: Arc<dyn ConnectionPool>,
    connect_timeout: Duration,
    /// Dedicated monitoring connection, reused while healthy and reopened
    /// lazily after a failure.
    stream: Option<Box<dyn HeartbeatStream>>,
    round_trip_time: Option<Duration>,
}

/// One probe loop. The first probe runs immediately so freshly discovered
/// servers are classified quickly; afterwards the loop waits out the
/// heartbeat interval, floored at the minimum frequency, and can be woken
/// early through the request channel.
async fn run_monitor(mut monitor: Monitor) {
    tracing::debug!("Starting monitor for {}", monitor.worker.address);

    loop {
        let probe_started = Instant::now();

        let description = {
            let probe = monitor.worker.check();
            tokio::pin!(probe);
            loop {
                tokio::select! {
                    description = &mut probe => break Some(description),
                    request = monitor.requests.recv() => match request {
                        // A probe is already in flight; nothing extra to do.
                        Some(MonitorRequest::CheckNow) => {}
                        None => break None,
                    },
                }
            }
        };
        let Some(description) = description else { break };

        if monitor
            .updates
            .send(TopologyMessage::ServerUpdate { description })
            .await
            .is_err()
        {
            break;
        }

        let probe_ended = Instant::now();
        let delay = cmp::max(
            monitor.options.min_heartbeat_frequency,
            monitor
                .options
                .heartbeat_frequency
                .saturating_sub(probe_ended - probe_started),
        );
        // Even a woken monitor never probes more often than the floor allows.
        let earliest_next_probe = probe_ended + monitor.options.min_heartbeat_frequency;

        let sleep = time::sleep_until(probe_ended + delay);
        tokio::pin!(sleep);
        let mut shutdown = false;
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                request = monitor.requests.recv() => match request {
                    Some(MonitorRequest::CheckNow) => sleep.as_mut().reset(earliest_next_probe),
                    None => {
                        shutdown = true;
                        break;
                    }
                },
            }
        }
        if shutdown {
            break;
        }
    }

    tracing::debug!("Monitor for {} stopped", monitor.worker.address);
}

impl ProbeWorker {
    async fn check(&mut self) -> ServerDescription {
        let started = Instant::now();
        let result = self.hello().await;
        let sample = started.elapsed();

        match result {
            Ok(hello) => {
                let average = match self.round_trip_time {
                    None => sample,
                    Some(previous) => {
                        previous.mul_f64(1.0 - RTT_ALPHA) + sample.mul_f64(RTT_ALPHA)
                    }
                };
                self.round_trip_time = Some(average);
                tracing::trace!("Heartbeat for {} succeeded in {:?}", self.address, sample);
                ServerDescription::from_hello(self.address.clone(), &hello, average)
            }
            Err(error) => {
                tracing::debug!("Heartbeat for {} failed: {}", self.address, error);
                self.stream = None;
                self.round_trip_time = None;
                self.pool.invalidate(&self.address);
                ServerDescription::failed(self.address.clone(), error)
            }
        }
    }

    async fn hello(&mut self) -> Result<HelloResponse, HeartbeatError> {
        if self.stream.is_none() {
            let connected = time::timeout(
                self.connect_timeout,
                self.transport.connect(&self.address, self.connect_timeout),
            )
            .await
            .map_err(|_| HeartbeatError::Timeout)??;
            self.stream = Some(connected);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(HeartbeatError::Io(
                "monitoring connection unavailable".to_string(),
            ));
        };

        match time::timeout(self.connect_timeout, stream.hello()).await {
            Ok(result) => result,
            Err(_) => Err(HeartbeatError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::hello::NoopConnectionPool;

    struct Script {
        replies: Mutex<VecDeque<Result<HelloResponse, HeartbeatError>>>,
        last: Mutex<Result<HelloResponse, HeartbeatError>>,
        connects: AtomicUsize,
    }

    impl Script {
        fn new(replies: Vec<Result<HelloResponse, HeartbeatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(Ok(secondary_hello())),
                connects: AtomicUsize::new(0),
            })
        }

        fn next(&self) -> Result<HelloResponse, HeartbeatError> {
            match self.replies.lock().unwrap().pop_front() {
                Some(reply) => {
                    *self.last.lock().unwrap() = reply.clone();
                    reply
                }
                // Keep replaying the last scripted reply.
                None => self.last.lock().unwrap().clone(),
            }
        }
    }

    struct ScriptedTransport(Arc<Script>);
    struct ScriptedStream(Arc<Script>);

    #[async_trait]
    impl HeartbeatTransport for ScriptedTransport {
        async fn connect(
            &self,
            _address: &ServerAddress,
            _timeout: Duration,
        ) -> Result<Box<dyn HeartbeatStream>, HeartbeatError> {
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedStream(self.0.clone())))
        }
    }

    #[async_trait]
    impl HeartbeatStream for ScriptedStream {
        async fn hello(&mut self) -> Result<HelloResponse, HeartbeatError> {
            self.0.next()
        }
    }

    struct CountingPool(AtomicUsize);

    impl ConnectionPool for CountingPool {
        fn invalidate(&self, _address: &ServerAddress) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn secondary_hello() -> HelloResponse {
        HelloResponse {
            secondary: true,
            set_name: Some("rs0".to_string()),
            min_wire_version: 6,
            max_wire_version: 17,
            ..Default::default()
        }
    }

    fn test_options() -> MonitorOptions {
        MonitorOptions {
            heartbeat_frequency: Duration::from_millis(50),
            min_heartbeat_frequency: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(100),
        }
    }

    fn spawn(
        script: Arc<Script>,
        pool: Arc<dyn ConnectionPool>,
    ) -> (MonitorHandle, mpsc::Receiver<TopologyMessage>) {
        let (updates_tx, updates_rx) = mpsc::channel(16);
        let handle = start_monitor(
            "a:27017".parse().unwrap(),
            test_options(),
            Arc::new(ScriptedTransport(script)),
            pool,
            updates_tx,
        );
        (handle, updates_rx)
    }

    async fn next_description(updates: &mut mpsc::Receiver<TopologyMessage>) -> ServerDescription {
        match updates.recv().await {
            Some(TopologyMessage::ServerUpdate { description }) => description,
            other => panic!("expected a server update, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_probe_runs_immediately() {
        let started = Instant::now();
        let (handle, mut updates) = spawn(
            Script::new(vec![Ok(secondary_hello())]),
            Arc::new(NoopConnectionPool),
        );

        let description = next_description(&mut updates).await;

        assert!(started.elapsed() < test_options().heartbeat_frequency);
        assert_eq!(
            description.server_type,
            crate::server_description::ServerType::RSSecondary
        );
        assert!(description.round_trip_time.is_some());
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn probes_wait_out_the_heartbeat_interval() {
        let (handle, mut updates) = spawn(
            Script::new(vec![Ok(secondary_hello())]),
            Arc::new(NoopConnectionPool),
        );

        let _ = next_description(&mut updates).await;
        let first_done = Instant::now();
        let _ = next_description(&mut updates).await;

        assert!(first_done.elapsed() >= test_options().heartbeat_frequency);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn requested_check_wakes_the_monitor_early() {
        let (handle, mut updates) = spawn(
            Script::new(vec![Ok(secondary_hello())]),
            Arc::new(NoopConnectionPool),
        );

        let _ = next_description(&mut updates).await;
        let first_done = Instant::now();
        handle.request_check();
        let _ = next_description(&mut updates).await;

        let waited = first_done.elapsed();
        assert!(waited < test_options().heartbeat_frequency);
        assert!(waited >= test_options().min_heartbeat_frequency);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reports_error_invalidates_pool_and_reconnects() {
        let script = Script::new(vec![
            Err(HeartbeatError::Io("connection reset".to_string())),
            Ok(secondary_hello()),
        ]);
        let pool = Arc::new(CountingPool(AtomicUsize::new(0)));
        let (handle, mut updates) = spawn(script.clone(), pool.clone());

        let failed = next_description(&mut updates).await;
        assert!(failed.error.is_some());
        assert!(failed.round_trip_time.is_none());
        assert_eq!(pool.0.load(Ordering::SeqCst), 1);

        let recovered = next_description(&mut updates).await;
        assert!(recovered.error.is_none());
        // The monitoring connection was reopened after the failure.
        assert_eq!(script.connects.load(Ordering::SeqCst), 2);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn round_trip_average_is_exponentially_weighted() {
        let worker_rtt = |previous: Option<Duration>, sample: Duration| match previous {
            None => sample,
            Some(previous) => previous.mul_f64(1.0 - RTT_ALPHA) + sample.mul_f64(RTT_ALPHA),
        };

        let seeded = worker_rtt(None, Duration::from_millis(10));
        assert_eq!(seeded, Duration::from_millis(10));

        let folded = worker_rtt(Some(seeded), Duration::from_millis(20));
        assert_eq!(folded, Duration::from_millis(12));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop_promptly() {
        let (handle, mut updates) = spawn(
            Script::new(vec![Ok(secondary_hello())]),
            Arc::new(NoopConnectionPool),
        );
        let _ = next_description(&mut updates).await;

        let join = handle.shutdown();
        time::timeout(Duration::from_secs(1), join)
            .await
            .expect("monitor did not stop")
            .expect("monitor task panicked");

        // No further probes after cancellation was observed.
        assert!(updates.try_recv().is_err());
    }
}

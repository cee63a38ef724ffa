//! TCP reachability probe.

use std::sync::Mutex;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, trace};

use super::{ReachabilityNotifier, ReachabilitySink};
use crate::error::ConfigError;

/// Reports the network as reachable while a TCP connect to `addr` succeeds.
#[derive(Debug)]
pub struct TcpProbe {
    addr: String,
    every: Duration,
    connect_timeout: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpProbe {
    /// Probe `addr` (`host:port`) every `every`.
    pub fn new(addr: impl Into<String>, every: Duration) -> Self {
        Self {
            addr: addr.into(),
            every,
            connect_timeout: Duration::from_secs(3),
            task: Mutex::new(None),
        }
    }

    /// Override the per-probe connect timeout (default 3s).
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    fn replace_task(&self, next: Option<JoinHandle<()>>) {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = task.take() {
            previous.abort();
        }
        *task = next;
    }
}

impl ReachabilityNotifier for TcpProbe {
    fn start(&self, sink: ReachabilitySink) -> Result<(), ConfigError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| ConfigError::Reachability {
                message: e.to_string(),
            })?;

        debug!(addr = %self.addr, every_ms = self.every.as_millis(), "starting reachability probe");
        let task = runtime.spawn(probe_loop(
            self.addr.clone(),
            self.every,
            self.connect_timeout,
            sink,
        ));
        self.replace_task(Some(task));
        Ok(())
    }

    fn stop(&self) {
        debug!(addr = %self.addr, "stopping reachability probe");
        self.replace_task(None);
    }
}

impl Drop for TcpProbe {
    fn drop(&mut self) {
        self.replace_task(None);
    }
}

async fn probe_loop(
    addr: String,
    every: Duration,
    connect_timeout: Duration,
    sink: ReachabilitySink,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let reachable = matches!(
            timeout(connect_timeout, TcpStream::connect(addr.as_str())).await,
            Ok(Ok(_))
        );
        trace!(addr = %addr, reachable, "probe");
        sink.set_reachable(reachable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{AppLifecycleEvent, ConnectivityMonitor, ConnectivityMonitoring};
    use futures::stream::{self, StreamExt};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn monitor_for(addr: String) -> ConnectivityMonitor {
        let probe = TcpProbe::new(addr, Duration::from_millis(10))
            .with_connect_timeout(Duration::from_millis(200));
        ConnectivityMonitor::new(
            Arc::new(probe),
            stream::pending::<AppLifecycleEvent>(),
            Duration::from_millis(10),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn listening_address_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let monitor = monitor_for(addr);
        let signal = tokio::time::timeout(Duration::from_secs(5), monitor.connected(true).next())
            .await
            .unwrap();
        assert_eq!(signal, Some(()));
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let monitor = monitor_for(addr);
        let signal = tokio::time::timeout(
            Duration::from_secs(5),
            monitor.disconnected_after_delay(true).next(),
        )
        .await
        .unwrap();
        assert_eq!(signal, Some(()));
        assert!(!monitor.is_connected());
    }

    #[test]
    fn start_outside_runtime_is_a_config_error() {
        let (state, _) = tokio::sync::watch::channel(false);
        let sink = ReachabilitySink {
            state: Arc::new(state),
        };
        let probe = TcpProbe::new("127.0.0.1:9", Duration::from_secs(1));
        assert!(matches!(
            probe.start(sink),
            Err(ConfigError::Reachability { .. })
        ));
    }
}

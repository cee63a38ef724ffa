//! Connectivity monitoring.
//!
//! The monitor owns the process-wide reachability flag. A platform notifier
//! writes it through a [`ReachabilitySink`]; subscribers read it as streams
//! of unit signals. App lifecycle events stop the notifier while in the
//! background and restart it on return to the foreground.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error};

use crate::error::ConfigError;

mod probe;

pub use probe::TcpProbe;

/// Stream of unit signals produced by the monitor.
pub type SignalStream = BoxStream<'static, ()>;

/// Subscription side of connectivity monitoring.
///
/// With `one_shot` the stream ends after its first value; otherwise it runs
/// until the subscriber drops it.
pub trait ConnectivityMonitoring: Send + Sync {
    /// Emits when the connection is down, observed only after a settle delay
    /// counted from subscription.
    fn disconnected_after_delay(&self, one_shot: bool) -> SignalStream;

    /// Emits when the connection is up, immediately if it already is.
    fn connected(&self, one_shot: bool) -> SignalStream;
}

/// App lifecycle signals the monitor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycleEvent {
    DidEnterBackground,
    WillEnterForeground,
}

/// Write handle into the shared reachability flag.
#[derive(Debug, Clone)]
pub struct ReachabilitySink {
    state: Arc<watch::Sender<bool>>,
}

impl ReachabilitySink {
    /// Publish the current reachability. Repeating the current value is not a
    /// transition and wakes nobody.
    pub fn set_reachable(&self, reachable: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
        if changed {
            debug!(reachable, "reachability changed");
        }
    }
}

/// Platform reachability primitive.
pub trait ReachabilityNotifier: Send + Sync {
    /// Begin publishing up/down transitions into `sink`.
    fn start(&self, sink: ReachabilitySink) -> Result<(), ConfigError>;

    /// Stop publishing. The last published value stays in place.
    fn stop(&self);
}

/// Connectivity monitor backed by a [`ReachabilityNotifier`].
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
    notifier: Arc<dyn ReachabilityNotifier>,
    no_connection_delay: Duration,
    lifecycle_task: JoinHandle<()>,
}

impl ConnectivityMonitor {
    /// Start the notifier and follow `lifecycle`.
    ///
    /// Fails with [`ConfigError::Reachability`] outside a tokio runtime. The
    /// connection is considered down until the notifier reports otherwise.
    pub fn new<S>(
        notifier: Arc<dyn ReachabilityNotifier>,
        lifecycle: S,
        no_connection_delay: Duration,
    ) -> Result<Self, ConfigError>
    where
        S: Stream<Item = AppLifecycleEvent> + Send + 'static,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| ConfigError::Reachability {
                message: e.to_string(),
            })?;

        let (state, _) = watch::channel(false);
        let state = Arc::new(state);
        let sink = ReachabilitySink {
            state: Arc::clone(&state),
        };

        notifier.start(sink.clone())?;

        let lifecycle_task = runtime.spawn(follow_lifecycle(
            Box::pin(lifecycle),
            Arc::clone(&notifier),
            sink,
        ));

        Ok(Self {
            state,
            notifier,
            no_connection_delay,
            lifecycle_task,
        })
    }

    /// Current value of the shared flag.
    pub fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    fn limit(stream: impl Stream<Item = ()> + Send + 'static, one_shot: bool) -> SignalStream {
        if one_shot {
            stream.take(1).boxed()
        } else {
            stream.boxed()
        }
    }
}

impl ConnectivityMonitoring for ConnectivityMonitor {
    fn disconnected_after_delay(&self, one_shot: bool) -> SignalStream {
        let state = Arc::clone(&self.state);
        let signals = stream::once(tokio::time::sleep(self.no_connection_delay))
            .flat_map(move |()| WatchStream::new(state.subscribe()))
            .filter(|reachable| future::ready(!*reachable))
            .map(|_| ());
        Self::limit(signals, one_shot)
    }

    fn connected(&self, one_shot: bool) -> SignalStream {
        let signals = WatchStream::new(self.state.subscribe())
            .filter(|reachable| future::ready(*reachable))
            .map(|_| ());
        Self::limit(signals, one_shot)
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.lifecycle_task.abort();
        self.notifier.stop();
    }
}

async fn follow_lifecycle(
    mut lifecycle: std::pin::Pin<Box<dyn Stream<Item = AppLifecycleEvent> + Send>>,
    notifier: Arc<dyn ReachabilityNotifier>,
    sink: ReachabilitySink,
) {
    while let Some(event) = lifecycle.next().await {
        debug!(?event, "lifecycle event");
        match event {
            AppLifecycleEvent::DidEnterBackground => notifier.stop(),
            AppLifecycleEvent::WillEnterForeground => {
                if let Err(e) = notifier.start(sink.clone()) {
                    error!(error = %e, "failed to restart reachability notifier");
                }
            }
        }
    }
}

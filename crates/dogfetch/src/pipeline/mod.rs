//! Request pipeline: one fetch, classified, retried under a fixed budget.
//!
//! Every error kind except parse failures consumes one retry. What happens
//! before the retry depends on the kind:
//!
//! - server error: fixed delay
//! - transport failure caused by losing the network: suspend until the
//!   connectivity monitor reports the connection back (unbounded)
//! - anything else: retry immediately
//!
//! Attempts for one request are strictly sequential. Dropping the future
//! returned by [`RequestPipeline::execute`] abandons the in-flight attempt
//! and any pending wait.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::connectivity::ConnectivityMonitoring;
use crate::error::FetchError;
use crate::transport::Transport;
use crate::types::{FetchRequest, RetryPolicy};
use crate::FetchOutcome;

mod classify;

pub use classify::classify;

/// Executes fetches with retry and connectivity-aware suspension.
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    connectivity: Option<Arc<dyn ConnectivityMonitoring>>,
    policy: RetryPolicy,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            connectivity: None,
            policy,
        }
    }

    /// Suspend no-network retries on `monitor` instead of retrying at once.
    pub fn with_connectivity(mut self, monitor: Arc<dyn ConnectivityMonitoring>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `request`, retrying transient failures.
    ///
    /// At most `1 + max_retries` transport attempts are made. The last error
    /// is surfaced once the budget is spent.
    pub async fn execute(&self, request: &FetchRequest) -> FetchOutcome {
        let max_retries = self.policy.max_retries;
        let mut retries = 0;

        loop {
            debug!(url = %request.url(), attempt = retries + 1, "sending request");
            let error = match self.attempt(request).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if !error.is_retryable() || retries >= max_retries {
                debug!(url = %request.url(), error = %error, retries, "giving up");
                return Err(error);
            }

            retries += 1;
            self.before_retry(request, &error, retries).await;
        }
    }

    async fn attempt(&self, request: &FetchRequest) -> FetchOutcome {
        match self.transport.send(request).await {
            Ok(response) => classify(response),
            Err(failure) => Err(FetchError::Transport(failure)),
        }
    }

    async fn before_retry(&self, request: &FetchRequest, error: &FetchError, retry: u32) {
        let max_retries = self.policy.max_retries;

        match (error, &self.connectivity) {
            (FetchError::Server { .. }, _) => {
                let backoff = self.policy.server_error_delay;
                warn!(
                    url = %request.url(),
                    error = %error,
                    retry,
                    max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying request"
                );
                tokio::time::sleep(backoff).await;
            }
            (e, Some(monitor)) if e.is_no_connection() => {
                warn!(
                    url = %request.url(),
                    error = %error,
                    retry,
                    max_retries,
                    "no connection, retry suspended until connectivity returns"
                );
                // A finished stream means the monitor is gone; retry anyway.
                let _ = monitor.connected(true).next().await;
                debug!(url = %request.url(), "connectivity restored");
            }
            _ => {
                warn!(
                    url = %request.url(),
                    error = %error,
                    retry,
                    max_retries,
                    backoff_ms = 0u64,
                    "retrying request"
                );
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::connectivity::SignalStream;
    use crate::error::{TransportErrorKind, TransportFailure};
    use crate::transport::RawResponse;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::Instant;
    use url::Url;

    type Scripted = Result<RawResponse, TransportFailure>;

    /// Transport double: plays a script, then repeats the fallback forever.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        fallback: Box<dyn Fn() -> Scripted + Send + Sync>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(
            script: Vec<Scripted>,
            fallback: impl Fn() -> Scripted + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback: Box::new(fallback),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn always(fallback: impl Fn() -> Scripted + Send + Sync + 'static) -> Arc<Self> {
            Self::new(Vec::new(), fallback)
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: &FetchRequest) -> Result<RawResponse, TransportFailure> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| (self.fallback)())
        }
    }

    /// Monitor double: `connected` fires only after `trigger`.
    #[derive(Default)]
    struct GatedMonitor {
        gate: Arc<Notify>,
    }

    impl GatedMonitor {
        fn trigger(&self) {
            self.gate.notify_one();
        }
    }

    impl ConnectivityMonitoring for GatedMonitor {
        fn disconnected_after_delay(&self, _one_shot: bool) -> SignalStream {
            stream::pending().boxed()
        }

        fn connected(&self, _one_shot: bool) -> SignalStream {
            let gate = Arc::clone(&self.gate);
            stream::once(async move { gate.notified().await }).boxed()
        }
    }

    fn request() -> FetchRequest {
        FetchRequest::get(Url::parse("https://dog.ceo/api/breeds/list/all").unwrap())
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    fn offline() -> Scripted {
        Err(TransportFailure::new(
            TransportErrorKind::NotConnected,
            "offline",
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_exhausts_budget_with_delays() {
        let transport = ScriptedTransport::always(|| Ok(RawResponse::new(503, "busy")));
        let pipeline = RequestPipeline::new(transport.clone(), policy());

        let started = Instant::now();
        let outcome = pipeline.execute(&request()).await;

        assert!(matches!(outcome, Err(FetchError::Server { status: 503 })));
        assert_eq!(transport.calls(), 4);
        let times = transport.call_times();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
        assert!(started.elapsed() >= Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_response_retries_immediately() {
        let transport = ScriptedTransport::always(|| {
            Ok(RawResponse {
                status: None,
                body: bytes::Bytes::new(),
            })
        });
        let pipeline = RequestPipeline::new(transport.clone(), policy());

        let started = Instant::now();
        let outcome = pipeline.execute(&request()).await;

        assert!(matches!(outcome, Err(FetchError::UnexpectedResponse)));
        assert_eq!(transport.calls(), 4);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn other_transport_failure_retries_immediately() {
        let transport = ScriptedTransport::always(|| {
            Err(TransportFailure::new(TransportErrorKind::Other, "tls"))
        });
        let pipeline = RequestPipeline::new(transport.clone(), policy());

        let outcome = pipeline.execute(&request()).await;
        match outcome {
            Err(FetchError::Transport(failure)) => {
                assert_eq!(failure.kind, TransportErrorKind::Other)
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connection_never_waits_on_monitor() {
        let transport = ScriptedTransport::always(|| {
            Err(TransportFailure::new(
                TransportErrorKind::Other,
                "connection refused",
            ))
        });
        // Never triggered: a suspended retry would hang here.
        let monitor = Arc::new(GatedMonitor::default());
        let pipeline = RequestPipeline::new(transport.clone(), policy())
            .with_connectivity(monitor as Arc<dyn ConnectivityMonitoring>);

        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_secs(1), pipeline.execute(&request()))
            .await
            .expect("retries must not suspend");

        assert!(!outcome.unwrap_err().is_no_connection());
        assert_eq!(transport.calls(), 4);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let transport = ScriptedTransport::new(
            vec![
                Ok(RawResponse::new(500, "")),
                Err(TransportFailure::new(TransportErrorKind::TimedOut, "slow")),
            ],
            || Ok(RawResponse::new(200, "payload")),
        );
        let pipeline = RequestPipeline::new(transport.clone(), policy());

        let body = pipeline.execute(&request()).await.unwrap();
        assert_eq!(&body[..], b"payload");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn zero_budget_means_single_attempt() {
        let transport = ScriptedTransport::always(|| Ok(RawResponse::new(500, "")));
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let pipeline = RequestPipeline::new(transport.clone(), policy);

        assert!(pipeline.execute(&request()).await.is_err());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_connection_suspends_until_connected() {
        let transport =
            ScriptedTransport::new(vec![offline()], || Ok(RawResponse::new(200, "back")));
        let monitor = Arc::new(GatedMonitor::default());
        let pipeline = Arc::new(
            RequestPipeline::new(transport.clone(), policy())
                .with_connectivity(monitor.clone() as Arc<dyn ConnectivityMonitoring>),
        );

        let task = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.execute(&request()).await })
        };

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.calls(), 1);
        assert!(!task.is_finished());

        monitor.trigger();
        let body = task.await.unwrap().unwrap();
        assert_eq!(&body[..], b"back");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn suspended_retries_still_count_against_budget() {
        let transport = ScriptedTransport::always(offline);
        let monitor = Arc::new(GatedMonitor::default());
        let pipeline = RequestPipeline::new(transport.clone(), policy())
            .with_connectivity(monitor.clone() as Arc<dyn ConnectivityMonitoring>);

        let request = request();
        let run = pipeline.execute(&request);
        tokio::pin!(run);

        for expected_calls in 1..=3 {
            tokio::select! {
                _ = &mut run => panic!("finished before connectivity returned"),
                _ = tokio::time::sleep(Duration::from_secs(30)) => {}
            }
            assert_eq!(transport.calls(), expected_calls);
            monitor.trigger();
        }

        let outcome = run.await;
        assert!(outcome.unwrap_err().is_no_connection());
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn no_connection_without_monitor_retries_immediately() {
        let transport = ScriptedTransport::new(vec![offline(), offline()], || {
            Ok(RawResponse::new(200, "ok"))
        });
        let pipeline = RequestPipeline::new(transport.clone(), policy());

        assert!(pipeline.execute(&request()).await.is_ok());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_execute_stops_further_attempts() {
        let transport = ScriptedTransport::always(|| Ok(RawResponse::new(500, "")));
        let pipeline = Arc::new(RequestPipeline::new(transport.clone(), policy()));

        let task = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.execute(&request()).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.calls(), 1);
    }
}

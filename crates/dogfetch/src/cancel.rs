//! Token-driven cancellation for fetch operations.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Drive `work` until it completes or `token` is cancelled.
///
/// On cancellation `work` is dropped at its current await point, which
/// aborts any in-flight request and pending retry wait, and `None` is
/// returned. A cancelled operation never yields a partial outcome.
pub async fn run_cancellable<F>(token: &CancellationToken, work: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("operation cancelled");
            None
        }
        output = work => Some(output),
    }
}

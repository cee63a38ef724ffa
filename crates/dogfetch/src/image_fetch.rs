//! Best-effort image loading through the cache.

use std::sync::Arc;

use tracing::{debug, error, warn};
use url::Url;

use crate::cache::{Bitmap, EncodedImage, ImageCache};
use crate::pipeline::RequestPipeline;
use crate::types::FetchRequest;

/// Serves images from [`ImageCache`], fetching and caching on a miss.
///
/// Failures of any kind resolve to `None`: a missing thumbnail is retried
/// the next time it is asked for, so there is nothing useful to surface.
#[derive(Clone)]
pub struct ImageFetchPipeline {
    pipeline: Arc<RequestPipeline>,
    cache: Arc<ImageCache>,
}

impl ImageFetchPipeline {
    pub fn new(pipeline: Arc<RequestPipeline>, cache: Arc<ImageCache>) -> Self {
        Self { pipeline, cache }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Decoded image at `url`, or `None` if it could not be obtained.
    pub async fn fetch_image(&self, url: &Url) -> Option<Bitmap> {
        let cached = {
            let cache = Arc::clone(&self.cache);
            let url = url.clone();
            off_thread(move || cache.get(&url)).await
        };
        if let Some(bitmap) = cached.flatten() {
            return Some(bitmap);
        }

        let body = match self.pipeline.execute(&FetchRequest::get(url.clone())).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "image fetch failed");
                return None;
            }
        };

        let encoded = match EncodedImage::from_bytes(body) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(url = %url, error = %e, "response is not an image");
                return None;
            }
        };
        debug!(url = %url, format = ?encoded.format(), bytes = encoded.len(), "image downloaded");

        let cache = Arc::clone(&self.cache);
        let key = url.clone();
        off_thread(move || cache.put(&key, Some(encoded)))
            .await
            .flatten()
    }
}

/// Run CPU-bound decode work on the blocking pool.
async fn off_thread<T, F>(work: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => Some(value),
        Err(e) => {
            error!(error = %e, "image decode task failed");
            None
        }
    }
}

//! Typed JSON fetches on top of the request pipeline.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{FetchError, FetchResult};
use crate::pipeline::RequestPipeline;
use crate::types::FetchRequest;

/// Fetches a resource and decodes its JSON body into `T`.
///
/// Decode failures are never retried: the bytes already arrived, asking
/// again would return the same payload.
#[derive(Clone)]
pub struct ResourceDecoder {
    pipeline: Arc<RequestPipeline>,
}

impl ResourceDecoder {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// Fetch `request` and decode the body as `T`.
    pub async fn fetch_typed<T: DeserializeOwned>(&self, request: &FetchRequest) -> FetchResult<T> {
        let body = self.pipeline.execute(request).await?;
        decode(&body).inspect_err(|e| {
            warn!(url = %request.url(), error = %e, "response did not decode");
        })
    }
}

/// Decode a JSON payload into `T`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> FetchResult<T> {
    serde_json::from_slice(body).map_err(FetchError::parse)
}

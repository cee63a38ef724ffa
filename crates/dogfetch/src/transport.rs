//! Outbound transport: one HTTP exchange, no status interpretation.
//!
//! Status codes are classified by the pipeline only; implementations hand
//! back whatever status and body they got.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::{ConfigError, TransportFailure};
use crate::types::FetchRequest;

const USER_AGENT_VALUE: &str = concat!("dogfetch/", env!("CARGO_PKG_VERSION"));

/// Raw result of a single exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status, `None` when the peer did not produce one.
    pub status: Option<u16>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
        }
    }
}

/// Issues a single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportFailure>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| ConfigError::Client {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!(url = %request.url(), status, bytes = body.len(), "response received");

        Ok(RawResponse {
            status: Some(status),
            body,
        })
    }
}

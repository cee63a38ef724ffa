//! Resilient fetch-and-cache engine for the dog image API.
//!
//! This crate provides:
//!
//! - A request pipeline with a fixed retry budget, a delay before retrying
//!   server errors, and retries suspended while the network is gone
//! - Connectivity monitoring driven by a pluggable reachability notifier
//! - Typed JSON decoding of API payloads
//! - A two-tier image cache (encoded bytes by count, decoded bitmaps by size)
//! - Best-effort image loading that never surfaces errors
//!
//! # Quick Start
//!
//! ```no_run
//! use dogfetch::{DogService, ServiceConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env()?;
//! let service = DogService::from_config(&config, None)?;
//!
//! for breed in service.all_breeds().await? {
//!     println!("{breed}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Connectivity
//!
//! Pass a [`ConnectivityMonitor`] to suspend retries while offline:
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dogfetch::{
//!     AppLifecycleEvent, ConnectivityMonitor, ConnectivityMonitoring, DogService, ServiceConfig,
//!     TcpProbe,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::default();
//! let probe = Arc::new(TcpProbe::new("dog.ceo:443", Duration::from_secs(10)));
//! let monitor = ConnectivityMonitor::new(
//!     probe,
//!     futures::stream::pending::<AppLifecycleEvent>(),
//!     config.no_connection_delay(),
//! )?;
//! let monitor: Arc<dyn ConnectivityMonitoring> = Arc::new(monitor);
//! let service = DogService::from_config(&config, Some(monitor))?;
//! # let _ = service;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `DOGFETCH_BASE_URL` | API base URL (default: `https://dog.ceo/api`) |
//! | `DOGFETCH_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `DOGFETCH_MAX_RETRIES` | Retries after the first attempt (default: 3) |
//! | `DOGFETCH_RETRY_DELAY_MS` | Delay before retrying a server error (default: 3000) |
//! | `DOGFETCH_NO_CONNECTION_DELAY_MS` | Connectivity settle window (default: 5000) |
//! | `DOGFETCH_CACHE_COUNT_LIMIT` | Encoded images kept (default: 30) |
//! | `DOGFETCH_CACHE_MEMORY_LIMIT` | Decoded bytes kept (default: 30 MiB) |

pub mod cache;
pub mod cancel;
pub mod connectivity;
pub mod decoder;
pub mod error;
pub mod image_fetch;
pub mod pipeline;
pub mod service;
pub mod transport;
pub mod types;

// Re-export main types
pub use cache::{Bitmap, CacheStats, EncodedImage, ImageCache};
pub use cancel::run_cancellable;
pub use connectivity::{
    AppLifecycleEvent, ConnectivityMonitor, ConnectivityMonitoring, ReachabilityNotifier,
    ReachabilitySink, SignalStream, TcpProbe,
};
pub use decoder::ResourceDecoder;
pub use error::{ConfigError, FetchError, FetchResult, TransportErrorKind, TransportFailure};
pub use image_fetch::ImageFetchPipeline;
pub use pipeline::{classify, RequestPipeline};
pub use service::{DogService, Endpoint};
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use types::{
    Breed, BreedList, FetchRequest, ImageCacheConfig, ImageUrlList, RandomImageUrl, RetryPolicy,
    ServiceConfig,
};

/// Terminal result of one pipeline execution: the response body or the last
/// error seen once retries are spent.
pub type FetchOutcome = FetchResult<bytes::Bytes>;

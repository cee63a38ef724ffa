//! Dog API facade.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::cache::{Bitmap, ImageCache};
use crate::connectivity::ConnectivityMonitoring;
use crate::decoder::ResourceDecoder;
use crate::error::{ConfigError, FetchResult};
use crate::image_fetch::ImageFetchPipeline;
use crate::pipeline::RequestPipeline;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Breed, BreedList, FetchRequest, ImageUrlList, RandomImageUrl, ServiceConfig};

/// JSON endpoints of the dog API, relative to the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// `breeds/list/all`
    AllBreeds,
    /// `breed/{breed}/images`
    AllImages { breed: &'a str },
    /// `breed/{breed}/images/random`
    RandomImage { breed: &'a str },
}

impl Endpoint<'_> {
    fn segments(&self) -> Vec<&str> {
        match *self {
            Self::AllBreeds => vec!["breeds", "list", "all"],
            Self::AllImages { breed } => {
                let mut segments = vec!["breed"];
                segments.extend(breed_path(breed));
                segments.push("images");
                segments
            }
            Self::RandomImage { breed } => {
                let mut segments = vec!["breed"];
                segments.extend(breed_path(breed));
                segments.extend(["images", "random"]);
                segments
            }
        }
    }

    /// Absolute URL of this endpoint under `base`.
    ///
    /// `base` must be able to carry path segments, as checked by
    /// [`ServiceConfig::base_url`].
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(self.segments());
        }
        url
    }
}

// "hound/afghan" addresses a sub-breed and spans two segments.
fn breed_path(breed: &str) -> impl Iterator<Item = &str> {
    breed.split('/').filter(|s| !s.is_empty())
}

/// Typed access to the dog API plus cached image loading.
#[derive(Clone)]
pub struct DogService {
    base_url: Url,
    decoder: ResourceDecoder,
    images: ImageFetchPipeline,
}

impl DogService {
    /// Assemble the service from already built parts.
    pub fn new(base_url: Url, pipeline: Arc<RequestPipeline>, cache: Arc<ImageCache>) -> Self {
        Self {
            base_url,
            decoder: ResourceDecoder::new(Arc::clone(&pipeline)),
            images: ImageFetchPipeline::new(pipeline, cache),
        }
    }

    /// Build the production stack from `config`.
    ///
    /// Without a monitor, retries after a lost connection happen immediately.
    pub fn from_config(
        config: &ServiceConfig,
        connectivity: Option<Arc<dyn ConnectivityMonitoring>>,
    ) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Self::with_transport(config, Arc::new(transport), connectivity)
    }

    /// Build the stack from `config` around a caller-supplied transport.
    pub fn with_transport(
        config: &ServiceConfig,
        transport: Arc<dyn Transport>,
        connectivity: Option<Arc<dyn ConnectivityMonitoring>>,
    ) -> Result<Self, ConfigError> {
        let base_url = config.base_url()?;
        let mut pipeline = RequestPipeline::new(transport, config.retry_policy());
        if let Some(monitor) = connectivity {
            pipeline = pipeline.with_connectivity(monitor);
        }
        let cache = Arc::new(ImageCache::new(config.cache_config()));

        debug!(base_url = %base_url, "dog service ready");
        Ok(Self::new(base_url, Arc::new(pipeline), cache))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        self.images.cache()
    }

    /// All breed names, ascending.
    pub async fn all_breeds(&self) -> FetchResult<Vec<String>> {
        let list: BreedList = self.fetch(Endpoint::AllBreeds).await?;
        Ok(list.names())
    }

    /// Every image URL of `breed`.
    pub async fn all_image_urls(&self, breed: &str) -> FetchResult<Vec<Url>> {
        let list: ImageUrlList = self.fetch(Endpoint::AllImages { breed }).await?;
        Ok(list.image_urls)
    }

    /// Images of `breed` paired with the breed name.
    pub async fn breed_images(&self, breed: &str) -> FetchResult<Vec<Breed>> {
        let urls = self.all_image_urls(breed).await?;
        Ok(urls
            .into_iter()
            .map(|image_url| Breed {
                image_url,
                breed_name: breed.to_string(),
            })
            .collect())
    }

    /// One random image URL of `breed`.
    pub async fn random_image_url(&self, breed: &str) -> FetchResult<Url> {
        let random: RandomImageUrl = self.fetch(Endpoint::RandomImage { breed }).await?;
        Ok(random.image_url)
    }

    /// Decoded image at `url`; `None` on any failure.
    pub async fn image(&self, url: &Url) -> Option<Bitmap> {
        self.images.fetch_image(url).await
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, endpoint: Endpoint<'_>) -> FetchResult<T> {
        let request = FetchRequest::get(endpoint.url(&self.base_url))
            .with_header("accept", "application/json");
        self.decoder.fetch_typed(&request).await
    }
}

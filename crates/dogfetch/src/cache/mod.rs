//! Two-tier in-memory image cache.
//!
//! The encoded tier keeps compressed bytes and is bounded by entry count.
//! The decoded tier keeps RGBA bitmaps and is bounded by total byte cost.
//! Both tiers sit behind one mutex that is never held while decompressing:
//! decode happens outside the lock, then the lock is taken again briefly to
//! insert the result.
//!
//! Evicting a bitmap never touches the encoded tier; a later `get` simply
//! decodes the bytes again.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};
use url::Url;

use crate::types::ImageCacheConfig;

mod bitmap;
mod lru;

pub use bitmap::{decoded_cost, Bitmap, EncodedImage};
use lru::BoundedLru;

#[cfg(test)]
pub(crate) use bitmap::tests::png as test_png;

/// Snapshot of cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries in the encoded tier.
    pub encoded_count: usize,
    /// Entries in the decoded tier.
    pub decoded_count: usize,
    /// Bytes charged against the decoded tier.
    pub decoded_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped from either tier under capacity pressure.
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Tiers {
    encoded: BoundedLru<Url, EncodedImage>,
    decoded: BoundedLru<Url, Bitmap>,
    hits: u64,
    misses: u64,
}

/// Thread-safe image cache keyed by image URL.
pub struct ImageCache {
    tiers: Mutex<Tiers>,
    config: ImageCacheConfig,
}

impl ImageCache {
    pub fn new(config: ImageCacheConfig) -> Self {
        Self {
            tiers: Mutex::new(Tiers {
                encoded: BoundedLru::new(config.count_limit, 0),
                decoded: BoundedLru::new(0, config.memory_limit),
                hits: 0,
                misses: 0,
            }),
            config,
        }
    }

    pub fn config(&self) -> ImageCacheConfig {
        self.config
    }

    /// Decoded image for `url`, decompressing from the encoded tier if needed.
    pub fn get(&self, url: &Url) -> Option<Bitmap> {
        let encoded = {
            let mut tiers = self.lock();
            if let Some(bitmap) = tiers.decoded.get(url).cloned() {
                // Keep the bytes warm too, so a later bitmap eviction can recover.
                tiers.encoded.get(url);
                tiers.hits += 1;
                debug!(url = %url, "image cache hit");
                return Some(bitmap);
            }
            match tiers.encoded.get(url).cloned() {
                Some(encoded) => encoded,
                None => {
                    tiers.misses += 1;
                    debug!(url = %url, "image cache miss");
                    return None;
                }
            }
        };

        let bitmap = match encoded.decompress() {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!(url = %url, error = %e, "cached image failed to decode, dropping it");
                let mut tiers = self.lock();
                tiers.encoded.remove(url);
                tiers.misses += 1;
                return None;
            }
        };

        let mut tiers = self.lock();
        tiers.hits += 1;
        // Skip the insert if the entry was removed or replaced meanwhile.
        if tiers.encoded.get(url) == Some(&encoded) {
            tiers.decoded.insert(url.clone(), bitmap.clone(), bitmap.cost());
        }
        debug!(url = %url, cost = bitmap.cost(), "image decoded from encoded tier");
        Some(bitmap)
    }

    /// Store `image` under `url`, or drop every entry for `url` when `None`.
    ///
    /// Returns the decoded bitmap. Bytes that fail to decode are not stored
    /// and clear whatever was cached for `url`.
    pub fn put(&self, url: &Url, image: Option<EncodedImage>) -> Option<Bitmap> {
        let Some(encoded) = image else {
            self.remove(url);
            return None;
        };

        let bitmap = match encoded.decompress() {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!(url = %url, error = %e, "refusing to cache undecodable image");
                self.remove(url);
                return None;
            }
        };

        let cost = bitmap.cost();
        let mut tiers = self.lock();
        tiers.encoded.insert(url.clone(), encoded, 0);
        tiers.decoded.insert(url.clone(), bitmap.clone(), cost);
        if !tiers.decoded.admits(cost) {
            debug!(url = %url, cost, "bitmap exceeds decoded tier, kept encoded only");
        }
        Some(bitmap)
    }

    /// Drop `url` from both tiers.
    pub fn remove(&self, url: &Url) {
        let mut tiers = self.lock();
        tiers.encoded.remove(url);
        tiers.decoded.remove(url);
    }

    pub fn stats(&self) -> CacheStats {
        let tiers = self.lock();
        CacheStats {
            encoded_count: tiers.encoded.len(),
            decoded_count: tiers.decoded.len(),
            decoded_bytes: tiers.decoded.total_cost(),
            hits: tiers.hits,
            misses: tiers.misses,
            evictions: tiers.encoded.evictions() + tiers.decoded.evictions(),
        }
    }

    // The maps stay consistent even if a holder panicked: every mutation
    // completes before anything that can panic runs.
    fn lock(&self) -> MutexGuard<'_, Tiers> {
        self.tiers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(ImageCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::bitmap::tests::png;
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;

    fn url(n: usize) -> Url {
        Url::parse(&format!("https://images.dog.ceo/breeds/akita/{n}.png")).unwrap()
    }

    fn encoded(width: u32, height: u32) -> EncodedImage {
        EncodedImage::from_bytes(png(width, height)).unwrap()
    }

    #[test]
    fn put_then_get_returns_same_pixels() {
        let cache = ImageCache::default();
        let stored = cache.put(&url(1), Some(encoded(4, 4))).unwrap();

        let fetched = cache.get(&url(1)).unwrap();
        assert_eq!(fetched.as_rgba(), stored.as_rgba());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn put_none_removes_entry() {
        let cache = ImageCache::default();
        cache.put(&url(1), Some(encoded(2, 2)));
        assert!(cache.put(&url(1), None).is_none());

        assert!(cache.get(&url(1)).is_none());
        let stats = cache.stats();
        assert_eq!((stats.encoded_count, stats.decoded_count), (0, 0));
    }

    #[test]
    fn remove_clears_both_tiers() {
        let cache = ImageCache::default();
        cache.put(&url(1), Some(encoded(2, 2)));
        cache.remove(&url(1));
        assert!(cache.get(&url(1)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn count_limit_evicts_least_recent_encoded_entry() {
        // Room for a single 1x1 bitmap, so most reads fall back to the
        // encoded tier.
        let cache = ImageCache::new(ImageCacheConfig {
            count_limit: 2,
            memory_limit: 16,
        });
        cache.put(&url(1), Some(encoded(1, 1)));
        cache.put(&url(2), Some(encoded(1, 1)));

        // Decoded from the encoded tier, which marks url(1) as recent.
        assert!(cache.get(&url(1)).is_some());

        cache.put(&url(3), Some(encoded(1, 1)));

        assert_eq!(cache.stats().encoded_count, 2);
        assert!(cache.get(&url(2)).is_none());
        assert!(cache.get(&url(1)).is_some());
        assert!(cache.get(&url(3)).is_some());
    }

    #[test]
    fn decoded_eviction_falls_back_to_encoded_tier() {
        // Each 4x4 bitmap costs 64 bytes; the tier holds one.
        let cache = ImageCache::new(ImageCacheConfig {
            count_limit: 0,
            memory_limit: 100,
        });
        cache.put(&url(1), Some(encoded(4, 4)));
        cache.put(&url(2), Some(encoded(4, 4)));

        let stats = cache.stats();
        assert_eq!(stats.encoded_count, 2);
        assert_eq!(stats.decoded_count, 1);
        assert_eq!(stats.decoded_bytes, 64);

        let again = cache.get(&url(1)).unwrap();
        assert_eq!((again.width(), again.height()), (4, 4));
        assert_eq!(cache.stats().decoded_count, 1);
    }

    #[test]
    fn oversized_bitmap_is_kept_encoded_only() {
        let cache = ImageCache::new(ImageCacheConfig {
            count_limit: 0,
            memory_limit: 32,
        });
        let bitmap = cache.put(&url(1), Some(encoded(8, 8))).unwrap();
        assert_eq!(bitmap.cost(), 256);

        let stats = cache.stats();
        assert_eq!((stats.encoded_count, stats.decoded_count), (1, 0));
        assert!(cache.get(&url(1)).is_some());
    }

    #[test]
    fn undecodable_put_clears_previous_entry() {
        let cache = ImageCache::default();
        cache.put(&url(1), Some(encoded(2, 2)));

        let mut broken = png(2, 2).to_vec();
        broken.truncate(20);
        let broken = EncodedImage::from_bytes(Bytes::from(broken)).unwrap();

        assert!(cache.put(&url(1), Some(broken)).is_none());
        assert!(cache.get(&url(1)).is_none());
    }

    #[test]
    fn concurrent_access_is_serialized() {
        let cache = Arc::new(ImageCache::new(ImageCacheConfig {
            count_limit: 8,
            memory_limit: 1024,
        }));
        let image = encoded(3, 3);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let image = image.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = url((t * 50 + i) % 12);
                        cache.put(&key, Some(image.clone()));
                        cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert!(stats.encoded_count <= 8);
        assert!(stats.decoded_bytes <= 1024);
    }
}

//! Asynchronous image loading with a per-layer completion handle.
//!
//! Each layer's image is decoded at most once, in the background. A finished
//! decode adds the raster to the shared [`RasterCache`] and then resolves its
//! [`DecodeHandle`]. Preview passes just read the cache and never wait;
//! export joins on the handles of every layer it is about to paint.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

use composer_core::LayerId;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::compositor::RasterProvider;
use crate::error::{RenderError, RenderResult};
use crate::image::{decode_image, Raster};
use crate::raster_cache::{CacheStats, RasterCache};

/// Result of one layer's decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The raster is in the cache.
    Ready {
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
    },
    /// Decoding failed; the layer will never be painted.
    Failed(String),
}

/// Resolves once a layer's decode has finished, successfully or not.
///
/// Cheap to clone; every clone sees the same outcome.
pub type DecodeHandle = Shared<BoxFuture<'static, DecodeOutcome>>;

/// Where a layer's raster currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No decode was ever requested.
    Unrequested,
    /// A decode is in flight.
    Pending,
    /// The raster is cached.
    Ready,
    /// The decode failed.
    Failed,
}

#[derive(Default)]
struct LoaderInner {
    cache: RwLock<RasterCache>,
    pending: Mutex<HashMap<LayerId, DecodeHandle>>,
}

/// Shared image loader. Clones refer to the same cache.
#[derive(Clone, Default)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("cached", &self.cached_len())
            .field("requested", &self.pending().len())
            .finish()
    }
}

impl ImageLoader {
    /// Create a loader with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode raw image bytes for a layer on the blocking pool.
    ///
    /// See [`ImageLoader::request_with`].
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime.
    pub fn request(&self, id: LayerId, bytes: Vec<u8>) -> RenderResult<DecodeHandle> {
        self.request_with(id, async move {
            tokio::task::spawn_blocking(move || decode_image(&bytes))
                .await
                .map_err(|e| RenderError::TaskJoin(e.to_string()))
                .and_then(|decoded| decoded)
        })
    }

    /// Start decoding a layer's raster with a custom decoder.
    ///
    /// Idempotent: if a decode was already requested for `id`, its existing
    /// handle is returned and `decode` is dropped unpolled.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime.
    pub fn request_with<F>(&self, id: LayerId, decode: F) -> RenderResult<DecodeHandle>
    where
        F: Future<Output = RenderResult<Raster>> + Send + 'static,
    {
        let mut pending = self.pending();
        if let Some(handle) = pending.get(&id) {
            return Ok(handle.clone());
        }

        let runtime = Self::runtime()?;

        let inner = Arc::clone(&self.inner);
        let task = runtime.spawn(async move {
            match decode.await {
                Ok(raster) => {
                    let (width, height) = (raster.width(), raster.height());
                    inner
                        .cache
                        .write()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .insert(id, Arc::new(raster));
                    tracing::debug!("Decoded layer {id}: {width}x{height}");
                    DecodeOutcome::Ready { width, height }
                }
                Err(e) => {
                    tracing::warn!("Decode failed for layer {id}: {e}");
                    DecodeOutcome::Failed(e.to_string())
                }
            }
        });

        let handle = async move {
            task.await.unwrap_or_else(|e| {
                tracing::warn!("Decode task for layer {id} did not finish: {e}");
                DecodeOutcome::Failed(RenderError::TaskJoin(e.to_string()).to_string())
            })
        }
        .boxed()
        .shared();

        pending.insert(id, handle.clone());
        Ok(handle)
    }

    /// Check that decodes can be started from the current thread.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime.
    pub fn ensure_runtime() -> RenderResult<()> {
        Self::runtime().map(|_| ())
    }

    fn runtime() -> RenderResult<tokio::runtime::Handle> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| RenderError::Resource(format!("No async runtime for decoding: {e}")))
    }

    /// Wait until every requested decode among `ids` has finished.
    ///
    /// Ids that were never requested are ignored. Failed decodes are reported
    /// but do not stop the others.
    pub async fn wait_for(&self, ids: &[LayerId]) -> Vec<(LayerId, DecodeOutcome)> {
        let handles: Vec<(LayerId, DecodeHandle)> = {
            let pending = self.pending();
            ids.iter()
                .filter_map(|id| pending.get(id).map(|h| (*id, h.clone())))
                .collect()
        };

        futures::future::join_all(
            handles
                .into_iter()
                .map(|(id, handle)| handle.map(move |outcome| (id, outcome))),
        )
        .await
    }

    /// Where the raster for `id` currently stands.
    #[must_use]
    pub fn state(&self, id: LayerId) -> LoadState {
        if self.cache().contains(id) {
            return LoadState::Ready;
        }
        match self.pending().get(&id).map(Shared::peek) {
            None => LoadState::Unrequested,
            Some(Some(DecodeOutcome::Failed(_))) => LoadState::Failed,
            Some(_) => LoadState::Pending,
        }
    }

    /// Check if the raster for `id` is cached.
    #[must_use]
    pub fn is_loaded(&self, id: LayerId) -> bool {
        self.cache().contains(id)
    }

    /// Forget rasters and handles of layers that no longer exist.
    ///
    /// In-flight decodes are not cancelled; if one finishes later its raster
    /// lands in the cache and is dropped on the next prune.
    pub fn prune<F>(&self, mut is_live: F) -> usize
    where
        F: FnMut(LayerId) -> bool,
    {
        self.pending().retain(|id, _| is_live(*id));
        let dropped = self
            .inner
            .cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(is_live);
        if dropped > 0 {
            tracing::debug!("Pruned {dropped} stale rasters");
        }
        dropped
    }

    /// Number of cached rasters.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache().len()
    }

    /// Snapshot of the cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache().stats().clone()
    }

    fn cache(&self) -> std::sync::RwLockReadGuard<'_, RasterCache> {
        self.inner
            .cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<LayerId, DecodeHandle>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RasterProvider for ImageLoader {
    fn raster(&self, id: LayerId) -> Option<Arc<Raster>> {
        self.cache().peek(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 255, 0, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_request_decodes_into_cache() {
        let loader = ImageLoader::new();
        let id = LayerId::new();
        let handle = loader.request(id, encoded_png(3, 2)).expect("runtime");

        assert_eq!(
            handle.await,
            DecodeOutcome::Ready {
                width: 3,
                height: 2
            }
        );
        assert!(loader.is_loaded(id));
        assert_eq!(loader.state(id), LoadState::Ready);
        assert_eq!(loader.raster(id).map(|r| r.width()), Some(3));
    }

    #[tokio::test]
    async fn test_repeated_request_is_noop() {
        let loader = ImageLoader::new();
        let id = LayerId::new();
        loader
            .request_with(id, async { Ok(Raster::solid(4, 4, [1, 2, 3, 255])) })
            .expect("runtime")
            .await;
        let second = loader
            .request_with(id, async { Ok(Raster::solid(9, 9, [9, 9, 9, 255])) })
            .expect("runtime")
            .await;

        assert_eq!(
            second,
            DecodeOutcome::Ready {
                width: 4,
                height: 4
            }
        );
        assert_eq!(loader.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_failed_decode_is_silent() {
        let loader = ImageLoader::new();
        let id = LayerId::new();
        let outcome = loader
            .request(id, b"not an image".to_vec())
            .expect("runtime")
            .await;

        assert!(matches!(outcome, DecodeOutcome::Failed(_)));
        assert!(!loader.is_loaded(id));
        assert_eq!(loader.state(id), LoadState::Failed);
    }

    #[tokio::test]
    async fn test_wait_for_ignores_unrequested_ids() {
        let loader = ImageLoader::new();
        let requested = LayerId::new();
        let _decode = loader
            .request_with(requested, async { Ok(Raster::solid(1, 1, [0, 0, 0, 255])) })
            .expect("runtime");

        let outcomes = loader.wait_for(&[requested, LayerId::new()]).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, requested);
        assert!(loader.is_loaded(requested));
    }

    #[tokio::test]
    async fn test_prune_drops_stale_entries() {
        let loader = ImageLoader::new();
        let live = LayerId::new();
        let gone = LayerId::new();
        let _decode = loader
            .request_with(live, async { Ok(Raster::solid(1, 1, [0, 0, 0, 255])) })
            .expect("runtime");
        let _decode = loader
            .request_with(gone, async { Ok(Raster::solid(1, 1, [0, 0, 0, 255])) })
            .expect("runtime");
        loader.wait_for(&[live, gone]).await;

        assert_eq!(loader.prune(|id| id == live), 1);
        assert!(loader.is_loaded(live));
        assert_eq!(loader.state(gone), LoadState::Unrequested);

        let stats = loader.stats();
        assert_eq!(stats.bytes_loaded, 8);
        assert_eq!(stats.pruned, 1);
    }

    #[test]
    fn test_request_outside_runtime_is_an_error() {
        let loader = ImageLoader::new();
        let result = loader.request_with(LayerId::new(), async {
            Ok(Raster::solid(1, 1, [0, 0, 0, 255]))
        });
        assert!(matches!(result, Err(RenderError::Resource(_))));
        assert!(ImageLoader::ensure_runtime().is_err());
    }
}

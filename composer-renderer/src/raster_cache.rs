//! Cache of decoded rasters, keyed by layer.
//!
//! Entries are only ever added by finished decodes. Nothing is evicted
//! implicitly: a raster must stay available for as long as its layer may be
//! painted, so stale entries are dropped explicitly with [`RasterCache::retain`].

use std::collections::HashMap;
use std::sync::Arc;

use composer_core::LayerId;

use crate::image::Raster;

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries dropped by pruning.
    pub pruned: u64,
    /// Total bytes inserted.
    pub bytes_loaded: u64,
}

/// Decoded rasters by layer id.
#[derive(Debug, Default)]
pub struct RasterCache {
    entries: HashMap<LayerId, Arc<Raster>>,
    current_size: usize,
    stats: CacheStats,
}

fn size_of(raster: &Raster) -> usize {
    raster.pixels.as_raw().len()
}

impl RasterCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a raster, or `None` if the layer's raster is not decoded yet.
    #[must_use]
    pub fn peek(&self, id: LayerId) -> Option<&Arc<Raster>> {
        self.entries.get(&id)
    }

    /// Insert a decoded raster.
    ///
    /// A layer's raster is decoded at most once, so an existing entry is kept
    /// and the new one discarded. Returns `true` if the raster was stored.
    pub fn insert(&mut self, id: LayerId, raster: Arc<Raster>) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        let size_bytes = size_of(&raster);
        self.current_size += size_bytes;
        self.stats.bytes_loaded += size_bytes as u64;
        self.entries.insert(id, raster);
        true
    }

    /// Remove a raster from the cache.
    pub fn remove(&mut self, id: LayerId) -> Option<Arc<Raster>> {
        let raster = self.entries.remove(&id)?;
        self.current_size -= size_of(&raster);
        Some(raster)
    }

    /// Drop every entry whose layer no longer passes `keep`.
    ///
    /// Returns the number of entries dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(LayerId) -> bool,
    {
        let stale: Vec<LayerId> = self
            .entries
            .keys()
            .copied()
            .filter(|id| !keep(*id))
            .collect();
        for id in &stale {
            self.remove(*id);
        }
        self.stats.pruned += stale.len() as u64;
        stale.len()
    }

    /// Check if a raster is cached.
    #[must_use]
    pub fn contains(&self, id: LayerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Get the current number of cached rasters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the current cache size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

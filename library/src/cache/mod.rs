//! Per-size image cache of a single node.
//!
//! Validity is tracked separately from the stored images so a render can
//! claim a size before computing it and detect invalidations that happened
//! while it was running.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Image, ImageSize};

#[derive(Default, Debug)]
pub struct ImageCache {
    images: HashMap<ImageSize, Arc<Image>>,
    valid: HashMap<ImageSize, bool>,
    epoch: u64,
}

/// Proof that a size was claimed at a given invalidation epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheClaim {
    size: ImageSize,
    epoch: u64,
}

impl CacheClaim {
    pub fn size(&self) -> ImageSize {
        self.size
    }
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached image for `size`, if it is still valid.
    pub fn get(&self, size: ImageSize) -> Option<Arc<Image>> {
        if self.is_valid(size) {
            self.images.get(&size).cloned()
        } else {
            None
        }
    }

    pub fn contains(&self, size: ImageSize) -> bool {
        self.get(size).is_some()
    }

    pub fn is_valid(&self, size: ImageSize) -> bool {
        self.valid.get(&size).copied().unwrap_or(false)
    }

    /// Marks `size` valid before computation starts.
    pub fn claim(&mut self, size: ImageSize) -> CacheClaim {
        self.valid.insert(size, true);
        CacheClaim {
            size,
            epoch: self.epoch,
        }
    }

    /// Stores `image` only if nothing was invalidated since the claim was taken.
    /// A claim revoked and re-taken by another render in between still fails.
    /// Returns whether the image was stored.
    pub fn commit(&mut self, claim: CacheClaim, image: Arc<Image>) -> bool {
        if claim.epoch != self.epoch || !self.is_valid(claim.size) {
            return false;
        }
        self.images.insert(claim.size, image);
        true
    }

    /// Drops every cached size and revokes outstanding claims.
    pub fn invalidate_all(&mut self) {
        self.images.clear();
        self.valid.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Drops a single size. Claims for other sizes stay intact.
    pub fn evict(&mut self, size: ImageSize) {
        self.images.remove(&size);
        self.valid.remove(&size);
    }

    pub fn cached_sizes(&self) -> Vec<ImageSize> {
        let mut sizes: Vec<ImageSize> = self
            .images
            .keys()
            .copied()
            .filter(|size| self.is_valid(*size))
            .collect();
        sizes.sort();
        sizes
    }
}

//! Spatial indexing using R*-trees.
//!
//! [`SpatialIndex2D`] is the broad phase of collision detection: it finds
//! entities whose bounding boxes overlap before exact polygon intersection
//! is attempted. [`SiteIndex`] answers nearest-generator queries when
//! assigning pathwidths, with a bounded memo in front of the tree.

use std::collections::HashMap;

use factory_layout_core::GridKey;
use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::Shape;

/// An entry of the broad-phase index.
#[derive(Debug, Clone)]
pub struct SpatialEntry2D {
    /// Position of the entity in its registry list.
    pub index: usize,
    /// Axis-aligned bounding box (min_x, min_y, max_x, max_y).
    pub aabb: [f64; 4],
}

impl SpatialEntry2D {
    /// Creates an entry.
    pub fn new(index: usize, aabb: [f64; 4]) -> Self {
        Self { index, aabb }
    }

    /// Creates an entry from a shape; `None` for shapes without extent.
    pub fn from_shape(index: usize, shape: &Shape) -> Option<Self> {
        shape.aabb().map(|aabb| Self::new(index, aabb))
    }
}

impl RTreeObject for SpatialEntry2D {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.aabb[0], self.aabb[1]], [self.aabb[2], self.aabb[3]])
    }
}

/// Broad-phase index over entity bounding boxes.
#[derive(Debug)]
pub struct SpatialIndex2D {
    tree: RTree<SpatialEntry2D>,
}

impl SpatialIndex2D {
    /// Bulk-loads an index.
    pub fn with_entries(entries: Vec<SpatialEntry2D>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Entries whose boxes intersect the given box (touching included).
    pub fn query_aabb(&self, min: [f64; 2], max: [f64; 2]) -> Vec<&SpatialEntry2D> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Sorted registry indices of entries overlapping `aabb`.
    pub fn candidates(&self, aabb: [f64; 4]) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .query_aabb([aabb[0], aabb[1]], [aabb[2], aabb[3]])
            .into_iter()
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// All unordered pairs `(i, j)`, `i < j`, with overlapping boxes, sorted.
    pub fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for entry in self.tree.iter() {
            for other in self.query_aabb(
                [entry.aabb[0], entry.aabb[1]],
                [entry.aabb[2], entry.aabb[3]],
            ) {
                if entry.index < other.index {
                    pairs.push((entry.index, other.index));
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}

// ============================================================================
// Nearest Site Index
// ============================================================================

/// Bounded memo of nearest-site distances keyed by quantized position.
///
/// When full, half the entries are evicted.
#[derive(Debug)]
pub struct ClearanceCache {
    entries: HashMap<GridKey, f64>,
    max_size: usize,
    hits: usize,
}

impl ClearanceCache {
    /// Creates a cache holding at most `max_size` entries.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size: max_size.max(1),
            hits: 0,
        }
    }

    /// Cached value, or computes and stores it.
    pub fn get_or_compute(&mut self, key: GridKey, compute: impl FnOnce() -> f64) -> f64 {
        if let Some(&value) = self.entries.get(&key) {
            self.hits += 1;
            return value;
        }

        let value = compute();
        if self.entries.len() >= self.max_size {
            let evict: Vec<GridKey> = self
                .entries
                .keys()
                .take(self.max_size.div_ceil(2))
                .copied()
                .collect();
            for k in evict {
                self.entries.remove(&k);
            }
        }
        self.entries.insert(key, value);
        value
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Nearest-neighbour index over generator sites.
#[derive(Debug)]
pub struct SiteIndex {
    tree: RTree<[f64; 2]>,
    cache: ClearanceCache,
    resolution: f64,
}

impl SiteIndex {
    /// Builds the index; `resolution` quantizes memo keys.
    pub fn new(sites: Vec<[f64; 2]>, resolution: f64, cache_capacity: usize) -> Self {
        Self {
            tree: RTree::bulk_load(sites),
            cache: ClearanceCache::with_capacity(cache_capacity),
            resolution,
        }
    }

    /// Distance from `point` to the nearest site; infinite with no sites.
    pub fn clearance(&mut self, point: (f64, f64)) -> f64 {
        let tree = &self.tree;
        self.cache
            .get_or_compute(GridKey::new(point, self.resolution), || {
                tree.nearest_neighbor(&[point.0, point.1])
                    .map_or(f64::INFINITY, |s| (s[0] - point.0).hypot(s[1] - point.1))
            })
    }

    /// Memo statistics.
    pub fn cache(&self) -> &ClearanceCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_query_aabb() {
        let index = SpatialIndex2D::with_entries(vec![
            SpatialEntry2D::new(0, [0.0, 0.0, 10.0, 10.0]),
            SpatialEntry2D::new(1, [20.0, 20.0, 30.0, 30.0]),
            SpatialEntry2D::new(2, [5.0, 5.0, 25.0, 25.0]),
        ]);
        assert_eq!(index.candidates([0.0, 0.0, 1.0, 1.0]), vec![0]);
        assert_eq!(index.candidates([8.0, 8.0, 22.0, 22.0]), vec![0, 1, 2]);
        assert!(index.candidates([100.0, 100.0, 101.0, 101.0]).is_empty());
    }

    #[test]
    fn test_overlapping_pairs_sorted() {
        let index = SpatialIndex2D::with_entries(vec![
            SpatialEntry2D::new(2, [5.0, 5.0, 25.0, 25.0]),
            SpatialEntry2D::new(0, [0.0, 0.0, 10.0, 10.0]),
            SpatialEntry2D::new(1, [20.0, 20.0, 30.0, 30.0]),
            SpatialEntry2D::new(3, [50.0, 50.0, 60.0, 60.0]),
        ]);
        assert_eq!(index.overlapping_pairs(), vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn test_site_clearance_and_cache() {
        let mut sites = SiteIndex::new(vec![[0.0, 0.0], [10.0, 0.0]], 1e-6, 16);
        assert_relative_eq!(sites.clearance((3.0, 4.0)), 5.0);
        assert_relative_eq!(sites.clearance((3.0, 4.0)), 5.0);
        assert_eq!(sites.cache().hits(), 1);
        assert_relative_eq!(sites.clearance((9.0, 0.0)), 1.0);

        let mut empty = SiteIndex::new(Vec::new(), 1e-6, 4);
        assert!(empty.clearance((0.0, 0.0)).is_infinite());
    }

    #[test]
    fn test_cache_eviction_bounded() {
        let mut cache = ClearanceCache::with_capacity(4);
        for i in 0..10 {
            cache.get_or_compute(GridKey { x: i, y: 0 }, || i as f64);
        }
        assert!(cache.len() <= 4);
    }
}

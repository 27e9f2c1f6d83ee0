//! Spatial indexes mapping bounding volumes to payload objects.
//!
//! Two strategies share the [`SpatialIndex`] contract:
//! - [`NullIndex`]: unordered list, no culling at all
//! - [`KdTreeIndex`]: adaptive binary tree that splits crowded leaves
//!
//! A feature store picks one strategy at construction time through
//! [`IndexStrategy`], which dispatches statically.

pub mod kdtree;
pub mod null;

pub use kdtree::KdTreeIndex;
pub use null::NullIndex;

use crate::config::SpatialIndexKind;
use mapcluster_types::bounds::MapBounds;
use mapcluster_types::frustum::Frustum;

/// Container of `(bounds, object)` records queryable by volume.
///
/// Objects are compared with `PartialEq` on removal; every equal record in
/// the scanned region is removed. Queries make no deduplication promise
/// beyond "inserted once, returned once" and return objects in no
/// particular order.
pub trait SpatialIndex<T: Clone + PartialEq> {
    /// Number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Capacity hint before a bulk insert.
    fn reserve(&mut self, _additional: usize) {}

    /// Insert unconditionally. Duplicates are legal.
    fn insert(&mut self, bounds: MapBounds, object: T);

    /// Remove every record equal to `object`, using `bounds` to prune the
    /// search. Returns whether anything was removed.
    fn remove_in(&mut self, bounds: &MapBounds, object: &T) -> bool;

    /// Remove every record equal to `object` anywhere in the index.
    fn remove(&mut self, object: &T) -> bool;

    /// Objects whose stored bounds intersect the frustum.
    fn query_frustum(&self, frustum: &Frustum) -> Vec<T>;

    /// Objects whose stored bounds intersect `bounds`.
    fn query_bounds(&self, bounds: &MapBounds) -> Vec<T>;

    fn get_all(&self) -> Vec<T>;
}

/// Index strategy fixed for the lifetime of a store.
#[derive(Debug)]
pub enum IndexStrategy<T> {
    Null(NullIndex<T>),
    KdTree(KdTreeIndex<T>),
}

impl<T: Clone + PartialEq> IndexStrategy<T> {
    pub fn new(kind: SpatialIndexKind) -> Self {
        match kind {
            SpatialIndexKind::Null => IndexStrategy::Null(NullIndex::new()),
            SpatialIndexKind::KdTree => IndexStrategy::KdTree(KdTreeIndex::new()),
        }
    }

    pub fn kind(&self) -> SpatialIndexKind {
        match self {
            IndexStrategy::Null(_) => SpatialIndexKind::Null,
            IndexStrategy::KdTree(_) => SpatialIndexKind::KdTree,
        }
    }

    /// Whether stored bounds influence queries. The null index ignores them,
    /// so a bounds change does not require re-inserting.
    pub fn is_culling(&self) -> bool {
        matches!(self, IndexStrategy::KdTree(_))
    }
}

impl<T: Clone + PartialEq> SpatialIndex<T> for IndexStrategy<T> {
    fn len(&self) -> usize {
        match self {
            IndexStrategy::Null(index) => index.len(),
            IndexStrategy::KdTree(index) => index.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            IndexStrategy::Null(index) => index.clear(),
            IndexStrategy::KdTree(index) => index.clear(),
        }
    }

    fn reserve(&mut self, additional: usize) {
        match self {
            IndexStrategy::Null(index) => index.reserve(additional),
            IndexStrategy::KdTree(index) => index.reserve(additional),
        }
    }

    fn insert(&mut self, bounds: MapBounds, object: T) {
        match self {
            IndexStrategy::Null(index) => index.insert(bounds, object),
            IndexStrategy::KdTree(index) => index.insert(bounds, object),
        }
    }

    fn remove_in(&mut self, bounds: &MapBounds, object: &T) -> bool {
        match self {
            IndexStrategy::Null(index) => index.remove_in(bounds, object),
            IndexStrategy::KdTree(index) => index.remove_in(bounds, object),
        }
    }

    fn remove(&mut self, object: &T) -> bool {
        match self {
            IndexStrategy::Null(index) => index.remove(object),
            IndexStrategy::KdTree(index) => index.remove(object),
        }
    }

    fn query_frustum(&self, frustum: &Frustum) -> Vec<T> {
        match self {
            IndexStrategy::Null(index) => index.query_frustum(frustum),
            IndexStrategy::KdTree(index) => index.query_frustum(frustum),
        }
    }

    fn query_bounds(&self, bounds: &MapBounds) -> Vec<T> {
        match self {
            IndexStrategy::Null(index) => index.query_bounds(bounds),
            IndexStrategy::KdTree(index) => index.query_bounds(bounds),
        }
    }

    fn get_all(&self) -> Vec<T> {
        match self {
            IndexStrategy::Null(index) => index.get_all(),
            IndexStrategy::KdTree(index) => index.get_all(),
        }
    }
}

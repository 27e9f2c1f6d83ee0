//! Flat list index with no culling. Small and simple; good for tiny sets.

use super::SpatialIndex;
use mapcluster_types::bounds::MapBounds;
use mapcluster_types::frustum::Frustum;

/// Stores every object in insertion order and returns all of them from every
/// query, regardless of the query volume.
pub struct NullIndex<T> {
    objects: Vec<T>,
}

impl<T> NullIndex<T> {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }
}

impl<T> Default for NullIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for NullIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullIndex")
            .field("len", &self.objects.len())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq> SpatialIndex<T> for NullIndex<T> {
    fn len(&self) -> usize {
        self.objects.len()
    }

    fn clear(&mut self) {
        self.objects.clear();
    }

    fn reserve(&mut self, additional: usize) {
        self.objects.reserve(additional);
    }

    fn insert(&mut self, _bounds: MapBounds, object: T) {
        self.objects.push(object);
    }

    fn remove_in(&mut self, _bounds: &MapBounds, object: &T) -> bool {
        self.remove(object)
    }

    fn remove(&mut self, object: &T) -> bool {
        let before = self.objects.len();
        self.objects.retain(|candidate| candidate != object);
        before != self.objects.len()
    }

    fn query_frustum(&self, _frustum: &Frustum) -> Vec<T> {
        self.objects.clone()
    }

    fn query_bounds(&self, _bounds: &MapBounds) -> Vec<T> {
        self.objects.clone()
    }

    fn get_all(&self) -> Vec<T> {
        self.objects.clone()
    }
}

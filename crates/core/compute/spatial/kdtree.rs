//! Adaptive KD-tree index.
//!
//! The tree starts as a single leaf. A leaf holding more than
//! [`MIN_SPLIT_COUNT`] records splits on the longest axis of its bounds, at
//! the midpoint, as long as both halves receive at least one record. The split
//! plane of a node never moves afterwards, and insertions below an internal
//! node are routed by comparing the node's own center against that plane.
//! Both choices keep inserts cheap at the cost of balance.

use super::SpatialIndex;
use mapcluster_types::bounds::MapBounds;
use mapcluster_types::frustum::Frustum;
use smallvec::SmallVec;

/// Leaves with more records than this try to split.
pub const MIN_SPLIT_COUNT: usize = 2;

/// Nodes at this depth keep every record they receive.
pub const MAX_DEPTH: usize = 20;

struct Record<T> {
    bounds: MapBounds,
    object: T,
}

struct Node<T> {
    bounds: MapBounds,
    records: SmallVec<[Record<T>; 4]>,
    children: Option<Box<[Node<T>; 2]>>,
    axis: usize,
    split: f64,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            bounds: MapBounds::empty(),
            records: SmallVec::new(),
            children: None,
            axis: 0,
            split: 0.0,
        }
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty() && self.children.is_none()
    }

    fn insert(&mut self, record: Record<T>, depth: usize) {
        self.bounds.expand_to_contain_bounds(&record.bounds);

        if depth >= MAX_DEPTH {
            self.records.push(record);
            return;
        }

        // Routes on the node's center rather than the record's.
        let side = usize::from(self.bounds.center()[self.axis] >= self.split);
        match self.children.as_mut() {
            Some(children) => children[side].insert(record, depth + 1),
            None => {
                self.records.push(record);
                if self.records.len() > MIN_SPLIT_COUNT {
                    self.try_split();
                }
            }
        }
    }

    fn try_split(&mut self) {
        let axis = self.bounds.longest_axis();
        let split = self.bounds.center()[axis];

        let high_count = self
            .records
            .iter()
            .filter(|record| record.bounds.center()[axis] >= split)
            .count();
        if high_count == 0 || high_count == self.records.len() {
            return;
        }

        let mut low = Node::new();
        let mut high = Node::new();
        for record in self.records.drain(..) {
            let child = if record.bounds.center()[axis] >= split {
                &mut high
            } else {
                &mut low
            };
            child.bounds.expand_to_contain_bounds(&record.bounds);
            child.records.push(record);
        }

        self.axis = axis;
        self.split = split;
        self.children = Some(Box::new([low, high]));
    }

    /// Removes every record equal to `object` below this node, returning how
    /// many were removed. Empty children are pruned; a lone surviving child
    /// replaces this node.
    fn remove(&mut self, hint: Option<&MapBounds>, object: &T) -> usize
    where
        T: PartialEq,
    {
        if let Some(hint) = hint {
            if !hint.is_empty() && !self.bounds.intersects(hint) {
                return 0;
            }
        }

        let before = self.records.len();
        self.records.retain(|record| record.object != *object);
        let mut removed = before - self.records.len();

        let Some(children) = self.children.as_mut() else {
            return removed;
        };
        removed += children[0].remove(hint, object);
        removed += children[1].remove(hint, object);

        match (children[0].is_empty(), children[1].is_empty()) {
            (false, false) => {}
            (true, true) => self.children = None,
            _ => {
                if let Some(children) = self.children.take() {
                    let [low, high] = *children;
                    *self = if low.is_empty() { high } else { low };
                }
            }
        }
        removed
    }

    fn query<F>(&self, intersects: &F, out: &mut Vec<T>)
    where
        T: Clone,
        F: Fn(&MapBounds) -> bool,
    {
        if !intersects(&self.bounds) {
            return;
        }
        out.extend(
            self.records
                .iter()
                .filter(|record| intersects(&record.bounds))
                .map(|record| record.object.clone()),
        );
        if let Some(children) = &self.children {
            children[0].query(intersects, out);
            children[1].query(intersects, out);
        }
    }

    fn collect(&self, out: &mut Vec<T>)
    where
        T: Clone,
    {
        out.extend(self.records.iter().map(|record| record.object.clone()));
        if let Some(children) = &self.children {
            children[0].collect(out);
            children[1].collect(out);
        }
    }
}

/// Adaptive binary spatial tree over `(bounds, object)` records.
///
/// # Examples
///
/// ```
/// use mapcluster::compute::spatial::{KdTreeIndex, SpatialIndex};
/// use mapcluster_types::bounds::{MapBounds, MapPos};
///
/// let mut index = KdTreeIndex::new();
/// for i in 0..10 {
///     index.insert(MapBounds::from_point(MapPos::new(i as f64, 0.0)), i);
/// }
///
/// let window = MapBounds::new(MapPos::new(2.5, -1.0), MapPos::new(5.5, 1.0));
/// let mut found = index.query_bounds(&window);
/// found.sort();
/// assert_eq!(found, vec![3, 4, 5]);
/// ```
pub struct KdTreeIndex<T> {
    root: Option<Box<Node<T>>>,
    len: usize,
}

impl<T> KdTreeIndex<T> {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Bounds of everything ever inserted under the current root.
    pub fn bounds(&self) -> MapBounds {
        self.root
            .as_ref()
            .map_or_else(MapBounds::empty, |root| root.bounds)
    }

    fn remove_with_hint(&mut self, hint: Option<&MapBounds>, object: &T) -> bool
    where
        T: PartialEq,
    {
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        let removed = root.remove(hint, object);
        if root.is_empty() {
            self.root = None;
        }
        self.len -= removed;
        removed > 0
    }
}

impl<T> Default for KdTreeIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for KdTreeIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdTreeIndex")
            .field("len", &self.len)
            .field("bounds", &self.bounds())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq> SpatialIndex<T> for KdTreeIndex<T> {
    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    fn insert(&mut self, bounds: MapBounds, object: T) {
        self.root
            .get_or_insert_with(|| Box::new(Node::new()))
            .insert(Record { bounds, object }, 0);
        self.len += 1;
    }

    fn remove_in(&mut self, bounds: &MapBounds, object: &T) -> bool {
        self.remove_with_hint(Some(bounds), object)
    }

    fn remove(&mut self, object: &T) -> bool {
        self.remove_with_hint(None, object)
    }

    fn query_frustum(&self, frustum: &Frustum) -> Vec<T> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.query(&|bounds: &MapBounds| frustum.cuboid_intersects(bounds), &mut out);
        }
        out
    }

    fn query_bounds(&self, bounds: &MapBounds) -> Vec<T> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.query(&|candidate: &MapBounds| candidate.intersects(bounds), &mut out);
        }
        out
    }

    fn get_all(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = &self.root {
            root.collect(&mut out);
        }
        out
    }
}

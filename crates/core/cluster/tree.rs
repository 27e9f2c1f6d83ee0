//! Binary cluster tree over point features.
//!
//! Nodes live in an arena and refer to each other by index. Leaves occupy the
//! first `leaf_count` slots, in feature order; merged nodes follow in the order
//! they were created, so a parent always has a higher index than its children.

use super::element::ClusterElementBuilder;
use crate::compute::projection::Projection;
use crate::config::ClusterBuilderMode;
use crate::feature::FeatureRef;
use mapcluster_types::bounds::{MapBounds, MapPos};

/// One node of the cluster tree. Positions are internal coordinates.
#[derive(Debug, Clone)]
pub struct ClusterNode {
    pub(crate) pos: MapPos,
    pub(crate) transition_pos: MapPos,
    pub(crate) max_distance: f64,
    pub(crate) expand_px: f32,
    pub(crate) bounds: MapBounds,
    pub(crate) count: usize,
    pub(crate) feature: Option<FeatureRef>,
    pub(crate) element: FeatureRef,
    pub(crate) children: Option<[usize; 2]>,
    pub(crate) parent: Option<usize>,
}

impl ClusterNode {
    /// Member-weighted centroid.
    pub fn position(&self) -> MapPos {
        self.pos
    }

    /// Position currently shown on screen.
    pub fn transition_position(&self) -> MapPos {
        self.transition_pos
    }

    /// Distance between the two children when they were merged; zero for
    /// leaves.
    pub fn merge_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn expand_px(&self) -> f32 {
        self.expand_px
    }

    pub fn bounds(&self) -> &MapBounds {
        &self.bounds
    }

    pub fn member_count(&self) -> usize {
        self.count
    }

    /// The source feature of a leaf.
    pub fn feature(&self) -> Option<&FeatureRef> {
        self.feature.as_ref()
    }

    /// Marker built for this cluster.
    pub fn element(&self) -> &FeatureRef {
        &self.element
    }

    pub fn children(&self) -> Option<[usize; 2]> {
        self.children
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// A clusterable feature and its positions.
#[derive(Debug, Clone)]
pub(crate) struct Leaf {
    pub(crate) feature: FeatureRef,
    pub(crate) map_pos: MapPos,
    pub(crate) pos: MapPos,
}

/// Visible point features, in input order. Everything else is skipped.
pub(crate) fn collect_leaves(features: &[FeatureRef], projection: &dyn Projection) -> Vec<Leaf> {
    features
        .iter()
        .filter(|feature| feature.is_visible())
        .filter_map(|feature| {
            let map_pos = feature.point_pos()?;
            Some(Leaf {
                feature: feature.clone(),
                map_pos,
                pos: projection.to_internal(&map_pos),
            })
        })
        .collect()
}

/// Arena-backed cluster tree.
#[derive(Debug, Clone, Default)]
pub struct ClusterTree {
    nodes: Vec<ClusterNode>,
    root: Option<usize>,
    leaf_count: usize,
}

impl ClusterTree {
    pub(crate) fn build(
        leaves: Vec<Leaf>,
        projection: &dyn Projection,
        builder: &dyn ClusterElementBuilder,
        hierarchical_threshold: usize,
    ) -> Self {
        let mut merger = Merger {
            nodes: Vec::with_capacity(leaves.len() * 2),
            projection,
            builder,
            mode: builder.mode(),
            threshold: hierarchical_threshold.max(1),
        };

        let leaf_count = leaves.len();
        let ids: Vec<usize> = leaves.into_iter().map(|leaf| merger.push_leaf(leaf)).collect();
        let root = if ids.is_empty() {
            None
        } else {
            merger.merge_clusters(ids, 1).first().copied()
        };

        Self {
            nodes: merger.nodes,
            root,
            leaf_count,
        }
    }

    pub fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn node(&self, idx: usize) -> Option<&ClusterNode> {
        self.nodes.get(idx)
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [ClusterNode] {
        &mut self.nodes
    }

    /// Total node count, leaves included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Features below `idx`.
    pub fn members(&self, idx: usize) -> Vec<FeatureRef> {
        collect_members(&self.nodes, idx)
    }

    /// Node whose marker is `element`.
    pub fn find_element(&self, element: &FeatureRef) -> Option<usize> {
        self.nodes.iter().position(|node| node.element == *element)
    }

    /// Whether the leaves were built from exactly these features at exactly
    /// these positions.
    pub(crate) fn has_leaves(&self, leaves: &[Leaf]) -> bool {
        self.leaf_count == leaves.len()
            && self.nodes.iter().zip(leaves).all(|(node, leaf)| {
                node.feature.as_ref() == Some(&leaf.feature) && node.pos == leaf.pos
            })
    }

    /// Rebuilds every marker, keeping structure and animation state.
    pub(crate) fn rebuild_elements(
        &mut self,
        projection: &dyn Projection,
        builder: &dyn ClusterElementBuilder,
    ) {
        let mode = builder.mode();
        for idx in 0..self.nodes.len() {
            let map_pos = match &self.nodes[idx].feature {
                Some(feature) => feature
                    .point_pos()
                    .unwrap_or_else(|| projection.from_internal(&self.nodes[idx].pos)),
                None => projection.from_internal(&self.nodes[idx].pos),
            };
            let element = build_element(&self.nodes, idx, map_pos, mode, builder);
            self.nodes[idx].element = element;
        }
    }
}

fn collect_members(nodes: &[ClusterNode], idx: usize) -> Vec<FeatureRef> {
    let mut members = Vec::new();
    let mut stack = vec![idx];
    while let Some(current) = stack.pop() {
        let Some(node) = nodes.get(current) else {
            continue;
        };
        if let Some(feature) = &node.feature {
            members.push(feature.clone());
        }
        if let Some([a, b]) = node.children {
            stack.push(b);
            stack.push(a);
        }
    }
    members
}

fn build_element(
    nodes: &[ClusterNode],
    idx: usize,
    map_pos: MapPos,
    mode: ClusterBuilderMode,
    builder: &dyn ClusterElementBuilder,
) -> FeatureRef {
    match mode {
        ClusterBuilderMode::ElementCount => builder.build_from_count(map_pos, nodes[idx].count),
        ClusterBuilderMode::Elements => {
            builder.build_from_elements(map_pos, &collect_members(nodes, idx))
        }
    }
}

/// Slot in the sorted working list of the greedy phase.
struct Entry {
    cluster: usize,
    closest_dist: f64,
    closest: Option<usize>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list over a slot vector. Unlinked slots are never reused,
/// so a stale `closest` link can be detected by slot number.
#[derive(Default)]
struct WorkList {
    entries: Vec<Entry>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl WorkList {
    fn from_sorted(clusters: &[usize]) -> Self {
        let mut list = Self::default();
        for &cluster in clusters {
            list.insert_before(None, cluster);
        }
        list
    }

    /// Inserts before `at`, or at the end for `None`.
    fn insert_before(&mut self, at: Option<usize>, cluster: usize) -> usize {
        let slot = self.entries.len();
        let prev = match at {
            Some(next) => self.entries[next].prev,
            None => self.tail,
        };
        self.entries.push(Entry {
            cluster,
            closest_dist: f64::INFINITY,
            closest: None,
            prev,
            next: at,
        });
        match prev {
            Some(prev) => self.entries[prev].next = Some(slot),
            None => self.head = Some(slot),
        }
        match at {
            Some(next) => self.entries[next].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.len += 1;
        slot
    }

    /// Unlinks `slot`, returning the slot that followed it.
    fn unlink(&mut self, slot: usize) -> Option<usize> {
        let (prev, next) = (self.entries[slot].prev, self.entries[slot].next);
        match prev {
            Some(prev) => self.entries[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.entries[next].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
        next
    }

    fn clusters(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Some(slot) = cur {
            out.push(self.entries[slot].cluster);
            cur = self.entries[slot].next;
        }
        out
    }
}

struct Merger<'a> {
    nodes: Vec<ClusterNode>,
    projection: &'a dyn Projection,
    builder: &'a dyn ClusterElementBuilder,
    mode: ClusterBuilderMode,
    threshold: usize,
}

impl Merger<'_> {
    fn push_leaf(&mut self, leaf: Leaf) -> usize {
        let element = match self.mode {
            ClusterBuilderMode::ElementCount => self.builder.build_from_count(leaf.map_pos, 1),
            ClusterBuilderMode::Elements => self
                .builder
                .build_from_elements(leaf.map_pos, std::slice::from_ref(&leaf.feature)),
        };
        self.nodes.push(ClusterNode {
            pos: leaf.pos,
            transition_pos: leaf.pos,
            max_distance: 0.0,
            expand_px: 0.0,
            bounds: MapBounds::from_point(leaf.pos),
            count: 1,
            feature: Some(leaf.feature),
            element,
            children: None,
            parent: None,
        });
        self.nodes.len() - 1
    }

    fn push_merged(&mut self, a: usize, b: usize) -> usize {
        let (na, nb) = (&self.nodes[a], &self.nodes[b]);
        let count = na.count + nb.count;
        let pos = (na.pos * na.count as f64 + nb.pos * nb.count as f64) * (1.0 / count as f64);
        let max_distance = na.pos.distance(&nb.pos);
        let bounds = na.bounds.union(&nb.bounds);

        let idx = self.nodes.len();
        let element = {
            // Members are known before the node exists: they are a's and b's.
            let map_pos = self.projection.from_internal(&pos);
            match self.mode {
                ClusterBuilderMode::ElementCount => self.builder.build_from_count(map_pos, count),
                ClusterBuilderMode::Elements => {
                    let mut members = collect_members(&self.nodes, a);
                    members.extend(collect_members(&self.nodes, b));
                    self.builder.build_from_elements(map_pos, &members)
                }
            }
        };
        self.nodes.push(ClusterNode {
            pos,
            transition_pos: pos,
            max_distance,
            expand_px: 0.0,
            bounds,
            count,
            feature: None,
            element,
            children: Some([a, b]),
            parent: None,
        });
        self.nodes[a].parent = Some(idx);
        self.nodes[b].parent = Some(idx);
        idx
    }

    fn coord(&self, cluster: usize, axis: usize) -> f64 {
        self.nodes[cluster].pos[axis]
    }

    /// Reduces `ids` to at most `max_clusters` clusters, returned in axis
    /// order.
    fn merge_clusters(&mut self, mut ids: Vec<usize>, max_clusters: usize) -> Vec<usize> {
        if ids.len() <= max_clusters {
            return ids;
        }

        let factor = 1.0 / ids.len() as f64;
        let mean = ids.iter().fold((0.0, 0.0), |acc, &id| {
            let pos = self.nodes[id].pos;
            (acc.0 + pos.x * factor, acc.1 + pos.y * factor)
        });
        let variance = ids.iter().fold((0.0, 0.0), |acc, &id| {
            let pos = self.nodes[id].pos;
            let (dx, dy) = (pos.x - mean.0, pos.y - mean.1);
            (acc.0 + dx * dx, acc.1 + dy * dy)
        });
        let axis = if variance.0 > variance.1 { 0 } else { 1 };
        let split = if axis == 0 { mean.0 } else { mean.1 };

        let mut ordered = Vec::new();
        if ids.len() > 2 * self.threshold {
            let (low, high): (Vec<usize>, Vec<usize>) =
                ids.iter().partition(|&&id| self.coord(id, axis) < split);
            if !low.is_empty() && !high.is_empty() {
                let threshold = self.threshold;
                let mut low = self.merge_clusters(low, threshold);
                let mut high = self.merge_clusters(high, threshold);
                low.sort_by(|&a, &b| self.coord(a, axis).total_cmp(&self.coord(b, axis)));
                high.sort_by(|&a, &b| self.coord(a, axis).total_cmp(&self.coord(b, axis)));
                ordered = low;
                ordered.extend(high);
            }
        }
        if ordered.is_empty() {
            ids.sort_by(|&a, &b| self.coord(a, axis).total_cmp(&self.coord(b, axis)));
            ordered = ids;
        }

        let mut list = WorkList::from_sorted(&ordered);
        let mut cur = list.head;
        while let Some(slot) = cur {
            self.find_closest(&mut list, slot, axis);
            cur = list.entries[slot].next;
        }

        while list.len > max_clusters {
            let Some(mut first) = list.head else {
                break;
            };
            let mut cur = list.entries[first].next;
            while let Some(slot) = cur {
                if list.entries[slot].closest_dist < list.entries[first].closest_dist {
                    first = slot;
                }
                cur = list.entries[slot].next;
            }
            let Some(second) = list.entries[first].closest else {
                break;
            };

            let merged = self.push_merged(list.entries[first].cluster, list.entries[second].cluster);
            let merged_coord = self.coord(merged, axis);

            let last = list.unlink(second);
            let mut at = list.unlink(first);
            while at != last {
                let Some(slot) = at else {
                    break;
                };
                if self.coord(list.entries[slot].cluster, axis) >= merged_coord {
                    break;
                }
                at = list.entries[slot].next;
            }
            let merged_slot = list.insert_before(at, merged);
            list.entries[merged_slot].closest = Some(second);

            // Only entries before `last` can link to the merged pair.
            let mut cur = list.head;
            while cur != last {
                let Some(slot) = cur else {
                    break;
                };
                let closest = list.entries[slot].closest;
                if closest == Some(first) || closest == Some(second) {
                    self.find_closest(&mut list, slot, axis);
                }
                cur = list.entries[slot].next;
            }

            let merged_pos = self.nodes[merged].pos;
            let mut cur = list.head;
            while cur != Some(merged_slot) {
                let Some(slot) = cur else {
                    break;
                };
                let entry = &mut list.entries[slot];
                let d2 = self.nodes[entry.cluster].pos.distance_squared(&merged_pos);
                if d2 < entry.closest_dist * entry.closest_dist {
                    entry.closest_dist = d2.sqrt();
                    entry.closest = Some(merged_slot);
                }
                cur = entry.next;
            }
        }

        list.clusters()
    }

    /// Nearest entry after `slot` in list order. The scan stops once the axis
    /// gap alone reaches the best distance found.
    fn find_closest(&self, list: &mut WorkList, slot: usize, axis: usize) {
        let pos = self.nodes[list.entries[slot].cluster].pos;
        let mut best = f64::INFINITY;
        let mut best_slot = None;
        let mut cur = list.entries[slot].next;
        while let Some(candidate) = cur {
            let other = self.nodes[list.entries[candidate].cluster].pos;
            if other[axis] - pos[axis] >= best {
                break;
            }
            let d2 = pos.distance_squared(&other);
            if d2 < best * best {
                best = d2.sqrt();
                best_slot = Some(candidate);
            }
            cur = list.entries[candidate].next;
        }
        list.entries[slot].closest_dist = best;
        list.entries[slot].closest = best_slot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;
    use crate::cluster::element::CountingElementBuilder;
    use crate::compute::projection::PlanarProjection;
    use crate::feature::Feature;
    use mapcluster_types::geometry::FeatureGeometry;
    use rustc_hash::FxHashSet;

    fn leaves(points: &[(f64, f64)]) -> Vec<Leaf> {
        let features: Vec<FeatureRef> = points
            .iter()
            .map(|&(x, y)| Feature::new(FeatureGeometry::point(x, y)).into_ref())
            .collect();
        collect_leaves(&features, &PlanarProjection::new())
    }

    fn build(points: &[(f64, f64)], threshold: usize) -> ClusterTree {
        ClusterTree::build(
            leaves(points),
            &PlanarProjection::new(),
            &CountingElementBuilder,
            threshold,
        )
    }

    /// Pseudo-random but reproducible scatter.
    fn scatter(n: usize) -> Vec<(f64, f64)> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let x = (state % 10_000) as f64;
                let y = ((state >> 20) % 10_000) as f64;
                (x, y)
            })
            .collect()
    }

    fn assert_full_binary(tree: &ClusterTree) {
        let n = tree.leaf_count();
        assert_eq!(tree.len(), 2 * n - 1);
        let root = tree.root().unwrap();
        assert!(tree.node(root).unwrap().parent().is_none());
        assert_eq!(tree.node(root).unwrap().member_count(), n);

        for (idx, node) in tree.nodes().iter().enumerate() {
            match node.children() {
                None => {
                    assert_eq!(node.member_count(), 1);
                    assert_eq!(tree.members(idx).len(), 1);
                }
                Some([a, b]) => {
                    assert_eq!(tree.node(a).unwrap().parent(), Some(idx));
                    assert_eq!(tree.node(b).unwrap().parent(), Some(idx));
                    let mut union: FxHashSet<FeatureRef> = tree.members(a).into_iter().collect();
                    let right = tree.members(b);
                    assert!(right.iter().all(|member| !union.contains(member)));
                    union.extend(right);
                    let own: FxHashSet<FeatureRef> = tree.members(idx).into_iter().collect();
                    assert_eq!(own, union);
                    assert_eq!(node.member_count(), own.len());
                }
            }
        }
    }

    #[test]
    fn test_empty_input_has_no_root() {
        let tree = build(&[], 100);
        assert!(tree.root().is_none());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_single_leaf_is_root() {
        let tree = build(&[(3.0, 4.0)], 100);
        assert_eq!(tree.root(), Some(0));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_closest_pair_merges_first() {
        let tree = build(&[(0.0, 0.0), (10.0, 0.0), (10.5, 0.0)], 100);
        assert_full_binary(&tree);
        let first_merge = tree.node(3).unwrap();
        let mut children = first_merge.children().unwrap();
        children.sort_unstable();
        assert_eq!(children, [1, 2]);
        assert_eq!(first_merge.merge_distance(), 0.5);
        assert_eq!(first_merge.position(), MapPos::new(10.25, 0.0));

        let root = tree.node(tree.root().unwrap()).unwrap();
        assert_eq!(root.member_count(), 3);
        assert_eq!(root.merge_distance(), 10.25);
    }

    #[test]
    fn test_centroid_is_count_weighted() {
        let tree = build(&[(0.0, 0.0), (0.0, 1.0), (9.0, 0.0)], 100);
        let root = tree.node(tree.root().unwrap()).unwrap();
        assert_eq!(root.position(), MapPos::new(3.0, 1.0 / 3.0));
    }

    #[test]
    fn test_full_binary_tree_greedy_only() {
        let tree = build(&scatter(150), 100);
        assert_eq!(tree.leaf_count(), 150);
        assert_full_binary(&tree);
    }

    #[test]
    fn test_full_binary_tree_divide_and_conquer() {
        let tree = build(&scatter(700), 16);
        assert_eq!(tree.leaf_count(), 700);
        assert_full_binary(&tree);
    }

    #[test]
    fn test_coincident_points() {
        let tree = build(&[(1.0, 1.0); 40], 4);
        assert_full_binary(&tree);
        assert!(tree.nodes().iter().all(|node| node.merge_distance() == 0.0));
    }

    #[test]
    fn test_invisible_and_non_point_features_are_skipped() {
        let features = vec![
            Feature::new(FeatureGeometry::point(0.0, 0.0)).into_ref(),
            Feature::new(FeatureGeometry::point(1.0, 0.0))
                .with_visible(false)
                .into_ref(),
            Feature::new(FeatureGeometry::Line(geo::line_string![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 1.0),
            ]))
            .into_ref(),
        ];
        let leaves = collect_leaves(&features, &PlanarProjection::new());
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].feature, features[0]);
    }

    #[test]
    fn test_has_leaves_detects_moves() {
        let points = [(0.0, 0.0), (5.0, 5.0)];
        let original = leaves(&points);
        let tree = ClusterTree::build(
            original.clone(),
            &PlanarProjection::new(),
            &CountingElementBuilder,
            100,
        );
        assert!(tree.has_leaves(&original));

        let mut moved = original.clone();
        moved[1].pos = MapPos::new(6.0, 5.0);
        assert!(!tree.has_leaves(&moved));
        assert!(!tree.has_leaves(&original[..1]));
    }

    #[test]
    fn test_find_element() {
        let tree = build(&[(0.0, 0.0), (1.0, 0.0)], 100);
        let root = tree.root().unwrap();
        let element = tree.node(root).unwrap().element().clone();
        assert_eq!(tree.find_element(&element), Some(root));

        let stranger = Feature::new(FeatureGeometry::point(0.0, 0.0)).into_ref();
        assert_eq!(tree.find_element(&stranger), None);
    }
}

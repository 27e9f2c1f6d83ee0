//! Per-frame cluster selection and marker animation.
//!
//! The tree is walked top-down. A subtree is cut off once the distance
//! between its two halves shrinks below the minimum on-screen separation; the
//! cut node is then displayed. Markers glide between the positions of the
//! previous frame and their new targets, so clusters visibly split and merge.

use super::tree::ClusterTree;
use crate::config::ClusterConfig;
use crate::view::ViewState;
use mapcluster_types::bounds::MapPos;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::f64::consts::PI;

/// Animation time simulated per frame at most, in seconds.
const MAX_STEP_TIME: f32 = 0.05;
/// Length of one animation sub-step, in seconds.
const STEP_TIME: f32 = 0.0015;
/// Fraction of the remaining way covered per sub-step.
const STEP_BLEND: f64 = 0.01;
/// Markers closer than this many pixels to their target snap onto it.
const SNAP_DISTANCE_PX: f64 = 0.25;

/// Selects the nodes to display for `view`, advancing animations by `dt`
/// seconds.
///
/// `previous` is the selection of the last frame on the same tree. Returns
/// the new selection and whether any marker is still moving.
pub(crate) fn select(
    tree: &mut ClusterTree,
    previous: &[usize],
    view: &ViewState,
    config: &ClusterConfig,
    dt: f32,
) -> (Vec<usize>, bool) {
    let Some(root) = tree.root() else {
        return (Vec::new(), false);
    };

    let mut visible_children: FxHashMap<usize, SmallVec<[usize; 4]>> = FxHashMap::default();
    for &idx in previous {
        let mut ancestor = tree.node(idx).and_then(|node| node.parent());
        while let Some(parent) = ancestor {
            visible_children.entry(parent).or_default().push(idx);
            ancestor = tree.node(parent).and_then(|node| node.parent());
        }
    }

    let mut frame = Frame {
        tree,
        view,
        config,
        pixel_measure: view.pixel_measure * f64::from(config.dpi_scale),
        dt,
        visible: previous.iter().copied().collect(),
        visible_children,
        expanded: None,
        total_expanded: 0,
        selected: Vec::new(),
    };
    let animating = frame.render_node(root);
    (frame.selected, animating)
}

struct Frame<'a> {
    tree: &'a mut ClusterTree,
    view: &'a ViewState,
    config: &'a ClusterConfig,
    pixel_measure: f64,
    dt: f32,
    visible: FxHashSet<usize>,
    /// Last frame's displayed descendants of each node.
    visible_children: FxHashMap<usize, SmallVec<[usize; 4]>>,
    /// Expanded ancestor on the current path.
    expanded: Option<usize>,
    total_expanded: usize,
    selected: Vec<usize>,
}

impl Frame<'_> {
    fn render_node(&mut self, idx: usize) -> bool {
        let node = &self.tree.nodes()[idx];
        if !self.view.frustum.cuboid_intersects(&node.bounds) {
            return false;
        }

        let mut stop = false;
        if self.view.zoom < self.config.max_cluster_zoom && self.expanded.is_none() {
            if node.expand_px > 0.0 {
                let target = node.pos;
                self.move_node(idx, target);
                self.expanded = Some(idx);
                self.total_expanded = 0;
            } else {
                let min_distance =
                    f64::from(self.config.min_cluster_distance_px) * self.pixel_measure;
                stop = node.max_distance < min_distance;
            }
        }

        let children = self.tree.nodes()[idx].children;
        let refresh = match children {
            Some([a, b]) if !stop => {
                let refresh_a = self.render_node(a);
                let refresh_b = self.render_node(b);
                refresh_a || refresh_b
            }
            _ => self.animate(idx),
        };
        if self.expanded == Some(idx) {
            self.expanded = None;
        }
        refresh
    }

    /// Displays `idx`, choosing where its marker starts from.
    fn animate(&mut self, idx: usize) -> bool {
        let target = self.tree.nodes()[idx].pos;

        // Children shown last frame collapse into this node first.
        if let Some(children) = self.visible_children.get(&idx).cloned() {
            let mut moving = false;
            for &child in &children {
                moving |= self.move_node(child, target);
            }
            if moving {
                self.selected.extend(children);
                return true;
            }
        }

        if let Some(expanded) = self.expanded {
            if self.visible.contains(&expanded) {
                let seed = self.tree.nodes()[expanded].transition_pos;
                self.tree.nodes_mut()[idx].transition_pos = seed;
            }
            let target = self.fan_out_position(expanded);
            let moving = self.move_node(idx, target);
            self.selected.push(idx);
            return moving;
        }

        let mut ancestor = Some(idx);
        while let Some(current) = ancestor {
            if self.visible.contains(&current) {
                let seed = self.tree.nodes()[current].transition_pos;
                self.tree.nodes_mut()[idx].transition_pos = seed;
                let moving = self.move_node(idx, target);
                self.selected.push(idx);
                return moving;
            }
            ancestor = self.tree.nodes()[current].parent;
        }

        self.tree.nodes_mut()[idx].transition_pos = target;
        self.selected.push(idx);
        false
    }

    /// Next slot on the circle around an expanded cluster.
    fn fan_out_position(&mut self, expanded: usize) -> MapPos {
        let node = &self.tree.nodes()[expanded];
        let angle = 2.0 * PI * self.total_expanded as f64 / node.count as f64;
        self.total_expanded += 1;
        let radius = f64::from(node.expand_px) * self.pixel_measure;
        node.transition_pos + MapPos::new(angle.cos() * radius, angle.sin() * radius)
    }

    /// Advances the marker of `idx` towards `target`. Returns whether it is
    /// still in motion.
    fn move_node(&mut self, idx: usize, target: MapPos) -> bool {
        let snap_distance = self.pixel_measure * SNAP_DISTANCE_PX;
        let node = &mut self.tree.nodes_mut()[idx];

        let animated =
            self.config.animated && node.transition_pos.distance(&target) > snap_distance;
        if animated {
            let mut t = 0.0;
            while t < MAX_STEP_TIME && t < self.dt {
                node.transition_pos = node.transition_pos.lerp(&target, STEP_BLEND);
                t += STEP_TIME;
            }
        } else {
            node.transition_pos = target;
        }
        animated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::element::CountingElementBuilder;
    use crate::cluster::tree::collect_leaves;
    use crate::compute::projection::PlanarProjection;
    use crate::feature::{Feature, FeatureRef};
    use mapcluster_types::bounds::MapBounds;
    use mapcluster_types::geometry::FeatureGeometry;

    fn tree(points: &[(f64, f64)]) -> ClusterTree {
        let features: Vec<FeatureRef> = points
            .iter()
            .map(|&(x, y)| Feature::new(FeatureGeometry::point(x, y)).into_ref())
            .collect();
        let projection = PlanarProjection::new();
        ClusterTree::build(
            collect_leaves(&features, &projection),
            &projection,
            &CountingElementBuilder,
            100,
        )
    }

    fn view(pixel_measure: f64, zoom: f32) -> ViewState {
        let bounds = MapBounds::new(MapPos::new(-1000.0, -1000.0), MapPos::new(1000.0, 1000.0));
        ViewState::new(
            mapcluster_types::frustum::Frustum::from_bounds(&bounds),
            zoom,
            pixel_measure,
            MapPos::new(0.0, 0.0),
        )
    }

    fn still() -> ClusterConfig {
        ClusterConfig::default().with_animated(false)
    }

    #[test]
    fn test_far_zoom_shows_root() {
        let mut tree = tree(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let (selected, animating) = select(&mut tree, &[], &view(1.0, 5.0), &still(), 0.016);
        assert_eq!(selected, vec![tree.root().unwrap()]);
        assert!(!animating);
    }

    #[test]
    fn test_close_zoom_shows_leaves() {
        let mut tree = tree(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let (mut selected, _) = select(&mut tree, &[], &view(0.01, 5.0), &still(), 0.016);
        selected.sort_unstable();
        assert_eq!(selected, vec![0, 1, 2]);
    }

    #[test]
    fn test_max_cluster_zoom_disables_clustering() {
        let mut tree = tree(&[(0.0, 0.0), (10.0, 0.0)]);
        let config = still().with_max_cluster_zoom(10.0);
        let (selected, _) = select(&mut tree, &[], &view(1.0, 10.0), &config, 0.016);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_dpi_scale_widens_separation() {
        let mut tree = tree(&[(0.0, 0.0), (150.0, 0.0)]);
        let (selected, _) = select(&mut tree, &[], &view(1.0, 5.0), &still(), 0.016);
        assert_eq!(selected.len(), 2);

        let config = still().with_dpi_scale(2.0);
        let (selected, _) = select(&mut tree, &[], &view(1.0, 5.0), &config, 0.016);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_culled_subtrees_are_skipped() {
        let mut tree = tree(&[(0.0, 0.0), (5000.0, 0.0)]);
        let (selected, _) = select(&mut tree, &[], &view(0.01, 5.0), &still(), 0.016);
        assert_eq!(selected, vec![0]);
    }

    #[test]
    fn test_split_animates_from_parent_position() {
        let mut tree = tree(&[(0.0, 0.0), (100.0, 0.0)]);
        let root = tree.root().unwrap();
        let config = ClusterConfig::default();

        let (first, _) = select(&mut tree, &[], &view(10.0, 5.0), &config, 0.016);
        assert_eq!(first, vec![root]);

        let (second, animating) = select(&mut tree, &first, &view(0.1, 5.0), &config, 0.016);
        assert_eq!(second.len(), 2);
        assert!(animating);
        let leaf = tree.node(0).unwrap();
        // Started at the parent centroid and moved a little towards the leaf.
        assert!(leaf.transition_position().x < 50.0);
        assert!(leaf.transition_position().x > 0.0);
    }

    #[test]
    fn test_animation_converges() {
        let mut tree = tree(&[(0.0, 0.0), (100.0, 0.0)]);
        let config = ClusterConfig::default();
        let (mut previous, _) = select(&mut tree, &[], &view(10.0, 5.0), &config, 0.016);

        let mut frames = 0;
        loop {
            let (selected, animating) = select(&mut tree, &previous, &view(0.1, 5.0), &config, 0.05);
            previous = selected;
            frames += 1;
            if !animating {
                break;
            }
            assert!(frames < 1000, "animation did not settle");
        }
        for &idx in &previous {
            let node = tree.node(idx).unwrap();
            assert_eq!(node.transition_position(), node.position());
        }
    }

    #[test]
    fn test_merge_collapses_children_first() {
        let mut tree = tree(&[(0.0, 0.0), (100.0, 0.0)]);
        let root = tree.root().unwrap();
        let config = ClusterConfig::default();

        let (leaves, _) = select(&mut tree, &[], &view(0.1, 5.0), &config, 0.016);
        assert_eq!(leaves.len(), 2);

        let (next, animating) = select(&mut tree, &leaves, &view(10.0, 5.0), &config, 0.016);
        assert!(animating);
        assert!(!next.contains(&root));
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn test_expanded_cluster_fans_out() {
        let mut tree = tree(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let root = tree.root().unwrap();
        tree.nodes_mut()[root].expand_px = 50.0;

        let (selected, _) = select(&mut tree, &[], &view(1.0, 5.0), &still(), 0.016);
        assert_eq!(selected.len(), 4);

        let center = tree.node(root).unwrap().position();
        for &idx in &selected {
            let distance = tree.node(idx).unwrap().transition_position().distance(&center);
            assert!((distance - 50.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_tree_selects_nothing() {
        let mut tree = ClusterTree::default();
        let (selected, animating) = select(&mut tree, &[], &view(1.0, 5.0), &still(), 0.016);
        assert!(selected.is_empty());
        assert!(!animating);
    }
}

//! Animated hierarchical clustering of point features.
//!
//! A [`ClusterEngine`] watches a [`FeatureStore`] and keeps a binary cluster
//! tree over its visible point features. Each frame the renderer asks for the
//! markers to draw via [`ClusterEngine::select_visible`].

pub mod element;
mod render;
pub mod tree;

pub use element::{ClusterElementBuilder, CountingElementBuilder};
pub use tree::{ClusterNode, ClusterTree};

use crate::config::ClusterConfig;
use crate::error::{MapError, Result};
use crate::feature::FeatureRef;
use crate::store::{FeatureListener, FeatureStore, ListenerId};
use crate::view::ViewState;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Markers to draw for one frame.
#[derive(Debug, Clone, Default)]
pub struct ClusterSelection {
    /// Source features for settled single-member clusters, builder markers
    /// for everything else.
    pub elements: Vec<FeatureRef>,
    /// Whether any marker is still moving. The renderer should request
    /// another frame while this is set.
    pub animating: bool,
}

/// Marks the engine's tree stale on every store event.
struct StaleFlag(Arc<AtomicBool>);

impl StaleFlag {
    fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl FeatureListener for StaleFlag {
    fn on_features_added(&self, _features: &[FeatureRef]) {
        self.mark();
    }

    fn on_feature_changed(&self, _feature: &FeatureRef) {
        self.mark();
    }

    fn on_features_removed(&self, _features: &[FeatureRef]) {
        self.mark();
    }

    fn on_all_changed(&self) {
        self.mark();
    }
}

struct EngineState {
    config: ClusterConfig,
    tree: ClusterTree,
    /// Nodes displayed in the last frame; indices into `tree`.
    rendered: Vec<usize>,
}

/// Clustering layer over a feature store.
///
/// The tree is rebuilt lazily: store events only mark it stale, and the next
/// [`update_tree`](Self::update_tree) or frame rebuilds it outside the engine
/// lock before swapping it in. The element builder may be called while the
/// engine lock is held and must not call back into the engine.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mapcluster::cluster::{ClusterEngine, CountingElementBuilder};
/// use mapcluster::compute::projection::PlanarProjection;
/// use mapcluster::config::{ClusterConfig, SpatialIndexKind};
/// use mapcluster::feature::Feature;
/// use mapcluster::store::FeatureStore;
/// use mapcluster::view::ViewState;
/// use mapcluster_types::bounds::{MapBounds, MapPos};
/// use mapcluster_types::geometry::FeatureGeometry;
///
/// let store = Arc::new(FeatureStore::with_index(
///     Arc::new(PlanarProjection::new()),
///     SpatialIndexKind::Null,
/// ));
/// for x in [0.0, 1.0, 2.0] {
///     store.add(Feature::new(FeatureGeometry::point(x, 0.0)).into_ref())?;
/// }
///
/// let engine = ClusterEngine::new(
///     store.clone(),
///     Arc::new(CountingElementBuilder),
///     ClusterConfig::default(),
/// )?;
/// let bounds = MapBounds::new(MapPos::new(-50.0, -50.0), MapPos::new(50.0, 50.0));
/// let selection = engine.select_visible(&ViewState::for_bounds(&bounds, 100.0, 4.0), 0.016);
///
/// assert_eq!(selection.elements.len(), 1);
/// assert_eq!(
///     selection.elements[0].metadata_value("count"),
///     Some(serde_json::Value::from(3))
/// );
/// # Ok::<(), mapcluster::MapError>(())
/// ```
pub struct ClusterEngine {
    store: Arc<FeatureStore>,
    builder: Arc<dyn ClusterElementBuilder>,
    stale: Arc<AtomicBool>,
    listener_id: ListenerId,
    state: Mutex<EngineState>,
}

impl ClusterEngine {
    pub fn new(
        store: Arc<FeatureStore>,
        builder: Arc<dyn ClusterElementBuilder>,
        config: ClusterConfig,
    ) -> Result<Self> {
        config.validate().map_err(MapError::InvalidConfig)?;

        let stale = Arc::new(AtomicBool::new(true));
        let listener_id = store.register_listener(Arc::new(StaleFlag(stale.clone())));

        Ok(Self {
            store,
            builder,
            stale,
            listener_id,
            state: Mutex::new(EngineState {
                config,
                tree: ClusterTree::default(),
                rendered: Vec::new(),
            }),
        })
    }

    pub fn store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    pub fn builder(&self) -> &Arc<dyn ClusterElementBuilder> {
        &self.builder
    }

    pub fn config(&self) -> ClusterConfig {
        self.state.lock().config.clone()
    }

    /// Replaces the configuration. A changed hierarchical threshold forces a
    /// rebuild; the other settings apply from the next frame.
    pub fn set_config(&self, config: ClusterConfig) -> Result<()> {
        config.validate().map_err(MapError::InvalidConfig)?;
        let mut state = self.state.lock();
        if state.config.hierarchical_threshold != config.hierarchical_threshold {
            self.refresh();
        }
        state.config = config;
        Ok(())
    }

    /// Forces a rebuild on the next update, e.g. after the element builder's
    /// output would change.
    pub fn refresh(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Rebuilds the tree if the store changed since the last build. Returns
    /// whether anything was rebuilt.
    pub fn update_tree(&self) -> bool {
        if !self.stale.swap(false, Ordering::AcqRel) {
            return false;
        }

        let projection = self.store.projection().clone();
        let features = self.store.get_all();
        let leaves = tree::collect_leaves(&features, projection.as_ref());
        let threshold = {
            let mut state = self.state.lock();
            if !state.tree.is_empty() && state.tree.has_leaves(&leaves) {
                state.tree.rebuild_elements(projection.as_ref(), self.builder.as_ref());
                debug!(
                    "Cluster leaves unchanged, rebuilt {} cluster elements",
                    state.tree.len()
                );
                return true;
            }
            state.config.hierarchical_threshold
        };

        let leaf_count = leaves.len();
        let tree = ClusterTree::build(
            leaves,
            projection.as_ref(),
            self.builder.as_ref(),
            threshold,
        );
        debug!(
            "Rebuilt cluster tree: {} features, {} leaves, {} nodes",
            features.len(),
            leaf_count,
            tree.len()
        );

        let mut state = self.state.lock();
        state.tree = tree;
        state.rendered.clear();
        true
    }

    /// Markers to draw for `view`, with animations advanced by `dt` seconds.
    pub fn select_visible(&self, view: &ViewState, dt: f32) -> ClusterSelection {
        self.update_tree();

        let projection = self.store.projection().clone();
        let mut state = self.state.lock();
        let EngineState {
            config,
            tree,
            rendered,
        } = &mut *state;

        let (selected, animating) = render::select(tree, rendered.as_slice(), view, config, dt);

        let elements = selected
            .iter()
            .filter_map(|&idx| tree.node(idx))
            .map(|node| match &node.feature {
                Some(feature) if node.transition_pos == node.pos => feature.clone(),
                _ => {
                    node.element
                        .set_point_pos(projection.from_internal(&node.transition_pos));
                    node.element.clone()
                }
            })
            .collect::<Vec<_>>();

        trace!(
            "Selected {} cluster elements at zoom {} (animating: {})",
            elements.len(),
            view.zoom,
            animating
        );
        *rendered = selected;

        ClusterSelection {
            elements,
            animating,
        }
    }

    /// Fans the members of the cluster shown as `element` out on a circle of
    /// `px` pixels. Zero collapses it again. Returns false when `element` is
    /// not a marker of the current tree.
    pub fn expand_cluster(&self, element: &FeatureRef, px: f32) -> bool {
        let mut state = self.state.lock();
        let Some(idx) = state.tree.find_element(element) else {
            return false;
        };
        state.tree.nodes_mut()[idx].expand_px = px.max(0.0);
        debug!("Cluster {} expanded to {}px", idx, px);
        true
    }

    /// Total node count of the current tree.
    pub fn cluster_count(&self) -> usize {
        self.state.lock().tree.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.state.lock().tree.leaf_count()
    }

    /// Marker of the cluster holding every leaf.
    pub fn root_cluster(&self) -> Option<FeatureRef> {
        let state = self.state.lock();
        let root = state.tree.root()?;
        state.tree.node(root).map(|node| node.element.clone())
    }

    /// Runs `f` against the current tree. The engine is locked meanwhile.
    pub fn with_tree<R>(&self, f: impl FnOnce(&ClusterTree) -> R) -> R {
        f(&self.state.lock().tree)
    }
}

impl Drop for ClusterEngine {
    fn drop(&mut self) {
        self.store.unregister_listener(self.listener_id);
    }
}

impl std::fmt::Debug for ClusterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ClusterEngine")
            .field("config", &state.config)
            .field("nodes", &state.tree.len())
            .field("stale", &self.is_stale())
            .finish()
    }
}

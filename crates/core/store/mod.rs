//! In-memory feature store.
//!
//! The store owns the spatial index, assigns identities and fires change
//! notifications. All index access happens under one mutex; notifications
//! are dispatched after the mutex is released.

pub mod listener;

pub use listener::{FeatureListener, ListenerId};

use crate::compute::projection::Projection;
use crate::compute::simplify::GeometrySimplifier;
use crate::compute::spatial::{IndexStrategy, SpatialIndex};
use crate::config::{SpatialIndexKind, StoreConfig};
use crate::error::{MapError, Result};
use crate::feature::{FeatureId, FeatureRef, FeatureState};
use crate::view::ViewState;
use listener::ListenerRegistry;
use log::debug;
use mapcluster_types::bounds::{MapBounds, MapPos};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

struct StoreInner {
    index: IndexStrategy<FeatureRef>,
    next_id: FeatureId,
    simplifier: Option<Arc<dyn GeometrySimplifier>>,
}

/// Thread-safe container of live features.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mapcluster::compute::projection::PlanarProjection;
/// use mapcluster::config::SpatialIndexKind;
/// use mapcluster::feature::Feature;
/// use mapcluster::store::FeatureStore;
/// use mapcluster_types::bounds::{MapBounds, MapPos};
/// use mapcluster_types::geometry::FeatureGeometry;
///
/// let store = FeatureStore::with_index(Arc::new(PlanarProjection::new()), SpatialIndexKind::KdTree);
/// let feature = Feature::new(FeatureGeometry::point(3.0, 4.0)).into_ref();
/// store.add(feature.clone())?;
///
/// assert_eq!(feature.id(), Some(0));
/// let hits = store.query_bounds(&MapBounds::new(MapPos::new(0.0, 0.0), MapPos::new(5.0, 5.0)));
/// assert_eq!(hits, vec![feature]);
/// # Ok::<(), mapcluster::MapError>(())
/// ```
pub struct FeatureStore {
    store_id: u64,
    projection: Arc<dyn Projection>,
    inner: Mutex<StoreInner>,
    listeners: ListenerRegistry,
}

impl FeatureStore {
    pub fn new(projection: Arc<dyn Projection>, config: StoreConfig) -> Result<Self> {
        config.validate().map_err(MapError::InvalidConfig)?;
        Ok(Self::with_index(projection, config.index_kind))
    }

    pub fn builder() -> crate::builder::StoreBuilder {
        crate::builder::StoreBuilder::new()
    }

    pub fn with_index(projection: Arc<dyn Projection>, kind: SpatialIndexKind) -> Self {
        Self {
            store_id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            projection,
            inner: Mutex::new(StoreInner {
                index: IndexStrategy::new(kind),
                next_id: 0,
                simplifier: None,
            }),
            listeners: ListenerRegistry::default(),
        }
    }

    pub fn projection(&self) -> &Arc<dyn Projection> {
        &self.projection
    }

    pub fn index_kind(&self) -> SpatialIndexKind {
        self.inner.lock().index.kind()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn internal_bounds(&self, feature: &FeatureRef) -> MapBounds {
        self.projection.to_internal_bounds(&feature.bounds())
    }

    /// Rejects features owned by a store other than this one.
    fn check_not_foreign(&self, feature: &FeatureRef) -> Result<()> {
        let owner = feature.owner();
        if owner != 0 && owner != self.store_id {
            return Err(MapError::InvalidArgument(
                "feature is attached to a different store".to_string(),
            ));
        }
        Ok(())
    }

    /// Attaches every feature or none of them.
    fn attach_all(&self, features: &[FeatureRef]) -> Result<()> {
        for (i, feature) in features.iter().enumerate() {
            if !feature.attach(self.store_id) {
                for attached in &features[..i] {
                    attached.detach(self.store_id);
                }
                return Err(MapError::InvalidArgument(
                    "feature is already attached to a store".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Add a feature, assigning it the next identity.
    ///
    /// Fails with [`MapError::InvalidArgument`] if the feature already
    /// belongs to a store.
    pub fn add(&self, feature: FeatureRef) -> Result<()> {
        self.attach_all(std::slice::from_ref(&feature))?;
        {
            let mut inner = self.inner.lock();
            feature.set_id(inner.next_id);
            inner.next_id += 1;
            let bounds = self.internal_bounds(&feature);
            inner.index.insert(bounds, feature.clone());
        }
        self.listeners.notify_added(&[feature]);
        Ok(())
    }

    /// Add several features with a single notification.
    pub fn add_all(&self, features: &[FeatureRef]) -> Result<()> {
        self.attach_all(features)?;
        {
            let mut inner = self.inner.lock();
            inner.index.reserve(features.len());
            for feature in features {
                feature.set_id(inner.next_id);
                inner.next_id += 1;
                let bounds = self.internal_bounds(feature);
                inner.index.insert(bounds, feature.clone());
            }
        }
        if !features.is_empty() {
            self.listeners.notify_added(features);
        }
        Ok(())
    }

    /// Remove a feature. Returns `Ok(false)` if it was not in the store.
    pub fn remove(&self, feature: &FeatureRef) -> Result<bool> {
        self.check_not_foreign(feature)?;
        let removed = {
            let mut inner = self.inner.lock();
            let bounds = self.internal_bounds(feature);
            inner.index.remove_in(&bounds, feature)
        };
        if removed {
            feature.detach(self.store_id);
            self.listeners.notify_removed(std::slice::from_ref(feature));
        }
        Ok(removed)
    }

    /// Remove several features with a single notification covering those
    /// actually removed. Returns whether every one of them was removed.
    pub fn remove_many(&self, features: &[FeatureRef]) -> Result<bool> {
        for feature in features {
            self.check_not_foreign(feature)?;
        }
        let removed: Vec<FeatureRef> = {
            let mut inner = self.inner.lock();
            features
                .iter()
                .filter(|feature| {
                    let bounds = self.internal_bounds(feature);
                    inner.index.remove_in(&bounds, feature)
                })
                .cloned()
                .collect()
        };
        for feature in &removed {
            feature.detach(self.store_id);
        }
        if !removed.is_empty() {
            self.listeners.notify_removed(&removed);
        }
        Ok(removed.len() == features.len())
    }

    /// Remove everything, returning what was held.
    pub fn remove_all(&self) -> Vec<FeatureRef> {
        let removed = {
            let mut inner = self.inner.lock();
            let all = inner.index.get_all();
            inner.index.clear();
            all
        };
        for feature in &removed {
            feature.detach(self.store_id);
        }
        if !removed.is_empty() {
            self.listeners.notify_removed(&removed);
        }
        removed
    }

    /// Replace the whole content.
    ///
    /// Features already in the store keep their identity; new ones get fresh
    /// identities. Fires one "added" notification for the new features, then
    /// one "removed" notification for the dropped ones.
    pub fn set_all(&self, features: &[FeatureRef]) -> Result<()> {
        for feature in features {
            self.check_not_foreign(feature)?;
        }

        let mut seen: FxHashSet<FeatureRef> = FxHashSet::default();
        let unique: Vec<FeatureRef> = features
            .iter()
            .filter(|feature| seen.insert((*feature).clone()))
            .cloned()
            .collect();
        let incoming: Vec<FeatureRef> = unique
            .iter()
            .filter(|feature| feature.owner() == 0)
            .cloned()
            .collect();
        self.attach_all(&incoming)?;

        let (added, removed) = {
            let mut inner = self.inner.lock();
            let mut old: FxHashSet<FeatureRef> = inner.index.get_all().into_iter().collect();
            let mut added = Vec::new();

            inner.index.clear();
            inner.index.reserve(unique.len());
            for feature in &unique {
                if !old.remove(feature) {
                    feature.set_id(inner.next_id);
                    inner.next_id += 1;
                    added.push(feature.clone());
                }
                let bounds = self.internal_bounds(feature);
                inner.index.insert(bounds, feature.clone());
            }
            (added, old.into_iter().collect::<Vec<_>>())
        };

        for feature in &removed {
            feature.detach(self.store_id);
        }
        debug!(
            "Replaced store content: {} added, {} removed, {} total",
            added.len(),
            removed.len(),
            unique.len()
        );

        if !added.is_empty() {
            self.listeners.notify_added(&added);
        }
        if !removed.is_empty() {
            self.listeners.notify_removed(&removed);
        }
        Ok(())
    }

    pub fn get_all(&self) -> Vec<FeatureRef> {
        self.inner.lock().index.get_all()
    }

    /// Mutate a feature in place and re-index it.
    ///
    /// Returns `Ok(false)` when the feature is not attached to this store,
    /// in which case `f` is not called.
    pub fn update(&self, feature: &FeatureRef, f: impl FnOnce(&mut FeatureState)) -> Result<bool> {
        self.check_not_foreign(feature)?;
        {
            let mut inner = self.inner.lock();
            if feature.owner() != self.store_id {
                return Ok(false);
            }
            if inner.index.is_culling() {
                let present = inner.index.remove(feature);
                feature.update(f);
                if present {
                    let bounds = self.internal_bounds(feature);
                    inner.index.insert(bounds, feature.clone());
                }
            } else {
                feature.update(f);
            }
        }
        self.listeners.notify_changed(feature);
        Ok(true)
    }

    /// Features intersecting the view volume.
    ///
    /// With a simplifier attached, simplifiable geometries are replaced by
    /// transient copies simplified for the current resolution. Copies keep the
    /// identity, visibility and metadata of their source and are never stored.
    pub fn query_visible(&self, view: &ViewState) -> Vec<FeatureRef> {
        let (features, simplifier) = {
            let inner = self.inner.lock();
            (inner.index.query_frustum(&view.frustum), inner.simplifier.clone())
        };
        let Some(simplifier) = simplifier else {
            return features;
        };

        let scale = self.simplifier_scale(view);
        features
            .into_iter()
            .filter_map(|feature| {
                let geometry = feature.geometry();
                if !geometry.is_simplifiable() {
                    return Some(feature);
                }
                let simplified = simplifier.simplify(&geometry, scale)?;
                if simplified == geometry {
                    Some(feature)
                } else {
                    Some(feature.with_replaced_geometry(simplified))
                }
            })
            .collect()
    }

    /// Map-coordinate length of one screen pixel around the view focus.
    fn simplifier_scale(&self, view: &ViewState) -> f64 {
        let focus = self.projection.from_internal(&view.focus);
        let step_x = self
            .projection
            .from_internal(&(view.focus + MapPos::new(view.pixel_measure, 0.0)));
        let step_y = self
            .projection
            .from_internal(&(view.focus + MapPos::new(0.0, view.pixel_measure)));
        focus.distance(&step_x).min(focus.distance(&step_y))
    }

    /// Features whose bounds intersect `bounds`, given in map coordinates.
    pub fn query_bounds(&self, bounds: &MapBounds) -> Vec<FeatureRef> {
        let internal = self.projection.to_internal_bounds(bounds);
        self.inner.lock().index.query_bounds(&internal)
    }

    /// Smallest planar rectangle in map coordinates containing every feature.
    pub fn data_extent(&self) -> MapBounds {
        let features = self.get_all();
        let mut extent = MapBounds::empty();
        for feature in &features {
            let bounds = feature.bounds();
            if bounds.is_empty() {
                continue;
            }
            let (p0, p1) = (bounds.min, bounds.max);
            extent.expand_to_contain(MapPos::new(p0.x, p0.y));
            extent.expand_to_contain(MapPos::new(p1.x, p0.y));
            extent.expand_to_contain(MapPos::new(p1.x, p1.y));
            extent.expand_to_contain(MapPos::new(p0.x, p1.y));
        }
        extent
    }

    pub fn simplifier(&self) -> Option<Arc<dyn GeometrySimplifier>> {
        self.inner.lock().simplifier.clone()
    }

    /// Replace the geometry simplifier. Fires "all changed".
    pub fn set_simplifier(&self, simplifier: Option<Arc<dyn GeometrySimplifier>>) {
        self.inner.lock().simplifier = simplifier;
        self.listeners.notify_all_changed();
    }

    pub fn register_listener(&self, listener: Arc<dyn FeatureListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Parse a GeoJSON FeatureCollection and add its features in one batch.
    #[cfg(feature = "geojson")]
    pub fn add_geojson(&self, geojson: &str) -> Result<Vec<FeatureRef>> {
        let features = crate::compute::geojson::parse_feature_collection(geojson)?;
        self.add_all(&features)?;
        Ok(features)
    }

    /// Export every live feature as a GeoJSON FeatureCollection.
    #[cfg(feature = "geojson")]
    pub fn to_geojson(&self) -> Result<String> {
        crate::compute::geojson::to_feature_collection(&self.get_all())
    }
}

impl std::fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStore")
            .field("store_id", &self.store_id)
            .field("projection", &self.projection)
            .field("len", &self.len())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

//! Map features held by a [`FeatureStore`](crate::store::FeatureStore).
//!
//! Features are shared as [`FeatureRef`] (`Arc<Feature>`). Equality and
//! hashing are by identity: two features with identical contents are still
//! different features.

use mapcluster_types::bounds::{MapBounds, MapPos};
use mapcluster_types::geometry::FeatureGeometry;
use parking_lot::{RwLock, RwLockReadGuard};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Store-assigned feature identity.
pub type FeatureId = u64;

pub type FeatureRef = Arc<Feature>;

const NO_ID: u64 = u64::MAX;
const NO_OWNER: u64 = 0;

/// Mutable part of a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureState {
    pub geometry: FeatureGeometry,
    pub visible: bool,
    pub metadata: Map<String, Value>,
}

/// A single map entity: geometry, visibility flag and free-form metadata.
///
/// # Examples
///
/// ```
/// use mapcluster::feature::Feature;
/// use mapcluster_types::geometry::FeatureGeometry;
///
/// let cafe = Feature::new(FeatureGeometry::point(24.74, 59.43))
///     .with_metadata("name", "Kohvik")
///     .into_ref();
/// assert_eq!(cafe.id(), None);
/// assert_eq!(cafe.metadata_value("name").unwrap(), "Kohvik");
/// ```
pub struct Feature {
    id: AtomicU64,
    owner: AtomicU64,
    state: RwLock<FeatureState>,
}

impl Feature {
    pub fn new(geometry: FeatureGeometry) -> Self {
        Self {
            id: AtomicU64::new(NO_ID),
            owner: AtomicU64::new(NO_OWNER),
            state: RwLock::new(FeatureState {
                geometry,
                visible: true,
                metadata: Map::new(),
            }),
        }
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.state.get_mut().visible = visible;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.get_mut().metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata_map(mut self, metadata: Map<String, Value>) -> Self {
        self.state.get_mut().metadata = metadata;
        self
    }

    pub fn into_ref(self) -> FeatureRef {
        Arc::new(self)
    }

    /// Identity assigned by the store that owns (or owned) this feature.
    pub fn id(&self) -> Option<FeatureId> {
        match self.id.load(Ordering::Acquire) {
            NO_ID => None,
            id => Some(id),
        }
    }

    pub fn geometry(&self) -> FeatureGeometry {
        self.state.read().geometry.clone()
    }

    /// Bounds in map coordinates.
    pub fn bounds(&self) -> MapBounds {
        self.state.read().geometry.bounds()
    }

    /// Position of a point feature in map coordinates.
    pub fn point_pos(&self) -> Option<MapPos> {
        self.state.read().geometry.point_pos()
    }

    pub fn is_visible(&self) -> bool {
        self.state.read().visible
    }

    pub fn metadata(&self) -> Map<String, Value> {
        self.state.read().metadata.clone()
    }

    pub fn metadata_value(&self, key: &str) -> Option<Value> {
        self.state.read().metadata.get(key).cloned()
    }

    /// Read access to the whole state without cloning.
    pub fn state(&self) -> RwLockReadGuard<'_, FeatureState> {
        self.state.read()
    }

    /// Whether the feature currently belongs to a store.
    pub fn is_attached(&self) -> bool {
        self.owner.load(Ordering::Acquire) != NO_OWNER
    }

    /// Copy carrying another geometry but the same identity, visibility and
    /// metadata. The copy is not attached to any store.
    pub(crate) fn with_replaced_geometry(&self, geometry: FeatureGeometry) -> FeatureRef {
        let state = self.state.read();
        Arc::new(Self {
            id: AtomicU64::new(self.id.load(Ordering::Acquire)),
            owner: AtomicU64::new(NO_OWNER),
            state: RwLock::new(FeatureState {
                geometry,
                visible: state.visible,
                metadata: state.metadata.clone(),
            }),
        })
    }

    pub(crate) fn set_id(&self, id: FeatureId) {
        self.id.store(id, Ordering::Release);
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner.load(Ordering::Acquire)
    }

    /// Claims an unattached feature for `store`. Fails if any store owns it.
    pub(crate) fn attach(&self, store: u64) -> bool {
        self.owner
            .compare_exchange(NO_OWNER, store, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn detach(&self, store: u64) {
        let _ = self
            .owner
            .compare_exchange(store, NO_OWNER, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut FeatureState) -> R) -> R {
        f(&mut self.state.write())
    }

    /// Moves a point feature. Other geometry kinds are left alone.
    pub(crate) fn set_point_pos(&self, pos: MapPos) -> bool {
        let mut state = self.state.write();
        match &mut state.geometry {
            FeatureGeometry::Point(point) => {
                point.set_x(pos.x);
                point.set_y(pos.y);
                true
            }
            _ => false,
        }
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Feature {}

impl Hash for Feature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl std::fmt::Debug for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Feature")
            .field("id", &self.id())
            .field("geometry", &state.geometry)
            .field("visible", &state.visible)
            .field("metadata", &state.metadata)
            .finish()
    }
}

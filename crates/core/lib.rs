//! Vector feature management and animated point clustering for map renderers.
//!
//! ## Features
//! - **Feature store**: thread-safe container assigning identities and firing change events
//! - **Spatial indexing**: pluggable strategies, a flat list or a bounds KD-tree for frustum culling
//! - **Simplification**: optional per-view geometry simplification for visibility queries
//! - **Clustering**: greedy hierarchical clustering with animated split, merge and fan-out
//! - **GeoJSON**: FeatureCollection import and export (with the `geojson` feature)
//!
//! ```rust
//! use std::sync::Arc;
//! use mapcluster::prelude::*;
//!
//! let store = Arc::new(FeatureStore::builder().index_kind(SpatialIndexKind::KdTree).build()?);
//! for i in 0..10 {
//!     store.add(Feature::new(FeatureGeometry::point(f64::from(i), 0.0)).into_ref())?;
//! }
//!
//! let engine = ClusterEngine::new(
//!     store.clone(),
//!     Arc::new(CountingElementBuilder),
//!     ClusterConfig::default(),
//! )?;
//!
//! // Zoomed out, everything collapses into one marker.
//! let bounds = MapBounds::new(MapPos::new(-500.0, -500.0), MapPos::new(500.0, 500.0));
//! let selection = engine.select_visible(&ViewState::for_bounds(&bounds, 100.0, 2.0), 0.016);
//! assert_eq!(selection.elements.len(), 1);
//! # Ok::<(), mapcluster::MapError>(())
//! ```

pub mod builder;
pub mod cluster;
pub mod compute;
pub mod config;
pub mod error;
pub mod feature;
pub mod store;
pub mod view;

pub use builder::StoreBuilder;
pub use cluster::{
    ClusterElementBuilder, ClusterEngine, ClusterNode, ClusterSelection, ClusterTree,
    CountingElementBuilder,
};
pub use config::{ClusterBuilderMode, ClusterConfig, SpatialIndexKind, StoreConfig};
pub use error::{MapError, Result};
pub use feature::{Feature, FeatureId, FeatureRef, FeatureState};
pub use store::{FeatureListener, FeatureStore, ListenerId};
pub use view::ViewState;

pub use mapcluster_types::bounds::{MapBounds, MapPos};
pub use mapcluster_types::frustum::Frustum;
pub use mapcluster_types::geometry::FeatureGeometry;

#[cfg(feature = "geojson")]
pub use compute::geojson;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::cluster::{
        ClusterElementBuilder, ClusterEngine, ClusterSelection, CountingElementBuilder,
    };
    pub use crate::compute::projection::{PlanarProjection, Projection, WebMercatorProjection};
    pub use crate::compute::simplify::{DouglasPeuckerSimplifier, GeometrySimplifier};
    pub use crate::config::{ClusterBuilderMode, ClusterConfig, SpatialIndexKind, StoreConfig};
    pub use crate::error::MapError;
    pub use crate::feature::{Feature, FeatureRef};
    pub use crate::store::{FeatureListener, FeatureStore};
    pub use crate::view::ViewState;
    pub use mapcluster_types::bounds::{MapBounds, MapPos};
    pub use mapcluster_types::geometry::FeatureGeometry;
}

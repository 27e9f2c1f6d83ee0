//! # mapcluster-types
//!
//! Core geometric value types for the mapcluster feature engine.
//!
//! - **Positions and bounds**: `MapPos`, `MapBounds` (3D axis-aligned volumes)
//! - **View volumes**: `Frustum` (six-plane convex volume)
//! - **Geometries**: `FeatureGeometry` built on the `geo` crate's primitives
//! - **Configuration enums**: `SpatialIndexKind`, `ClusterBuilderMode`
//!
//! All types are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use mapcluster_types::bounds::{MapBounds, MapPos};
//! use mapcluster_types::frustum::Frustum;
//! use mapcluster_types::geometry::FeatureGeometry;
//!
//! let marker = FeatureGeometry::point(24.75, 59.43);
//! let view = Frustum::from_bounds(&MapBounds::new(
//!     MapPos::new(24.0, 59.0),
//!     MapPos::new(25.0, 60.0),
//! ));
//! assert!(view.cuboid_intersects(&marker.bounds()));
//! ```

pub mod bounds;
pub mod config;
pub mod frustum;
pub mod geometry;

//! Spatial indexing, projections, geometry simplification and GeoJSON conversion.

#[cfg(feature = "geojson")]
pub mod geojson;
pub mod projection;
pub mod simplify;
pub mod spatial;

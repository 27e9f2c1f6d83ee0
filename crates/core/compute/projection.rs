//! Projections between caller-visible map coordinates and the flat internal
//! coordinate system used for all bounds math.

use mapcluster_types::bounds::{MapBounds, MapPos};
use std::f64::consts::PI;

/// Coordinate conversion service.
///
/// `to_internal` and `from_internal` must be inverses of each other inside
/// [`Projection::bounds`].
pub trait Projection: Send + Sync + std::fmt::Debug {
    /// Convert a map position to internal coordinates.
    fn to_internal(&self, pos: &MapPos) -> MapPos;

    /// Convert an internal position back to map coordinates.
    fn from_internal(&self, pos: &MapPos) -> MapPos;

    /// Valid extent in map coordinates.
    fn bounds(&self) -> MapBounds;

    /// Internal-space box containing every corner of `bounds`.
    ///
    /// All eight corner combinations are converted, since a non-linear
    /// projection does not map an axis-aligned box onto an axis-aligned box.
    fn to_internal_bounds(&self, bounds: &MapBounds) -> MapBounds {
        let mut result = MapBounds::empty();
        if bounds.is_empty() {
            return result;
        }
        for corner in bounds.corners() {
            result.expand_to_contain(self.to_internal(&corner));
        }
        result
    }
}

/// Identity projection for data that is already planar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlanarProjection {
    bounds: Option<MapBounds>,
}

impl PlanarProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Planar projection with an explicit valid extent.
    pub fn with_bounds(bounds: MapBounds) -> Self {
        Self {
            bounds: Some(bounds),
        }
    }
}

impl Projection for PlanarProjection {
    fn to_internal(&self, pos: &MapPos) -> MapPos {
        *pos
    }

    fn from_internal(&self, pos: &MapPos) -> MapPos {
        *pos
    }

    fn bounds(&self) -> MapBounds {
        self.bounds.unwrap_or(MapBounds::new(
            MapPos::new(f64::MIN, f64::MIN),
            MapPos::new(f64::MAX, f64::MAX),
        ))
    }

    fn to_internal_bounds(&self, bounds: &MapBounds) -> MapBounds {
        *bounds
    }
}

/// Spherical Web Mercator: longitude/latitude degrees in, metres out.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WebMercatorProjection;

impl WebMercatorProjection {
    pub const EARTH_RADIUS: f64 = 6_378_137.0;

    /// Latitude at which the projected map becomes square.
    pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

    pub fn new() -> Self {
        Self
    }
}

impl Projection for WebMercatorProjection {
    fn to_internal(&self, pos: &MapPos) -> MapPos {
        let lat = pos.y.clamp(-Self::MAX_LATITUDE, Self::MAX_LATITUDE);
        let x = pos.x.to_radians() * Self::EARTH_RADIUS;
        let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * Self::EARTH_RADIUS;
        MapPos::new_3d(x, y, pos.z)
    }

    fn from_internal(&self, pos: &MapPos) -> MapPos {
        let lon = (pos.x / Self::EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (pos.y / Self::EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        MapPos::new_3d(lon, lat, pos.z)
    }

    fn bounds(&self) -> MapBounds {
        MapBounds::new(
            MapPos::new(-180.0, -Self::MAX_LATITUDE),
            MapPos::new(180.0, Self::MAX_LATITUDE),
        )
    }
}

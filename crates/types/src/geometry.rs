//! Feature geometries built on `geo` primitives.

use crate::bounds::{MapBounds, MapPos};
use geo::{BoundingRect, Geometry, GeometryCollection, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Geometry carried by a map feature.
///
/// Only [`FeatureGeometry::Point`] participates in clustering. Lines, polygons,
/// extrusions and collections are the simplifiable kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureGeometry {
    Point(Point<f64>),
    Line(LineString<f64>),
    Polygon(Polygon<f64>),
    /// A polygon footprint extruded upwards by `height`.
    Extrusion {
        polygon: Polygon<f64>,
        height: f64,
    },
    Collection(GeometryCollection<f64>),
}

impl FeatureGeometry {
    pub fn point(x: f64, y: f64) -> Self {
        FeatureGeometry::Point(Point::new(x, y))
    }

    /// Position of a point-like geometry, `None` for every other kind.
    pub fn point_pos(&self) -> Option<MapPos> {
        match self {
            FeatureGeometry::Point(p) => Some(MapPos::from(*p)),
            _ => None,
        }
    }

    /// Whether a geometry simplifier may replace this geometry.
    pub fn is_simplifiable(&self) -> bool {
        !matches!(self, FeatureGeometry::Point(_))
    }

    /// Bounding volume in the geometry's own coordinate system.
    ///
    /// Extrusions extend the z axis up to their height. Empty lines and
    /// collections yield [`MapBounds::empty`].
    pub fn bounds(&self) -> MapBounds {
        let rect = match self {
            FeatureGeometry::Point(p) => return MapBounds::from_point(MapPos::from(*p)),
            FeatureGeometry::Line(line) => line.bounding_rect(),
            FeatureGeometry::Polygon(polygon) => polygon.bounding_rect(),
            FeatureGeometry::Extrusion { polygon, height } => {
                return match polygon.bounding_rect() {
                    Some(rect) => MapBounds::new(
                        MapPos::new_3d(rect.min().x, rect.min().y, 0.0),
                        MapPos::new_3d(rect.max().x, rect.max().y, *height),
                    ),
                    None => MapBounds::empty(),
                };
            }
            FeatureGeometry::Collection(collection) => collection.bounding_rect(),
        };
        match rect {
            Some(rect) => MapBounds::new(rect.min().into(), rect.max().into()),
            None => MapBounds::empty(),
        }
    }

    /// Convert into a plain `geo::Geometry`. Extrusions lose their height.
    pub fn to_geo(&self) -> Geometry<f64> {
        match self {
            FeatureGeometry::Point(p) => Geometry::Point(*p),
            FeatureGeometry::Line(line) => Geometry::LineString(line.clone()),
            FeatureGeometry::Polygon(polygon) => Geometry::Polygon(polygon.clone()),
            FeatureGeometry::Extrusion { polygon, .. } => Geometry::Polygon(polygon.clone()),
            FeatureGeometry::Collection(collection) => {
                Geometry::GeometryCollection(collection.clone())
            }
        }
    }
}

impl From<Geometry<f64>> for FeatureGeometry {
    /// Single-part kinds map directly; multi-part kinds become collections.
    fn from(geometry: Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(p) => FeatureGeometry::Point(p),
            Geometry::Line(line) => FeatureGeometry::Line(LineString::from(vec![line.start, line.end])),
            Geometry::LineString(line) => FeatureGeometry::Line(line),
            Geometry::Polygon(polygon) => FeatureGeometry::Polygon(polygon),
            Geometry::Rect(rect) => FeatureGeometry::Polygon(rect.to_polygon()),
            Geometry::Triangle(triangle) => FeatureGeometry::Polygon(triangle.to_polygon()),
            Geometry::GeometryCollection(collection) => FeatureGeometry::Collection(collection),
            multi => FeatureGeometry::Collection(GeometryCollection::from(vec![multi])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPoint, line_string, polygon};

    #[test]
    fn test_point_bounds_and_pos() {
        let geom = FeatureGeometry::point(3.0, 4.0);
        assert_eq!(geom.point_pos(), Some(MapPos::new(3.0, 4.0)));
        assert_eq!(geom.bounds(), MapBounds::from_point(MapPos::new(3.0, 4.0)));
        assert!(!geom.is_simplifiable());
    }

    #[test]
    fn test_line_bounds() {
        let geom = FeatureGeometry::Line(line_string![(x: 0.0, y: 5.0), (x: 2.0, y: -1.0)]);
        let bounds = geom.bounds();
        assert_eq!(bounds.min, MapPos::new(0.0, -1.0));
        assert_eq!(bounds.max, MapPos::new(2.0, 5.0));
        assert!(geom.point_pos().is_none());
        assert!(geom.is_simplifiable());
    }

    #[test]
    fn test_extrusion_bounds_include_height() {
        let footprint = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let geom = FeatureGeometry::Extrusion {
            polygon: footprint,
            height: 25.0,
        };
        assert_eq!(geom.bounds().max.z, 25.0);
    }

    #[test]
    fn test_multi_geometry_becomes_collection() {
        let multi = Geometry::MultiPoint(MultiPoint::from(vec![(0.0, 0.0), (1.0, 1.0)]));
        let geom = FeatureGeometry::from(multi);
        assert!(matches!(geom, FeatureGeometry::Collection(_)));
        assert_eq!(geom.bounds().max, MapPos::new(1.0, 1.0));
    }
}

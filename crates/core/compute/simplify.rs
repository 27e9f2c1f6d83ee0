//! Geometry simplification applied to features at query time.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPolygon, Polygon,
    Simplify,
};
use mapcluster_types::geometry::FeatureGeometry;

/// Scale-dependent geometry simplification hook.
///
/// `scale` is the map-space size of one screen pixel. Returning `None` drops
/// the feature from the current render pass.
pub trait GeometrySimplifier: Send + Sync + std::fmt::Debug {
    fn simplify(&self, geometry: &FeatureGeometry, scale: f64) -> Option<FeatureGeometry>;
}

/// Radial-distance filtering followed by Ramer-Douglas-Peucker.
///
/// `tolerance` is expressed in screen pixels and multiplied by the scale at
/// simplification time.
///
/// # Examples
///
/// ```
/// use mapcluster::compute::simplify::{DouglasPeuckerSimplifier, GeometrySimplifier};
/// use mapcluster_types::geometry::FeatureGeometry;
/// use geo::line_string;
///
/// let line = FeatureGeometry::Line(line_string![
///     (x: 0.0, y: 0.0),
///     (x: 5.0, y: 0.1),
///     (x: 10.0, y: 0.0),
/// ]);
/// let simplifier = DouglasPeuckerSimplifier::new(1.0);
/// match simplifier.simplify(&line, 1.0) {
///     Some(FeatureGeometry::Line(simplified)) => assert_eq!(simplified.0.len(), 2),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DouglasPeuckerSimplifier {
    tolerance: f64,
}

impl DouglasPeuckerSimplifier {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn simplify_coords(&self, coords: &[Coord<f64>], scale: f64) -> LineString<f64> {
        let min_dist = self.tolerance * scale;
        LineString::new(radial_distance(coords, min_dist)).simplify(min_dist)
    }

    fn simplify_line(&self, line: &LineString<f64>, scale: f64) -> Option<LineString<f64>> {
        let simplified = self.simplify_coords(&line.0, scale);
        (simplified.0.len() >= 2).then_some(simplified)
    }

    /// Rings are closed, so three distinct corners need four coordinates.
    fn simplify_ring(&self, ring: &LineString<f64>, scale: f64) -> Option<LineString<f64>> {
        let simplified = self.simplify_coords(&ring.0, scale);
        (simplified.0.len() >= 4).then_some(simplified)
    }

    fn simplify_polygon(&self, polygon: &Polygon<f64>, scale: f64) -> Option<Polygon<f64>> {
        let exterior = self.simplify_ring(polygon.exterior(), scale)?;
        let interiors = polygon
            .interiors()
            .iter()
            .filter_map(|hole| self.simplify_ring(hole, scale))
            .collect();
        Some(Polygon::new(exterior, interiors))
    }

    fn simplify_geo(&self, geometry: &Geometry<f64>, scale: f64) -> Option<Geometry<f64>> {
        match geometry {
            Geometry::LineString(line) => self.simplify_line(line, scale).map(Geometry::LineString),
            Geometry::Polygon(polygon) => {
                self.simplify_polygon(polygon, scale).map(Geometry::Polygon)
            }
            Geometry::MultiLineString(lines) => {
                let lines: Vec<_> = lines
                    .iter()
                    .filter_map(|line| self.simplify_line(line, scale))
                    .collect();
                (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(lines)))
            }
            Geometry::MultiPolygon(polygons) => {
                let polygons: Vec<_> = polygons
                    .iter()
                    .filter_map(|polygon| self.simplify_polygon(polygon, scale))
                    .collect();
                (!polygons.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            Geometry::GeometryCollection(collection) => self
                .simplify_collection(collection, scale)
                .map(Geometry::GeometryCollection),
            other => Some(other.clone()),
        }
    }

    fn simplify_collection(
        &self,
        collection: &GeometryCollection<f64>,
        scale: f64,
    ) -> Option<GeometryCollection<f64>> {
        let members: Vec<_> = collection
            .iter()
            .filter_map(|member| self.simplify_geo(member, scale))
            .collect();
        if members.is_empty() && !collection.is_empty() {
            return None;
        }
        Some(GeometryCollection::from(members))
    }
}

impl GeometrySimplifier for DouglasPeuckerSimplifier {
    fn simplify(&self, geometry: &FeatureGeometry, scale: f64) -> Option<FeatureGeometry> {
        match geometry {
            FeatureGeometry::Point(_) => Some(geometry.clone()),
            FeatureGeometry::Line(line) => self.simplify_line(line, scale).map(FeatureGeometry::Line),
            FeatureGeometry::Polygon(polygon) => self
                .simplify_polygon(polygon, scale)
                .map(FeatureGeometry::Polygon),
            FeatureGeometry::Extrusion { polygon, height } => self
                .simplify_polygon(polygon, scale)
                .map(|polygon| FeatureGeometry::Extrusion {
                    polygon,
                    height: *height,
                }),
            FeatureGeometry::Collection(collection) => self
                .simplify_collection(collection, scale)
                .map(FeatureGeometry::Collection),
        }
    }
}

/// Drops interior vertices closer than `min_dist` to the last kept vertex.
fn radial_distance(coords: &[Coord<f64>], min_dist: f64) -> Vec<Coord<f64>> {
    let (Some(first), Some(last)) = (coords.first(), coords.last()) else {
        return Vec::new();
    };
    if coords.len() <= 2 {
        return coords.to_vec();
    }

    let min_dist2 = min_dist * min_dist;
    let mut kept = Vec::with_capacity(coords.len());
    kept.push(*first);
    for coord in &coords[1..coords.len() - 1] {
        let prev = kept[kept.len() - 1];
        let delta = *coord - prev;
        if delta.x * delta.x + delta.y * delta.y > min_dist2 {
            kept.push(*coord);
        }
    }
    kept.push(*last);
    kept
}

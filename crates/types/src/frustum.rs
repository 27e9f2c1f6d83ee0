use crate::bounds::{MapBounds, MapPos};
use serde::{Deserialize, Serialize};

/// A convex view volume bounded by six planes.
///
/// Each plane is stored as `[a, b, c, d]` with the inside half-space being
/// `a*x + b*y + c*z + d >= 0`. Plane order is right, left, bottom, top, far,
/// near.
///
/// # Examples
///
/// ```
/// use mapcluster_types::bounds::{MapBounds, MapPos};
/// use mapcluster_types::frustum::Frustum;
///
/// let view = MapBounds::new(MapPos::new(0.0, 0.0), MapPos::new(10.0, 10.0));
/// let frustum = Frustum::from_bounds(&view);
/// assert!(frustum.point_inside(&MapPos::new(5.0, 5.0)));
/// assert!(!frustum.point_inside(&MapPos::new(11.0, 5.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    planes: [[f64; 4]; 6],
}

impl Frustum {
    /// Build from raw plane equations. Planes are normalized.
    pub fn from_planes(planes: [[f64; 4]; 6]) -> Self {
        let mut frustum = Self { planes };
        frustum.normalize();
        frustum
    }

    /// Extract the planes of a row-major model-view-projection matrix
    /// (`mvp[row][col]`).
    pub fn from_mvp(mvp: &[[f64; 4]; 4]) -> Self {
        let row = |r: usize| mvp[r];
        let combine = |sign: f64, r: usize| {
            let w = row(3);
            let v = row(r);
            [
                w[0] + sign * v[0],
                w[1] + sign * v[1],
                w[2] + sign * v[2],
                w[3] + sign * v[3],
            ]
        };
        Self::from_planes([
            combine(-1.0, 0),
            combine(1.0, 0),
            combine(1.0, 1),
            combine(-1.0, 1),
            combine(-1.0, 2),
            combine(1.0, 2),
        ])
    }

    /// Axis-aligned view volume matching `bounds` exactly. Useful for
    /// orthographic top-down views.
    pub fn from_bounds(bounds: &MapBounds) -> Self {
        let (min, max) = (bounds.min, bounds.max);
        Self {
            planes: [
                [-1.0, 0.0, 0.0, max.x],
                [1.0, 0.0, 0.0, -min.x],
                [0.0, 1.0, 0.0, -min.y],
                [0.0, -1.0, 0.0, max.y],
                [0.0, 0.0, -1.0, max.z],
                [0.0, 0.0, 1.0, -min.z],
            ],
        }
    }

    pub fn planes(&self) -> &[[f64; 4]; 6] {
        &self.planes
    }

    #[inline]
    fn plane_distance(plane: &[f64; 4], pos: &MapPos) -> f64 {
        plane[0] * pos.x + plane[1] * pos.y + plane[2] * pos.z + plane[3]
    }

    pub fn point_inside(&self, pos: &MapPos) -> bool {
        self.planes
            .iter()
            .all(|plane| Self::plane_distance(plane, pos) >= 0.0)
    }

    /// Conservative box test: a box is rejected only if all eight corners are
    /// outside a single plane.
    pub fn cuboid_intersects(&self, cuboid: &MapBounds) -> bool {
        if cuboid.is_empty() {
            return false;
        }
        let corners = cuboid.corners();
        self.planes.iter().all(|plane| {
            corners
                .iter()
                .any(|corner| Self::plane_distance(plane, corner) >= 0.0)
        })
    }

    fn normalize(&mut self) {
        for plane in &mut self.planes {
            let len = (plane[0] * plane[0] + plane[1] * plane[1] + plane[2] * plane[2]).sqrt();
            if len > 0.0 {
                for value in plane.iter_mut() {
                    *value /= len;
                }
            }
        }
    }
}

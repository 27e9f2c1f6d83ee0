use serde::{Deserialize, Serialize};
use std::ops::{Add, Index, Mul, Sub};

/// A position in either the caller-visible map coordinate system or the flat
/// internal system, depending on context.
///
/// The z coordinate defaults to zero for planar data.
///
/// # Examples
///
/// ```
/// use mapcluster_types::bounds::MapPos;
///
/// let pos = MapPos::new(10.0, 20.0);
/// assert_eq!(pos[0], 10.0);
/// assert_eq!(pos.z, 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MapPos {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl MapPos {
    /// Create a planar position (z = 0).
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Create a position with an explicit z coordinate.
    #[inline]
    pub const fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared euclidean distance to another position.
    #[inline]
    pub fn distance_squared(&self, other: &MapPos) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance to another position.
    #[inline]
    pub fn distance(&self, other: &MapPos) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Linear blend `self * (1 - t) + other * t`.
    #[inline]
    pub fn lerp(&self, other: &MapPos, t: f64) -> MapPos {
        *self * (1.0 - t) + *other * t
    }
}

impl Index<usize> for MapPos {
    type Output = f64;

    fn index(&self, axis: usize) -> &f64 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("axis {axis} out of range for MapPos"),
        }
    }
}

impl Add for MapPos {
    type Output = MapPos;

    fn add(self, rhs: MapPos) -> MapPos {
        MapPos::new_3d(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for MapPos {
    type Output = MapPos;

    fn sub(self, rhs: MapPos) -> MapPos {
        MapPos::new_3d(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for MapPos {
    type Output = MapPos;

    fn mul(self, rhs: f64) -> MapPos {
        MapPos::new_3d(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl From<geo::Coord<f64>> for MapPos {
    fn from(coord: geo::Coord<f64>) -> Self {
        MapPos::new(coord.x, coord.y)
    }
}

impl From<geo::Point<f64>> for MapPos {
    fn from(point: geo::Point<f64>) -> Self {
        MapPos::new(point.x(), point.y())
    }
}

/// A 3D axis-aligned bounding volume.
///
/// An empty volume has `min > max` on every axis (see [`MapBounds::empty`]),
/// so that the first `expand_to_contain` call snaps it onto the added data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub min: MapPos,
    pub max: MapPos,
}

impl MapBounds {
    /// Create bounds from two opposite corners, normalizing each axis.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapcluster_types::bounds::{MapBounds, MapPos};
    ///
    /// let b = MapBounds::new(MapPos::new(5.0, 0.0), MapPos::new(1.0, 2.0));
    /// assert_eq!(b.min, MapPos::new(1.0, 0.0));
    /// assert_eq!(b.max, MapPos::new(5.0, 2.0));
    /// ```
    pub fn new(a: MapPos, b: MapPos) -> Self {
        Self {
            min: MapPos::new_3d(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: MapPos::new_3d(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Degenerate bounds containing a single position.
    pub fn from_point(pos: MapPos) -> Self {
        Self { min: pos, max: pos }
    }

    /// The empty volume, which contains nothing and intersects nothing.
    pub const fn empty() -> Self {
        Self {
            min: MapPos::new_3d(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: MapPos::new_3d(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Whether this volume contains no points.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn center(&self) -> MapPos {
        (self.min + self.max) * 0.5
    }

    /// Per-axis extent.
    pub fn delta(&self) -> MapPos {
        self.max - self.min
    }

    /// Index of the axis with the largest extent (ties resolve to the lower axis).
    pub fn longest_axis(&self) -> usize {
        let delta = self.delta();
        let mut axis = 0;
        let mut biggest = delta.x;
        if delta.y > biggest {
            axis = 1;
            biggest = delta.y;
        }
        if delta.z > biggest {
            axis = 2;
        }
        axis
    }

    pub fn expand_to_contain(&mut self, pos: MapPos) {
        self.min = MapPos::new_3d(
            self.min.x.min(pos.x),
            self.min.y.min(pos.y),
            self.min.z.min(pos.z),
        );
        self.max = MapPos::new_3d(
            self.max.x.max(pos.x),
            self.max.y.max(pos.y),
            self.max.z.max(pos.z),
        );
    }

    pub fn expand_to_contain_bounds(&mut self, other: &MapBounds) {
        if other.is_empty() {
            return;
        }
        self.expand_to_contain(other.min);
        self.expand_to_contain(other.max);
    }

    /// Union of two volumes.
    pub fn union(&self, other: &MapBounds) -> MapBounds {
        let mut result = *self;
        result.expand_to_contain_bounds(other);
        result
    }

    /// Closed-interval intersection test on all three axes.
    pub fn intersects(&self, other: &MapBounds) -> bool {
        !(self.is_empty()
            || other.is_empty()
            || self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y
            || self.max.z < other.min.z
            || self.min.z > other.max.z)
    }

    pub fn contains_point(&self, pos: &MapPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// The eight corners of the volume.
    pub fn corners(&self) -> [MapPos; 8] {
        let (a, b) = (self.min, self.max);
        [
            MapPos::new_3d(a.x, a.y, a.z),
            MapPos::new_3d(b.x, a.y, a.z),
            MapPos::new_3d(a.x, b.y, a.z),
            MapPos::new_3d(b.x, b.y, a.z),
            MapPos::new_3d(a.x, a.y, b.z),
            MapPos::new_3d(b.x, a.y, b.z),
            MapPos::new_3d(a.x, b.y, b.z),
            MapPos::new_3d(b.x, b.y, b.z),
        ]
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bounds() {
        let empty = MapBounds::empty();
        assert!(empty.is_empty());
        assert!(!empty.intersects(&MapBounds::from_point(MapPos::new(0.0, 0.0))));
    }

    #[test]
    fn test_expand_from_empty() {
        let mut b = MapBounds::empty();
        b.expand_to_contain(MapPos::new(1.0, 2.0));
        b.expand_to_contain(MapPos::new(-1.0, 4.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, MapPos::new(-1.0, 2.0));
        assert_eq!(b.max, MapPos::new(1.0, 4.0));
        assert_eq!(b.center(), MapPos::new(0.0, 3.0));
    }

    #[test]
    fn test_intersects_touching_edges() {
        let a = MapBounds::new(MapPos::new(0.0, 0.0), MapPos::new(1.0, 1.0));
        let b = MapBounds::new(MapPos::new(1.0, 1.0), MapPos::new(2.0, 2.0));
        let c = MapBounds::new(MapPos::new(1.5, 1.5), MapPos::new(2.0, 2.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_longest_axis() {
        let wide = MapBounds::new(MapPos::new(0.0, 0.0), MapPos::new(10.0, 1.0));
        let tall = MapBounds::new(MapPos::new(0.0, 0.0), MapPos::new(1.0, 10.0));
        let deep = MapBounds::new(MapPos::new_3d(0.0, 0.0, 0.0), MapPos::new_3d(1.0, 1.0, 5.0));
        assert_eq!(wide.longest_axis(), 0);
        assert_eq!(tall.longest_axis(), 1);
        assert_eq!(deep.longest_axis(), 2);
    }

    #[test]
    fn test_union_ignores_empty() {
        let a = MapBounds::new(MapPos::new(0.0, 0.0), MapPos::new(1.0, 1.0));
        assert_eq!(a.union(&MapBounds::empty()), a);
    }
}

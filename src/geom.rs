//! Vector arithmetic and bounding volumes shared by the geometry modules.
//!
//! Points live in the fixed patient frame of the planning system, in
//! millimetres. Positions are [`Point3<f64>`] and directions are
//! [`Vector3<f64>`]; nalgebra supplies the arithmetic (add, subtract, scale,
//! dot, cross, normalize) and this module adds the handful of helpers the
//! collision engine needs on top of it:
//!
//! - [`Point3Extensions`]: epsilon equality and distance between points
//! - [`unit_direction`]: checked normalised axis between two points
//! - [`BoundingBox2D`] and [`AABB`]: quick-rejection boxes for slices and volumes

use nalgebra::{Point3, Vector3};
use serde::Serialize;

use crate::config::AXIS_LENGTH_THRESHOLD;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn unit_direction_of_coincident_points_is_none() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert!(unit_direction(&p, &p).is_none());
    }

    #[test]
    fn unit_direction_is_normalised() {
        let from = Point3::new(0.0, 0.0, 0.0);
        let to = Point3::new(0.0, 1000.0, 0.0);
        let dir = unit_direction(&from, &to).unwrap();
        assert!((dir.norm() - 1.0).abs() < 1e-12);
        assert!((dir.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn approx_eq_uses_per_axis_tolerance() {
        let a = Point3::new(1.0, 1.0, 1.0);
        let b = Point3::new(1.0 + 1e-10, 1.0, 1.0 - 1e-10);
        assert!(a.approx_eq(&b, 1e-9));
        assert!(!a.approx_eq(&Point3::new(1.1, 1.0, 1.0), 1e-9));
        assert!((a.distance_to(&Point3::new(4.0, 5.0, 1.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn empty_boxes_contain_nothing() {
        let bbox = AABB::empty();
        assert!(bbox.is_empty());
        assert!(!bbox.contains(&Point3::origin()));

        let rect = BoundingBox2D::empty();
        assert!(rect.is_empty());
        assert!(!rect.contains_xy(0.0, 0.0));
    }

    #[test]
    fn boxes_grow_to_fit_points() {
        let mut bbox = AABB::empty();
        bbox.expand_to(&Point3::new(-1.0, 2.0, 3.0));
        bbox.expand_to(&Point3::new(4.0, -5.0, 6.0));
        assert_eq!(bbox.min, Point3::new(-1.0, -5.0, 3.0));
        assert_eq!(bbox.max, Point3::new(4.0, 2.0, 6.0));
        assert!(bbox.contains(&Point3::new(0.0, 0.0, 4.0)));
        assert!(!bbox.contains(&Point3::new(0.0, 0.0, 7.0)));

        let rect = BoundingBox2D::from_points(&[Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 5.0, 0.0)]);
        assert_eq!(rect.width(), 10.0);
        assert_eq!(rect.height(), 5.0);
        assert!(rect.contains_xy(10.0, 5.0));
    }

    #[test]
    fn union_ignores_empty_box() {
        let mut a = AABB::empty();
        a.expand_to(&Point3::new(1.0, 1.0, 1.0));
        let b = AABB::empty();
        assert_eq!(a.union(&b), a);
    }
}

/// Extra point operations used throughout the collision engine.
pub trait Point3Extensions {
    /// Returns `true` if every coordinate differs by at most `eps`.
    fn approx_eq(&self, other: &Self, eps: f64) -> bool;
    /// Euclidean distance to another point.
    fn distance_to(&self, other: &Self) -> f64;
}

impl Point3Extensions for Point3<f64> {
    fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps
    }

    fn distance_to(&self, other: &Self) -> f64 {
        nalgebra::distance(self, other)
    }
}

/// Returns the unit vector pointing from `from` to `to`, or `None` if the
/// two points are too close to define a direction.
pub fn unit_direction(from: &Point3<f64>, to: &Point3<f64>) -> Option<Vector3<f64>> {
    (to - from).try_normalize(AXIS_LENGTH_THRESHOLD)
}

/// Represents a plane, defined by a normal and an offset value.
/// The plane is then defined by `normal . p + offset = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub offset: f64,
}

impl Plane {
    /// Plane through `point` with unit `normal`.
    pub fn through(point: &Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            offset: -normal.dot(&point.coords),
            normal,
        }
    }

    /// Signed distance from the plane, positive on the side the normal points to.
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) + self.offset
    }
}

/// Axis-aligned rectangle in the xy plane of an axial slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox2D {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox2D {
    /// A box with inverted infinite bounds. It contains nothing and grows to
    /// fit the first point added.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Smallest box holding the xy projection of `points`.
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        points.iter().fold(Self::empty(), |mut rect, p| {
            rect.expand_to(p.x, p.y);
            rect
        })
    }

    pub fn expand_to(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Inclusive containment test.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Axis-aligned bounding box for spatial acceleration structures.
///
/// Stores minimum and maximum coordinates along each axis, defining the
/// smallest box that completely contains a set of points. Used to reject
/// query points before running the per-slice polygon test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AABB {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl AABB {
    /// A box with inverted infinite bounds, see [`BoundingBox2D::empty`].
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn expand_to(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Smallest box holding both boxes.
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }
}

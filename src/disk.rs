//! Clearance disks swept along the beam axis.
//!
//! The treatment head is approximated by a flat disk of radius
//! [`DISK_RADIUS`] perpendicular to the isocenter to source axis, centred a
//! fixed distance from the isocenter towards the source. Its perimeter is
//! sampled at a caller-chosen resolution; those samples are what the body
//! model is tested against.

use nalgebra::{Point3, Vector3};
use serde::Serialize;

use crate::config::{AXIS_PARALLEL_THRESHOLD, DISK_RADIUS};
use crate::error::{GeometryError, Result};
use crate::geom::{unit_direction, Plane, Point3Extensions};


/// A flat circular proxy for the treatment head at one gantry pose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionDisk {
    pub center: Point3<f64>,
    /// Unit vector from the isocenter towards the source.
    pub axis: Vector3<f64>,
    /// Counter-clockwise samples of the rim, all at [`DISK_RADIUS`] from the centre.
    pub perimeter: Vec<Point3<f64>>,
}

impl CollisionDisk {
    pub fn radius(&self) -> f64 {
        DISK_RADIUS
    }

    /// The plane containing the disk.
    pub fn plane(&self) -> Plane {
        Plane::through(&self.center, self.axis)
    }

    /// Perimeter samples followed by the centre.
    pub fn sample_points(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.perimeter.iter().chain(std::iter::once(&self.center))
    }
}

/// Builds the clearance disk for one pose.
///
/// The centre is `offset` mm from `isocenter` along the isocenter to source
/// axis. `point_count` perimeter samples are placed at equal angular steps,
/// starting on the first in-plane basis vector.
pub fn build_disk(
    isocenter: &Point3<f64>,
    source: &Point3<f64>,
    offset: f64,
    point_count: usize,
) -> Result<CollisionDisk> {
    if point_count < 3 {
        return Err(GeometryError::InvalidArgument(format!(
            "a disk needs at least 3 perimeter points, got {}",
            point_count
        )));
    }
    if !offset.is_finite() {
        return Err(GeometryError::InvalidArgument(format!(
            "disk offset must be finite, got {}",
            offset
        )));
    }
    let axis = unit_direction(isocenter, source).ok_or_else(|| {
        GeometryError::DegenerateGeometry(format!(
            "isocenter {} and source {} coincide",
            isocenter, source
        ))
    })?;

    let center = isocenter + axis * offset;
    let (v1, v2) = perpendicular_frame(&axis);

    let perimeter = (0..point_count)
        .map(|i| {
            let theta = std::f64::consts::TAU * i as f64 / point_count as f64;
            center + v1 * (DISK_RADIUS * theta.cos()) + v2 * (DISK_RADIUS * theta.sin())
        })
        .collect();

    Ok(CollisionDisk {
        center,
        axis,
        perimeter,
    })
}

/// Orthonormal pair spanning the plane perpendicular to the unit vector `dir`.
fn perpendicular_frame(dir: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let up = if dir.z.abs() >= AXIS_PARALLEL_THRESHOLD {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let v1 = dir.cross(&up).normalize();
    let v2 = dir.cross(&v1).normalize();
    (v1, v2)
}

//! Point-in-volume testing against a structure snapshot.
//!
//! A point is inside the volume when the slice matching its z contains its
//! (x, y) projection. Slices are matched by z distance (see [`SliceMatch`]);
//! the 2D test is the even-odd ray-casting rule over the slice's outer loop.
//!
//! A point whose z matches no slice within tolerance is reported as
//! **outside**. This is the only case where missing data yields an answer
//! instead of an error, so callers screening near the ends of the scanned
//! region should make sure the structure covers the full range of the disk.
//!
//! All queries borrow the snapshot immutably and keep their state on the
//! stack, so they can run on any number of threads at once.
//!
//! # Key Components
//!
//! - [`is_point_in_polygon`]: even-odd test on a closed loop
//! - [`is_inside`], [`any_inside`], [`all_inside`]: volume queries
//! - [`SliceMatch`]: how a point's z is matched to a slice

use std::fmt;
use std::str::FromStr;

use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::RAY_CAST_EPSILON;
use crate::structure::{AxialSlice, SnapshotVolume};


/// How a query point's z is matched to a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SliceMatch {
    /// The slice closest in z, if it is within tolerance. Ties go to the
    /// lower slice. With a tolerance of half the slice spacing this is the
    /// half-spacing slab rule and every z maps to at most one slice.
    #[default]
    Nearest,
    /// The first slice in z order that is within tolerance. Faster to state
    /// but, when several slices qualify, biased towards the inferior one.
    FirstFound,
}

impl FromStr for SliceMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "nearest" | "slab" => Ok(SliceMatch::Nearest),
            "first_found" | "first" => Ok(SliceMatch::FirstFound),
            other => Err(format!(
                "unknown slice matching policy `{}`, expected `nearest` or `first_found`",
                other
            )),
        }
    }
}

impl TryFrom<String> for SliceMatch {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SliceMatch> for String {
    fn from(value: SliceMatch) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SliceMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceMatch::Nearest => write!(f, "nearest"),
            SliceMatch::FirstFound => write!(f, "first_found"),
        }
    }
}

/// Even-odd test of `(x, y)` against the closed loop `contour` (z ignored).
///
/// A horizontal ray towards +x toggles membership at each edge it crosses.
/// Edges are half-open in y, so a point on a left or bottom edge is inside
/// and a point on a right or top edge is outside. Loops with fewer than three
/// vertices contain nothing.
pub fn is_point_in_polygon(x: f64, y: f64, contour: &[Point3<f64>]) -> bool {
    let mut inside = false;
    if contour.len() < 3 {
        return inside;
    }
    let mut j = contour.len() - 1;
    for i in 0..contour.len() {
        let (xi, yi) = (contour[i].x, contour[i].y);
        let (xj, yj) = (contour[j].x, contour[j].y);
        if (yi > y) != (yj > y) {
            let dy = yj - yi;
            let dy = if dy.abs() < RAY_CAST_EPSILON {
                RAY_CAST_EPSILON.copysign(dy)
            } else {
                dy
            };
            let x_cross = (xj - xi) * (y - yi) / dy + xi;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Finds the slice for height `z` under `policy`, or `None` if no slice is
/// within `z_tolerance`.
pub fn find_slice(
    volume: &SnapshotVolume,
    z: f64,
    z_tolerance: f64,
    policy: SliceMatch,
) -> Option<&AxialSlice> {
    match policy {
        SliceMatch::FirstFound => volume
            .slices
            .iter()
            .find(|slice| (slice.z - z).abs() <= z_tolerance),
        SliceMatch::Nearest => {
            // slices are sorted by z, so the nearest is next to the insertion point
            let upper = volume.slices.partition_point(|slice| slice.z < z);
            let below = upper.checked_sub(1).map(|i| &volume.slices[i]);
            let above = volume.slices.get(upper);
            let nearest = match (below, above) {
                (Some(b), Some(a)) => {
                    if (z - b.z) <= (a.z - z) {
                        b
                    } else {
                        a
                    }
                }
                (Some(b), None) => b,
                (None, Some(a)) => a,
                (None, None) => return None,
            };
            ((nearest.z - z).abs() <= z_tolerance).then_some(nearest)
        }
    }
}

/// Tests one point, matching slices with [`SliceMatch::Nearest`].
///
/// Returns `false` if no slice lies within `z_tolerance` of the point.
pub fn is_inside(volume: &SnapshotVolume, point: &Point3<f64>, z_tolerance: f64) -> bool {
    is_inside_with(volume, point, z_tolerance, SliceMatch::Nearest)
}

/// Tests one point with an explicit slice matching policy.
pub fn is_inside_with(
    volume: &SnapshotVolume,
    point: &Point3<f64>,
    z_tolerance: f64,
    policy: SliceMatch,
) -> bool {
    let bounds = &volume.bounds;
    if bounds.is_empty()
        || point.x < bounds.min.x
        || point.x > bounds.max.x
        || point.y < bounds.min.y
        || point.y > bounds.max.y
        || point.z < bounds.min.z - z_tolerance
        || point.z > bounds.max.z + z_tolerance
    {
        return false;
    }
    match find_slice(volume, point.z, z_tolerance, policy) {
        Some(slice) if slice.bounds.contains_xy(point.x, point.y) => {
            is_point_in_polygon(point.x, point.y, &slice.contour)
        }
        _ => false,
    }
}

/// Returns `true` as soon as any point is inside. Points are scanned in
/// parallel, so which inside point ends the scan is unspecified.
pub fn any_inside(volume: &SnapshotVolume, points: &[Point3<f64>], z_tolerance: f64) -> bool {
    any_inside_with(volume, points, z_tolerance, SliceMatch::Nearest)
}

pub fn any_inside_with(
    volume: &SnapshotVolume,
    points: &[Point3<f64>],
    z_tolerance: f64,
    policy: SliceMatch,
) -> bool {
    points
        .par_iter()
        .any(|point| is_inside_with(volume, point, z_tolerance, policy))
}

/// Tests every point independently, in parallel. The result is in input order.
pub fn all_inside(volume: &SnapshotVolume, points: &[Point3<f64>], z_tolerance: f64) -> Vec<bool> {
    all_inside_with(volume, points, z_tolerance, SliceMatch::Nearest)
}

pub fn all_inside_with(
    volume: &SnapshotVolume,
    points: &[Point3<f64>],
    z_tolerance: f64,
    policy: SliceMatch,
) -> Vec<bool> {
    points
        .par_iter()
        .map(|point| is_inside_with(volume, point, z_tolerance, policy))
        .collect()
}

//! Axial-slice snapshots of a delineated structure.
//!
//! A structure (usually the patient's body outline) is delineated as one or
//! more closed loops on each CT slice. [`extract_snapshot`] keeps the outer
//! loop of every non-empty slice and precomputes bounding boxes, producing
//! an immutable [`SnapshotVolume`] that any number of threads may query.
//!
//! Inner loops (holes) are dropped. Air cavities inside the body therefore
//! count as inside; for head clearance that is the conservative answer.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use geo::Area;
use geo_types::{Coord, LineString, Polygon};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GeometryError, Result};
use crate::geom::{BoundingBox2D, AABB};


/// Source of per-slice contours of one structure.
///
/// `contours(i)` returns the closed loops on slice `i`, outer boundary first.
/// An empty list means the structure is absent from that slice.
pub trait ContourProvider {
    fn contours(&self, slice_index: usize) -> Vec<Vec<Point3<f64>>>;
}

impl<F> ContourProvider for F
where
    F: Fn(usize) -> Vec<Vec<Point3<f64>>>,
{
    fn contours(&self, slice_index: usize) -> Vec<Vec<Point3<f64>>> {
        self(slice_index)
    }
}

/// A structure exported to JSON, one list of loops per slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourFile {
    pub name: String,
    pub z_origin: f64,
    pub slice_thickness: f64,
    pub slices: Vec<Vec<Vec<Point3<f64>>>>,
}

impl ContourFile {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open contour file {}", path.display()))?;
        let contours: ContourFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse contour file {}", path.display()))?;
        debug!(
            "loaded structure {} with {} slices from {}",
            contours.name,
            contours.slices.len(),
            path.display()
        );
        Ok(contours)
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Extracts the snapshot covering every slice in the file.
    pub fn snapshot(&self) -> Result<SnapshotVolume> {
        extract_snapshot(self, self.z_origin, self.slice_count(), self.slice_thickness)
    }
}

impl ContourProvider for ContourFile {
    fn contours(&self, slice_index: usize) -> Vec<Vec<Point3<f64>>> {
        self.slices.get(slice_index).cloned().unwrap_or_default()
    }
}

/// Outer contour of a structure on one CT slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxialSlice {
    pub z: f64,
    pub contour: Vec<Point3<f64>>,
    pub bounds: BoundingBox2D,
}

/// Immutable slice stack of one structure, ordered by increasing z.
///
/// Built once by [`extract_snapshot`] and never modified, so it can be
/// shared by reference across threads without locking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotVolume {
    pub slices: Vec<AxialSlice>,
    pub slice_thickness: f64,
    pub bounds: AABB,
}

impl SnapshotVolume {
    /// Half the slice spacing: the z tolerance at which every point between
    /// the first and last slice maps to exactly one slab.
    pub fn slab_tolerance(&self) -> f64 {
        self.slice_thickness / 2.0
    }

    /// The outer contour of slice `index` as a closed 2D polygon.
    pub fn slice_polygon(&self, index: usize) -> Option<Polygon<f64>> {
        self.slices.get(index).map(|slice| {
            let exterior: Vec<Coord<f64>> = slice
                .contour
                .iter()
                .map(|p| Coord { x: p.x, y: p.y })
                .collect();
            Polygon::new(LineString::from(exterior), vec![])
        })
    }

    /// Total area enclosed by all slice outlines, in mm².
    pub fn outline_area(&self) -> f64 {
        (0..self.slices.len())
            .filter_map(|i| self.slice_polygon(i))
            .map(|polygon| polygon.unsigned_area())
            .sum()
    }
}

/// Builds the snapshot of a structure over `z_count` slices starting at
/// `z_origin` and spaced `slice_thickness` apart.
///
/// Slices without contours are left out. Only the first loop of a slice is
/// kept. Bounding boxes are computed from the retained loops, never taken
/// from the data source.
pub fn extract_snapshot<P: ContourProvider + ?Sized>(
    provider: &P,
    z_origin: f64,
    z_count: usize,
    slice_thickness: f64,
) -> Result<SnapshotVolume> {
    if !(slice_thickness.is_finite() && slice_thickness > 0.0) {
        return Err(GeometryError::InvalidArgument(format!(
            "slice thickness must be positive, got {}",
            slice_thickness
        )));
    }

    let mut slices = Vec::new();
    let mut bounds = AABB::empty();
    let mut dropped_loops = 0;

    for index in 0..z_count {
        let mut loops = provider.contours(index).into_iter();
        let Some(contour) = loops.next().filter(|outer| !outer.is_empty()) else {
            continue;
        };
        dropped_loops += loops.count();

        let z = z_origin + index as f64 * slice_thickness;
        let rect = BoundingBox2D::from_points(&contour);
        bounds.expand_to(&Point3::new(rect.min_x, rect.min_y, z));
        bounds.expand_to(&Point3::new(rect.max_x, rect.max_y, z));

        slices.push(AxialSlice {
            z,
            contour,
            bounds: rect,
        });
    }

    debug!(
        "extracted {} of {} slices ({} inner loops dropped)",
        slices.len(),
        z_count,
        dropped_loops
    );

    Ok(SnapshotVolume {
        slices,
        slice_thickness,
        bounds,
    })
}

//! Beam poses along an arc and the arc-to-disks pipeline.
//!
//! Where the source sits at a given gantry angle is decided by the planning
//! system, not by this crate. It is supplied through a [`PoseProvider`] (or
//! directly as a closure to [`build_disks_for_arc`]). [`IsocentricGantry`]
//! is a reference provider for an ideal isocentric machine.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::disk::{build_disk, CollisionDisk};
use crate::error::Result;
use crate::orientation::{sample_angles, GantryArc};

#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::DISK_RADIUS;
    use crate::geom::Point3Extensions;
    use crate::orientation::ArcDirection;

    #[test]
    fn isocentric_gantry_cardinal_angles() {
        let gantry = IsocentricGantry::new(1000.0);
        let beam = BeamSpec::new("B1", GantryArc::fixed(0.0), Point3::new(10.0, 20.0, 30.0));
        let cases = [
            (0.0, Point3::new(10.0, -980.0, 30.0)),
            (90.0, Point3::new(1010.0, 20.0, 30.0)),
            (180.0, Point3::new(10.0, 1020.0, 30.0)),
            (270.0, Point3::new(-990.0, 20.0, 30.0)),
        ];
        for (angle, expected) in cases {
            let (iso, source) = gantry.pose(&beam, angle);
            assert_eq!(iso, Point3::new(10.0, 20.0, 30.0));
            assert!(source.approx_eq(&expected, 1e-9), "{}: {}", angle, source);
        }
    }

    #[test]
    fn disks_follow_sampled_angle_order() {
        let gantry = IsocentricGantry::new(1000.0);
        let arc = GantryArc::new(350.0, 10.0, ArcDirection::Clockwise);
        let disks = build_disks_for_arc(
            &arc,
            |a| (Point3::origin(), gantry.source_at(&Point3::origin(), a)),
            5.0,
            400.0,
            8,
        )
        .unwrap();
        assert_eq!(disks.len(), 5);

        let expected_angles = [350.0_f64, 355.0, 0.0, 5.0, 10.0];
        for (disk, angle) in disks.iter().zip(expected_angles) {
            let t = angle.to_radians();
            let center = Point3::new(400.0 * t.sin(), -400.0 * t.cos(), 0.0);
            assert!(disk.center.approx_eq(&center, 1e-9));
            assert_eq!(disk.perimeter.len(), 8);
        }
    }

    #[test]
    fn sampled_poses_share_isocenter() {
        let iso = Point3::new(0.0, 5.0, -3.0);
        let beam = BeamSpec::new(
            "B1",
            GantryArc::new(100.0, 60.0, ArcDirection::CounterClockwise),
            iso,
        );
        let gantry = IsocentricGantry::new(1000.0);
        let poses = sample_poses(&beam.arc, |a| gantry.pose(&beam, a), 10.0).unwrap();
        assert_eq!(poses.first().unwrap().angle, 100.0);
        assert_eq!(poses.last().unwrap().angle, 60.0);
        assert!(poses.iter().all(|p| p.isocenter == iso));
        assert!(poses
            .iter()
            .all(|p| (p.source.distance_to(&iso) - 1000.0).abs() < 1e-9));
    }

    #[test]
    fn degenerate_pose_is_reported() {
        let arc = GantryArc::fixed(0.0);
        let result = build_disks_for_arc(
            &arc,
            |_| (Point3::origin(), Point3::origin()),
            1.0,
            400.0,
            8,
        );
        assert!(result.is_err());
    }

    #[test]
    fn beam_disks_use_fixed_radius() {
        let beam = BeamSpec::new(
            "Arc1",
            GantryArc::new(181.0, 179.0, ArcDirection::Clockwise),
            Point3::origin(),
        );
        let gantry = IsocentricGantry::new(1000.0);
        let disks = beam.disks(&gantry, 30.0, 400.0, 16).unwrap();
        assert_eq!(disks.len(), 13);
        for disk in &disks {
            for p in &disk.perimeter {
                assert!((p.distance_to(&disk.center) - DISK_RADIUS).abs() < 1e-9);
            }
        }
    }
}

/// Maps a beam and gantry angle to its `(isocenter, source)` positions.
///
/// Implementations must be callable from many worker threads at once.
pub trait PoseProvider: Sync {
    fn pose(&self, beam: &BeamSpec, gantry_angle: f64) -> (Point3<f64>, Point3<f64>);
}

/// Source and isocenter at one sampled gantry angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampledPose {
    pub isocenter: Point3<f64>,
    pub source: Point3<f64>,
    pub angle: f64,
}

/// Ideal isocentric gantry for a head-first-supine patient with the couch at 0°.
///
/// In the patient frame (x towards patient left, y posterior, z superior)
/// gantry 0° puts the source anterior of the isocenter and gantry 90° on the
/// patient's left; the source circles each beam's isocenter in the
/// transverse plane at `source_axis_distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsocentricGantry {
    pub source_axis_distance: f64,
}

impl IsocentricGantry {
    pub fn new(source_axis_distance: f64) -> Self {
        Self {
            source_axis_distance,
        }
    }

    pub fn source_at(&self, isocenter: &Point3<f64>, gantry_angle: f64) -> Point3<f64> {
        let (sin, cos) = gantry_angle.to_radians().sin_cos();
        isocenter + Vector3::new(sin, -cos, 0.0) * self.source_axis_distance
    }
}

impl PoseProvider for IsocentricGantry {
    fn pose(&self, beam: &BeamSpec, gantry_angle: f64) -> (Point3<f64>, Point3<f64>) {
        (beam.isocenter, self.source_at(&beam.isocenter, gantry_angle))
    }
}

/// One beam to screen: its identifier, arc and isocenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSpec {
    pub id: String,
    pub arc: GantryArc,
    pub isocenter: Point3<f64>,
}

impl BeamSpec {
    pub fn new(id: impl Into<String>, arc: GantryArc, isocenter: Point3<f64>) -> Self {
        Self {
            id: id.into(),
            arc,
            isocenter,
        }
    }

    /// Clearance disks for this beam, poses resolved through `provider`.
    pub fn disks<P: PoseProvider + ?Sized>(
        &self,
        provider: &P,
        step: f64,
        offset: f64,
        point_count: usize,
    ) -> Result<Vec<CollisionDisk>> {
        build_disks_for_arc(
            &self.arc,
            |angle| provider.pose(self, angle),
            step,
            offset,
            point_count,
        )
    }
}

/// Resolves the pose at every sampled angle of `arc`, in delivery order.
pub fn sample_poses<F>(arc: &GantryArc, resolve_pose: F, step: f64) -> Result<Vec<SampledPose>>
where
    F: Fn(f64) -> (Point3<f64>, Point3<f64>),
{
    Ok(sample_angles(arc, step)?
        .into_iter()
        .map(|angle| {
            let (isocenter, source) = resolve_pose(angle);
            SampledPose {
                isocenter,
                source,
                angle,
            }
        })
        .collect())
}

/// Builds one clearance disk per sampled angle of `arc`.
///
/// The disks are returned in the same order as the sampled angles, which is
/// the order the gantry passes through them during delivery.
pub fn build_disks_for_arc<F>(
    arc: &GantryArc,
    resolve_pose: F,
    step: f64,
    offset: f64,
    point_count: usize,
) -> Result<Vec<CollisionDisk>>
where
    F: Fn(f64) -> (Point3<f64>, Point3<f64>),
{
    sample_poses(arc, resolve_pose, step)?
        .iter()
        .map(|pose| build_disk(&pose.isocenter, &pose.source, offset, point_count))
        .collect()
}

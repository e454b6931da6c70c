//! Collision screening of whole arcs against a structure snapshot.
//!
//! This module joins the two halves of the engine: gantry angles are sampled
//! and turned into clearance disks, and every disk is tested against the
//! body snapshot. A pose collides when any rim sample (or the centre) of its
//! disk lies inside the structure.
//!
//! Beams are screened one after another with a progress bar; the poses of a
//! beam and the points of each disk are tested in parallel with rayon.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::beam::{sample_poses, BeamSpec, PoseProvider};
use crate::containment::{all_inside_with, SliceMatch};
use crate::disk::{build_disk, CollisionDisk};
use crate::error::Result;
use crate::result::{ArcClearance, PoseClearance, ScreeningReport};
use crate::structure::SnapshotVolume;


/// Parameters of one screening pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningOptions {
    /// Gantry angle increment in degrees.
    pub angle_step: f64,
    /// Distance from the isocenter to the disk centre, towards the source, in mm.
    pub disk_offset: f64,
    pub perimeter_points: usize,
    /// Maximum z distance between a sample and the slice it is tested on, in mm.
    pub z_tolerance: f64,
    pub slice_match: SliceMatch,
}

/// Screens beams against one structure snapshot.
pub struct ScreeningPass<'a> {
    pub snapshot: &'a SnapshotVolume,
    pub options: ScreeningOptions,
}

impl<'a> ScreeningPass<'a> {
    pub fn new(snapshot: &'a SnapshotVolume, options: ScreeningOptions) -> Self {
        Self { snapshot, options }
    }

    /// Screens every beam and collects the results into a report.
    ///
    /// A beam that cannot be screened is logged and reported with its error;
    /// the remaining beams are still processed.
    pub fn run<P: PoseProvider + ?Sized>(
        &self,
        structure: &str,
        beams: &[BeamSpec],
        provider: &P,
    ) -> ScreeningReport {
        let start = Instant::now();
        info!("Screening {} beams against {}...", beams.len(), structure);

        let pb = ProgressBar::new(beams.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg}",
        ) {
            pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
        }

        let results: Vec<ArcClearance> = beams
            .iter()
            .map(|beam| {
                pb.set_message(beam.id.clone());
                let result = self.screen_beam(beam, provider);
                pb.inc(1);
                result
            })
            .collect();
        pb.finish_and_clear();

        let report = ScreeningReport::new(structure, results);
        info!(
            "Screened {} gantry angles in {:.2?}, {} of {} beams collide",
            report.angles_checked.len(),
            start.elapsed(),
            report.colliding_beams().len(),
            report.beams.len()
        );
        report
    }

    /// Screens one beam. Geometry errors end up in [`ArcClearance::error`].
    pub fn screen_beam<P: PoseProvider + ?Sized>(
        &self,
        beam: &BeamSpec,
        provider: &P,
    ) -> ArcClearance {
        let mut clearance = ArcClearance::new(&beam.id, &beam.arc);
        match self.try_screen_beam(beam, provider) {
            Ok(poses) => {
                clearance.poses = poses;
                match clearance.first_collision() {
                    Some(pose) => warn!(
                        "beam {}: head reaches the structure at gantry {:.1}° ({} of {} poses collide)",
                        beam.id,
                        pose.angle,
                        clearance.colliding_angles().len(),
                        clearance.poses.len()
                    ),
                    None => info!("beam {}: clear at all {} poses", beam.id, clearance.poses.len()),
                }
            }
            Err(e) => {
                warn!("beam {}: could not be screened: {}", beam.id, e);
                clearance.error = Some(e.to_string());
            }
        }
        clearance
    }

    fn try_screen_beam<P: PoseProvider + ?Sized>(
        &self,
        beam: &BeamSpec,
        provider: &P,
    ) -> Result<Vec<PoseClearance>> {
        let opts = &self.options;
        let poses = sample_poses(&beam.arc, |angle| provider.pose(beam, angle), opts.angle_step)?;
        let disks = poses
            .iter()
            .map(|pose| {
                build_disk(
                    &pose.isocenter,
                    &pose.source,
                    opts.disk_offset,
                    opts.perimeter_points,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("beam {}: built {} disks", beam.id, disks.len());

        Ok(poses
            .par_iter()
            .zip(disks.par_iter())
            .map(|(pose, disk)| self.screen_disk(pose.angle, disk))
            .collect())
    }

    /// Tests the rim samples and centre of one disk against the snapshot.
    pub fn screen_disk(&self, angle: f64, disk: &CollisionDisk) -> PoseClearance {
        let points: Vec<Point3<f64>> = disk.sample_points().copied().collect();
        let points_inside = all_inside_with(
            self.snapshot,
            &points,
            self.options.z_tolerance,
            self.options.slice_match,
        )
        .into_iter()
        .filter(|&inside| inside)
        .count();

        PoseClearance {
            angle,
            center: disk.center,
            points_inside,
            collides: points_inside > 0,
        }
    }
}

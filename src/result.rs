use nalgebra::Point3;
use serde::Serialize;

use crate::orientation::{merge_angle_sets, ArcDirection, GantryArc};


/// Clearance of the head at one sampled gantry angle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseClearance {
    pub angle: f64,
    pub center: Point3<f64>,
    /// Number of disk samples (rim and centre) inside the structure.
    pub points_inside: usize,
    pub collides: bool,
}

/// Screening outcome for one beam, poses in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcClearance {
    pub beam_id: String,
    pub direction: ArcDirection,
    pub start_angle: f64,
    pub stop_angle: f64,
    pub poses: Vec<PoseClearance>,
    /// Set when the beam could not be screened; `poses` is then empty.
    pub error: Option<String>,
}

impl ArcClearance {
    pub fn new(beam_id: &str, arc: &GantryArc) -> Self {
        Self {
            beam_id: beam_id.to_string(),
            direction: arc.direction,
            start_angle: arc.start_angle,
            stop_angle: arc.stop_angle,
            poses: Vec::new(),
            error: None,
        }
    }

    pub fn collides(&self) -> bool {
        self.poses.iter().any(|pose| pose.collides)
    }

    /// The first pose, in delivery order, at which the head hits the structure.
    pub fn first_collision(&self) -> Option<&PoseClearance> {
        self.poses.iter().find(|pose| pose.collides)
    }

    pub fn colliding_angles(&self) -> Vec<f64> {
        self.poses
            .iter()
            .filter(|pose| pose.collides)
            .map(|pose| pose.angle)
            .collect()
    }

    pub fn angles(&self) -> Vec<f64> {
        self.poses.iter().map(|pose| pose.angle).collect()
    }
}

/// Results of one screening pass over all beams.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningReport {
    pub structure: String,
    pub generated_at: String,
    pub beams: Vec<ArcClearance>,
    /// Every distinct gantry angle checked by any beam, ascending.
    pub angles_checked: Vec<f64>,
}

impl ScreeningReport {
    pub fn new(structure: &str, beams: Vec<ArcClearance>) -> Self {
        let angle_sets: Vec<Vec<f64>> = beams.iter().map(|beam| beam.angles()).collect();
        let angles_checked = merge_angle_sets(angle_sets.iter().map(|set| set.as_slice()));
        Self {
            structure: structure.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            beams,
            angles_checked,
        }
    }

    pub fn colliding_beams(&self) -> Vec<&str> {
        self.beams
            .iter()
            .filter(|beam| beam.collides())
            .map(|beam| beam.beam_id.as_str())
            .collect()
    }
}

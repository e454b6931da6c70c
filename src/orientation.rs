//! Gantry arcs and their discretisation into sampled gantry angles.
//!
//! An arc is delivered while the gantry rotates from a start to a stop
//! angle. Collision screening checks the machine head at a finite set of
//! poses along that rotation; this module produces them.
//!
//! Intermediate angles sit on a fixed grid anchored at 0° (multiples of the
//! step), never on a grid anchored at the arc start. Angle sets from
//! different arcs sampled with the same step therefore share their interior
//! angles and can be merged with [`merge_angle_sets`]. The exact start and
//! stop angles are always included as the first and last samples.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ANGLE_EPSILON, FULL_CIRCLE, MAX_SAMPLES_PER_CIRCLE};
use crate::error::{GeometryError, Result};

#[cfg(test)]
mod tests {

    use super::*;

    fn assert_angles(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "got {:?}", actual);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "got {:?}, expected {:?}", actual, expected);
        }
    }

    #[test]
    fn static_beam_is_single_pose() {
        let arc = GantryArc::new(45.0, 45.0, ArcDirection::None);
        assert_eq!(sample_angles(&arc, 2.0).unwrap(), vec![45.0]);
    }

    #[test]
    fn clockwise_arc_snaps_to_zero_based_grid() {
        let arc = GantryArc::new(181.0, 190.0, ArcDirection::Clockwise);
        let angles = sample_angles(&arc, 4.0).unwrap();
        assert_angles(&angles, &[181.0, 184.0, 188.0, 190.0]);
    }

    #[test]
    fn clockwise_arc_on_grid_has_no_duplicate_endpoints() {
        let arc = GantryArc::new(10.0, 30.0, ArcDirection::Clockwise);
        let angles = sample_angles(&arc, 10.0).unwrap();
        assert_angles(&angles, &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn clockwise_arc_through_zero_wraps() {
        let arc = GantryArc::new(350.0, 10.0, ArcDirection::Clockwise);
        let angles = sample_angles(&arc, 5.0).unwrap();
        assert_angles(&angles, &[350.0, 355.0, 0.0, 5.0, 10.0]);
    }

    #[test]
    fn clockwise_arc_ending_at_zero() {
        let arc = GantryArc::new(340.0, 0.0, ArcDirection::Clockwise);
        let angles = sample_angles(&arc, 10.0).unwrap();
        assert_angles(&angles, &[340.0, 350.0, 0.0]);
    }

    #[test]
    fn counter_clockwise_arc_runs_in_delivery_order() {
        let arc = GantryArc::new(30.0, 350.0, ArcDirection::CounterClockwise);
        let angles = sample_angles(&arc, 10.0).unwrap();
        assert_angles(&angles, &[30.0, 20.0, 10.0, 0.0, 350.0]);
    }

    #[test]
    fn counter_clockwise_arc_off_grid() {
        let arc = GantryArc::new(179.0, 171.5, ArcDirection::CounterClockwise);
        let angles = sample_angles(&arc, 5.0).unwrap();
        assert_angles(&angles, &[179.0, 175.0, 171.5]);
    }

    #[test]
    fn full_circle_arc_is_single_pose() {
        let arc = GantryArc::new(180.0, 180.0, ArcDirection::Clockwise);
        assert_eq!(sample_angles(&arc, 1.0).unwrap(), vec![180.0]);
        let arc = GantryArc::new(0.0, 360.0, ArcDirection::CounterClockwise);
        assert_eq!(sample_angles(&arc, 1.0).unwrap(), vec![0.0]);
    }

    #[test]
    fn unnormalised_angles_are_wrapped() {
        let arc = GantryArc::new(-10.0, 370.0, ArcDirection::Clockwise);
        let angles = sample_angles(&arc, 10.0).unwrap();
        assert_angles(&angles, &[350.0, 0.0, 10.0]);
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let arc = GantryArc::new(0.0, 90.0, ArcDirection::Clockwise);
        assert!(matches!(
            sample_angles(&arc, 0.0),
            Err(GeometryError::InvalidArgument(_))
        ));
        assert!(matches!(
            sample_angles(&arc, -1.0),
            Err(GeometryError::InvalidArgument(_))
        ));
        assert!(matches!(
            sample_angles(&arc, f64::NAN),
            Err(GeometryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn tiny_step_is_rejected() {
        let arc = GantryArc::new(0.0, 10.0, ArcDirection::Clockwise);
        assert!(matches!(
            sample_angles(&arc, 1e-300),
            Err(GeometryError::InvalidArgument(_))
        ));
        assert!(matches!(
            sample_angles(&arc, f64::MIN_POSITIVE),
            Err(GeometryError::InvalidArgument(_))
        ));
        let fine = GantryArc::new(0.0, 1e-3, ArcDirection::Clockwise);
        let angles = sample_angles(&fine, 1e-4).unwrap();
        assert_eq!(angles.first(), Some(&0.0));
        assert_eq!(angles.last(), Some(&1e-3));
    }

    #[test]
    fn unwrapped_samples_increase_along_travel() {
        let arc = GantryArc::new(181.0, 179.0, ArcDirection::Clockwise);
        let angles = sample_angles(&arc, 2.0).unwrap();
        assert_eq!(angles.first(), Some(&181.0));
        assert_eq!(angles.last(), Some(&179.0));
        let unwrapped = unwrap_clockwise(&angles);
        assert!(unwrapped.iter().tuple_windows().all(|(a, b)| b - a > ANGLE_EPSILON));
        assert!((unwrapped.last().unwrap() - unwrapped[0] - 358.0).abs() < 1e-9);
    }

    #[test]
    fn directions_parse_from_planning_names() {
        assert_eq!("CW".parse::<ArcDirection>().unwrap(), ArcDirection::Clockwise);
        assert_eq!("cc".parse::<ArcDirection>().unwrap(), ArcDirection::CounterClockwise);
        assert_eq!(
            "CounterClockwise".parse::<ArcDirection>().unwrap(),
            ArcDirection::CounterClockwise
        );
        assert_eq!("None".parse::<ArcDirection>().unwrap(), ArcDirection::None);
        assert_eq!(
            "sideways".parse::<ArcDirection>(),
            Err(GeometryError::UnsupportedDirection("sideways".to_string()))
        );
    }

    #[test]
    fn merged_sets_are_sorted_and_unique() {
        let a = sample_angles(&GantryArc::new(350.0, 10.0, ArcDirection::Clockwise), 5.0).unwrap();
        let b = sample_angles(&GantryArc::new(12.0, 0.0, ArcDirection::CounterClockwise), 5.0)
            .unwrap();
        let merged = merge_angle_sets([a.as_slice(), b.as_slice()]);
        assert_angles(&merged, &[0.0, 5.0, 10.0, 12.0, 350.0, 355.0]);
    }

    fn unwrap_clockwise(angles: &[f64]) -> Vec<f64> {
        let mut turns = 0.0;
        let mut out = Vec::with_capacity(angles.len());
        for (i, a) in angles.iter().enumerate() {
            if i > 0 && *a < angles[i - 1] {
                turns += FULL_CIRCLE;
            }
            out.push(a + turns);
        }
        out
    }
}

/// Rotation sense of the gantry during delivery.
///
/// Clockwise means increasing gantry angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArcDirection {
    /// Static beam, delivered at a single gantry angle.
    None,
    Clockwise,
    CounterClockwise,
}

impl FromStr for ArcDirection {
    type Err = GeometryError;

    /// Parses the direction names used by planning systems (`NONE`, `CW`,
    /// `CC`/`CCW`) as well as the long names.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "static" => Ok(ArcDirection::None),
            "cw" | "clockwise" => Ok(ArcDirection::Clockwise),
            "cc" | "ccw" | "counterclockwise" | "counter_clockwise" => {
                Ok(ArcDirection::CounterClockwise)
            }
            _ => Err(GeometryError::UnsupportedDirection(s.to_string())),
        }
    }
}

impl TryFrom<String> for ArcDirection {
    type Error = GeometryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ArcDirection> for String {
    fn from(value: ArcDirection) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ArcDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArcDirection::None => write!(f, "NONE"),
            ArcDirection::Clockwise => write!(f, "CW"),
            ArcDirection::CounterClockwise => write!(f, "CC"),
        }
    }
}

/// A gantry rotation between two angles in degrees.
///
/// For a static beam (`direction == None`) the stop angle equals the start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GantryArc {
    pub start_angle: f64,
    pub stop_angle: f64,
    pub direction: ArcDirection,
}

impl GantryArc {
    pub fn new(start_angle: f64, stop_angle: f64, direction: ArcDirection) -> Self {
        Self {
            start_angle,
            stop_angle,
            direction,
        }
    }

    /// A non-rotating beam at `angle`.
    pub fn fixed(angle: f64) -> Self {
        Self::new(angle, angle, ArcDirection::None)
    }
}

/// Maps any finite angle in degrees into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let norm = angle.rem_euclid(FULL_CIRCLE);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if norm >= FULL_CIRCLE - ANGLE_EPSILON {
        0.0
    } else {
        norm
    }
}

/// Returns the gantry angles at which the arc is checked, in delivery order.
///
/// The first sample is the exact (normalised) start angle and the last the
/// exact stop angle. Between them the samples are the multiples of `step`
/// passed on the way, so an arc crossing 0° yields `..., 355, 0, 5, ...`.
/// An arc whose start and stop coincide is treated as a single static pose.
pub fn sample_angles(arc: &GantryArc, step: f64) -> Result<Vec<f64>> {
    if !(step.is_finite() && step > 0.0) {
        return Err(GeometryError::InvalidArgument(format!(
            "angle step must be positive, got {}",
            step
        )));
    }
    if FULL_CIRCLE / step > MAX_SAMPLES_PER_CIRCLE {
        return Err(GeometryError::InvalidArgument(format!(
            "angle step {} gives more than {} samples per revolution",
            step, MAX_SAMPLES_PER_CIRCLE
        )));
    }

    let (start, stop) = match arc.direction {
        ArcDirection::None => {
            if (arc.start_angle - arc.stop_angle).abs() > ANGLE_EPSILON {
                warn!(
                    "static beam has start {} and stop {}, using the start angle",
                    arc.start_angle, arc.stop_angle
                );
            }
            return Ok(vec![arc.start_angle]);
        }
        ArcDirection::Clockwise => (arc.start_angle, arc.stop_angle),
        // sample the mirrored clockwise traversal, reversed below
        ArcDirection::CounterClockwise => (arc.stop_angle, arc.start_angle),
    };
    let start = normalize_angle(start);
    let stop = normalize_angle(stop);

    if (start - stop).abs() <= ANGLE_EPSILON {
        warn!(
            "arc from {} to {} has no extent, treating it as a single pose",
            arc.start_angle, arc.stop_angle
        );
        return Ok(vec![normalize_angle(arc.start_angle)]);
    }

    let mut angles = if start < stop {
        clockwise_run(start, stop, step)
    } else {
        // crosses 0°: [start, 360) followed by [0, stop]
        let mut head = clockwise_run(start, FULL_CIRCLE, step);
        head.pop();
        let mut tail = grid_between(0.0, stop, step, true);
        tail.push(stop);
        head.extend(tail);
        head
    };
    angles.dedup_by(|a, b| (*a - *b).abs() <= ANGLE_EPSILON);

    if arc.direction == ArcDirection::CounterClockwise {
        angles.reverse();
    }

    debug!(
        "sampled {} angles for {} arc {} -> {}",
        angles.len(),
        arc.direction,
        arc.start_angle,
        arc.stop_angle
    );
    Ok(angles)
}

/// `[start, grid..., stop]` for `start < stop`.
fn clockwise_run(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let mut run = Vec::with_capacity((((stop - start) / step) as usize).saturating_add(2));
    run.push(start);
    run.extend(grid_between(start, stop, step, false));
    run.push(stop);
    run
}

/// Multiples of `step` strictly between `lo` and `hi` (more than
/// `ANGLE_EPSILON` away from either end). With `include_lo` a grid point
/// sitting on `lo` is kept.
fn grid_between(lo: f64, hi: f64, step: f64, include_lo: bool) -> Vec<f64> {
    let first = if include_lo { lo - ANGLE_EPSILON } else { lo + ANGLE_EPSILON };
    let mut k = (first / step).ceil() as i64;
    let mut grid = Vec::new();
    loop {
        // multiply rather than accumulate so every arc lands on the same grid
        let angle = k as f64 * step;
        if angle >= hi - ANGLE_EPSILON {
            break;
        }
        grid.push(angle);
        k += 1;
    }
    grid
}

/// Union of several angle sets, sorted ascending and deduplicated within
/// `ANGLE_EPSILON`. Angles are normalised into `[0, 360)` first.
pub fn merge_angle_sets<'a, I>(sets: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut merged: Vec<f64> = sets
        .into_iter()
        .flat_map(|set| set.iter().copied().map(normalize_angle))
        .sorted_by(|a, b| a.total_cmp(b))
        .collect();
    merged.dedup_by(|a, b| (*a - *b).abs() <= ANGLE_EPSILON);
    merged
}

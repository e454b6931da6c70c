//! Gantry head collision screening for rotational radiotherapy deliveries.
//!
//! The treatment head is modelled as a disk perpendicular to the beam axis,
//! placed between the isocenter and the source. For every sampled gantry
//! angle of an arc the disk is built and its rim is tested against an axial
//! slice snapshot of the patient outline.
//!
//! Key Components:
//! - [`orientation`]: gantry arcs and angle sampling.
//! - [`disk`]: clearance disk construction.
//! - [`beam`]: beam definitions and source positions.
//! - [`structure`]: contour loading and slice snapshots.
//! - [`containment`]: point-in-structure tests.
//! - [`screening`]: the screening pass over all beams.

pub mod beam;
pub mod config;
pub mod containment;
pub mod disk;
pub mod error;
pub mod geom;
pub mod orientation;
pub mod output;
pub mod result;
pub mod screening;
pub mod settings;
pub mod structure;

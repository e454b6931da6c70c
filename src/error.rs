//! Failure kinds of the geometric core.
//!
//! Every constructor in the crate reports bad input through [`GeometryError`]
//! instead of panicking, so batch and parallel callers can keep processing
//! the remaining beams or points.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A numeric argument is outside its allowed range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The inputs do not define a usable frame, e.g. coincident isocenter and source.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    /// An arc direction that is not one of none, clockwise or counter-clockwise.
    #[error("unsupported arc direction `{0}`")]
    UnsupportedDirection(String),
}

pub type Result<T> = std::result::Result<T, GeometryError>;

/// Radius of the gantry-head clearance disk in millimetres.
pub const DISK_RADIUS: f64 = 390.0;
/// Two gantry angles closer than this (in degrees) are the same angle.
pub const ANGLE_EPSILON: f64 = 1e-6;
/// Full gantry revolution in degrees.
pub const FULL_CIRCLE: f64 = 360.0;
/// Upper bound on the gantry angles sampled over one revolution.
pub const MAX_SAMPLES_PER_CIRCLE: f64 = 1e7;
/// Minimum edge height in the ray-casting test, used to avoid divide by zero errors.
pub const RAY_CAST_EPSILON: f64 = 1e-12;
/// Above this |z| component the beam axis is too close to the patient axis to
/// use it as the "up" reference when building a disk frame.
pub const AXIS_PARALLEL_THRESHOLD: f64 = 0.99;
/// Minimum isocenter to source distance (in mm) to be considered non-degenerate.
pub const AXIS_LENGTH_THRESHOLD: f64 = 1e-9;
/// Tolerance for comparing points in millimetres.
pub const POINT_EPSILON: f64 = 1e-9;

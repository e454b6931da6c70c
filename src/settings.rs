use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::beam::BeamSpec;
use crate::containment::SliceMatch;
use crate::orientation::{ArcDirection, GantryArc};
use crate::screening::ScreeningOptions;
use crate::structure::SnapshotVolume;

#[cfg(test)]
mod tests {

    use super::*;

    fn settings() -> Settings {
        Settings {
            structure_file: "data/body.json".to_string(),
            angle_step: 2.0,
            disk_offset: 400.0,
            perimeter_points: 72,
            source_axis_distance: 1000.0,
            z_tolerance: None,
            slice_match: SliceMatch::Nearest,
            output_dir: "output".to_string(),
            beams: vec![BeamConfig {
                id: "Arc1".to_string(),
                start_angle: 181.0,
                stop_angle: 179.0,
                direction: ArcDirection::Clockwise,
                isocenter: [0.0, 10.0, -5.0],
            }],
        }
    }

    #[test]
    fn default_config_loads() {
        let settings = load_default_config().unwrap();
        assert!(settings.angle_step > 0.0);
        assert!(!settings.beams.is_empty());
        assert!(Path::new(&settings.structure_file).is_absolute());
    }

    #[test]
    fn beams_convert_to_specs() {
        let specs = settings().beam_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].id, "Arc1");
        assert_eq!(specs[0].isocenter, Point3::new(0.0, 10.0, -5.0));
        assert_eq!(
            specs[0].arc,
            GantryArc::new(181.0, 179.0, ArcDirection::Clockwise)
        );
    }

    #[test]
    fn validation_catches_bad_values() {
        assert!(settings().validate().is_ok());

        let mut bad = settings();
        bad.angle_step = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = settings();
        bad.perimeter_points = 2;
        assert!(bad.validate().is_err());

        let mut bad = settings();
        bad.beams.clear();
        assert!(bad.validate().is_err());

        let mut bad = settings();
        bad.z_tolerance = Some(-1.0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn beam_direction_parses_from_toml() {
        let beam: BeamConfig = toml::from_str(
            r#"
            id = "B2"
            start_angle = 30.0
            stop_angle = 330.0
            direction = "CC"
            isocenter = [0.0, 0.0, 0.0]
            "#,
        )
        .unwrap();
        assert_eq!(beam.direction, ArcDirection::CounterClockwise);

        let bad: std::result::Result<BeamConfig, _> = toml::from_str(
            r#"
            id = "B3"
            start_angle = 30.0
            stop_angle = 330.0
            direction = "UP"
            isocenter = [0.0, 0.0, 0.0]
            "#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn z_tolerance_defaults_to_slab() {
        let provider = |_: usize| vec![vec![Point3::new(0.0, 0.0, 0.0); 3]];
        let volume = crate::structure::extract_snapshot(&provider, 0.0, 2, 3.0).unwrap();
        let mut s = settings();
        assert_eq!(s.screening_options(&volume).z_tolerance, 1.5);
        s.z_tolerance = Some(0.5);
        assert_eq!(s.screening_options(&volume).z_tolerance, 0.5);
    }

    #[test]
    fn cli_paths_are_relative_to_working_directory() {
        let cwd = env::current_dir().unwrap();
        let mut s = settings();
        s.resolve_paths(Path::new("/opt/arcclear"));
        assert_eq!(s.structure_file, "/opt/arcclear/data/body.json");

        let args = CliArgs::parse_from(["arcclear", "-s", "patient.json", "-o", "/tmp/run"]);
        s.apply_overrides(&args).unwrap();
        assert_eq!(PathBuf::from(&s.structure_file), cwd.join("patient.json"));
        assert_eq!(s.output_dir, "/tmp/run");
    }

    #[test]
    fn cli_overrides_apply() {
        let args = CliArgs::parse_from(["arcclear", "--step", "5", "--points", "12", "--slice-match", "first_found"]);
        let mut s = settings();
        s.apply_overrides(&args).unwrap();
        assert_eq!(s.angle_step, 5.0);
        assert_eq!(s.perimeter_points, 12);
        assert_eq!(s.slice_match, SliceMatch::FirstFound);
        assert_eq!(s.disk_offset, 400.0);
    }
}

/// Runtime configuration for a screening run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    /// Contour file (JSON) of the structure to screen against.
    pub structure_file: String,
    /// Gantry angle increment in degrees.
    pub angle_step: f64,
    /// Distance from the isocenter to the disk centre in mm.
    pub disk_offset: f64,
    /// Number of rim samples per disk.
    pub perimeter_points: usize,
    /// Isocenter to source distance of the machine in mm.
    pub source_axis_distance: f64,
    /// Slice matching tolerance in mm. Defaults to half the slice thickness.
    #[serde(default)]
    pub z_tolerance: Option<f64>,
    #[serde(default)]
    pub slice_match: SliceMatch,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    pub beams: Vec<BeamConfig>,
}

fn default_output_dir() -> String {
    "output".to_string()
}

/// One beam as written in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BeamConfig {
    pub id: String,
    pub start_angle: f64,
    pub stop_angle: f64,
    pub direction: ArcDirection,
    pub isocenter: [f64; 3],
}

impl BeamConfig {
    pub fn to_spec(&self) -> BeamSpec {
        BeamSpec::new(
            self.id.clone(),
            GantryArc::new(self.start_angle, self.stop_angle, self.direction),
            Point3::from(self.isocenter),
        )
    }
}

impl Settings {
    pub fn beam_specs(&self) -> Vec<BeamSpec> {
        self.beams.iter().map(BeamConfig::to_spec).collect()
    }

    /// Screening parameters for `snapshot`, filling in the slab tolerance
    /// when no z tolerance is configured.
    pub fn screening_options(&self, snapshot: &SnapshotVolume) -> ScreeningOptions {
        ScreeningOptions {
            angle_step: self.angle_step,
            disk_offset: self.disk_offset,
            perimeter_points: self.perimeter_points,
            z_tolerance: self
                .z_tolerance
                .unwrap_or_else(|| snapshot.slab_tolerance()),
            slice_match: self.slice_match,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.angle_step.is_finite() && self.angle_step > 0.0) {
            bail!("angle_step must be greater than 0, got {}", self.angle_step);
        }
        if self.perimeter_points < 3 {
            bail!(
                "perimeter_points must be at least 3, got {}",
                self.perimeter_points
            );
        }
        if !self.disk_offset.is_finite() {
            bail!("disk_offset must be finite, got {}", self.disk_offset);
        }
        if !(self.source_axis_distance.is_finite() && self.source_axis_distance > 0.0) {
            bail!(
                "source_axis_distance must be greater than 0, got {}",
                self.source_axis_distance
            );
        }
        if let Some(tol) = self.z_tolerance {
            if !(tol.is_finite() && tol >= 0.0) {
                bail!("z_tolerance must not be negative, got {}", tol);
            }
        }
        if self.beams.is_empty() {
            bail!("no beams configured");
        }
        Ok(())
    }

    /// Overrides values with those given on the command line.
    ///
    /// Relative paths given on the command line are taken relative to the
    /// current working directory.
    pub fn apply_overrides(&mut self, args: &CliArgs) -> Result<()> {
        if args.structure.is_some() || args.output.is_some() {
            let cwd = env::current_dir().context("failed to get current directory")?;
            if let Some(structure) = &args.structure {
                self.structure_file = resolve_against(&cwd, structure);
            }
            if let Some(output) = &args.output {
                self.output_dir = resolve_against(&cwd, output);
            }
        }
        if let Some(step) = args.step {
            self.angle_step = step;
        }
        if let Some(offset) = args.offset {
            self.disk_offset = offset;
        }
        if let Some(points) = args.points {
            self.perimeter_points = points;
        }
        if let Some(sad) = args.sad {
            self.source_axis_distance = sad;
        }
        if let Some(tol) = args.z_tolerance {
            self.z_tolerance = Some(tol);
        }
        if let Some(policy) = &args.slice_match {
            self.slice_match = policy.parse().map_err(|e: String| anyhow!(e))?;
        }
        Ok(())
    }

    /// Makes relative file paths from the config file relative to `root`.
    fn resolve_paths(&mut self, root: &Path) {
        self.structure_file = resolve_against(root, Path::new(&self.structure_file));
        self.output_dir = resolve_against(root, Path::new(&self.output_dir));
    }
}

fn resolve_against(base: &Path, path: &Path) -> String {
    if path.is_absolute() {
        path.display().to_string()
    } else {
        base.join(path).display().to_string()
    }
}

/// Loads `config/default.toml` from the project root without looking at the
/// command line or environment.
pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let mut settings = read_config_file(&root.join("config/default.toml"), false)?;
    settings.resolve_paths(&root);
    settings.validate()?;
    Ok(settings)
}

/// Loads the settings for a run: the config file (`--config`, else
/// `config/local.toml` if present, else `config/default.toml`), then
/// `ARCCLEAR_*` environment variables, then command line overrides.
pub fn load_config(args: &CliArgs) -> Result<Settings> {
    let root = retrieve_project_root()?;

    let config_file = match &args.config {
        Some(path) => path.clone(),
        None => {
            let local_config = root.join("config/local.toml");
            if local_config.exists() {
                local_config
            } else {
                root.join("config/default.toml")
            }
        }
    };
    info!("Using configuration: {}", config_file.display());

    let mut settings = read_config_file(&config_file, true)?;
    settings.resolve_paths(&root);
    settings.apply_overrides(args)?;
    settings.validate()?;

    debug!("{:#?}", settings);

    Ok(settings)
}

fn read_config_file(path: &Path, with_env: bool) -> Result<Settings> {
    let mut builder = Config::builder().add_source(File::from(path).required(true));
    if with_env {
        builder = builder.add_source(Environment::with_prefix("arcclear").try_parsing(true));
    }
    builder
        .build()
        .with_context(|| format!("failed to load configuration {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("failed to deserialize configuration {}", path.display()))
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the ARCCLEAR_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("ARCCLEAR_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("could not find project root directory"))
}

#[derive(Parser, Debug)]
#[command(version, about = "arcclear - gantry head collision screening for arc deliveries")]
pub struct CliArgs {
    /// Configuration file. Defaults to config/local.toml, then config/default.toml.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Contour file (JSON) of the structure to screen against.
    #[arg(short, long)]
    pub structure: Option<PathBuf>,

    /// Gantry angle increment in degrees.
    #[arg(long)]
    pub step: Option<f64>,

    /// Distance from the isocenter to the disk centre, towards the source, in mm.
    #[arg(long)]
    pub offset: Option<f64>,

    /// Number of rim samples per disk.
    #[arg(long)]
    pub points: Option<usize>,

    /// Isocenter to source distance in mm.
    #[arg(long)]
    pub sad: Option<f64>,

    /// Slice matching tolerance in mm. Defaults to half the slice thickness.
    #[arg(long)]
    pub z_tolerance: Option<f64>,

    /// Slice matching policy: `nearest` or `first_found`.
    #[arg(long)]
    pub slice_match: Option<String>,

    /// Directory the report and summary are written to.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbosity of the program:
    /// -v for info, -vv for debug, and -vvv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Structure: {}
  - Angle Step: {:.3}°
  - Disk Offset: {:.1} mm
  - Perimeter Points: {}
  - Source Axis Distance: {:.1} mm
  - Z Tolerance: {}
  - Slice Match: {:?}
  - Beams: {}
  ",
            self.structure_file,
            self.angle_step,
            self.disk_offset,
            self.perimeter_points,
            self.source_axis_distance,
            self.z_tolerance
                .map_or_else(|| "half slice".to_string(), |t| format!("{:.2} mm", t)),
            self.slice_match,
            self.beams.len(),
        )
    }
}

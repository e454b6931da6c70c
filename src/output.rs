use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::info;

use crate::result::ScreeningReport;
use crate::settings::Settings;


/// Write the full report as pretty-printed JSON.
pub fn write_json(report: &ScreeningReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Write a human readable summary, one line per beam.
pub fn write_summary(report: &ScreeningReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create summary file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    format_summary(report, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write the settings used for a run, so it can be reproduced.
pub fn write_settings(settings: &Settings, path: &Path) -> Result<()> {
    let text = toml::to_string_pretty(settings).context("failed to serialize settings")?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// Writes `report.json` and `summary.txt` into `directory`, creating it if
/// needed. Returns the paths written.
pub fn write_report(report: &ScreeningReport, directory: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create output directory {}", directory.display()))?;

    let json = directory.join("report.json");
    let summary = directory.join("summary.txt");
    write_json(report, &json)?;
    write_summary(report, &summary)?;
    info!("Wrote report to {}", directory.display());

    Ok(vec![json, summary])
}

fn format_summary<W: Write>(report: &ScreeningReport, writer: &mut W) -> Result<()> {
    let id_width = report
        .beams
        .iter()
        .map(|beam| beam.beam_id.len())
        .max()
        .unwrap_or(0);

    writeln!(writer, "Structure: {}", report.structure)?;
    writeln!(writer, "Generated: {}", report.generated_at)?;
    writeln!(writer, "Gantry angles checked: {}", report.angles_checked.len())?;
    writeln!(writer)?;

    for beam in &report.beams {
        write!(
            writer,
            "{:<id_width$}  {:<4} {:>5.1} -> {:>5.1}  {:>4} poses  ",
            beam.beam_id,
            beam.direction.to_string(),
            beam.start_angle,
            beam.stop_angle,
            beam.poses.len(),
        )?;
        match (&beam.error, beam.first_collision()) {
            (Some(error), _) => writeln!(writer, "ERROR {}", error)?,
            (None, Some(first)) => writeln!(
                writer,
                "COLLISION at {:.1} ({})",
                first.angle,
                beam.colliding_angles()
                    .iter()
                    .map(|angle| format!("{:.1}", angle))
                    .join(", ")
            )?,
            (None, None) => writeln!(writer, "clear")?,
        }
    }

    writeln!(writer)?;
    let colliding = report.colliding_beams();
    if colliding.is_empty() {
        writeln!(writer, "Colliding beams: none")?;
    } else {
        writeln!(writer, "Colliding beams: {}", colliding.join(", "))?;
    }
    Ok(())
}

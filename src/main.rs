use anyhow::Result;
use arcclear::beam::IsocentricGantry;
use arcclear::output;
use arcclear::screening::ScreeningPass;
use arcclear::settings::{self, CliArgs};
use arcclear::structure::ContourFile;
use clap::Parser;
use std::path::Path;
use tracing::{info, Level};

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let settings = settings::load_config(&args)?;
    info!("{}", settings);

    let contours = ContourFile::from_file(&settings.structure_file)?;
    let snapshot = contours.snapshot()?;
    info!(
        "Structure {}: {} slices, outline area {:.0} mm²",
        contours.name,
        snapshot.slices.len(),
        snapshot.outline_area()
    );

    let pass = ScreeningPass::new(&snapshot, settings.screening_options(&snapshot));
    let gantry = IsocentricGantry::new(settings.source_axis_distance);
    let report = pass.run(&contours.name, &settings.beam_specs(), &gantry);

    let directory = Path::new(&settings.output_dir);
    output::write_report(&report, directory)?;
    output::write_settings(&settings, &directory.join("settings.toml"))?;

    let colliding = report.colliding_beams();
    if colliding.is_empty() {
        println!("All {} beams clear the structure", report.beams.len());
    } else {
        println!("Colliding beams: {}", colliding.join(", "));
    }

    Ok(())
}

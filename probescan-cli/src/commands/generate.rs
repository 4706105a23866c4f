//! The `generate` command: write a synthetic half-cylinder reference cloud.

use std::path::PathBuf;

use clap::Args;
use probescan::reference::{ReferenceCloud, SemicylinderSpec};

use crate::error::CliError;

/// Arguments for `probescan generate`.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Output CSV path
    pub output: PathBuf,

    /// Cylinder length along X in mm
    #[arg(long, default_value_t = SemicylinderSpec::default().length)]
    pub length: f64,

    /// Cylinder radius in mm
    #[arg(long, default_value_t = SemicylinderSpec::default().radius)]
    pub radius: f64,

    /// Sampling interval along X and the arc in mm
    #[arg(long, default_value_t = SemicylinderSpec::default().step)]
    pub step: f64,
}

/// Generate a reference cloud and write it as CSV.
pub fn run(args: GenerateArgs) -> Result<(), CliError> {
    let spec = SemicylinderSpec::default()
        .with_length(args.length)
        .with_radius(args.radius)
        .with_step(args.step);

    let cloud = ReferenceCloud::semicylinder(&spec)?;
    cloud.write_csv(&args.output)?;

    println!(
        "Wrote {} points ({} stations × {} arc samples) to {}",
        cloud.len(),
        spec.x_samples(),
        spec.arc_samples(),
        args.output.display()
    );
    Ok(())
}

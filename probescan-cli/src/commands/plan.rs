//! The `plan` command: show the boustrophedon path for a model.

use std::path::PathBuf;

use clap::Args;
use probescan::config::ConfigFile;
use probescan::scan::ScanPlanner;
use tracing::info;

use super::common::{load_model, ScanArgs};
use crate::error::CliError;
use crate::output;

/// Arguments for `probescan plan`.
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Reference point cloud CSV (x,y,z)
    pub model: PathBuf,

    #[command(flatten)]
    pub scan: ScanArgs,

    /// List every point of every pass
    #[arg(long)]
    pub points: bool,
}

/// Print the scan plan without running it.
pub fn run(args: PlanArgs, config: &ConfigFile) -> Result<(), CliError> {
    let params = args.scan.resolve(&config.scan);
    params.validate()?;

    let model = load_model(&args.model, config.index)?;
    let plan = ScanPlanner::new(params).plan(model.cloud().points());
    info!(
        stations = plan.passes().len(),
        points = plan.len(),
        "Scan planned"
    );

    if plan.is_empty() {
        println!(
            "No reference points between x = {:.3} and x = {:.3} mm.",
            params.x_min, params.x_max
        );
        return Ok(());
    }

    output::print_plan(&plan, args.points);
    Ok(())
}

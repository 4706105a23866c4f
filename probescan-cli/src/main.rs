//! ProbeScan CLI - command-line front end for the inspection simulator.
//!
//! ```text
//! probescan generate cylinder.csv --length 2000 --radius 500
//! probescan plan cylinder.csv --x-min 0 --x-max 100
//! probescan run cylinder.csv --seed 42 --show-deviations
//! probescan config set analysis.tolerance 0.05
//! ```

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;

use commands::common::{init_logging, load_config};
use commands::config::ConfigCommands;
use commands::generate::GenerateArgs;
use commands::plan::PlanArgs;
use commands::run::RunArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "probescan")]
#[command(version, about = "Rotating-probe inspection simulator with real-time error analysis", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate an inspection run and analyse it live
    Run(RunArgs),

    /// Show the scan path for a reference model
    Plan(PlanArgs),

    /// Generate a half-cylinder reference cloud
    Generate(GenerateArgs),

    /// View or modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(config_path)?;
            let _guard = init_logging(&config, cli.verbose, "run")?;
            commands::run::run(args, config)
        }
        Commands::Plan(args) => {
            let config = load_config(config_path)?;
            let _guard = init_logging(&config, cli.verbose, "plan")?;
            commands::plan::run(args, &config)
        }
        Commands::Generate(args) => commands::generate::run(args),
        Commands::Config { command } => commands::config::run(command, config_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "probescan",
            "run",
            "model.csv",
            "--x-min=-5",
            "--rot-step",
            "2.5",
            "--channel",
            "file",
            "--seed",
            "42",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.scan.x_min, Some(-5.0));
                assert_eq!(args.scan.rot_step, Some(2.5));
                assert_eq!(args.seed, Some(42));
                assert!(args.channel.is_some());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["probescan", "config", "path", "--config", "/tmp/p.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.ini")));
    }
}

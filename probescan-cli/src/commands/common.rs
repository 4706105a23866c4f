//! Argument types and resolution shared across commands.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use probescan::config::{config_file_path, ChannelMode, ConfigFile};
use probescan::index::IndexConfig;
use probescan::logging::{self, LoggingGuard};
use probescan::reference::ReferenceModel;
use probescan::scan::ScanParameters;
use tracing::info;

use crate::error::CliError;

/// Channel backend selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ChannelArg {
    /// In-process record log
    Memory,
    /// CSV log file that other tools can tail
    File,
}

impl From<ChannelArg> for ChannelMode {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Memory => ChannelMode::Memory,
            ChannelArg::File => ChannelMode::File,
        }
    }
}

/// Scan range and step overrides.
#[derive(Debug, Clone, Default, Args)]
pub struct ScanArgs {
    /// Lower X bound in mm
    #[arg(long, allow_negative_numbers = true)]
    pub x_min: Option<f64>,

    /// Upper X bound in mm
    #[arg(long, allow_negative_numbers = true)]
    pub x_max: Option<f64>,

    /// Carriage step along X in mm
    #[arg(long)]
    pub x_step: Option<f64>,

    /// Rotation step in degrees
    #[arg(long)]
    pub rot_step: Option<f64>,

    /// Delay between readings in seconds
    #[arg(long)]
    pub delay: Option<f64>,
}

impl ScanArgs {
    /// CLI values take precedence, then the config file.
    pub fn resolve(&self, config: &ScanParameters) -> ScanParameters {
        ScanParameters {
            x_min: self.x_min.unwrap_or(config.x_min),
            x_max: self.x_max.unwrap_or(config.x_max),
            x_step: self.x_step.unwrap_or(config.x_step),
            rot_step: self.rot_step.unwrap_or(config.rot_step),
            measurement_delay: self.delay.unwrap_or(config.measurement_delay),
        }
    }
}

/// Path of the configuration file: `--config` or the default location.
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

/// Loads the configuration file.
pub fn load_config(cli_path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let path = resolve_config_path(cli_path);
    ConfigFile::load_from(&path)
        .map_err(|e| CliError::Config(format!("{} ({})", e, path.display())))
}

/// Installs logging for a command.
pub fn init_logging(
    config: &ConfigFile,
    verbose: bool,
    command: &str,
) -> Result<LoggingGuard, CliError> {
    let guard = logging::init(&config.logging, verbose)?;
    info!(
        version = probescan::VERSION,
        command,
        log_dir = %guard.directory().display(),
        "ProbeScan starting"
    );
    Ok(guard)
}

/// Loads a reference model and builds its index.
pub fn load_model(path: &Path, index: IndexConfig) -> Result<ReferenceModel, CliError> {
    Ok(ReferenceModel::load(path, index)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let config = ScanParameters::default();
        let args = ScanArgs {
            x_min: Some(0.0),
            rot_step: Some(3.0),
            ..Default::default()
        };
        let params = args.resolve(&config);
        assert_eq!(params.x_min, 0.0);
        assert_eq!(params.rot_step, 3.0);
        assert_eq!(params.x_max, config.x_max);
        assert_eq!(params.measurement_delay, config.measurement_delay);
    }

    #[test]
    fn test_channel_arg_conversion() {
        assert_eq!(ChannelMode::from(ChannelArg::File), ChannelMode::File);
        assert_eq!(ChannelMode::from(ChannelArg::Memory), ChannelMode::Memory);
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = Path::new("/tmp/custom.ini");
        assert_eq!(resolve_config_path(Some(path)), PathBuf::from("/tmp/custom.ini"));
        assert!(resolve_config_path(None).ends_with("config.ini"));
    }

    #[test]
    fn test_load_missing_config_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.ini");
        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}

//! Configuration management CLI commands.
//!
//! Provides `config init`, `config get`, `config set`, `config list`, and
//! `config path` for viewing and modifying settings from the command line.

use std::path::Path;

use clap::Subcommand;
use probescan::config::{ConfigFile, ConfigKey};

use super::common::{load_config, resolve_config_path};
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., scan.x_step)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., scan.x_step)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the file at `config_path` (or the default).
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(config_path, force),
        ConfigCommands::Get { key } => run_get(config_path, &key),
        ConfigCommands::Set { key, value } => run_set(config_path, &key, &value),
        ConfigCommands::List => run_list(config_path),
        ConfigCommands::Path => run_path(config_path),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'probescan config list' to see available keys.",
            key
        ))
    })
}

/// Write a default configuration file.
fn run_init(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = resolve_config_path(config_path);
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Get a configuration value.
fn run_get(config_path: Option<&Path>, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = load_config(config_path)?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }

    Ok(())
}

/// Set a configuration value.
fn run_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = load_config(config_path)?;
    config_key.set(&mut config, value)?;
    config.save_to(&resolve_config_path(config_path))?;

    println!("Set {} = {}", config_key.name(), value);

    Ok(())
}

/// List all configuration settings.
fn run_list(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }

    Ok(())
}

/// Show the configuration file path.
fn run_path(config_path: Option<&Path>) -> Result<(), CliError> {
    println!("{}", resolve_config_path(config_path).display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        let path = path.as_path();

        run_set(Some(path), "scan.x_step", "20").unwrap();
        run_set(Some(path), "analysis.tolerance", "0.05").unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.scan.x_step, 20.0);
        assert_eq!(config.analysis.tolerance, 0.05);
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        let path = path.as_path();
        let err = run_set(Some(path), "scan.speed", "1").unwrap_err();
        assert!(err.to_string().contains("scan.speed"));
        assert!(!path.exists());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        let path = path.as_path();

        run_init(Some(path), false).unwrap();
        assert!(path.exists());
        assert!(run_init(Some(path), false).is_err());
        run_init(Some(path), true).unwrap();
    }
}

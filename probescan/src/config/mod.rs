//! INI configuration file.
//!
//! The file lives at `<config_dir>/probescan/config.ini`. Every setting has a
//! default; a missing file or key falls back to it, while a present but
//! unparsable value is an error.
//!
//! ```ini
//! [scan]
//! x_min = -5
//! x_max = 500
//! x_step = 10
//! rot_step = 1.5
//! measurement_delay = 0.05
//!
//! [noise]
//! enabled = true
//! seed =
//!
//! [analysis]
//! tolerance = 0.1
//!
//! [channel]
//! kind = memory
//! path = live_measurement.csv
//! ```
//!
//! Settings are addressed as `section.key` through [`ConfigKey`], which is
//! also how the file is read and written.

mod keys;

pub use keys::ConfigKey;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::analysis::AnalysisConfig;
use crate::channel::ChannelKind;
use crate::index::IndexConfig;
use crate::logging::LoggingConfig;
use crate::noise::NoiseConfig;
use crate::scan::ScanParameters;
use crate::session::{SessionConfig, DEFAULT_DRAIN_TIMEOUT};

/// Default measurement log file name.
pub const DEFAULT_LOG_FILE: &str = "live_measurement.csv";

/// Default time to wait for workers on shutdown.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Measurement channel backend as named in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    #[default]
    Memory,
    File,
}

impl ChannelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelMode::Memory => "memory",
            ChannelMode::File => "file",
        }
    }

    /// Parses `memory` or `file`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Some(ChannelMode::Memory),
            "file" => Some(ChannelMode::File),
            _ => None,
        }
    }
}

/// `[channel]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub mode: ChannelMode,
    /// Log file used in `file` mode.
    pub path: PathBuf,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            mode: ChannelMode::Memory,
            path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ChannelSettings {
    /// The channel backend these settings select.
    pub fn kind(&self) -> ChannelKind {
        match self.mode {
            ChannelMode::Memory => ChannelKind::Memory,
            ChannelMode::File => ChannelKind::File(self.path.clone()),
        }
    }
}

/// `[noise]` settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSettings {
    /// When false every error term is zero.
    pub enabled: bool,
    pub model: NoiseConfig,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: NoiseConfig::default(),
        }
    }
}

impl NoiseSettings {
    /// The error model to simulate with.
    pub fn effective(&self) -> NoiseConfig {
        if self.enabled {
            self.model
        } else {
            NoiseConfig {
                seed: self.model.seed,
                ..NoiseConfig::disabled()
            }
        }
    }
}

/// `[session]` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Idle limit while draining the channel.
    pub drain_timeout: Duration,
    /// Time allowed for workers to stop.
    pub stop_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub scan: ScanParameters,
    pub noise: NoiseSettings,
    pub analysis: AnalysisConfig,
    pub index: IndexConfig,
    pub channel: ChannelSettings,
    pub session: SessionSettings,
    pub logging: LoggingConfig,
}

/// `<config_dir>/probescan`, or `./.probescan` when unknown.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("probescan"))
        .unwrap_or_else(|| PathBuf::from(".probescan"))
}

/// Default path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

impl ConfigFile {
    /// Loads a configuration file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Builds a configuration from parsed INI data.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// INI representation with every key present.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Session settings derived from this file.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_analysis(self.analysis.clone())
            .with_noise(self.noise.effective())
            .with_channel(self.channel.kind())
            .with_drain_timeout(self.session.drain_timeout)
    }
}

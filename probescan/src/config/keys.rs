//! Addressable configuration keys.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{ChannelMode, ConfigError, ConfigFile};

/// One setting of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ScanXMin,
    ScanXMax,
    ScanXStep,
    ScanRotStep,
    ScanMeasurementDelay,

    NoiseEnabled,
    NoiseSystematicOffset,
    NoiseLevel,
    NoisePeriodicAmplitude,
    NoisePeriodicPeriod,
    NoisePositionAmplitude,
    NoisePositionScale,
    NoiseMaxAmplitude,
    NoiseSeed,

    AnalysisTolerance,
    AnalysisHistoryCapacity,
    AnalysisPollIntervalMs,
    AnalysisRetryBackoffMs,

    IndexXTolerance,
    IndexAngleTolerance,

    ChannelKind,
    ChannelPath,

    SessionDrainTimeoutMs,
    SessionStopTimeoutMs,

    LoggingDirectory,
    LoggingLevel,
}

const ALL_KEYS: [ConfigKey; 26] = [
    ConfigKey::ScanXMin,
    ConfigKey::ScanXMax,
    ConfigKey::ScanXStep,
    ConfigKey::ScanRotStep,
    ConfigKey::ScanMeasurementDelay,
    ConfigKey::NoiseEnabled,
    ConfigKey::NoiseSystematicOffset,
    ConfigKey::NoiseLevel,
    ConfigKey::NoisePeriodicAmplitude,
    ConfigKey::NoisePeriodicPeriod,
    ConfigKey::NoisePositionAmplitude,
    ConfigKey::NoisePositionScale,
    ConfigKey::NoiseMaxAmplitude,
    ConfigKey::NoiseSeed,
    ConfigKey::AnalysisTolerance,
    ConfigKey::AnalysisHistoryCapacity,
    ConfigKey::AnalysisPollIntervalMs,
    ConfigKey::AnalysisRetryBackoffMs,
    ConfigKey::IndexXTolerance,
    ConfigKey::IndexAngleTolerance,
    ConfigKey::ChannelKind,
    ConfigKey::ChannelPath,
    ConfigKey::SessionDrainTimeoutMs,
    ConfigKey::SessionStopTimeoutMs,
    ConfigKey::LoggingDirectory,
    ConfigKey::LoggingLevel,
];

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// INI section of the key.
    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ScanXMin | ScanXMax | ScanXStep | ScanRotStep | ScanMeasurementDelay => "scan",
            NoiseEnabled | NoiseSystematicOffset | NoiseLevel | NoisePeriodicAmplitude
            | NoisePeriodicPeriod | NoisePositionAmplitude | NoisePositionScale
            | NoiseMaxAmplitude | NoiseSeed => "noise",
            AnalysisTolerance | AnalysisHistoryCapacity | AnalysisPollIntervalMs
            | AnalysisRetryBackoffMs => "analysis",
            IndexXTolerance | IndexAngleTolerance => "index",
            ChannelKind | ChannelPath => "channel",
            SessionDrainTimeoutMs | SessionStopTimeoutMs => "session",
            LoggingDirectory | LoggingLevel => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ScanXMin => "x_min",
            ScanXMax => "x_max",
            ScanXStep => "x_step",
            ScanRotStep => "rot_step",
            ScanMeasurementDelay => "measurement_delay",
            NoiseEnabled => "enabled",
            NoiseSystematicOffset => "systematic_offset",
            NoiseLevel => "noise_level",
            NoisePeriodicAmplitude => "periodic_amplitude",
            NoisePeriodicPeriod => "periodic_period",
            NoisePositionAmplitude => "position_amplitude",
            NoisePositionScale => "position_scale",
            NoiseMaxAmplitude => "max_amplitude",
            NoiseSeed => "seed",
            AnalysisTolerance => "tolerance",
            AnalysisHistoryCapacity => "history_capacity",
            AnalysisPollIntervalMs => "poll_interval_ms",
            AnalysisRetryBackoffMs => "retry_backoff_ms",
            IndexXTolerance => "x_tolerance",
            IndexAngleTolerance => "angle_tolerance",
            ChannelKind => "kind",
            ChannelPath => "path",
            SessionDrainTimeoutMs => "drain_timeout_ms",
            SessionStopTimeoutMs => "stop_timeout_ms",
            LoggingDirectory => "directory",
            LoggingLevel => "level",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as written to the file. Unset optional values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            ScanXMin => config.scan.x_min.to_string(),
            ScanXMax => config.scan.x_max.to_string(),
            ScanXStep => config.scan.x_step.to_string(),
            ScanRotStep => config.scan.rot_step.to_string(),
            ScanMeasurementDelay => config.scan.measurement_delay.to_string(),
            NoiseEnabled => config.noise.enabled.to_string(),
            NoiseSystematicOffset => config.noise.model.systematic_offset.to_string(),
            NoiseLevel => config.noise.model.noise_level.to_string(),
            NoisePeriodicAmplitude => config.noise.model.periodic_amplitude.to_string(),
            NoisePeriodicPeriod => config.noise.model.periodic_period.to_string(),
            NoisePositionAmplitude => config.noise.model.position_amplitude.to_string(),
            NoisePositionScale => config.noise.model.position_scale.to_string(),
            NoiseMaxAmplitude => config.noise.model.max_amplitude.to_string(),
            NoiseSeed => config
                .noise
                .model
                .seed
                .map(|s| s.to_string())
                .unwrap_or_default(),
            AnalysisTolerance => config.analysis.tolerance.to_string(),
            AnalysisHistoryCapacity => config.analysis.history_capacity.to_string(),
            AnalysisPollIntervalMs => config.analysis.poll_interval.as_millis().to_string(),
            AnalysisRetryBackoffMs => config.analysis.retry_backoff.as_millis().to_string(),
            IndexXTolerance => config.index.x_tolerance.to_string(),
            IndexAngleTolerance => config.index.angle_tolerance.to_string(),
            ChannelKind => config.channel.mode.as_str().to_string(),
            ChannelPath => config.channel.path.display().to_string(),
            SessionDrainTimeoutMs => config.session.drain_timeout.as_millis().to_string(),
            SessionStopTimeoutMs => config.session.stop_timeout.as_millis().to_string(),
            LoggingDirectory => config.logging.directory.display().to_string(),
            LoggingLevel => config.logging.level.clone(),
        }
    }

    /// Parses `value` and stores it in `config`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let raw = value.trim();
        match self {
            ScanXMin => config.scan.x_min = self.finite(raw)?,
            ScanXMax => config.scan.x_max = self.finite(raw)?,
            ScanXStep => config.scan.x_step = self.positive(raw)?,
            ScanRotStep => config.scan.rot_step = self.positive(raw)?,
            ScanMeasurementDelay => config.scan.measurement_delay = self.non_negative(raw)?,
            NoiseEnabled => config.noise.enabled = self.boolean(raw)?,
            NoiseSystematicOffset => config.noise.model.systematic_offset = self.finite(raw)?,
            NoiseLevel => config.noise.model.noise_level = self.non_negative(raw)?,
            NoisePeriodicAmplitude => config.noise.model.periodic_amplitude = self.finite(raw)?,
            NoisePeriodicPeriod => config.noise.model.periodic_period = self.positive(raw)?,
            NoisePositionAmplitude => config.noise.model.position_amplitude = self.finite(raw)?,
            NoisePositionScale => config.noise.model.position_scale = self.positive(raw)?,
            NoiseMaxAmplitude => config.noise.model.max_amplitude = self.non_negative(raw)?,
            NoiseSeed => {
                config.noise.model.seed = if raw.is_empty() {
                    None
                } else {
                    Some(self.parse::<u64>(raw)?)
                }
            }
            AnalysisTolerance => config.analysis.tolerance = self.positive(raw)?,
            AnalysisHistoryCapacity => {
                let capacity = self.parse::<usize>(raw)?;
                if capacity == 0 {
                    return Err(self.invalid(raw, "must be at least 1"));
                }
                config.analysis.history_capacity = capacity;
            }
            AnalysisPollIntervalMs => config.analysis.poll_interval = self.millis(raw)?,
            AnalysisRetryBackoffMs => config.analysis.retry_backoff = self.millis(raw)?,
            IndexXTolerance => config.index.x_tolerance = self.non_negative(raw)?,
            IndexAngleTolerance => config.index.angle_tolerance = self.non_negative(raw)?,
            ChannelKind => {
                config.channel.mode = ChannelMode::parse(raw)
                    .ok_or_else(|| self.invalid(raw, "expected 'memory' or 'file'"))?
            }
            ChannelPath => {
                if raw.is_empty() {
                    return Err(self.invalid(raw, "path must not be empty"));
                }
                config.channel.path = PathBuf::from(raw);
            }
            SessionDrainTimeoutMs => config.session.drain_timeout = self.millis(raw)?,
            SessionStopTimeoutMs => config.session.stop_timeout = self.millis(raw)?,
            LoggingDirectory => {
                if raw.is_empty() {
                    return Err(self.invalid(raw, "path must not be empty"));
                }
                config.logging.directory = PathBuf::from(raw);
            }
            LoggingLevel => {
                if raw.is_empty() {
                    return Err(self.invalid(raw, "level must not be empty"));
                }
                config.logging.level = raw.to_string();
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section(),
            key: self.key_name(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn parse<T>(&self, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        raw.parse::<T>().map_err(|e| self.invalid(raw, e.to_string()))
    }

    fn finite(&self, raw: &str) -> Result<f64, ConfigError> {
        let v = self.parse::<f64>(raw)?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(self.invalid(raw, "must be a finite number"))
        }
    }

    fn positive(&self, raw: &str) -> Result<f64, ConfigError> {
        let v = self.finite(raw)?;
        if v > 0.0 {
            Ok(v)
        } else {
            Err(self.invalid(raw, "must be positive"))
        }
    }

    fn non_negative(&self, raw: &str) -> Result<f64, ConfigError> {
        let v = self.finite(raw)?;
        if v >= 0.0 {
            Ok(v)
        } else {
            Err(self.invalid(raw, "must not be negative"))
        }
    }

    fn millis(&self, raw: &str) -> Result<Duration, ConfigError> {
        self.parse::<u64>(raw).map(Duration::from_millis)
    }

    fn boolean(&self, raw: &str) -> Result<bool, ConfigError> {
        match raw.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(raw, "expected true or false")),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<String> = ConfigKey::all().iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), ConfigKey::all().len());
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            "analysis.tolerance".parse::<ConfigKey>().unwrap(),
            ConfigKey::AnalysisTolerance
        );
        assert_eq!(
            "SCAN.X_STEP".parse::<ConfigKey>().unwrap(),
            ConfigKey::ScanXStep
        );
        assert!(matches!(
            "scan.speed".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_get_set_round_trip_on_defaults() {
        let defaults = ConfigFile::default();
        let mut config = ConfigFile::default();
        for key in ConfigKey::all() {
            let value = key.get(&defaults);
            key.set(&mut config, &value).unwrap();
        }
        assert_eq!(config, defaults);
    }

    #[test]
    fn test_set_validates() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::ScanXStep.set(&mut config, "0").is_err());
        assert!(ConfigKey::ScanMeasurementDelay.set(&mut config, "-1").is_err());
        assert!(ConfigKey::AnalysisTolerance.set(&mut config, "NaN").is_err());
        assert!(ConfigKey::AnalysisHistoryCapacity.set(&mut config, "0").is_err());
        assert!(ConfigKey::ChannelKind.set(&mut config, "socket").is_err());
        assert!(ConfigKey::NoiseEnabled.set(&mut config, "maybe").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_seed_can_be_cleared() {
        let mut config = ConfigFile::default();
        ConfigKey::NoiseSeed.set(&mut config, "42").unwrap();
        assert_eq!(config.noise.model.seed, Some(42));
        assert_eq!(ConfigKey::NoiseSeed.get(&config), "42");

        ConfigKey::NoiseSeed.set(&mut config, "").unwrap();
        assert_eq!(config.noise.model.seed, None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConfigKey::ChannelPath.to_string(), "channel.path");
    }
}

//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `homesync.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration as StdDuration;

use serde::Deserialize;

use homesync_adapter_virtual::SimulationConfig;
use homesync_domain::suppression::SuppressionDurations;
use homesync_domain::time::{Duration, seconds};

/// Upper bound for every duration setting, in seconds.
const MAX_SECS: u64 = 86_400;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    /// Suppression window durations.
    pub suppression: SuppressionConfig,
    /// Transitional actuator settings.
    pub actuators: ActuatorsConfig,
    /// Change bus settings.
    pub bus: BusConfig,
    /// Simulated home settings.
    pub simulation: SimulationSection,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SuppressionConfig {
    /// Window after positional writes (blinds, locks, doors, valves, power).
    pub positional_secs: u64,
    /// Window after security system arming.
    pub security_code_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorsConfig {
    /// How long a transition may wait for confirmation; `0` waits forever.
    pub transition_timeout_secs: u64,
    /// How often expired transitions are swept.
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Buffered changes per subscriber before it starts lagging.
    pub capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    /// Populate the simulated home with demo devices.
    pub demo: bool,
    /// Delay between a write and each simulated report.
    pub latency_ms: u64,
    /// Coverings report their old position before moving.
    pub stale_echo: bool,
}

impl Config {
    /// Load configuration from `homesync.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homesync.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMESYNC_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("HOMESYNC_TRANSITION_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.actuators.transition_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("HOMESYNC_BUS_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.bus.capacity = capacity;
            }
        }
        if let Ok(val) = std::env::var("HOMESYNC_SIM_LATENCY_MS") {
            if let Ok(ms) = val.parse() {
                self.simulation.latency_ms = ms;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.capacity == 0 {
            return Err(ConfigError::Validation("bus capacity must be non-zero".to_string()));
        }
        if self.actuators.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "actuator poll interval must be non-zero".to_string(),
            ));
        }
        let durations = [
            ("suppression.positional_secs", self.suppression.positional_secs),
            ("suppression.security_code_secs", self.suppression.security_code_secs),
            ("actuators.transition_timeout_secs", self.actuators.transition_timeout_secs),
            ("actuators.poll_interval_secs", self.actuators.poll_interval_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value > MAX_SECS) {
            return Err(ConfigError::Validation(format!(
                "{name} must be at most {MAX_SECS} seconds"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn suppression_durations(&self) -> SuppressionDurations {
        SuppressionDurations {
            positional: secs(self.suppression.positional_secs),
            security_code: secs(self.suppression.security_code_secs),
        }
    }

    /// Transition timeout, `None` when disabled.
    #[must_use]
    pub fn transition_timeout(&self) -> Option<Duration> {
        (self.actuators.transition_timeout_secs > 0).then(|| secs(self.actuators.transition_timeout_secs))
    }

    #[must_use]
    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.actuators.poll_interval_secs)
    }

    #[must_use]
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            latency: StdDuration::from_millis(self.simulation.latency_ms),
            stale_echo: self.simulation.stale_echo,
        }
    }
}

fn secs(value: u64) -> Duration {
    seconds(i64::try_from(value.min(MAX_SECS)).unwrap_or_default())
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homesyncd=info,homesync_app=info,homesync_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            positional_secs: 60,
            security_code_secs: 10,
        }
    }
}

impl Default for ActuatorsConfig {
    fn default() -> Self {
        Self {
            transition_timeout_secs: 120,
            poll_interval_secs: 5,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            demo: true,
            latency_ms: 500,
            stale_echo: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.suppression.positional_secs, 60);
        assert_eq!(config.suppression.security_code_secs, 10);
        assert_eq!(config.actuators.transition_timeout_secs, 120);
        assert_eq!(config.bus.capacity, 256);
        assert!(config.simulation.demo);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bus.capacity, 256);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [logging]
            filter = 'debug'

            [suppression]
            positional_secs = 30
            security_code_secs = 5

            [actuators]
            transition_timeout_secs = 0
            poll_interval_secs = 1

            [bus]
            capacity = 16

            [simulation]
            demo = false
            latency_ms = 50
            stale_echo = false
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.suppression.positional_secs, 30);
        assert_eq!(config.suppression.security_code_secs, 5);
        assert_eq!(config.actuators.poll_interval_secs, 1);
        assert_eq!(config.bus.capacity, 16);
        assert!(!config.simulation.demo);
        assert!(!config.simulation.stale_echo);
        assert_eq!(config.transition_timeout(), None);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [suppression]
            positional_secs = 45
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.suppression.positional_secs, 45);
        assert_eq!(config.suppression.security_code_secs, 10);
        assert_eq!(config.actuators.transition_timeout_secs, 120);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.bus.capacity, 256);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_zero_bus_capacity() {
        let mut config = Config::default();
        config.bus.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_durations_beyond_one_day() {
        let mut config = Config::default();
        config.suppression.positional_secs = MAX_SECS + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("suppression.positional_secs"));
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_convert_suppression_durations() {
        let durations = Config::default().suppression_durations();
        assert_eq!(durations.positional, seconds(60));
        assert_eq!(durations.security_code, seconds(10));
    }

    #[test]
    fn should_enable_transition_timeout_by_default() {
        assert_eq!(Config::default().transition_timeout(), Some(seconds(120)));
    }

    #[test]
    fn should_convert_simulation_latency() {
        let simulation = Config::default().simulation();
        assert_eq!(simulation.latency, StdDuration::from_millis(500));
        assert!(simulation.stale_echo);
    }
}

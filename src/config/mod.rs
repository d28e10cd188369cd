use serde::Deserialize;
use serde_with::serde_as;
use serde_with::DurationSeconds;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub mod filtration;

pub use filtration::FiltrationConfig;

/// Reasons a configuration is rejected.
/// Nothing here ever reaches the engine, an invalid configuration is refused
/// before it replaces the active one.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("slot percentages must add up to 100, got {slot1} + {slot2}")]
    PercentSum { slot1: u8, slot2: u8 },
    #[error("{slot} duration percent must be between 0 and 100, got {percent}")]
    PercentRange { slot: &'static str, percent: u8 },
    #[error("minimum duration {min} minutes is above maximum duration {max} minutes")]
    MinAboveMax { min: u32, max: u32 },
    #[error("slot1 must start before slot2 ({slot1} >= {slot2})")]
    SlotOrder { slot1: chrono::NaiveTime, slot2: chrono::NaiveTime },
    #[error("a switch reference is required when filtration automation is enabled")]
    MissingSwitch,
    #[error("winter duration must be between 1 and 1440 minutes, got {0}")]
    WinterDuration(u32),
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pool: PoolConfig,
    #[serde(default)]
    daemon: DaemonConfig,
    #[serde(default)]
    filtration: FiltrationConfig,
}

impl Config {
    pub fn new(pool: PoolConfig, daemon: DaemonConfig, filtration: FiltrationConfig) -> Self {
        Self {
            pool,
            daemon,
            filtration,
        }
    }

    /// Read and validate a configuration file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.filtration.validate()?;
        Ok(config)
    }

    pub fn get_pool(&self) -> &PoolConfig {
        &self.pool
    }

    pub fn get_daemon(&self) -> &DaemonConfig {
        &self.daemon
    }

    pub fn get_filtration(&self) -> &FiltrationConfig {
        &self.filtration
    }
}

/// Identity of the pool, copied into every published event.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PoolConfig {
    id: String,
    title: String,
}

impl PoolConfig {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_title(&self) -> &str {
        &self.title
    }
}

#[serde_as]
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// How often (in seconds) the engine is evaluated.
    #[serde_as(as = "DurationSeconds")]
    tick_interval_secs: Duration,
    /// How old (in seconds) the measurement behind a recommendation may be
    /// before the engine stops planning from it.
    #[serde_as(as = "DurationSeconds")]
    max_recommendation_age_secs: Duration,
    /// JSON snapshot of the pool written by the poller.
    recommendation_file: PathBuf,
    /// JSON lines file of pending commands, consumed on every loop.
    command_file: PathBuf,
    /// State file standing in for the pump actuator.
    switch_file: PathBuf,
    /// Where to checkpoint boost and elapsed time between restarts, if anywhere.
    checkpoint_file: Option<PathBuf>,
    /// JSON snapshot of the engine state, rewritten after every tick, if anywhere.
    state_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: Duration::from_secs(60),
            max_recommendation_age_secs: Duration::from_secs(12 * 60 * 60),
            recommendation_file: PathBuf::from("live_data/pool.json"),
            command_file: PathBuf::from("live_data/commands.jsonl"),
            switch_file: PathBuf::from("live_data/switch.json"),
            checkpoint_file: None,
            state_file: Some(PathBuf::from("live_data/state.json")),
        }
    }
}

impl DaemonConfig {
    pub fn get_tick_interval(&self) -> &Duration {
        &self.tick_interval_secs
    }

    pub fn get_max_recommendation_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_recommendation_age_secs.as_secs() as i64)
    }

    pub fn get_recommendation_file(&self) -> &PathBuf {
        &self.recommendation_file
    }

    pub fn get_command_file(&self) -> &PathBuf {
        &self.command_file
    }

    pub fn get_switch_file(&self) -> &PathBuf {
        &self.switch_file
    }

    pub fn get_checkpoint_file(&self) -> Option<&PathBuf> {
        self.checkpoint_file.as_ref()
    }

    pub fn get_state_file(&self) -> Option<&PathBuf> {
        self.state_file.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_util::test_utils::time;

    #[test]
    fn test_deserialize() {
        let config = Config::read_from("test/pool_filtration.toml").expect("Error reading test config file");

        assert_eq!(config.pool, PoolConfig::new("pool-123", "Test Pool"));
        assert_eq!(config.daemon.tick_interval_secs, Duration::from_secs(30));
        assert_eq!(config.daemon.get_max_recommendation_age(), chrono::Duration::hours(6));
        assert_eq!(config.daemon.recommendation_file, PathBuf::from("live_data/pool.json"));
        assert_eq!(config.daemon.checkpoint_file, Some(PathBuf::from("live_data/checkpoint.json")));
        assert_eq!(config.daemon.get_state_file(), Some(&PathBuf::from("live_data/pool_state.json")));

        let filtration = config.get_filtration();
        assert_eq!(filtration.get_switch_reference(), Some("switch.pool_pump"));
        assert!(filtration.get_summer().is_enabled());
        assert_eq!(filtration.get_summer().get_max_duration(), 600);
        assert_eq!(filtration.get_summer().get_slot1().get_start_time(), time(6, 0, 0));
        assert_eq!(filtration.get_summer().get_slot2().get_duration_percent(), 40);
        assert_eq!(filtration.get_summer().get_slot2().get_name(), "Evening");
        assert!(!filtration.get_winter().is_enabled());
        assert_eq!(filtration.get_winter().get_duration(), 120);
    }

    #[test]
    fn test_daemon_defaults() {
        let config = Config::parse("[pool]\nid = \"a\"\ntitle = \"b\"\n").expect("Minimal config should parse");
        assert_eq!(config.daemon, DaemonConfig::default());
        assert!(!config.filtration.is_any_enabled());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let result = Config::read_from("test/invalid_percent.toml");
        assert!(
            matches!(result, Err(ConfigError::PercentSum { slot1: 60, slot2: 60 })),
            "Expected percent sum error, got {:?}",
            result
        );
    }

    #[test]
    fn test_missing_file() {
        let result = Config::read_from("test/does_not_exist.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}

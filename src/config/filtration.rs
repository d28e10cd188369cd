use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Configuration of the filtration automation.
/// Replaced as a whole on reconfiguration, never mutated in place.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FiltrationConfig {
    /// Opaque handle to the pump actuator.
    switch_reference: Option<String>,
    summer: SummerConfig,
    winter: WinterConfig,
}

impl FiltrationConfig {
    pub fn new(switch_reference: Option<String>, summer: SummerConfig, winter: WinterConfig) -> Self {
        Self {
            switch_reference,
            summer,
            winter,
        }
    }

    pub fn get_switch_reference(&self) -> Option<&str> {
        self.switch_reference.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn get_summer(&self) -> &SummerConfig {
        &self.summer
    }

    pub fn get_winter(&self) -> &WinterConfig {
        &self.winter
    }

    pub fn is_any_enabled(&self) -> bool {
        self.summer.enabled || self.winter.enabled
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.summer.enabled {
            self.summer.validate()?;
        }
        if self.winter.enabled && !(1..=24 * 60).contains(&self.winter.duration) {
            return Err(ConfigError::WinterDuration(self.winter.duration));
        }
        if self.is_any_enabled() && self.get_switch_reference().is_none() {
            return Err(ConfigError::MissingSwitch);
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SummerConfig {
    enabled: bool,
    /// Minutes, 0 for no lower bound.
    min_duration: u32,
    /// Minutes, 0 for no upper bound.
    max_duration: u32,
    /// Extend slot2 past its planned end when the day's objective was not reached.
    catch_up_last_slot: bool,
    slot1: SlotConfig,
    slot2: SlotConfig,
}

impl Default for SummerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_duration: 0,
            max_duration: 0,
            catch_up_last_slot: false,
            slot1: SlotConfig::new("Slot 1", NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN), 50),
            slot2: SlotConfig::new("Slot 2", NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN), 50),
        }
    }
}

impl SummerConfig {
    pub fn new(enabled: bool, min_duration: u32, max_duration: u32, slot1: SlotConfig, slot2: SlotConfig) -> Self {
        Self {
            enabled,
            min_duration,
            max_duration,
            catch_up_last_slot: false,
            slot1,
            slot2,
        }
    }

    #[must_use]
    pub fn with_catch_up(mut self, catch_up_last_slot: bool) -> Self {
        self.catch_up_last_slot = catch_up_last_slot;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_min_duration(&self) -> u32 {
        self.min_duration
    }

    pub fn get_max_duration(&self) -> u32 {
        self.max_duration
    }

    pub fn is_catch_up_last_slot(&self) -> bool {
        self.catch_up_last_slot
    }

    pub fn get_slot1(&self) -> &SlotConfig {
        &self.slot1
    }

    pub fn get_slot2(&self) -> &SlotConfig {
        &self.slot2
    }

    /// Clamp a recommended duration into the configured bounds, a bound of 0 is ignored.
    pub fn clamp_duration(&self, recommended: u32) -> u32 {
        let mut duration = recommended;
        if self.min_duration > 0 {
            duration = duration.max(self.min_duration);
        }
        if self.max_duration > 0 {
            duration = duration.min(self.max_duration);
        }
        duration
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (slot, config) in [("slot1", &self.slot1), ("slot2", &self.slot2)] {
            if config.duration_percent > 100 {
                return Err(ConfigError::PercentRange {
                    slot,
                    percent: config.duration_percent,
                });
            }
        }
        if self.slot1.duration_percent as u16 + self.slot2.duration_percent as u16 != 100 {
            return Err(ConfigError::PercentSum {
                slot1: self.slot1.duration_percent,
                slot2: self.slot2.duration_percent,
            });
        }
        if self.min_duration > 0 && self.max_duration > 0 && self.min_duration > self.max_duration {
            return Err(ConfigError::MinAboveMax {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        if self.slot2.duration_percent > 0 && self.slot1.start_time >= self.slot2.start_time {
            return Err(ConfigError::SlotOrder {
                slot1: self.slot1.start_time,
                slot2: self.slot2.start_time,
            });
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SlotConfig {
    #[serde(default)]
    name: Option<String>,
    start_time: NaiveTime,
    duration_percent: u8,
}

impl SlotConfig {
    pub fn new(name: impl Into<String>, start_time: NaiveTime, duration_percent: u8) -> Self {
        Self {
            name: Some(name.into()),
            start_time,
            duration_percent,
        }
    }

    pub fn get_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn get_start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn get_duration_percent(&self) -> u8 {
        self.duration_percent
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WinterConfig {
    enabled: bool,
    start_time: NaiveTime,
    /// Fixed filtration time in minutes, independent of any recommendation.
    duration: u32,
}

impl Default for WinterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
            duration: 120,
        }
    }
}

impl WinterConfig {
    pub fn new(enabled: bool, start_time: NaiveTime, duration: u32) -> Self {
        Self {
            enabled,
            start_time,
            duration,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn get_duration(&self) -> u32 {
        self.duration
    }
}

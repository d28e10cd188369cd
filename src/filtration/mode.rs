use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::config::FiltrationConfig;
use crate::io::recommendation::ModeHint;

/// Which schedule family governs the pump, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum Mode {
    Standard,
    ActiveWinter,
    PassiveWinter,
    Disabled,
}

impl Mode {
    /// Whether the engine drives the pump at all in this mode.
    pub fn is_automated(&self) -> bool {
        matches!(self, Mode::Standard | Mode::ActiveWinter)
    }
}

/// Operating mode an administrator can force, replacing the device's own hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum PoolMode {
    #[strum(serialize = "Standard")]
    #[serde(rename = "Standard")]
    Standard,
    #[strum(serialize = "Active-Winter")]
    #[serde(rename = "Active-Winter")]
    ActiveWinter,
    #[strum(serialize = "Passive-Winter")]
    #[serde(rename = "Passive-Winter")]
    PassiveWinter,
}

impl PoolMode {
    pub fn as_hint(&self) -> ModeHint {
        match self {
            PoolMode::Standard => ModeHint::Standard,
            PoolMode::ActiveWinter => ModeHint::ActiveWinter,
            PoolMode::PassiveWinter => ModeHint::Winter,
        }
    }
}

/// Pick the hint that counts: an override beats the device, no hint at all counts as standard.
pub fn effective_hint(mode_override: Option<PoolMode>, device_hint: Option<ModeHint>) -> ModeHint {
    match mode_override {
        Some(mode) => mode.as_hint(),
        None => device_hint.unwrap_or(ModeHint::Standard),
    }
}

pub fn resolve(config: &FiltrationConfig, hint: ModeHint) -> Mode {
    if config.get_switch_reference().is_none() || !config.is_any_enabled() {
        return Mode::Disabled;
    }
    if hint.is_passive_winter() {
        return Mode::PassiveWinter;
    }
    if config.get_winter().is_enabled() && hint.is_winterized() {
        return Mode::ActiveWinter;
    }
    if config.get_summer().is_enabled() {
        return Mode::Standard;
    }
    // Winter schedule only, but the pool is not wintering.
    Mode::Disabled
}

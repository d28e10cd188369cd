use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub mod dummy;
pub mod file;

/// Operating mode reported by the pool device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ModeHint {
    Standard,
    Opening,
    ActiveWinter,
    /// Passive wintering, the pool is closed down.
    Winter,
    Initialization,
}

impl ModeHint {
    /// The device is wintering but still wants daily circulation.
    pub fn is_winterized(&self) -> bool {
        matches!(self, ModeHint::ActiveWinter)
    }

    pub fn is_passive_winter(&self) -> bool {
        matches!(self, ModeHint::Winter)
    }
}

/// Latest known advice for the pool, replaced on each successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    objective_minutes: u32,
    mode_hint: ModeHint,
    measured_at: DateTime<Utc>,
    is_valid: bool,
}

impl Recommendation {
    pub fn new(objective_minutes: u32, mode_hint: ModeHint, measured_at: DateTime<Utc>, is_valid: bool) -> Self {
        Self {
            objective_minutes,
            mode_hint,
            measured_at,
            is_valid,
        }
    }

    pub fn get_objective_minutes(&self) -> u32 {
        self.objective_minutes
    }

    pub fn get_mode_hint(&self) -> ModeHint {
        self.mode_hint
    }

    pub fn get_measured_at(&self) -> DateTime<Utc> {
        self.measured_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }
}

#[async_trait]
pub trait RecommendationSource {
    async fn latest(&self) -> Result<Recommendation, String>;
}

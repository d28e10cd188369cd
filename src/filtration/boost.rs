use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::CommandError;

/// The boost lengths an operator can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
pub enum BoostDuration {
    #[strum(serialize = "1H")]
    #[serde(rename = "1H")]
    OneHour,
    #[strum(serialize = "2H")]
    #[serde(rename = "2H")]
    TwoHours,
    #[strum(serialize = "4H")]
    #[serde(rename = "4H")]
    FourHours,
    #[strum(serialize = "8H")]
    #[serde(rename = "8H")]
    EightHours,
    #[strum(serialize = "24H")]
    #[serde(rename = "24H")]
    OneDay,
}

impl BoostDuration {
    pub fn parse(s: &str) -> Result<Self, CommandError> {
        BoostDuration::from_str(s.trim()).map_err(|_| CommandError::InvalidBoostDuration(s.to_owned()))
    }

    pub fn as_duration(&self) -> Duration {
        Duration::hours(match self {
            BoostDuration::OneHour => 1,
            BoostDuration::TwoHours => 2,
            BoostDuration::FourHours => 4,
            BoostDuration::EightHours => 8,
            BoostDuration::OneDay => 24,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostState {
    started_at: DateTime<Utc>,
    duration: BoostDuration,
    ends_at: DateTime<Utc>,
}

impl BoostState {
    pub fn new(started_at: DateTime<Utc>, duration: BoostDuration) -> Self {
        Self {
            started_at,
            duration,
            ends_at: started_at + duration.as_duration(),
        }
    }

    pub fn get_started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn get_duration(&self) -> BoostDuration {
        self.duration
    }

    pub fn get_ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    pub fn is_active(&self, now: &DateTime<Utc>) -> bool {
        *now < self.ends_at
    }

    pub fn remaining(&self, now: &DateTime<Utc>) -> Duration {
        (self.ends_at - *now).max(Duration::zero())
    }
}

/// Holds at most one boost. A boost stays stored after it expires until it is reaped,
/// so its end can be reported even when nobody looked at the exact moment it ended.
#[derive(Debug, Default, Clone)]
pub struct BoostController {
    current: Option<BoostState>,
}

impl BoostController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(boost: Option<BoostState>) -> Self {
        Self { current: boost }
    }

    /// Start a boost now. Returns the new boost and the one it replaced, if that was still running.
    pub fn activate(&mut self, now: DateTime<Utc>, duration: BoostDuration) -> (BoostState, Option<BoostState>) {
        let new_boost = BoostState::new(now, duration);
        info!("Boost of {} activated, running until {}", duration, new_boost.ends_at);
        let superseded = self.current.replace(new_boost.clone()).filter(|old| old.is_active(&now));
        (new_boost, superseded)
    }

    /// Stop the running boost. Returns it, or None if there was nothing running.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Option<BoostState> {
        match &self.current {
            Some(boost) if boost.is_active(&now) => {
                info!("Boost started at {} canceled", boost.started_at);
                self.current.take()
            }
            _ => {
                debug!("No boost running, nothing to cancel");
                None
            }
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> Option<&BoostState> {
        self.current.as_ref().filter(|boost| boost.is_active(&now))
    }

    /// Remove and return a boost that has run its course.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Option<BoostState> {
        if self.current.as_ref().is_some_and(|boost| !boost.is_active(&now)) {
            return self.current.take();
        }
        None
    }

    /// The stored boost, expired or not.
    pub fn stored(&self) -> Option<&BoostState> {
        self.current.as_ref()
    }
}

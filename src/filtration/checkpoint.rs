use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ActiveWindow, EngineState};
use super::boost::BoostState;
use super::elapsed::ElapsedTracker;
use super::mode::PoolMode;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed checkpoint: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the engine needs to carry across a restart. Plans are not stored, they are recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    saved_at: DateTime<Utc>,
    boost: Option<BoostState>,
    elapsed: ElapsedTracker,
    active_window: Option<ActiveWindow>,
    #[serde(default)]
    mode_override: Option<PoolMode>,
}

impl Checkpoint {
    pub fn new(
        saved_at: DateTime<Utc>,
        boost: Option<BoostState>,
        elapsed: ElapsedTracker,
        active_window: Option<ActiveWindow>,
        mode_override: Option<PoolMode>,
    ) -> Self {
        Self {
            saved_at,
            boost,
            elapsed,
            active_window,
            mode_override,
        }
    }

    pub fn get_saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    pub(super) fn into_parts(self) -> (Option<BoostState>, ElapsedTracker, Option<ActiveWindow>, Option<PoolMode>) {
        (self.boost, self.elapsed, self.active_window, self.mode_override)
    }
}

pub async fn save(path: &Path, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
    write_atomically(path, checkpoint).await
}

/// Publish the latest engine state for readers outside the process.
pub async fn save_state(path: &Path, state: &EngineState) -> Result<(), CheckpointError> {
    write_atomically(path, state).await
}

/// Write next to the destination, then move into place.
async fn write_atomically(path: &Path, value: &impl Serialize) -> Result<(), CheckpointError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read a checkpoint. A missing file is not an error, there is just nothing to restore.
pub async fn load(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
    let s = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No checkpoint at {:?}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&s)?))
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::config::{FiltrationConfig, PoolConfig};
    use crate::config::filtration::{SlotConfig, SummerConfig, WinterConfig};
    use crate::filtration::FiltrationEngine;
    use crate::filtration::boost::BoostDuration;
    use crate::io::dummy_io_bundle::new_dummy_io;
    use crate::io::recommendation::{ModeHint, Recommendation};
    use crate::time_util::test_utils::{date, time, utc};

    #[tokio::test]
    async fn saves_and_loads() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("checkpoint.json");
        let day = date(2024, 6, 1);

        let mut elapsed = ElapsedTracker::new();
        elapsed.record_tick(&Utc, utc(day, 6, 0, 0), false);
        elapsed.record_tick(&Utc, utc(day, 7, 0, 0), true);
        let checkpoint = Checkpoint::new(
            utc(day, 7, 0, 0),
            Some(BoostState::new(utc(day, 6, 30, 0), BoostDuration::TwoHours)),
            elapsed,
            None,
            Some(PoolMode::ActiveWinter),
        );

        save(&path, &checkpoint).await.expect("Failed to save checkpoint");
        let loaded = load(&path).await.expect("Failed to load checkpoint");
        assert_eq!(loaded, Some(checkpoint));
    }

    #[tokio::test]
    async fn state_is_readable_json() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("state.json");
        let day = date(2024, 6, 1);

        let config = FiltrationConfig::new(
            Some("switch.pump".to_owned()),
            SummerConfig::new(
                true,
                0,
                0,
                SlotConfig::new("Morning", time(6, 0, 0), 50),
                SlotConfig::new("Evening", time(18, 0, 0), 50),
            ),
            WinterConfig::default(),
        );
        let mut engine = FiltrationEngine::new(Utc, PoolConfig::new("pool-1", "Pool"), config, Duration::hours(12)).unwrap();
        let (mut io, _io_handle) = new_dummy_io();
        engine.accept_recommendation(Recommendation::new(240, ModeHint::Standard, utc(day, 5, 0, 0), true));
        engine.tick(utc(day, 7, 0, 0), &mut io);
        engine.activate_boost(utc(day, 7, 0, 0), BoostDuration::OneHour).unwrap();
        let state = engine.tick(utc(day, 7, 30, 0), &mut io).clone();

        save_state(&path, &state).await.expect("Failed to save state");
        let json: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(json["phase"], "Boosted");
        assert_eq!(json["mode"], "Standard");
        assert_eq!(json["desired_pump_on"], true);
        assert_eq!(json["active_window_id"], "Boost");
        assert_eq!(json["objective_minutes_today"], 240);
        assert_eq!(json["elapsed_minutes_today"], 30);
        assert_eq!(json["recommendation_status"], "Fresh");
        assert_eq!(json["windows"].as_array().unwrap().len(), 2);
        assert_eq!(json["boost"]["duration"], "1H");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_file_is_nothing() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let loaded = load(&dir.path().join("nope.json")).await.expect("Missing file should not error");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn garbage_is_an_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("checkpoint.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(load(&path).await, Err(CheckpointError::Json(_))));
    }
}

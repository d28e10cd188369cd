use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, TimeZone, Utc};
use log::info;

use crate::config::FiltrationConfig;
use crate::io::IOBundle;
use crate::io::controls::pump::PumpControl;
use crate::io::commands::EngineCommand;
use crate::io::recommendation::Recommendation;

use super::boost::BoostState;
use super::checkpoint::Checkpoint;
use super::mode::{Mode, PoolMode};
use super::{CommandError, EngineState, FiltrationEngine};

/// Shared access to one engine. Ticks and commands take the engine lock one at a time,
/// readers only ever see the state published by a finished tick or command.
pub struct EngineHandle<Tz: TimeZone> {
    engine: Arc<Mutex<FiltrationEngine<Tz>>>,
    published: Arc<RwLock<Arc<EngineState>>>,
}

impl<Tz: TimeZone> Clone for EngineHandle<Tz> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            published: self.published.clone(),
        }
    }
}

impl<Tz: TimeZone> EngineHandle<Tz> {
    pub fn new(engine: FiltrationEngine<Tz>) -> Self {
        let state = Arc::new(engine.get_state().clone());
        Self {
            engine: Arc::new(Mutex::new(engine)),
            published: Arc::new(RwLock::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FiltrationEngine<Tz>> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, engine: &FiltrationEngine<Tz>) -> Arc<EngineState> {
        let state = Arc::new(engine.get_state().clone());
        *self.published.write().unwrap_or_else(|e| e.into_inner()) = state.clone();
        state
    }

    /// The state as of the last finished tick.
    pub fn snapshot(&self) -> Arc<EngineState> {
        self.published.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn tick(&self, now: DateTime<Utc>, io: &mut IOBundle) -> Arc<EngineState> {
        let mut engine = self.lock();
        engine.tick(now, io);
        self.publish(&engine)
    }

    pub fn accept_recommendation(&self, recommendation: Recommendation) {
        self.lock().accept_recommendation(recommendation);
    }

    pub fn activate_boost(&self, now: DateTime<Utc>, duration: &str) -> Result<BoostState, CommandError> {
        self.lock().activate_boost_named(now, duration)
    }

    pub fn cancel_boost(&self, now: DateTime<Utc>) -> Option<BoostState> {
        self.lock().cancel_boost(now)
    }

    pub fn boost_status(&self, now: DateTime<Utc>) -> Option<BoostState> {
        self.lock().boost_status(now)
    }

    pub fn set_mode(&self, mode: Option<PoolMode>) -> Mode {
        self.lock().set_mode(mode)
    }

    pub fn reconfigure(&self, config: FiltrationConfig) -> Result<(), CommandError> {
        self.lock().reconfigure(config)
    }

    /// Apply a queued command, describing what happened.
    pub fn apply(&self, command: &EngineCommand, now: DateTime<Utc>) -> Result<String, CommandError> {
        match command {
            EngineCommand::ActivateBoost { duration } => {
                let boost = self.activate_boost(now, duration)?;
                Ok(format!("Boost {} running until {}", boost.get_duration(), boost.get_ends_at()))
            }
            EngineCommand::CancelBoost => Ok(match self.cancel_boost(now) {
                Some(boost) => format!("Boost started at {} canceled", boost.get_started_at()),
                None => "No boost to cancel".to_owned(),
            }),
            EngineCommand::SetMode { mode } => {
                let resolved = self.set_mode(*mode);
                Ok(format!("Mode now resolves to {}", resolved))
            }
        }
    }

    pub fn checkpoint(&self, now: DateTime<Utc>) -> Checkpoint {
        self.lock().checkpoint(now)
    }

    pub fn restore(&self, checkpoint: Checkpoint, now: DateTime<Utc>) {
        info!("Restoring checkpoint saved at {}", checkpoint.get_saved_at());
        self.lock().restore(checkpoint, now);
    }

    pub fn replace_pump(&self, io: &mut IOBundle, pump: impl PumpControl + Send + 'static) {
        self.lock().replace_pump(io, pump);
    }

    pub fn shutdown(&self, io: &mut IOBundle) {
        let mut engine = self.lock();
        engine.shutdown(io);
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use chrono::Duration;

    use super::*;
    use crate::config::PoolConfig;
    use crate::config::filtration::{SlotConfig, SummerConfig, WinterConfig};
    use crate::filtration::Phase;
    use crate::io::dummy::DummyPump;
    use crate::io::dummy_io_bundle::new_dummy_io;
    use crate::io::recommendation::ModeHint;
    use crate::time_util::test_utils::{date, time, utc};

    fn engine() -> FiltrationEngine<Utc> {
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
        FiltrationEngine::new(Utc, PoolConfig::new("pool-1", "Pool"), config, Duration::hours(12)).unwrap()
    }

    #[test]
    fn snapshot_follows_ticks() {
        let day = date(2024, 6, 1);
        let handle = EngineHandle::new(engine());
        let (mut io, _io_handle) = new_dummy_io();
        assert!(handle.snapshot().get_evaluated_at().is_none());

        handle.accept_recommendation(Recommendation::new(240, ModeHint::Standard, utc(day, 5, 0, 0), true));
        let state = handle.tick(utc(day, 7, 0, 0), &mut io);
        assert_eq!(state.get_phase(), Phase::ScheduledOn);
        assert_eq!(*handle.snapshot(), *state);
    }

    #[test]
    fn commands_from_other_threads() {
        let day = date(2024, 6, 1);
        let handle = EngineHandle::new(engine());
        let (mut io, io_handle) = new_dummy_io();
        handle.accept_recommendation(Recommendation::new(240, ModeHint::Standard, utc(day, 5, 0, 0), true));
        handle.tick(utc(day, 12, 0, 0), &mut io);

        let remote = handle.clone();
        thread::spawn(move || {
            let outcome = remote.apply(&EngineCommand::ActivateBoost { duration: "2H".to_owned() }, utc(day, 12, 0, 0));
            assert!(outcome.is_ok());
        })
        .join()
        .unwrap();

        let state = handle.tick(utc(day, 12, 1, 0), &mut io);
        assert_eq!(state.get_phase(), Phase::Boosted);
        assert!(io_handle.pump_state().is_on());
        assert_eq!(handle.boost_status(utc(day, 13, 0, 0)).unwrap().get_ends_at(), utc(day, 14, 0, 0));
    }

    #[test]
    fn replacing_the_pump_hands_over() {
        let day = date(2024, 6, 1);
        let handle = EngineHandle::new(engine());
        let (mut io, io_handle) = new_dummy_io();
        handle.accept_recommendation(Recommendation::new(240, ModeHint::Standard, utc(day, 5, 0, 0), true));
        handle.tick(utc(day, 7, 0, 0), &mut io);
        assert!(io_handle.pump_state().is_on());

        let (new_pump, new_pump_handle) = DummyPump::create();
        handle.replace_pump(&mut io, new_pump);
        assert!(!io_handle.pump_state().is_on(), "Old pump should be switched off");
        assert!(!new_pump_handle.state().is_on());

        let state = handle.tick(utc(day, 7, 1, 0), &mut io);
        assert_eq!(state.get_phase(), Phase::ScheduledOn);
        assert!(new_pump_handle.state().is_on());
        assert_eq!(new_pump_handle.state().get_applied(), &[true]);
        assert_eq!(io_handle.pump_state().get_applied(), &[true, false]);
    }

    #[test]
    fn bad_commands_are_reported() {
        let handle = EngineHandle::new(engine());
        let now = utc(date(2024, 6, 1), 12, 0, 0);
        let result = handle.apply(&EngineCommand::ActivateBoost { duration: "3H".to_owned() }, now);
        assert!(matches!(result, Err(CommandError::InvalidBoostDuration(_))));
        assert_eq!(handle.apply(&EngineCommand::CancelBoost, now).unwrap(), "No boost to cancel");
    }
}

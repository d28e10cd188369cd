use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::config::{ConfigError, FiltrationConfig, PoolConfig};
use crate::io::IOBundle;
use crate::io::controls::pump::PumpControl;
use crate::io::controls::to_on_off;
use crate::io::live_data::{AgeType, check_age};
use crate::io::recommendation::Recommendation;
use crate::time_util::local::{local_date, round_minutes};

use boost::{BoostController, BoostDuration, BoostState};
use checkpoint::Checkpoint;
use elapsed::ElapsedTracker;
use events::{EventData, EventType, FiltrationEvent, PeriodData, WindowEndData};
use mode::{Mode, PoolMode};
use planner::{DayPlan, ScheduleWindow, WindowId};

pub mod boost;
pub mod checkpoint;
pub mod elapsed;
pub mod events;
pub mod handle;
pub mod mode;
pub mod planner;


/// Rejected commands. The engine is left exactly as it was.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("invalid boost duration {0:?}, expected one of 1H, 2H, 4H, 8H, 24H")]
    InvalidBoostDuration(String),
    #[error("filtration automation is not active (mode {0})")]
    AutomationInactive(Mode),
    #[error("configuration rejected: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// How usable the latest recommendation is. Advisory only, never fails a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum RecommendationStatus {
    Fresh,
    Stale,
    Invalid,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum Phase {
    Idle,
    ScheduledOff,
    ScheduledOn,
    Boosted,
}

/// Result of the latest tick, as read by anything outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineState {
    phase: Phase,
    mode: Mode,
    desired_pump_on: bool,
    active_window_id: Option<WindowId>,
    elapsed_minutes_today: u32,
    objective_minutes_today: u32,
    elapsed_percent: u8,
    windows: Vec<ScheduleWindow>,
    next_stop_time: Option<DateTime<Utc>>,
    boost: Option<BoostState>,
    recommendation_status: RecommendationStatus,
    actuation_healthy: bool,
    evaluated_at: Option<DateTime<Utc>>,
}

impl EngineState {
    fn initial() -> Self {
        Self {
            phase: Phase::Idle,
            mode: Mode::Disabled,
            desired_pump_on: false,
            active_window_id: None,
            elapsed_minutes_today: 0,
            objective_minutes_today: 0,
            elapsed_percent: 0,
            windows: Vec::new(),
            next_stop_time: None,
            boost: None,
            recommendation_status: RecommendationStatus::Missing,
            actuation_healthy: true,
            evaluated_at: None,
        }
    }

    pub fn get_phase(&self) -> Phase {
        self.phase
    }

    pub fn get_mode(&self) -> Mode {
        self.mode
    }

    pub fn is_desired_pump_on(&self) -> bool {
        self.desired_pump_on
    }

    pub fn get_active_window_id(&self) -> Option<WindowId> {
        self.active_window_id
    }

    pub fn get_elapsed_minutes_today(&self) -> u32 {
        self.elapsed_minutes_today
    }

    pub fn get_objective_minutes_today(&self) -> u32 {
        self.objective_minutes_today
    }

    pub fn get_elapsed_percent(&self) -> u8 {
        self.elapsed_percent
    }

    pub fn get_windows(&self) -> &[ScheduleWindow] {
        &self.windows
    }

    pub fn get_next_stop_time(&self) -> Option<DateTime<Utc>> {
        self.next_stop_time
    }

    pub fn get_boost(&self) -> Option<&BoostState> {
        self.boost.as_ref()
    }

    pub fn get_recommendation_status(&self) -> RecommendationStatus {
        self.recommendation_status
    }

    pub fn is_actuation_healthy(&self) -> bool {
        self.actuation_healthy
    }

    pub fn get_evaluated_at(&self) -> Option<DateTime<Utc>> {
        self.evaluated_at
    }
}

/// The window (or boost) the pump is currently running for.
/// Two of these are the same run when id and planned start match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    id: WindowId,
    planned_start: DateTime<Utc>,
    planned_end: DateTime<Utc>,
    started_at: DateTime<Utc>,
}

impl ActiveWindow {
    fn of_window(window: &ScheduleWindow, now: DateTime<Utc>) -> Self {
        Self {
            id: window.get_id(),
            planned_start: window.get_start(),
            planned_end: window.get_end(),
            started_at: now,
        }
    }

    fn of_boost(boost: &BoostState) -> Self {
        Self {
            id: WindowId::Boost,
            planned_start: boost.get_started_at(),
            planned_end: boost.get_ends_at(),
            started_at: boost.get_started_at(),
        }
    }

    fn same_run(&self, other: &ActiveWindow) -> bool {
        self.id == other.id && self.planned_start == other.planned_start
    }
}

struct CachedPlan {
    plan: DayPlan,
    generation: u64,
    mode: Mode,
    /// Planned without a fresh valid recommendation, replaced as soon as one arrives.
    provisional: bool,
}

/// Turns the daily recommendation, the configured mode and any boost into pump commands.
///
/// All entry points take `&mut self`, so serialising access (see [handle::EngineHandle])
/// is enough to keep ticks and commands from interleaving.
pub struct FiltrationEngine<Tz: TimeZone> {
    zone: Tz,
    pool: PoolConfig,
    config: FiltrationConfig,
    config_generation: u64,
    max_recommendation_age: Duration,
    recommendation: Option<Recommendation>,
    last_good: Option<Recommendation>,
    mode_override: Option<PoolMode>,
    plan: Option<CachedPlan>,
    /// Windows from an earlier day that were still running when the day changed.
    carried: Vec<ScheduleWindow>,
    boost: BoostController,
    elapsed: ElapsedTracker,
    active: Option<ActiveWindow>,
    /// Last pump state the engine successfully applied. None forces a command on the next tick.
    applied: Option<bool>,
    /// What the pump is believed to be doing.
    pump_on: bool,
    actuation_healthy: bool,
    catch_up_done: Option<NaiveDate>,
    /// Events raised by commands, published on the next tick.
    pending: Vec<FiltrationEvent>,
    state: EngineState,
}

impl<Tz: TimeZone> FiltrationEngine<Tz> {
    pub fn new(
        zone: Tz,
        pool: PoolConfig,
        config: FiltrationConfig,
        max_recommendation_age: Duration,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            zone,
            pool,
            config,
            config_generation: 0,
            max_recommendation_age,
            recommendation: None,
            last_good: None,
            mode_override: None,
            plan: None,
            carried: Vec::new(),
            boost: BoostController::new(),
            elapsed: ElapsedTracker::new(),
            active: None,
            applied: None,
            pump_on: false,
            actuation_healthy: true,
            catch_up_done: None,
            pending: Vec::new(),
            state: EngineState::initial(),
        })
    }

    pub fn get_state(&self) -> &EngineState {
        &self.state
    }

    pub fn get_config(&self) -> &FiltrationConfig {
        &self.config
    }

    pub fn get_pool(&self) -> &PoolConfig {
        &self.pool
    }

    pub fn boost_status(&self, now: DateTime<Utc>) -> Option<BoostState> {
        self.boost.status(now).cloned()
    }

    /// Take in the latest snapshot from the poller. Snapshots older than the one we have are ignored.
    pub fn accept_recommendation(&mut self, recommendation: Recommendation) {
        if let Some(latest) = &self.recommendation {
            if recommendation.get_measured_at() < latest.get_measured_at() {
                debug!(
                    "Ignoring recommendation measured at {}, already have one from {}",
                    recommendation.get_measured_at(),
                    latest.get_measured_at()
                );
                return;
            }
            if recommendation == *latest {
                return;
            }
        }
        if recommendation.is_valid() {
            debug!(
                "Accepted recommendation of {} minutes ({}) measured at {}",
                recommendation.get_objective_minutes(),
                recommendation.get_mode_hint(),
                recommendation.get_measured_at()
            );
            self.last_good = Some(recommendation.clone());
        } else {
            warn!("Recommendation measured at {} is marked invalid, keeping the last good plan", recommendation.get_measured_at());
        }
        self.recommendation = Some(recommendation);
    }

    pub fn activate_boost(&mut self, now: DateTime<Utc>, duration: BoostDuration) -> Result<BoostState, CommandError> {
        let mode = self.resolve_mode();
        if !mode.is_automated() {
            return Err(CommandError::AutomationInactive(mode));
        }
        if let Some(expired) = self.boost.take_expired(now) {
            let end = expired.get_ends_at();
            let event = self.boost_event(EventType::BoostEnd, &expired, end);
            self.pending.push(event);
        }
        let (boost, superseded) = self.boost.activate(now, duration);
        if let Some(old) = superseded {
            let event = self.boost_event(EventType::BoostCanceled, &old, now);
            self.pending.push(event);
        }
        let event = self.boost_event(EventType::BoostStart, &boost, boost.get_ends_at());
        self.pending.push(event);
        Ok(boost)
    }

    /// Activate a boost from its display name, e.g. "4H".
    pub fn activate_boost_named(&mut self, now: DateTime<Utc>, duration: &str) -> Result<BoostState, CommandError> {
        let duration = BoostDuration::parse(duration)?;
        self.activate_boost(now, duration)
    }

    /// Cancel the running boost, returning it. Cancelling when nothing runs is not an error.
    pub fn cancel_boost(&mut self, now: DateTime<Utc>) -> Option<BoostState> {
        let canceled = self.boost.cancel(now)?;
        let event = self.boost_event(EventType::BoostCanceled, &canceled, now);
        self.pending.push(event);
        Some(canceled)
    }

    /// Force a mode regardless of what the device reports, or go back to the device's hint with None.
    pub fn set_mode(&mut self, mode_override: Option<PoolMode>) -> Mode {
        match mode_override {
            Some(mode) => info!("Mode overridden to {}", mode),
            None => info!("Mode override cleared"),
        }
        self.mode_override = mode_override;
        self.resolve_mode()
    }

    /// Replace the configuration. Today's windows are recomputed on the next tick.
    pub fn reconfigure(&mut self, config: FiltrationConfig) -> Result<(), CommandError> {
        config.validate()?;
        if config == self.config {
            debug!("Configuration unchanged");
            return Ok(());
        }
        info!("Configuration replaced, windows will be recomputed");
        self.config = config;
        self.config_generation += 1;
        Ok(())
    }

    /// Evaluate the engine at `now`: publish events, command the pump and record the new state.
    ///
    /// In Disabled and PassiveWinter the engine plans nothing and leaves the pump alone, with one
    /// exception: if the engine itself left the pump running, it sends a single OFF on the way
    /// into the idle mode so the pump is not stranded on. No further commands follow.
    pub fn tick(&mut self, now: DateTime<Utc>, io: &mut IOBundle) -> &EngineState {
        for event in self.pending.drain(..) {
            io.events().publish(event);
        }

        self.elapsed.record_tick(&self.zone, now, self.pump_on);
        let today = local_date(&self.zone, &now);
        let status = self.recommendation_status(now);
        if status != self.state.recommendation_status {
            match status {
                RecommendationStatus::Fresh => info!("Recommendation is fresh"),
                other => warn!("Recommendation is {}, continuing on the last good plan", other),
            }
        }

        let mode = self.resolve_mode();
        if mode != self.state.mode {
            info!("Mode is now {} (was {})", mode, self.state.mode);
            if mode.is_automated() && !self.state.mode.is_automated() {
                // Re-assert the pump state once when automation resumes.
                self.applied = None;
            }
        }

        if let Some(expired) = self.boost.take_expired(now) {
            let end = expired.get_ends_at();
            self.publish_boost(io, EventType::BoostEnd, &expired, end);
        }

        if !mode.is_automated() {
            if let Some(boost) = self.boost.cancel(now) {
                info!("Automation inactive, dropping boost");
                self.publish_boost(io, EventType::BoostCanceled, &boost, now);
            }
            self.transition(io, now, today, None);
            // Hand-over OFF, only for a pump this engine switched on.
            if self.pump_on {
                self.apply_pump(io, false, "Automation inactive");
            }
            self.state = self.build_state(now, mode, status, false);
            return &self.state;
        }

        self.ensure_plan(now, today, mode, status);
        self.carried.retain(|w| w.get_end() > now);

        let boost = self.boost.status(now).cloned();
        let mut window = self.window_at(&now);
        if boost.is_none() && window.is_none() {
            window = self.try_catch_up(now, today);
        }

        let next_active = match (&boost, &window) {
            (Some(boost), _) => Some(ActiveWindow::of_boost(boost)),
            (None, Some(window)) => Some(ActiveWindow::of_window(window, now)),
            (None, None) => None,
        };
        self.transition(io, now, today, next_active);

        let desired = boost.is_some() || window.is_some();
        let reason = match (&boost, &window) {
            (Some(_), _) => "Boost running".to_owned(),
            (None, Some(window)) => format!("{} window", window.get_id()),
            (None, None) => "Outside filtration windows".to_owned(),
        };
        self.apply_pump(io, desired, &reason);

        self.state = self.build_state(now, mode, status, desired);
        &self.state
    }

    /// Hand the pump back on the way out, if the engine was the one running it.
    pub fn shutdown(&mut self, io: &mut IOBundle) {
        if self.pump_on {
            self.apply_pump(io, false, "Shutting down");
        }
    }

    /// Move to a different actuator. The old one is switched off if the engine was running it,
    /// the new one is given the desired state on the next tick.
    pub fn replace_pump(&mut self, io: &mut IOBundle, pump: impl PumpControl + Send + 'static) {
        self.shutdown(io);
        io.replace_pump(pump);
        self.applied = None;
    }

    pub fn checkpoint(&self, now: DateTime<Utc>) -> Checkpoint {
        Checkpoint::new(
            now,
            self.boost.stored().cloned(),
            self.elapsed.clone(),
            self.active.clone(),
            self.mode_override,
        )
    }

    /// Pick up where a previous process left off. Elapsed time from another day is dropped.
    pub fn restore(&mut self, checkpoint: Checkpoint, now: DateTime<Utc>) {
        let today = local_date(&self.zone, &now);
        let (boost, elapsed, active, mode_override) = checkpoint.into_parts();
        if elapsed.get_date() == Some(today) {
            self.elapsed = elapsed;
        } else {
            info!("Checkpointed elapsed time is from {:?}, starting today from zero", elapsed.get_date());
            self.elapsed = ElapsedTracker::new();
        }
        self.boost = BoostController::restore(boost);
        self.active = active;
        self.mode_override = mode_override;
    }

    fn resolve_mode(&self) -> Mode {
        let device_hint = self.recommendation.as_ref().map(|r| r.get_mode_hint());
        mode::resolve(&self.config, mode::effective_hint(self.mode_override, device_hint))
    }

    fn recommendation_status(&self, now: DateTime<Utc>) -> RecommendationStatus {
        match &self.recommendation {
            None => RecommendationStatus::Missing,
            Some(recommendation) if !recommendation.is_valid() => RecommendationStatus::Invalid,
            Some(recommendation) => {
                let age = check_age(recommendation.get_measured_at(), now, self.max_recommendation_age);
                match age.age_type() {
                    AgeType::Good => RecommendationStatus::Fresh,
                    AgeType::GettingOld => {
                        debug!("Recommendation getting old: {}", age);
                        RecommendationStatus::Fresh
                    }
                    AgeType::TooOld => RecommendationStatus::Stale,
                }
            }
        }
    }

    fn ensure_plan(&mut self, now: DateTime<Utc>, today: NaiveDate, mode: Mode, status: RecommendationStatus) {
        let fresh = match status {
            RecommendationStatus::Fresh => self.recommendation.clone(),
            _ => None,
        };
        let needs_plan = match &self.plan {
            None => true,
            Some(cached) => {
                cached.plan.get_date() != today
                    || cached.generation != self.config_generation
                    || cached.mode != mode
                    || (cached.provisional && fresh.is_some())
            }
        };
        if !needs_plan {
            return;
        }

        if let Some(old) = self.plan.take() {
            if old.plan.get_date() < today && old.mode == mode && old.generation == self.config_generation {
                let running: Vec<ScheduleWindow> = old.plan.get_windows().iter().filter(|w| w.contains(&now)).cloned().collect();
                if !running.is_empty() {
                    debug!("Carrying over into {}: {}", today, running.iter().format(", "));
                }
                self.carried.extend(running);
            }
        }

        let (basis, provisional) = match (mode, fresh) {
            (Mode::Standard, Some(fresh)) => (Some(fresh), false),
            (Mode::Standard, None) => {
                match &self.last_good {
                    Some(last_good) => warn!(
                        "No fresh recommendation, planning {} from the one measured at {}",
                        today,
                        last_good.get_measured_at()
                    ),
                    None => warn!("No valid recommendation yet, nothing to plan for {}", today),
                }
                (self.last_good.clone(), true)
            }
            _ => (None, false),
        };

        let plan = planner::plan(&self.zone, today, mode, basis.as_ref(), &self.config);
        info!(
            "Planned {} minutes of filtration for {} ({}): [{}]",
            plan.get_objective_minutes(),
            today,
            mode,
            plan.get_windows().iter().format(", ")
        );
        self.plan = Some(CachedPlan {
            plan,
            generation: self.config_generation,
            mode,
            provisional,
        });
    }

    fn planned_windows(&self) -> impl Iterator<Item = &ScheduleWindow> {
        self.carried
            .iter()
            .chain(self.plan.iter().flat_map(|cached| cached.plan.get_windows().iter()))
    }

    fn window_at(&self, now: &DateTime<Utc>) -> Option<ScheduleWindow> {
        self.planned_windows().find(|w| w.contains(now)).cloned()
    }

    fn day_objective(&self, today: NaiveDate) -> u32 {
        self.plan
            .as_ref()
            .filter(|cached| cached.plan.get_date() == today)
            .map(|cached| cached.plan.get_objective_minutes())
            .unwrap_or(0)
    }

    /// Stretch slot2 once a day when it ended short of the day's objective.
    fn try_catch_up(&mut self, now: DateTime<Utc>, today: NaiveDate) -> Option<ScheduleWindow> {
        if !self.config.get_summer().is_catch_up_last_slot() || self.catch_up_done == Some(today) {
            return None;
        }
        let slot2_start = self.active.as_ref().filter(|a| a.id == WindowId::Slot2)?.planned_start;
        let elapsed = self.elapsed.elapsed_minutes();
        let cached = self.plan.as_mut().filter(|cached| cached.plan.get_date() == today)?;
        let objective = cached.plan.get_objective_minutes();
        if elapsed >= objective {
            return None;
        }
        let slot2 = cached
            .plan
            .get_window_mut(WindowId::Slot2)
            .filter(|w| w.get_start() == slot2_start)?;
        let remaining = objective - elapsed;
        slot2.extend_to(now + Duration::minutes(remaining as i64));
        info!(
            "Slot2 ended at {}/{} minutes, extending it by {} minutes to {}",
            elapsed,
            objective,
            remaining,
            slot2.get_end()
        );
        self.catch_up_done = Some(today);
        Some(slot2.clone())
    }

    fn transition(&mut self, io: &mut IOBundle, now: DateTime<Utc>, today: NaiveDate, next: Option<ActiveWindow>) {
        let same_run = match (&self.active, &next) {
            (Some(current), Some(next)) => current.same_run(next),
            (None, None) => true,
            _ => false,
        };
        if same_run {
            if let (Some(current), Some(next)) = (self.active.as_mut(), next) {
                current.planned_end = next.planned_end;
            }
            return;
        }

        if let Some(previous) = self.active.take() {
            if let Some(end_event) = previous.id.end_event() {
                let data = self.window_end_data(&previous, now, today);
                self.publish(io, end_event, EventData::WindowEnd(data));
            }
        }
        if let Some(next) = &next {
            if let Some(start_event) = next.id.start_event() {
                let data = PeriodData {
                    start_time: self.local(now),
                    end_time: self.local(next.planned_end),
                    duration_minutes: round_minutes(next.planned_end - now),
                };
                self.publish(io, start_event, EventData::Period(data));
            }
        }
        self.active = next;
    }

    fn window_end_data(&self, window: &ActiveWindow, now: DateTime<Utc>, today: NaiveDate) -> WindowEndData {
        let objective = self.day_objective(today);
        let progress = self.elapsed.snapshot(objective);
        let boost = self.boost.status(now);
        WindowEndData {
            start_time: self.local(window.started_at),
            end_time: self.local(now),
            duration_minutes: round_minutes(now - window.started_at),
            boost_in_progress: boost.is_some(),
            remaining_boost_duration_minutes: boost.map(|b| round_minutes(b.remaining(&now))).unwrap_or(0),
            day_filtration_objective_minutes: objective,
            day_filtration_elapsed_minutes: progress.elapsed_minutes,
            day_filtration_elapsed_percent: progress.percent,
        }
    }

    fn apply_pump(&mut self, io: &mut IOBundle, on: bool, reason: &str) {
        if self.applied == Some(on) {
            return;
        }
        match io.pump().set_pump(on, Some(reason)) {
            Ok(()) => {
                self.applied = Some(on);
                self.pump_on = on;
                if !self.actuation_healthy {
                    info!("Pump actuation recovered");
                }
                self.actuation_healthy = true;
            }
            Err(failure) => {
                warn!("Failed to switch pump {}, will retry next tick: {}", to_on_off(on), failure.get_description());
                debug!("{}", failure);
                self.applied = None;
                self.actuation_healthy = false;
            }
        }
    }

    fn build_state(&self, now: DateTime<Utc>, mode: Mode, status: RecommendationStatus, desired: bool) -> EngineState {
        let today = local_date(&self.zone, &now);
        let boost = self.boost.status(now).cloned();
        let (phase, windows, objective) = if mode.is_automated() {
            let phase = match (&boost, &self.active) {
                (Some(_), _) => Phase::Boosted,
                (None, Some(_)) => Phase::ScheduledOn,
                (None, None) => Phase::ScheduledOff,
            };
            (phase, self.planned_windows().cloned().collect(), self.day_objective(today))
        } else {
            (Phase::Idle, Vec::new(), 0)
        };

        let progress = self.elapsed.snapshot(objective);
        EngineState {
            phase,
            mode,
            desired_pump_on: desired,
            active_window_id: self.active.as_ref().map(|a| a.id),
            elapsed_minutes_today: progress.elapsed_minutes,
            objective_minutes_today: objective,
            elapsed_percent: progress.percent,
            windows,
            next_stop_time: self.active.as_ref().map(|a| a.planned_end),
            boost,
            recommendation_status: status,
            actuation_healthy: self.actuation_healthy,
            evaluated_at: Some(now),
        }
    }

    fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.zone).fixed_offset()
    }

    fn boost_event(&self, event_type: EventType, boost: &BoostState, end: DateTime<Utc>) -> FiltrationEvent {
        let data = PeriodData {
            start_time: self.local(boost.get_started_at()),
            end_time: self.local(end),
            duration_minutes: (end - boost.get_started_at()).num_minutes(),
        };
        self.event(event_type, EventData::Period(data))
    }

    fn publish_boost(&self, io: &mut IOBundle, event_type: EventType, boost: &BoostState, end: DateTime<Utc>) {
        io.events().publish(self.boost_event(event_type, boost, end));
    }

    fn publish(&self, io: &mut IOBundle, event_type: EventType, data: EventData) {
        io.events().publish(self.event(event_type, data));
    }

    fn event(&self, event_type: EventType, data: EventData) -> FiltrationEvent {
        debug!("Event {}", event_type);
        FiltrationEvent::new(self.pool.get_id().to_owned(), self.pool.get_title().to_owned(), event_type, data)
    }
}

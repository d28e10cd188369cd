use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::config::FiltrationConfig;
use crate::filtration::events::EventType;
use crate::filtration::mode::Mode;
use crate::io::recommendation::Recommendation;
use crate::time_util::local::resolve_local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum WindowId {
    Slot1,
    Slot2,
    Winter,
    Boost,
}

impl WindowId {
    pub fn start_event(&self) -> Option<EventType> {
        match self {
            WindowId::Slot1 => Some(EventType::Slot1Start),
            WindowId::Slot2 => Some(EventType::Slot2Start),
            WindowId::Winter => Some(EventType::WinterStart),
            WindowId::Boost => None,
        }
    }

    pub fn end_event(&self) -> Option<EventType> {
        match self {
            WindowId::Slot1 => Some(EventType::Slot1End),
            WindowId::Slot2 => Some(EventType::Slot2End),
            WindowId::Winter => Some(EventType::WinterEnd),
            WindowId::Boost => None,
        }
    }
}

/// A half-open interval `[start, end)` during which the pump should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    id: WindowId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ScheduleWindow {
    pub fn new(id: WindowId, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { id, start, end }
    }

    pub fn get_id(&self) -> WindowId {
        self.id
    }

    pub fn get_start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn get_end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, now: &DateTime<Utc>) -> bool {
        self.start <= *now && *now < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Push the end out. Identity (id and start) is unchanged.
    pub fn extend_to(&mut self, end: DateTime<Utc>) {
        if end > self.end {
            self.end = end;
        }
    }
}

impl Display for ScheduleWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{} - {})", self.id, self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduleFamily {
    Summer,
    Winter,
}

/// The windows for one local calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayPlan {
    date: NaiveDate,
    family: Option<ScheduleFamily>,
    objective_minutes: u32,
    windows: Vec<ScheduleWindow>,
}

impl DayPlan {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            family: None,
            objective_minutes: 0,
            windows: Vec::new(),
        }
    }

    pub fn get_date(&self) -> NaiveDate {
        self.date
    }

    pub fn get_family(&self) -> Option<ScheduleFamily> {
        self.family
    }

    /// Total filtration time planned for the day.
    pub fn get_objective_minutes(&self) -> u32 {
        self.objective_minutes
    }

    pub fn get_windows(&self) -> &[ScheduleWindow] {
        &self.windows
    }

    pub fn get_window_mut(&mut self, id: WindowId) -> Option<&mut ScheduleWindow> {
        self.windows.iter_mut().find(|w| w.id == id)
    }
}

/// Compute the day's windows for the governing schedule family.
///
/// Standard mode splits the clamped recommendation between the two slots, slot1 by
/// rounding its percentage and slot2 taking the remainder so nothing is lost.
/// A slot that would still be running when the next one is due pushes the next one back.
/// Active winter runs one fixed window. Every other mode plans nothing.
pub fn plan<Tz: TimeZone>(
    zone: &Tz,
    date: NaiveDate,
    mode: Mode,
    recommendation: Option<&Recommendation>,
    config: &FiltrationConfig,
) -> DayPlan {
    match mode {
        Mode::Standard if config.get_summer().is_enabled() => match recommendation {
            Some(recommendation) => plan_summer(zone, date, recommendation.get_objective_minutes(), config),
            None => DayPlan {
                family: Some(ScheduleFamily::Summer),
                ..DayPlan::empty(date)
            },
        },
        Mode::ActiveWinter if config.get_winter().is_enabled() => plan_winter(zone, date, config),
        _ => DayPlan::empty(date),
    }
}

fn plan_summer<Tz: TimeZone>(zone: &Tz, date: NaiveDate, recommended_minutes: u32, config: &FiltrationConfig) -> DayPlan {
    let summer = config.get_summer();
    let total = summer.clamp_duration(recommended_minutes);
    let slot1_minutes = rounded_share(total, summer.get_slot1().get_duration_percent());
    let slot2_minutes = total - slot1_minutes;

    let slot1_start = resolve_local(zone, date, summer.get_slot1().get_start_time());
    let slot1 = ScheduleWindow::new(WindowId::Slot1, slot1_start, slot1_start + Duration::minutes(slot1_minutes as i64));

    let mut slot2_start = resolve_local(zone, date, summer.get_slot2().get_start_time());
    if !slot1.is_empty() && slot1.end > slot2_start {
        slot2_start = slot1.end;
    }
    let slot2 = ScheduleWindow::new(WindowId::Slot2, slot2_start, slot2_start + Duration::minutes(slot2_minutes as i64));

    DayPlan {
        date,
        family: Some(ScheduleFamily::Summer),
        objective_minutes: total,
        windows: [slot1, slot2].into_iter().filter(|w| !w.is_empty()).collect(),
    }
}

fn plan_winter<Tz: TimeZone>(zone: &Tz, date: NaiveDate, config: &FiltrationConfig) -> DayPlan {
    let winter = config.get_winter();
    let start = resolve_local(zone, date, winter.get_start_time());
    let window = ScheduleWindow::new(WindowId::Winter, start, start + Duration::minutes(winter.get_duration() as i64));

    DayPlan {
        date,
        family: Some(ScheduleFamily::Winter),
        objective_minutes: winter.get_duration(),
        windows: if window.is_empty() { Vec::new() } else { vec![window] },
    }
}

fn rounded_share(total: u32, percent: u8) -> u32 {
    ((total as u64 * percent as u64 + 50) / 100) as u32
}

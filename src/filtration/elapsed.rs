use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::time_util::local::{local_date, start_of_local_day};

/// Pump run time for the current local day, measured from the engine's own ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedTracker {
    date: Option<NaiveDate>,
    elapsed_seconds: i64,
    last_tick: Option<DateTime<Utc>>,
}

impl ElapsedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for the interval since the previous tick.
    /// `pump_on` is whether the pump ran during that interval.
    pub fn record_tick<Tz: TimeZone>(&mut self, zone: &Tz, now: DateTime<Utc>, pump_on: bool) {
        let today = local_date(zone, &now);

        if let (Some(last_tick), Some(date)) = (self.last_tick, self.date) {
            if now < last_tick {
                warn!("Clock went backwards from {} to {}, not counting this interval", last_tick, now);
                if today != date {
                    self.elapsed_seconds = 0;
                }
            } else if today != date {
                debug!("New day {}, resetting elapsed filtration time ({}s on {})", today, self.elapsed_seconds, date);
                // Only the part of the interval after local midnight belongs to today.
                let midnight = start_of_local_day(zone, today);
                self.elapsed_seconds = if pump_on {
                    (now - midnight.max(last_tick)).num_seconds().max(0)
                } else {
                    0
                };
            } else if pump_on {
                self.elapsed_seconds += (now - last_tick).num_seconds();
            }
        }

        self.date = Some(today);
        self.last_tick = Some(now);
    }

    pub fn get_date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn elapsed_minutes(&self) -> u32 {
        (self.elapsed_seconds / 60) as u32
    }

    /// Progress towards the objective, capped at 100.
    pub fn percent_of(&self, objective_minutes: u32) -> u8 {
        if objective_minutes == 0 {
            return 0;
        }
        let percent = (self.elapsed_minutes() as f64 / objective_minutes as f64 * 100.0).round();
        percent.min(100.0) as u8
    }

    pub fn snapshot(&self, objective_minutes: u32) -> ElapsedSnapshot {
        ElapsedSnapshot {
            elapsed_minutes: self.elapsed_minutes(),
            percent: self.percent_of(objective_minutes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedSnapshot {
    pub elapsed_minutes: u32,
    pub percent: u8,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset};
    use chrono_tz::Europe::Paris;

    use super::*;
    use crate::time_util::test_utils::{date, utc};

    #[test]
    fn counts_only_while_on() {
        let day = date(2024, 6, 1);
        let mut tracker = ElapsedTracker::new();
        tracker.record_tick(&Utc, utc(day, 6, 0, 0), false);
        tracker.record_tick(&Utc, utc(day, 7, 0, 0), true);
        tracker.record_tick(&Utc, utc(day, 8, 0, 0), false);
        tracker.record_tick(&Utc, utc(day, 8, 30, 0), true);
        assert_eq!(tracker.elapsed_minutes(), 90);
    }

    #[test]
    fn first_tick_counts_nothing() {
        let mut tracker = ElapsedTracker::new();
        tracker.record_tick(&Utc, utc(date(2024, 6, 1), 12, 0, 0), true);
        assert_eq!(tracker.elapsed_minutes(), 0);
    }

    #[test]
    fn resets_at_local_midnight() {
        let mut tracker = ElapsedTracker::new();
        tracker.record_tick(&Utc, utc(date(2024, 6, 1), 20, 0, 0), false);
        tracker.record_tick(&Utc, utc(date(2024, 6, 1), 23, 50, 0), true);
        assert_eq!(tracker.elapsed_minutes(), 230);

        tracker.record_tick(&Utc, utc(date(2024, 6, 2), 0, 10, 0), true);
        assert_eq!(tracker.get_date(), Some(date(2024, 6, 2)));
        assert_eq!(tracker.elapsed_minutes(), 10);
    }

    #[test]
    fn midnight_follows_zone() {
        let zone = FixedOffset::east_opt(2 * 3600).unwrap();
        let mut tracker = ElapsedTracker::new();
        // 21:30 and 22:30 UTC are 23:30 and 00:30 local.
        tracker.record_tick(&zone, utc(date(2024, 6, 1), 21, 30, 0), false);
        tracker.record_tick(&zone, utc(date(2024, 6, 1), 22, 30, 0), true);
        assert_eq!(tracker.get_date(), Some(date(2024, 6, 2)));
        assert_eq!(tracker.elapsed_minutes(), 30);
    }

    #[test]
    fn short_day_counts_real_time_since_midnight() {
        // Paris midnight on 2024-03-31 is 23:00 UTC the day before, and the clocks skip an hour at 02:00.
        let mut tracker = ElapsedTracker::new();
        tracker.record_tick(&Paris, utc(date(2024, 3, 30), 22, 30, 0), false);
        tracker.record_tick(&Paris, utc(date(2024, 3, 31), 1, 30, 0), true);
        assert_eq!(tracker.get_date(), Some(date(2024, 3, 31)));
        // 03:30 on the wall clock, but only 150 minutes have passed since midnight.
        assert_eq!(tracker.elapsed_minutes(), 150);
    }

    #[test]
    fn repeated_hour_is_counted_once() {
        // From 02:00 CEST to 03:00 CET on 2024-10-27 is two real hours on the same local day.
        let day = date(2024, 10, 27);
        let mut tracker = ElapsedTracker::new();
        tracker.record_tick(&Paris, utc(day, 0, 0, 0), false);
        tracker.record_tick(&Paris, utc(day, 2, 0, 0), true);
        assert_eq!(tracker.get_date(), Some(day));
        assert_eq!(tracker.elapsed_minutes(), 120);
    }

    #[test]
    fn clock_going_backwards_adds_nothing() {
        let day = date(2024, 6, 1);
        let mut tracker = ElapsedTracker::new();
        tracker.record_tick(&Utc, utc(day, 10, 0, 0), false);
        tracker.record_tick(&Utc, utc(day, 11, 0, 0), true);
        tracker.record_tick(&Utc, utc(day, 10, 30, 0), true);
        assert_eq!(tracker.elapsed_minutes(), 60);
        tracker.record_tick(&Utc, utc(day, 10, 30, 0) + Duration::minutes(15), true);
        assert_eq!(tracker.elapsed_minutes(), 75);
    }

    #[test]
    fn percent_is_capped() {
        let day = date(2024, 6, 1);
        let mut tracker = ElapsedTracker::new();
        tracker.record_tick(&Utc, utc(day, 6, 0, 0), false);
        tracker.record_tick(&Utc, utc(day, 8, 0, 0), true);
        assert_eq!(tracker.percent_of(360), 33);
        assert_eq!(tracker.percent_of(120), 100);
        assert_eq!(tracker.percent_of(60), 100);
        assert_eq!(tracker.percent_of(0), 0);
        assert_eq!(
            tracker.snapshot(240),
            ElapsedSnapshot {
                elapsed_minutes: 120,
                percent: 50
            }
        );
    }
}

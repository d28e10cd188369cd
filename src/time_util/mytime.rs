use chrono::{DateTime, Duration, TimeZone, Utc};

pub trait TimeProvider {
    fn get_utc_time(&self) -> DateTime<Utc>;

    /// The current time as seen on the pool's wall clock.
    fn get_local_time<Tz: TimeZone>(&self, zone: &Tz) -> DateTime<Tz>
    where
        Self: Sized,
    {
        self.get_utc_time().with_timezone(zone)
    }
}

#[derive(Default)]
pub struct RealTimeProvider {}

impl TimeProvider for RealTimeProvider {
    fn get_utc_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct DummyTimeProvider {
    utc_time: DateTime<Utc>,
}

impl DummyTimeProvider {
    pub fn new(utc_time: DateTime<Utc>) -> Self {
        Self { utc_time }
    }

    /// Jump to the given instant, backwards included.
    pub fn set(&mut self, utc_time: DateTime<Utc>) {
        self.utc_time = utc_time;
    }

    pub fn advance(&mut self, duration: Duration) {
        self.utc_time += duration;
    }
}

impl TimeProvider for DummyTimeProvider {
    fn get_utc_time(&self) -> DateTime<Utc> {
        self.utc_time
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Timelike};

    use super::*;
    use crate::time_util::test_utils::{date, utc};

    #[test]
    fn dummy_moves_only_when_told() {
        let start = utc(date(2024, 6, 1), 23, 30, 0);
        let mut clock = DummyTimeProvider::new(start);
        assert_eq!(clock.get_utc_time(), start);

        clock.advance(Duration::minutes(45));
        assert_eq!(clock.get_utc_time(), utc(date(2024, 6, 2), 0, 15, 0));

        clock.set(start - Duration::hours(1));
        assert_eq!(clock.get_utc_time(), utc(date(2024, 6, 1), 22, 30, 0));
    }

    #[test]
    fn local_time_follows_zone() {
        let clock = DummyTimeProvider::new(utc(date(2024, 6, 1), 23, 30, 0));
        let zone = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = clock.get_local_time(&zone);
        assert_eq!(local.date_naive(), date(2024, 6, 2));
        assert_eq!(local.hour(), 1);
    }
}

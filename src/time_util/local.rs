use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

/// Resolve a local wall-clock time on the given date into an instant.
///
/// Ambiguous times (clocks going back) resolve to the earliest instant.
/// Times that do not exist (clocks going forward) resolve to the first valid
/// instant after the gap, so 02:30 during a spring-forward at 02:00 becomes 03:00.
pub fn resolve_local<Tz: TimeZone>(zone: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Walk forward until we leave the gap. Gaps are never longer than a few hours.
            let mut shifted = naive;
            for _ in 0..(4 * 60) {
                shifted += Duration::minutes(1);
                if let Some(dt) = zone.from_local_datetime(&shifted).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&naive)
        }
    }
}

/// The local calendar date of the given instant.
pub fn local_date<Tz: TimeZone>(zone: &Tz, now: &DateTime<Utc>) -> NaiveDate {
    now.with_timezone(zone).date_naive()
}

/// The instant of the local midnight starting the given date.
pub fn start_of_local_day<Tz: TimeZone>(zone: &Tz, date: NaiveDate) -> DateTime<Utc> {
    resolve_local(zone, date, NaiveTime::MIN)
}

/// Whole minutes between two instants, rounded to the nearest minute.
pub fn round_minutes(duration: Duration) -> i64 {
    let secs = duration.num_seconds();
    if secs >= 0 {
        (secs + 30) / 60
    } else {
        (secs - 30) / 60
    }
}

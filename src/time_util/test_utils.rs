use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

pub fn time(hour: u32, minute: u32, second: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, second).unwrap_or_else(|| panic!("Expected {:0>2}:{:0>2}:{:0>2} to be a valid time", hour, minute, second))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| panic!("Expected {:0>4}-{:0>2}-{:0>2} to be a valid date", year, month, day))
}

/// A UTC instant on the given date, handy with engines evaluated in UTC.
pub fn utc(date: NaiveDate, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time(hour, minute, second)))
}

use std::sync::mpsc::Sender;

use chrono::{DateTime, FixedOffset};
use log::{error, info};
use serde::Serialize;
use serde_with::SerializeDisplay;
use strum_macros::{Display, EnumIter};

/// Fixed taxonomy of lifecycle events published at schedule transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, SerializeDisplay)]
pub enum EventType {
    #[strum(to_string = "BOOST_START")]
    BoostStart,
    #[strum(to_string = "BOOST_END")]
    BoostEnd,
    #[strum(to_string = "BOOST_CANCELED")]
    BoostCanceled,
    #[strum(to_string = "SLOT1_START")]
    Slot1Start,
    #[strum(to_string = "SLOT1_END")]
    Slot1End,
    #[strum(to_string = "SLOT2_START")]
    Slot2Start,
    #[strum(to_string = "SLOT2_END")]
    Slot2End,
    #[strum(to_string = "WINTER_START")]
    WinterStart,
    #[strum(to_string = "WINTER_END")]
    WinterEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiltrationEvent {
    pool_id: String,
    pool_title: String,
    #[serde(rename = "type")]
    event_type: EventType,
    data: EventData,
}

impl FiltrationEvent {
    pub fn new(pool_id: String, pool_title: String, event_type: EventType, data: EventData) -> Self {
        Self {
            pool_id,
            pool_title,
            event_type,
            data,
        }
    }

    pub fn get_event_type(&self) -> EventType {
        self.event_type
    }

    pub fn get_data(&self) -> &EventData {
        &self.data
    }

    pub fn get_pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn get_pool_title(&self) -> &str {
        &self.pool_title
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    /// Boost events and window starts.
    Period(PeriodData),
    /// Window ends, with the day's progress at that moment.
    WindowEnd(WindowEndData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodData {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowEndData {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub duration_minutes: i64,
    pub boost_in_progress: bool,
    pub remaining_boost_duration_minutes: i64,
    pub day_filtration_objective_minutes: u32,
    pub day_filtration_elapsed_minutes: u32,
    pub day_filtration_elapsed_percent: u8,
}

/// Where the engine writes its events. The transport behind it is not the engine's concern.
pub trait EventSink {
    fn publish(&mut self, event: FiltrationEvent);
}

impl EventSink for Vec<FiltrationEvent> {
    fn publish(&mut self, event: FiltrationEvent) {
        self.push(event);
    }
}

impl EventSink for Sender<FiltrationEvent> {
    fn publish(&mut self, event: FiltrationEvent) {
        if let Err(e) = self.send(event) {
            error!("Dropped event, receiver has gone: {:?}", e.0.get_event_type());
        }
    }
}

/// Writes every event to the log as one JSON line.
#[derive(Default)]
pub struct LogEventSink {}

impl EventSink for LogEventSink {
    fn publish(&mut self, event: FiltrationEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "pool_filtration::events", "{}", json),
            Err(e) => error!("Failed to serialize event {}: {}", event.get_event_type(), e),
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn event_names() {
        let names: Vec<String> = EventType::iter().map(|e| e.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "BOOST_START", "BOOST_END", "BOOST_CANCELED",
                "SLOT1_START", "SLOT1_END", "SLOT2_START", "SLOT2_END",
                "WINTER_START", "WINTER_END",
            ]
        );
    }

    #[test]
    fn serializes_with_type_and_data() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let start = offset.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let end = offset.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap();
        let event = FiltrationEvent::new(
            "pool-1".to_owned(),
            "My Pool".to_owned(),
            EventType::BoostStart,
            EventData::Period(PeriodData {
                start_time: start,
                end_time: end,
                duration_minutes: 240,
            }),
        );

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BOOST_START");
        assert_eq!(json["pool_id"], "pool-1");
        assert_eq!(json["pool_title"], "My Pool");
        assert_eq!(json["data"]["start_time"], "2024-06-01T10:00:00+01:00");
        assert_eq!(json["data"]["duration_minutes"], 240);
    }

    #[test]
    fn channel_sink_delivers() {
        let (mut sender, receiver) = std::sync::mpsc::channel();
        let offset = FixedOffset::east_opt(0).unwrap();
        let at = offset.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        sender.publish(FiltrationEvent::new(
            "p".to_owned(),
            "t".to_owned(),
            EventType::WinterStart,
            EventData::Period(PeriodData { start_time: at, end_time: at, duration_minutes: 0 }),
        ));
        assert_eq!(receiver.try_recv().unwrap().get_event_type(), EventType::WinterStart);
    }
}

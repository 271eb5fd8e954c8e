//! Extracts the metadata the reconciler needs from an opaque iCalendar blob

use chrono::{DateTime, TimeZone, Utc};
use ical::parser::ical::component::IcalEvent;

use crate::error::{Result, SyncError};

/// The handful of fields the reconciler cares about, pulled out of a raw VEVENT
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetadata {
    pub uid: String,
    pub last_modified: DateTime<Utc>,
    pub summary: String,
    pub dtstart: Option<DateTime<Utc>>,
    pub dtend: Option<DateTime<Utc>>,
}

/// Parse `raw` and extract [`EventMetadata`]
///
/// Falls back to DTSTAMP when LAST-MODIFIED is absent, per the calendar data model. Fails if the
/// blob holds no single VEVENT, or neither timestamp is present.
pub fn extract_metadata(raw: &str) -> Result<EventMetadata> {
    let mut reader = ical::IcalParser::new(raw.as_bytes());
    let calendar = match reader.next() {
        None => return Err(SyncError::Codec("no VCALENDAR found".into())),
        Some(Err(err)) => return Err(SyncError::Codec(format!("malformed iCalendar data: {}", err))),
        Some(Ok(cal)) => cal,
    };

    if calendar.events.len() != 1 {
        return Err(SyncError::Codec(format!(
            "expected exactly one VEVENT, found {}",
            calendar.events.len()
        )));
    }
    let event = &calendar.events[0];

    let uid = find_prop(event, "UID")
        .ok_or_else(|| SyncError::Codec("event has no UID".into()))?;
    let summary = find_prop(event, "SUMMARY").unwrap_or_default();

    let last_modified = find_prop(event, "LAST-MODIFIED")
        .or_else(|| find_prop(event, "DTSTAMP"))
        .ok_or_else(|| SyncError::Codec(format!("event {} has neither LAST-MODIFIED nor DTSTAMP", uid)))?;
    let last_modified = parse_ical_datetime(&last_modified)
        .ok_or_else(|| SyncError::Codec(format!("event {} has an unparseable timestamp", uid)))?;

    let dtstart = find_prop(event, "DTSTART").and_then(|v| parse_ical_datetime(&v));
    let dtend = find_prop(event, "DTEND").and_then(|v| parse_ical_datetime(&v));

    Ok(EventMetadata {
        uid,
        last_modified,
        summary,
        dtstart,
        dtend,
    })
}

fn find_prop(event: &IcalEvent, name: &str) -> Option<String> {
    event
        .properties
        .iter()
        .find(|p| p.name == name)
        .and_then(|p| p.value.clone())
}

/// Parse a DATE-TIME or DATE iCalendar value into a UTC timestamp
///
/// Only the forms this crate ever writes or reasonably expects to read back are supported:
/// floating/UTC `YYYYMMDDTHHMMSS[Z]` and all-day `YYYYMMDD` (midnight UTC).
pub fn parse_ical_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = Utc.datetime_from_str(value.trim_end_matches('Z'), "%Y%m%dT%H%M%S") {
        return Some(dt);
    }
    if value.len() == 8 {
        if let Ok(date) = Utc.datetime_from_str(&format!("{}T000000", value), "%Y%m%dT%H%M%S") {
            return Some(date);
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    const EXAMPLE_EVENT: &str = "BEGIN:VCALENDAR\r\n\
        VERSION:2.0\r\n\
        PRODID:-//calsync-test//EN\r\n\
        BEGIN:VEVENT\r\n\
        UID:event-1\r\n\
        DTSTAMP:20240101T100000Z\r\n\
        LAST-MODIFIED:20240102T110000Z\r\n\
        DTSTART:20240105T090000Z\r\n\
        DTEND:20240105T100000Z\r\n\
        SUMMARY:Lunch\r\n\
        END:VEVENT\r\n\
        END:VCALENDAR\r\n";

    #[test]
    fn extracts_full_metadata() {
        let meta = extract_metadata(EXAMPLE_EVENT).unwrap();
        assert_eq!(meta.uid, "event-1");
        assert_eq!(meta.summary, "Lunch");
        assert_eq!(meta.last_modified, Utc.ymd(2024, 1, 2).and_hms(11, 0, 0));
        assert_eq!(meta.dtstart, Some(Utc.ymd(2024, 1, 5).and_hms(9, 0, 0)));
    }

    #[test]
    fn falls_back_to_dtstamp() {
        let raw = EXAMPLE_EVENT.replace("LAST-MODIFIED:20240102T110000Z\r\n", "");
        let meta = extract_metadata(&raw).unwrap();
        assert_eq!(meta.last_modified, Utc.ymd(2024, 1, 1).and_hms(10, 0, 0));
    }

    #[test]
    fn rejects_missing_uid() {
        let raw = EXAMPLE_EVENT.replace("UID:event-1\r\n", "");
        assert!(extract_metadata(&raw).is_err());
    }

    #[test]
    fn rejects_multiple_events() {
        let mut raw = EXAMPLE_EVENT.trim_end().to_string();
        raw.push_str("\r\n");
        raw.push_str(EXAMPLE_EVENT);
        assert!(extract_metadata(&raw).is_err());
    }
}

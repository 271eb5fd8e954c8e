//! Synthesizes and patches iCalendar blobs
//!
//! Building a fresh placeholder goes through the `ics` crate, the same way every other calendar
//! item this crate emits is built. Patching an *existing* blob does not go through `ics` at all:
//! rebuilding the whole VEVENT would lose properties this crate doesn't understand, so
//! [`patch_times`] rewrites only the DTSTART/DTEND lines in place.

use chrono::{DateTime, Utc};
use ics::properties::{DtEnd, DtStart, Summary};
use ics::{Event, ICalendar};

use crate::error::{Result, SyncError};
use crate::event::BUSY_SUMMARY;

const BUSY_PRODID: &str = "-//busy-sync//";

fn format_date_time(dt: &DateTime<Utc>) -> String {
    format!("{}Z", dt.format("%Y%m%dT%H%M%S"))
}

/// Build a minimal VEVENT mirroring only a time window, for the busy-mirror mode
pub fn build_busy(uid: &str, dtstart: DateTime<Utc>, dtend: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mut event = Event::new(uid, format_date_time(&now));
    event.push(DtStart::new(format_date_time(&dtstart)));
    event.push(DtEnd::new(format_date_time(&dtend)));
    event.push(Summary::new(BUSY_SUMMARY));

    let mut calendar = ICalendar::new("2.0", BUSY_PRODID);
    calendar.add_event(event);
    calendar.to_string()
}

/// Rewrite only the DTSTART/DTEND lines of the first VEVENT in `raw`, leaving every other
/// property (including line endings and unknown X- properties) untouched.
pub fn patch_times(raw: &str, new_start: DateTime<Utc>, new_end: DateTime<Utc>) -> Result<String> {
    let uses_crlf = raw.contains("\r\n");
    let eol = if uses_crlf { "\r\n" } else { "\n" };

    let mut saw_start = false;
    let mut saw_end = false;
    let mut out_lines: Vec<String> = Vec::new();

    for line in raw.split("\r\n").flat_map(|l| l.split('\n')) {
        if line.is_empty() && out_lines.last().map(|l: &String| l.is_empty()).unwrap_or(false) {
            continue;
        }
        if is_property(line, "DTSTART") {
            out_lines.push(format!("DTSTART:{}", format_date_time(&new_start)));
            saw_start = true;
        } else if is_property(line, "DTEND") {
            out_lines.push(format!("DTEND:{}", format_date_time(&new_end)));
            saw_end = true;
        } else {
            out_lines.push(line.to_string());
        }
    }

    if !saw_start || !saw_end {
        return Err(SyncError::Codec("event has no DTSTART/DTEND to patch".into()));
    }

    let mut out = out_lines.join(eol);
    if !out.ends_with(eol) {
        out.push_str(eol);
    }
    Ok(out)
}

fn is_property(line: &str, name: &str) -> bool {
    match line.find(':') {
        None => false,
        Some(colon) => {
            let head = &line[..colon];
            head == name || head.starts_with(&format!("{};", name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builds_busy_placeholder() {
        let start = Utc.ymd(2024, 1, 5).and_hms(9, 0, 0);
        let end = Utc.ymd(2024, 1, 5).and_hms(10, 0, 0);
        let now = Utc.ymd(2024, 1, 1).and_hms(0, 0, 0);
        let ical = build_busy("u1", start, end, now);

        assert!(ical.contains("PRODID:-//busy-sync//"));
        assert!(ical.contains("UID:u1"));
        assert!(ical.contains("SUMMARY:Busy"));
        assert!(ical.contains("DTSTART:20240105T090000Z"));
        assert!(ical.contains("DTEND:20240105T100000Z"));
    }

    #[test]
    fn patches_times_preserving_other_fields() {
        let raw = "BEGIN:VCALENDAR\r\n\
            VERSION:2.0\r\n\
            BEGIN:VEVENT\r\n\
            UID:u1\r\n\
            DTSTAMP:20240101T000000Z\r\n\
            DTSTART;TZID=Europe/Paris:20240105T090000\r\n\
            DTEND:20240105T100000Z\r\n\
            SUMMARY:Lunch\r\n\
            END:VEVENT\r\n\
            END:VCALENDAR\r\n";

        let new_start = Utc.ymd(2024, 1, 5).and_hms(14, 0, 0);
        let new_end = Utc.ymd(2024, 1, 5).and_hms(15, 0, 0);
        let patched = patch_times(raw, new_start, new_end).unwrap();

        assert!(patched.contains("DTSTART:20240105T140000Z"));
        assert!(patched.contains("DTEND:20240105T150000Z"));
        assert!(patched.contains("SUMMARY:Lunch"));
        assert!(patched.contains("UID:u1"));
    }

    #[test]
    fn rejects_event_without_dtstart() {
        let raw = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:u1\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let result = patch_times(raw, Utc::now(), Utc::now());
        assert!(result.is_err());
    }
}

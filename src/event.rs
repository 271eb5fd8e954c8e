//! The in-memory view of a single calendar event, as produced by a [`crate::backend::Backend`]

use chrono::{DateTime, Utc};

/// Reserved [`EventView::summary`] value marking a placeholder created by the busy-mirror reconciler
pub const BUSY_SUMMARY: &str = "Busy";

/// One event, as fetched from a calendar
///
/// `raw` is carried verbatim through the reconciler and only inspected at the three places the
/// design calls out: metadata extraction, busy-placeholder synthesis, and time patching.
#[derive(Debug, Clone, PartialEq)]
pub struct EventView {
    pub uid: String,
    pub last_modified: DateTime<Utc>,
    pub summary: String,
    pub dtstart: Option<DateTime<Utc>>,
    pub dtend: Option<DateTime<Utc>>,
    /// Opaque backend-specific reference required for subsequent update/delete calls
    pub handle: String,
    /// Verbatim iCalendar bytes for this event
    pub raw: String,
}

impl EventView {
    pub fn is_busy_placeholder(&self) -> bool {
        self.summary == BUSY_SUMMARY
    }
}

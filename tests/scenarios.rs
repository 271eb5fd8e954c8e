//! End-to-end coverage of the reconciler+executor pipeline against an in-memory mock backend
//!
//! Mirrors the concrete scenarios this crate's reconciler design is built around: a mock
//! [`calsync::Backend`] stands in for two remote calendars, and each test drives one or two full
//! reconcile-then-execute-then-persist cycles the way [`calsync::Orchestrator`] would.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use calsync::backend::{Backend, CalendarHandle};
use calsync::error::Result;
use calsync::event::EventView;
use calsync::reconcile::full;
use calsync::state::{self, StateMode};
use chrono::{DateTime, TimeZone, Utc};

/// A single in-memory calendar, keyed by event handle
struct MockBackend {
    account: String,
    calendars: Mutex<HashMap<String, HashMap<String, EventView>>>,
}

impl MockBackend {
    fn new(account: &str) -> Self {
        Self { account: account.to_string(), calendars: Mutex::new(HashMap::new()) }
    }

    fn with_calendar(account: &str, name: &str, events: Vec<EventView>) -> Self {
        let backend = Self::new(account);
        let map = events.into_iter().map(|e| (e.handle.clone(), e)).collect();
        backend.calendars.lock().unwrap().insert(name.to_string(), map);
        backend
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_calendars_inner(&self) -> Result<Vec<(String, CalendarHandle)>> {
        Ok(self.calendars.lock().unwrap().keys().map(|n| (n.clone(), n.clone())).collect())
    }

    async fn fetch_events_inner(&self, calendar: &CalendarHandle) -> Result<Vec<EventView>> {
        Ok(self
            .calendars
            .lock()
            .unwrap()
            .get(calendar)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_event_inner(&self, calendar: &CalendarHandle, raw: &str) -> Result<()> {
        let meta = calsync::ical::extract_metadata(raw)?;
        let mut calendars = self.calendars.lock().unwrap();
        let cal = calendars.entry(calendar.clone()).or_default();
        if cal.values().any(|e| e.uid == meta.uid) {
            return Err(calsync::error::SyncError::DuplicateUid(meta.uid));
        }
        let handle = format!("{}/{}", calendar, meta.uid);
        cal.insert(
            handle.clone(),
            EventView {
                uid: meta.uid,
                last_modified: meta.last_modified,
                summary: meta.summary,
                dtstart: meta.dtstart,
                dtend: meta.dtend,
                handle,
                raw: raw.to_string(),
            },
        );
        Ok(())
    }

    async fn update_event_inner(&self, calendar: &CalendarHandle, event_handle: &str, raw: &str) -> Result<()> {
        let meta = calsync::ical::extract_metadata(raw)?;
        let mut calendars = self.calendars.lock().unwrap();
        let cal = calendars.entry(calendar.clone()).or_default();
        cal.insert(
            event_handle.to_string(),
            EventView {
                uid: meta.uid,
                last_modified: meta.last_modified,
                summary: meta.summary,
                dtstart: meta.dtstart,
                dtend: meta.dtend,
                handle: event_handle.to_string(),
                raw: raw.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_event_inner(&self, calendar: &CalendarHandle, event_handle: &str) -> Result<()> {
        self.calendars.lock().unwrap().entry(calendar.clone()).or_default().remove(event_handle);
        Ok(())
    }

    fn account_name(&self) -> &str {
        &self.account
    }
}

fn raw_event(uid: &str, summary: &str, lm: DateTime<Utc>) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:{}\r\nSUMMARY:{}\r\nLAST-MODIFIED:{}\r\nDTSTART:20240105T090000Z\r\nDTEND:20240105T100000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        uid,
        summary,
        lm.format("%Y%m%dT%H%M%SZ"),
    )
}

#[tokio::test]
async fn s1_first_run_creates_on_empty_target() {
    let lm = Utc.ymd(2024, 1, 1).and_hms(10, 0, 0);
    let raw = raw_event("U1", "Meet", lm);
    let source_event = EventView {
        uid: "U1".into(),
        last_modified: lm,
        summary: "Meet".into(),
        dtstart: None,
        dtend: None,
        handle: "src/U1".into(),
        raw,
    };

    let source = MockBackend::with_calendar("src-acct", "cal", vec![source_event]);
    let target = MockBackend::new("tgt-acct");

    let source_events = source.fetch_events(&"cal".to_string()).await.unwrap();
    let target_events = target.fetch_events(&"cal".to_string()).await.unwrap();

    let plan = full::reconcile(None, &source_events, &target_events);
    calsync::executor::execute(&plan.actions, &source, &target, "cal", "cal").await.unwrap();

    let target_events_after = target.fetch_events(&"cal".to_string()).await.unwrap();
    assert_eq!(target_events_after.len(), 1);
    assert_eq!(target_events_after[0].uid, "U1");
}

#[tokio::test]
async fn idempotent_across_two_runs() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let lm = Utc.ymd(2024, 1, 1).and_hms(10, 0, 0);
    let source_event = EventView {
        uid: "U1".into(),
        last_modified: lm,
        summary: "Meet".into(),
        dtstart: None,
        dtend: None,
        handle: "src/U1".into(),
        raw: raw_event("U1", "Meet", lm),
    };
    let source = MockBackend::with_calendar("src-acct", "cal", vec![source_event]);
    let target = MockBackend::new("tgt-acct");

    for run in 0..2 {
        let prev = state::load(&state_path, StateMode::Full);
        let source_events = source.fetch_events(&"cal".to_string()).await.unwrap();
        let target_events = target.fetch_events(&"cal".to_string()).await.unwrap();

        let plan = full::reconcile(prev.as_ref(), &source_events, &target_events);
        if run == 1 {
            assert!(plan.actions.is_empty(), "second run should be a no-op fixpoint");
        }
        calsync::executor::execute(&plan.actions, &source, &target, "cal", "cal").await.unwrap();
        state::store(&state_path, &plan.next_state).unwrap();
    }
}

#[tokio::test]
async fn s3_two_sided_delete_removes_from_target() {
    let lm = Utc.ymd(2024, 1, 1).and_hms(10, 0, 0);
    let target_event = EventView {
        uid: "U1".into(),
        last_modified: lm,
        summary: "Meet".into(),
        dtstart: None,
        dtend: None,
        handle: "tgt/U1".into(),
        raw: raw_event("U1", "Meet", lm),
    };
    let source = MockBackend::new("src-acct");
    let target = MockBackend::with_calendar("tgt-acct", "cal", vec![target_event]);

    let mut entries = std::collections::BTreeMap::new();
    entries.insert("U1".to_string(), lm);
    let prev = calsync::state::SyncState::Full { entries };

    let source_events = source.fetch_events(&"cal".to_string()).await.unwrap();
    let target_events = target.fetch_events(&"cal".to_string()).await.unwrap();
    let plan = full::reconcile(Some(&prev), &source_events, &target_events);

    calsync::executor::execute(&plan.actions, &source, &target, "cal", "cal").await.unwrap();
    assert!(target.fetch_events(&"cal".to_string()).await.unwrap().is_empty());
}

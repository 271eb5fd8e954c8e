//! The backend contract every calendar source implements
//!
//! A [`Backend`] is the only thing in this crate that talks to a network. Both [`caldav::CaldavBackend`]
//! and the [`google::GoogleBackend`] placeholder implement the same trait, so the [`crate::orchestrator`]
//! and [`crate::executor`] never need to know which kind of account they are driving.

pub mod caldav;
pub mod google;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::error::{Result, SyncError};
use crate::event::EventView;

/// An opaque reference to a calendar, returned by [`Backend::list_calendars`] and consumed by
/// every other method. Backends are free to make this whatever they like (a URL, for CalDAV).
pub type CalendarHandle = String;

/// Per-call deadline applied to every backend operation by the trait's blanket default methods.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// The backend contract. Implementors provide the `_inner` methods; the trait's default methods
/// wrap each call in [`DEFAULT_DEADLINE`], so callers never need to think about timeouts.
#[async_trait]
pub trait Backend: Send + Sync {
    /// List the calendars visible to this account, as `(display name, handle)` pairs
    async fn list_calendars_inner(&self) -> Result<Vec<(String, CalendarHandle)>>;

    /// Fetch every event currently held in the given calendar
    async fn fetch_events_inner(&self, calendar: &CalendarHandle) -> Result<Vec<EventView>>;

    /// Create a new event from raw iCalendar bytes. Returns `Err(SyncError::DuplicateUid(_))`
    /// when an event with the same UID already exists in the calendar.
    async fn create_event_inner(&self, calendar: &CalendarHandle, raw: &str) -> Result<()>;

    /// Overwrite an existing event, identified by its handle, with new raw iCalendar bytes
    async fn update_event_inner(&self, calendar: &CalendarHandle, event_handle: &str, raw: &str) -> Result<()>;

    /// Delete an event identified by its handle
    async fn delete_event_inner(&self, calendar: &CalendarHandle, event_handle: &str) -> Result<()>;

    /// Name of the account this backend was constructed for, used for error messages and logging
    fn account_name(&self) -> &str;

    /// List the calendars visible to this account, aborting past [`DEFAULT_DEADLINE`]
    async fn list_calendars(&self) -> Result<Vec<(String, CalendarHandle)>> {
        with_deadline(self.account_name(), "", self.list_calendars_inner()).await
    }

    /// Resolve a calendar by its display name
    async fn resolve_calendar(&self, name: &str) -> Result<CalendarHandle> {
        self.list_calendars()
            .await?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, handle)| handle)
            .ok_or_else(|| crate::error::SyncError::CalendarNotFound {
                account: self.account_name().to_string(),
                calendar: name.to_string(),
            })
    }

    /// Fetch every event currently held in the given calendar, aborting past [`DEFAULT_DEADLINE`]
    async fn fetch_events(&self, calendar: &CalendarHandle) -> Result<Vec<EventView>> {
        with_deadline(self.account_name(), calendar, self.fetch_events_inner(calendar)).await
    }

    /// Create a new event, aborting past [`DEFAULT_DEADLINE`]
    async fn create_event(&self, calendar: &CalendarHandle, raw: &str) -> Result<()> {
        with_deadline(self.account_name(), calendar, self.create_event_inner(calendar, raw)).await
    }

    /// Update an existing event, aborting past [`DEFAULT_DEADLINE`]
    async fn update_event(&self, calendar: &CalendarHandle, event_handle: &str, raw: &str) -> Result<()> {
        with_deadline(self.account_name(), calendar, self.update_event_inner(calendar, event_handle, raw)).await
    }

    /// Delete an event, aborting past [`DEFAULT_DEADLINE`]
    async fn delete_event(&self, calendar: &CalendarHandle, event_handle: &str) -> Result<()> {
        with_deadline(self.account_name(), calendar, self.delete_event_inner(calendar, event_handle)).await
    }
}

async fn with_deadline<T>(account: &str, calendar: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout(DEFAULT_DEADLINE, fut).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Backend {
            account: account.to_string(),
            calendar: calendar.to_string(),
            source: Box::new(DeadlineExceeded),
        }),
    }
}

#[derive(Debug)]
struct DeadlineExceeded;

impl std::fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation exceeded the {:?} deadline", DEFAULT_DEADLINE)
    }
}

impl std::error::Error for DeadlineExceeded {}

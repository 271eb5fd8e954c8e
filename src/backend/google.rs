//! A placeholder [`Backend`] for Google Calendar accounts
//!
//! Google Calendar access requires an OAuth2 dance this crate does not implement yet; every method
//! here fails with a backend error naming the account, rather than silently no-opping. Accounts of
//! type `google` are accepted by [`crate::config`] so mappings can be declared ahead of time, but
//! running one currently fails fast.

use async_trait::async_trait;

use crate::backend::{Backend, CalendarHandle};
use crate::error::{Result, SyncError};
use crate::event::EventView;

pub struct GoogleBackend {
    account: String,
    #[allow(dead_code)]
    credentials_path: String,
    #[allow(dead_code)]
    token_path: String,
}

impl GoogleBackend {
    pub fn new(account: String, credentials_path: String, token_path: String) -> Self {
        Self {
            account,
            credentials_path,
            token_path,
        }
    }

    fn unimplemented(&self) -> SyncError {
        SyncError::Backend {
            account: self.account.clone(),
            calendar: String::new(),
            source: Box::new(NotImplemented),
        }
    }
}

#[async_trait]
impl Backend for GoogleBackend {
    async fn list_calendars_inner(&self) -> Result<Vec<(String, CalendarHandle)>> {
        Err(self.unimplemented())
    }

    async fn fetch_events_inner(&self, _calendar: &CalendarHandle) -> Result<Vec<EventView>> {
        Err(self.unimplemented())
    }

    async fn create_event_inner(&self, _calendar: &CalendarHandle, _raw: &str) -> Result<()> {
        Err(self.unimplemented())
    }

    async fn update_event_inner(&self, _calendar: &CalendarHandle, _event_handle: &str, _raw: &str) -> Result<()> {
        Err(self.unimplemented())
    }

    async fn delete_event_inner(&self, _calendar: &CalendarHandle, _event_handle: &str) -> Result<()> {
        Err(self.unimplemented())
    }

    fn account_name(&self) -> &str {
        &self.account
    }
}

#[derive(Debug)]
struct NotImplemented;

impl std::fmt::Display for NotImplemented {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Google Calendar OAuth2 support is not implemented yet")
    }
}

impl std::error::Error for NotImplemented {}

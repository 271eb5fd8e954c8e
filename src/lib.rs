//! This crate reconciles calendar event collections held on remote CalDAV servers.
//! CalDAV is described as "Calendaring Extensions to WebDAV" in [RFC 4791](https://datatracker.ietf.org/doc/html/rfc4791) and [RFC 7986](https://datatracker.ietf.org/doc/html/rfc7986), and the underlying iCal format is described in [RFC 5545](https://datatracker.ietf.org/doc/html/rfc5545).
//!
//! Given a [`config::Mapping`] between a source and a target calendar, the [`orchestrator`] module
//! fetches both sides through a [`backend::Backend`], hands the result to the [`reconcile`] module
//! (a pure function of previous state + both views), and applies the resulting plan through the
//! [`executor`] module. The [`state`] module persists the outcome so the next run can tell "new"
//! from "deleted" from "unchanged".
//!
//! Three modes are supported: a two-way [`reconcile::full`] sync, a one-way privacy-preserving
//! [`reconcile::busy`] mirror (with a feedback path for reschedules), and its companion
//! [`reconcile::full_oneway`] replication used to bring real events created on the mirror side back
//! upstream.
//!
//! Neither the reconciler nor the [`ical`] codec perform any I/O: they operate purely on in-memory
//! views, which is what makes the core logic exhaustively unit-testable without a network. \
//! See [`error::SyncError`] for the error taxonomy, and [`config`] for how accounts and mappings are
//! loaded from disk.

pub mod error;
pub use error::SyncError;

pub mod event;
pub use event::EventView;

pub mod ical;

pub mod backend;
pub use backend::Backend;

pub mod state;

pub mod reconcile;

pub mod executor;

pub mod config;
pub use config::{Account, Mapping, Mode};

pub mod orchestrator;
pub use orchestrator::Orchestrator;

pub mod utils;

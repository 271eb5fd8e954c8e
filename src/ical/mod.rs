//! The iCalendar codec: the only place in this crate that inspects event bytes
//!
//! [`parse::extract_metadata`] pulls out the handful of fields the reconciler needs.
//! [`build::build_busy`] synthesizes a placeholder for the busy-mirror mode, and
//! [`build::patch_times`] rewrites DTSTART/DTEND of an existing event in place, preserving
//! everything else.

pub mod parse;
pub mod build;

pub use parse::{extract_metadata, EventMetadata};
pub use build::{build_busy, patch_times};

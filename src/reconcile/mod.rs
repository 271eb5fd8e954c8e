//! The reconciler: a pure function of (previous state, source view, target view) to an action plan
//!
//! Every function in this module is synchronous and allocates only in-memory collections — no
//! network, no filesystem. That is deliberate: it is what lets [`crate::executor`] run these
//! decisions against real backends while the logic itself is covered by plain unit tests.

pub mod full;
pub mod busy;
pub mod full_oneway;

use crate::state::SyncState;

/// Which calendar an [`Action`] targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

/// One mutation the executor must perform against a backend
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create { side: Side, raw: String },
    Update { side: Side, handle: String, raw: String },
    Delete { side: Side, handle: String },
}

/// The outcome of reconciling one mapping: what to do, and what state to persist if it succeeds
#[derive(Debug, Clone)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub next_state: SyncState,
}

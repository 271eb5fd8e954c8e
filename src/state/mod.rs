//! The mode-tagged, atomically-written sync state persisted between runs
//!
//! State is the reconciler's only memory of the past: a UID→timestamp map (plus, for the
//! busy-mirror mode, a little bookkeeping for tombstones and real-event tracking). It is the
//! presence oracle that lets the reconciler tell "deleted" apart from "never seen".

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Which reconciler shape a state file holds. FULL_ONEWAY is never user-selected directly; it is
/// the companion state kept for the busy-mirror mode's feedback direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    Full,
    Busy,
    FullOneway,
}

/// The persisted state for one mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncState {
    Full {
        entries: BTreeMap<String, DateTime<Utc>>,
    },
    Busy {
        synced: BTreeMap<String, DateTime<Utc>>,
        busy_uids: BTreeSet<String>,
        tombstones: BTreeSet<String>,
        real_uids: BTreeSet<String>,
    },
    FullOneway {
        entries: BTreeMap<String, DateTime<Utc>>,
    },
}

impl SyncState {
    pub fn empty(mode: StateMode) -> Self {
        match mode {
            StateMode::Full => SyncState::Full { entries: BTreeMap::new() },
            StateMode::Busy => SyncState::Busy {
                synced: BTreeMap::new(),
                busy_uids: BTreeSet::new(),
                tombstones: BTreeSet::new(),
                real_uids: BTreeSet::new(),
            },
            StateMode::FullOneway => SyncState::FullOneway { entries: BTreeMap::new() },
        }
    }

    fn mode(&self) -> StateMode {
        match self {
            SyncState::Full { .. } => StateMode::Full,
            SyncState::Busy { .. } => StateMode::Busy,
            SyncState::FullOneway { .. } => StateMode::FullOneway,
        }
    }
}

/// Load state from `path`, provided it is tagged with `expected_mode`
///
/// Returns `Ok(None)` — never an error — when the file is absent, unreadable, malformed, or
/// tagged with a different mode: a state file is only ever consulted by the reconciler that wrote
/// it, and any other situation is indistinguishable from "first run".
pub fn load(path: &Path, expected_mode: StateMode) -> Option<SyncState> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            log::warn!("could not read state file {}: {}", path.display(), err);
            return None;
        }
    };

    let state: SyncState = match serde_json::from_slice(&bytes) {
        Ok(state) => state,
        Err(err) => {
            log::warn!("state file {} is malformed: {}", path.display(), err);
            return None;
        }
    };

    if state.mode() != expected_mode {
        log::info!(
            "state file {} is tagged {:?}, expected {:?}; starting fresh",
            path.display(),
            state.mode(),
            expected_mode
        );
        return None;
    }

    Some(state)
}

/// Persist `state` to `path`, atomically: write a temp sibling, then rename over `path`.
///
/// A crash between the write and the rename leaves the old file (or nothing) in place; the
/// renamed-to path itself is never observed half-written by a concurrent reader.
pub fn store(path: &Path, state: &SyncState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let serialized = serde_json::to_vec_pretty(state).map_err(|err| SyncError::State(err.to_string()))?;

    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp_file = std::fs::File::create(&tmp_path)?;
        tmp_file.write_all(&serialized)?;
        tmp_file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trips_full_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut entries = BTreeMap::new();
        entries.insert("u1".to_string(), Utc.ymd(2024, 1, 1).and_hms(0, 0, 0));
        let state = SyncState::Full { entries };

        store(&path, &state).unwrap();
        let loaded = load(&path, StateMode::Full).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn mode_mismatch_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        store(&path, &SyncState::empty(StateMode::Full)).unwrap();

        assert!(load(&path, StateMode::Busy).is_none());
    }

    #[test]
    fn missing_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(load(&path, StateMode::Full).is_none());
    }

    #[test]
    fn busy_state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut synced = BTreeMap::new();
        synced.insert("u1".to_string(), Utc.ymd(2024, 1, 1).and_hms(0, 0, 0));
        let mut busy_uids = BTreeSet::new();
        busy_uids.insert("u1".to_string());

        let state = SyncState::Busy {
            synced,
            busy_uids,
            tombstones: BTreeSet::new(),
            real_uids: BTreeSet::new(),
        };

        store(&path, &state).unwrap();
        let loaded = load(&path, StateMode::Busy).unwrap();
        assert_eq!(loaded, state);
    }
}

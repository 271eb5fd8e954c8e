//! One-way privacy-preserving "busy" mirror, with tombstones and a reschedule feedback path
//!
//! Only DTSTART/DTEND ever cross from source to target; the target sees opaque `Busy`
//! placeholders. If the user reschedules a placeholder on the target, the new time window flows
//! back and patches the original source event (see the `ts_target > ts_source` branch below).
//! Deletions on either side are remembered as tombstones so a placeholder the user removed cannot
//! be recreated just because the source event is still there.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::event::{EventView, BUSY_SUMMARY};
use crate::ical::{build_busy, patch_times};
use crate::reconcile::{Action, Plan, Side};
use crate::state::SyncState;

pub fn reconcile(prev: Option<&SyncState>, source: &[EventView], target: &[EventView], now: DateTime<Utc>) -> Plan {
    let empty_map = BTreeMap::new();
    let empty_set = BTreeSet::new();
    let (synced_prev, busy_uids_prev, tombstones_prev, real_uids_prev) = match prev {
        Some(SyncState::Busy { synced, busy_uids, tombstones, real_uids }) => (synced, busy_uids, tombstones, real_uids),
        _ => (&empty_map, &empty_set, &empty_set, &empty_set),
    };

    let source_by_uid: HashMap<&str, &EventView> = source.iter().map(|e| (e.uid.as_str(), e)).collect();
    let busy_meta: HashMap<&str, &EventView> = target.iter().filter(|e| e.is_busy_placeholder()).map(|e| (e.uid.as_str(), e)).collect();
    let real_meta: HashMap<&str, &EventView> = target.iter().filter(|e| !e.is_busy_placeholder()).map(|e| (e.uid.as_str(), e)).collect();

    let mut actions = Vec::new();
    let mut tombstones: BTreeSet<String> = tombstones_prev.clone();

    // Pass 1: real events gone from the source are removed from the target and tombstoned.
    for uid in real_uids_prev.difference(&source_by_uid.keys().map(|s| s.to_string()).collect()) {
        if let Some(b) = real_meta.get(uid.as_str()) {
            log::trace!("busy: real event {} vanished from source, deleting on target", uid);
            actions.push(Action::Delete { side: Side::Target, handle: b.handle.clone() });
        }
        tombstones.insert(uid.clone());
    }

    // Pass 2: real events the user deleted directly on the target are removed from the source.
    let real_meta_uids: BTreeSet<String> = real_meta.keys().map(|s| s.to_string()).collect();
    for uid in real_uids_prev.difference(&real_meta_uids) {
        if let Some(a) = source_by_uid.get(uid.as_str()) {
            log::trace!("busy: real event {} was deleted on target, deleting on source", uid);
            actions.push(Action::Delete { side: Side::Source, handle: a.handle.clone() });
        }
        tombstones.insert(uid.clone());
    }

    // Pass 3: busy placeholders the user deleted on the target also remove their source event.
    let busy_meta_uids: BTreeSet<String> = busy_meta.keys().map(|s| s.to_string()).collect();
    for uid in busy_uids_prev.difference(&busy_meta_uids) {
        if let Some(a) = source_by_uid.get(uid.as_str()) {
            log::trace!("busy: placeholder {} was deleted on target, deleting on source", uid);
            actions.push(Action::Delete { side: Side::Source, handle: a.handle.clone() });
        }
        tombstones.insert(uid.clone());
    }

    let all_uids: HashSet<&str> = synced_prev
        .keys()
        .map(String::as_str)
        .chain(source_by_uid.keys().copied())
        .chain(busy_meta.keys().copied())
        .collect();

    let mut next_synced = BTreeMap::new();
    let mut next_busy_uids = BTreeSet::new();

    for &uid in &all_uids {
        if real_meta.contains_key(uid) {
            // Busy mirroring must never touch a genuine event co-resident on the target.
            continue;
        }

        let in_synced_prev = synced_prev.contains_key(uid);
        let a = source_by_uid.get(uid);
        let b = busy_meta.get(uid);

        if in_synced_prev && a.is_none() && b.is_some() {
            log::trace!("busy: {} deleted upstream, removing placeholder", uid);
            actions.push(Action::Delete { side: Side::Target, handle: b.unwrap().handle.clone() });
            tombstones.remove(uid);
            continue;
        }

        match (a, b) {
            (Some(a), None) => {
                if tombstones.contains(uid) {
                    log::trace!("busy: {} is tombstoned, not recreating placeholder", uid);
                    continue;
                }
                let (dtstart, dtend) = match (a.dtstart, a.dtend) {
                    (Some(s), Some(e)) => (s, e),
                    _ => {
                        log::warn!("busy: source event {} has no DTSTART/DTEND, skipping", uid);
                        continue;
                    }
                };
                let raw = build_busy(uid, dtstart, dtend, now);
                actions.push(Action::Create { side: Side::Target, raw });
                next_synced.insert(uid.to_string(), a.last_modified);
                next_busy_uids.insert(uid.to_string());
            }
            (Some(a), Some(b)) => {
                if a.last_modified > b.last_modified {
                    let (dtstart, dtend) = match (a.dtstart, a.dtend) {
                        (Some(s), Some(e)) => (s, e),
                        _ => {
                            log::warn!("busy: source event {} has no DTSTART/DTEND, skipping", uid);
                            continue;
                        }
                    };
                    let raw = build_busy(uid, dtstart, dtend, now);
                    actions.push(Action::Update { side: Side::Target, handle: b.handle.clone(), raw });
                    next_synced.insert(uid.to_string(), a.last_modified);
                    next_busy_uids.insert(uid.to_string());
                } else if b.last_modified > a.last_modified {
                    let (dtstart, dtend) = match (b.dtstart, b.dtend) {
                        (Some(s), Some(e)) => (s, e),
                        _ => {
                            log::warn!("busy: placeholder {} has no DTSTART/DTEND, skipping feedback", uid);
                            continue;
                        }
                    };
                    match patch_times(&a.raw, dtstart, dtend) {
                        Ok(raw) => {
                            log::trace!("busy: {} rescheduled on target, patching source", uid);
                            actions.push(Action::Update { side: Side::Source, handle: a.handle.clone(), raw });
                            next_synced.insert(uid.to_string(), b.last_modified);
                            next_busy_uids.insert(uid.to_string());
                        }
                        Err(err) => log::warn!("busy: could not patch source event {}: {}", uid, err),
                    }
                } else {
                    next_synced.insert(uid.to_string(), a.last_modified);
                    next_busy_uids.insert(uid.to_string());
                }
            }
            (None, None) => {}
            (None, Some(_)) => {
                // A stray placeholder we have no record of creating; leave it alone.
            }
        }
    }

    Plan {
        actions,
        next_state: SyncState::Busy {
            synced: next_synced,
            busy_uids: next_busy_uids,
            tombstones,
            real_uids: real_meta.keys().map(|s| s.to_string()).collect(),
        },
    }
}

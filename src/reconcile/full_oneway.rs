//! One-way replication, source to target, used as the busy-mirror mode's feedback companion
//!
//! The source is never mutated. The only subtlety is deletion: an event must never be removed
//! from the target unless this reconciler is the one that put it there, which is exactly what
//! membership in `prev` witnesses.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::event::{EventView, BUSY_SUMMARY};
use crate::reconcile::{Action, Plan, Side};
use crate::state::SyncState;

pub fn reconcile(prev: Option<&SyncState>, source: &[EventView], target: &[EventView]) -> Plan {
    let empty = BTreeMap::new();
    let prev_entries = match prev {
        Some(SyncState::FullOneway { entries }) => entries,
        _ => &empty,
    };

    let source_by_uid: HashMap<&str, &EventView> = source
        .iter()
        .filter(|e| e.summary != BUSY_SUMMARY)
        .map(|e| (e.uid.as_str(), e))
        .collect();
    let target_by_uid: HashMap<&str, &EventView> = target.iter().map(|e| (e.uid.as_str(), e)).collect();

    let all_uids: HashSet<&str> = prev_entries
        .keys()
        .map(String::as_str)
        .chain(source_by_uid.keys().copied())
        .chain(target_by_uid.keys().copied())
        .collect();

    let mut actions = Vec::new();
    let mut next_entries = BTreeMap::new();

    for uid in all_uids {
        let in_prev = prev_entries.contains_key(uid);
        let a = source_by_uid.get(uid);
        let b = target_by_uid.get(uid);

        match (in_prev, a, b) {
            (true, None, Some(b)) => {
                log::trace!("full_oneway: {} vanished upstream, deleting on target", uid);
                actions.push(Action::Delete { side: Side::Target, handle: b.handle.clone() });
            }
            (_, Some(a), None) => {
                log::trace!("full_oneway: {} is new, creating on target", uid);
                actions.push(Action::Create { side: Side::Target, raw: a.raw.clone() });
                next_entries.insert(uid.to_string(), a.last_modified);
            }
            (_, Some(a), Some(b)) => {
                if a.last_modified > b.last_modified {
                    log::trace!("full_oneway: {} changed upstream, updating target", uid);
                    actions.push(Action::Update { side: Side::Target, handle: b.handle.clone(), raw: a.raw.clone() });
                    next_entries.insert(uid.to_string(), a.last_modified);
                } else {
                    next_entries.insert(uid.to_string(), b.last_modified);
                }
            }
            (false, None, Some(_)) => {
                // Never created by this reconciler; not ours to touch or to remember.
            }
            (true, None, None) => {}
            (false, None, None) => unreachable!("uid {} came from nowhere", uid),
        }
    }

    Plan {
        actions,
        next_state: SyncState::FullOneway { entries: next_entries },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(uid: &str, lm: i64, summary: &str, handle: &str) -> EventView {
        EventView {
            uid: uid.to_string(),
            last_modified: Utc.ymd(2024, 1, 1).and_hms(0, 0, 0) + chrono::Duration::seconds(lm),
            summary: summary.to_string(),
            dtstart: None,
            dtend: None,
            handle: handle.to_string(),
            raw: format!("RAW-{}", uid),
        }
    }

    #[test]
    fn creates_new_source_event_on_target() {
        let a = event("U1", 0, "Meet", "a1");
        let plan = reconcile(None, &[a.clone()], &[]);
        assert_eq!(plan.actions, vec![Action::Create { side: Side::Target, raw: a.raw.clone() }]);
    }

    #[test]
    fn never_deletes_target_only_event_never_seen_before() {
        let b = event("U1", 0, "Meet", "b1");
        let plan = reconcile(None, &[], &[b]);
        assert!(plan.actions.is_empty());
        match plan.next_state {
            SyncState::FullOneway { entries } => assert!(entries.is_empty()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn deletes_target_event_once_upstream_vanishes() {
        let b = event("U1", 0, "Meet", "b1");
        let prev = SyncState::FullOneway {
            entries: [("U1".to_string(), b.last_modified)].into_iter().collect(),
        };
        let plan = reconcile(Some(&prev), &[], &[b.clone()]);
        assert_eq!(plan.actions, vec![Action::Delete { side: Side::Target, handle: "b1".to_string() }]);
    }

    #[test]
    fn excludes_busy_placeholders_from_source_view() {
        let a = event("U1", 0, "Busy", "a1");
        let plan = reconcile(None, &[a], &[]);
        assert!(plan.actions.is_empty());
    }
}

//! Two-way reconciliation: both sides may create, edit or delete; the newer `LAST-MODIFIED` wins

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::event::EventView;
use crate::reconcile::{Action, Plan, Side};
use crate::state::SyncState;

/// Reconcile a source and target view under the two-way ("full") mode
///
/// `prev` is the state persisted after the previous successful run, if any; a mismatched or
/// absent state is passed in as `None` by the caller and treated exactly like "first run".
pub fn reconcile(prev: Option<&SyncState>, source: &[EventView], target: &[EventView]) -> Plan {
    let empty = BTreeMap::new();
    let prev_entries = match prev {
        Some(SyncState::Full { entries }) => entries,
        _ => &empty,
    };

    let source_by_uid: HashMap<&str, &EventView> = source.iter().map(|e| (e.uid.as_str(), e)).collect();
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
        let in_source = source_by_uid.get(uid);
        let in_target = target_by_uid.get(uid);

        match (in_prev, in_source, in_target) {
            (true, Some(_), None) => {
                log::trace!("full: {} was deleted on target, deleting on source", uid);
                actions.push(Action::Delete {
                    side: Side::Source,
                    handle: in_source.unwrap().handle.clone(),
                });
            }
            (true, None, Some(_)) => {
                log::trace!("full: {} was deleted on source, deleting on target", uid);
                actions.push(Action::Delete {
                    side: Side::Target,
                    handle: in_target.unwrap().handle.clone(),
                });
            }
            (false, Some(a), None) => {
                log::trace!("full: {} is new on source, creating on target", uid);
                actions.push(Action::Create { side: Side::Target, raw: a.raw.clone() });
                next_entries.insert(uid.to_string(), a.last_modified);
            }
            (false, None, Some(b)) => {
                log::trace!("full: {} is new on target, creating on source", uid);
                actions.push(Action::Create { side: Side::Source, raw: b.raw.clone() });
                next_entries.insert(uid.to_string(), b.last_modified);
            }
            (_, Some(a), Some(b)) => {
                if a.last_modified > b.last_modified {
                    log::trace!("full: {} is newer on source, updating target", uid);
                    actions.push(Action::Update {
                        side: Side::Target,
                        handle: b.handle.clone(),
                        raw: a.raw.clone(),
                    });
                    next_entries.insert(uid.to_string(), a.last_modified);
                } else if b.last_modified > a.last_modified {
                    log::trace!("full: {} is newer on target, updating source", uid);
                    actions.push(Action::Update {
                        side: Side::Source,
                        handle: a.handle.clone(),
                        raw: b.raw.clone(),
                    });
                    next_entries.insert(uid.to_string(), b.last_modified);
                } else {
                    next_entries.insert(uid.to_string(), a.last_modified);
                }
            }
            (true, None, None) => {}
            (false, None, None) => unreachable!("uid {} came from nowhere", uid),
        }
    }

    Plan {
        actions,
        next_state: SyncState::Full { entries: next_entries },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(uid: &str, lm: i64, handle: &str) -> EventView {
        EventView {
            uid: uid.to_string(),
            last_modified: Utc.ymd(2024, 1, 1).and_hms(0, 0, 0) + chrono::Duration::seconds(lm),
            summary: "Meet".to_string(),
            dtstart: None,
            dtend: None,
            handle: handle.to_string(),
            raw: format!("RAW-{}", uid),
        }
    }

    #[test]
    fn first_run_create_on_target() {
        let a = event("U1", 0, "a1");
        let plan = reconcile(None, &[a.clone()], &[]);

        assert_eq!(plan.actions, vec![Action::Create { side: Side::Target, raw: a.raw.clone() }]);
        match plan.next_state {
            SyncState::Full { entries } => assert_eq!(entries.get("U1"), Some(&a.last_modified)),
            _ => panic!("wrong state variant"),
        }
    }

    #[test]
    fn newer_target_updates_source() {
        let a = event("U1", 0, "a1");
        let b = event("U1", 100, "b1");
        let prev = SyncState::Full {
            entries: [("U1".to_string(), a.last_modified)].into_iter().collect(),
        };

        let plan = reconcile(Some(&prev), &[a.clone()], &[b.clone()]);
        assert_eq!(
            plan.actions,
            vec![Action::Update { side: Side::Source, handle: "a1".to_string(), raw: b.raw.clone() }]
        );
    }

    #[test]
    fn two_sided_delete() {
        let b = event("U1", 0, "b1");
        let prev = SyncState::Full {
            entries: [("U1".to_string(), b.last_modified)].into_iter().collect(),
        };

        let plan = reconcile(Some(&prev), &[], &[b.clone()]);
        assert_eq!(plan.actions, vec![Action::Delete { side: Side::Target, handle: "b1".to_string() }]);
        match plan.next_state {
            SyncState::Full { entries } => assert!(entries.is_empty()),
            _ => panic!("wrong state variant"),
        }
    }

    #[test]
    fn idempotent_on_unchanged_inputs() {
        let a = event("U1", 0, "a1");
        let b = event("U1", 0, "b1");
        let prev = SyncState::Full {
            entries: [("U1".to_string(), a.last_modified)].into_iter().collect(),
        };

        let plan = reconcile(Some(&prev), &[a], &[b]);
        assert!(plan.actions.is_empty());
    }
}

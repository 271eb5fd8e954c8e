//! Applies a reconciler [`crate::reconcile::Plan`] against two backends
//!
//! Operations run in a fixed order — deletes before creates before updates — so that, within one
//! mapping, a freed-up slot (e.g. a uid removed then recreated in the same run) behaves
//! predictably. A duplicate-uid error on create is recognized and retried as an update; every
//! other backend error aborts the mapping immediately, before any state is persisted.

use crate::backend::Backend;
use crate::error::Result;
use crate::reconcile::{Action, Side};

/// Apply every action in `actions`, in a deterministic delete-then-create-then-update order.
///
/// Returns as soon as one action fails; the caller is expected to treat that as "do not persist
/// the next state for this mapping".
pub async fn execute(actions: &[Action], source: &dyn Backend, target: &dyn Backend, source_cal: &str, target_cal: &str) -> Result<()> {
    let ordered = order_for_execution(actions);

    for action in ordered {
        match action {
            Action::Delete { side, handle } => {
                let (backend, cal) = pick(*side, source, target, source_cal, target_cal);
                log::debug!("deleting {} on {}", handle, backend.account_name());
                backend.delete_event(&cal.to_string(), handle).await?;
            }
            Action::Create { side, raw } => {
                let (backend, cal) = pick(*side, source, target, source_cal, target_cal);
                let cal = cal.to_string();
                match backend.create_event(&cal, raw).await {
                    Ok(()) => log::debug!("created event on {}", backend.account_name()),
                    Err(crate::error::SyncError::DuplicateUid(uid)) => {
                        log::debug!("uid {} already present on {}, updating instead", uid, backend.account_name());
                        let existing = backend
                            .fetch_events(&cal)
                            .await?
                            .into_iter()
                            .find(|e| e.uid == uid);
                        match existing {
                            Some(event) => backend.update_event(&cal, &event.handle, raw).await?,
                            None => return Err(crate::error::SyncError::DuplicateUid(uid)),
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
            Action::Update { side, handle, raw } => {
                let (backend, cal) = pick(*side, source, target, source_cal, target_cal);
                log::debug!("updating {} on {}", handle, backend.account_name());
                backend.update_event(&cal.to_string(), handle, raw).await?;
            }
        }
    }

    Ok(())
}

fn pick<'a>(side: Side, source: &'a dyn Backend, target: &'a dyn Backend, source_cal: &'a str, target_cal: &'a str) -> (&'a dyn Backend, &'a str) {
    match side {
        Side::Source => (source, source_cal),
        Side::Target => (target, target_cal),
    }
}

/// Reorders a plan's actions into the fixed stages deletes-on-source, deletes-on-target, creates,
/// updates, preserving the relative order of actions within each stage.
fn order_for_execution(actions: &[Action]) -> Vec<&Action> {
    let mut deletes_source = Vec::new();
    let mut deletes_target = Vec::new();
    let mut creates = Vec::new();
    let mut updates = Vec::new();

    for action in actions {
        match action {
            Action::Delete { side: Side::Source, .. } => deletes_source.push(action),
            Action::Delete { side: Side::Target, .. } => deletes_target.push(action),
            Action::Create { .. } => creates.push(action),
            Action::Update { .. } => updates.push(action),
        }
    }

    deletes_source.into_iter().chain(deletes_target).chain(creates).chain(updates).collect()
}

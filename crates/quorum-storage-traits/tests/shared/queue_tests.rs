//! Action queue storage test functions

use quorum_storage_traits::queue::ActionQueueStorage;
use quorum_storage_traits::queue::types::{ActionContext, ActionStatus, NewAction};
use quorum_storage_traits::{ActionId, Timestamp};

use super::edit_context;

fn enqueue<S>(storage: &S, context: ActionContext, at: u64) -> ActionId
where
    S: ActionQueueStorage,
{
    storage
        .enqueue_action(NewAction::new(context, Timestamp::from_millis(at)))
        .unwrap()
        .into_action()
        .id
}

/// Inserted actions come back in enqueue order
pub fn test_enqueue_preserves_order<S>(storage: S)
where
    S: ActionQueueStorage,
{
    let a = enqueue(&storage, edit_context("m1", "one"), 10);
    let b = enqueue(&storage, edit_context("m2", "two"), 11);
    let c = enqueue(&storage, edit_context("m3", "three"), 12);

    let pending = storage.pending_actions().unwrap();
    let ids: Vec<ActionId> = pending.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![a, b, c]);
    assert!(pending.windows(2).all(|w| w[0].seq < w[1].seq));

    let first = &pending[0];
    assert_eq!(first.status, ActionStatus::Pending);
    assert_eq!(first.attempts, 0);
    assert_eq!(first.dedupe_key, "edit:space:general:m1");
    assert_eq!(first.next_attempt_at, Timestamp::from_millis(10));
}

/// A second submission with the same dedupe key replaces the pending payload in place
pub fn test_dedupe_collapse<S>(storage: S)
where
    S: ActionQueueStorage,
{
    let first = storage
        .enqueue_action(NewAction::new(
            edit_context("m1", "first"),
            Timestamp::from_millis(10),
        ))
        .unwrap();
    assert!(!first.is_replaced());
    let other = enqueue(&storage, edit_context("m2", "other"), 11);

    // Simulate a failed attempt so the reset is visible
    let mut bookkeeping = first.action().clone();
    bookkeeping.attempts = 2;
    bookkeeping.last_error = Some("network error".to_string());
    bookkeeping.next_attempt_at = Timestamp::from_millis(9_999);
    storage.update_action(&bookkeeping).unwrap();

    let second = storage
        .enqueue_action(NewAction::new(
            edit_context("m1", "second"),
            Timestamp::from_millis(20),
        ))
        .unwrap();
    assert!(second.is_replaced());
    let replaced = second.action();
    assert_eq!(replaced.id, first.action().id);
    assert_eq!(replaced.seq, first.action().seq);
    assert_eq!(replaced.context, edit_context("m1", "second"));
    assert_eq!(replaced.attempts, 0);
    assert_eq!(replaced.last_error, None);
    assert_eq!(replaced.next_attempt_at, Timestamp::from_millis(20));
    assert_eq!(replaced.enqueued_at, Timestamp::from_millis(10));

    let pending = storage.pending_actions().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, first.action().id);
    assert_eq!(pending[0].context, edit_context("m1", "second"));
    assert_eq!(pending[1].id, other);
}

/// In-flight and failed records are never coalesced into
pub fn test_dedupe_skips_processing_and_failed<S>(storage: S)
where
    S: ActionQueueStorage,
{
    let first = storage
        .enqueue_action(NewAction::new(
            edit_context("m1", "first"),
            Timestamp::from_millis(10),
        ))
        .unwrap()
        .into_action();

    let mut in_flight = first.clone();
    in_flight.status = ActionStatus::Processing;
    storage.update_action(&in_flight).unwrap();

    let second = storage
        .enqueue_action(NewAction::new(
            edit_context("m1", "second"),
            Timestamp::from_millis(20),
        ))
        .unwrap();
    assert!(!second.is_replaced());
    assert_ne!(second.action().id, first.id);
    assert!(second.action().seq > first.seq);

    let mut failed = first.clone();
    failed.status = ActionStatus::Failed;
    failed.processed_at = Some(Timestamp::from_millis(30));
    storage.update_action(&failed).unwrap();

    // The pending second record is the coalescing target now
    let third = storage
        .enqueue_action(NewAction::new(
            edit_context("m1", "third"),
            Timestamp::from_millis(40),
        ))
        .unwrap();
    assert!(third.is_replaced());
    assert_eq!(third.action().id, second.action().id);

    let stats = storage.queue_stats().unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total(), 2);
}

/// Bookkeeping updates, status listing and deletion
pub fn test_update_and_delete<S>(storage: S)
where
    S: ActionQueueStorage,
{
    let id = enqueue(&storage, edit_context("m1", "one"), 10);
    let mut action = storage.find_action(&id).unwrap().unwrap();

    action.status = ActionStatus::Failed;
    action.attempts = 3;
    action.last_attempt_at = Some(Timestamp::from_millis(50));
    action.last_error = Some("max attempts reached: network error".to_string());
    action.processed_at = Some(Timestamp::from_millis(60));
    storage.update_action(&action).unwrap();

    let stored = storage.find_action(&id).unwrap().unwrap();
    assert_eq!(stored, action);
    assert!(storage.pending_actions().unwrap().is_empty());
    assert_eq!(
        storage
            .actions_by_status(ActionStatus::Failed, 10)
            .unwrap()
            .len(),
        1
    );

    assert!(storage.delete_action(&id).unwrap());
    assert!(!storage.delete_action(&id).unwrap());
    assert!(storage.find_action(&id).unwrap().is_none());

    // Updating a deleted record is an error
    assert!(storage.update_action(&action).is_err());
}

/// Processing records go back to pending on reset
pub fn test_reset_processing<S>(storage: S)
where
    S: ActionQueueStorage,
{
    let a = enqueue(&storage, edit_context("m1", "one"), 10);
    let b = enqueue(&storage, edit_context("m2", "two"), 11);

    let mut action = storage.find_action(&a).unwrap().unwrap();
    action.status = ActionStatus::Processing;
    storage.update_action(&action).unwrap();
    assert_eq!(storage.queue_stats().unwrap().processing, 1);

    assert_eq!(storage.reset_processing_actions().unwrap(), 1);
    assert_eq!(storage.reset_processing_actions().unwrap(), 0);

    let pending = storage.pending_actions().unwrap();
    assert!(pending.iter().all(|a| a.status == ActionStatus::Pending));
    let ids: Vec<ActionId> = pending.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![a, b]);
}

/// Only failed records older than the cutoff are pruned
pub fn test_prune_failed<S>(storage: S)
where
    S: ActionQueueStorage,
{
    let old = enqueue(&storage, edit_context("m1", "one"), 10);
    let recent = enqueue(&storage, edit_context("m2", "two"), 11);
    let pending = enqueue(&storage, edit_context("m3", "three"), 12);

    for (id, processed_at) in [(old, 100), (recent, 900)] {
        let mut action = storage.find_action(&id).unwrap().unwrap();
        action.status = ActionStatus::Failed;
        action.processed_at = Some(Timestamp::from_millis(processed_at));
        storage.update_action(&action).unwrap();
    }

    assert_eq!(
        storage
            .prune_failed_actions(Timestamp::from_millis(500))
            .unwrap(),
        1
    );
    assert!(storage.find_action(&old).unwrap().is_none());
    assert!(storage.find_action(&recent).unwrap().is_some());
    assert!(storage.find_action(&pending).unwrap().is_some());

    let limited = storage.actions_by_status(ActionStatus::Pending, 0).unwrap();
    assert!(limited.is_empty());
}

//! Memory-based storage implementation of the ActionQueueStorage trait

use quorum_storage_traits::queue::ActionQueueStorage;
use quorum_storage_traits::queue::types::{
    Action, ActionStatus, EnqueueOutcome, NewAction, QueueStats,
};
use quorum_storage_traits::{ActionId, StorageError, Timestamp};

use crate::QuorumMemoryStorage;

impl ActionQueueStorage for QuorumMemoryStorage {
    fn enqueue_action(&self, new: NewAction) -> Result<EnqueueOutcome, StorageError> {
        let mut inner = self.inner.write();

        if let Some(existing) = inner.actions.values_mut().find(|action| {
            action.status == ActionStatus::Pending && action.dedupe_key == new.dedupe_key
        }) {
            existing.context = new.context;
            existing.attempts = 0;
            existing.last_error = None;
            existing.next_attempt_at = new.enqueued_at;
            return Ok(EnqueueOutcome::Replaced(existing.clone()));
        }

        inner.next_seq += 1;
        let seq = inner.next_seq;
        let action = Action {
            id: new.id,
            seq,
            context: new.context,
            dedupe_key: new.dedupe_key,
            status: ActionStatus::Pending,
            attempts: 0,
            enqueued_at: new.enqueued_at,
            last_attempt_at: None,
            next_attempt_at: new.enqueued_at,
            last_error: None,
            processed_at: None,
        };
        inner.action_index.insert(action.id, seq);
        inner.actions.insert(seq, action.clone());
        Ok(EnqueueOutcome::Inserted(action))
    }

    fn find_action(&self, id: &ActionId) -> Result<Option<Action>, StorageError> {
        let inner = self.inner.read();
        Ok(inner
            .action_index
            .get(id)
            .and_then(|seq| inner.actions.get(seq))
            .cloned())
    }

    fn pending_actions(&self) -> Result<Vec<Action>, StorageError> {
        Ok(self
            .inner
            .read()
            .actions
            .values()
            .filter(|action| action.status != ActionStatus::Failed)
            .cloned()
            .collect())
    }

    fn actions_by_status(
        &self,
        status: ActionStatus,
        limit: usize,
    ) -> Result<Vec<Action>, StorageError> {
        Ok(self
            .inner
            .read()
            .actions
            .values()
            .filter(|action| action.status == status)
            .take(limit)
            .cloned()
            .collect())
    }

    fn update_action(&self, action: &Action) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let seq = *inner
            .action_index
            .get(&action.id)
            .ok_or_else(|| StorageError::ActionNotFound(action.id))?;
        let stored = inner
            .actions
            .get_mut(&seq)
            .ok_or_else(|| StorageError::ActionNotFound(action.id))?;
        stored.status = action.status;
        stored.attempts = action.attempts;
        stored.last_attempt_at = action.last_attempt_at;
        stored.next_attempt_at = action.next_attempt_at;
        stored.last_error = action.last_error.clone();
        stored.processed_at = action.processed_at;
        Ok(())
    }

    fn delete_action(&self, id: &ActionId) -> Result<bool, StorageError> {
        let mut inner = self.inner.write();
        match inner.action_index.remove(id) {
            Some(seq) => Ok(inner.actions.remove(&seq).is_some()),
            None => Ok(false),
        }
    }

    fn reset_processing_actions(&self) -> Result<usize, StorageError> {
        let mut inner = self.inner.write();
        let mut reset = 0;
        for action in inner.actions.values_mut() {
            if action.status == ActionStatus::Processing {
                action.status = ActionStatus::Pending;
                reset += 1;
            }
        }
        Ok(reset)
    }

    fn queue_stats(&self) -> Result<QueueStats, StorageError> {
        let inner = self.inner.read();
        let mut stats = QueueStats::default();
        for action in inner.actions.values() {
            match action.status {
                ActionStatus::Pending => stats.pending += 1,
                ActionStatus::Processing => stats.processing += 1,
                ActionStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    fn prune_failed_actions(&self, before: Timestamp) -> Result<usize, StorageError> {
        let mut inner = self.inner.write();
        let expired: Vec<(u64, ActionId)> = inner
            .actions
            .iter()
            .filter(|(_, action)| {
                action.status == ActionStatus::Failed
                    && action.processed_at.unwrap_or(action.enqueued_at) < before
            })
            .map(|(seq, action)| (*seq, action.id))
            .collect();
        for (seq, id) in &expired {
            inner.actions.remove(seq);
            inner.action_index.remove(id);
        }
        Ok(expired.len())
    }
}

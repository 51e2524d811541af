//! Queue state survives a restart of a durable backend

mod common;

use std::sync::Arc;

use quorum_sqlite_storage::QuorumSqliteStorage;
use quorum_storage_traits::queue::ActionQueueStorage;
use quorum_storage_traits::queue::types::ActionStatus;
use quorum_storage_traits::spaces::SpaceStorage;
use tempfile::tempdir;

use self::common::*;

#[tokio::test]
async fn test_restart_before_any_execution_keeps_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quorum.sqlite");

    let enqueued: Vec<_> = {
        let storage = Arc::new(QuorumSqliteStorage::new(&path).unwrap());
        storage.save_space(space("space")).unwrap();
        let node = Node::open(storage);
        ["m1", "m2", "m3"]
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                node.queue
                    .enqueue(send("space", post("space", id, 10 * (i as u64 + 1))))
                    .unwrap()
                    .action()
                    .id
            })
            .collect()
    };

    let storage = Arc::new(QuorumSqliteStorage::new(&path).unwrap());
    let node = Node::open(storage);

    let reloaded: Vec<_> = node
        .queue
        .pending()
        .unwrap()
        .into_iter()
        .map(|action| action.id)
        .collect();
    assert_eq!(reloaded, enqueued);

    assert_eq!(node.queue.drain_ready().await.unwrap(), 3);
    assert_eq!(node.transport.posted_ids(), vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn test_interrupted_action_runs_after_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quorum.sqlite");

    {
        let storage = Arc::new(QuorumSqliteStorage::new(&path).unwrap());
        storage.save_space(space("space")).unwrap();
        let node = Node::open(Arc::clone(&storage));

        let first = node
            .queue
            .enqueue(send("space", post("space", "m1", 10)))
            .unwrap()
            .into_action();
        node.queue
            .enqueue(send("space", post("space", "m2", 20)))
            .unwrap();

        // Crash while m1 was being executed
        let mut interrupted = first;
        interrupted.status = ActionStatus::Processing;
        interrupted.last_attempt_at = Some(START);
        storage.update_action(&interrupted).unwrap();
        assert_eq!(node.queue.stats().unwrap().processing, 1);
    }

    let storage = Arc::new(QuorumSqliteStorage::new(&path).unwrap());
    let node = Node::open(storage);

    let stats = node.queue.stats().unwrap();
    assert_eq!(stats.processing, 0);
    assert_eq!(stats.pending, 2);

    assert_eq!(node.queue.drain_ready().await.unwrap(), 2);
    assert_eq!(node.transport.posted_ids(), vec!["m1", "m2"]);
    assert_eq!(node.queue.stats().unwrap().total(), 0);
}

#[tokio::test]
async fn test_backoff_is_kept_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quorum.sqlite");

    {
        let storage = Arc::new(QuorumSqliteStorage::new(&path).unwrap());
        storage.save_space(space("space")).unwrap();
        let node = Node::open(storage);
        node.transport.fail_next(unavailable());
        node.queue
            .enqueue(send("space", post("space", "m1", 10)))
            .unwrap();
        node.queue.drain_ready().await.unwrap();
    }

    let storage = Arc::new(QuorumSqliteStorage::new(&path).unwrap());
    let node = Node::open(storage);

    // Restarted clock is still at START, before the scheduled retry
    assert_eq!(node.queue.drain_ready().await.unwrap(), 0);
    let pending = node.queue.pending().unwrap();
    assert_eq!(pending[0].attempts, 1);

    node.advance(std::time::Duration::from_secs(2));
    assert_eq!(node.queue.drain_ready().await.unwrap(), 1);
    assert_eq!(node.transport.posted_ids(), vec!["m1"]);
}

//! Encryption state storage test functions

use quorum_storage_traits::encryption::EncryptionStateStorage;
use quorum_storage_traits::{ConversationId, InboxAddress, StorageError};

use super::create_test_state;

/// Test session record save, list and find
pub fn test_save_and_list_states<S>(storage: S)
where
    S: EncryptionStateStorage,
{
    let conversation = ConversationId::new("space/space");
    storage
        .save_encryption_state(create_test_state("space/space", "b", None), false)
        .unwrap();
    storage
        .save_encryption_state(create_test_state("space/space", "a", Some("inbox-a")), true)
        .unwrap();
    storage
        .save_encryption_state(create_test_state("other/other", "a", None), false)
        .unwrap();

    let states = storage.encryption_states(&conversation).unwrap();
    let tags: Vec<&str> = states.iter().map(|s| s.tag.as_str()).collect();
    assert_eq!(tags, vec!["a", "b"]);

    let found = storage
        .find_encryption_state(&conversation, "a")
        .unwrap()
        .unwrap();
    assert_eq!(found.state.as_bytes(), b"ratchet-a");
    assert!(
        storage
            .find_encryption_state(&conversation, "missing")
            .unwrap()
            .is_none()
    );

    let latest = storage.latest_encryption_state(&conversation).unwrap().unwrap();
    assert_eq!(latest.tag, "a");

    assert_eq!(
        storage
            .find_inbox_mapping(&InboxAddress::new("inbox-a"))
            .unwrap(),
        Some(conversation.clone())
    );
    assert_eq!(
        storage.inbox_mappings(&conversation).unwrap(),
        vec![InboxAddress::new("inbox-a")]
    );
}

/// Saving with `set_latest` moves the latest pointer; saving without leaves it
pub fn test_latest_pointer<S>(storage: S)
where
    S: EncryptionStateStorage,
{
    let conversation = ConversationId::new("c/c");
    storage
        .save_encryption_state(create_test_state("c/c", "first", None), true)
        .unwrap();
    storage
        .save_encryption_state(create_test_state("c/c", "second", None), false)
        .unwrap();
    assert_eq!(
        storage
            .latest_encryption_state(&conversation)
            .unwrap()
            .unwrap()
            .tag,
        "first"
    );

    storage
        .save_encryption_state(create_test_state("c/c", "second", None), true)
        .unwrap();
    assert_eq!(
        storage
            .latest_encryption_state(&conversation)
            .unwrap()
            .unwrap()
            .tag,
        "second"
    );

    storage.delete_latest_state(&conversation).unwrap();
    assert!(storage.latest_encryption_state(&conversation).unwrap().is_none());
    // Session records are untouched
    assert_eq!(storage.encryption_states(&conversation).unwrap().len(), 2);
}

/// Deletions are idempotent and independent of each other
pub fn test_deletions_are_idempotent<S>(storage: S)
where
    S: EncryptionStateStorage,
{
    let conversation = ConversationId::new("c/c");
    let inbox = InboxAddress::new("inbox-1");
    storage
        .save_encryption_state(create_test_state("c/c", "t", Some("inbox-1")), true)
        .unwrap();

    storage.delete_encryption_state(&conversation, "t").unwrap();
    storage.delete_encryption_state(&conversation, "t").unwrap();
    assert!(storage.encryption_states(&conversation).unwrap().is_empty());

    // The mapping outlives the record until it is deleted explicitly
    assert_eq!(storage.inbox_mappings(&conversation).unwrap(), vec![inbox.clone()]);
    storage.delete_inbox_mapping(&inbox).unwrap();
    storage.delete_inbox_mapping(&inbox).unwrap();
    assert!(storage.find_inbox_mapping(&inbox).unwrap().is_none());

    storage.delete_latest_state(&conversation).unwrap();
    storage.delete_latest_state(&conversation).unwrap();
}

/// An empty tag is rejected
pub fn test_empty_tag_rejected<S>(storage: S)
where
    S: EncryptionStateStorage,
{
    let result = storage.save_encryption_state(create_test_state("c/c", "", None), true);
    assert!(matches!(result, Err(StorageError::InvalidParameters(_))));
}

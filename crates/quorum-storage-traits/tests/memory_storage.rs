//! Memory storage implementation tests using shared test functions

use quorum_memory_storage::QuorumMemoryStorage;

mod shared;

/// Macro to generate tests that run against memory storage using shared test functions
macro_rules! test_memory_storage {
    ($test_name:ident, $test_fn:path) => {
        #[test]
        fn $test_name() {
            let storage = QuorumMemoryStorage::default();
            $test_fn(storage);
        }
    };
}

test_memory_storage!(
    test_save_and_find_space_memory,
    shared::space_tests::test_save_and_find_space
);

test_memory_storage!(
    test_space_members_memory,
    shared::space_tests::test_space_members
);

test_memory_storage!(
    test_messages_memory,
    shared::space_tests::test_messages
);

test_memory_storage!(
    test_user_config_memory,
    shared::space_tests::test_user_config
);

test_memory_storage!(
    test_save_and_list_states_memory,
    shared::encryption_tests::test_save_and_list_states
);

test_memory_storage!(
    test_latest_pointer_memory,
    shared::encryption_tests::test_latest_pointer
);

test_memory_storage!(
    test_deletions_are_idempotent_memory,
    shared::encryption_tests::test_deletions_are_idempotent
);

test_memory_storage!(
    test_empty_tag_rejected_memory,
    shared::encryption_tests::test_empty_tag_rejected
);

test_memory_storage!(
    test_enqueue_preserves_order_memory,
    shared::queue_tests::test_enqueue_preserves_order
);

test_memory_storage!(
    test_dedupe_collapse_memory,
    shared::queue_tests::test_dedupe_collapse
);

test_memory_storage!(
    test_dedupe_skips_processing_and_failed_memory,
    shared::queue_tests::test_dedupe_skips_processing_and_failed
);

test_memory_storage!(
    test_update_and_delete_memory,
    shared::queue_tests::test_update_and_delete
);

test_memory_storage!(
    test_reset_processing_memory,
    shared::queue_tests::test_reset_processing
);

test_memory_storage!(
    test_prune_failed_memory,
    shared::queue_tests::test_prune_failed
);

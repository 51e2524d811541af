//! Space, message and user config storage test functions

use std::collections::BTreeMap;

use quorum_storage_traits::messages::MessageStorage;
use quorum_storage_traits::messages::types::MessageContent;
use quorum_storage_traits::spaces::SpaceStorage;
use quorum_storage_traits::user_config::{UserConfig, UserConfigStorage};
use quorum_storage_traits::{ChannelId, MessageId, SpaceId, Timestamp, UserAddress};

use super::{create_test_member, create_test_message, create_test_space};

/// Test basic space save, find and delete
pub fn test_save_and_find_space<S>(storage: S)
where
    S: SpaceStorage,
{
    let space = create_test_space("s1");
    storage.save_space(space.clone()).unwrap();

    let found = storage.find_space(&space.space_id).unwrap().unwrap();
    assert_eq!(found, space);

    // Saving again replaces
    let mut renamed = space.clone();
    renamed.name = "Renamed".to_string();
    storage.save_space(renamed.clone()).unwrap();
    assert_eq!(
        storage.find_space(&space.space_id).unwrap().unwrap().name,
        "Renamed"
    );

    storage.delete_space(&space.space_id).unwrap();
    assert!(storage.find_space(&space.space_id).unwrap().is_none());

    // Deleting twice is fine
    storage.delete_space(&space.space_id).unwrap();
}

/// Test membership records
pub fn test_space_members<S>(storage: S)
where
    S: SpaceStorage,
{
    let space_id = SpaceId::new("s1");
    storage.save_space(create_test_space("s1")).unwrap();
    storage.save_space_member(create_test_member("s1", "carol")).unwrap();
    storage.save_space_member(create_test_member("s1", "bob")).unwrap();
    storage.save_space_member(create_test_member("s2", "dave")).unwrap();

    let members = storage.space_members(&space_id).unwrap();
    let names: Vec<&str> = members.iter().map(|m| m.user_address.as_str()).collect();
    assert_eq!(names, vec!["bob", "carol"]);

    assert!(
        storage
            .delete_space_member(&space_id, &UserAddress::new("bob"))
            .unwrap()
    );
    assert!(
        !storage
            .delete_space_member(&space_id, &UserAddress::new("bob"))
            .unwrap()
    );
    assert_eq!(storage.space_members(&space_id).unwrap().len(), 1);

    assert!(
        storage
            .space_members(&SpaceId::new("unknown"))
            .unwrap()
            .is_empty()
    );
}

/// Test message save/find/delete and chronological listing
pub fn test_messages<S>(storage: S)
where
    S: MessageStorage,
{
    let space_id = SpaceId::new("s1");
    let channel_id = ChannelId::new("general");

    storage.save_message(create_test_message("s1", "m3", 30)).unwrap();
    storage.save_message(create_test_message("s1", "m1", 10)).unwrap();
    storage.save_message(create_test_message("s1", "m2b", 20)).unwrap();
    storage.save_message(create_test_message("s1", "m2a", 20)).unwrap();
    storage.save_message(create_test_message("s2", "other", 5)).unwrap();

    let all = storage.all_space_messages(&space_id).unwrap();
    let ids: Vec<&str> = all.iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2a", "m2b", "m3"]);

    let found = storage
        .find_message(&space_id, &channel_id, &MessageId::new("m1"))
        .unwrap()
        .unwrap();
    assert_eq!(
        found.content,
        MessageContent::Post {
            text: "message m1".to_string(),
            reply_to: None
        }
    );

    // Upsert keeps a single row
    let mut pinned = found.clone();
    pinned.pinned = true;
    storage.save_message(pinned).unwrap();
    assert_eq!(storage.all_space_messages(&space_id).unwrap().len(), 4);
    assert!(
        storage
            .find_message(&space_id, &channel_id, &MessageId::new("m1"))
            .unwrap()
            .unwrap()
            .pinned
    );

    assert!(
        storage
            .delete_message(&space_id, &channel_id, &MessageId::new("m1"))
            .unwrap()
    );
    assert!(
        !storage
            .delete_message(&space_id, &channel_id, &MessageId::new("m1"))
            .unwrap()
    );
    assert!(
        storage
            .find_message(&space_id, &channel_id, &MessageId::new("m1"))
            .unwrap()
            .is_none()
    );
}

/// Test user config persistence
pub fn test_user_config<S>(storage: S)
where
    S: UserConfigStorage,
{
    let address = UserAddress::new("alice");
    assert!(storage.find_user_config(&address).unwrap().is_none());

    let mut preferences = BTreeMap::new();
    preferences.insert("theme".to_string(), serde_json::json!("dark"));
    let config = UserConfig {
        user_address: address.clone(),
        space_ids: vec![SpaceId::new("s1"), SpaceId::new("s2")],
        preferences,
        updated_at: Timestamp::from_millis(10),
    };
    storage.save_user_config(config.clone()).unwrap();
    assert_eq!(storage.find_user_config(&address).unwrap().unwrap(), config);

    let mut updated = config.clone();
    updated.space_ids.pop();
    storage.save_user_config(updated.clone()).unwrap();
    assert_eq!(storage.find_user_config(&address).unwrap().unwrap(), updated);
}

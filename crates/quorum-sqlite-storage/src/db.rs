//! Database utilities for SQLite storage.

use std::io::{Error as IoError, ErrorKind};
use std::str::FromStr;

use quorum_storage_traits::encryption::types::{EncryptionState, SessionState};
use quorum_storage_traits::messages::types::{Message, MessageContent};
use quorum_storage_traits::queue::types::{Action, ActionContext, ActionStatus};
use quorum_storage_traits::spaces::types::{Channel, Space, SpaceMember};
use quorum_storage_traits::user_config::UserConfig;
use quorum_storage_traits::{
    ActionId, ChannelId, ConversationId, InboxAddress, MessageId, SpaceId, Timestamp, UserAddress,
};
use rusqlite::types::Type;
use rusqlite::{Error, Result as SqliteResult, Row};
use serde::de::DeserializeOwned;

fn conversion_error(column: usize, ty: Type, message: String) -> Error {
    Error::FromSqlConversionFailure(
        column,
        ty,
        Box::new(IoError::new(ErrorKind::InvalidData, message)),
    )
}

fn json_column<T>(row: &Row, name: &str) -> SqliteResult<T>
where
    T: DeserializeOwned,
{
    let raw: String = row.get(name)?;
    let index = row.as_ref().column_index(name)?;
    serde_json::from_str(&raw)
        .map_err(|e| conversion_error(index, Type::Text, format!("invalid {name} json: {e}")))
}

pub(crate) fn timestamp_column(row: &Row, name: &str) -> SqliteResult<Timestamp> {
    let millis: i64 = row.get(name)?;
    Ok(Timestamp::from_millis(millis.max(0) as u64))
}

fn optional_timestamp_column(row: &Row, name: &str) -> SqliteResult<Option<Timestamp>> {
    let millis: Option<i64> = row.get(name)?;
    Ok(millis.map(|m| Timestamp::from_millis(m.max(0) as u64)))
}

/// Timestamps are stored as signed milliseconds
pub(crate) fn to_sql_millis(ts: Timestamp) -> i64 {
    i64::try_from(ts.as_millis()).unwrap_or(i64::MAX)
}

/// Convert a row to a [`Space`]
pub fn row_to_space(row: &Row) -> SqliteResult<Space> {
    let channels: Vec<Channel> = json_column(row, "channels")?;
    Ok(Space {
        space_id: SpaceId::new(row.get::<_, String>("space_id")?),
        name: row.get("name")?,
        description: row.get("description")?,
        channels,
        hub_address: row.get::<_, Option<String>>("hub_address")?.map(InboxAddress::new),
        inbox_address: row
            .get::<_, Option<String>>("inbox_address")?
            .map(InboxAddress::new),
        created_at: timestamp_column(row, "created_at")?,
    })
}

/// Convert a row to a [`SpaceMember`]
pub fn row_to_space_member(row: &Row) -> SqliteResult<SpaceMember> {
    Ok(SpaceMember {
        space_id: SpaceId::new(row.get::<_, String>("space_id")?),
        user_address: UserAddress::new(row.get::<_, String>("user_address")?),
        inbox_address: row
            .get::<_, Option<String>>("inbox_address")?
            .map(InboxAddress::new),
        display_name: row.get("display_name")?,
        joined_at: timestamp_column(row, "joined_at")?,
    })
}

/// Convert a row to a [`Message`]
pub fn row_to_message(row: &Row) -> SqliteResult<Message> {
    let content: MessageContent = json_column(row, "content")?;
    Ok(Message {
        space_id: SpaceId::new(row.get::<_, String>("space_id")?),
        channel_id: ChannelId::new(row.get::<_, String>("channel_id")?),
        message_id: MessageId::new(row.get::<_, String>("message_id")?),
        sender: UserAddress::new(row.get::<_, String>("sender")?),
        created_at: timestamp_column(row, "created_at")?,
        modified_at: timestamp_column(row, "modified_at")?,
        content,
        pinned: row.get("pinned")?,
    })
}

/// Convert a row of `encryption_states` or `latest_states` to an [`EncryptionState`]
pub fn row_to_encryption_state(row: &Row) -> SqliteResult<EncryptionState> {
    Ok(EncryptionState {
        conversation_id: ConversationId::new(row.get::<_, String>("conversation_id")?),
        tag: row.get("tag")?,
        inbox_id: row.get::<_, Option<String>>("inbox_id")?.map(InboxAddress::new),
        state: SessionState::new(row.get("state")?),
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

/// Convert a row to a [`UserConfig`]
pub fn row_to_user_config(row: &Row) -> SqliteResult<UserConfig> {
    json_column(row, "config")
}

/// Convert a row to an [`Action`]
pub fn row_to_action(row: &Row) -> SqliteResult<Action> {
    let id_str: String = row.get("id")?;
    let id = ActionId::from_str(&id_str)
        .map_err(|e| conversion_error(1, Type::Text, format!("invalid action id: {e}")))?;

    let status_str: String = row.get("status")?;
    let status = ActionStatus::from_str(&status_str)
        .map_err(|e| conversion_error(5, Type::Text, e.to_string()))?;

    let context: ActionContext = json_column(row, "context")?;
    let seq: i64 = row.get("seq")?;
    let attempts: i64 = row.get("attempts")?;

    Ok(Action {
        id,
        seq: seq.max(0) as u64,
        context,
        dedupe_key: row.get("dedupe_key")?,
        status,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        enqueued_at: timestamp_column(row, "enqueued_at")?,
        last_attempt_at: optional_timestamp_column(row, "last_attempt_at")?,
        next_attempt_at: timestamp_column(row, "next_attempt_at")?,
        last_error: row.get("last_error")?,
        processed_at: optional_timestamp_column(row, "processed_at")?,
    })
}

//! Local state summaries exchanged during sync

use quorum_storage_traits::messages::types::Message;
use quorum_storage_traits::queue::types::SyncSummary;
use sha2::{Digest, Sha256};

/// Summarize a space's message log and membership
pub fn summarize(messages: &[Message], member_count: usize) -> SyncSummary {
    SyncSummary {
        message_count: messages.len() as u64,
        member_count: member_count as u64,
        manifest_hash: manifest_hash(messages),
        newest_message_at: messages.iter().map(|m| m.created_at).max(),
        oldest_message_at: messages.iter().map(|m| m.created_at).min(),
    }
}

/// SHA-256 over the sorted `{channel}/{id}:{modified_at}` lines of every message.
///
/// Independent of log order, and changes when any message is edited.
pub fn manifest_hash(messages: &[Message]) -> String {
    let mut entries: Vec<String> = messages
        .iter()
        .map(|m| {
            format!(
                "{}/{}:{}",
                m.channel_id,
                m.message_id,
                m.modified_at.as_millis()
            )
        })
        .collect();
    entries.sort_unstable();

    let mut hasher = Sha256::new();
    for entry in &entries {
        hasher.update(entry.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

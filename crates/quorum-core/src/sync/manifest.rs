//! Per-record manifests and the deltas computed from them
//!
//! A manifest lists one digest per message and member plus the peer ids a device holds.
//! Comparing a peer's manifest with local state yields exactly what the peer lacks.

use std::collections::{BTreeSet, HashMap};

use quorum_storage_traits::messages::types::Message;
use quorum_storage_traits::queue::types::{MemberDigest, MessageDigest, PeerEntry, SyncManifest};
use quorum_storage_traits::spaces::types::SpaceMember;
use quorum_storage_traits::{ChannelId, MessageId, StorageError, Timestamp, UserAddress};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Digest of one message
pub fn message_digest(message: &Message) -> Result<MessageDigest, StorageError> {
    Ok(MessageDigest {
        channel_id: message.channel_id.clone(),
        message_id: message.message_id.clone(),
        created_at: message.created_at,
        modified_at: message.modified_at,
        content_hash: sha256_json(&message.content)?,
    })
}

/// Digest of one membership record
pub fn member_digest(member: &SpaceMember) -> Result<MemberDigest, StorageError> {
    Ok(MemberDigest {
        user_address: member.user_address.clone(),
        digest: sha256_json(member)?,
    })
}

/// Manifest of a space's messages, members and peer map
pub fn build_manifest<I>(
    messages: &[Message],
    members: &[SpaceMember],
    peer_ids: I,
) -> Result<SyncManifest, StorageError>
where
    I: IntoIterator<Item = u64>,
{
    let mut message_digests = messages
        .iter()
        .map(message_digest)
        .collect::<Result<Vec<_>, _>>()?;
    message_digests.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.message_id.cmp(&b.message_id))
    });

    let mut member_digests = members
        .iter()
        .map(member_digest)
        .collect::<Result<Vec<_>, _>>()?;
    member_digests.sort_by(|a, b| a.user_address.cmp(&b.user_address));

    let peer_ids: BTreeSet<u64> = peer_ids.into_iter().collect();
    Ok(SyncManifest {
        messages: message_digests,
        members: member_digests,
        peer_ids: peer_ids.into_iter().collect(),
    })
}

/// What a peer lacks relative to local state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestDelta {
    /// Messages the peer lacks or holds an older revision of
    pub messages: Vec<Message>,
    /// Members the peer lacks or holds a different record for
    pub members: Vec<SpaceMember>,
    /// Peer map entries whose id the peer lacks
    pub peers: Vec<PeerEntry>,
    /// Messages the peer holds that we lack or hold an older revision of
    pub missing_locally: usize,
}

impl ManifestDelta {
    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.members.is_empty() && self.peers.is_empty()
    }
}

/// Compare local state with a peer's manifest.
///
/// A message is sent when the peer lacks it or our `modified_at` is newer. A member is
/// sent when the peer lacks it or its digest differs. A peer entry is sent when the peer
/// lacks its id.
pub fn compute_delta(
    messages: Vec<Message>,
    members: Vec<SpaceMember>,
    peers: Vec<PeerEntry>,
    theirs: &SyncManifest,
) -> Result<ManifestDelta, StorageError> {
    let their_messages: HashMap<(&ChannelId, &MessageId), Timestamp> = theirs
        .messages
        .iter()
        .map(|d| ((&d.channel_id, &d.message_id), d.modified_at))
        .collect();
    let their_members: HashMap<&UserAddress, &str> = theirs
        .members
        .iter()
        .map(|d| (&d.user_address, d.digest.as_str()))
        .collect();
    let their_peers: BTreeSet<u64> = theirs.peer_ids.iter().copied().collect();

    let ours: HashMap<(&ChannelId, &MessageId), Timestamp> = messages
        .iter()
        .map(|m| ((&m.channel_id, &m.message_id), m.modified_at))
        .collect();
    let missing_locally = theirs
        .messages
        .iter()
        .filter(|d| {
            ours.get(&(&d.channel_id, &d.message_id))
                .is_none_or(|modified_at| *modified_at < d.modified_at)
        })
        .count();

    let outgoing_messages: Vec<Message> = messages
        .iter()
        .filter(|m| {
            their_messages
                .get(&(&m.channel_id, &m.message_id))
                .is_none_or(|modified_at| *modified_at < m.modified_at)
        })
        .cloned()
        .collect();

    let mut outgoing_members = Vec::new();
    for member in members {
        let digest = member_digest(&member)?;
        if their_members.get(&member.user_address) != Some(&digest.digest.as_str()) {
            outgoing_members.push(member);
        }
    }

    let mut outgoing_peers: Vec<PeerEntry> = peers
        .into_iter()
        .filter(|peer| !their_peers.contains(&peer.peer_id))
        .collect();
    outgoing_peers.sort();

    Ok(ManifestDelta {
        messages: outgoing_messages,
        members: outgoing_members,
        peers: outgoing_peers,
        missing_locally,
    })
}

fn sha256_json<T>(value: &T) -> Result<String, StorageError>
where
    T: Serialize,
{
    let bytes =
        serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

//! Synchronization Engine
//!
//! Decides when a local space replica is behind a peer, answers peers' sync requests and
//! replays the event log to re-assert kicks. A `sync-initiate` carrying a manifest is
//! answered with our own manifest plus what the peer lacks; one without falls back to a
//! timestamp-range delta. The engine only reads local state and enqueues actions; it
//! never mutates messages, members or encryption state itself.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use quorum_storage_traits::messages::types::{Message, MessageContent};
use quorum_storage_traits::queue::types::{ActionContext, PeerEntry, SyncManifest, SyncSummary};
use quorum_storage_traits::spaces::types::SpaceMember;
use quorum_storage_traits::{
    ActionId, InboxAddress, QuorumStorageProvider, SpaceId, StorageError, Timestamp, UserAddress,
};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::Error;
use crate::keyring::SpaceKeyring;
use crate::queue::ActionQueue;

mod candidates;
mod manifest;
mod summary;

pub use self::candidates::{SyncCandidate, SyncPhase};
use self::candidates::SpaceSync;
pub use self::manifest::{
    ManifestDelta, build_manifest, compute_delta, member_digest, message_digest,
};
pub use self::summary::{manifest_hash, summarize};

/// Space synchronization engine
pub struct SyncEngine<S> {
    storage: Arc<S>,
    queue: ActionQueue<S>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    keyring: Option<Arc<dyn SpaceKeyring>>,
    spaces: Mutex<HashMap<SpaceId, SpaceSync>>,
}

impl<S> fmt::Debug for SyncEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("keyring", &self.keyring)
            .field("tracked_spaces", &self.spaces.lock().len())
            .finish_non_exhaustive()
    }
}

impl<S> SyncEngine<S>
where
    S: QuorumStorageProvider + 'static,
{
    /// Engine enqueuing through `queue` and sharing its clock
    pub fn new(storage: Arc<S>, queue: ActionQueue<S>) -> Self {
        let clock = queue.clock();
        Self {
            storage,
            queue,
            config: SyncConfig::default(),
            clock,
            keyring: None,
            spaces: Mutex::new(HashMap::new()),
        }
    }

    /// Share peer maps from `keyring` and allow full syncs of spaces it owns.
    ///
    /// Without a keyring no peer entries are exchanged and [`SyncEngine::synchronize_all`]
    /// does nothing.
    pub fn with_keyring(mut self, keyring: Arc<dyn SpaceKeyring>) -> Self {
        self.keyring = Some(keyring);
        self
    }

    /// Set the sync configuration
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration in use
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current phase of a space
    pub fn phase(&self, space_id: &SpaceId) -> SyncPhase {
        self.spaces
            .lock()
            .get(space_id)
            .map(SpaceSync::phase)
            .unwrap_or_default()
    }

    /// Candidates currently known for a space
    pub fn candidates(&self, space_id: &SpaceId) -> Vec<SyncCandidate> {
        self.spaces
            .lock()
            .get(space_id)
            .map(|state| state.candidates().to_vec())
            .unwrap_or_default()
    }

    /// Broadcast a sync request for `space_id` to its hub and open the candidate window.
    ///
    /// Returns `None` when the space is unknown or lacks a hub or inbox address.
    pub fn request_sync(&self, space_id: &SpaceId) -> Result<Option<ActionId>, Error> {
        let Some(space) = self.storage.find_space(space_id)? else {
            tracing::debug!(space_id = %space_id, "Unknown space, not requesting sync");
            return Ok(None);
        };
        let (Some(hub_address), Some(inbox_address)) = (space.hub_address, space.inbox_address)
        else {
            tracing::warn!(space_id = %space_id, "Space has no hub or inbox, cannot request sync");
            return Ok(None);
        };

        let summary = self.local_summary(space_id)?;
        let expiry = self.clock.now().saturating_add(self.config.request_window());
        let outcome = self.queue.enqueue(ActionContext::SyncRequest {
            space_id: space_id.clone(),
            hub_address,
            inbox_address,
            expiry,
            summary,
        })?;

        self.spaces
            .lock()
            .entry(space_id.clone())
            .or_default()
            .open_window(expiry);
        tracing::debug!(space_id = %space_id, expiry = %expiry, "Sync requested");
        Ok(Some(outcome.action().id))
    }

    /// Record a peer's answer to our sync request.
    ///
    /// Only accepted while the request window is open. Returns whether it was recorded.
    pub fn record_candidate(
        &self,
        space_id: &SpaceId,
        inbox_address: InboxAddress,
        message_count: u64,
        member_count: u64,
        summary: Option<SyncSummary>,
    ) -> bool {
        let now = self.clock.now();
        let candidate = SyncCandidate {
            inbox_address,
            message_count,
            member_count,
            summary,
            expires_at: now.saturating_add(self.config.candidate_ttl()),
            invokable: true,
        };

        let recorded = self
            .spaces
            .lock()
            .get_mut(space_id)
            .is_some_and(|state| state.record(candidate, now));
        if !recorded {
            tracing::debug!(space_id = %space_id, "Ignoring sync candidate outside request window");
        }
        recorded
    }

    /// Answer a peer's advertised counts.
    ///
    /// Does nothing when the peer is ourselves or already holds at least as much as we
    /// do. Otherwise enqueues a `sync-info` offering our state and returns its id.
    pub fn inform_sync_data(
        &self,
        space_id: &SpaceId,
        peer_inbox: &InboxAddress,
        peer_message_count: u64,
        peer_member_count: u64,
        peer_summary: Option<&SyncSummary>,
    ) -> Result<Option<ActionId>, Error> {
        let Some(space) = self.storage.find_space(space_id)? else {
            return Ok(None);
        };
        let Some(inbox_address) = space.inbox_address else {
            return Ok(None);
        };
        if &inbox_address == peer_inbox {
            return Ok(None);
        }

        let local = self.local_summary(space_id)?;
        if !should_inform(&local, peer_message_count, peer_member_count, peer_summary) {
            tracing::debug!(
                space_id = %space_id,
                peer_inbox = %peer_inbox,
                "Peer is not behind, no sync info sent"
            );
            return Ok(None);
        }

        let outcome = self.queue.enqueue(ActionContext::SyncInfo {
            space_id: space_id.clone(),
            peer_inbox: peer_inbox.clone(),
            inbox_address,
            summary: local,
        })?;
        Ok(Some(outcome.action().id))
    }

    /// Ask the best live candidate for its delta.
    ///
    /// Without an invokable candidate, or while a request is already outstanding, this
    /// returns immediately without touching storage.
    pub fn initiate_sync(&self, space_id: &SpaceId) -> Result<Option<ActionId>, Error> {
        let now = self.clock.now();
        let candidates = {
            let mut spaces = self.spaces.lock();
            let Some(state) = spaces.get_mut(space_id) else {
                return Ok(None);
            };
            if state.phase() == SyncPhase::Requesting {
                return Ok(None);
            }
            state.prune_expired(now);
            let candidates = state.invokable();
            if candidates.is_empty() {
                return Ok(None);
            }
            candidates
        };

        let Some(space) = self.storage.find_space(space_id)? else {
            self.reset(space_id);
            return Ok(None);
        };
        let Some(inbox_address) = space.inbox_address else {
            self.reset(space_id);
            return Ok(None);
        };
        let (members, messages) = self.local_state(space_id)?;
        let local = summarize(&messages, members.len());

        let best = candidates
            .into_iter()
            .filter(|candidate| {
                candidate.message_count > local.message_count
                    || candidate
                        .summary
                        .as_ref()
                        .is_some_and(|summary| summary.manifest_hash != local.manifest_hash)
            })
            .max_by_key(|candidate| candidate.message_count);
        let Some(best) = best else {
            tracing::debug!(space_id = %space_id, "No candidate holds anything we lack");
            self.reset(space_id);
            return Ok(None);
        };

        let manifest = build_manifest(&messages, &members, self.peer_ids(space_id))?;
        let outcome = self.queue.enqueue(ActionContext::SyncInitiate {
            space_id: space_id.clone(),
            peer_inbox: best.inbox_address.clone(),
            inbox_address,
            summary: local,
            manifest: Some(manifest),
        })?;

        let until = now.saturating_add(self.config.response_timeout());
        self.spaces
            .lock()
            .entry(space_id.clone())
            .or_default()
            .begin_request(&best.inbox_address, until);
        tracing::info!(
            space_id = %space_id,
            peer_inbox = %best.inbox_address,
            peer_messages = best.message_count,
            "Sync initiated"
        );
        Ok(Some(outcome.action().id))
    }

    /// A delta arrived; the space goes back to `Idle`
    pub fn complete_sync(&self, space_id: &SpaceId) {
        self.reset(space_id);
    }

    /// Advance every space's timers and initiate where a request window has elapsed.
    ///
    /// Returns the ids of the `sync-initiate` actions enqueued.
    pub fn tick(&self) -> Result<Vec<ActionId>, Error> {
        let now = self.clock.now();
        let due: Vec<SpaceId> = {
            let mut spaces = self.spaces.lock();
            let due = spaces
                .iter_mut()
                .filter_map(|(space_id, state)| state.tick(now).then(|| space_id.clone()))
                .collect();
            spaces.retain(|_, state| !state.is_dormant(now));
            due
        };

        let mut initiated = Vec::new();
        for space_id in due {
            if let Some(id) = self.initiate_sync(&space_id)? {
                initiated.push(id);
            }
        }
        Ok(initiated)
    }

    /// Answer a peer's `sync-initiate` with our members and the messages outside its
    /// `[oldest, latest]` range, packed into `sync-delta` chunks.
    ///
    /// Returns the number of chunks enqueued.
    pub fn direct_sync(
        &self,
        space_id: &SpaceId,
        peer_inbox: &InboxAddress,
        peer_latest_at: Option<Timestamp>,
        peer_oldest_at: Option<Timestamp>,
    ) -> Result<usize, Error> {
        if self.storage.find_space(space_id)?.is_none() {
            return Ok(0);
        }

        let members = self.storage.space_members(space_id)?;
        let messages: Vec<Message> = self
            .storage
            .all_space_messages(space_id)?
            .into_iter()
            .filter(|message| outside_range(message.created_at, peer_latest_at, peer_oldest_at))
            .collect();

        let count = self.enqueue_delta(space_id, peer_inbox, Vec::new(), members, messages, false)?;
        tracing::debug!(space_id = %space_id, peer_inbox = %peer_inbox, chunks = count, "Delta queued");
        Ok(count)
    }

    /// Answer a peer's `sync-initiate`.
    ///
    /// Without a manifest this is [`SyncEngine::direct_sync`]. With one, our own manifest
    /// goes back as a `sync-manifest` so the peer can send what we lack, followed by
    /// `sync-delta` chunks only if the peer lacks anything. Returns the number of delta
    /// chunks enqueued.
    pub fn handle_sync_initiate(
        &self,
        space_id: &SpaceId,
        peer_inbox: &InboxAddress,
        peer_latest_at: Option<Timestamp>,
        peer_oldest_at: Option<Timestamp>,
        manifest: Option<&SyncManifest>,
    ) -> Result<usize, Error> {
        let Some(theirs) = manifest else {
            return self.direct_sync(space_id, peer_inbox, peer_latest_at, peer_oldest_at);
        };
        let Some(space) = self.storage.find_space(space_id)? else {
            return Ok(0);
        };
        let Some(inbox_address) = space.inbox_address else {
            tracing::warn!(space_id = %space_id, "Space has no inbox, cannot answer manifest");
            return Ok(0);
        };

        let (members, messages) = self.local_state(space_id)?;
        let peers = self.peers(space_id);
        let ours = build_manifest(&messages, &members, peers.iter().map(|p| p.peer_id))?;
        let delta = compute_delta(messages, members, peers, theirs)?;

        self.queue.enqueue(ActionContext::SyncManifest {
            space_id: space_id.clone(),
            peer_inbox: peer_inbox.clone(),
            inbox_address,
            manifest: ours,
        })?;

        let count = if delta.is_empty() {
            0
        } else {
            self.enqueue_delta(space_id, peer_inbox, delta.peers, delta.members, delta.messages, true)?
        };
        tracing::debug!(
            space_id = %space_id,
            peer_inbox = %peer_inbox,
            chunks = count,
            missing_locally = delta.missing_locally,
            "Manifest answered"
        );
        Ok(count)
    }

    /// Answer a peer's `sync-manifest` with everything it lacks.
    ///
    /// Always ends with a final chunk, empty when there is nothing to send, so the peer
    /// knows the exchange is over. Returns the number of chunks enqueued.
    pub fn handle_sync_manifest(
        &self,
        space_id: &SpaceId,
        peer_inbox: &InboxAddress,
        manifest: &SyncManifest,
    ) -> Result<usize, Error> {
        if self.storage.find_space(space_id)?.is_none() {
            return Ok(0);
        }

        let (members, messages) = self.local_state(space_id)?;
        let delta = compute_delta(messages, members, self.peers(space_id), manifest)?;
        let count =
            self.enqueue_delta(space_id, peer_inbox, delta.peers, delta.members, delta.messages, true)?;
        tracing::debug!(
            space_id = %space_id,
            peer_inbox = %peer_inbox,
            chunks = count,
            missing_locally = delta.missing_locally,
            "Manifest delta queued"
        );
        Ok(count)
    }

    /// Push the whole space to `peer_inbox`: peer map first, then members, then messages.
    ///
    /// Only the space owner does this. Returns the number of chunks enqueued, 0 when this
    /// device does not own the space.
    pub fn synchronize_all(&self, space_id: &SpaceId, peer_inbox: &InboxAddress) -> Result<usize, Error> {
        if !self.keyring.as_ref().is_some_and(|k| k.is_owner(space_id)) {
            tracing::debug!(space_id = %space_id, "Not the space owner, skipping full sync");
            return Ok(0);
        }
        if self.storage.find_space(space_id)?.is_none() {
            return Ok(0);
        }

        let (members, mut messages) = self.local_state(space_id)?;
        messages.sort_by(Message::chronological_cmp);
        let count =
            self.enqueue_delta(space_id, peer_inbox, self.peers(space_id), members, messages, true)?;
        tracing::info!(space_id = %space_id, peer_inbox = %peer_inbox, chunks = count, "Full sync queued");
        Ok(count)
    }

    /// Replay the event log and re-assert every kick that is still in effect.
    ///
    /// A `join` after a `kick` of the same user lifts it. One `verify-kicked` action is
    /// enqueued per kicked user. Returns the number of kicked users.
    pub fn send_verify_kicked_statuses(&self, space_id: &SpaceId) -> Result<usize, Error> {
        let mut messages = self.storage.all_space_messages(space_id)?;
        messages.sort_by(Message::chronological_cmp);
        let kicked = replay_kicks(&messages);
        if kicked.is_empty() {
            return Ok(0);
        }

        let hub_address = self
            .storage
            .find_space(space_id)?
            .and_then(|space| space.hub_address);
        let Some(hub_address) = hub_address else {
            tracing::warn!(
                space_id = %space_id,
                kicked = kicked.len(),
                "Space has no hub, kicks not re-asserted"
            );
            return Ok(kicked.len());
        };

        for user_address in &kicked {
            self.queue.enqueue(ActionContext::VerifyKicked {
                space_id: space_id.clone(),
                hub_address: hub_address.clone(),
                user_address: user_address.clone(),
            })?;
        }
        tracing::debug!(space_id = %space_id, kicked = kicked.len(), "Kick verification queued");
        Ok(kicked.len())
    }

    fn local_summary(&self, space_id: &SpaceId) -> Result<SyncSummary, StorageError> {
        let member_count = self.storage.space_members(space_id)?.len();
        let messages = self.storage.all_space_messages(space_id)?;
        Ok(summarize(&messages, member_count))
    }

    fn local_state(&self, space_id: &SpaceId) -> Result<(Vec<SpaceMember>, Vec<Message>), StorageError> {
        Ok((
            self.storage.space_members(space_id)?,
            self.storage.all_space_messages(space_id)?,
        ))
    }

    fn peers(&self, space_id: &SpaceId) -> Vec<PeerEntry> {
        self.keyring
            .as_ref()
            .map(|keyring| keyring.peers(space_id))
            .unwrap_or_default()
    }

    fn peer_ids(&self, space_id: &SpaceId) -> Vec<u64> {
        self.peers(space_id).iter().map(|peer| peer.peer_id).collect()
    }

    /// Pack and enqueue `sync-delta` chunks, marking the last one final. With
    /// `close_empty`, an empty delta still produces one final chunk.
    fn enqueue_delta(
        &self,
        space_id: &SpaceId,
        peer_inbox: &InboxAddress,
        peers: Vec<PeerEntry>,
        members: Vec<SpaceMember>,
        messages: Vec<Message>,
        close_empty: bool,
    ) -> Result<usize, Error> {
        let mut chunks = pack_chunks(peers, members, messages, self.config.max_chunk_bytes)?;
        if chunks.is_empty() && close_empty {
            chunks.push(Chunk::default());
        }

        let last = chunks.len().saturating_sub(1);
        let count = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            self.queue.enqueue(ActionContext::SyncDelta {
                space_id: space_id.clone(),
                peer_inbox: peer_inbox.clone(),
                chunk: index as u32,
                members: chunk.members,
                messages: chunk.messages,
                peers: chunk.peers,
                is_final: index == last,
            })?;
        }
        Ok(count)
    }

    fn reset(&self, space_id: &SpaceId) {
        if let Some(state) = self.spaces.lock().get_mut(space_id) {
            state.reset();
        }
    }
}

fn should_inform(
    local: &SyncSummary,
    peer_message_count: u64,
    peer_member_count: u64,
    peer_summary: Option<&SyncSummary>,
) -> bool {
    let we_have_more =
        local.message_count > peer_message_count || local.member_count > peer_member_count;
    let Some(peer) = peer_summary else {
        return we_have_more;
    };

    if peer.manifest_hash == local.manifest_hash && peer.member_count == local.member_count {
        return false;
    }
    let newer = match (local.newest_message_at, peer.newest_message_at) {
        (Some(ours), Some(theirs)) => ours > theirs,
        (Some(_), None) => true,
        _ => false,
    };
    let older = match (local.oldest_message_at, peer.oldest_message_at) {
        (Some(ours), Some(theirs)) => ours < theirs,
        (Some(_), None) => true,
        _ => false,
    };
    we_have_more || newer || older || peer.manifest_hash != local.manifest_hash
}

fn outside_range(created_at: Timestamp, latest: Option<Timestamp>, oldest: Option<Timestamp>) -> bool {
    if latest.is_none() && oldest.is_none() {
        return true;
    }
    latest.is_some_and(|latest| created_at > latest)
        || oldest.is_some_and(|oldest| created_at < oldest)
}

fn replay_kicks(messages: &[Message]) -> BTreeSet<UserAddress> {
    let mut kicked = BTreeSet::new();
    for message in messages {
        match &message.content {
            MessageContent::Kick { user_address } => {
                kicked.insert(user_address.clone());
            }
            MessageContent::Join { user_address } => {
                kicked.remove(user_address);
            }
            _ => {}
        }
    }
    kicked
}

#[derive(Debug, Default)]
struct Chunk {
    peers: Vec<PeerEntry>,
    members: Vec<SpaceMember>,
    messages: Vec<Message>,
    bytes: usize,
}

impl Chunk {
    fn is_empty(&self) -> bool {
        self.peers.is_empty() && self.members.is_empty() && self.messages.is_empty()
    }
}

/// Greedy packing by serialized size, peers then members then messages. An item larger
/// than `max_bytes` gets a chunk of its own.
fn pack_chunks(
    peers: Vec<PeerEntry>,
    members: Vec<SpaceMember>,
    messages: Vec<Message>,
    max_bytes: usize,
) -> Result<Vec<Chunk>, StorageError> {
    let mut chunks = Vec::new();
    let mut current = Chunk::default();

    for peer in peers {
        let size = encoded_len(&peer)?;
        if !current.is_empty() && current.bytes + size > max_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.bytes += size;
        current.peers.push(peer);
    }
    for member in members {
        let size = encoded_len(&member)?;
        if !current.is_empty() && current.bytes + size > max_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.bytes += size;
        current.members.push(member);
    }
    for message in messages {
        let size = encoded_len(&message)?;
        if !current.is_empty() && current.bytes + size > max_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.bytes += size;
        current.messages.push(message);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

fn encoded_len<T>(value: &T) -> Result<usize, StorageError>
where
    T: Serialize,
{
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

//! Space keyring collaborator
//!
//! The host owns the group ratchet keys. The sync engine only needs the peer map it
//! shares during a delta and whether this device owns the space.

use std::collections::BTreeMap;
use std::fmt::Debug;

use parking_lot::RwLock;
use quorum_storage_traits::SpaceId;
use quorum_storage_traits::queue::types::PeerEntry;

/// Read access to a space's ratchet peer map and ownership
pub trait SpaceKeyring: Send + Sync + Debug {
    /// Peer map entries known for `space_id`
    fn peers(&self, space_id: &SpaceId) -> Vec<PeerEntry>;

    /// Whether this device holds the owner key of `space_id`
    fn is_owner(&self, space_id: &SpaceId) -> bool;
}

/// Keyring held in memory
#[derive(Debug, Default)]
pub struct MemoryKeyring {
    spaces: RwLock<BTreeMap<SpaceId, (bool, Vec<PeerEntry>)>>,
}

impl MemoryKeyring {
    /// Empty keyring
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the peer map of `space_id`
    pub fn set_peers(&self, space_id: SpaceId, peers: Vec<PeerEntry>) {
        self.spaces.write().entry(space_id).or_default().1 = peers;
    }

    /// Mark this device as owner of `space_id`
    pub fn set_owner(&self, space_id: SpaceId, owner: bool) {
        self.spaces.write().entry(space_id).or_default().0 = owner;
    }
}

impl SpaceKeyring for MemoryKeyring {
    fn peers(&self, space_id: &SpaceId) -> Vec<PeerEntry> {
        self.spaces
            .read()
            .get(space_id)
            .map(|(_, peers)| peers.clone())
            .unwrap_or_default()
    }

    fn is_owner(&self, space_id: &SpaceId) -> bool {
        self.spaces
            .read()
            .get(space_id)
            .is_some_and(|(owner, _)| *owner)
    }
}

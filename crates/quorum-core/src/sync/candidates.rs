//! Per-space sync state machine
//!
//! `Idle -> CandidateKnown -> Requesting -> Idle`. A request opens a window during
//! which peers' answers are collected as candidates; each candidate lives for a fixed
//! time. Issuing `sync-initiate` to the best candidate enters `Requesting`, which ends
//! on a response or a timeout.

use quorum_storage_traits::queue::types::SyncSummary;
use quorum_storage_traits::{InboxAddress, Timestamp};

/// Where a space is in the sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing in progress
    #[default]
    Idle,
    /// At least one peer advertised its state
    CandidateKnown,
    /// Waiting for the chosen peer's delta
    Requesting,
}

/// A peer that advertised its state for a space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCandidate {
    /// Where the peer receives sync traffic
    pub inbox_address: InboxAddress,
    /// Advertised message count
    pub message_count: u64,
    /// Advertised member count
    pub member_count: u64,
    /// Advertised summary, when the peer sent one
    pub summary: Option<SyncSummary>,
    /// When the advertisement goes stale
    pub expires_at: Timestamp,
    /// Whether a request may still be sent to this peer
    pub invokable: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SpaceSync {
    phase: SyncPhase,
    candidates: Vec<SyncCandidate>,
    window_closes_at: Option<Timestamp>,
    requesting_until: Option<Timestamp>,
}

impl SpaceSync {
    pub(crate) fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub(crate) fn candidates(&self) -> &[SyncCandidate] {
        &self.candidates
    }

    pub(crate) fn open_window(&mut self, closes_at: Timestamp) {
        self.window_closes_at = Some(closes_at);
    }

    fn window_open(&self, now: Timestamp) -> bool {
        self.window_closes_at.is_some_and(|closes_at| now < closes_at)
    }

    /// Accept an advertisement while the request window is open. A newer advertisement
    /// from the same inbox replaces the older one.
    pub(crate) fn record(&mut self, candidate: SyncCandidate, now: Timestamp) -> bool {
        if !self.window_open(now) {
            return false;
        }

        self.candidates
            .retain(|existing| existing.inbox_address != candidate.inbox_address);
        self.candidates.push(candidate);
        if self.phase == SyncPhase::Idle {
            self.phase = SyncPhase::CandidateKnown;
        }
        true
    }

    /// Drop stale candidates; a `CandidateKnown` space without any falls back to `Idle`
    pub(crate) fn prune_expired(&mut self, now: Timestamp) {
        self.candidates.retain(|candidate| candidate.expires_at > now);
        if self.phase == SyncPhase::CandidateKnown && self.candidates.is_empty() {
            self.phase = SyncPhase::Idle;
        }
    }

    pub(crate) fn invokable(&self) -> Vec<SyncCandidate> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.invokable)
            .cloned()
            .collect()
    }

    pub(crate) fn begin_request(&mut self, peer: &InboxAddress, until: Timestamp) {
        for candidate in &mut self.candidates {
            if &candidate.inbox_address == peer {
                candidate.invokable = false;
            }
        }
        self.phase = SyncPhase::Requesting;
        self.requesting_until = Some(until);
        self.window_closes_at = None;
    }

    /// Back to `Idle`, forgetting every candidate
    pub(crate) fn reset(&mut self) {
        self.phase = SyncPhase::Idle;
        self.candidates.clear();
        self.window_closes_at = None;
        self.requesting_until = None;
    }

    /// Advance timers. Returns whether the window elapsed with candidates waiting, so a
    /// sync should be initiated now.
    pub(crate) fn tick(&mut self, now: Timestamp) -> bool {
        if self.phase == SyncPhase::Requesting
            && self.requesting_until.is_some_and(|until| now >= until)
        {
            tracing::debug!("Sync response timed out");
            self.reset();
            return false;
        }

        self.prune_expired(now);
        self.phase == SyncPhase::CandidateKnown
            && !self.window_open(now)
            && self.candidates.iter().any(|candidate| candidate.invokable)
    }

    /// Nothing to remember about this space
    pub(crate) fn is_dormant(&self, now: Timestamp) -> bool {
        self.phase == SyncPhase::Idle && self.candidates.is_empty() && !self.window_open(now)
    }
}

//! Ready-time scheduler feeding the single drain worker
//!
//! Actions are grouped into FIFO lanes by ordering key. Only the head of a lane is
//! eligible, so a later action for the same conversation never starts before an earlier
//! one finishes. Lane heads sit in a min-heap keyed by `(ready_at, seq)`; entries that no
//! longer describe a head are discarded lazily when they surface.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use quorum_storage_traits::{ActionId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    id: ActionId,
    seq: u64,
    ready_at: Timestamp,
}

type HeapKey = Reverse<(Timestamp, u64, ActionId)>;

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    lanes: HashMap<String, VecDeque<Entry>>,
    lane_of: HashMap<ActionId, String>,
    heap: BinaryHeap<HeapKey>,
    in_flight: HashSet<ActionId>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of scheduled actions, in flight included
    pub(crate) fn len(&self) -> usize {
        self.lane_of.len()
    }

    pub(crate) fn contains(&self, id: &ActionId) -> bool {
        self.lane_of.contains_key(id)
    }

    /// Add an action to its lane in `seq` order. An in-flight head is never displaced.
    pub(crate) fn insert(&mut self, lane: String, id: ActionId, seq: u64, ready_at: Timestamp) {
        if self.contains(&id) {
            self.remove(&id);
        }

        let entries = self.lanes.entry(lane.clone()).or_default();
        let floor = match entries.front() {
            Some(head) if self.in_flight.contains(&head.id) => 1,
            _ => 0,
        };
        let position = entries
            .iter()
            .skip(floor)
            .position(|entry| entry.seq > seq)
            .map(|offset| offset + floor)
            .unwrap_or(entries.len());
        entries.insert(position, Entry { id, seq, ready_at });
        self.lane_of.insert(id, lane.clone());

        if position == 0 {
            self.push_head(&lane);
        }
    }

    /// Change the ready time of a waiting action, keeping its lane position
    pub(crate) fn replace(&mut self, id: &ActionId, ready_at: Timestamp) -> bool {
        let Some(lane) = self.lane_of.get(id).cloned() else {
            return false;
        };
        let Some(entries) = self.lanes.get_mut(&lane) else {
            return false;
        };
        let Some(entry) = entries.iter_mut().find(|entry| &entry.id == id) else {
            return false;
        };
        entry.ready_at = ready_at;
        self.push_head(&lane);
        true
    }

    /// Take the earliest ready lane head and mark it in flight
    pub(crate) fn next_ready(&mut self, now: Timestamp) -> Option<ActionId> {
        while let Some(Reverse((ready_at, _, id))) = self.heap.peek().copied() {
            if ready_at > now {
                return None;
            }
            self.heap.pop();
            if self.is_live_head(&id, ready_at) {
                self.in_flight.insert(id);
                return Some(id);
            }
        }
        None
    }

    /// Earliest time a lane head becomes ready
    pub(crate) fn next_wakeup(&mut self) -> Option<Timestamp> {
        while let Some(Reverse((ready_at, _, id))) = self.heap.peek().copied() {
            if self.is_live_head(&id, ready_at) {
                return Some(ready_at);
            }
            self.heap.pop();
        }
        None
    }

    /// Put an in-flight action back to wait until `ready_at`
    pub(crate) fn reschedule(&mut self, id: &ActionId, ready_at: Timestamp) {
        self.in_flight.remove(id);
        self.replace(id, ready_at);
    }

    /// Drop an action, releasing its lane to the next entry
    pub(crate) fn remove(&mut self, id: &ActionId) -> bool {
        self.in_flight.remove(id);
        let Some(lane) = self.lane_of.remove(id) else {
            return false;
        };
        let Some(entries) = self.lanes.get_mut(&lane) else {
            return false;
        };
        let was_head = entries.front().is_some_and(|entry| &entry.id == id);
        entries.retain(|entry| &entry.id != id);

        if entries.is_empty() {
            self.lanes.remove(&lane);
        } else if was_head {
            self.push_head(&lane);
        }
        true
    }

    fn push_head(&mut self, lane: &str) {
        let Some(head) = self.lanes.get(lane).and_then(|entries| entries.front()) else {
            return;
        };
        if self.in_flight.contains(&head.id) {
            return;
        }
        self.heap.push(Reverse((head.ready_at, head.seq, head.id)));
    }

    fn is_live_head(&self, id: &ActionId, ready_at: Timestamp) -> bool {
        if self.in_flight.contains(id) {
            return false;
        }
        self.lane_of
            .get(id)
            .and_then(|lane| self.lanes.get(lane))
            .and_then(|entries| entries.front())
            .is_some_and(|head| &head.id == id && head.ready_at == ready_at)
    }
}

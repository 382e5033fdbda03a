use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pps_model::Owner;
use tracing::error;

/// Per-owner FIFO queues. An owner has an entry exactly while a drain for
/// it is running.
pub(crate) struct OwnerLanes<T> {
    queues: Mutex<HashMap<Owner, VecDeque<T>>>,
}

impl<T> OwnerLanes<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(HashMap::new()),
        })
    }

    /// Appends `item`. Returns a [`Lane`] when the owner was idle; the
    /// caller must drain it.
    pub(crate) fn push(self: &Arc<Self>, owner: Owner, item: T) -> Option<Lane<T>> {
        let mut queues = self.queues.lock();
        match queues.entry(owner) {
            Entry::Occupied(mut queue) => {
                queue.get_mut().push_back(item);
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(VecDeque::from([item]));
                Some(Lane {
                    lanes: Arc::clone(self),
                    owner,
                    drained: AtomicBool::new(false),
                })
            }
        }
    }

    pub(crate) fn pending(&self, owner: Owner) -> usize {
        self.queues.lock().get(&owner).map_or(0, VecDeque::len)
    }

    pub(crate) fn active(&self) -> usize {
        self.queues.lock().len()
    }
}

/// Exclusive right to drain one owner's queue. Dropping it before
/// [`next`](Lane::next) returned `None` (unwind, cancelled task) discards
/// the queued items and frees the owner for a new lane.
pub(crate) struct Lane<T> {
    lanes: Arc<OwnerLanes<T>>,
    owner: Owner,
    drained: AtomicBool,
}

impl<T> Lane<T> {
    pub(crate) fn owner(&self) -> Owner {
        self.owner
    }

    /// Next item, or `None` after unregistering the owner. Both happen under
    /// the producers' lock so a concurrent push either lands before the
    /// check or starts a new lane.
    pub(crate) fn next(&self) -> Option<T> {
        let mut queues = self.lanes.queues.lock();
        let item = queues.get_mut(&self.owner).and_then(VecDeque::pop_front);
        if item.is_none() {
            queues.remove(&self.owner);
            self.drained.store(true, Ordering::Release);
        }
        item
    }
}

impl<T> Drop for Lane<T> {
    fn drop(&mut self) {
        if self.drained.load(Ordering::Acquire) {
            return;
        }
        // items are dropped outside the lock
        let stranded = self.lanes.queues.lock().remove(&self.owner);
        error!(
            target: "pps::lanes",
            owner = %self.owner,
            discarded = stranded.as_ref().map_or(0, VecDeque::len),
            "lane dropped before draining"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_push_opens_a_lane_later_pushes_queue() {
        let lanes = OwnerLanes::new();
        let owner = Owner::new_random();
        let lane = lanes.push(owner, 1).expect("idle owner opens a lane");
        assert!(lanes.push(owner, 2).is_none());
        assert!(lanes.push(owner, 3).is_none());
        assert_eq!(lanes.pending(owner), 3);

        assert_eq!(lane.next(), Some(1));
        assert_eq!(lane.next(), Some(2));
        assert!(lanes.push(owner, 4).is_none());
        assert_eq!(lane.next(), Some(3));
        assert_eq!(lane.next(), Some(4));
        assert_eq!(lane.next(), None);
        assert_eq!(lanes.active(), 0);

        // the owner is idle again
        let again = lanes.push(owner, 5).expect("new lane after drain");
        assert_eq!(again.owner(), owner);
    }

    #[test]
    fn owners_do_not_share_lanes() {
        let lanes = OwnerLanes::new();
        let a = Owner::new_random();
        let b = Owner::new_random();
        let lane_a = lanes.push(a, "a1").unwrap();
        let lane_b = lanes.push(b, "b1").unwrap();
        assert_eq!(lanes.active(), 2);
        assert_eq!(lane_b.next(), Some("b1"));
        assert_eq!(lane_b.next(), None);
        assert_eq!(lane_a.next(), Some("a1"));
        assert_eq!(lanes.pending(a), 0);
    }

    #[test]
    fn dropped_lane_frees_the_owner() {
        let lanes = OwnerLanes::new();
        let owner = Owner::new_random();
        let lane = lanes.push(owner, 1).unwrap();
        assert!(lanes.push(owner, 2).is_none());
        assert_eq!(lane.next(), Some(1));
        drop(lane);
        assert_eq!(lanes.active(), 0);
        assert_eq!(lanes.pending(owner), 0);
        assert!(lanes.push(owner, 3).is_some());
    }

    #[test]
    fn panicking_drainer_frees_the_owner() {
        let lanes = OwnerLanes::new();
        let owner = Owner::new_random();
        let lane = lanes.push(owner, 1).unwrap();
        assert!(lanes.push(owner, 2).is_none());
        let joined = std::thread::spawn(move || {
            while let Some(item) = lane.next() {
                assert_ne!(item, 2, "drainer gave up");
            }
        })
        .join();
        assert!(joined.is_err());
        let again = lanes.push(owner, 4).expect("owner idle after unwind");
        assert_eq!(again.next(), Some(4));
        assert_eq!(again.next(), None);
    }

    #[test]
    fn finished_lane_drop_leaves_a_newer_lane_alone() {
        let lanes = OwnerLanes::new();
        let owner = Owner::new_random();
        let old = lanes.push(owner, 1).unwrap();
        assert_eq!(old.next(), Some(1));
        assert_eq!(old.next(), None);
        let new = lanes.push(owner, 2).unwrap();
        drop(old);
        assert_eq!(lanes.pending(owner), 1);
        assert_eq!(new.next(), Some(2));
    }

    #[test]
    fn concurrent_producers_never_strand_items() {
        let lanes = OwnerLanes::new();
        let owner = Owner::new_random();
        let drained = Arc::new(Mutex::new(Vec::new()));
        std::thread::scope(|scope| {
            for producer in 0..4u32 {
                let lanes = lanes.clone();
                let drained = drained.clone();
                scope.spawn(move || {
                    for i in 0..250u32 {
                        if let Some(lane) = lanes.push(owner, producer * 1000 + i) {
                            while let Some(item) = lane.next() {
                                drained.lock().push(item);
                            }
                        }
                    }
                });
            }
        });
        assert_eq!(drained.lock().len(), 1000);
        assert_eq!(lanes.active(), 0);
    }
}

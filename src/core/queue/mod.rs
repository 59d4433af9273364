//! Priority Request Queue (C4): a mutex+condvar max-heap of pending
//! thumbnail requests with a parallel cancellation set, in the style of the
//! teacher's `INFLIGHT`/`LIMITER` statics but generalized into its own type
//! rather than hand-rolled globals.

use crate::core::thumbnail::request::ThumbnailRequest;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Condvar, Mutex};

/// Wraps a request so `BinaryHeap` orders by priority, then by earlier
/// `created_at` (a `BinaryHeap` is a max-heap, so ties favor the smaller
/// `created_at` by inverting the comparison).
struct QueueItem(ThumbnailRequest);

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.created_at.cmp(&self.0.created_at))
    }
}

struct State {
    heap: BinaryHeap<QueueItem>,
    cancelled: HashSet<u64>,
    stopped: bool,
}

/// Thread-safe priority queue of pending thumbnail requests. See module docs
/// for the ordering and cancellation contract.
pub struct ThumbnailQueue {
    state: Mutex<State>,
    not_empty: Condvar,
}

impl Default for ThumbnailQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                cancelled: HashSet::new(),
                stopped: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Silently dropped if the queue is stopped.
    pub fn push(&self, request: ThumbnailRequest) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        state.heap.push(QueueItem(request));
        self.not_empty.notify_one();
    }

    /// Blocks until an item is available or the queue stops. Skips and
    /// discards cancelled items as it unwinds the heap. Returns `None` once
    /// stopped, even if cancelled-but-unfiltered items remain.
    pub fn pop(&self) -> Option<ThumbnailRequest> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.stopped {
                return None;
            }
            while let Some(QueueItem(req)) = state.heap.pop() {
                if state.cancelled.remove(&req.id) {
                    continue;
                }
                return Some(req);
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Non-blocking variant of `pop`.
    pub fn try_pop(&self) -> Option<ThumbnailRequest> {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return None;
        }
        while let Some(QueueItem(req)) = state.heap.pop() {
            if state.cancelled.remove(&req.id) {
                continue;
            }
            return Some(req);
        }
        None
    }

    /// Returns whether `id` was newly added to the cancellation set. Does not
    /// physically remove the queued item; a worker filters it out on pop.
    pub fn cancel(&self, id: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        state.cancelled.insert(id)
    }

    /// Physically removes and counts every queued request whose source
    /// identifies `path`, recording their IDs as cancelled.
    pub fn cancel_by_path(&self, path: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        let (keep, removed): (Vec<_>, Vec<_>) = state
            .heap
            .drain()
            .map(|QueueItem(r)| r)
            .partition(|r| r.source.identifier() != path);
        let count = removed.len();
        for r in removed {
            state.cancelled.insert(r.id);
        }
        state.heap = keep.into_iter().map(QueueItem).collect();
        count
    }

    /// Drains the entire queue into the cancellation set, returning the count.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let drained: Vec<_> = state.heap.drain().map(|QueueItem(r)| r.id).collect();
        let count = drained.len();
        for id in drained {
            state.cancelled.insert(id);
        }
        count
    }

    /// Rebuilds the heap with `id`'s priority changed to `new_priority`.
    /// Returns `false` if `id` was not present.
    pub fn update_priority(&self, id: u64, new_priority: crate::core::thumbnail::request::Priority) -> bool {
        let mut state = self.state.lock().unwrap();
        let mut items: Vec<_> = state.heap.drain().map(|QueueItem(r)| r).collect();
        let mut found = false;
        for r in items.iter_mut() {
            if r.id == id {
                r.priority = new_priority;
                found = true;
            }
        }
        state.heap = items.into_iter().map(QueueItem).collect();
        if found {
            self.not_empty.notify_all();
        }
        found
    }

    pub fn is_cancelled(&self, id: u64) -> bool {
        self.state.lock().unwrap().cancelled.contains(&id)
    }

    pub fn clear_cancelled(&self, id: u64) {
        self.state.lock().unwrap().cancelled.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wakes all waiters; subsequent `pop` returns `None` until `restart`.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        self.not_empty.notify_all();
    }

    /// Clears the stopped flag and the cancellation set.
    pub fn restart(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = false;
        state.cancelled.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thumbnail::request::{Priority, ThumbnailSource};
    use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
    use std::sync::Arc;

    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    fn request(priority: Priority, created_at: u64) -> ThumbnailRequest {
        ThumbnailRequest {
            id: NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed),
            source: ThumbnailSource::File("a.png".into()),
            target_size: 128,
            priority,
            callback: Arc::new(|_| {}),
            created_at,
        }
    }

    #[test]
    fn pops_highest_priority_first() {
        let q = ThumbnailQueue::new();
        q.push(request(Priority::Low, 1));
        q.push(request(Priority::Immediate, 2));
        q.push(request(Priority::Normal, 3));
        assert_eq!(q.pop().unwrap().priority, Priority::Immediate);
        assert_eq!(q.pop().unwrap().priority, Priority::Normal);
        assert_eq!(q.pop().unwrap().priority, Priority::Low);
    }

    #[test]
    fn ties_break_by_earlier_created_at() {
        let q = ThumbnailQueue::new();
        let older = request(Priority::Normal, 10);
        let newer = request(Priority::Normal, 20);
        let older_id = older.id;
        q.push(newer);
        q.push(older);
        assert_eq!(q.pop().unwrap().id, older_id);
    }

    #[test]
    fn cancel_skips_item_on_pop() {
        let q = ThumbnailQueue::new();
        let r = request(Priority::Normal, 1);
        let id = r.id;
        q.push(r);
        assert!(q.cancel(id));
        assert!(q.try_pop().is_none());
        assert!(!q.is_cancelled(id));
    }

    #[test]
    fn stop_makes_pop_return_none() {
        let q = Arc::new(ThumbnailQueue::new());
        q.push(request(Priority::Normal, 1));
        q.stop();
        assert!(q.pop().is_none());
    }

    #[test]
    fn restart_clears_stopped_and_cancellation_set() {
        let q = ThumbnailQueue::new();
        let r = request(Priority::Normal, 1);
        let id = r.id;
        q.push(r);
        q.cancel(id);
        q.stop();
        q.restart();
        assert!(!q.is_stopped());
        assert!(!q.is_cancelled(id));
    }

    #[test]
    fn cancel_by_path_removes_matching_and_counts() {
        let q = ThumbnailQueue::new();
        q.push(ThumbnailRequest {
            source: ThumbnailSource::File("match.png".into()),
            ..request(Priority::Normal, 1)
        });
        q.push(ThumbnailRequest {
            source: ThumbnailSource::File("other.png".into()),
            ..request(Priority::Normal, 2)
        });
        let removed = q.cancel_by_path("match.png");
        assert_eq!(removed, 1);
        assert_eq!(q.len(), 1);
    }
}

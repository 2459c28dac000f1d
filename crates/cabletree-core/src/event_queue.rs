//! Per-group queue of pending synaptic events

use crate::backend::Value;
use crate::types::{CellMember, TimeMs};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A synaptic input scheduled for delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostedEvent {
    /// The synapse the event is delivered to
    pub target: CellMember,
    /// Delivery time (ms): spike time plus connection delay
    pub time: TimeMs,
    /// Connection weight
    pub weight: Value,
}

impl PostedEvent {
    /// Create a posted event.
    pub const fn new(target: CellMember, time: TimeMs, weight: Value) -> Self {
        Self {
            target,
            time,
            weight,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    event: PostedEvent,
    seq: u64,
}

impl Entry {
    // min-heap key: earliest time first, then target member, then insertion
    // order so exact ties replay in connection-table order
    fn key(&self) -> (TimeMs, CellMember, u64) {
        (self.event.time, self.event.target, self.seq)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed comparison turns std's max-heap into a min-heap
        let (ta, ma, sa) = self.key();
        let (tb, mb, sb) = other.key();
        tb.total_cmp(&ta)
            .then_with(|| mb.cmp(&ma))
            .then_with(|| sb.cmp(&sa))
    }
}

/// Binary min-heap of pending events, keyed by delivery time with
/// deterministic tie-breaking.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event.
    pub fn push(&mut self, event: PostedEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { event, seq });
    }

    /// Remove and return the earliest event if its delivery time is `<= t`.
    pub fn pop_if(&mut self, t: TimeMs) -> Option<PostedEvent> {
        if self.heap.peek().map(|e| e.event.time <= t)? {
            self.heap.pop().map(|e| e.event)
        } else {
            None
        }
    }

    /// Delivery time of the earliest pending event.
    pub fn peek_time(&self) -> Option<TimeMs> {
        self.heap.peek().map(|e| e.event.time)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop all pending events.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(gid: u64, index: u32, time: f64) -> PostedEvent {
        PostedEvent::new(CellMember::new(gid, index), time, 0.1)
    }

    #[test]
    fn pop_if_respects_deadline() {
        let mut q = EventQueue::new();
        q.push(ev(0, 0, 2.0));
        q.push(ev(0, 0, 1.0));

        assert_eq!(q.pop_if(0.5), None);
        assert_eq!(q.pop_if(1.0).unwrap().time, 1.0);
        assert_eq!(q.pop_if(1.5), None);
        assert_eq!(q.pop_if(10.0).unwrap().time, 2.0);
        assert!(q.is_empty());
    }

    #[test]
    fn orders_by_time_then_target() {
        let mut q = EventQueue::new();
        q.push(ev(2, 0, 1.0));
        q.push(ev(1, 1, 1.0));
        q.push(ev(1, 0, 1.0));
        q.push(ev(0, 0, 0.5));

        let order: Vec<_> = std::iter::from_fn(|| q.pop_if(f64::MAX))
            .map(|e| (e.time, e.target.gid, e.target.index))
            .collect();
        assert_eq!(
            order,
            vec![(0.5, 0, 0), (1.0, 1, 0), (1.0, 1, 1), (1.0, 2, 0)]
        );
    }

    #[test]
    fn exact_ties_replay_in_insertion_order() {
        let mut q = EventQueue::new();
        let first = PostedEvent::new(CellMember::new(5, 0), 3.0, 0.25);
        let second = PostedEvent::new(CellMember::new(5, 0), 3.0, 0.75);
        q.push(first);
        q.push(second);

        assert_eq!(q.pop_if(3.0).unwrap().weight, 0.25);
        assert_eq!(q.pop_if(3.0).unwrap().weight, 0.75);
    }

    #[test]
    fn clear_resets_sequence() {
        let mut q = EventQueue::new();
        q.push(ev(0, 0, 1.0));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.peek_time(), None);
    }
}

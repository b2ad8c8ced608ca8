//! Binary-heap priority queue of [`QueuedCall`]s.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use uuid::Uuid;

use crate::types::QueuedCall;

#[derive(Default)]
pub struct CallQueue {
    heap: BinaryHeap<Reverse<QueuedCall>>,
    next_sequence: u64,
}

impl CallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    pub fn push(&mut self, call: QueuedCall) {
        self.heap.push(Reverse(call));
    }

    pub fn peek(&self) -> Option<&QueuedCall> {
        self.heap.peek().map(|Reverse(call)| call)
    }

    pub fn pop(&mut self) -> Option<QueuedCall> {
        self.heap.pop().map(|Reverse(call)| call)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// O(n) removal by id, used by `cancel_call`.
    pub fn remove(&mut self, call_id: Uuid) -> bool {
        let before = self.heap.len();
        let remaining: Vec<QueuedCall> = self.heap.drain().map(|Reverse(c)| c).filter(|c| c.call_id != call_id).collect();
        let removed = remaining.len() != before;
        self.heap = remaining.into_iter().map(Reverse).collect();
        removed
    }

    /// Snapshot sorted by `(priority, scheduled_at)` ascending.
    pub fn snapshot(&self) -> Vec<QueuedCall> {
        let mut calls: Vec<QueuedCall> = self.heap.iter().map(|Reverse(c)| c.clone()).collect();
        calls.sort_by(|a, b| a.cmp(b));
        calls
    }

    pub fn clear(&mut self) -> usize {
        let count = self.heap.len();
        self.heap.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn call(priority: crate::types::CallPriority, seq: u64) -> QueuedCall {
        QueuedCall {
            call_id: Uuid::new_v4(),
            priority,
            scheduled_at: Utc::now(),
            sequence: seq,
            patient_id: "p".to_string(),
            phone_number: "+491234".to_string(),
            patient_name: String::new(),
            campaign_id: None,
            campaign_type: "reminder".to_string(),
            attempt_number: 1,
            max_attempts: 3,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pops_highest_priority_first() {
        use crate::types::CallPriority::*;
        let mut queue = CallQueue::new();
        queue.push(call(Low, 0));
        queue.push(call(Urgent, 1));
        queue.push(call(Normal, 2));

        assert_eq!(queue.pop().unwrap().priority, Urgent);
        assert_eq!(queue.pop().unwrap().priority, Normal);
        assert_eq!(queue.pop().unwrap().priority, Low);
    }

    #[test]
    fn ties_broken_by_insertion_sequence() {
        use crate::types::CallPriority::Normal;
        let mut queue = CallQueue::new();
        let mut a = call(Normal, 0);
        let mut b = call(Normal, 1);
        a.scheduled_at = b.scheduled_at; // identical scheduled_at too
        b.scheduled_at = a.scheduled_at;
        let a_id = a.call_id;
        queue.push(a);
        queue.push(b);

        assert_eq!(queue.pop().unwrap().call_id, a_id);
    }

    #[test]
    fn cancel_removes_matching_call() {
        let mut queue = CallQueue::new();
        let c = call(crate::types::CallPriority::Normal, 0);
        let id = c.call_id;
        queue.push(c);
        assert!(queue.remove(id));
        assert!(queue.is_empty());
    }
}

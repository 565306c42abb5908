//! PriorityQueue (C5): thread-safe max-heap of scheduled DAG runs, ordered by
//! priority then FIFO within a priority class.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// One entry in the run queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub dag_run_id: Uuid,
    pub dag_id: String,
    pub execution_date: DateTime<Utc>,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.dag_run_id == other.dag_run_id
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
        // BinaryHeap is a max-heap: higher priority must compare greater,
        // and within a priority class the *older* item (FIFO) must compare
        // greater so it pops first — hence enqueued_at is reversed.
        self.priority.cmp(&other.priority).then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}

/// A mutually-exclusive priority queue of scheduled runs.
#[derive(Default)]
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<QueueItem>>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: QueueItem) {
        self.heap.lock().push(item);
    }

    pub fn pop(&self) -> Option<QueueItem> {
        self.heap.lock().pop()
    }

    pub fn peek(&self) -> Option<QueueItem> {
        self.heap.lock().peek().cloned()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    pub fn clear(&self) {
        self.heap.lock().clear();
    }

    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.heap.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(priority: Priority, age_secs: i64) -> QueueItem {
        QueueItem {
            dag_run_id: Uuid::new_v4(),
            dag_id: "d".to_string(),
            execution_date: Utc::now(),
            priority,
            enqueued_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn pops_highest_priority_first() {
        let q = PriorityQueue::new();
        q.push(item(Priority::Low, 0));
        q.push(item(Priority::High, 0));
        q.push(item(Priority::Medium, 0));
        assert_eq!(q.pop().unwrap().priority, Priority::High);
        assert_eq!(q.pop().unwrap().priority, Priority::Medium);
        assert_eq!(q.pop().unwrap().priority, Priority::Low);
    }

    #[test]
    fn fifo_within_same_priority_class() {
        let q = PriorityQueue::new();
        let older = item(Priority::Medium, 10);
        let newer = item(Priority::Medium, 1);
        let older_id = older.dag_run_id;
        q.push(newer);
        q.push(older);
        assert_eq!(q.pop().unwrap().dag_run_id, older_id);
    }

    #[test]
    fn pop_on_empty_queue_returns_none() {
        let q = PriorityQueue::new();
        assert!(q.pop().is_none());
    }

    #[test]
    fn clear_empties_the_queue() {
        let q = PriorityQueue::new();
        q.push(item(Priority::High, 0));
        q.clear();
        assert!(q.is_empty());
    }
}

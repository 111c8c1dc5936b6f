//! Insertion-ordered set of task identifiers awaiting selection.

use std::collections::{HashSet, VecDeque};

use crate::util::serde::TaskId;

/// Ready set in the order tasks became ready.
///
/// Policies see tasks in this order, which keeps round-robin rotation and
/// tie-breaks stable. Membership checks are O(1); removal is O(n).
#[derive(Debug, Default, Clone)]
pub struct ReadyQueue {
    order: VecDeque<TaskId>,
    members: HashSet<TaskId>,
}

impl ReadyQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. Returns `false` if it was already queued.
    pub fn push_back(&mut self, id: TaskId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    /// Remove a task. Returns `false` if it was not queued.
    pub fn remove(&mut self, id: TaskId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|queued| *queued == id) {
            self.order.remove(pos);
        }
        true
    }

    /// Whether `id` is queued.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.members.contains(&id)
    }

    /// Queued identifiers in order.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.order.iter().copied()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_insertion_order() {
        let mut queue = ReadyQueue::new();
        let ids: Vec<TaskId> = (0..4).map(|_| TaskId::new()).collect();
        for id in &ids {
            assert!(queue.push_back(*id));
        }
        assert!(!queue.push_back(ids[0]));
        assert_eq!(queue.iter().collect::<Vec<_>>(), ids);

        assert!(queue.remove(ids[1]));
        assert!(!queue.remove(ids[1]));
        assert!(!queue.contains(ids[1]));
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![ids[0], ids[2], ids[3]]);

        queue.push_back(ids[1]);
        assert_eq!(queue.iter().last(), Some(ids[1]));
        assert_eq!(queue.len(), 4);
    }
}

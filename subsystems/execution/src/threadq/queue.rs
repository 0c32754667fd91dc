//! # Wait Queue
//!
//! Ordered set of threads blocked on one resource.
//!
//! Besides the ordering key each entry remembers the priorities the waiter
//! demands on every scheduler it is eligible on. The owner of an inheriting
//! mutex is granted the best demand per scheduler, so the demands are kept
//! in the queue and refreshed whenever the waiter's priority changes.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::types::{Priority, SchedulerId, ThreadId};

/// Queueing discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Arrival order
    Fifo,
    /// Priority order, arrival order among equal priorities
    Priority,
}

#[derive(Debug, Clone)]
struct Waiter {
    thread: ThreadId,
    priority: Priority,
    demands: Vec<(SchedulerId, Priority)>,
}

/// Wait queue of a resource
#[derive(Debug, Clone)]
pub struct WaitQueue {
    discipline: Discipline,
    waiters: VecDeque<Waiter>,
}

impl WaitQueue {
    /// Create an empty queue
    pub fn new(discipline: Discipline) -> Self {
        Self {
            discipline,
            waiters: VecDeque::new(),
        }
    }

    /// Queueing discipline
    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// Insert a thread
    ///
    /// `priority` is the ordering key, `demands` the priorities the thread
    /// asks for on each scheduler. The thread must not be queued already.
    pub fn enqueue(
        &mut self,
        thread: ThreadId,
        priority: Priority,
        demands: Vec<(SchedulerId, Priority)>,
    ) {
        debug_assert!(!self.contains(thread));
        self.insert(Waiter {
            thread,
            priority,
            demands,
        });
    }

    fn insert(&mut self, waiter: Waiter) {
        match self.discipline {
            Discipline::Fifo => self.waiters.push_back(waiter),
            Discipline::Priority => {
                let position = self
                    .waiters
                    .iter()
                    .position(|w| waiter.priority.is_higher_than(w.priority))
                    .unwrap_or(self.waiters.len());
                self.waiters.insert(position, waiter);
            },
        }
    }

    /// Remove and return the head
    pub fn dequeue_head(&mut self) -> Option<ThreadId> {
        self.waiters.pop_front().map(|w| w.thread)
    }

    /// Remove a thread
    ///
    /// Returns `false` if the thread was not queued.
    pub fn remove(&mut self, thread: ThreadId) -> bool {
        match self.position(thread) {
            Some(position) => {
                self.waiters.remove(position);
                true
            },
            None => false,
        }
    }

    /// Refresh the priorities of a queued thread
    ///
    /// A priority-ordered queue moves the thread behind all waiters of equal
    /// or better priority. Returns `false` if the thread is not queued.
    pub fn update(
        &mut self,
        thread: ThreadId,
        priority: Priority,
        demands: Vec<(SchedulerId, Priority)>,
    ) -> bool {
        let Some(position) = self.position(thread) else {
            return false;
        };

        let waiter = &mut self.waiters[position];
        if self.discipline == Discipline::Fifo || waiter.priority == priority {
            waiter.priority = priority;
            waiter.demands = demands;
            return true;
        }

        self.waiters.remove(position);
        self.insert(Waiter {
            thread,
            priority,
            demands,
        });
        true
    }

    fn position(&self, thread: ThreadId) -> Option<usize> {
        self.waiters.iter().position(|w| w.thread == thread)
    }

    /// Head of the queue
    pub fn first(&self) -> Option<ThreadId> {
        self.waiters.front().map(|w| w.thread)
    }

    /// Check if `thread` is queued
    pub fn contains(&self, thread: ThreadId) -> bool {
        self.position(thread).is_some()
    }

    /// Number of waiters
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Check if nobody waits
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Waiters in queue order
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.waiters.iter().map(|w| w.thread)
    }

    /// Demands recorded for a queued thread
    pub fn demands_of(&self, thread: ThreadId) -> Option<&[(SchedulerId, Priority)]> {
        self.waiters
            .iter()
            .find(|w| w.thread == thread)
            .map(|w| w.demands.as_slice())
    }

    /// Best demand per scheduler over all waiters
    pub fn demand(&self) -> Vec<(SchedulerId, Priority)> {
        let mut best: Vec<(SchedulerId, Priority)> = Vec::new();
        for &(scheduler, priority) in self.waiters.iter().flat_map(|w| w.demands.iter()) {
            match best.iter_mut().find(|(s, _)| *s == scheduler) {
                Some((_, current)) => *current = (*current).min(priority),
                None => best.push((scheduler, priority)),
            }
        }
        best
    }

    /// Check the ordering and uniqueness invariants
    pub(crate) fn is_consistent(&self) -> bool {
        let unique = self
            .waiters
            .iter()
            .enumerate()
            .all(|(i, w)| self.waiters.iter().skip(i + 1).all(|o| o.thread != w.thread));
        let ordered = match self.discipline {
            Discipline::Fifo => true,
            Discipline::Priority => self
                .waiters
                .iter()
                .zip(self.waiters.iter().skip(1))
                .all(|(a, b)| a.priority <= b.priority),
        };
        unique && ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const S0: SchedulerId = SchedulerId::new(0);
    const S1: SchedulerId = SchedulerId::new(1);

    fn t(id: u32) -> ThreadId {
        ThreadId::new(id)
    }

    fn p(value: u32) -> Priority {
        Priority::new(value)
    }

    fn order(queue: &WaitQueue) -> Vec<u32> {
        queue.iter().map(ThreadId::as_u32).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = WaitQueue::new(Discipline::Fifo);
        queue.enqueue(t(1), p(20), vec![]);
        queue.enqueue(t(2), p(5), vec![]);
        queue.enqueue(t(3), p(10), vec![]);

        assert_eq!(order(&queue), vec![1, 2, 3]);
        assert_eq!(queue.dequeue_head(), Some(t(1)));
        assert_eq!(queue.dequeue_head(), Some(t(2)));
    }

    #[test]
    fn test_priority_order_is_stable() {
        let mut queue = WaitQueue::new(Discipline::Priority);
        queue.enqueue(t(1), p(10), vec![]);
        queue.enqueue(t(2), p(5), vec![]);
        queue.enqueue(t(3), p(10), vec![]);
        queue.enqueue(t(4), p(5), vec![]);
        queue.enqueue(t(5), p(1), vec![]);

        assert_eq!(order(&queue), vec![5, 2, 4, 1, 3]);
        assert!(queue.is_consistent());
    }

    #[test]
    fn test_dequeue_empty() {
        let mut queue = WaitQueue::new(Discipline::Priority);
        assert_eq!(queue.dequeue_head(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut queue = WaitQueue::new(Discipline::Fifo);
        queue.enqueue(t(1), p(1), vec![]);
        queue.enqueue(t(2), p(1), vec![]);

        assert!(queue.remove(t(1)));
        assert!(!queue.remove(t(1)));
        assert_eq!(queue.first(), Some(t(2)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_update_repositions() {
        let mut queue = WaitQueue::new(Discipline::Priority);
        queue.enqueue(t(1), p(5), vec![(S0, p(5))]);
        queue.enqueue(t(2), p(7), vec![(S0, p(7))]);
        queue.enqueue(t(3), p(9), vec![(S0, p(9))]);

        assert!(queue.update(t(3), p(5), vec![(S0, p(5))]));
        assert_eq!(order(&queue), vec![1, 3, 2]);

        assert!(queue.update(t(1), p(8), vec![(S0, p(8))]));
        assert_eq!(order(&queue), vec![3, 2, 1]);
        assert!(!queue.update(t(9), p(1), vec![]));
    }

    #[test]
    fn test_update_keeps_fifo_position() {
        let mut queue = WaitQueue::new(Discipline::Fifo);
        queue.enqueue(t(1), p(5), vec![(S0, p(5))]);
        queue.enqueue(t(2), p(7), vec![(S0, p(7))]);

        assert!(queue.update(t(2), p(1), vec![(S0, p(1))]));
        assert_eq!(order(&queue), vec![1, 2]);
        assert_eq!(queue.demands_of(t(2)), Some(&[(S0, p(1))][..]));
    }

    #[test]
    fn test_demand_per_scheduler() {
        let mut queue = WaitQueue::new(Discipline::Priority);
        queue.enqueue(t(1), p(6), vec![(S0, p(6))]);
        queue.enqueue(t(2), p(8), vec![(S1, p(8)), (S0, p(3))]);
        queue.enqueue(t(3), p(4), vec![(S1, p(4))]);

        let demand = queue.demand();
        assert_eq!(demand.len(), 2);
        assert!(demand.contains(&(S0, p(3))));
        assert!(demand.contains(&(S1, p(4))));
    }
}

//! Work distribution across checker threads (§5.C).
//!
//! Each worker owns a Chase-Lev work-stealing deque
//! (`crossbeam_deque::Worker`) for its own frontier of unexplored
//! states. Idle workers steal from one another's `Stealer` handle
//! rather than blocking, so a worker that races ahead of its siblings
//! still has work to pull. A bounded MPMC queue
//! (`crossbeam_queue::ArrayQueue`) sits alongside the deques as an
//! overflow: once a worker's local deque grows past
//! `LOCAL_OVERFLOW_THRESHOLD` states, newly generated successors go to
//! the shared overflow queue instead, capping per-worker memory growth
//! and giving idle stealers a second place to look before declaring
//! themselves out of work.

use crate::state::State;
use crossbeam_deque::{Steal, Stealer, Worker};
use crossbeam_queue::ArrayQueue;
use std::sync::Arc;

/// Local deques beyond this many queued states spill new pushes to
/// the shared overflow queue instead of growing further.
const LOCAL_OVERFLOW_THRESHOLD: usize = 4096;

pub struct WorkQueues {
    overflow: Arc<ArrayQueue<State>>,
    stealers: Vec<Stealer<State>>,
}

pub struct LocalQueue {
    worker: Worker<State>,
    stealers: Vec<Stealer<State>>,
    overflow: Arc<ArrayQueue<State>>,
    own_index: usize,
}

impl WorkQueues {
    /// Builds `num_workers` local queues sharing one overflow queue of
    /// the given bounded capacity.
    pub fn build(num_workers: usize, overflow_capacity: usize) -> Vec<LocalQueue> {
        let workers: Vec<Worker<State>> = (0..num_workers).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<State>> = workers.iter().map(|w| w.stealer()).collect();
        let overflow = Arc::new(ArrayQueue::new(overflow_capacity.max(1)));
        workers
            .into_iter()
            .enumerate()
            .map(|(i, worker)| LocalQueue {
                worker,
                stealers: stealers.clone(),
                overflow: Arc::clone(&overflow),
                own_index: i,
            })
            .collect()
    }
}

impl LocalQueue {
    pub fn push(&self, state: State) {
        if self.worker.len() >= LOCAL_OVERFLOW_THRESHOLD {
            if let Err(state) = self.overflow.push(state) {
                self.worker.push(state);
            }
        } else {
            self.worker.push(state);
        }
    }

    /// Pops the next state to explore: first the local deque, then
    /// the shared overflow, then a steal attempt against every other
    /// worker's deque. Returns `None` only once all three are
    /// momentarily empty — the caller decides whether that means
    /// "done" via the scheduler's termination barrier.
    pub fn pop(&self) -> Option<State> {
        if let Some(s) = self.worker.pop() {
            return Some(s);
        }
        if let Some(s) = self.overflow.pop() {
            return Some(s);
        }
        self.steal()
    }

    fn steal(&self) -> Option<State> {
        for (i, stealer) in self.stealers.iter().enumerate() {
            if i == self.own_index {
                continue;
            }
            loop {
                match stealer.steal() {
                    Steal::Success(state) => return Some(state),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.worker.is_empty() && self.overflow.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(byte: u8) -> State {
        let mut s = State::new(1);
        s.write_bits(0, 8, byte as u64);
        s
    }

    #[test]
    fn pushes_and_pops_locally_in_fifo_order() {
        let queues = WorkQueues::build(1, 16);
        let q = &queues[0];
        q.push(dummy(1));
        q.push(dummy(2));
        assert_eq!(q.pop().unwrap().read_bits(0, 8), 1);
        assert_eq!(q.pop().unwrap().read_bits(0, 8), 2);
        assert!(q.pop().is_none());
    }

    #[test]
    fn idle_worker_steals_from_a_busy_sibling() {
        let queues = WorkQueues::build(2, 16);
        queues[0].push(dummy(9));
        let stolen = queues[1].pop().expect("should steal from worker 0");
        assert_eq!(stolen.read_bits(0, 8), 9);
    }

    #[test]
    fn overflow_threshold_spills_excess_local_pushes() {
        let queues = WorkQueues::build(1, 64);
        let q = &queues[0];
        for i in 0..(LOCAL_OVERFLOW_THRESHOLD + 5) {
            q.push(dummy((i % 256) as u8));
        }
        assert!(!q.overflow.is_empty());
    }
}

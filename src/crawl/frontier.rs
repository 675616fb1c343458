//! The per-run work queue shared by all workers
//!
//! A frontier is built once by the distributor, handed to the pool behind an
//! `Arc`, drained to empty, and discarded. There is no cross-run state: a
//! re-run builds a brand new frontier rather than mutating a published one.

use crate::model::PlayerFacts;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe queue of players pending crawl in the current run
pub struct Frontier {
    queue: Mutex<VecDeque<PlayerFacts>>,
}

impl Frontier {
    /// Publishes a fully-built frontier
    ///
    /// The whole descriptor set is swapped in at construction; there is no
    /// way to interleave a partially-populated frontier with live workers.
    pub fn new(players: Vec<PlayerFacts>) -> Self {
        Self {
            queue: Mutex::new(players.into()),
        }
    }

    /// Non-blocking pop; `None` is the workers' single termination signal
    pub fn pop(&self) -> Option<PlayerFacts> {
        self.queue.lock().expect("frontier lock poisoned").pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("frontier lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

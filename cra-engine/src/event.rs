//! The trace record the engine replays and the resident entry it becomes.

use serde::{Deserialize, Serialize};

/// One line of a replayed trace: a key plus the time it takes to service a
/// hit or a miss for that key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub key: u64,
    pub weight: u32,
    pub hit_penalty: f64,
    pub miss_penalty: f64,
}

impl AccessEvent {
    pub fn new(key: u64, hit_penalty: f64, miss_penalty: f64) -> Self {
        Self {
            key,
            weight: 1,
            hit_penalty,
            miss_penalty,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Latency saved per hit by caching this item. May be negative, in
    /// which case caching it is actively worse than recomputing.
    pub fn delta(&self) -> f64 {
        self.miss_penalty - self.hit_penalty
    }

    /// `true` for events that cannot be represented (NaN/infinite
    /// penalties). Callers drop these before touching any state.
    pub fn is_representable(&self) -> bool {
        self.hit_penalty.is_finite() && self.miss_penalty.is_finite()
    }
}

/// A resident entry inside a [`crate::block::CraBlock`].
#[derive(Debug, Clone)]
pub struct Node {
    pub event: AccessEvent,
    pub weight: u32,
    /// Value of the block's operation counter at the last touch.
    pub last_op: u64,
    /// Decay epoch (see `CraBlock::decay`) as of the last touch; used to
    /// detect a node that predates the most recent age-decay halving.
    pub last_decay_epoch: u64,
    pub list_index: usize,
}

impl Node {
    pub fn delta(&self) -> f64 {
        self.event.delta()
    }
}

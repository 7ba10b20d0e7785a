//! `CraBlock` -- the benefit-bucketed, rank-evicting store described by
//! the CRA/LRBB design.
//!
//! Residents are clustered into `max_lists + 1` circular doubly-linked
//! lists by a benefit score (`delta`); bucket 0 holds negative-delta
//! items and is always evicted first. Lists live in a flat arena of
//! fixed-identity slots addressed by index -- a slot's index is its
//! stable identity for as long as it is occupied, matching the
//! arena-of-slots style used elsewhere for cyclic structures in this
//! codebase (see [`crate::policy`]'s segment bookkeeping). Slot 0..=
//! `max_lists` are reserved sentinels, one per list; data slots are
//! handed out from a free list above that range.

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};

use crate::event::{AccessEvent, Node};
use crate::normalization;

type SlotId = usize;

#[derive(Debug)]
enum Slot {
    Sentinel {
        prev: SlotId,
        next: SlotId,
    },
    Data {
        node: Node,
        prev: SlotId,
        next: SlotId,
    },
    Free {
        next_free: Option<SlotId>,
    },
}

impl Slot {
    fn prev(&self) -> SlotId {
        match self {
            Slot::Sentinel { prev, .. } | Slot::Data { prev, .. } => *prev,
            Slot::Free { .. } => unreachable!("free slot has no links"),
        }
    }

    fn next(&self) -> SlotId {
        match self {
            Slot::Sentinel { next, .. } | Slot::Data { next, .. } => *next,
            Slot::Free { .. } => unreachable!("free slot has no links"),
        }
    }

    fn set_prev(&mut self, v: SlotId) {
        match self {
            Slot::Sentinel { prev, .. } | Slot::Data { prev, .. } => *prev = v,
            Slot::Free { .. } => unreachable!("free slot has no links"),
        }
    }

    fn set_next(&mut self, v: SlotId) {
        match self {
            Slot::Sentinel { next, .. } | Slot::Data { next, .. } => *next = v,
            Slot::Free { .. } => unreachable!("free slot has no links"),
        }
    }

    fn as_data(&self) -> &Node {
        match self {
            Slot::Data { node, .. } => node,
            _ => unreachable!("expected a data slot"),
        }
    }

    fn as_data_mut(&mut self) -> &mut Node {
        match self {
            Slot::Data { node, .. } => node,
            _ => unreachable!("expected a data slot"),
        }
    }
}

/// Outcome of touching a resident key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccessOutcome {
    /// The node had a non-negative delta and was moved to its (possibly
    /// new) bucket's tail.
    Moved,
    /// The node had a negative delta on this touch and was removed. Per
    /// this engine's accounting this is *not* tallied as a hit -- it is
    /// the cache discovering the item should never have been kept.
    EvictedNegativeDelta,
}

pub struct CraBlock {
    capacity: u64,
    current_size: u64,
    max_lists: usize,
    arena: Vec<Slot>,
    free_head: Option<SlotId>,
    active_lists: BTreeSet<usize>,
    list_sizes: Vec<u64>,
    data: HashMap<u64, SlotId>,
    curr_op: u64,
    req_count: u64,
    decay_epoch: u64,
    k: f64,
    bias: f64,
    factor: f64,
}

impl CraBlock {
    /// `max_lists` is the number of non-negative-delta buckets; the block
    /// has `max_lists + 1` lists in total once bucket 0 is counted. `k`
    /// is the recency-vs-benefit exponent used by [`Self::find_victim`].
    pub fn new(capacity: u64, max_lists: usize, k: f64) -> Self {
        let sentinels = max_lists + 1;
        let mut arena = Vec::with_capacity(sentinels);
        for i in 0..sentinels {
            arena.push(Slot::Sentinel { prev: i, next: i });
        }
        Self {
            capacity,
            current_size: 0,
            max_lists,
            arena,
            free_head: None,
            active_lists: BTreeSet::new(),
            list_sizes: vec![0; sentinels],
            data: HashMap::new(),
            curr_op: 0,
            req_count: 0,
            decay_epoch: 0,
            k,
            bias: 0.0,
            factor: 1.0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Change the admitted-weight ceiling, e.g. when a climber moves the
    /// Window/Main boundary. Shrinking does not itself evict -- existing
    /// residents stay put until the next [`Self::make_room`] call finds
    /// `current_size` above the new `capacity`.
    pub fn resize(&mut self, new_capacity: u64) {
        self.capacity = new_capacity;
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.data.contains_key(&key)
    }

    pub fn resident_keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.data.keys().copied()
    }

    /// Publishes the policy-wide `(bias, factor)` mapping. Existing
    /// nodes are *not* eagerly rebucketed -- they are corrected the next
    /// time they are touched by [`Self::on_access`] or considered by
    /// [`Self::find_victim`] (bucket recompute is lazy; see
    /// `on_access`).
    pub fn set_normalization(&mut self, bias: f64, factor: f64) {
        self.bias = bias;
        self.factor = factor;
    }

    fn bucket_for(&self, delta: f64) -> usize {
        normalization::bucket_for(delta, self.bias, self.factor, self.max_lists)
    }

    fn sentinel(&self, list: usize) -> SlotId {
        list
    }

    fn allocate_slot(&mut self, node: Node) -> SlotId {
        if let Some(free) = self.free_head {
            let next_free = match &self.arena[free] {
                Slot::Free { next_free } => *next_free,
                _ => unreachable!("free list points at an occupied slot"),
            };
            self.free_head = next_free;
            self.arena[free] = Slot::Data {
                node,
                prev: free,
                next: free,
            };
            free
        } else {
            let id = self.arena.len();
            self.arena.push(Slot::Data {
                node,
                prev: id,
                next: id,
            });
            id
        }
    }

    fn free_slot(&mut self, slot: SlotId) {
        self.arena[slot] = Slot::Free {
            next_free: self.free_head,
        };
        self.free_head = Some(slot);
    }

    fn link_tail(&mut self, list: usize, slot: SlotId) {
        let sentinel = self.sentinel(list);
        let old_tail = self.arena[sentinel].prev();
        self.arena[slot].set_prev(old_tail);
        self.arena[slot].set_next(sentinel);
        self.arena[old_tail].set_next(slot);
        self.arena[sentinel].set_prev(slot);

        self.list_sizes[list] += 1;
        self.active_lists.insert(list);
        self.arena[slot].as_data_mut().list_index = list;
    }

    fn unlink(&mut self, slot: SlotId) {
        let list = self.arena[slot].as_data().list_index;
        let prev = self.arena[slot].prev();
        let next = self.arena[slot].next();
        self.arena[prev].set_next(next);
        self.arena[next].set_prev(prev);

        self.list_sizes[list] -= 1;
        if self.list_sizes[list] == 0 {
            self.active_lists.remove(&list);
        }
    }

    /// LRU (head-next) resident of a list, if any.
    fn list_head(&self, list: usize) -> Option<SlotId> {
        let sentinel = self.sentinel(list);
        let candidate = self.arena[sentinel].next();
        if candidate == sentinel {
            None
        } else {
            Some(candidate)
        }
    }

    /// Right-shifts `curr_op` and bumps the decay epoch. Stale nodes'
    /// `last_op` is corrected lazily the next time they are considered,
    /// via [`Self::reset_op_if_stale`].
    fn decay(&mut self) {
        self.curr_op >>= 1;
        self.decay_epoch += 1;
        self.req_count = 0;
    }

    fn touch_op(&mut self) -> u64 {
        let op = self.curr_op;
        self.curr_op += 1;
        self.req_count += 1;
        if self.req_count >= self.capacity.max(1) {
            self.decay();
        }
        op
    }

    fn reset_op_if_stale(&mut self, slot: SlotId) {
        let epoch = self.decay_epoch;
        let node = self.arena[slot].as_data_mut();
        if node.last_decay_epoch < epoch {
            node.last_op >>= 1;
            node.last_decay_epoch = epoch;
        }
    }

    fn rank_score(&self, slot: SlotId) -> f64 {
        let node = self.arena[slot].as_data();
        let delta = node.delta();
        let age = self.curr_op.saturating_sub(node.last_op).max(1) as f64;
        let exponent = age.powf(-self.k);
        delta.signum() * delta.abs().powf(exponent)
    }

    /// Best eviction candidate, or `None` if the block is empty. Per the
    /// engine's failure model this must never be `None` while
    /// `current_size() > 0`.
    fn find_victim(&mut self) -> Option<SlotId> {
        if self.active_lists.contains(&0) {
            return self.list_head(0);
        }

        let mut best: Option<(SlotId, f64, f64)> = None;
        let lists: Vec<usize> = self.active_lists.iter().copied().collect();
        for list in lists {
            let Some(slot) = self.list_head(list) else {
                continue;
            };
            self.reset_op_if_stale(slot);
            let rank = self.rank_score(slot);
            let node = self.arena[slot].as_data();
            let ratio = node.last_op as f64 / self.curr_op.max(1) as f64;

            let replace = match &best {
                None => true,
                Some((_, best_rank, best_ratio)) => {
                    rank < *best_rank || (rank == *best_rank && ratio < *best_ratio)
                }
            };
            if replace {
                best = Some((slot, rank, ratio));
            }
        }
        best.map(|(slot, _, _)| slot)
    }

    fn extract_slot(&mut self, slot: SlotId) -> Node {
        self.unlink(slot);
        let node = match std::mem::replace(&mut self.arena[slot], Slot::Free { next_free: None }) {
            Slot::Data { node, .. } => node,
            _ => unreachable!("expected a data slot"),
        };
        self.current_size -= node.weight as u64;
        self.data.remove(&node.event.key);
        self.arena[slot] = Slot::Free {
            next_free: self.free_head,
        };
        self.free_head = Some(slot);
        node
    }

    /// Remove a resident by key, e.g. when a segment boundary shrinks.
    /// Returns `true` if the key was resident.
    pub fn remove(&mut self, key: u64) -> bool {
        if let Some(&slot) = self.data.get(&key) {
            self.extract_slot(slot);
            true
        } else {
            false
        }
    }

    /// Remove a resident by key and return its node, for callers moving
    /// it to another block (cross-segment promotion/demotion).
    pub fn extract(&mut self, key: u64) -> Option<Node> {
        let &slot = self.data.get(&key)?;
        Some(self.extract_slot(slot))
    }

    /// The current best eviction candidate's key, without removing it.
    /// Mutates staleness bookkeeping on the candidate (see
    /// `reset_op_if_stale`), but not block membership.
    pub fn victim_key(&mut self) -> Option<u64> {
        let slot = self.find_victim()?;
        Some(self.arena[slot].as_data().event.key)
    }

    /// Evict and return the current best victim's node.
    pub fn evict_one(&mut self) -> Option<Node> {
        let slot = self.find_victim()?;
        let node = self.extract_slot(slot);
        debug!("evicting key={} delta={:.3}", node.event.key, node.delta());
        Some(node)
    }

    /// If admitting `weight` more would exceed capacity, evict one victim
    /// and return it; otherwise `None`. Call in a loop for `weight > 1`.
    pub fn make_room(&mut self, weight: u32) -> Option<Node> {
        if self.current_size + weight as u64 <= self.capacity {
            return None;
        }
        self.evict_one()
    }

    fn insert_node(&mut self, event: AccessEvent) {
        let bucket = self.bucket_for(event.delta());
        let decay_epoch = self.decay_epoch;
        let node = Node {
            event,
            weight: event.weight,
            last_op: 0,
            last_decay_epoch: decay_epoch,
            list_index: bucket,
        };
        let slot = self.allocate_slot(node);
        let op = self.touch_op();
        self.arena[slot].as_data_mut().last_op = op;
        self.link_tail(bucket, slot);
        self.current_size += event.weight as u64;
        self.data.insert(event.key, slot);
    }

    /// Insert a brand-new event as the most-recent touch, without making
    /// room first -- the caller (e.g. a policy spilling its own victim
    /// before admitting a new arrival) is responsible for capacity.
    pub fn insert_fresh(&mut self, event: AccessEvent) {
        self.insert_node(event);
    }

    /// Admits `event` on a miss, evicting residents until there is room.
    /// Returns the keys evicted to make space. An event whose weight
    /// exceeds capacity is silently dropped (no state change at all, not
    /// even the operation counter).
    pub fn add_entry(&mut self, event: AccessEvent) -> Vec<u64> {
        if event.weight as u64 > self.capacity {
            warn!(
                "dropping key={} weight={} exceeding capacity={}",
                event.key, event.weight, self.capacity
            );
            return Vec::new();
        }

        let mut evicted = Vec::new();
        while let Some(node) = self.make_room(event.weight) {
            evicted.push(node.event.key);
        }
        self.insert_node(event);
        evicted
    }

    /// Insert a node carried over from another segment, preserving its
    /// `AccessEvent` and `last_op` exactly -- this is the cross-segment
    /// "move the slot, not reallocate" identity rule realized across two
    /// independent arenas. The caller must have already made room;
    /// `adopt_raw` does not evict.
    pub fn adopt_raw(&mut self, mut node: Node) {
        let bucket = self.bucket_for(node.delta());
        node.list_index = bucket;
        node.last_decay_epoch = self.decay_epoch;
        let weight = node.weight as u64;
        let key = node.event.key;
        let slot = self.allocate_slot(node);
        self.link_tail(bucket, slot);
        self.current_size += weight;
        self.data.insert(key, slot);
    }

    /// Touch a resident key on a hit, observing a (possibly updated)
    /// `hit_penalty` for it. Returns `None` if the key is not resident.
    pub fn on_access(&mut self, key: u64, observed_hit_penalty: f64) -> Option<AccessOutcome> {
        let &slot = self.data.get(&key)?;
        self.arena[slot].as_data_mut().event.hit_penalty = observed_hit_penalty;
        let delta = self.arena[slot].as_data().delta();

        if delta < 0.0 {
            self.extract_slot(slot);
            return Some(AccessOutcome::EvictedNegativeDelta);
        }

        // Re-attached at the target bucket's tail whether or not the
        // bucket changed -- a same-bucket hit still needs to move to MRU.
        let new_bucket = self.bucket_for(delta);
        self.unlink(slot);
        self.link_tail(new_bucket, slot);
        let op = self.touch_op();
        self.arena[slot].as_data_mut().last_op = op;
        Some(AccessOutcome::Moved)
    }

    pub fn peek_delta(&self, key: u64) -> Option<f64> {
        self.data.get(&key).map(|&slot| self.arena[slot].as_data().delta())
    }

    pub fn peek_event(&self, key: u64) -> Option<AccessEvent> {
        self.data.get(&key).map(|&slot| self.arena[slot].as_data().event)
    }

    /// Debug/test helper validating the structural invariants from the
    /// design (sum of weights, list sizes, active-list membership).
    #[doc(hidden)]
    pub fn check_invariants(&self) -> Result<(), String> {
        let sum: u64 = self
            .data
            .values()
            .map(|&slot| self.arena[slot].as_data().weight as u64)
            .sum();
        if sum != self.current_size {
            return Err(format!(
                "current_size {} does not match resident weight sum {}",
                self.current_size, sum
            ));
        }
        if self.current_size > self.capacity {
            return Err(format!(
                "current_size {} exceeds capacity {}",
                self.current_size, self.capacity
            ));
        }
        for (list, &size) in self.list_sizes.iter().enumerate() {
            let active = self.active_lists.contains(&list);
            if (size > 0) != active {
                return Err(format!(
                    "list {list} has size {size} but active={active}"
                ));
            }
        }
        let total: u64 = self.list_sizes.iter().sum();
        if total as usize != self.data.len() {
            return Err(format!(
                "list sizes sum to {total} but {} keys are resident",
                self.data.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::Normalization;

    fn insert_with_normalization(block: &mut CraBlock, norm: &mut Normalization, ev: AccessEvent) -> Vec<u64> {
        norm.observe(ev.delta());
        block.set_normalization(norm.bias(), norm.factor());
        block.add_entry(ev)
    }

    #[test]
    fn scenario_1_no_eviction_needed() {
        let mut block = CraBlock::new(4, 4, 1.0);
        let mut norm = Normalization::new();
        for ev in [
            AccessEvent::new(1, 1.0, 10.0),
            AccessEvent::new(2, 1.0, 5.0),
            AccessEvent::new(3, 1.0, 1.0),
            AccessEvent::new(4, 1.0, 0.1),
        ] {
            let evicted = insert_with_normalization(&mut block, &mut norm, ev);
            assert!(evicted.is_empty());
        }
        let mut keys: Vec<u64> = block.resident_keys().collect();
        keys.sort();
        assert_eq!(keys, vec![1, 2, 3, 4]);
        block.check_invariants().unwrap();
    }

    #[test]
    fn scenario_2_negative_delta_evicted_first() {
        let mut block = CraBlock::new(4, 4, 1.0);
        let mut norm = Normalization::new();
        for ev in [
            AccessEvent::new(1, 1.0, 10.0),
            AccessEvent::new(2, 1.0, 5.0),
            AccessEvent::new(3, 1.0, 1.0),
            AccessEvent::new(4, 1.0, 0.1),
        ] {
            insert_with_normalization(&mut block, &mut norm, ev);
        }
        let evicted = insert_with_normalization(&mut block, &mut norm, AccessEvent::new(5, 1.0, 20.0));
        assert_eq!(evicted, vec![4]);
        let mut keys: Vec<u64> = block.resident_keys().collect();
        keys.sort();
        assert_eq!(keys, vec![1, 2, 3, 5]);
        block.check_invariants().unwrap();
    }

    #[test]
    fn scenario_3_repeated_hit_stays_resident() {
        let mut block = CraBlock::new(4, 4, 1.0);
        let mut norm = Normalization::new();
        let mut hits = 0;
        let ev = AccessEvent::new(1, 1.0, 10.0);
        insert_with_normalization(&mut block, &mut norm, ev);
        for _ in 0..2 {
            match block.on_access(1, 1.0) {
                Some(AccessOutcome::Moved) => hits += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(hits, 2);
        assert_eq!(block.resident_keys().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn scenario_4_negative_delta_hit_removes_and_is_not_tallied() {
        let mut block = CraBlock::new(4, 4, 1.0);
        let mut norm = Normalization::new();
        insert_with_normalization(&mut block, &mut norm, AccessEvent::new(1, 1.0, 10.0));

        let mut hit_count = 0;
        match block.on_access(1, 1.0) {
            Some(AccessOutcome::Moved) => hit_count += 1,
            other => panic!("unexpected: {other:?}"),
        }
        match block.on_access(1, 1.0) {
            Some(AccessOutcome::EvictedNegativeDelta) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(hit_count, 1);
        assert!(block.is_empty());
    }

    #[test]
    fn scenario_5_equal_deltas_evict_lru() {
        let mut block = CraBlock::new(4, 4, 1.0);
        let mut norm = Normalization::new();
        for key in 1..=5u64 {
            insert_with_normalization(&mut block, &mut norm, AccessEvent::new(key, 1.0, 1.0));
        }
        assert_eq!(block.len(), 4);
        assert!(block.contains(5));
        let evicted_count = (1..=4u64).filter(|k| !block.contains(*k)).count();
        assert_eq!(evicted_count, 1);
        block.check_invariants().unwrap();
    }

    #[test]
    fn find_victim_prefers_bucket_zero_regardless_of_k() {
        for k in [0.01, 1.0, 100.0] {
            let mut block = CraBlock::new(3, 4, k);
            block.set_normalization(0.0, 1.0);
            block.add_entry(AccessEvent::new(1, 10.0, 1.0)); // delta -9, bucket 0
            block.add_entry(AccessEvent::new(2, 1.0, 5.0)); // delta 4
            let evicted = block.add_entry(AccessEvent::new(3, 1.0, 6.0)); // forces eviction
            assert_eq!(evicted, vec![1]);
        }
    }

    #[test]
    fn oversized_weight_is_dropped_without_state_change() {
        let mut block = CraBlock::new(2, 4, 1.0);
        let before = block.len();
        let evicted = block.add_entry(AccessEvent::new(1, 1.0, 2.0).with_weight(10));
        assert!(evicted.is_empty());
        assert_eq!(block.len(), before);
        assert!(!block.contains(1));
    }
}

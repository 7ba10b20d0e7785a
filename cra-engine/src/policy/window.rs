//! `WindowCa` -- three `CraBlock`s (Window, Probation, Protected) wired
//! together as an SLRU main store with latency-aware TinyLFU admission
//! at the Probation boundary.

use std::collections::HashMap;

use crate::admission::{FrequencySketch, LaTinyLfu};
use crate::block::{AccessOutcome, CraBlock};
use crate::event::{AccessEvent, Node};
use crate::normalization::Normalization;
use crate::stats::{Segment, StatsSink};

use super::PolicyConfig;

pub struct WindowCa<S: FrequencySketch> {
    window: CraBlock,
    probation: CraBlock,
    protected: CraBlock,
    normalization: Normalization,
    admittor: LaTinyLfu<S>,
    tags: HashMap<u64, Segment>,
}

impl<S: FrequencySketch> WindowCa<S> {
    pub fn new(config: PolicyConfig, sketch: S) -> Self {
        let window = CraBlock::new(config.max_window(), config.max_lists, config.k);
        let probation = CraBlock::new(config.max_probation(), config.max_lists, config.k);
        let protected = CraBlock::new(config.max_protected(), config.max_lists, config.k);
        Self {
            window,
            probation,
            protected,
            normalization: Normalization::new(),
            admittor: LaTinyLfu::new(sketch),
            tags: HashMap::new(),
        }
    }

    /// Construct with a caller-built admittor, e.g. [`LaTinyLfu::always_admit`]
    /// for a deterministic test harness instead of the default scored one.
    pub fn with_admittor(config: PolicyConfig, admittor: LaTinyLfu<S>) -> Self {
        let window = CraBlock::new(config.max_window(), config.max_lists, config.k);
        let probation = CraBlock::new(config.max_probation(), config.max_lists, config.k);
        let protected = CraBlock::new(config.max_protected(), config.max_lists, config.k);
        Self {
            window,
            probation,
            protected,
            normalization: Normalization::new(),
            admittor,
            tags: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.tags.contains_key(&key)
    }

    pub fn segment_of(&self, key: u64) -> Option<Segment> {
        self.tags.get(&key).copied()
    }

    pub fn window(&self) -> &CraBlock {
        &self.window
    }

    pub fn probation(&self) -> &CraBlock {
        &self.probation
    }

    pub fn protected(&self) -> &CraBlock {
        &self.protected
    }

    pub(crate) fn window_mut(&mut self) -> &mut CraBlock {
        &mut self.window
    }

    pub(crate) fn probation_mut(&mut self) -> &mut CraBlock {
        &mut self.probation
    }

    pub(crate) fn protected_mut(&mut self) -> &mut CraBlock {
        &mut self.protected
    }

    pub(crate) fn tags_mut(&mut self) -> &mut HashMap<u64, Segment> {
        &mut self.tags
    }

    pub(crate) fn sync_normalization(&mut self) {
        let (bias, factor) = (self.normalization.bias(), self.normalization.factor());
        self.window.set_normalization(bias, factor);
        self.probation.set_normalization(bias, factor);
        self.protected.set_normalization(bias, factor);
    }

    /// Replay one access event against this policy, reporting hit/miss,
    /// eviction, and admission signals to `sink`.
    pub fn record(&mut self, event: AccessEvent, sink: &mut dyn StatsSink) {
        if !event.is_representable() {
            return;
        }

        match self.tags.get(&event.key).copied() {
            Some(Segment::Window) => self.on_window_hit(event, sink),
            Some(Segment::Probation) => self.on_probation_hit(event, sink),
            Some(Segment::Protected) => self.on_protected_hit(event, sink),
            Some(Segment::Single) | None => self.on_miss(event, sink),
        }
    }

    fn on_window_hit(&mut self, event: AccessEvent, sink: &mut dyn StatsSink) {
        match self.window.on_access(event.key, event.hit_penalty) {
            Some(AccessOutcome::Moved) => {
                sink.hit(Segment::Window, event.weight, event.hit_penalty);
            }
            Some(AccessOutcome::EvictedNegativeDelta) => {
                self.tags.remove(&event.key);
            }
            None => unreachable!("tag said Window-resident"),
        }
    }

    fn on_protected_hit(&mut self, event: AccessEvent, sink: &mut dyn StatsSink) {
        match self.protected.on_access(event.key, event.hit_penalty) {
            Some(AccessOutcome::Moved) => {
                sink.hit(Segment::Protected, event.weight, event.hit_penalty);
            }
            Some(AccessOutcome::EvictedNegativeDelta) => {
                self.tags.remove(&event.key);
            }
            None => unreachable!("tag said Protected-resident"),
        }
    }

    fn on_probation_hit(&mut self, event: AccessEvent, sink: &mut dyn StatsSink) {
        let Some(mut node) = self.probation.extract(event.key) else {
            unreachable!("tag said Probation-resident");
        };
        self.tags.remove(&event.key);
        node.event.hit_penalty = event.hit_penalty;

        if node.delta() < 0.0 {
            // Would never have been worth caching now that the real hit
            // cost is known; drop instead of promoting.
            return;
        }

        sink.hit(Segment::Probation, event.weight, event.hit_penalty);
        self.promote_to_protected(node, sink);
    }

    fn promote_to_protected(&mut self, node: Node, sink: &mut dyn StatsSink) {
        if self.protected.current_size() + node.weight as u64 > self.protected.capacity() {
            if let Some(demoted) = self.protected.evict_one() {
                self.tags.remove(&demoted.event.key);
                self.enter_probation(demoted, sink);
            }
        }
        let key = node.event.key;
        self.tags.insert(key, Segment::Protected);
        self.protected.adopt_raw(node);
    }

    /// Insert `candidate` into Probation, contesting with Probation's own
    /// victim via the admittor if Probation has no room. This is the
    /// single admission boundary of the policy: both the Window spill
    /// and the Protected demotion path route through it.
    fn enter_probation(&mut self, candidate: Node, sink: &mut dyn StatsSink) {
        if self.probation.current_size() + candidate.weight as u64 <= self.probation.capacity() {
            let key = candidate.event.key;
            self.tags.insert(key, Segment::Probation);
            self.probation.adopt_raw(candidate);
            sink.admitted(key);
            return;
        }

        let Some(victim_key) = self.probation.victim_key() else {
            // Probation is configured with zero capacity; candidate has
            // nowhere to go.
            sink.rejected(candidate.event.key);
            sink.eviction(candidate.event.key);
            return;
        };
        let victim_event = self
            .probation
            .peek_event(victim_key)
            .expect("victim_key names a resident");

        if self.admittor.admit(&candidate.event, &victim_event) {
            self.probation.remove(victim_key);
            self.tags.remove(&victim_key);
            sink.eviction(victim_key);

            let key = candidate.event.key;
            self.tags.insert(key, Segment::Probation);
            self.probation.adopt_raw(candidate);
            sink.admitted(key);
        } else {
            sink.rejected(candidate.event.key);
            sink.eviction(candidate.event.key);
        }
    }

    /// Re-settle every segment against its current capacity after a
    /// climber resize moved a boundary. Each segment spills its own
    /// overflow through the same paths a normal miss or promotion would
    /// use, so admission accounting stays consistent.
    pub(crate) fn rebalance(&mut self, sink: &mut dyn StatsSink) {
        while self.window.current_size() > self.window.capacity() {
            let Some(spilled) = self.window.evict_one() else {
                break;
            };
            self.tags.remove(&spilled.event.key);
            self.enter_probation(spilled, sink);
        }
        while self.protected.current_size() > self.protected.capacity() {
            let Some(demoted) = self.protected.evict_one() else {
                break;
            };
            self.tags.remove(&demoted.event.key);
            self.enter_probation(demoted, sink);
        }
        while self.probation.current_size() > self.probation.capacity() {
            let Some(demoted) = self.probation.evict_one() else {
                break;
            };
            self.tags.remove(&demoted.event.key);
            sink.eviction(demoted.event.key);
        }
    }

    fn on_miss(&mut self, event: AccessEvent, sink: &mut dyn StatsSink) {
        self.admittor.record(&event);
        self.normalization.observe(event.delta());
        self.sync_normalization();
        sink.miss(event.weight, event.miss_penalty);

        if event.weight as u64 > self.window.capacity() {
            return;
        }

        while let Some(spilled) = self.window.make_room(event.weight) {
            self.tags.remove(&spilled.event.key);
            self.enter_probation(spilled, sink);
        }

        self.tags.insert(event.key, Segment::Window);
        self.window.insert_fresh(event);
    }

    /// Debug/test helper: every resident key is tagged to exactly one
    /// segment and segment sizes add up.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> Result<(), String> {
        self.window.check_invariants()?;
        self.probation.check_invariants()?;
        self.protected.check_invariants()?;

        let total_tagged = self.tags.len();
        let total_resident = self.window.len() + self.probation.len() + self.protected.len();
        if total_tagged != total_resident {
            return Err(format!(
                "{total_tagged} tagged keys but {total_resident} residents across segments"
            ));
        }
        for (&key, &segment) in self.tags.iter() {
            let present = match segment {
                Segment::Window => self.window.contains(key),
                Segment::Probation => self.probation.contains(key),
                Segment::Protected => self.protected.contains(key),
                Segment::Single => false,
            };
            if !present {
                return Err(format!("key {key} tagged {segment:?} but not resident there"));
            }
        }
        Ok(())
    }
}

//! Property tests driving random operation sequences against `CraBlock`
//! and `WindowCa`, checking the universal invariants from spec.md §8
//! after every step rather than only at fixed checkpoints.

use quickcheck_macros::quickcheck;
use rand::Rng;

use cra_engine::admission::AlwaysAdmit;
use cra_engine::normalization::Normalization;
use cra_engine::{AccessEvent, CraBlock, PolicyConfig, WindowCa};

/// One step of a random trace: a small key space and small, possibly
/// negative penalties keep the state space dense enough that eviction,
/// promotion, and negative-delta removal all fire frequently.
#[derive(Debug, Clone, Copy)]
struct Step {
    key: u8,
    hit_penalty: i8,
    miss_penalty: i8,
}

impl quickcheck::Arbitrary for Step {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Step {
            key: g.rng().gen_range(0..12u8),
            hit_penalty: g.rng().gen_range(-5..=20i8),
            miss_penalty: g.rng().gen_range(-5..=20i8),
        }
    }
}

fn event(step: Step) -> AccessEvent {
    AccessEvent::new(step.key as u64, step.hit_penalty as f64, step.miss_penalty as f64)
}

#[quickcheck]
fn cra_block_invariants_hold_after_every_step(steps: Vec<Step>) -> bool {
    let mut block = CraBlock::new(4, 4, 1.0);
    let mut norm = Normalization::new();
    for step in steps {
        let ev = event(step);
        if block.contains(ev.key) {
            block.on_access(ev.key, ev.hit_penalty);
        } else {
            norm.observe(ev.delta());
            block.set_normalization(norm.bias(), norm.factor());
            block.add_entry(ev);
        }
        if block.check_invariants().is_err() {
            return false;
        }
    }
    true
}

#[quickcheck]
fn window_ca_segment_tags_stay_consistent(steps: Vec<Step>) -> bool {
    let config = PolicyConfig {
        maximum_size: 8,
        percent_main: 0.5,
        percent_main_protected: 0.5,
        max_lists: 4,
        k: 1.0,
    };
    let mut policy = WindowCa::new(config, AlwaysAdmit::new());
    let mut sink = cra_engine::NullSink;
    for step in steps {
        policy.record(event(step), &mut sink);
        if policy.check_invariants().is_err() {
            return false;
        }
        if policy.len() > config.maximum_size as usize {
            return false;
        }
    }
    true
}

#[quickcheck]
fn cra_block_never_exceeds_capacity(steps: Vec<Step>) -> bool {
    let mut block = CraBlock::new(4, 4, 1.0);
    let mut norm = Normalization::new();
    for step in steps {
        let ev = event(step);
        if block.contains(ev.key) {
            block.on_access(ev.key, ev.hit_penalty);
        } else {
            norm.observe(ev.delta());
            block.set_normalization(norm.bias(), norm.factor());
            block.add_entry(ev);
        }
        if block.current_size() > block.capacity() {
            return false;
        }
    }
    true
}

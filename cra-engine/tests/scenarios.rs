use cra_engine::policy::climber::{Climber, ClimberConfig};
use cra_engine::policy::window::WindowCa;
use cra_engine::{AccessEvent, AdaptiveCa, CountingSink, PolicyConfig, Segment};

use cra_engine::admission::{AlwaysAdmit, CountMinSketch64};

fn config() -> PolicyConfig {
    PolicyConfig {
        maximum_size: 64,
        percent_main: 0.9,
        percent_main_protected: 0.8,
        max_lists: 6,
        k: 1.0,
    }
}

/// A Window of exactly one slot: the resident it holds is always the one
/// spilled into Probation by the very next distinct miss, which makes the
/// promotion path below deterministic rather than rank-score-dependent.
fn single_slot_window_config() -> PolicyConfig {
    PolicyConfig {
        maximum_size: 20,
        percent_main: 0.95,
        percent_main_protected: 0.5,
        max_lists: 4,
        k: 1.0,
    }
}

#[test]
fn window_ca_never_exceeds_maximum_size_over_a_skewed_trace() {
    let mut policy = WindowCa::new(config(), CountMinSketch64::new(64));
    let mut sink = CountingSink::new();
    for i in 0..5_000u64 {
        let key = i % 500;
        let penalty = 1.0 + (key % 23) as f64;
        policy.record(AccessEvent::new(key, 1.0, penalty), &mut sink);
    }
    assert!(policy.len() as u64 <= config().maximum_size);
    policy.check_invariants().unwrap();
    let report = sink.report();
    assert!(report.hits + report.misses > 0);
}

#[test]
fn window_ca_promotes_a_spilled_key_through_probation_into_protected() {
    let mut policy = WindowCa::new(single_slot_window_config(), AlwaysAdmit::new());
    let mut sink = CountingSink::new();

    // Window holds one slot. This miss is its sole resident.
    policy.record(AccessEvent::new(7, 1.0, 40.0), &mut sink);
    assert_eq!(policy.segment_of(7), Some(Segment::Window));

    // Any other distinct miss spills key 7 -- the Window's only
    // resident -- into Probation (both Probation and Protected are
    // empty, so it is admitted without contest).
    policy.record(AccessEvent::new(99, 1.0, 5.0), &mut sink);
    assert_eq!(policy.segment_of(7), Some(Segment::Probation));
    assert_eq!(policy.segment_of(99), Some(Segment::Window));

    // A Probation hit that still shows a non-negative delta promotes.
    policy.record(AccessEvent::new(7, 1.0, 40.0), &mut sink);
    assert_eq!(policy.segment_of(7), Some(Segment::Protected));
    policy.check_invariants().unwrap();
}

#[test]
fn adaptive_ca_resizes_window_across_a_regime_shift() {
    let climber = Climber::simple(ClimberConfig {
        sample_size: 32,
        ..ClimberConfig::default()
    });
    let mut policy = AdaptiveCa::new(config(), CountMinSketch64::new(64), climber);
    let mut sink = CountingSink::new();

    // First regime: a small hot set that rewards a large Window.
    for i in 0..2_000u64 {
        policy.record(AccessEvent::new(i % 8, 1.0, 30.0), &mut sink);
    }
    let window_after_hot = policy.window_capacity();

    // Second regime: scanning, unique keys that reward a large Main.
    for i in 0..2_000u64 {
        policy.record(AccessEvent::new(10_000 + i, 1.0, 2.0), &mut sink);
    }
    let window_after_scan = policy.window_capacity();

    assert!(window_after_hot <= config().maximum_size);
    assert!(window_after_scan <= config().maximum_size);
    policy.check_invariants().unwrap();
}

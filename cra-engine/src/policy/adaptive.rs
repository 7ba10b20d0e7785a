//! `AdaptiveCa` -- [`WindowCa`] plus a hill-climber that resizes the
//! Window segment against Main (Probation + Protected) in response to
//! sampled average penalty.

use log::info;

use crate::admission::{FrequencySketch, LaTinyLfu};
use crate::event::AccessEvent;
use crate::stats::{Segment, StatsSink};

use super::climber::{Adaptation, Climber};
use super::window::WindowCa;
use super::PolicyConfig;

pub struct AdaptiveCa<S: FrequencySketch> {
    inner: WindowCa<S>,
    climber: Climber,
    maximum_size: u64,
    percent_main_protected: f64,
    window_capacity: u64,
}

impl<S: FrequencySketch> AdaptiveCa<S> {
    pub fn new(config: PolicyConfig, sketch: S, climber: Climber) -> Self {
        let window_capacity = config.max_window();
        Self {
            inner: WindowCa::new(config, sketch),
            climber,
            maximum_size: config.maximum_size,
            percent_main_protected: config.percent_main_protected,
            window_capacity,
        }
    }

    /// Construct with a caller-built admittor, e.g. [`LaTinyLfu::always_admit`]
    /// for a deterministic test harness instead of the default scored one.
    pub fn with_admittor(config: PolicyConfig, admittor: LaTinyLfu<S>, climber: Climber) -> Self {
        let window_capacity = config.max_window();
        Self {
            inner: WindowCa::with_admittor(config, admittor),
            climber,
            maximum_size: config.maximum_size,
            percent_main_protected: config.percent_main_protected,
            window_capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.inner.contains(key)
    }

    pub fn segment_of(&self, key: u64) -> Option<Segment> {
        self.inner.segment_of(key)
    }

    pub fn window_capacity(&self) -> u64 {
        self.window_capacity
    }

    fn is_full(&self) -> bool {
        self.inner.len() as u64 >= self.maximum_size
    }

    /// Replay one access event, then let the climber react to it and
    /// possibly resize the Window/Main boundary.
    pub fn record(&mut self, event: AccessEvent, sink: &mut dyn StatsSink) {
        if !event.is_representable() {
            return;
        }

        let is_full = self.is_full();
        let real_penalty = match self.inner.segment_of(event.key) {
            Some(segment @ (Segment::Window | Segment::Probation | Segment::Protected)) => {
                self.climber.on_hit(&event, segment, event.hit_penalty, is_full);
                event.hit_penalty
            }
            _ => {
                self.climber.on_miss(&event, event.miss_penalty, is_full);
                event.miss_penalty
            }
        };

        // The climber's last completed sample average is the service
        // latency it is currently steering by; compare it against this
        // event's actual penalty to report how far that estimate has
        // drifted from reality.
        if is_full {
            if let Some(estimated) = self.climber.last_average_penalty() {
                sink.approx_accuracy(real_penalty, estimated);
            }
        }

        self.inner.record(event, sink);
        self.maybe_adapt(sink);
    }

    fn maybe_adapt(&mut self, sink: &mut dyn StatsSink) {
        let main_capacity = self.maximum_size.saturating_sub(self.window_capacity);
        let protected_capacity = ((main_capacity as f64) * self.percent_main_protected).round() as u64;
        let probation_capacity = main_capacity.saturating_sub(protected_capacity);

        let adaptation = self
            .climber
            .adapt(self.window_capacity, probation_capacity, protected_capacity);

        let step = match adaptation {
            Adaptation::Hold => return,
            Adaptation::IncreaseWindow(amount) => amount as i64,
            Adaptation::DecreaseWindow(amount) => -(amount as i64),
        };
        info!(
            "adapting window_capacity={} by step={}",
            self.window_capacity, step
        );
        self.apply_step(step, sink);
        sink.percent_adaption(self.window_capacity as f64 / self.maximum_size.max(1) as f64);
    }

    /// Move `step` units of capacity from Main into Window (or the
    /// reverse, for a negative step), bounded so neither segment goes
    /// negative, then spill whichever segment now overflows its new
    /// capacity.
    fn apply_step(&mut self, step: i64, sink: &mut dyn StatsSink) {
        let main_capacity = self.maximum_size.saturating_sub(self.window_capacity);
        let bounded = if step > 0 {
            step.min(main_capacity as i64)
        } else {
            step.max(-(self.window_capacity as i64))
        };
        if bounded == 0 {
            return;
        }

        self.window_capacity = (self.window_capacity as i64 + bounded).max(0) as u64;
        let main_capacity = self.maximum_size.saturating_sub(self.window_capacity);
        let protected_capacity = ((main_capacity as f64) * self.percent_main_protected).round() as u64;
        let probation_capacity = main_capacity.saturating_sub(protected_capacity);

        self.inner.window_mut().resize(self.window_capacity);
        self.inner.protected_mut().resize(protected_capacity);
        self.inner.probation_mut().resize(probation_capacity);
        self.inner.rebalance(sink);
    }

    #[doc(hidden)]
    pub fn check_invariants(&self) -> Result<(), String> {
        self.inner.check_invariants()?;
        if self.window_capacity > self.maximum_size {
            return Err(format!(
                "window_capacity {} exceeds maximum_size {}",
                self.window_capacity, self.maximum_size
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AlwaysAdmit;
    use crate::policy::climber::ClimberConfig;
    use crate::stats::NullSink;

    fn config() -> PolicyConfig {
        PolicyConfig {
            maximum_size: 20,
            percent_main: 0.5,
            percent_main_protected: 0.5,
            max_lists: 4,
            k: 1.0,
        }
    }

    #[test]
    fn replays_without_exceeding_maximum_size() {
        let climber = Climber::simple(ClimberConfig {
            sample_size: 8,
            ..ClimberConfig::default()
        });
        let mut policy = AdaptiveCa::new(config(), AlwaysAdmit::new(), climber);
        let mut sink = NullSink;
        for key in 0..500u64 {
            let penalty = 1.0 + (key % 7) as f64;
            policy.record(AccessEvent::new(key % 30, 1.0, penalty), &mut sink);
        }
        assert!(policy.len() as u64 <= config().maximum_size);
        policy.check_invariants().unwrap();
    }

    #[test]
    fn window_capacity_stays_within_bounds_under_adaptation() {
        let climber = Climber::adam(ClimberConfig {
            sample_size: 4,
            ..ClimberConfig::default()
        });
        let mut policy = AdaptiveCa::new(config(), AlwaysAdmit::new(), climber);
        let mut sink = NullSink;
        for key in 0..300u64 {
            let penalty = if key % 3 == 0 { 50.0 } else { 1.0 };
            policy.record(AccessEvent::new(key % 15, 1.0, penalty), &mut sink);
            assert!(policy.window_capacity() <= config().maximum_size);
        }
        policy.check_invariants().unwrap();
    }
}

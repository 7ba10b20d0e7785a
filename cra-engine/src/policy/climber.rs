//! Hill-climbing controllers that decide how to resize the Window
//! segment against Protected, driven by sampled average penalty.
//!
//! The source models Simple/Adam/Nadam as three classes sharing an
//! abstract climber contract; we model that as a closed set of variants
//! behind one [`Climber`] type with a single `adjust` hook per variant,
//! per the design note recommending a sum type over a trait object here.

use crate::event::AccessEvent;
use crate::stats::Segment;

/// Samples exceeding this floor freeze further adaptation for the Simple
/// climber (sentinel "disabled" value).
const FROZEN_SAMPLE_SIZE: u64 = u64::MAX;

/// Below this step size or sample size, the Simple climber freezes.
const STEP_FLOOR: f64 = 1e-4;
const SAMPLE_FLOOR: u64 = 2;

#[derive(Debug, Clone, Copy)]
pub enum Adaptation {
    Hold,
    IncreaseWindow(u64),
    DecreaseWindow(u64),
}

/// Accumulates hit/miss penalties into a running sample, only while the
/// cache is at capacity (`is_full`), per the spec's sampling contract.
#[derive(Debug, Clone, Copy, Default)]
struct SampleAccumulator {
    window_hit_penalty_sum: f64,
    main_hit_penalty_sum: f64,
    miss_penalty_sum: f64,
    sample_count: u64,
}

impl SampleAccumulator {
    fn on_hit(&mut self, segment: Segment, hit_penalty: f64, is_full: bool) {
        if !is_full {
            return;
        }
        match segment {
            Segment::Window => self.window_hit_penalty_sum += hit_penalty,
            _ => self.main_hit_penalty_sum += hit_penalty,
        }
        self.sample_count += 1;
    }

    fn on_miss(&mut self, miss_penalty: f64, is_full: bool) {
        if !is_full {
            return;
        }
        self.miss_penalty_sum += miss_penalty;
        self.sample_count += 1;
    }

    fn average(&self) -> f64 {
        let total = self.window_hit_penalty_sum + self.main_hit_penalty_sum + self.miss_penalty_sum;
        total / self.sample_count as f64
    }

    fn reset(&mut self) {
        *self = SampleAccumulator::default();
    }
}

#[derive(Debug, Clone, Copy)]
struct SimpleState {
    direction: f64,
    step_size: f64,
    sample_size: u64,
    initial_step_size: f64,
    initial_sample_size: u64,
    tolerance: f64,
    step_decay_rate: f64,
    sample_decay_rate: f64,
    restart_threshold: f64,
    previous_avg_penalty: Option<f64>,
}

impl SimpleState {
    fn adjust(&mut self, avg_penalty: f64) -> f64 {
        if let Some(prev) = self.previous_avg_penalty {
            if prev != 0.0 && avg_penalty / prev > 1.0 + self.tolerance {
                self.direction = -self.direction;
            }
            let relative_change = if prev != 0.0 {
                ((avg_penalty - prev) / prev).abs()
            } else {
                0.0
            };
            if relative_change > self.restart_threshold {
                self.step_size = self.initial_step_size;
                self.sample_size = self.initial_sample_size;
            } else {
                self.step_size *= self.step_decay_rate;
                self.sample_size = ((self.sample_size as f64) * self.sample_decay_rate) as u64;
                if self.step_size < STEP_FLOOR || self.sample_size < SAMPLE_FLOOR {
                    self.sample_size = FROZEN_SAMPLE_SIZE;
                }
            }
        }
        self.previous_avg_penalty = Some(avg_penalty);
        self.direction * self.step_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MomentVariant {
    Adam,
    Nadam,
}

#[derive(Debug, Clone, Copy)]
struct MomentState {
    variant: MomentVariant,
    step_size: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: f64,
    v: f64,
    t: i32,
    previous_avg_penalty: Option<f64>,
}

impl MomentState {
    fn adjust(&mut self, avg_penalty: f64) -> f64 {
        let g = avg_penalty - self.previous_avg_penalty.unwrap_or(avg_penalty);
        self.t += 1;
        self.m = self.beta1 * self.m + (1.0 - self.beta1) * g;
        self.v = self.beta2 * self.v + (1.0 - self.beta2) * g * g;
        let m_hat = self.m / (1.0 - self.beta1.powi(self.t));
        let v_hat = self.v / (1.0 - self.beta2.powi(self.t));
        let scale = self.step_size / (v_hat.sqrt() + self.epsilon);
        let step = match self.variant {
            MomentVariant::Adam => scale * m_hat,
            MomentVariant::Nadam => {
                scale
                    * (self.beta1 * m_hat
                        + (1.0 - self.beta1) / (1.0 - self.beta1.powi(self.t)) * g)
            }
        };
        self.previous_avg_penalty = Some(avg_penalty);
        step
    }
}

enum Strategy {
    Simple(SimpleState),
    Moment(MomentState),
}

/// Configuration for whichever strategy a run selects; every field is
/// read by exactly one of the three variants.
#[derive(Debug, Clone, Copy)]
pub struct ClimberConfig {
    pub sample_size: u64,
    pub step_size: f64,
    pub tolerance: f64,
    pub step_decay_rate: f64,
    pub sample_decay_rate: f64,
    pub restart_threshold: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for ClimberConfig {
    fn default() -> Self {
        Self {
            sample_size: 64,
            step_size: 1.0,
            tolerance: 0.05,
            step_decay_rate: 0.98,
            sample_decay_rate: 0.98,
            restart_threshold: 0.8,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

pub struct Climber {
    strategy: Strategy,
    sample: SampleAccumulator,
    sample_size: u64,
}

impl Climber {
    pub fn simple(config: ClimberConfig) -> Self {
        Self {
            strategy: Strategy::Simple(SimpleState {
                direction: 1.0,
                step_size: config.step_size,
                sample_size: config.sample_size,
                initial_step_size: config.step_size,
                initial_sample_size: config.sample_size,
                tolerance: config.tolerance,
                step_decay_rate: config.step_decay_rate,
                sample_decay_rate: config.sample_decay_rate,
                restart_threshold: config.restart_threshold,
                previous_avg_penalty: None,
            }),
            sample: SampleAccumulator::default(),
            sample_size: config.sample_size,
        }
    }

    pub fn adam(config: ClimberConfig) -> Self {
        Self::moment(config, MomentVariant::Adam)
    }

    pub fn nadam(config: ClimberConfig) -> Self {
        Self::moment(config, MomentVariant::Nadam)
    }

    fn moment(config: ClimberConfig, variant: MomentVariant) -> Self {
        Self {
            strategy: Strategy::Moment(MomentState {
                variant,
                step_size: config.step_size,
                beta1: config.beta1,
                beta2: config.beta2,
                epsilon: config.epsilon,
                m: 0.0,
                v: 0.0,
                t: 0,
                previous_avg_penalty: None,
            }),
            sample: SampleAccumulator::default(),
            sample_size: config.sample_size,
        }
    }

    pub fn on_hit(&mut self, _event: &AccessEvent, segment: Segment, hit_penalty: f64, is_full: bool) {
        self.sample.on_hit(segment, hit_penalty, is_full);
    }

    pub fn on_miss(&mut self, _event: &AccessEvent, miss_penalty: f64, is_full: bool) {
        self.sample.on_miss(miss_penalty, is_full);
    }

    /// The average penalty observed over the last completed sample
    /// window, i.e. the estimate the climber is currently steering by.
    /// `None` until the first sample period completes.
    pub fn last_average_penalty(&self) -> Option<f64> {
        match &self.strategy {
            Strategy::Simple(s) => s.previous_avg_penalty,
            Strategy::Moment(m) => m.previous_avg_penalty,
        }
    }

    /// `window_size`/`probation_size`/`protected_size` are consulted by
    /// callers (see `AdaptiveCa::apply_adaptation`) rather than by the
    /// climber itself; they are accepted here to match the shared
    /// contract and to let future strategies bound their own step.
    pub fn adapt(&mut self, _window_size: u64, _probation_size: u64, _protected_size: u64) -> Adaptation {
        if self.sample_size == FROZEN_SAMPLE_SIZE || self.sample.sample_count < self.sample_size {
            return Adaptation::Hold;
        }
        let avg_penalty = self.sample.average();
        let step = match &mut self.strategy {
            Strategy::Simple(s) => {
                let step = s.adjust(avg_penalty);
                self.sample_size = s.sample_size;
                step
            }
            Strategy::Moment(m) => m.adjust(avg_penalty),
        };
        self.sample.reset();

        if step > 0.0 {
            Adaptation::IncreaseWindow(step.round() as u64)
        } else if step < 0.0 {
            Adaptation::DecreaseWindow((-step).round() as u64)
        } else {
            Adaptation::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_sample(climber: &mut Climber, penalty: f64, count: u64) {
        for _ in 0..count {
            climber.on_miss(&AccessEvent::new(0, 1.0, penalty), penalty, true);
        }
    }

    #[test]
    fn holds_until_sample_size_reached() {
        let mut climber = Climber::simple(ClimberConfig {
            sample_size: 10,
            ..ClimberConfig::default()
        });
        full_sample(&mut climber, 5.0, 9);
        assert!(matches!(climber.adapt(4, 2, 2), Adaptation::Hold));
    }

    #[test]
    fn simple_climber_produces_a_step_once_full() {
        let mut climber = Climber::simple(ClimberConfig {
            sample_size: 4,
            ..ClimberConfig::default()
        });
        full_sample(&mut climber, 5.0, 4);
        let a = climber.adapt(4, 2, 2);
        assert!(!matches!(a, Adaptation::Hold));
    }

    #[test]
    fn adam_climber_produces_a_step_once_full() {
        let mut climber = Climber::adam(ClimberConfig {
            sample_size: 4,
            ..ClimberConfig::default()
        });
        full_sample(&mut climber, 5.0, 4);
        climber.adapt(4, 2, 2); // bootstrap round, gradient 0
        full_sample(&mut climber, 9.0, 4);
        let a = climber.adapt(4, 2, 2);
        assert!(!matches!(a, Adaptation::Hold));
    }
}

//! Stats sink: the opaque collector a policy reports hit/miss/eviction
//! and latency signals to. The spec leaves the sink's own behavior
//! unspecified beyond the event shapes it receives; [`CountingSink`] is
//! the concrete accumulator the CLI driver reports from.

use serde::Serialize;

/// Segment a hit or miss occurred in, for policies that have more than
/// one (`WindowCa`/`AdaptiveCa`). Single-`CraBlock` callers use `Single`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Single,
    Window,
    Probation,
    Protected,
}

/// Everything a policy may report to a sink during `record`.
pub trait StatsSink {
    fn hit(&mut self, _segment: Segment, _weight: u32, _hit_penalty: f64) {}
    fn miss(&mut self, _weight: u32, _miss_penalty: f64) {}
    fn eviction(&mut self, _key: u64) {}
    fn admitted(&mut self, _key: u64) {}
    fn rejected(&mut self, _key: u64) {}
    /// `(real, estimated)` penalty pair, reported by `AdaptiveCa` for
    /// every event while the cache is full: `real` is the event's own
    /// hit/miss penalty, `estimated` is the climber's last completed
    /// sample average -- the service latency it is currently steering
    /// Window/Main sizing by.
    fn approx_accuracy(&mut self, _real: f64, _estimated: f64) {}
    /// Fraction of the cache currently allotted to the Window segment,
    /// reported after every climber adaptation.
    fn percent_adaption(&mut self, _window_fraction: f64) {}
}

/// Discards every signal. Useful when only the terminal report matters.
#[derive(Default)]
pub struct NullSink;

impl StatsSink for NullSink {}

/// Accumulates totals for the end-of-run [`Report`].
#[derive(Default)]
pub struct CountingSink {
    hits: u64,
    misses: u64,
    weighted_hits: u64,
    weighted_misses: u64,
    hit_penalty_total: f64,
    miss_penalty_total: f64,
    evictions: u64,
    admissions: u64,
    rejections: u64,
}

impl StatsSink for CountingSink {
    fn hit(&mut self, _segment: Segment, weight: u32, hit_penalty: f64) {
        self.hits += 1;
        self.weighted_hits += weight as u64;
        self.hit_penalty_total += hit_penalty;
    }

    fn miss(&mut self, weight: u32, miss_penalty: f64) {
        self.misses += 1;
        self.weighted_misses += weight as u64;
        self.miss_penalty_total += miss_penalty;
    }

    fn eviction(&mut self, _key: u64) {
        self.evictions += 1;
    }

    fn admitted(&mut self, _key: u64) {
        self.admissions += 1;
    }

    fn rejected(&mut self, _key: u64) {
        self.rejections += 1;
    }
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> Report {
        let total = self.hits + self.misses;
        let weighted_total = self.weighted_hits + self.weighted_misses;
        let hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
        let weighted_hit_rate = if weighted_total > 0 {
            self.weighted_hits as f64 / weighted_total as f64
        } else {
            0.0
        };
        let avg_latency = if total > 0 {
            (self.hit_penalty_total + self.miss_penalty_total) / total as f64
        } else {
            0.0
        };
        Report {
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            weighted_hit_rate,
            average_latency: avg_latency,
            evictions: self.evictions,
            admissions: self.admissions,
            rejections: self.rejections,
        }
    }
}

/// Terminal summary the CLI driver prints as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub weighted_hit_rate: f64,
    pub average_latency: f64,
    pub evictions: u64,
    pub admissions: u64,
    pub rejections: u64,
}

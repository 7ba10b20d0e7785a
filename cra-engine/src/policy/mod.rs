//! The two composite policies built on [`crate::block::CraBlock`]:
//! [`window::WindowCa`] (SLRU main with TinyLFU admission) and
//! [`adaptive::AdaptiveCa`] (the same, plus a hill-climbing Window/Main
//! resizer).

pub mod adaptive;
pub mod climber;
pub mod window;

use serde::{Deserialize, Serialize};

/// Construction-time, per-run configuration shared by both policies.
/// Immutable for the lifetime of a run, per the spec's configuration
/// contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub maximum_size: u64,
    pub percent_main: f64,
    pub percent_main_protected: f64,
    pub max_lists: usize,
    pub k: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            maximum_size: 1024,
            percent_main: 0.99,
            percent_main_protected: 0.8,
            max_lists: 4,
            k: 1.0,
        }
    }
}

impl PolicyConfig {
    pub(crate) fn max_window(&self) -> u64 {
        ((self.maximum_size as f64) * (1.0 - self.percent_main)).round() as u64
    }

    pub(crate) fn max_main(&self) -> u64 {
        self.maximum_size - self.max_window()
    }

    pub(crate) fn max_protected(&self) -> u64 {
        ((self.max_main() as f64) * self.percent_main_protected).round() as u64
    }

    pub(crate) fn max_probation(&self) -> u64 {
        self.max_main() - self.max_protected()
    }
}

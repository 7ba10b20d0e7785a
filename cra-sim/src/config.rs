//! Run configuration: a `SimConfig` loaded by `figment` from a JSON or
//! YAML file, an `env`-prefixed override layer, and finally the CLI flags
//! in `Opt`, in that priority order (CLI wins).

use std::path::PathBuf;

use figment::providers::{Env, Format, Json, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::Opt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub maximum_size: u64,
    pub percent_main: f64,
    pub percent_main_protected: f64,
    pub k: f64,
    pub max_lists: usize,

    /// One of `window`, `simple`, `adam`, `nadam`. `window` runs plain
    /// `WindowCa` with no hill-climbing.
    pub strategy: String,
    /// One of `count-min`, `perfect`, `always`.
    pub sketch: String,

    /// Climber initial step/sample size, as a fraction of `maximum_size`.
    pub percent_pivot: f64,
    pub percent_sample: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub tolerance: f64,
    pub step_decay_rate: f64,
    pub sample_decay_rate: f64,
    pub restart_threshold: f64,

    pub trace_path: PathBuf,
    pub trace_format: String,
    pub output_path: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            maximum_size: 1024,
            percent_main: 0.99,
            percent_main_protected: 0.8,
            k: 1.0,
            max_lists: 4,
            strategy: "window".to_string(),
            sketch: "count-min".to_string(),
            percent_pivot: 0.0625,
            percent_sample: 0.0625,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            tolerance: 0.05,
            step_decay_rate: 0.98,
            sample_decay_rate: 0.98,
            restart_threshold: 0.8,
            trace_path: PathBuf::from("trace.txt"),
            trace_format: "latency".to_string(),
            output_path: None,
        }
    }
}

impl SimConfig {
    pub fn policy_config(&self) -> cra_engine::PolicyConfig {
        cra_engine::PolicyConfig {
            maximum_size: self.maximum_size,
            percent_main: self.percent_main,
            percent_main_protected: self.percent_main_protected,
            max_lists: self.max_lists,
            k: self.k,
        }
    }

    pub fn climber_config(&self) -> cra_engine::ClimberConfig {
        cra_engine::ClimberConfig {
            sample_size: ((self.maximum_size as f64) * self.percent_sample).max(1.0) as u64,
            step_size: (self.maximum_size as f64) * self.percent_pivot,
            tolerance: self.tolerance,
            step_decay_rate: self.step_decay_rate,
            sample_decay_rate: self.sample_decay_rate,
            restart_threshold: self.restart_threshold,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
        }
    }
}

/// Load the layered configuration, then apply the CLI flags that were
/// actually passed (they take precedence over file and env layers).
pub fn load(opt: &Opt) -> anyhow::Result<SimConfig> {
    let mut figment = Figment::new().merge(Serialized::defaults(SimConfig::default()));

    if let Some(path) = &opt.config {
        figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
            _ => figment.merge(Json::file(path)),
        };
    }
    figment = figment.merge(Env::prefixed("CRA_"));

    let mut config: SimConfig = figment.extract()?;

    if let Some(trace) = &opt.trace {
        config.trace_path = trace.clone();
    }
    if let Some(format) = &opt.format {
        config.trace_format = format.clone();
    }
    if let Some(output) = &opt.output {
        config.output_path = Some(output.clone());
    }
    if let Some(strategy) = &opt.strategy {
        config.strategy = strategy.clone();
    }
    if let Some(maximum_size) = opt.maximum_size {
        config.maximum_size = maximum_size;
    }

    Ok(config)
}

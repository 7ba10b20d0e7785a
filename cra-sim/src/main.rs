//! CLI driver for `cra-engine`: loads a run configuration, replays a
//! trace file against the configured policy, and prints a JSON report.

mod cli;
mod config;
mod generate;

use std::io::{BufReader, Write};

use anyhow::Context;
use structopt::StructOpt;

use cra_engine::admission::{AlwaysAdmit, CountMinSketch64, FrequencySketch, LaTinyLfu, PerfectFrequency};
use cra_engine::policy::climber::Climber;
use cra_engine::policy::window::WindowCa;
use cra_engine::trace::TraceFormat;
use cra_engine::{AdaptiveCa, CountingSink, EngineError, Report};

use cli::{Command, Opt};
use config::SimConfig;

fn main() -> anyhow::Result<()> {
    #[cfg(feature = "init_env_logger")]
    env_logger::init();

    if let Err(err) = try_main() {
        log::error!("{err:#}");
        return Err(err);
    }
    Ok(())
}

fn try_main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    if let Some(Command::Generate {
        keys,
        length,
        exponent,
        output,
        format,
        seed,
    }) = &opt.cmd
    {
        return generate::run(*keys, *length, *exponent, output, format, *seed);
    }

    let config = config::load(&opt)?;
    let report = run_simulation(&config)?;
    write_report(&config, &report)
}

fn build_sketch(name: &str, capacity: u64) -> anyhow::Result<Box<dyn FrequencySketch>> {
    match name {
        "count-min" => Ok(Box::new(CountMinSketch64::new(capacity))),
        "perfect" => Ok(Box::new(PerfectFrequency::new())),
        "always" => Ok(Box::new(AlwaysAdmit::new())),
        other => Err(EngineError::UnknownSketch(other.to_string()).into()),
    }
}

/// `sketch="always"` is meant to yield the literal "admit-always"
/// harness the end-to-end scenarios call for, not just a sketch whose
/// frequency happens to be constant -- route it through
/// [`LaTinyLfu::always_admit`] rather than the scored constructor.
fn build_admittor(
    name: &str,
    sketch: Box<dyn FrequencySketch>,
) -> LaTinyLfu<Box<dyn FrequencySketch>> {
    if name == "always" {
        LaTinyLfu::always_admit(sketch)
    } else {
        LaTinyLfu::new(sketch)
    }
}

fn run_simulation(config: &SimConfig) -> anyhow::Result<Report> {
    let format: TraceFormat = config
        .trace_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let file = std::fs::File::open(&config.trace_path)
        .with_context(|| format!("opening trace file {}", config.trace_path.display()))?;
    let trace = cra_engine::trace::open(format, BufReader::new(file));

    let mut sink = CountingSink::new();
    let sketch = build_sketch(&config.sketch, config.maximum_size)?;

    let admittor = build_admittor(&config.sketch, sketch);

    match config.strategy.as_str() {
        "window" => {
            let mut policy = WindowCa::with_admittor(config.policy_config(), admittor);
            replay(trace, |event| policy.record(event, &mut sink))?;
        }
        "simple" => {
            let climber = Climber::simple(config.climber_config());
            let mut policy = AdaptiveCa::with_admittor(config.policy_config(), admittor, climber);
            replay(trace, |event| policy.record(event, &mut sink))?;
        }
        "adam" => {
            let climber = Climber::adam(config.climber_config());
            let mut policy = AdaptiveCa::with_admittor(config.policy_config(), admittor, climber);
            replay(trace, |event| policy.record(event, &mut sink))?;
        }
        "nadam" => {
            let climber = Climber::nadam(config.climber_config());
            let mut policy = AdaptiveCa::with_admittor(config.policy_config(), admittor, climber);
            replay(trace, |event| policy.record(event, &mut sink))?;
        }
        other => return Err(EngineError::UnknownStrategy(other.to_string()).into()),
    }

    Ok(sink.report())
}

fn replay(
    trace: Box<dyn Iterator<Item = Result<cra_engine::AccessEvent, cra_engine::trace::TraceError>>>,
    mut record: impl FnMut(cra_engine::AccessEvent),
) -> anyhow::Result<()> {
    for (line_no, event) in trace.enumerate() {
        let event = event.with_context(|| format!("reading trace line {}", line_no + 1))?;
        record(event);
    }
    Ok(())
}

/// Envelope written to disk/stdout: the engine's own [`Report`] plus the
/// wall-clock time the run finished, so a batch of reports can be sorted
/// or diffed by when they were produced.
#[derive(serde::Serialize)]
struct Envelope<'a> {
    generated_at: chrono::DateTime<chrono::Utc>,
    strategy: &'a str,
    trace_path: &'a std::path::Path,
    report: &'a Report,
}

fn write_report(config: &SimConfig, report: &Report) -> anyhow::Result<()> {
    let envelope = Envelope {
        generated_at: chrono::Utc::now(),
        strategy: &config.strategy,
        trace_path: &config.trace_path,
        report,
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    match &config.output_path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report to {}", path.display()))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{json}")?;
        }
    }
    Ok(())
}

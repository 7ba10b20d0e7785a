use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "cra-sim",
    about = "Trace-driven cost/latency-aware cache replacement simulator"
)]
pub struct Opt {
    /// Run configuration file (JSON or YAML). Overridden by CLI flags.
    #[structopt(long, parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Trace file to replay. Overrides `trace_path` in the config file.
    #[structopt(long, parse(from_os_str))]
    pub trace: Option<PathBuf>,

    /// Trace grammar: `dns`, `latency`, or `address-penalties`.
    #[structopt(long)]
    pub format: Option<String>,

    /// Where to write the JSON report. Defaults to stdout.
    #[structopt(long, parse(from_os_str))]
    pub output: Option<PathBuf>,

    /// Policy: `window`, `simple`, `adam`, or `nadam`.
    #[structopt(long)]
    pub strategy: Option<String>,

    #[structopt(long)]
    pub maximum_size: Option<u64>,

    #[structopt(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Generate a synthetic Zipfian trace instead of replaying one.
    Generate {
        /// Number of distinct keys in the working set.
        #[structopt(long, default_value = "10000")]
        keys: usize,

        /// Number of access events to emit.
        #[structopt(long, default_value = "1000000")]
        length: u64,

        /// Zipf exponent (YCSB's default is 0.99).
        #[structopt(long, default_value = "0.99")]
        exponent: f64,

        #[structopt(long, parse(from_os_str))]
        output: PathBuf,

        /// Grammar to emit: only `latency` is supported by the generator.
        #[structopt(long, default_value = "latency")]
        format: String,

        #[structopt(long, default_value = "0")]
        seed: u64,
    },
}

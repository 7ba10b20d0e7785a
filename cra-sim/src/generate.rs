//! Synthetic Zipfian trace generator, for exercising a policy without a
//! captured trace file. Keys are drawn from a Zipf distribution over a
//! fixed working set, the same way the storage engine's own YCSB
//! benchmark driver samples its key space.

use std::io::Write;
use std::path::Path;

use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use zipf::ZipfDistribution;

// Plausible cache/backing-store latency ratio; not meant to model any
// particular device.
const HIT_PENALTY_RANGE: (f64, f64) = (0.5, 2.0);
const MISS_PENALTY_RANGE: (f64, f64) = (5.0, 50.0);

pub fn run(
    keys: usize,
    length: u64,
    exponent: f64,
    output: &Path,
    format: &str,
    seed: u64,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        format == "latency",
        "the generator only emits the `latency` trace grammar, got `{format}`"
    );
    let dist = ZipfDistribution::new(keys, exponent)
        .map_err(|()| anyhow::anyhow!("invalid zipf parameters: keys={keys} exponent={exponent}"))?;
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);

    let file = std::fs::File::create(output)?;
    let mut writer = std::io::BufWriter::new(file);
    for _ in 0..length {
        let key = dist.sample(&mut rng);
        let hit_penalty = rng.gen_range(HIT_PENALTY_RANGE.0..HIT_PENALTY_RANGE.1);
        let miss_penalty = rng.gen_range(MISS_PENALTY_RANGE.0..MISS_PENALTY_RANGE.1);
        writeln!(writer, "{key} {hit_penalty:.4} {miss_penalty:.4}")?;
    }
    writer.flush()?;
    Ok(())
}

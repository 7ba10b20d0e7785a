use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cra_engine::{AccessEvent, CraBlock};

fn fill_block(capacity: u64, rng: &mut StdRng) -> CraBlock {
    let mut block = CraBlock::new(capacity, 8, 1.0);
    for key in 0..capacity * 2 {
        let hit_penalty: f64 = rng.gen_range(1.0..5.0);
        let miss_penalty: f64 = rng.gen_range(1.0..50.0);
        block.add_entry(AccessEvent::new(key, hit_penalty, miss_penalty));
    }
    block
}

fn block_insert_with_eviction(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xC8A);
    c.bench_function("cra_block_insert_with_eviction", |b| {
        b.iter(|| {
            let mut block = fill_block(black_box(1024), &mut rng);
            black_box(block.len());
        });
    });
}

fn block_on_access_hit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xC8B);
    let mut block = fill_block(1024, &mut rng);
    let resident: Vec<u64> = block.resident_keys().collect();
    c.bench_function("cra_block_on_access_hit", |b| {
        b.iter(|| {
            for &key in resident.iter().take(64) {
                black_box(block.on_access(key, 2.0));
            }
        });
    });
}

fn block_victim_selection(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xC8C);
    let mut block = fill_block(4096, &mut rng);
    c.bench_function("cra_block_victim_key", |b| {
        b.iter(|| {
            black_box(block.victim_key());
        });
    });
}

criterion_group!(
    benches,
    block_insert_with_eviction,
    block_on_access_hit,
    block_victim_selection
);
criterion_main!(benches);

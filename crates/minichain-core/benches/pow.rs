use criterion::{criterion_group, criterion_main, Criterion};
use minichain_core::{mine, Block, BlockPayload, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::AtomicBool;

fn bench_pow(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let records = (0..10)
        .map(|i| Transaction::new(format!("alice-{i}"), "bob", rng.gen_range(1..10)).to_record())
        .collect::<Vec<_>>();
    let block = Block::new(1, BlockPayload::Transactions(records), "0".repeat(64));

    c.bench_function("mine_sequential_difficulty_3", |b| {
        b.iter(|| {
            let mut candidate = block.clone();
            candidate.mine(3);
            candidate
        })
    });

    c.bench_function("search_nonce_parallel_difficulty_3", |b| {
        let cancel = AtomicBool::new(false);
        b.iter(|| mine::search_nonce(&block, 3, &cancel))
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);

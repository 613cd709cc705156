use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tiersolve::block;
use tiersolve::bparray::BpArray;

fn bparray_set_get(c: &mut Criterion) {
    c.bench_function("bparray set/get 100k entries, 64 distinct values", |b| {
        b.iter(|| {
            let mut arr = BpArray::create(100_000);
            for i in 0..100_000u64 {
                arr.set(i, black_box((i % 64) as i64)).unwrap();
            }
            let mut sum = 0i64;
            for i in 0..100_000u64 {
                sum += arr.get(i);
            }
            black_box(sum)
        });
    });
}

fn block_compress_round_trip(c: &mut Criterion) {
    let raw: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    c.bench_function("block compress 1MB at 8 bits/entry", |b| {
        b.iter(|| {
            let (payload, lookup) = block::compress_blocks(black_box(&raw), block::DEFAULT_BLOCK_ENTRIES, 8);
            black_box((payload, lookup))
        });
    });
}

criterion_group!(benches, bparray_set_get, block_compress_round_trip);
criterion_main!(benches);

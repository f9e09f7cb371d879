//! Map lookup/insert benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nf_core::map::Map;

fn bench_set_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");

    for &capacity in &[1024usize, 16384, 131072] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("get_hit", capacity), &capacity, |b, &capacity| {
            let mut map: Map<u32, 4> = Map::new(capacity).unwrap();
            for i in 0..(capacity as u32 / 2) {
                map.set(i, i as u64);
            }
            let probe = capacity as u32 / 4;
            b.iter(|| map.get(black_box(&probe)));
        });

        group.bench_with_input(
            BenchmarkId::new("set_then_remove", capacity),
            &capacity,
            |b, &capacity| {
                let mut map: Map<u32, 4> = Map::new(capacity).unwrap();
                for i in 0..(capacity as u32 / 2) {
                    map.set(i, i as u64);
                }
                let key = capacity as u32; // guaranteed absent
                b.iter(|| {
                    map.set(black_box(key), 1);
                    map.remove(black_box(&key));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_set_get);
criterion_main!(benches);

//! Benchmarks pour l'agrégation des surfaces

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use overlap::{aggregate, par_aggregate, OverlapRecord};

/// Fragments synthétiques : `keys` clés distinctes, surfaces pseudo-aléatoires
fn synthetic_records(count: usize, keys: usize) -> Vec<OverlapRecord> {
    (0..count)
        .map(|i| {
            let area = ((i * 7919) % 250_000) as f64 + 0.37;
            OverlapRecord::new(format!("SP{:04}", i % keys), area)
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for &count in &[10_000usize, 100_000, 1_000_000] {
        let records = synthetic_records(count, 600);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sequential", count), &records, |b, records| {
            b.iter(|| {
                let totals = aggregate(black_box(records.iter().cloned()));
                black_box(totals)
            })
        });

        group.bench_with_input(BenchmarkId::new("parallel", count), &records, |b, records| {
            b.iter(|| {
                let totals = par_aggregate(black_box(records));
                black_box(totals)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);

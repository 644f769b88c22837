#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]
//! Benchmark for windowed statistics and state payload building.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cycle_twin::prelude::*;
use cycle_twin::twin::window_stats;

fn cycle_values(size: usize) -> Vec<f64> {
    (0..size).map(|i| 2900.0 + ((i * 37) % 200) as f64 - 100.0).collect()
}

fn window_stats_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_stats");

    for size in [20, 100, 500] {
        let values = cycle_values(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| window_stats(black_box(&values)).unwrap());
        });
    }

    group.finish();
}

fn build_state_benchmark(c: &mut Criterion) {
    let mut history = HistoryBuffer::new();
    for (i, v) in cycle_values(500).into_iter().enumerate() {
        let start = i as i64 * 3000;
        history.append(CycleRecord::new(Endpoint::Top, start, start + 1400, start + v as i64, 0));
    }
    let last = *history.latest().unwrap();
    let publisher = StatePublisher::new(2900, 100, 20);

    c.bench_function("build_state", |b| {
        b.iter(|| {
            let envelope = publisher.build_state(black_box(&history), 500, Some(&last));
            serde_json::to_string(&envelope).unwrap()
        });
    });
}

criterion_group!(benches, window_stats_benchmark, build_state_benchmark);
criterion_main!(benches);

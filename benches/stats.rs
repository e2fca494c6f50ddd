use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use ndarray::Array2;

use beamsig::{moment_stats, quantile_stats, DEFAULT_BEAM_QUANTILE};

fn gaussian_image(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(i, j)| {
        let x = -1.0 + 2.0 * i as f64 / (n - 1) as f64;
        let y = -1.0 + 2.0 * j as f64 / (n - 1) as f64;
        (-(x * x + y * y) / (2.0 * 0.2 * 0.2)).exp()
    })
}

fn bench_quantile_stats(c: &mut Criterion) {
    let extents = ((-1.0, 1.0), (-1.0, 1.0));
    for n in [64usize, 256] {
        let im = gaussian_image(n);
        let mut group = c.benchmark_group("stats/quantile");
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("{n}x{n}"), |b| {
            b.iter(|| quantile_stats(black_box(&im), extents, DEFAULT_BEAM_QUANTILE));
        });
        group.finish();
    }
}

fn bench_moment_stats(c: &mut Criterion) {
    let extents = ((-1.0, 1.0), (-1.0, 1.0));
    let im = gaussian_image(256);
    let mut group = c.benchmark_group("stats/moment");
    group.throughput(Throughput::Elements((256 * 256) as u64));
    group.bench_function("256x256", |b| {
        b.iter(|| moment_stats(black_box(&im), extents, (-2.0f64).exp()));
    });
    group.finish();
}

criterion_group!(benches, bench_quantile_stats, bench_moment_stats);
criterion_main!(benches);

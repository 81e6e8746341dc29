/*
Measures the outlier filter that runs at the start of every processing cycle,
over a clean window, a window with one spike and the widest window the
sample buffer accepts.
*/

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use light_control::component_a::filter::filter;
use light_control::utils::config::FILTER_SIZE;

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_filter");

    let clean = vec![300; FILTER_SIZE];
    let spiked = vec![300, 302, 298, 301, 299, 2000, 300, 297, 303, 300];
    let wide: Vec<i32> = (0..1024).map(|i| 1_000 + (i % 17) - 8).collect();

    for (label, window) in [("clean", &clean), ("spike", &spiked), ("wide", &wide)] {
        group.bench_with_input(BenchmarkId::new(label, window.len()), window, |b, w| {
            b.iter(|| filter(black_box(w)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter);
criterion_main!(benches);

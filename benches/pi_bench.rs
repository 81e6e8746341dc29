/*
Cost of one PI step (error, proportional, clamped integral, output clamp),
the arithmetic every automatic cycle runs before signalling Actuation.
*/

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use light_control::component_b::controller::{PiConfig, PiController};

fn pi_update_bench(c: &mut Criterion) {
    let mut controller = PiController::new(PiConfig::new(0.5, 0.1));
    let mut duty = 20u8;

    c.bench_function("pi_update", |b| {
        b.iter(|| {
            duty = controller.update(black_box(60), black_box(50), duty);
        })
    });

    // Saturated loop: output pinned at 100, integral pinned at its limit.
    let mut saturated = PiController::new(PiConfig::new(0.5, 0.1));
    c.bench_function("pi_update_saturated", |b| {
        b.iter(|| saturated.update(black_box(100), black_box(0), black_box(100)))
    });
}

criterion_group!(benches, pi_update_bench);
criterion_main!(benches);

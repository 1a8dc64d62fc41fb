//! Random Generator and Memory Resource Benchmarks
//!
//! Measures the per-value cost of each distribution strategy and the cost of
//! allocating through each allocation mode.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pandrs_testkit::environment::{AllocatorModeEnvironment, Environment};
use pandrs_testkit::memory::AllocationMode;
use pandrs_testkit::temporal::TimestampNanos;
use pandrs_testkit::{BaseFixture, UniformRandomGenerator};
use rand::rngs::StdRng;

fn bench_generators(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    let mut ints = UniformRandomGenerator::<i64, StdRng>::seeded(-1_000, 1_000, 42).unwrap();
    group.bench_function("i64", |b| b.iter(|| black_box(ints.generate())));

    let mut floats = UniformRandomGenerator::<f64, StdRng>::seeded(0.0, 1.0, 42).unwrap();
    group.bench_function("f64", |b| b.iter(|| black_box(floats.generate())));

    let mut bools = UniformRandomGenerator::<bool, StdRng>::seeded(false, true, 42).unwrap();
    group.bench_function("bool", |b| b.iter(|| black_box(bools.generate())));

    let mut stamps = UniformRandomGenerator::<TimestampNanos, StdRng>::seeded(
        TimestampNanos::new(0),
        TimestampNanos::new(i64::MAX),
        42,
    )
    .unwrap();
    group.bench_function("timestamp_ns", |b| b.iter(|| black_box(stamps.generate())));

    group.finish();
}

fn bench_generate_n(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_n");

    for size in [100, 10_000] {
        let mut g = UniformRandomGenerator::<i32, StdRng>::seeded(0, 100, 7).unwrap();
        group.bench_with_input(BenchmarkId::new("i32", size), &size, |b, &n| {
            b.iter(|| black_box(g.generate_n(n)))
        });
    }

    group.finish();
}

fn bench_allocation_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_deallocate");

    for mode in AllocationMode::ALL {
        let mut env = AllocatorModeEnvironment::new(mode.as_str());
        env.set_up().unwrap();
        let fixture = BaseFixture::new(&env).unwrap();

        group.bench_with_input(BenchmarkId::new(mode.as_str(), 4096), &4096, |b, &bytes| {
            b.iter(|| {
                let block = fixture.mr().allocate(bytes).unwrap();
                fixture.mr().deallocate(black_box(block)).unwrap();
            })
        });

        env.tear_down().unwrap();
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_generators,
    bench_generate_n,
    bench_allocation_modes
);
criterion_main!(benches);

//! Mean-value reduction through the dispatcher against the direct fold.
//!
//! Run with: cargo bench --bench meanval

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use numkern::api::meanval;
use numkern::ops::cpu::ParallelReduce;
use numkern::ops::{Reduce, ReduceArgs};
use numkern::reductions::fold;
use numkern::reductions::functors::MeanValue;
use numkern::{DispatchConfig, Evaluator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

fn bench_meanval(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut group = c.benchmark_group("meanval");

    for len in [16usize, 1 << 10, 1 << 16, 1 << 20] {
        let data: Vec<f64> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("dispatch", len), &data, |b, data| {
            b.iter(|| meanval(black_box(data)))
        });
        group.bench_with_input(BenchmarkId::new("fold", len), &data, |b, data| {
            b.iter(|| fold(&MeanValue::<f64>::new(), black_box(data).iter().copied()))
        });

        let parallel = ParallelReduce::new(&DispatchConfig::default());
        group.bench_with_input(BenchmarkId::new("parallel", len), &data, |b, data| {
            b.iter(|| {
                let args = ReduceArgs {
                    functor: MeanValue::<f64>::new(),
                    data: black_box(data.as_slice()),
                };
                Evaluator::<Reduce<MeanValue<f64>>>::execute(&parallel, args)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_meanval);
criterion_main!(benches);

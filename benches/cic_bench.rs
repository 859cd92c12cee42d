use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sdr_pipeline::dsp::cic::{CicDecimator, DEFAULT_STAGES};

fn bench_cic_decimate_r10(c: &mut Criterion) {
    c.bench_function("cic_decimate_r10_1e6_samples", |b| {
        b.iter(|| {
            let mut cic = CicDecimator::new(10, DEFAULT_STAGES);
            let mut last = (0i8, 0i8);
            for n in 0..1_000_000i32 {
                if let Some(out) = cic.process_one(black_box(n % 127), black_box(-n % 127)) {
                    last = out;
                }
            }
            black_box(last)
        })
    });
}

fn bench_cic_decimate_r4_fewer_stages(c: &mut Criterion) {
    c.bench_function("cic_decimate_r4_one_stage_1e6_samples", |b| {
        b.iter(|| {
            let mut cic = CicDecimator::new(4, 1);
            let mut last = (0i8, 0i8);
            for n in 0..1_000_000i32 {
                if let Some(out) = cic.process_one(black_box(n % 100), black_box(n % 50)) {
                    last = out;
                }
            }
            black_box(last)
        })
    });
}

criterion_group!(benches, bench_cic_decimate_r10, bench_cic_decimate_r4_fewer_stages);
criterion_main!(benches);

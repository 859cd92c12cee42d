use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num_complex::Complex64;
use sdr_pipeline::dsp::psd::{execute_welch_psd, PsdConfig, ScaleUnit};
use sdr_pipeline::dsp::window::WindowType;

fn make_signal(n: usize) -> Vec<Complex64> {
    (0..n)
        .map(|k| {
            let t = k as f64 / 1_920_000.0;
            Complex64::new((2.0 * std::f64::consts::PI * 50_000.0 * t).cos(), 0.0)
        })
        .collect()
}

fn bench_welch_psd_one_second(c: &mut Criterion) {
    let signal = make_signal(1_920_000);
    let cfg = PsdConfig::new(
        WindowType::Hamming,
        1_920_000.0,
        1_000.0,
        0.5,
        ScaleUnit::DBm,
        1_000_000.0,
        100_000_000.0,
    );

    c.bench_function("welch_psd_1s_at_1.92msps", |b| {
        b.iter(|| black_box(execute_welch_psd(black_box(&signal), black_box(&cfg))))
    });
}

fn bench_welch_psd_narrow_rbw(c: &mut Criterion) {
    let signal = make_signal(1_920_000);
    let cfg = PsdConfig::new(
        WindowType::Blackman,
        1_920_000.0,
        500.0,
        0.75,
        ScaleUnit::DBm,
        1_000_000.0,
        100_000_000.0,
    );

    c.bench_function("welch_psd_1s_narrow_rbw", |b| {
        b.iter(|| black_box(execute_welch_psd(black_box(&signal), black_box(&cfg))))
    });
}

criterion_group!(benches, bench_welch_psd_one_second, bench_welch_psd_narrow_rbw);
criterion_main!(benches);

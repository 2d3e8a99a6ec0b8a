use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spline2gauss::fit::{decompose_knots, FitConfig};
use spline2gauss::spline::{KnotSpline, PairSpline};
use spline2gauss::twobody::{evaluate_flat, GaussianMixture, IsotropicTwobodyEnergy};

const KNOTS: [f64; 8] = [
    278.35, 3.3541, -0.58015, 0.16469, -0.11965, 0.05272, -0.023451, 0.0026243,
];
const CUTOFF: f64 = 11.0;
const PARAMS: [f64; 8] = [40.0, 2.0, -1.2, 0.4, 0.3, 0.1, -0.05, 0.02];

/// Single-pair benchmarks
fn bench_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("single");
    let r_squared = 2.5f64.powi(2);

    let mixture = GaussianMixture::from_flat(&PARAMS);
    group.bench_function("GaussianMixture_4", |b| {
        b.iter(|| mixture.isotropic_twobody_energy(black_box(r_squared)))
    });

    let spline = KnotSpline::new(CUTOFF, &KNOTS).unwrap();
    group.bench_function("KnotSpline", |b| {
        b.iter(|| spline.value(black_box(2.5)))
    });

    group.finish();
}

/// Model evaluation on a full grid, as done once per residual evaluation
fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid");
    for n_samples in [100, 1000, 10000] {
        let radii: Vec<f64> = (0..n_samples)
            .map(|i| CUTOFF * i as f64 / (n_samples - 1) as f64)
            .collect();
        group.bench_with_input(
            BenchmarkId::new("evaluate_flat", n_samples),
            &radii,
            |b, radii| b.iter(|| evaluate_flat(black_box(&PARAMS), radii)),
        );
        let mixture = GaussianMixture::from_flat(&PARAMS);
        group.bench_with_input(
            BenchmarkId::new("GaussianMixture", n_samples),
            &radii,
            |b, radii| b.iter(|| mixture.evaluate(radii)),
        );
    }
    group.finish();
}

/// Complete staged decomposition
fn bench_decompose(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose");
    group.sample_size(10);
    for n_terms in [1, 2, 3] {
        let config = FitConfig::default().with_terms(n_terms);
        group.bench_with_input(BenchmarkId::new("staged", n_terms), &config, |b, config| {
            b.iter(|| decompose_knots(&KNOTS, CUTOFF, config))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single, bench_grid, bench_decompose);
criterion_main!(benches);

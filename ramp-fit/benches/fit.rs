use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use ramp_fit::{
    fit_image, fit_pixel, simulate_image, simulate_ramp, FitConfig, FixedValues, RampSimulation,
};

fn read_pattern() -> Vec<Vec<u32>> {
    vec![
        vec![1],
        vec![2, 3],
        vec![4, 5, 6, 7],
        vec![8, 9, 10, 11],
        vec![12, 13, 14, 15],
        vec![16, 17, 18, 19],
        vec![20, 21],
        vec![22],
    ]
}

fn bench_fit_pixel(c: &mut Criterion) {
    let pattern = read_pattern();
    let with_jump = FixedValues::from_reads(&pattern, 3.04, true).unwrap();
    let without_jump = FixedValues::from_reads(&pattern, 3.04, false).unwrap();
    let config = FitConfig::default();

    let mut rng = StdRng::seed_from_u64(42);
    let clean = simulate_ramp(&pattern, 3.04, &RampSimulation::new(20.0, 5.0), &mut rng).unwrap();
    let hit = simulate_ramp(
        &pattern,
        3.04,
        &RampSimulation::new(20.0, 5.0).with_jump(12, 1000.0),
        &mut rng,
    )
    .unwrap();

    let mut group = c.benchmark_group("fit_pixel");
    group.bench_function("no_jump_detection", |b| {
        b.iter(|| fit_pixel(black_box(5.0), black_box(&clean), &without_jump, &config))
    });
    group.bench_function("clean_ramp", |b| {
        b.iter(|| fit_pixel(black_box(5.0), black_box(&clean), &with_jump, &config))
    });
    group.bench_function("one_jump", |b| {
        b.iter(|| fit_pixel(black_box(5.0), black_box(&hit), &with_jump, &config))
    });
    group.finish();
}

fn bench_fit_image(c: &mut Criterion) {
    let pattern = read_pattern();
    let fixed = FixedValues::from_reads(&pattern, 3.04, true).unwrap();
    let config = FitConfig::default();

    let sims: Vec<RampSimulation> = (0..65_536)
        .map(|p| {
            let sim = RampSimulation::new(20.0, 5.0);
            if p % 20 == 0 {
                sim.with_jump(12, 1000.0)
            } else {
                sim
            }
        })
        .collect();
    let image = simulate_image(&pattern, 3.04, &sims, 7).unwrap();
    let read_noise = Array1::from_elem(sims.len(), 5.0);

    c.bench_function("fit_image_65536_pixels", |b| {
        b.iter(|| {
            fit_image(
                black_box(image.view()),
                black_box(read_noise.view()),
                None,
                &fixed,
                &config,
            )
        })
    });
}

criterion_group!(benches, bench_fit_pixel, bench_fit_image);
criterion_main!(benches);

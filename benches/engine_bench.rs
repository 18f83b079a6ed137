//! Criterion benchmarks for the optimization hot paths.
//!
//! Uses the simulated devices so everything measures pure software
//! overhead: genome translation, crossover, and whole generations of the
//! closed loop.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use wavefront_ga::engine::{EngineConfig, OptimizationEngine, StopConditions};
use wavefront_ga::hardware::{BoardShape, SimRig};
use wavefront_ga::population::{crossover_genomes, random_genome};
use wavefront_ga::scaler::BinScaler;

// ===========================================================================
// Genome-to-image translation
// ===========================================================================

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaler_translate");

    for &bin in &[8usize, 16, 32] {
        let mut scaler = BinScaler::new(512, 512, 1);
        scaler.set_bin_size(bin, bin);
        let (mx, my) = scaler.max_bins();
        scaler.set_used_bins(mx, my);

        let mut rng = StdRng::seed_from_u64(42);
        let genome = random_genome(&mut rng, scaler.genome_length());
        let mut image = vec![0u8; scaler.image_len()];

        group.bench_with_input(BenchmarkId::from_parameter(bin), &bin, |b, _| {
            b.iter(|| {
                scaler.translate_image(black_box(&genome), black_box(&mut image));
            })
        });
    }
    group.finish();
}

// ===========================================================================
// Crossover
// ===========================================================================

fn bench_crossover(c: &mut Criterion) {
    let mut group = c.benchmark_group("crossover");

    for &len in &[256usize, 1024, 4096] {
        let mut rng = StdRng::seed_from_u64(42);
        let parent_a = random_genome(&mut rng, len);
        let parent_b = random_genome(&mut rng, len);

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let outcome =
                    crossover_genomes(&mut rng, black_box(&parent_a), black_box(&parent_b), true, 0.97);
                black_box(outcome)
            })
        });
    }
    group.finish();
}

// ===========================================================================
// Whole runs against the simulated rig
// ===========================================================================

fn bench_sim_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("sim_run");
    group.sample_size(10);

    let shape = BoardShape {
        width: 64,
        height: 64,
        depth: 1,
    };

    for (name, config) in [
        (
            "simple_ga",
            EngineConfig::simple_ga().with_population_size(10),
        ),
        ("micro_ga", EngineConfig::micro_ga()),
    ] {
        let config = config
            .with_bin_size(8, 8)
            .with_target_radius(10.0)
            .with_seed(42)
            .with_artifacts(false)
            .with_stop(
                StopConditions::default()
                    .with_fitness_floor(f64::MAX)
                    .with_max_generations(3),
            );
        group.bench_with_input(BenchmarkId::new(name, 3), &config, |b, config| {
            b.iter(|| {
                let rig = SimRig::new(1, shape, 64, 64);
                let mut engine =
                    OptimizationEngine::new(rig.modulator, rig.camera, config.clone());
                black_box(engine.run())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_translate, bench_crossover, bench_sim_run);
criterion_main!(benches);

//! Benchmarks for archive insertion and parent selection.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grid_elites::{
    schema::GridConfig,
    search::{
        Archive, Behavior, GridArchive, LocalCompetition, ParentSelection, Solution,
        relative_improvement_scores,
    },
};

const SOLUTION_DIM: usize = 10;

fn random_batch(n: usize, rng: &mut StdRng) -> (Vec<Solution>, Vec<f64>, Vec<Behavior>) {
    let solutions = (0..n)
        .map(|_| (0..SOLUTION_DIM).map(|_| rng.r#gen::<f64>()).collect())
        .collect();
    let objectives = (0..n).map(|_| rng.gen_range(0.0..100.0)).collect();
    let behaviors = (0..n).map(|_| [rng.r#gen(), rng.r#gen()]).collect();
    (solutions, objectives, behaviors)
}

fn filled_archive(bins: usize, rng: &mut StdRng) -> GridArchive {
    let mut archive = GridArchive::new(SOLUTION_DIM, GridConfig::square(bins));
    let (solutions, objectives, behaviors) = random_batch(bins * bins * 8, rng);
    archive
        .add(&solutions, &objectives, &behaviors)
        .expect("bench batch");
    archive
}

fn bench_archive_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive_add");
    let mut rng = StdRng::seed_from_u64(42);

    for batch in [32, 256, 2048] {
        let (solutions, objectives, behaviors) = random_batch(batch, &mut rng);
        let mut archive = GridArchive::new(SOLUTION_DIM, GridConfig::square(25));

        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, _| {
            b.iter(|| {
                archive
                    .add(
                        black_box(&solutions),
                        black_box(&objectives),
                        black_box(&behaviors),
                    )
                    .ok()
            });
        });
    }

    group.finish();
}

fn bench_local_competition(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_competition");
    let mut rng = StdRng::seed_from_u64(7);

    for bins in [25, 50, 100] {
        let archive = filled_archive(bins, &mut rng);
        let selection = LocalCompetition::default();

        group.bench_with_input(
            BenchmarkId::new("scores", format!("{}x{}", bins, bins)),
            &bins,
            |b, _| {
                b.iter(|| relative_improvement_scores(black_box(&archive)));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("select_32", format!("{}x{}", bins, bins)),
            &bins,
            |b, _| {
                b.iter(|| selection.select(black_box(&archive), 32, &mut rng).ok());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_archive_add, bench_local_competition);
criterion_main!(benches);

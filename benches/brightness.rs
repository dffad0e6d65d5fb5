//! Benchmarks for brightness evaluation.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use seismic_locate::{
    compute::{BrightnessEvaluator, SearchSpace, SyntheticSurvey},
    schema::{
        AxisRange, EvaluatorConfig, GridSpec, Point, Position, TimeWindow, VelocityConfig,
        VelocityModelConfig, iasp91_crust,
    },
};

fn lattice(points: usize) -> Vec<Point> {
    let grid = GridSpec {
        x: AxisRange::new(0.0, 2000.0, 100.0),
        y: AxisRange::new(0.0, 2000.0, 100.0),
        z: AxisRange::new(0.0, 3000.0, 250.0),
        time_step: 0.01,
    };
    let space = SearchSpace::new(&grid, TimeWindow::new(0.0, 0.2)).unwrap();
    (0..points.min(space.total_points()))
        .map(|i| space.point_at(i))
        .collect()
}

fn bench_receiver_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_batch");
    let points = lattice(4096);

    for side in [4, 8, 16] {
        let survey = SyntheticSurvey::grid_array(
            side,
            side,
            2000.0 / side as f64,
            Position::new(1000.0, 1000.0, 1500.0),
        )
        .generate();
        let evaluator = BrightnessEvaluator::new(
            &survey,
            &VelocityConfig::default(),
            &EvaluatorConfig::default(),
        )
        .unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_receivers", side * side)),
            &side,
            |b, _| {
                b.iter(|| {
                    evaluator.clear_cache();
                    evaluator.evaluate_batch(black_box(&points))
                });
            },
        );
    }

    group.finish();
}

fn bench_velocity_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("velocity_model");
    let points = lattice(1024);
    let survey = SyntheticSurvey::grid_array(8, 8, 250.0, Position::new(1000.0, 1000.0, 1500.0))
        .generate();

    let models = [
        ("simple", VelocityModelConfig::default()),
        (
            "layered",
            VelocityModelConfig::Layered {
                name: "iasp91".into(),
                layers: iasp91_crust(),
            },
        ),
    ];

    for (name, model) in models {
        let velocity = VelocityConfig {
            model,
            fixed_speed: None,
        };
        let evaluator =
            BrightnessEvaluator::new(&survey, &velocity, &EvaluatorConfig::default()).unwrap();

        group.bench_function(name, |b| {
            b.iter(|| {
                evaluator.clear_cache();
                evaluator.evaluate_batch(black_box(&points))
            });
        });
    }

    group.finish();
}

fn bench_cached(c: &mut Criterion) {
    let points = lattice(4096);
    let survey = SyntheticSurvey::grid_array(8, 8, 250.0, Position::new(1000.0, 1000.0, 1500.0))
        .generate();
    let evaluator = BrightnessEvaluator::new(
        &survey,
        &VelocityConfig::default(),
        &EvaluatorConfig::default(),
    )
    .unwrap();
    evaluator.evaluate_batch(&points);

    c.bench_function("evaluate_batch_cached", |b| {
        b.iter(|| evaluator.evaluate_batch(black_box(&points)));
    });
}

criterion_group!(benches, bench_receiver_count, bench_velocity_model, bench_cached);
criterion_main!(benches);

//! Quick search performance test

use seismic_locate::{
    compute::{SyntheticSurvey, run_genetic_search, run_grid_search},
    schema::{GeneticConfig, GridResolution, LocateConfig, Position, TimeWindow},
};
use std::time::Instant;

fn main() {
    println!("=== Grid vs Genetic Search ===\n");

    let synthetic = SyntheticSurvey {
        noise: 0.05,
        seed: 7,
        samples: 2000,
        ..SyntheticSurvey::grid_array(6, 6, 400.0, Position::new(1100.0, 900.0, 1800.0))
    };
    let survey = synthetic.generate();
    let truth = synthetic.source;
    let window = TimeWindow::new(0.0, 0.1);

    // Test different grid resolutions
    for resolution in [GridResolution::High, GridResolution::Medium, GridResolution::Low] {
        let config = LocateConfig {
            resolution,
            depth_range: (0.0, 3000.0),
            ..Default::default()
        };
        let Ok(grid) = config.grid_for(&survey) else {
            continue;
        };

        println!("Resolution: {:?}", resolution);
        for genetic in [false, true] {
            let start = Instant::now();
            let outcome = if genetic {
                run_genetic_search(&survey, window, &grid, &config, false, |_| true)
            } else {
                run_grid_search(&survey, window, &grid, &config, |_| true)
            };
            let elapsed = start.elapsed();

            let Ok(outcome) = outcome else {
                println!("  search failed");
                continue;
            };
            let stats = outcome.stats();
            let Some(best) = outcome.best() else {
                continue;
            };
            let error = best.point.position().distance(&truth);

            println!("  {}:", stats.algorithm);
            println!("    Evaluations:  {}", stats.evaluations);
            println!("    Cache hits:   {}", stats.cache_hits);
            println!("    Elapsed:      {:.2}s", elapsed.as_secs_f64());
            println!(
                "    Evals/sec:    {:.1}",
                stats.evaluations as f64 / elapsed.as_secs_f64()
            );
            println!("    Brightness:   {:.4}", best.brightness);
            println!("    Error:        {:.1} m", error);
        }
        println!();
    }

    println!("=== Population Scaling (Medium grid) ===\n");

    // Test different population sizes
    for population_size in [50, 100, 200, 400] {
        let config = LocateConfig {
            depth_range: (0.0, 3000.0),
            genetic: GeneticConfig {
                population_size,
                generations: 10,
                random_seed: Some(42),
                ..Default::default()
            },
            ..Default::default()
        };
        let Ok(grid) = config.grid_for(&survey) else {
            continue;
        };

        let start = Instant::now();
        let Ok(outcome) = run_genetic_search(&survey, window, &grid, &config, false, |_| true)
        else {
            continue;
        };
        let elapsed = start.elapsed();
        let stats = outcome.stats();

        println!(
            "Population {}: {} evals in {:.2}s ({:.1} evals/sec), stop {:?}",
            population_size,
            stats.evaluations,
            elapsed.as_secs_f64(),
            stats.evaluations as f64 / elapsed.as_secs_f64(),
            stats.stop_reason
        );
    }
}

//! Seismic Locate CLI - Locate a source from a JSON survey.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use seismic_locate::{
    compute::{SyntheticSurvey, resolve_window, run_genetic_search, run_grid_search},
    schema::{LocateConfig, SearchOutcome, SearchPhase, SearchProgress, Survey},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example();
        return;
    }

    let positional: Vec<&String> = args.iter().skip(1).filter(|a| !a.starts_with("--")).collect();
    let genetic = args.iter().any(|a| a == "--genetic");
    let heatmap = args.iter().any(|a| a == "--heatmap");

    let Some(survey_path) = positional.first().map(PathBuf::from) else {
        eprintln!("Usage: {} <survey.json> [config.json] [--genetic] [--heatmap]", args[0]);
        eprintln!();
        eprintln!("Locate a seismic source by brightness stacking.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  survey.json  Receiver table and traces");
        eprintln!("  config.json  Location settings (default: built-in defaults)");
        eprintln!("  --genetic    Use the genetic search instead of the full grid");
        eprintln!("  --heatmap    Project a heatmap after a genetic search");
        eprintln!();
        eprintln!("Example input is generated with --example flag.");
        std::process::exit(1);
    };

    let survey: Survey = read_json(&survey_path, "survey");
    let config: LocateConfig = match positional.get(1) {
        Some(path) => read_json(&PathBuf::from(path), "config"),
        None => LocateConfig::default(),
    };

    let window = resolve_window(&survey, &config).unwrap_or_else(|e| {
        eprintln!("Error estimating time window: {}", e);
        std::process::exit(1);
    });
    let grid = config.grid_for(&survey).unwrap_or_else(|e| {
        eprintln!("Error building grid: {}", e);
        std::process::exit(1);
    });

    println!("Seismic Source Location");
    println!("=======================");
    println!("Receivers: {}", survey.receivers.len());
    println!("Sample interval: {} s", survey.sample_interval);
    println!(
        "Grid: x [{}, {}], y [{}, {}], z [{}, {}]",
        grid.x.min, grid.x.max, grid.y.min, grid.y.max, grid.z.min, grid.z.max
    );
    println!("Time window: [{:.4}, {:.4}] s", window.start, window.end);
    println!("Algorithm: {}", if genetic { "genetic" } else { "grid" });
    println!();

    let mut last_percent = None;
    let report = |event: &SearchProgress| {
        if matches!(event.phase, SearchPhase::Evaluating | SearchPhase::Generations)
            && last_percent.is_none_or(|p| event.percent >= p + 10)
        {
            last_percent = Some(event.percent);
            match event.best {
                Some(best) => println!(
                    "  {:>3}% ({} {}): best {:.4}",
                    event.percent, event.unit, event.index, best.brightness
                ),
                None => println!("  {:>3}% ({} {})", event.percent, event.unit, event.index),
            }
        }
        true
    };

    let outcome = if genetic {
        run_genetic_search(&survey, window, &grid, &config, heatmap, report)
    } else {
        run_grid_search(&survey, window, &grid, &config, report)
    }
    .unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    print_outcome(&outcome);
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf, what: &str) -> T {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {} file: {}", what, e);
        std::process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing {}: {}", what, e);
        std::process::exit(1);
    })
}

fn print_outcome(outcome: &SearchOutcome) {
    println!();
    if outcome.is_cancelled() {
        println!("Search cancelled.");
    }
    match outcome.best() {
        Some(best) => {
            println!("Best point:");
            println!(
                "  x={:.2} m, y={:.2} m, z={:.2} m, t={:.4} s",
                best.point.x, best.point.y, best.point.z, best.point.t
            );
            println!("  Brightness: {:.6}", best.brightness);
        }
        None => println!("No point evaluated."),
    }

    let stats = outcome.stats();
    println!();
    println!(
        "Evaluations: {} ({} cached), generations: {}, stop: {:?}",
        stats.evaluations, stats.cache_hits, stats.generations, stats.stop_reason
    );
    if stats.travel_time_fallbacks > 0 {
        println!("Travel-time fallbacks: {}", stats.travel_time_fallbacks);
    }
    println!("Time: {:.2}s", stats.elapsed_seconds);

    if let SearchOutcome::Completed(result) = outcome
        && let Some(heatmap) = &result.heatmap
    {
        let (rows, cols) = heatmap.shape();
        println!(
            "Heatmap: {}x{} at z={:.2} m, t={:.4} s",
            cols, rows, heatmap.z, heatmap.t
        );
    }
}

fn print_example() {
    let survey = SyntheticSurvey::square(1000.0, 1000.0).generate();
    let config = LocateConfig::default();

    println!("Example survey (survey.json):");
    match serde_json::to_string(&survey) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing survey: {}", e),
    }
    println!();
    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

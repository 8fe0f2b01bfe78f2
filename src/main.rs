//! Grid Elites CLI - Run a benchmark search from JSON configuration.

use std::path::PathBuf;
use std::time::Instant;

use grid_elites::{
    schema::{SearchConfig, SearchMode},
    search::{
        Archive, BenchmarkEvaluator, GridArchive, OptimizationLoop, SearchPhase, SearchProgress,
    },
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [mode] [samples]", args[0]);
        eprintln!();
        eprintln!("Run a grid-archive search on the Rastrigin benchmark.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to search configuration file");
        eprintln!("  mode         exploration | prediction | elite-search (default: elite-search)");
        eprintln!("  samples      Random samples used to seed the archive (default: 1024)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let mode = match args.get(2).map(String::as_str) {
        None | Some("elite-search") => SearchMode::EliteSearch,
        Some("exploration") => SearchMode::Exploration,
        Some("prediction") => SearchMode::Prediction {
            verification: false,
        },
        Some(other) => {
            eprintln!("Unknown mode: {}", other);
            std::process::exit(1);
        }
    };
    let samples: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(1024);

    let config = SearchConfig::from_json_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    let grid = config.grid_for(mode);
    println!("Grid Elites Search");
    println!("==================");
    println!("Mode: {:?}", mode);
    println!("Solution dimension: {}", config.solution.dimension());
    println!("Grid: {}x{}", grid.dims.0, grid.dims.1);
    println!("Batch size: {}", config.emitter.batch_size);
    println!("Evaluation budget: {}", config.evaluation_budget(mode));
    println!();

    let mut evaluator = BenchmarkEvaluator::rastrigin(&config, mode);
    let mut engine = OptimizationLoop::new(config.clone());
    let mut archive = GridArchive::new(config.solution.dimension(), grid);

    engine
        .initialize_archive(&mut archive, samples, &mut evaluator)
        .unwrap_or_else(|e| {
            eprintln!("Error seeding archive: {}", e);
            std::process::exit(1);
        });

    let initial = archive.stats();
    println!("Initial archive:");
    println!("  Elites: {}/{}", initial.num_elites, initial.cells);
    println!("  QD score: {:.3}", initial.qd_score);
    println!();

    println!("Running search...");
    let start = Instant::now();
    let result = engine
        .run_with_callback(mode, archive, None, &mut evaluator, |progress| {
            print_progress(progress, start);
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });

    let stats = result.stats;
    println!();
    println!("Final archive:");
    println!("  Elites: {}/{}", stats.archive.num_elites, stats.archive.cells);
    println!("  Coverage: {:.1}%", stats.archive.coverage * 100.0);
    println!("  QD score: {:.3}", stats.archive.qd_score);
    if let Some(best) = stats.archive.obj_max {
        println!("  Best objective: {:.4}", best);
    }
    println!(
        "  Improvement: {:+.3}",
        stats.archive.qd_score - initial.qd_score
    );
    println!(
        "Time: {:.2}s ({} evaluations, {} reinjection passes)",
        stats.elapsed_seconds,
        stats.evaluations + stats.reinjection_evaluations,
        stats.reinjection_passes
    );

    let mut rows = result.archive.as_table(true);
    rows.sort_by(|a, b| b.objective.total_cmp(&a.objective));
    rows.truncate(5);

    match serde_json::to_string_pretty(&serde_json::json!({
        "stats": stats,
        "top_elites": rows,
    })) {
        Ok(json) => {
            println!();
            println!("{}", json);
        }
        Err(e) => eprintln!("Error serializing results: {}", e),
    }
}

fn print_progress(progress: &SearchProgress, start: Instant) {
    let stats = progress.archive.stats();
    match progress.phase {
        SearchPhase::Iterating => {
            // Print progress every 10%
            let every = (progress.total_iterations / 10).max(1);
            if progress.iteration % every == 0 {
                println!(
                    "  Iteration {}/{}: elites={}, qd={:.3}, sigma={:.4}, {:.1}s",
                    progress.iteration,
                    progress.total_iterations,
                    stats.num_elites,
                    stats.qd_score,
                    progress.sigma_emitter,
                    start.elapsed().as_secs_f32()
                );
            }
        }
        SearchPhase::Reinjection => {
            println!(
                "  Reinjection at {} remaining: qd={:.3}",
                progress.remaining_evals, stats.qd_score
            );
        }
        SearchPhase::Seeding | SearchPhase::Refinement => {
            println!("  {:?}: qd={:.3}", progress.phase, stats.qd_score);
        }
        SearchPhase::Finished => {}
    }
}

fn print_example_config() {
    let config = SearchConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

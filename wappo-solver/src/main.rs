//! Wappo Level Solver
//!
//! Loads a level from JSON, runs the chosen search strategy, and prints the
//! winning path (or the failure diagnosis) along with search statistics.
//!
//! Usage:
//!   solver <level.json> [--algorithm bfs|dfs|backtracking|astar]
//!          [--max-depth N] [--log-interval SECS]

use std::env;
use std::fs;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use wappo_core::{display_score, Level};
use wappo_solver::{Algorithm, SolveError, SolveOptions, Solver};

fn usage() -> ! {
    eprintln!(
        "Usage: solver <level.json> [--algorithm bfs|dfs|backtracking|astar] \
         [--max-depth N] [--log-interval SECS]"
    );
    process::exit(2);
}

fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut level_path: Option<String> = None;
    let mut algorithm = Algorithm::Bfs;
    let mut max_depth: Option<u32> = None;
    let mut log_interval_secs = 5u64;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--algorithm" => {
                let value = iter.next().unwrap_or_else(|| usage());
                algorithm = value.parse().unwrap_or_else(|err: String| {
                    eprintln!("{err}");
                    process::exit(2);
                });
            }
            "--max-depth" => {
                let value = iter.next().unwrap_or_else(|| usage());
                max_depth = Some(value.parse().unwrap_or_else(|_| {
                    eprintln!("--max-depth expects a number, got {value:?}");
                    process::exit(2);
                }));
            }
            "--log-interval" => {
                let value = iter.next().unwrap_or_else(|| usage());
                log_interval_secs = value.parse().unwrap_or_else(|_| {
                    eprintln!("--log-interval expects a number, got {value:?}");
                    process::exit(2);
                });
            }
            _ if arg.starts_with("--") => usage(),
            _ => level_path = Some(arg.clone()),
        }
    }
    let Some(level_path) = level_path else { usage() };

    // Load and validate the level
    let text = fs::read_to_string(&level_path).unwrap_or_else(|err| {
        eprintln!("Cannot read {level_path}: {err}");
        process::exit(1);
    });
    let level: Level = serde_json::from_str(&text).unwrap_or_else(|err| {
        eprintln!("Cannot parse {level_path}: {err}");
        process::exit(1);
    });
    if let Err(err) = level.validate() {
        eprintln!("Rejected {level_path}: {err}");
        process::exit(1);
    }

    println!("Wappo Solver");
    println!("============");
    println!("Level: {} (basescore {})", level.id, level.basescore);
    println!("Algorithm: {algorithm}");
    println!();

    // Set up SIGINT handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\nInterrupt received, stopping search...");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let mut solver = Solver::new();
    solver.log_interval_secs = Some(log_interval_secs);
    let options = SolveOptions {
        algorithm,
        initial_snapshot: None,
        max_depth,
    };

    let start = Instant::now();
    let outcome = solver.solve(&level, &options, &running);
    let elapsed = start.elapsed();

    println!();
    println!("============");
    match outcome {
        Ok(solution) if solution.solved => {
            let path = solution.path.expect("solved results carry a path");
            let rendered: Vec<&str> = path.iter().map(|direction| direction.code()).collect();
            let score = display_score(2 * level.basescore as i32 - path.len() as i32);
            println!("Solved in {} moves: {}", path.len(), rendered.join(" "));
            println!("Score: {score}");
        }
        Ok(solution) => {
            println!("No solution found.");
            if let Some(path) = solution.path {
                println!("Deepest losing line abandoned at move {}.", path.len());
            }
        }
        Err(SolveError::Interrupted) => {
            println!("Search interrupted before completion.");
        }
        Err(err) => {
            eprintln!("Solve failed: {err}");
            process::exit(1);
        }
    }
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!();
    solver.stats.print_summary();
}

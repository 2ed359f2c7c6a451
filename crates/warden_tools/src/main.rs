//! Warden - Development Tools
//!
//! # Usage
//!
//! ```bash
//! # Validate one scenario or a directory of scenarios
//! cargo run -p warden_tools -- validate data/scenarios
//!
//! # Plan with the depth-first planner
//! cargo run -p warden_tools -- plan data/scenarios/rifle_push.ron --method dfs --budget 20000
//!
//! # Plan with MCTS and print JSON
//! cargo run -p warden_tools -- plan data/scenarios/rifle_push.ron --method mcts --seed 7 --json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use warden_tools::{
    planning::{run_plan, PlanMethod},
    scenario::Scenario,
    validate::validate_path,
};

#[derive(Parser)]
#[command(name = "warden-tools")]
#[command(about = "Development tools for the Warden decision core")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate scenario files
    Validate {
        /// Scenario file or directory
        #[arg(default_value = "data/scenarios")]
        path: PathBuf,
    },

    /// Search for a build order
    Plan {
        /// Scenario file
        scenario: PathBuf,

        /// Planner to use
        #[arg(short, long, value_enum, default_value = "dfs")]
        method: PlanMethod,

        /// DFS iterations or MCTS steps (defaults to the scenario config)
        #[arg(short, long)]
        budget: Option<u32>,

        /// MCTS seed (defaults to the scenario config)
        #[arg(long)]
        seed: Option<u64>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; RUST_LOG wins over the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let code = match cli.command {
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Plan {
            scenario,
            method,
            budget,
            seed,
            json,
        } => cmd_plan(&scenario, method, budget, seed, json),
    };
    std::process::exit(code);
}

fn cmd_validate(path: &std::path::Path) -> i32 {
    tracing::info!("Validating scenarios in: {}", path.display());
    let results = match validate_path(path) {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("Validation failed: {e}");
            return 1;
        }
    };

    let mut failures = 0;
    for (file, result) in &results {
        match result {
            Ok(report) => tracing::info!(
                file = %file.display(),
                name = %report.name,
                unit_types = report.unit_types,
                goal_entries = report.goal_entries,
                "Scenario valid"
            ),
            Err(e) => {
                failures += 1;
                tracing::error!(file = %file.display(), "Scenario invalid: {e}");
            }
        }
    }

    if failures > 0 {
        tracing::error!("{failures} of {} scenarios failed validation", results.len());
        1
    } else {
        tracing::info!("Validation passed ({} scenarios)", results.len());
        0
    }
}

fn cmd_plan(path: &std::path::Path, method: PlanMethod, budget: Option<u32>, seed: Option<u64>, json: bool) -> i32 {
    let scenario = match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!("Failed to load scenario: {e}");
            return 1;
        }
    };

    tracing::info!(scenario = %scenario.name, ?method, "Planning");
    let report = match run_plan(&scenario, method, budget, seed) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Planning failed: {e}");
            return 1;
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                tracing::error!("Failed to serialize plan: {e}");
                return 1;
            }
        }
    } else {
        print!("{}", report.to_text());
    }

    // 2: no plan reaches the goal
    i32::from(!report.goal_reached) * 2
}

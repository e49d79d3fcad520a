//! corridor: runs an evacuation scenario end to end through the service.
//!
//! Loads a scenario file (the bundled `scenario.json` by default), submits
//! it, follows its progress, and prints the primary run's metrics and the
//! first page of its trajectory.
//!
//! ```text
//! cargo run -p corridor -- --runs 4 --seed 7
//! RUST_LOG=debug cargo run -p corridor -- --scenario my.json --keep out.sqlite
//! ```

use std::io::Cursor;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ev_config::{load_scenario_path, load_scenario_reader};
use ev_engine::KinematicFactory;
use ev_output::PageQuery;
use ev_service::SimulationService;
use ev_sim::{ProgressEvent, RunStage};

const BUNDLED_SCENARIO: &str = include_str!("../scenario.json");

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "corridor", version, about = "Run an evacuation scenario and print its results")]
struct Cli {
    /// Scenario JSON; the bundled two-exit corridor if omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Override `number_of_simulations`.
    #[arg(long)]
    runs: Option<u32>,
    /// Override `base_seed`.
    #[arg(long)]
    seed: Option<u64>,
    /// Copy the primary trajectory (SQLite) to this path.
    #[arg(long)]
    keep: Option<PathBuf>,
    /// Frames shown from the start of the trajectory.
    #[arg(long, default_value_t = 3)]
    frames: u64,
    /// Print the full results as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    // 1. Load the scenario.
    let mut scenario = match &cli.scenario {
        Some(path) => load_scenario_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => load_scenario_reader(Cursor::new(BUNDLED_SCENARIO))?,
    };
    if let Some(runs) = cli.runs {
        scenario.parameters.number_of_simulations = runs;
    }
    if let Some(seed) = cli.seed {
        scenario.parameters.base_seed = seed;
    }
    println!("=== corridor: evacuation run ===");
    println!(
        "Exits: {}  |  Sources: {}  |  Runs: {}  |  Base seed: {}",
        scenario.config.exits.len(),
        scenario.config.distributions.len(),
        scenario.parameters.number_of_simulations,
        scenario.parameters.base_seed,
    );
    println!();

    // 2. Submit.
    let service = SimulationService::new(KinematicFactory)?;
    let run_id = service.submit(&scenario)?;
    info!(%run_id, runs = scenario.parameters.number_of_simulations, "scenario submitted");

    // 3. Follow progress.
    let t0 = Instant::now();
    let mut subscription = service.subscribe(run_id);
    let mut last_stage = None;
    while let Some(event) = subscription.poll() {
        match event {
            ProgressEvent::Connected(s) | ProgressEvent::Update(s) => {
                if last_stage != Some(s.stage) || s.stage == RunStage::Simulation {
                    println!("  [{:>5.1}%] {:<12} {}", s.progress, s.stage, s.message);
                }
                last_stage = Some(s.stage);
            }
            ProgressEvent::Heartbeat => thread::sleep(POLL_INTERVAL),
            ProgressEvent::Closing => {}
            ProgressEvent::NotFound => bail!("simulation {run_id} disappeared"),
        }
    }
    let elapsed = t0.elapsed();
    info!(%run_id, elapsed_ms = elapsed.as_millis() as u64, "request finished");
    println!("Finished in {:.3} s", elapsed.as_secs_f64());
    println!();

    // 4. Results.
    let results = service.results(run_id)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{:<8} {:<20} {:>10} {:>10} {:>10}", "Seed", "Status", "Time [s]", "Evacuated", "Remaining");
        println!("{}", "-".repeat(62));
        for m in &results.runs {
            println!(
                "{:<8} {:<20} {:>10.2} {:>10} {:>10}",
                m.seed, m.status, m.evacuation_time, m.agents_evacuated, m.agents_remaining,
            );
        }
        for f in &results.failures {
            println!("{:<8} {:<20} {}", f.seed, "failed", f.message);
        }
        println!();
        println!("{}", results.summary);
    }

    // 5. First frames of the primary trajectory.
    let info = service.trajectory_info(run_id)?;
    println!(
        "Trajectory (seed {}): {} frames, {} agents, {} rows",
        results.primary_seed, info.total_frames, info.agent_count, info.total_rows
    );
    let page = service.trajectory_page(run_id, &PageQuery { chunk_size: cli.frames.max(1), ..PageQuery::default() })?;
    for frame in &page.frames {
        println!("  frame {:>4} t={:>7.2}s  {} agents", frame.frame, frame.time, frame.agents.len());
    }
    if let Some(next) = page.next_start_frame {
        println!("  ... next page starts at frame {next}");
    }

    // 6. Optionally keep the trajectory file.
    if let Some(dest) = &cli.keep {
        let path = service.take_artifact(run_id, results.primary_seed)?;
        std::fs::copy(&path, dest).with_context(|| format!("copying trajectory to {}", dest.display()))?;
        std::fs::remove_file(&path)?;
        info!(dest = %dest.display(), "trajectory kept");
        println!("Trajectory written to {}", dest.display());
    }

    Ok(())
}

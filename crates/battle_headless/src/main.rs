//! Headless ground battle runner.
//!
//! Runs battles without graphics. Reports go to stdout as JSON, logs to
//! stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run a single battle
//! cargo run -p battle_headless -- run --scenario skirmish --seed 7
//!
//! # Run batch balance test
//! cargo run -p battle_headless -- batch --scenario skirmish --count 1000 --output results/
//!
//! # Verify determinism
//! cargo run -p battle_headless -- verify --scenario scenarios/skirmish.ron --runs 5
//!
//! # Watch a battle as ASCII frames
//! cargo run -p battle_headless -- watch --scenario duel --every 20
//! ```
//!
//! Log filtering honors `RUST_LOG`; `--verbose` lowers the default level
//! to debug.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use battle_headless::{
    render::{render_ascii, AsciiConfig},
    report::BattleReport,
    runner::{run_batch, run_scenario, verify_determinism, BatchConfig, DEFAULT_MAX_TICKS},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "battle_headless")]
#[command(about = "Headless ground battle runner for AI testing and CI")]
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
    /// Run a single battle and print its report
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Battle seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,

        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of seeded battles for balance testing
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Number of battles to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel battles (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per battle
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Tick limit per run
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,
    },

    /// Print ASCII frames of a battle as it runs
    Watch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Battle seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Ticks between frames
        #[arg(long, default_value = "10")]
        every: u64,

        /// Tick limit
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for reports)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            max_ticks,
            output,
        } => cmd_run(&scenario, seed, max_ticks, output),
        Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        } => {
            let config = BatchConfig::new(count)
                .with_seed(seed)
                .with_parallel(parallel)
                .with_max_ticks(max_ticks);
            cmd_batch(&scenario, &config, output);
        }
        Commands::Verify {
            scenario,
            seed,
            runs,
            max_ticks,
        } => cmd_verify(&scenario, seed, runs, max_ticks),
        Commands::Watch {
            scenario,
            seed,
            every,
            max_ticks,
            no_color,
        } => cmd_watch(&scenario, seed, every, max_ticks, no_color),
    }
}

fn load_scenario(name: &str) -> Scenario {
    match Scenario::named(name) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario '{}': {}", name, e);
            eprintln!("Built-in scenarios: {}", Scenario::builtin_names().join(", "));
            std::process::exit(1);
        }
    }
}

/// Run a single battle
fn cmd_run(name: &str, seed: u64, max_ticks: u64, output: Option<PathBuf>) {
    let scenario = load_scenario(name);
    tracing::info!(scenario = %scenario.name, seed, max_ticks, "Running battle");

    let report = match run_scenario(&scenario, seed, max_ticks) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("FATAL: Failed to encode report: {}", e);
            std::process::exit(1);
        }
    };
    println!("{json}");

    if let Some(path) = output {
        if let Err(e) = std::fs::write(&path, &json) {
            tracing::error!(error = %e, path = %path.display(), "Failed to save report");
            std::process::exit(1);
        }
    }
}

/// Run batch of battles for balance testing
fn cmd_batch(name: &str, config: &BatchConfig, output: PathBuf) {
    let scenario = load_scenario(name);
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        scenario = %scenario.name,
        count = config.count,
        parallel = config.parallel,
        seed = config.seed_start,
        max_ticks = config.max_ticks,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    let results = match run_batch(&scenario, config) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {}", e);
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Battles played: {}", results.battles.len());
    if !results.errors.is_empty() {
        eprintln!("Battles FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Throughput: {:.1} battles/sec",
        results.battles.len() as f64 / results.duration_seconds.max(0.001)
    );
    eprintln!(
        "\nAttacker wins: {} ({:.1}%), defender wins: {}, unresolved: {}",
        summary.attacker_wins,
        summary.attacker_win_rate() * 100.0,
        summary.defender_wins,
        summary.unresolved
    );
    eprintln!("Conquests: {}", summary.conquests);
    eprintln!("Average length: {:.0} ticks", summary.avg_ticks);
    if summary.violations > 0 {
        eprintln!("Invariant violations: {}", summary.violations);
    }

    for error in results.errors.iter().take(10) {
        eprintln!("  seed {}: {}", error.seed, error.message);
    }
    if results.errors.len() > 10 {
        eprintln!("  ... and {} more failures", results.errors.len() - 10);
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(name: &str, seed: u64, runs: u32, max_ticks: u64) {
    let scenario = load_scenario(name);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    match verify_determinism(&scenario, seed, runs, max_ticks) {
        Ok(check) if check.deterministic => {
            eprintln!("PASS: All {} runs produced identical results", runs);
        }
        Ok(check) => {
            eprintln!("FAIL: Non-determinism detected! Hashes: {:?}", check.hashes);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print ASCII frames while a battle runs
fn cmd_watch(name: &str, seed: u64, every: u64, max_ticks: u64, no_color: bool) {
    let scenario = load_scenario(name);
    let mut sim = match scenario.build(Some(seed)) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    };
    let config = AsciiConfig {
        use_color: !no_color,
        ..AsciiConfig::default()
    };
    let every = every.max(1);

    println!("{}", render_ascii(sim.battle(), &config));
    while sim.current_tick() < max_ticks && !sim.battle().is_concluded() {
        sim.tick();
        if sim.current_tick() % every == 0 || sim.battle().is_concluded() {
            println!("{}", render_ascii(sim.battle(), &config));
        }
    }

    let report = BattleReport::capture(&scenario.name, &sim);
    match report.outcome {
        Some(outcome) => eprintln!(
            "{} won on tick {} ({} survivors{})",
            outcome.winner,
            outcome.tick,
            outcome.survivors,
            if outcome.conquered { ", planet conquered" } else { "" }
        ),
        None => eprintln!("No winner after {} ticks", report.ticks),
    }
}

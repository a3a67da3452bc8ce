//! Headless ground battle runner for AI testing and CI verification.
//!
//! Loads a RON [`scenario`], runs it to completion with the built-in
//! skirmish AI on both sides and reports the result as JSON. This enables:
//!
//! - **Balance testing**: Seeded batches run in parallel ([`runner::run_batch`])
//! - **CI verification**: Repeated runs of a seed must end identically
//! - **Quick review**: An ASCII view of the battlefield ([`render`])
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish and print the report
//! cargo run -p battle_headless -- run --scenario skirmish --seed 7
//!
//! # Run a scenario file 200 times
//! cargo run -p battle_headless -- batch --scenario scenarios/skirmish.ron --count 200
//!
//! # Verify determinism
//! cargo run -p battle_headless -- verify --scenario duel --runs 5
//! ```

pub mod render;
pub mod report;
pub mod runner;
pub mod scenario;

pub use report::{BatchResults, BatchSummary, BattleReport};
pub use runner::{run_batch, run_scenario, verify_determinism, BatchConfig, RunError};
pub use scenario::{Scenario, ScenarioError};

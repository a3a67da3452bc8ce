//! Running scenarios: single battles, seeded batches and determinism checks.
//!
//! Batches run battles in parallel on a rayon pool. Each battle is fully
//! independent, so the reports only depend on the scenario and the seed.

use std::time::Instant;

use battle_core::simulation::BattleSimulation;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::report::{BatchError, BatchResults, BatchSummary, BattleReport};
use crate::scenario::{Scenario, ScenarioError};

/// Default tick limit: ten minutes of battle time.
pub const DEFAULT_MAX_TICKS: u64 = 6000;

/// Error type for runs.
#[derive(Error, Debug)]
pub enum RunError {
    /// The scenario could not be built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The batch worker pool could not be created.
    #[error("Failed to build batch pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of battles to run.
    pub count: u32,
    /// First seed; battle `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Maximum parallel battles (0 = rayon default).
    pub parallel: usize,
    /// Tick limit per battle.
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 100,
            seed_start: 0,
            parallel: 0,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

impl BatchConfig {
    /// Create a config for `count` battles.
    #[must_use]
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Set the number of parallel battles.
    #[must_use]
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Run a simulation until it concludes or `max_ticks` pass.
pub fn run_simulation(name: &str, sim: &mut BattleSimulation, max_ticks: u64) -> BattleReport {
    match sim.run_to_completion(max_ticks) {
        Some(outcome) => debug!(
            scenario = name,
            winner = %outcome.winner,
            tick = outcome.tick,
            "Battle concluded"
        ),
        None => warn!(scenario = name, max_ticks, "Battle hit the tick limit"),
    }
    BattleReport::capture(name, sim)
}

/// Build and run one battle.
pub fn run_scenario(scenario: &Scenario, seed: u64, max_ticks: u64) -> Result<BattleReport, RunError> {
    let mut sim = scenario.build(Some(seed))?;
    Ok(run_simulation(&scenario.name, &mut sim, max_ticks))
}

/// Run a batch of seeded battles in parallel.
///
/// Failed battles are collected in [`BatchResults::errors`] rather than
/// aborting the batch.
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> Result<BatchResults, RunError> {
    let start = Instant::now();
    info!(
        scenario = %scenario.name,
        count = config.count,
        seed_start = config.seed_start,
        "Starting batch"
    );

    let mut builder = rayon::ThreadPoolBuilder::new();
    if config.parallel > 0 {
        builder = builder.num_threads(config.parallel);
    }
    let pool = builder.build()?;

    let results: Vec<Result<BattleReport, BatchError>> = pool.install(|| {
        (0..config.count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                run_scenario(scenario, seed, config.max_ticks).map_err(|e| {
                    warn!("Battle {} failed: {}", i, e);
                    BatchError {
                        seed,
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    });

    let (battles, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let battles: Vec<BattleReport> = battles.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_reports(&battles);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Batch complete: {} battles in {:.1}s ({} failed)",
        battles.len(),
        duration_seconds,
        errors.len()
    );

    Ok(BatchResults {
        scenario: scenario.name.clone(),
        battles,
        summary,
        duration_seconds,
        errors,
    })
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismCheck {
    /// Seed checked.
    pub seed: u64,
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
    /// True if every run ended identically.
    pub deterministic: bool,
}

/// Run the same seed several times and compare the final reports.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: u64,
    runs: u32,
    max_ticks: u64,
) -> Result<DeterminismCheck, RunError> {
    let reports = (0..runs)
        .map(|_| run_scenario(scenario, seed, max_ticks))
        .collect::<Result<Vec<_>, _>>()?;
    let deterministic = reports.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(scenario = %scenario.name, seed, "Runs diverged");
    }
    Ok(DeterminismCheck {
        seed,
        hashes: reports.iter().map(|r| r.state_hash).collect(),
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duel_concludes() {
        let report = run_scenario(&Scenario::duel(), 1, 2000).unwrap();
        let outcome = report.outcome.clone().expect("duel should finish");
        assert_eq!(report.ticks, outcome.tick);
        let survivors = if outcome.winner == report.attacker.player {
            report.attacker.units_left
        } else {
            report.defender.units_left
        };
        assert_eq!(survivors, outcome.survivors);
        assert_eq!(report.winner(), Some(outcome.winner));
    }

    #[test]
    fn test_tick_limit_leaves_the_battle_open() {
        let report = run_scenario(&Scenario::skirmish(), 1, 3).unwrap();
        assert!(report.outcome.is_none());
        assert_eq!(report.ticks, 3);
    }

    #[test]
    fn test_batch_reports_in_seed_order() {
        let config = BatchConfig::new(4).with_seed(10).with_max_ticks(50).with_parallel(2);
        let results = run_batch(&Scenario::duel(), &config).unwrap();
        assert!(results.errors.is_empty());
        let seeds: Vec<u64> = results.battles.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12, 13]);
        assert_eq!(results.summary.battles, 4);
    }

    #[test]
    fn test_batch_collects_failures() {
        let mut scenario = Scenario::duel();
        scenario.defender = scenario.defender.with_units("mech", 1, 1, 1);
        let results = run_batch(&scenario, &BatchConfig::new(2).with_max_ticks(10)).unwrap();
        assert!(results.battles.is_empty());
        assert_eq!(results.errors.len(), 2);
    }

    #[test]
    fn test_skirmish_is_deterministic() {
        let check = verify_determinism(&Scenario::skirmish(), 42, 3, 300).unwrap();
        assert!(check.deterministic, "{:?}", check.hashes);
        assert_eq!(check.hashes.len(), 3);
    }
}

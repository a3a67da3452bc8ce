//! JSON battle reports.

use std::path::Path;

use battle_core::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-side numbers at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideReport {
    /// Player id.
    pub player: PlayerId,
    /// Live units left.
    pub units_left: usize,
    /// Statistics counters.
    pub statistics: Statistics,
}

impl SideReport {
    fn capture(battle: &GroundBattle, player: PlayerId) -> Self {
        Self {
            player,
            units_left: battle.live_units_of(player).count(),
            statistics: battle.statistics().player(player),
        }
    }
}

/// Result of running one scenario with one seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Scenario name.
    pub scenario: String,
    /// Battle seed.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// How the battle ended, `None` if it hit the tick limit.
    pub outcome: Option<BattleOutcome>,
    /// Attacker numbers.
    pub attacker: SideReport,
    /// Defender numbers.
    pub defender: SideReport,
    /// Buildings still standing.
    pub buildings_left: usize,
    /// Final state hash, for determinism checks.
    pub state_hash: u64,
    /// Invariant violations recorded during the run.
    pub violations: usize,
}

impl BattleReport {
    /// Capture the current state of a simulation.
    #[must_use]
    pub fn capture(scenario: &str, sim: &BattleSimulation) -> Self {
        let battle = sim.battle();
        Self {
            scenario: scenario.to_string(),
            seed: battle.config().seed,
            ticks: sim.current_tick(),
            outcome: battle.outcome().cloned(),
            attacker: SideReport::capture(battle, battle.attacker().id),
            defender: SideReport::capture(battle, battle.defender().id),
            buildings_left: battle.planet().building_count(),
            state_hash: sim.state_hash(),
            violations: battle.diagnostics().violations().len(),
        }
    }

    /// The winner, if the battle concluded.
    #[must_use]
    pub fn winner(&self) -> Option<PlayerId> {
        self.outcome.as_ref().map(|o| o.winner)
    }
}

/// Aggregate numbers over a batch of reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Battles run.
    pub battles: usize,
    /// Battles won by the attacker.
    pub attacker_wins: usize,
    /// Battles won by the defender.
    pub defender_wins: usize,
    /// Battles that hit the tick limit.
    pub unresolved: usize,
    /// Attacker wins that took the planet.
    pub conquests: usize,
    /// Mean length of the concluded battles.
    pub avg_ticks: f64,
    /// Total invariant violations across the batch.
    pub violations: usize,
}

impl BatchSummary {
    /// Summarize a list of reports.
    #[must_use]
    pub fn from_reports(reports: &[BattleReport]) -> Self {
        let mut summary = Self {
            battles: reports.len(),
            ..Self::default()
        };
        let mut concluded_ticks = 0u64;
        for report in reports {
            summary.violations += report.violations;
            let Some(outcome) = &report.outcome else {
                summary.unresolved += 1;
                continue;
            };
            concluded_ticks += outcome.tick;
            if outcome.winner == report.attacker.player {
                summary.attacker_wins += 1;
            } else {
                summary.defender_wins += 1;
            }
            if outcome.conquered {
                summary.conquests += 1;
            }
        }
        let concluded = summary.battles - summary.unresolved;
        if concluded > 0 {
            summary.avg_ticks = concluded_ticks as f64 / concluded as f64;
        }
        summary
    }

    /// Attacker win rate over concluded battles.
    #[must_use]
    pub fn attacker_win_rate(&self) -> f64 {
        let concluded = self.attacker_wins + self.defender_wins;
        if concluded == 0 {
            0.0
        } else {
            self.attacker_wins as f64 / concluded as f64
        }
    }
}

/// A failed run inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name.
    pub scenario: String,
    /// Individual battle reports, in seed order.
    pub battles: Vec<BattleReport>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

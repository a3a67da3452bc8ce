//! Battle tuning parameters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};

/// Phase lengths of each explosion kind, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionPhases {
    /// Impact of a shot or a jammed rocket.
    pub small: u32,
    /// A unit blowing up.
    pub destroyed: u32,
    /// A building collapsing.
    pub large: u32,
    /// A mine going off.
    pub mine: u32,
}

impl Default for ExplosionPhases {
    fn default() -> Self {
        Self {
            small: 6,
            destroyed: 12,
            large: 20,
            mine: 10,
        }
    }
}

/// Configuration of a ground battle.
///
/// # Example RON
///
/// ```ron
/// BattleConfig(
///     seed: 7,
///     yield_ttl: 10,
///     non_combat_units: ["minelayer"],
///     direct_attack_units: ["kamikaze"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Seed of the battle RNG.
    pub seed: u64,
    /// Yield threshold: blocked units wait a random `[Y/2, 3Y/2)` ticks.
    pub yield_ttl: u32,
    /// Path requests submitted per tick.
    pub path_batch_size: usize,
    /// Worker threads for path searches.
    pub path_workers: usize,
    /// Node expansion limit of a single path search.
    pub max_path_expansions: usize,
    /// Models that do not count toward a side's combat strength.
    pub non_combat_units: BTreeSet<String>,
    /// Models that auto-acquire targets in range while idle.
    pub direct_attack_units: BTreeSet<String>,
    /// Models that creep closer to their target after each shot.
    pub get_closer_units: BTreeSet<String>,
    /// Explosion phase lengths.
    pub explosion_phases: ExplosionPhases,
    /// Search radius for free deployment cells.
    pub deployment_radius: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            yield_ttl: 10,
            path_batch_size: 10,
            path_workers: 4,
            max_path_expansions: 20_000,
            non_combat_units: BTreeSet::new(),
            direct_attack_units: BTreeSet::new(),
            get_closer_units: BTreeSet::new(),
            explosion_phases: ExplosionPhases::default(),
            deployment_radius: 12,
        }
    }
}

impl BattleConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| BattleError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Builder method to set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to set the yield threshold.
    #[must_use]
    pub fn with_yield_ttl(mut self, yield_ttl: u32) -> Self {
        self.yield_ttl = yield_ttl;
        self
    }

    /// Builder method to mark a model as non-combat.
    #[must_use]
    pub fn with_non_combat(mut self, model: impl Into<String>) -> Self {
        self.non_combat_units.insert(model.into());
        self
    }

    /// Builder method to mark a model as direct-attack.
    #[must_use]
    pub fn with_direct_attack(mut self, model: impl Into<String>) -> Self {
        self.direct_attack_units.insert(model.into());
        self
    }

    /// Builder method to mark a model as get-closer.
    #[must_use]
    pub fn with_get_closer(mut self, model: impl Into<String>) -> Self {
        self.get_closer_units.insert(model.into());
        self
    }

    /// Units closer than this to the end of their yield are not blocking.
    #[must_use]
    pub fn half_yield(&self) -> u32 {
        self.yield_ttl / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BattleConfig::default();
        assert_eq!(config.yield_ttl, 10);
        assert_eq!(config.path_batch_size, 10);
        assert_eq!(config.half_yield(), 5);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = BattleConfig::from_ron(
            "test",
            r#"BattleConfig(seed: 99, non_combat_units: ["layer"], explosion_phases: ExplosionPhases(small: 2, destroyed: 4, large: 8, mine: 4))"#,
        )
        .unwrap();
        assert_eq!(config.seed, 99);
        assert!(config.non_combat_units.contains("layer"));
        assert_eq!(config.explosion_phases.large, 8);
        assert_eq!(config.path_batch_size, 10);
    }

    #[test]
    fn test_invalid_ron() {
        assert!(BattleConfig::from_ron("bad", "BattleConfig(seed: \"x\")").is_err());
    }
}

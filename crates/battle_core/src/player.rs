//! Players taking part in a battle and their statistics counters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{decimal_serde, Fixed};

/// Identifier of a player (empire).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Per-player data the battle reads from the strategic layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Player identifier.
    pub id: PlayerId,
    /// Race key used to look up turret definitions.
    pub race: String,
    /// Multiplier applied to building hitpoints for this owner
    /// (research bonuses and the like).
    #[serde(with = "decimal_serde", default = "default_multiplier")]
    pub building_hp_multiplier: Fixed,
}

fn default_multiplier() -> Fixed {
    Fixed::ONE
}

impl Player {
    /// Create a player with no hitpoint bonus.
    #[must_use]
    pub fn new(id: PlayerId, race: impl Into<String>) -> Self {
        Self {
            id,
            race: race.into(),
            building_hp_multiplier: Fixed::ONE,
        }
    }

    /// Builder method to set the building hitpoint multiplier.
    #[must_use]
    pub fn with_building_hp_multiplier(mut self, multiplier: Fixed) -> Self {
        self.building_hp_multiplier = multiplier;
        self
    }
}

/// Plain accumulators for battle statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Own ground units lost.
    pub vehicles_lost: u32,
    /// Value of own ground units lost.
    pub vehicles_lost_cost: u64,
    /// Enemy ground units destroyed.
    pub vehicles_destroyed: u32,
    /// Value of enemy ground units destroyed.
    pub vehicles_destroyed_cost: u64,
    /// Own buildings lost.
    pub buildings_lost: u32,
    /// Value of own buildings lost.
    pub buildings_lost_cost: u64,
    /// Enemy buildings destroyed.
    pub buildings_destroyed: u32,
    /// Value of enemy buildings destroyed.
    pub buildings_destroyed_cost: u64,
    /// Ground battles won.
    pub ground_wins: u32,
    /// Ground battles lost.
    pub ground_losses: u32,
    /// Planets taken by force.
    pub planets_conquered: u32,
    /// Planets lost to an invader.
    pub planets_lost: u32,
}

/// Statistics kept per player and for the whole world.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsLedger {
    players: BTreeMap<PlayerId, Statistics>,
    world: Statistics,
}

impl StatisticsLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of one player (zeroes if the player never scored).
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Statistics {
        self.players.get(&id).copied().unwrap_or_default()
    }

    /// World aggregate counters.
    #[must_use]
    pub fn world(&self) -> Statistics {
        self.world
    }

    /// Apply the same update to a player's and the world's counters.
    fn record(&mut self, id: PlayerId, update: impl Fn(&mut Statistics)) {
        update(self.players.entry(id).or_default());
        update(&mut self.world);
    }

    /// A ground unit was destroyed.
    ///
    /// `destroyer` is `None` for self-destruction.
    pub fn unit_destroyed(&mut self, loser: PlayerId, destroyer: Option<PlayerId>, cost: u32) {
        self.record(loser, |s| {
            s.vehicles_lost += 1;
            s.vehicles_lost_cost += u64::from(cost);
        });
        if let Some(winner) = destroyer {
            self.record(winner, |s| {
                s.vehicles_destroyed += 1;
                s.vehicles_destroyed_cost += u64::from(cost);
            });
        }
    }

    /// A building was destroyed.
    pub fn building_destroyed(&mut self, loser: PlayerId, destroyer: Option<PlayerId>, cost: u32) {
        self.record(loser, |s| {
            s.buildings_lost += 1;
            s.buildings_lost_cost += u64::from(cost);
        });
        if let Some(winner) = destroyer {
            self.record(winner, |s| {
                s.buildings_destroyed += 1;
                s.buildings_destroyed_cost += u64::from(cost);
            });
        }
    }

    /// A ground battle ended.
    pub fn battle_concluded(&mut self, winner: PlayerId, loser: PlayerId, conquered: bool) {
        self.record(winner, |s| {
            s.ground_wins += 1;
            if conquered {
                s.planets_conquered += 1;
            }
        });
        self.record(loser, |s| {
            s.ground_losses += 1;
            if conquered {
                s.planets_lost += 1;
            }
        });
    }
}

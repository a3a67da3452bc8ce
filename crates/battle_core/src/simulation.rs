//! Core battle loop.
//!
//! The battle runs at a fixed tick rate and processes all combat logic
//! deterministically.
//!
//! # Determinism
//!
//! - No floating-point math in the simulation (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - A seeded RNG owned by the battle
//! - Consistent iteration order (units, guns and buildings in id order)
//! - Path searches run in parallel but are applied in submission order
//!
//! # Tick order
//!
//! 1. **AI** - each controller whose player has live units issues orders
//! 2. **Path planning** - one batch of queued searches
//! 3. **Effects** - explosions, then rockets
//! 4. **Guns** - building turrets
//! 5. **Units** - the per-unit decision cycle
//! 6. **Lifecycle** - winner check; conclusion once effects have drained
//!
//! # Example
//!
//! ```
//! use battle_core::prelude::*;
//!
//! let planet = Planet::new("Ymir", PlayerId(2), GridSurface::new(16, 16));
//! let mut roster = UnitRoster::new();
//! roster.insert(UnitModel::new("tank", 100, 20, Fixed::from_num(3)));
//!
//! let battle = GroundBattle::new(
//!     BattleConfig::default(),
//!     planet,
//!     BuildingCatalog::new(),
//!     roster,
//!     Player::new(PlayerId(1), "human"),
//!     Player::new(PlayerId(2), "alien"),
//! )
//! .unwrap();
//!
//! let mut sim = BattleSimulation::new(battle);
//! sim.battle_mut().deploy(PlayerId(1), "tank", Location::new(2, 2)).unwrap();
//! let events = sim.tick();
//!
//! // The defender has nothing left to fight with.
//! assert_eq!(events.winner, Some(PlayerId(1)));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::ai::GroundAi;
use crate::battle::{BattleOutcome, GroundBattle};
use crate::buildings::BuildingId;
use crate::effects::SoundEvent;
use crate::player::PlayerId;
use crate::unit::UnitId;

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 10;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Events generated during a battle tick.
///
/// The presentation layer uses these to trigger sounds and effects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// The tick these events belong to.
    pub tick: u64,
    /// Sound cues, deduplicated.
    pub sounds: BTreeSet<SoundEvent>,
    /// Units destroyed this tick.
    pub destroyed_units: Vec<UnitId>,
    /// Buildings destroyed this tick.
    pub destroyed_buildings: Vec<BuildingId>,
    /// Set on the tick the winner was decided.
    pub winner: Option<PlayerId>,
    /// Set on the tick the battle concluded.
    pub outcome: Option<BattleOutcome>,
}

impl GroundBattle {
    /// Run every pass of one tick after the AI controllers.
    pub fn advance(&mut self) -> TickEvents {
        self.tick += 1;
        self.diagnostics.set_tick(self.tick);
        self.events = TickEvents {
            tick: self.tick,
            ..TickEvents::default()
        };

        self.run_path_batch();
        self.update_explosions();
        self.update_rockets();

        if self.winner.is_some() {
            self.stop_all_units();
        } else {
            self.update_guns();
            self.update_units();
            self.check_winner();
        }
        self.try_conclude();

        std::mem::take(&mut self.events)
    }

    /// Hash of the battle state for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for unit in self.units.iter() {
            unit.id.hash(&mut hasher);
            unit.position.hash(&mut hasher);
            unit.heading.to_bits().hash(&mut hasher);
            unit.hp.hash(&mut hasher);
            unit.cooldown.hash(&mut hasher);
            unit.fire_phase.hash(&mut hasher);
            unit.paralyzed.hash(&mut hasher);
            unit.yield_ttl.hash(&mut hasher);
            unit.target.hash(&mut hasher);
            unit.path.hash(&mut hasher);
            unit.next_move.hash(&mut hasher);
            unit.closing_in.hash(&mut hasher);
        }

        for gun in self.guns.iter() {
            gun.id.hash(&mut hasher);
            gun.angle.to_bits().hash(&mut hasher);
            gun.cooldown.hash(&mut hasher);
            gun.target.hash(&mut hasher);
        }

        for building in self.planet.buildings() {
            building.id.hash(&mut hasher);
            building.hitpoints.hash(&mut hasher);
        }

        for rocket in &self.rockets {
            rocket.position.hash(&mut hasher);
            rocket.target.hash(&mut hasher);
        }
        for explosion in &self.explosions {
            explosion.hash(&mut hasher);
        }
        for mine in self.mines.values() {
            mine.location.hash(&mut hasher);
            mine.owner.hash(&mut hasher);
        }
        self.paralysis.hash(&mut hasher);
        self.winner.hash(&mut hasher);

        hasher.finish()
    }
}

/// A ground battle together with its AI controllers.
#[derive(Debug)]
pub struct BattleSimulation {
    battle: GroundBattle,
    controllers: Vec<Box<dyn GroundAi>>,
}

impl BattleSimulation {
    /// Wrap a battle with no AI controllers.
    #[must_use]
    pub fn new(battle: GroundBattle) -> Self {
        Self {
            battle,
            controllers: Vec::new(),
        }
    }

    /// Builder method to attach an AI controller.
    #[must_use]
    pub fn with_ai(mut self, ai: impl GroundAi + 'static) -> Self {
        self.controllers.push(Box::new(ai));
        self
    }

    /// The battle.
    #[must_use]
    pub fn battle(&self) -> &GroundBattle {
        &self.battle
    }

    /// Mutable battle access for player orders.
    pub fn battle_mut(&mut self) -> &mut GroundBattle {
        &mut self.battle
    }

    /// Current tick.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.battle.tick()
    }

    /// Advance the battle by one tick.
    pub fn tick(&mut self) -> TickEvents {
        if self.battle.is_concluded() {
            return TickEvents {
                tick: self.battle.tick(),
                ..TickEvents::default()
            };
        }

        for ai in &mut self.controllers {
            let player = ai.player();
            if self.battle.live_units_of(player).next().is_some() {
                ai.ground_battle_tick(&mut self.battle);
            }
        }

        let events = self.battle.advance();

        #[cfg(debug_assertions)]
        {
            let hash = self.battle.state_hash();
            tracing::debug!(tick = events.tick, state_hash = hash, "Battle state hash");
        }

        events
    }

    /// Tick until the battle concludes or `max_ticks` have passed.
    pub fn run_to_completion(&mut self, max_ticks: u64) -> Option<BattleOutcome> {
        for _ in 0..max_ticks {
            if let Some(outcome) = self.tick().outcome {
                return Some(outcome);
            }
            if self.battle.is_concluded() {
                break;
            }
        }
        self.battle.outcome().cloned()
    }

    /// Hash of the battle state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.battle.state_hash()
    }

    /// Take the battle back out.
    #[must_use]
    pub fn into_battle(self) -> GroundBattle {
        self.battle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::SkirmishAi;
    use crate::buildings::BuildingCatalog;
    use crate::config::BattleConfig;
    use crate::math::{Fixed, Location};
    use crate::model::{UnitModel, UnitRoster};
    use crate::planet::{GridSurface, Planet};
    use crate::player::Player;

    const ATTACKER: PlayerId = PlayerId(1);
    const DEFENDER: PlayerId = PlayerId(2);

    fn battle(seed: u64) -> GroundBattle {
        let planet = Planet::new("Ymir", DEFENDER, GridSurface::new(24, 24));
        let mut roster = UnitRoster::new();
        roster.insert(UnitModel::new("tank", 50, 20, Fixed::from_num(3)));
        GroundBattle::new(
            BattleConfig::default().with_seed(seed),
            planet,
            BuildingCatalog::new(),
            roster,
            Player::new(ATTACKER, "human"),
            Player::new(DEFENDER, "alien"),
        )
        .unwrap()
    }

    fn skirmish(seed: u64) -> BattleSimulation {
        let mut battle = battle(seed);
        for y in [2, 4, 6] {
            battle.deploy(ATTACKER, "tank", Location::new(2, y)).unwrap();
        }
        battle.deploy(DEFENDER, "tank", Location::new(14, 4)).unwrap();
        BattleSimulation::new(battle).with_ai(SkirmishAi::new(ATTACKER).with_interval(1))
    }

    #[test]
    fn test_tick_rate() {
        assert_eq!(TICK_DURATION_MS, 100);
    }

    #[test]
    fn test_empty_defender_loses_on_first_tick() {
        let mut sim = BattleSimulation::new(battle(0));
        sim.battle_mut()
            .deploy(ATTACKER, "tank", Location::new(2, 2))
            .unwrap();

        let events = sim.tick();
        assert_eq!(events.tick, 1);
        assert_eq!(events.winner, Some(ATTACKER));
        let outcome = events.outcome.expect("concluded");
        assert!(outcome.conquered);
        assert_eq!(outcome.survivors, 1);
        assert_eq!(sim.battle().planet().owner(), ATTACKER);
    }

    #[test]
    fn test_no_units_means_defender_wins() {
        let mut sim = BattleSimulation::new(battle(0));
        let outcome = sim.run_to_completion(5).expect("concluded");
        assert_eq!(outcome.winner, DEFENDER);
        assert!(!outcome.conquered);
        assert_eq!(sim.battle().planet().owner(), DEFENDER);
    }

    #[test]
    fn test_concluded_battle_does_not_advance() {
        let mut sim = BattleSimulation::new(battle(0));
        sim.run_to_completion(5);
        let tick = sim.current_tick();
        let hash = sim.state_hash();

        let events = sim.tick();
        assert_eq!(events.tick, tick);
        assert!(events.outcome.is_none());
        assert_eq!(sim.current_tick(), tick);
        assert_eq!(sim.state_hash(), hash);
    }

    #[test]
    fn test_skirmish_ai_wins_outnumbered_fight() {
        let mut sim = skirmish(7);
        let outcome = sim.run_to_completion(3000).expect("battle should end");
        assert_eq!(outcome.winner, ATTACKER);
        assert_eq!(outcome.survivors, 3);
        assert_eq!(sim.battle().statistics().player(ATTACKER).vehicles_destroyed, 1);
    }

    #[test]
    fn test_same_seed_same_state() {
        let mut a = skirmish(42);
        let mut b = skirmish(42);
        for _ in 0..200 {
            a.tick();
            b.tick();
            assert_eq!(a.state_hash(), b.state_hash(), "diverged at tick {}", a.current_tick());
        }
    }

    #[test]
    fn test_hash_tracks_movement() {
        let mut sim = skirmish(3);
        let before = sim.state_hash();
        sim.tick();
        assert_ne!(before, sim.state_hash());
    }
}

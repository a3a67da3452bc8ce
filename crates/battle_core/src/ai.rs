//! AI controllers for ground battles.

use crate::battle::GroundBattle;
use crate::buildings::BuildingKind;
use crate::player::PlayerId;
use crate::unit::{AttackTarget, UnitId};

/// A controller that issues orders for one player.
///
/// Called once per tick, before the battle's own passes, and only while the
/// player still has live units.
pub trait GroundAi: std::fmt::Debug + Send {
    /// The player this controller commands.
    fn player(&self) -> PlayerId;

    /// Issue orders for this tick.
    fn ground_battle_tick(&mut self, battle: &mut GroundBattle);
}

/// How a [`SkirmishAi`] uses its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stance {
    /// Send idle units at the nearest enemy.
    #[default]
    Aggressive,
    /// Keep idle units on guard where they stand.
    Defensive,
}

/// A simple built-in controller.
///
/// Every `interval` ticks it looks at its idle units: aggressive units go
/// after the nearest enemy unit or defensive building, defensive units are
/// put on guard.
#[derive(Debug, Clone)]
pub struct SkirmishAi {
    player: PlayerId,
    stance: Stance,
    interval: u64,
}

impl SkirmishAi {
    /// Create an aggressive controller that thinks every 5 ticks.
    #[must_use]
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            stance: Stance::Aggressive,
            interval: 5,
        }
    }

    /// Builder method to set the stance.
    #[must_use]
    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = stance;
        self
    }

    /// Builder method to set the decision interval in ticks.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    fn idle_units(&self, battle: &GroundBattle) -> Vec<UnitId> {
        battle
            .live_units_of(self.player)
            .filter(|u| {
                u.target.is_none()
                    && u.attack_move.is_none()
                    && !u.guard
                    && !u.is_moving()
                    && !u.in_motion_planning
                    && u.paralyzed == 0
                    && !battle.minelayers().contains(&u.id)
            })
            .map(|u| u.id)
            .collect()
    }

    /// Nearest enemy unit, or failing that the nearest defensive building.
    fn pick_target(&self, battle: &GroundBattle, unit: UnitId) -> Option<AttackTarget> {
        let position = battle.unit(unit)?.position;
        let nearest_unit = battle
            .units()
            .iter()
            .filter(|u| u.is_alive() && u.owner != self.player)
            .map(|u| (position.distance_squared(u.position), u.id))
            .min()
            .map(|(_, id)| AttackTarget::Unit(id));
        nearest_unit.or_else(|| {
            battle
                .planet()
                .buildings()
                .filter(|b| b.owner != self.player && b.kind == BuildingKind::Defensive)
                .map(|b| (b.distance_to(position), b.id))
                .min()
                .map(|(_, id)| AttackTarget::Building(id))
        })
    }
}

impl GroundAi for SkirmishAi {
    fn player(&self) -> PlayerId {
        self.player
    }

    fn ground_battle_tick(&mut self, battle: &mut GroundBattle) {
        if battle.tick() % self.interval != 0 {
            return;
        }
        for unit in self.idle_units(battle) {
            let result = match self.stance {
                Stance::Defensive => battle.order_guard(unit),
                Stance::Aggressive => match self.pick_target(battle, unit) {
                    Some(AttackTarget::Unit(target)) => battle.order_attack_unit(unit, target),
                    Some(AttackTarget::Building(target)) => {
                        battle.order_attack_building(unit, target)
                    }
                    None => Ok(()),
                },
            };
            if let Err(error) = result {
                tracing::warn!(player = %self.player, %unit, %error, "AI order rejected");
            }
        }
    }
}

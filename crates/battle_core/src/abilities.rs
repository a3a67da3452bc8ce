//! Ability handlers.
//!
//! Each [`AbilityTag`] maps to one stateless handler. The unit update calls
//! the hooks at fixed points of its cycle; the defaults describe a plain
//! combat unit.

use crate::battle::GroundBattle;
use crate::effects::{Mine, Rocket, SoundEvent};
use crate::model::{Ability, AbilityTag};
use crate::unit::{AttackTarget, Unit, UnitId};

/// Hooks an ability can override.
pub(crate) trait AbilityBehavior: Sync {
    /// Runs before the firing animation. Returns true if it used up the tick.
    fn pre_update(&self, _battle: &mut GroundBattle, _unit: UnitId) -> bool {
        false
    }

    /// Whether this unit may attack `target`.
    fn accepts_unit_target(&self, _target: &Unit) -> bool {
        true
    }

    /// Deliver the shot when the firing animation completes.
    fn resolve_fire(&self, battle: &mut GroundBattle, unit: UnitId, target: AttackTarget) {
        battle.deal_weapon_damage(unit, target);
    }

    /// Runs after every completed firing cycle.
    fn after_fire(&self, _battle: &mut GroundBattle, _unit: UnitId) {}

    /// Runs when the unit drops its target.
    fn on_target_lost(&self, _battle: &mut GroundBattle, _unit: UnitId) {}
}

struct Plain;

impl AbilityBehavior for Plain {}

struct Kamikaze;

impl AbilityBehavior for Kamikaze {
    fn after_fire(&self, battle: &mut GroundBattle, unit: UnitId) {
        battle.kamikaze_check(unit);
    }

    fn on_target_lost(&self, battle: &mut GroundBattle, unit: UnitId) {
        battle.kamikaze_check(unit);
    }
}

struct Paralyzer;

impl AbilityBehavior for Paralyzer {
    fn accepts_unit_target(&self, target: &Unit) -> bool {
        target.paralyzed == 0
    }

    fn resolve_fire(&self, battle: &mut GroundBattle, unit: UnitId, target: AttackTarget) {
        battle.deal_weapon_damage(unit, target);
        let Some(Ability::Paralyzer { duration }) =
            battle.units.get(unit).map(|u| u.model.ability.clone())
        else {
            return;
        };
        if let AttackTarget::Unit(victim) = target {
            battle.paralyze(victim, unit, duration);
        }
    }
}

struct RocketSled;

impl AbilityBehavior for RocketSled {
    fn resolve_fire(&self, battle: &mut GroundBattle, unit: UnitId, target: AttackTarget) {
        let Some(shooter) = battle.units.alive(unit) else {
            return;
        };
        let Ability::RocketSled { rocket } = &shooter.model.ability else {
            return;
        };
        let Some(point) = battle.target_point(shooter.position, target) else {
            return;
        };
        let rocket = Rocket::launch(shooter.owner, rocket, shooter.position, point);
        tracing::trace!(%unit, ?target, "Rocket launched");
        battle.add_rocket(rocket);
        battle.events.sounds.insert(SoundEvent::RocketLaunch);
    }
}

struct Minelayer;

impl AbilityBehavior for Minelayer {
    fn pre_update(&self, battle: &mut GroundBattle, unit: UnitId) -> bool {
        if !battle.minelayers.contains(&unit) {
            return false;
        }
        let Some(layer) = battle.units.alive(unit) else {
            return false;
        };
        if layer.is_moving() || layer.in_motion_planning {
            return false;
        }
        let Ability::Minelayer {
            mine_damage,
            mine_area,
            lay_phases,
        } = layer.model.ability
        else {
            battle.minelayers.remove(&unit);
            return false;
        };
        let (cell, owner) = (layer.cell(), layer.owner);

        if battle.mines.contains_key(&cell) {
            battle.minelayers.remove(&unit);
            if let Some(layer) = battle.units.get_mut(unit) {
                layer.lay_phase = 0;
            }
            return false;
        }

        let Some(layer) = battle.units.get_mut(unit) else {
            return false;
        };
        layer.lay_phase += 1;
        if layer.lay_phase >= lay_phases {
            layer.lay_phase = 0;
            battle.minelayers.remove(&unit);
            battle.place_mine(Mine {
                location: cell,
                owner,
                damage: mine_damage,
                area: mine_area,
            });
            tracing::trace!(%unit, ?cell, "Mine planted");
        }
        true
    }
}

static PLAIN: Plain = Plain;
static KAMIKAZE: Kamikaze = Kamikaze;
static PARALYZER: Paralyzer = Paralyzer;
static ROCKET_SLED: RocketSled = RocketSled;
static MINELAYER: Minelayer = Minelayer;

/// The handler for an ability tag.
pub(crate) fn behavior_for(tag: AbilityTag) -> &'static dyn AbilityBehavior {
    match tag {
        AbilityTag::Plain | AbilityTag::RocketJammer => &PLAIN,
        AbilityTag::Kamikaze => &KAMIKAZE,
        AbilityTag::Paralyzer => &PARALYZER,
        AbilityTag::RocketSled => &ROCKET_SLED,
        AbilityTag::Minelayer => &MINELAYER,
    }
}

//! Mines, rockets and explosions.

use serde::{Deserialize, Serialize};

use crate::battle::GroundBattle;
use crate::config::ExplosionPhases;
use crate::math::{fixed_serde, Fixed, Location, Vec2Fixed};
use crate::model::{movement_budget, Ability, RocketModel};
use crate::player::PlayerId;
use crate::unit::UnitId;

/// Sound cues raised during a tick. The set is cleared every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SoundEvent {
    /// A unit fired.
    UnitFire,
    /// A building turret fired.
    GunFire,
    /// A rocket sled launched.
    RocketLaunch,
    /// Something blew up.
    Explosion,
    /// A mine went off.
    MineDetonation,
    /// A unit was paralyzed.
    Paralyze,
    /// A unit self-detonated.
    Kamikaze,
    /// A building collapsed.
    BuildingDestroyed,
    /// A rocket was jammed.
    RocketJammed,
}

/// A planted mine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mine {
    /// Cell of the mine.
    pub location: Location,
    /// Player who planted it.
    pub owner: PlayerId,
    /// Damage at the center.
    pub damage: u32,
    /// Blast radius.
    pub area: u32,
}

/// A rocket in flight toward a fixed point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rocket {
    /// Launching player.
    pub owner: PlayerId,
    /// Current position.
    pub position: Vec2Fixed,
    /// Impact point, frozen at launch.
    pub target: Vec2Fixed,
    /// Movement speed (unit movement scale).
    pub speed: u32,
    /// Damage at the impact point.
    pub damage: u32,
    /// Blast radius.
    pub area: u32,
    /// Flight direction in degrees.
    #[serde(with = "fixed_serde")]
    pub heading: Fixed,
    /// Fraction of a jammer's range that jams this rocket.
    #[serde(with = "fixed_serde")]
    pub penetration_ratio: Fixed,
}

impl Rocket {
    /// Launch a rocket from `position` toward `target`.
    #[must_use]
    pub fn launch(
        owner: PlayerId,
        model: &RocketModel,
        position: Vec2Fixed,
        target: Vec2Fixed,
    ) -> Self {
        Self {
            owner,
            position,
            target,
            speed: model.speed,
            damage: model.damage,
            area: model.area,
            heading: position.bearing_to(target),
            penetration_ratio: model.penetration_ratio,
        }
    }

    /// Distance covered per tick.
    #[must_use]
    pub fn travel(&self) -> Fixed {
        movement_budget(self.speed)
    }
}

/// Explosion variants, each with its own phase length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplosionKind {
    /// Shot impact.
    Small,
    /// Unit destruction.
    Destroyed,
    /// Building destruction.
    Large,
    /// Mine detonation.
    Mine,
}

impl ExplosionKind {
    /// Phase count of this kind.
    #[must_use]
    pub fn phases(self, phases: &ExplosionPhases) -> u32 {
        let length = match self {
            Self::Small => phases.small,
            Self::Destroyed => phases.destroyed,
            Self::Large => phases.large,
            Self::Mine => phases.mine,
        };
        length.max(1)
    }
}

/// A running explosion animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Explosion {
    /// Variant.
    pub kind: ExplosionKind,
    /// Where it happens.
    pub position: Vec2Fixed,
    /// Elapsed phases.
    pub phase: u32,
    /// Unit removed from the battle at the half phase.
    pub bound_unit: Option<UnitId>,
}

impl Explosion {
    /// Start an explosion.
    #[must_use]
    pub fn new(kind: ExplosionKind, position: Vec2Fixed) -> Self {
        Self {
            kind,
            position,
            phase: 0,
            bound_unit: None,
        }
    }

    /// Builder method to bind a destroyed unit.
    #[must_use]
    pub fn bound_to(mut self, unit: UnitId) -> Self {
        self.bound_unit = Some(unit);
        self
    }
}

/// How a rocket's flight ended this tick.
enum RocketFate {
    Flying,
    Jammed,
    Impact,
}

impl GroundBattle {
    /// Advance every explosion one phase.
    pub(crate) fn update_explosions(&mut self) {
        let phases = self.config.explosion_phases;
        let mut released = Vec::new();
        self.explosions.retain_mut(|explosion| {
            explosion.phase += 1;
            let length = explosion.kind.phases(&phases);
            if explosion.phase == (length / 2).max(1) {
                if let Some(unit) = explosion.bound_unit.take() {
                    released.push(unit);
                }
            }
            explosion.phase < length
        });
        for unit in released {
            self.remove_unit(unit);
        }
    }

    /// Enemy jammer whose jamming radius covers `point`.
    fn jammer_covering(&self, owner: PlayerId, point: Vec2Fixed, ratio: Fixed) -> Option<UnitId> {
        self.units
            .iter()
            .filter(|u| u.is_alive() && u.owner != owner)
            .filter(|u| matches!(u.model.ability, Ability::RocketJammer))
            .find(|u| u.position.distance(point) < u.model.max_range * ratio)
            .map(|u| u.id)
    }

    /// Move rockets, jam them or let them hit.
    pub(crate) fn update_rockets(&mut self) {
        let rockets = std::mem::take(&mut self.rockets);
        let mut flying = Vec::with_capacity(rockets.len());
        for mut rocket in rockets {
            let travel = rocket.travel();
            let remaining = rocket.position.distance(rocket.target);
            let fate = if self
                .jammer_covering(rocket.owner, rocket.position, rocket.penetration_ratio)
                .is_some()
            {
                RocketFate::Jammed
            } else if remaining < travel {
                if self
                    .jammer_covering(rocket.owner, rocket.target, rocket.penetration_ratio)
                    .is_some()
                {
                    RocketFate::Jammed
                } else {
                    RocketFate::Impact
                }
            } else {
                RocketFate::Flying
            };

            match fate {
                RocketFate::Flying => {
                    let step = (rocket.target - rocket.position).normalize().scale(travel);
                    rocket.position = rocket.position + step;
                    flying.push(rocket);
                }
                RocketFate::Jammed => {
                    tracing::trace!(owner = %rocket.owner, "Rocket jammed");
                    self.spawn_explosion(Explosion::new(ExplosionKind::Small, rocket.position));
                    self.events.sounds.insert(SoundEvent::RocketJammed);
                }
                RocketFate::Impact => {
                    self.damage_area(rocket.target, rocket.damage, rocket.area, rocket.owner);
                    self.spawn_explosion(Explosion::new(ExplosionKind::Small, rocket.target));
                    self.events.sounds.insert(SoundEvent::Explosion);
                }
            }
        }
        self.rockets = flying;
    }

    /// Detonate an enemy mine under `unit`, if any.
    pub(crate) fn trigger_mine(&mut self, unit: UnitId) {
        let Some((cell, owner)) = self.units.alive(unit).map(|u| (u.cell(), u.owner)) else {
            return;
        };
        let Some(mine) = self.mines.get(&cell).copied() else {
            return;
        };
        if mine.owner == owner {
            return;
        }
        self.mines.remove(&cell);
        tracing::trace!(%unit, ?cell, "Mine triggered");
        self.events.sounds.insert(SoundEvent::MineDetonation);
        self.spawn_explosion(Explosion::new(ExplosionKind::Mine, cell.center()));
        self.damage_area(cell.center(), mine.damage, mine.area, mine.owner);
    }

    pub(crate) fn spawn_explosion(&mut self, explosion: Explosion) {
        self.explosions.push(explosion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explosion_phase_lengths() {
        let phases = ExplosionPhases {
            small: 0,
            destroyed: 8,
            large: 12,
            mine: 4,
        };
        assert_eq!(ExplosionKind::Small.phases(&phases), 1);
        assert_eq!(ExplosionKind::Destroyed.phases(&phases), 8);
    }

    #[test]
    fn test_rocket_launch_heading() {
        let model = RocketModel {
            speed: 25,
            damage: 50,
            area: 2,
            penetration_ratio: Fixed::from_num(0.5),
        };
        let rocket = Rocket::launch(
            PlayerId(1),
            &model,
            Vec2Fixed::from_ints(0, 0),
            Vec2Fixed::from_ints(0, 10),
        );
        assert_eq!(rocket.heading, Fixed::from_num(90));
        assert_eq!(rocket.travel(), movement_budget(25));
    }
}

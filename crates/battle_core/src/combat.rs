//! Damage resolution.
//!
//! This module implements:
//! - Direct and area damage to units
//! - Building damage scaled by the owner's hitpoint multiplier
//! - The turret cascade at half hitpoints and at destruction
//! - Destruction bookkeeping (statistics, explosions, paralysis release)
//!
//! Area damage falls off linearly: a target at distance `d` from the center
//! of a blast with radius `area` takes `round(damage * (area - d) / area)`,
//! nothing at `d >= area`.

use crate::battle::GroundBattle;
use crate::buildings::{BuildingId, BuildingKind};
use crate::effects::{Explosion, ExplosionKind, SoundEvent};
use crate::error::ViolationKind;
use crate::math::{angle_difference, Fixed, Vec2Fixed};
use crate::player::PlayerId;
use crate::unit::{Unit, UnitId};

/// Progress of a firing cycle started this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FireProgress {
    /// The animation started; the hit lands when it completes.
    Started,
    /// The hit lands now.
    Resolve,
}

/// Turn `heading` toward `bearing` by at most `step` degrees.
///
/// `None` turns instantly. Returns the new heading and whether it now
/// matches the bearing.
#[must_use]
pub fn rotate_toward(heading: Fixed, bearing: Fixed, step: Option<Fixed>) -> (Fixed, bool) {
    let diff = angle_difference(heading, bearing);
    match step {
        Some(step) if diff.abs() > step => {
            let turned = if diff > Fixed::ZERO {
                heading + step
            } else {
                heading - step
            };
            (crate::math::normalize_degrees(turned), false)
        }
        _ => (bearing, true),
    }
}

/// Damage taken at `distance` from the center of a blast.
#[must_use]
pub fn area_damage(damage: u32, area: u32, distance: Fixed) -> u32 {
    let area = Fixed::from_num(area);
    if area == Fixed::ZERO || distance >= area {
        return 0;
    }
    (Fixed::from_num(damage) * (area - distance) / area)
        .round()
        .to_num::<u32>()
}

/// Damage on the building type's hitpoint scale.
///
/// Owners with a hitpoint multiplier have `type_hp * multiplier` effective
/// hitpoints, so each hit is scaled by `type_hp / max_hp` and floored.
#[must_use]
pub fn scale_building_damage(damage: u32, type_hitpoints: u32, multiplier: Fixed) -> u32 {
    let type_hp = Fixed::from_num(type_hitpoints);
    let max_hp = type_hp * multiplier;
    if max_hp <= Fixed::ZERO {
        return damage;
    }
    (Fixed::from_num(damage) * type_hp / max_hp)
        .floor()
        .to_num::<u32>()
}

/// Whether a hit moved a building from at least half to below half.
#[must_use]
pub fn crosses_half(before: u32, after: u32, type_hitpoints: u32) -> bool {
    u64::from(before) * 2 >= u64::from(type_hitpoints)
        && u64::from(after) * 2 < u64::from(type_hitpoints)
}

impl GroundBattle {
    /// Closest live enemy of `owner`, lowest id on ties.
    ///
    /// `measure` returns the distance to an eligible unit, or `None` to skip it.
    pub(crate) fn nearest_enemy_unit(
        &self,
        owner: PlayerId,
        measure: impl Fn(&Unit) -> Option<Fixed>,
    ) -> Option<UnitId> {
        self.units
            .iter()
            .filter(|u| u.is_alive() && u.owner != owner)
            .filter_map(|u| measure(u).map(|d| (d, u.id)))
            .min()
            .map(|(_, id)| id)
    }

    /// Subtract damage from a unit. `source` is credited with the kill.
    pub fn damage_unit(&mut self, unit: UnitId, damage: u32, source: Option<PlayerId>) {
        let Some(target) = self.units.get_mut(unit) else {
            return;
        };
        if target.take_damage(damage) {
            self.on_unit_destroyed(unit, source);
        }
    }

    /// Damage every unit and building not owned by `excluded_owner` within
    /// `area` of `center`. The excluded owner is credited with kills.
    pub fn damage_area(&mut self, center: Vec2Fixed, damage: u32, area: u32, excluded_owner: PlayerId) {
        let hits: Vec<(UnitId, u32)> = self
            .units
            .iter()
            .filter(|u| u.is_alive() && u.owner != excluded_owner)
            .map(|u| (u.id, area_damage(damage, area, center.distance(u.position))))
            .filter(|(_, amount)| *amount > 0)
            .collect();
        for (unit, amount) in hits {
            self.damage_unit(unit, amount, Some(excluded_owner));
        }

        let building_hits: Vec<(BuildingId, u32)> = self
            .planet
            .buildings()
            .filter(|b| b.owner != excluded_owner)
            .map(|b| (b.id, area_damage(damage, area, b.distance_to(center))))
            .filter(|(_, amount)| *amount > 0)
            .collect();
        for (building, amount) in building_hits {
            self.damage_building(building, amount, Some(excluded_owner));
        }
    }

    /// Damage a building and run the turret cascade.
    pub fn damage_building(&mut self, id: BuildingId, damage: u32, source: Option<PlayerId>) {
        let Some(building) = self.planet.building(id) else {
            return;
        };
        let Ok(building_type) = self.catalog.get(&building.type_id) else {
            let detail = format!("{id} has unknown type '{}'", building.type_id);
            self.diagnostics.report(ViolationKind::BuildingCascade, detail);
            return;
        };
        let type_hp = building_type.hitpoints;
        let multiplier = self.player(building.owner).building_hp_multiplier;
        let scaled = scale_building_damage(damage, type_hp, multiplier);
        let kind = building.kind;
        let before = building.hitpoints;
        let after = before.saturating_sub(scaled);

        if let Some(building) = self.planet.building_mut(id) {
            building.hitpoints = after;
        }
        if kind != BuildingKind::Defensive {
            self.planet.request_allocation();
        }
        tracing::trace!(building = %id, before, after, "Building damaged");

        if after == 0 {
            self.destroy_building(id, source);
        } else if crosses_half(before, after, type_hp) {
            let turrets = self
                .guns
                .for_building(id)
                .first()
                .and_then(|g| self.guns.get(*g))
                .map_or(0, |g| g.count);
            let removed = self.guns.remove_last(id, turrets / 2);
            tracing::debug!(building = %id, removed = removed.len(), "Building lost half its turrets");
        }
    }

    /// Remove a building with all its guns.
    fn destroy_building(&mut self, id: BuildingId, source: Option<PlayerId>) {
        self.guns.remove_building(id);
        let Some(building) = self.planet.remove_building(id) else {
            self.diagnostics.report(
                ViolationKind::BuildingCascade,
                format!("{id} vanished during destruction"),
            );
            return;
        };
        let cost = self
            .catalog
            .get(&building.type_id)
            .map_or(0, |t| t.cost);
        self.statistics.building_destroyed(building.owner, source, cost);
        self.planet.rebuild_roads();
        self.spawn_explosion(Explosion::new(ExplosionKind::Large, building.center()));
        self.events.sounds.insert(SoundEvent::BuildingDestroyed);
        self.events.destroyed_buildings.push(id);
        tracing::debug!(building = %id, owner = %building.owner, "Building destroyed");
    }

    /// Bookkeeping for a unit whose hitpoints just reached zero.
    ///
    /// The unit stays in storage until its explosion reaches the half phase.
    pub(crate) fn on_unit_destroyed(&mut self, id: UnitId, source: Option<PlayerId>) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        unit.stop();
        unit.paralyzed = 0;
        let (owner, cost, position) = (unit.owner, unit.model.cost, unit.position);

        self.statistics.unit_destroyed(owner, source, cost);
        self.release_victims(id);
        self.paralysis.remove(&id);
        self.planner.withdraw(id);
        self.minelayers.remove(&id);
        self.spawn_explosion(Explosion::new(ExplosionKind::Destroyed, position).bound_to(id));
        self.events.sounds.insert(SoundEvent::Explosion);
        self.events.destroyed_units.push(id);
        tracing::trace!(unit = %id, %owner, "Unit destroyed");
    }

    /// Paralyze `victim` on behalf of `paralyzer`.
    ///
    /// A paralyzed unit cannot keep its own victims paralyzed.
    pub(crate) fn paralyze(&mut self, victim: UnitId, paralyzer: UnitId, duration: u32) {
        let Some(unit) = self.units.get_mut(victim).filter(|u| u.is_alive()) else {
            return;
        };
        unit.paralyzed = duration;
        unit.fire_phase = 0;
        self.paralysis.insert(victim, paralyzer);
        self.release_victims(victim);
        self.events.sounds.insert(SoundEvent::Paralyze);
    }

    /// End the paralysis of every unit paralyzed by `paralyzer`.
    pub(crate) fn release_victims(&mut self, paralyzer: UnitId) {
        let victims: Vec<UnitId> = self
            .paralysis
            .iter()
            .filter(|(_, by)| **by == paralyzer)
            .map(|(victim, _)| *victim)
            .collect();
        for victim in victims {
            self.paralysis.remove(&victim);
            if let Some(unit) = self.units.get_mut(victim) {
                unit.paralyzed = 0;
            }
        }
    }

    /// Self-destruct a badly damaged kamikaze unit.
    ///
    /// Returns true if the unit detonated.
    pub(crate) fn kamikaze_check(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.units.alive(id) else {
            return false;
        };
        let crate::model::Ability::Kamikaze { multiplier } = unit.model.ability else {
            return false;
        };
        if u64::from(unit.hp) * 10 >= u64::from(unit.model.hp) {
            return false;
        }
        let damage = (Fixed::from_num(unit.model.damage) * multiplier).to_num::<u32>();
        let area = unit.model.area.max(1);
        let (owner, position) = (unit.owner, unit.position);

        if let Some(unit) = self.units.get_mut(id) {
            unit.hp = 0;
        }
        tracing::trace!(unit = %id, damage, area, "Kamikaze detonation");
        self.events.sounds.insert(SoundEvent::Kamikaze);
        self.damage_area(position, damage, area, owner);
        self.on_unit_destroyed(id, None);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_damage_falloff() {
        assert_eq!(area_damage(100, 4, Fixed::ZERO), 100);
        assert_eq!(area_damage(100, 4, Fixed::ONE), 75);
        assert_eq!(area_damage(100, 3, Fixed::ONE), 67);
        assert_eq!(area_damage(100, 4, Fixed::from_num(4)), 0);
        assert_eq!(area_damage(100, 4, Fixed::from_num(5)), 0);
        assert_eq!(area_damage(100, 0, Fixed::ZERO), 0);
    }

    #[test]
    fn test_building_damage_scaling() {
        // No bonus: damage passes through.
        assert_eq!(scale_building_damage(30, 1000, Fixed::ONE), 30);
        // 1.5x hitpoints: 30 * 1000 / 1500 = 20
        assert_eq!(scale_building_damage(30, 1000, Fixed::from_num(1.5)), 20);
        // Floored: 25 * 1000 / 1500 = 16.67
        assert_eq!(scale_building_damage(25, 1000, Fixed::from_num(1.5)), 16);
    }

    #[test]
    fn test_crosses_half() {
        assert!(crosses_half(500, 499, 1000));
        assert!(crosses_half(800, 100, 1000));
        assert!(!crosses_half(499, 300, 1000));
        assert!(!crosses_half(800, 500, 1000));
    }

    #[test]
    fn test_rotate_toward() {
        let step = Some(Fixed::from_num(45));
        let (heading, aligned) = rotate_toward(Fixed::ZERO, Fixed::from_num(90), step);
        assert_eq!(heading, Fixed::from_num(45));
        assert!(!aligned);

        let (heading, aligned) = rotate_toward(heading, Fixed::from_num(90), step);
        assert_eq!(heading, Fixed::from_num(90));
        assert!(aligned);

        // Shortest way round
        let (heading, _) = rotate_toward(Fixed::from_num(10), Fixed::from_num(300), step);
        assert_eq!(heading, Fixed::from_num(325));

        let (heading, aligned) = rotate_toward(Fixed::ZERO, Fixed::from_num(180), None);
        assert_eq!(heading, Fixed::from_num(180));
        assert!(aligned);
    }
}

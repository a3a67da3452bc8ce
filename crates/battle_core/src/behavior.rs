//! Per-unit decision cycle.
//!
//! Each tick a live unit goes through, in order: paralysis countdown,
//! weapon cooldown, self-repair, ability pre-update (minelaying), firing
//! animation, target handling or idle seeking, and finally movement. An
//! earlier stage may end the unit's tick.

use crate::abilities::{behavior_for, AbilityBehavior};
use crate::battle::GroundBattle;
use crate::buildings::BuildingKind;
use crate::combat::rotate_toward;
use crate::effects::{Explosion, ExplosionKind, SoundEvent};
use crate::math::{direction_vector, fixed_sqrt, Fixed, Location, Vec2Fixed};
use crate::pathfinding::DIRECTIONS;
use crate::unit::{AttackTarget, UnitId};

/// What the unit did about its target this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engagement {
    /// In range; rotating or firing. No movement this tick.
    Firing,
    /// Moving or waiting for a path toward the target.
    Approaching,
    /// The target is gone or out of reach; it was dropped.
    Lost,
}

impl GroundBattle {
    /// Run one tick for every unit in id order.
    pub(crate) fn update_units(&mut self) {
        for id in self.units.ids() {
            self.update_unit(id);
        }
    }

    fn update_unit(&mut self, id: UnitId) {
        let Some(unit) = self.units.get_mut(id).filter(|u| u.is_alive()) else {
            return;
        };

        if unit.paralyzed > 0 {
            unit.paralyzed -= 1;
            if unit.paralyzed == 0 {
                self.paralysis.remove(&id);
            }
            return;
        }

        unit.cooldown = unit.cooldown.saturating_sub(1);
        unit.repair();
        let handler = behavior_for(unit.model.ability.tag());

        if handler.pre_update(self, id) {
            return;
        }
        if self.advance_fire_animation(id, handler) {
            return;
        }

        let target = self.units.get(id).and_then(|u| u.target);
        let engagement = match target {
            Some(target) => self.pursue(id, target, handler),
            None => Engagement::Lost,
        };
        match engagement {
            Engagement::Firing => return,
            Engagement::Approaching => {}
            Engagement::Lost => {
                if target.is_some() {
                    handler.on_target_lost(self, id);
                }
                if self.units.alive(id).is_none() {
                    return;
                }
                if let Some(acquired) = self.seek_target(id, handler) {
                    if self.pursue(id, acquired, handler) == Engagement::Firing {
                        return;
                    }
                }
            }
        }

        self.move_along_path(id);
    }

    /// Step the firing animation. Returns true while the unit is firing.
    fn advance_fire_animation(&mut self, id: UnitId, handler: &dyn AbilityBehavior) -> bool {
        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        if unit.fire_phase == 0 {
            return false;
        }
        unit.fire_phase += 1;
        if unit.fire_phase >= unit.model.fire_phases {
            unit.fire_phase = 0;
            self.complete_fire(id, handler);
        }
        true
    }

    fn begin_fire(&mut self, id: UnitId, handler: &dyn AbilityBehavior) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        unit.cooldown = unit.model.delay;
        self.events.sounds.insert(SoundEvent::UnitFire);
        if unit.model.fire_phases <= 1 {
            self.complete_fire(id, handler);
        } else {
            unit.fire_phase = 1;
        }
    }

    /// Deliver the shot, then run the after-fire hooks.
    fn complete_fire(&mut self, id: UnitId, handler: &dyn AbilityBehavior) {
        let Some(target) = self.units.alive(id).and_then(|u| u.target) else {
            return;
        };
        if self.target_is_valid(id, target, handler) {
            handler.resolve_fire(self, id, target);
        }
        handler.after_fire(self, id);
        if self.units.alive(id).is_some() {
            self.get_closer(id);
        }
    }

    /// Where a shot at `target` lands, seen from `from`.
    pub(crate) fn target_point(&self, from: Vec2Fixed, target: AttackTarget) -> Option<Vec2Fixed> {
        match target {
            AttackTarget::Unit(t) => self.units.alive(t).map(|u| u.position),
            AttackTarget::Building(b) => self.planet.building(b).map(|b| b.nearest_point(from)),
        }
    }

    /// Instant weapon damage: area or direct, with an impact explosion.
    pub(crate) fn deal_weapon_damage(&mut self, id: UnitId, target: AttackTarget) {
        let Some(unit) = self.units.alive(id) else {
            return;
        };
        let Some(point) = self.target_point(unit.position, target) else {
            return;
        };
        let (owner, damage, area) = (unit.owner, unit.model.damage, unit.model.area);
        if area > 0 {
            self.damage_area(point, damage, area, owner);
        } else {
            match target {
                AttackTarget::Unit(t) => self.damage_unit(t, damage, Some(owner)),
                AttackTarget::Building(b) => self.damage_building(b, damage, Some(owner)),
            }
        }
        self.spawn_explosion(Explosion::new(ExplosionKind::Small, point));
    }

    fn target_is_valid(&self, id: UnitId, target: AttackTarget, handler: &dyn AbilityBehavior) -> bool {
        let Some(unit) = self.units.alive(id) else {
            return false;
        };
        match target {
            AttackTarget::Unit(t) => self
                .units
                .alive(t)
                .is_some_and(|v| v.owner != unit.owner && handler.accepts_unit_target(v)),
            AttackTarget::Building(b) => self
                .planet
                .building(b)
                .is_some_and(|b| b.owner != unit.owner && !b.is_destroyed()),
        }
    }

    /// Work toward killing `target`: fire if in range, otherwise approach.
    fn pursue(&mut self, id: UnitId, target: AttackTarget, handler: &dyn AbilityBehavior) -> Engagement {
        if !self.target_is_valid(id, target, handler) {
            if let Some(unit) = self.units.get_mut(id) {
                unit.target = None;
            }
            return Engagement::Lost;
        }
        let Some(unit) = self.units.alive(id) else {
            return Engagement::Lost;
        };
        let Some(point) = self.target_point(unit.position, target) else {
            return Engagement::Lost;
        };
        if unit.next_move.is_some() {
            return Engagement::Approaching;
        }

        let distance = unit.position.distance(point);
        let model = unit.model.clone();
        let (busy, guard) = (unit.is_moving() || unit.in_motion_planning, unit.guard);

        if model.in_range(distance) {
            if unit.closing_in && unit.is_moving() {
                return Engagement::Approaching;
            }
            let bearing = unit.position.bearing_to(point);
            let was_planning = unit.in_motion_planning;
            if was_planning {
                self.cancel_path_request(id);
            }
            let Some(unit) = self.units.get_mut(id) else {
                return Engagement::Lost;
            };
            unit.path.clear();
            unit.goal = None;
            unit.closing_in = false;
            let (heading, aligned) = rotate_toward(unit.heading, bearing, model.rotation_step());
            unit.heading = heading;
            if aligned && unit.cooldown == 0 {
                self.begin_fire(id, handler);
            }
            return Engagement::Firing;
        }

        if guard {
            if let Some(unit) = self.units.get_mut(id) {
                unit.target = None;
            }
            return Engagement::Lost;
        }
        if busy {
            return Engagement::Approaching;
        }

        if distance < model.min_range {
            let angle = Fixed::from_num(self.rng_angle());
            let reach = model.min_range + fixed_sqrt(Fixed::from_num(2));
            let escape = point + direction_vector(angle).scale(reach);
            tracing::trace!(unit = %id, ?escape, "Leaving the dead zone");
            self.request_path(id, escape.nearest_cell(), None);
        } else {
            let (goal, ignore) = match target {
                AttackTarget::Unit(t) => {
                    let victim = self.units.get(t).map(|v| (v.cell(), v.owner));
                    match victim {
                        Some((cell, owner)) => (cell, Some(owner)),
                        None => return Engagement::Lost,
                    }
                }
                AttackTarget::Building(_) => (point.nearest_cell(), None),
            };
            self.request_path(id, goal, ignore);
        }
        Engagement::Approaching
    }

    fn rng_angle(&mut self) -> u32 {
        use rand::Rng;
        self.rng.gen_range(0..360)
    }

    /// Pick a new target while idle. Returns the acquired target.
    fn seek_target(&mut self, id: UnitId, handler: &dyn AbilityBehavior) -> Option<AttackTarget> {
        let unit = self.units.alive(id)?;
        let auto_acquire =
            unit.guard || self.config.direct_attack_units.contains(&unit.model.id);

        if let Some(destination) = unit.attack_move {
            let arrived = unit.cell() == destination && !unit.is_moving();
            let busy = unit.is_moving() || unit.in_motion_planning;
            if let Some(target) = self.acquire_target(id, handler) {
                if let Some(unit) = self.units.get_mut(id) {
                    unit.target = Some(target);
                }
                return Some(target);
            }
            if arrived {
                if let Some(unit) = self.units.get_mut(id) {
                    unit.attack_move = None;
                }
            } else if !busy {
                self.request_path(id, destination, None);
            }
            return None;
        }

        if auto_acquire {
            let target = self.acquire_target(id, handler)?;
            if let Some(unit) = self.units.get_mut(id) {
                unit.target = Some(target);
            }
            tracing::trace!(unit = %id, ?target, "Target acquired");
            return Some(target);
        }
        None
    }

    /// Nearest enemy unit in range, else nearest enemy defensive building in
    /// range.
    fn acquire_target(&self, id: UnitId, handler: &dyn AbilityBehavior) -> Option<AttackTarget> {
        let unit = self.units.alive(id)?;
        let (owner, position, model) = (unit.owner, unit.position, &unit.model);

        let nearest_unit = self.nearest_enemy_unit(owner, |v| {
            let distance = position.distance(v.position);
            (model.in_range(distance) && handler.accepts_unit_target(v)).then_some(distance)
        });
        if let Some(target) = nearest_unit {
            return Some(AttackTarget::Unit(target));
        }

        self.planet
            .buildings()
            .filter(|b| b.owner != owner && b.kind == BuildingKind::Defensive && !b.is_destroyed())
            .filter_map(|b| {
                let distance = b.distance_to(position);
                model.in_range(distance).then_some((distance, b.id))
            })
            .min()
            .map(|(_, b)| AttackTarget::Building(b))
    }

    /// Creep one cell closer to the target after firing.
    fn get_closer(&mut self, id: UnitId) {
        let Some(unit) = self.units.alive(id) else {
            return;
        };
        if !self.config.get_closer_units.contains(&unit.model.id)
            || unit.guard
            || unit.attack_move.is_some()
            || unit.is_moving()
            || unit.in_motion_planning
        {
            return;
        }
        let Some(point) = unit.target.and_then(|t| self.target_point(unit.position, t)) else {
            return;
        };
        let here = unit.cell();
        let current = unit.position.distance(point);

        let best = DIRECTIONS
            .iter()
            .map(|&(dx, dy)| here.offset(dx, dy))
            .filter(|cell| self.can_step_into(id, here, *cell))
            .map(|cell| (cell.center().distance(point), cell))
            .filter(|(distance, _)| *distance < current)
            .min_by_key(|(distance, _)| *distance);

        if let Some((_, cell)) = best {
            if let Some(unit) = self.units.get_mut(id) {
                unit.path.push_back(cell);
                unit.goal = Some(cell);
                unit.closing_in = true;
            }
        }
    }

    /// Whether `id` standing on `from` may step straight into `cell`.
    pub(crate) fn can_step_into(&self, id: UnitId, from: Location, cell: Location) -> bool {
        let free = |c: Location| self.is_passable(c, None) && !self.index.is_occupied_by_other(c, id);
        if !free(cell) {
            return false;
        }
        let (dx, dy) = (cell.x - from.x, cell.y - from.y);
        dx == 0 || dy == 0 || (free(from.offset(dx, 0)) && free(from.offset(0, dy)))
    }
}

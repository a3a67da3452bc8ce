//! Waypoint following, yielding and replanning.
//!
//! A unit turns toward the next cell before it moves. Each tick it covers
//! `tick_ms / speed / 28` cells; distance left over after reaching a cell
//! carries into the next one only when no turn is needed. A unit whose next
//! cell holds another unit waits a random number of ticks and then asks for
//! a fresh path to its goal.

use crate::battle::GroundBattle;
use crate::combat::rotate_toward;
use crate::math::Fixed;
use crate::unit::UnitId;

impl GroundBattle {
    /// Advance a unit along its path.
    pub(crate) fn move_along_path(&mut self, id: UnitId) {
        let Some(unit) = self.units.alive(id) else {
            return;
        };
        let mut budget = unit.model.movement_per_tick();
        if budget == Fixed::ZERO {
            return;
        }
        let rotation_step = unit.model.rotation_step();

        loop {
            let Some(unit) = self.units.get(id) else {
                return;
            };
            let next = match unit.next_move {
                Some(next) => next,
                None => {
                    let Some(&next) = unit.path.front() else {
                        return;
                    };
                    if next != unit.cell() && self.index.is_occupied_by_other(next, id) {
                        self.yield_step(id);
                        return;
                    }
                    let Some(unit) = self.units.get_mut(id) else {
                        return;
                    };
                    unit.path.pop_front();
                    unit.yield_ttl = 0;
                    unit.next_move = Some(next);
                    unit.next_rotate = Some(unit.position.bearing_to(next.center()));
                    next
                }
            };

            let Some(unit) = self.units.get_mut(id) else {
                return;
            };
            let destination = next.center();
            if unit.position == destination {
                unit.next_move = None;
                unit.next_rotate = None;
                continue;
            }

            let bearing = unit.next_rotate.unwrap_or_else(|| unit.position.bearing_to(destination));
            if unit.heading != bearing {
                let (heading, aligned) = rotate_toward(unit.heading, bearing, rotation_step);
                unit.heading = heading;
                if rotation_step.is_some() || !aligned {
                    return;
                }
            }

            let remaining = unit.position.distance(destination);
            if remaining > budget {
                let step = (destination - unit.position).normalize().scale(budget);
                self.update_unit_location(id, step, true);
                return;
            }

            budget -= remaining;
            self.update_unit_location(id, destination, false);
            let Some(unit) = self.units.get_mut(id) else {
                return;
            };
            unit.next_move = None;
            unit.next_rotate = None;
            let heading = unit.heading;
            let next_waypoint = unit.path.front().copied();
            if next_waypoint.is_none() {
                unit.goal = None;
                unit.closing_in = false;
            }

            self.trigger_mine(id);
            if self.units.alive(id).is_none() {
                return;
            }

            match next_waypoint {
                Some(cell)
                    if budget > Fixed::ZERO && destination.bearing_to(cell.center()) == heading => {}
                _ => return,
            }
        }
    }

    /// The next cell is taken: wait, and replan once the wait runs out.
    fn yield_step(&mut self, id: UnitId) {
        let Some(waiting) = self.units.get(id).map(|u| u.yield_ttl) else {
            return;
        };
        if waiting == 0 {
            let ttl = self.roll_yield_ttl();
            if let Some(unit) = self.units.get_mut(id) {
                unit.yield_ttl = ttl;
            }
            tracing::trace!(unit = %id, ttl, "Yielding");
            return;
        }

        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        unit.yield_ttl -= 1;
        if unit.yield_ttl > 0 {
            return;
        }
        let goal = unit.goal.or_else(|| unit.path.back().copied());
        unit.clear_path();
        if let Some(goal) = goal {
            tracing::trace!(unit = %id, ?goal, "Yield expired, replanning");
            self.request_path(id, goal, None);
        }
    }
}

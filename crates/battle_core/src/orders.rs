//! Orders issued by players and AI controllers.
//!
//! Every order replaces the unit's previous one and withdraws any path
//! request still waiting in the queue.

use crate::battle::GroundBattle;
use crate::buildings::BuildingId;
use crate::error::{BattleError, Result, ViolationKind};
use crate::math::Location;
use crate::model::Ability;
use crate::unit::{AttackTarget, UnitId};

impl GroundBattle {
    /// Check that `id` names a live unit and reset its orders.
    fn prepare_order(&mut self, id: UnitId) -> Result<()> {
        if self.units.alive(id).is_none() {
            return Err(BattleError::UnknownUnit(id));
        }
        self.cancel_path_request(id);
        self.minelayers.remove(&id);
        if let Some(unit) = self.units.get_mut(id) {
            unit.stop();
        }
        Ok(())
    }

    /// Move to `destination`.
    pub fn order_move(&mut self, id: UnitId, destination: Location) -> Result<()> {
        self.prepare_order(id)?;
        self.request_path(id, destination, None);
        Ok(())
    }

    /// Attack an enemy unit.
    pub fn order_attack_unit(&mut self, id: UnitId, target: UnitId) -> Result<()> {
        let owner = self
            .units
            .alive(id)
            .map(|u| u.owner)
            .ok_or(BattleError::UnknownUnit(id))?;
        let victim = self
            .units
            .alive(target)
            .ok_or(BattleError::UnknownUnit(target))?;
        if victim.owner == owner {
            self.diagnostics.report(
                ViolationKind::InvalidTarget,
                format!("{id} ordered to attack friendly {target}"),
            );
            return Ok(());
        }
        self.prepare_order(id)?;
        if let Some(unit) = self.units.get_mut(id) {
            unit.target = Some(AttackTarget::Unit(target));
        }
        Ok(())
    }

    /// Attack an enemy building.
    pub fn order_attack_building(&mut self, id: UnitId, target: BuildingId) -> Result<()> {
        let owner = self
            .units
            .alive(id)
            .map(|u| u.owner)
            .ok_or(BattleError::UnknownUnit(id))?;
        let building = self
            .planet
            .building(target)
            .ok_or(BattleError::UnknownBuilding(target))?;
        if building.owner == owner {
            self.diagnostics.report(
                ViolationKind::InvalidTarget,
                format!("{id} ordered to attack friendly {target}"),
            );
            return Ok(());
        }
        self.prepare_order(id)?;
        if let Some(unit) = self.units.get_mut(id) {
            unit.target = Some(AttackTarget::Building(target));
        }
        Ok(())
    }

    /// Move to `destination`, engaging anything in range on the way.
    pub fn order_attack_move(&mut self, id: UnitId, destination: Location) -> Result<()> {
        self.prepare_order(id)?;
        if let Some(unit) = self.units.get_mut(id) {
            unit.attack_move = Some(destination);
        }
        self.request_path(id, destination, None);
        Ok(())
    }

    /// Drop all orders.
    pub fn order_stop(&mut self, id: UnitId) -> Result<()> {
        self.prepare_order(id)
    }

    /// Hold position and shoot whatever comes in range.
    pub fn order_guard(&mut self, id: UnitId) -> Result<()> {
        self.prepare_order(id)?;
        if let Some(unit) = self.units.get_mut(id) {
            unit.guard = true;
        }
        Ok(())
    }

    /// Drive to `location` and plant a mine there.
    pub fn order_lay_mine(&mut self, id: UnitId, location: Location) -> Result<()> {
        let is_layer = self
            .units
            .alive(id)
            .map(|u| matches!(u.model.ability, Ability::Minelayer { .. }))
            .ok_or(BattleError::UnknownUnit(id))?;
        if !is_layer {
            return Err(BattleError::InvalidState(format!("{id} cannot lay mines")));
        }
        self.prepare_order(id)?;
        self.minelayers.insert(id);
        let here = self.units.get(id).map(crate::unit::Unit::cell);
        if here != Some(location) {
            self.request_path(id, location, None);
        }
        Ok(())
    }

    /// Add or remove a unit from the selection.
    pub fn select(&mut self, id: UnitId, selected: bool) -> Result<()> {
        let unit = self.units.get_mut(id).ok_or(BattleError::UnknownUnit(id))?;
        unit.selected = selected;
        if selected {
            self.selection.insert(id);
        } else {
            self.selection.remove(&id);
        }
        Ok(())
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        for id in std::mem::take(&mut self.selection) {
            if let Some(unit) = self.units.get_mut(id) {
                unit.selected = false;
            }
        }
    }

    /// Selected unit ids in order.
    pub fn selection(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.selection.iter().copied()
    }
}

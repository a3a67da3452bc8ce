//! Ground units and their storage.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buildings::BuildingId;
use crate::math::{fixed_serde, Fixed, Location, Vec2Fixed};
use crate::model::UnitModel;
use crate::player::PlayerId;

/// Identifier of a ground unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// What a unit is attacking. A unit has at most one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackTarget {
    /// An enemy ground unit.
    Unit(UnitId),
    /// An enemy building.
    Building(BuildingId),
}

/// A ground unit taking part in the battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Unique id.
    pub id: UnitId,
    /// Owning player.
    pub owner: PlayerId,
    /// Shared read-only stats.
    pub model: Arc<UnitModel>,
    /// Position in cells.
    pub position: Vec2Fixed,
    /// Heading in degrees.
    #[serde(with = "fixed_serde")]
    pub heading: Fixed,
    /// Current hitpoints. Zero means destroyed.
    pub hp: u32,
    /// Remaining waypoints (cell centers).
    pub path: VecDeque<Location>,
    /// The cell currently being entered.
    pub next_move: Option<Location>,
    /// Heading the unit is turning toward before it moves.
    #[serde(with = "fixed_serde::option")]
    pub next_rotate: Option<Fixed>,
    /// Ticks until the weapon is ready.
    pub cooldown: u32,
    /// Firing animation phase; zero when not firing.
    pub fire_phase: u32,
    /// Remaining paralysis ticks.
    pub paralyzed: u32,
    /// Remaining ticks of waiting for a blocked cell.
    pub yield_ttl: u32,
    /// Current attack target.
    pub target: Option<AttackTarget>,
    /// Destination of an attack-move order.
    pub attack_move: Option<Location>,
    /// Guarding units hold position and never chase.
    pub guard: bool,
    /// Selected by the local player.
    pub selected: bool,
    /// A path request is queued or running.
    pub in_motion_planning: bool,
    /// Goal of the current path.
    pub goal: Option<Location>,
    /// The path is a single get-closer step taken while in range.
    #[serde(default)]
    pub closing_in: bool,
    /// Minelaying animation phase.
    pub lay_phase: u32,
}

impl Unit {
    /// Create a unit at full health standing on `cell`.
    #[must_use]
    pub fn new(id: UnitId, owner: PlayerId, model: Arc<UnitModel>, cell: Location) -> Self {
        let hp = model.hp;
        Self {
            id,
            owner,
            model,
            position: cell.center(),
            heading: Fixed::ZERO,
            hp,
            path: VecDeque::new(),
            next_move: None,
            next_rotate: None,
            cooldown: 0,
            fire_phase: 0,
            paralyzed: 0,
            yield_ttl: 0,
            target: None,
            attack_move: None,
            guard: false,
            selected: false,
            in_motion_planning: false,
            goal: None,
            closing_in: false,
            lay_phase: 0,
        }
    }

    /// Builder method to set the heading.
    #[must_use]
    pub fn with_heading(mut self, heading: Fixed) -> Self {
        self.heading = heading;
        self
    }

    /// True once hitpoints reach zero.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.hp == 0
    }

    /// True if alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// The cell used for pathfinding occupancy.
    #[must_use]
    pub fn cell(&self) -> Location {
        self.position.nearest_cell()
    }

    /// True if the unit has somewhere to go.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.next_move.is_some() || !self.path.is_empty()
    }

    /// Whether this unit may be walked through by a path search.
    ///
    /// Units about to move away, units waiting for a path and units of the
    /// ignored player do not block.
    #[must_use]
    pub fn is_non_blocking(&self, half_yield: u32, ignore: Option<PlayerId>) -> bool {
        (!self.path.is_empty() && self.yield_ttl < half_yield)
            || self.in_motion_planning
            || ignore == Some(self.owner)
    }

    /// Drop the current path and any partial move.
    pub fn clear_path(&mut self) {
        self.path.clear();
        self.next_move = None;
        self.next_rotate = None;
        self.yield_ttl = 0;
        self.goal = None;
        self.closing_in = false;
    }

    /// Forget all orders.
    pub fn stop(&mut self) {
        self.clear_path();
        self.target = None;
        self.attack_move = None;
        self.guard = false;
        self.in_motion_planning = false;
        self.lay_phase = 0;
    }

    /// Regain self-repair hitpoints, capped at the model maximum.
    pub fn repair(&mut self) {
        if self.model.self_repair > 0 && self.is_alive() {
            self.hp = (self.hp + self.model.self_repair).min(self.model.hp);
        }
    }

    /// Subtract damage. Returns true if this hit destroyed the unit.
    pub fn take_damage(&mut self, damage: u32) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.hp = self.hp.saturating_sub(damage);
        self.is_destroyed()
    }
}

/// Storage for units with deterministic, id-ordered iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStorage {
    units: BTreeMap<UnitId, Unit>,
    next_id: u32,
}

impl Default for UnitStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Reserve the next id.
    pub fn allocate_id(&mut self) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a unit under its own id.
    pub fn insert(&mut self, unit: Unit) {
        self.units.insert(unit.id, unit);
    }

    /// Remove a unit by id.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Get a unit only if it is still alive.
    #[must_use]
    pub fn alive(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id).filter(|u| u.is_alive())
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Get the number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Iterate units in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Iterate units mutably in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Arc<UnitModel> {
        let mut model = UnitModel::new("tank", 100, 10, Fixed::from_num(3));
        model.self_repair = 4;
        Arc::new(model)
    }

    #[test]
    fn test_repair_caps_at_model_hp() {
        let mut unit = Unit::new(UnitId(1), PlayerId(1), model(), Location::new(0, 0));
        unit.hp = 98;
        unit.repair();
        assert_eq!(unit.hp, 100);
    }

    #[test]
    fn test_take_damage_reports_destruction_once() {
        let mut unit = Unit::new(UnitId(1), PlayerId(1), model(), Location::new(0, 0));
        assert!(!unit.take_damage(60));
        assert!(unit.take_damage(60));
        assert_eq!(unit.hp, 0);
        assert!(!unit.take_damage(10));
    }

    #[test]
    fn test_default_storage_never_hands_out_id_zero() {
        let mut storage = UnitStorage::default();
        assert_eq!(storage.allocate_id(), UnitId(1));
        assert_eq!(storage.allocate_id(), UnitId(2));
    }

    #[test]
    fn test_pending_turn_survives_encoding() {
        let mut unit = Unit::new(UnitId(3), PlayerId(1), model(), Location::new(2, 2));
        unit.next_move = Some(Location::new(3, 3));
        unit.next_rotate = Some(Fixed::from_num(45.5));
        let bytes = bincode::serialize(&unit).unwrap();
        let decoded: Unit = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.next_rotate, Some(Fixed::from_num(45.5)));
        assert_eq!(decoded.heading, unit.heading);

        unit.next_rotate = None;
        let bytes = bincode::serialize(&unit).unwrap();
        let decoded: Unit = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.next_rotate, None);
    }

    #[test]
    fn test_non_blocking_rules() {
        let mut unit = Unit::new(UnitId(1), PlayerId(1), model(), Location::new(0, 0));
        assert!(!unit.is_non_blocking(5, None));
        assert!(unit.is_non_blocking(5, Some(PlayerId(1))));

        unit.path.push_back(Location::new(1, 0));
        assert!(unit.is_non_blocking(5, None));
        unit.yield_ttl = 7;
        assert!(!unit.is_non_blocking(5, None));

        unit.in_motion_planning = true;
        assert!(unit.is_non_blocking(5, None));
    }

    #[test]
    fn test_storage_ids_are_ordered() {
        let mut storage = UnitStorage::new();
        let a = storage.allocate_id();
        let b = storage.allocate_id();
        storage.insert(Unit::new(b, PlayerId(1), model(), Location::new(1, 0)));
        storage.insert(Unit::new(a, PlayerId(1), model(), Location::new(0, 0)));
        assert_eq!(storage.ids(), vec![UnitId(1), UnitId(2)]);
        assert!(storage.alive(a).is_some());

        storage.get_mut(a).unwrap().hp = 0;
        assert!(storage.alive(a).is_none());
        assert!(storage.contains(a));
    }
}

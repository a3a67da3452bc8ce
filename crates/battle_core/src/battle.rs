//! The ground battle aggregate.
//!
//! [`GroundBattle`] owns every piece of battle state: units, guns, mines,
//! rockets, explosions, both spatial indices, the paralysis relation, the
//! path planner, statistics and diagnostics. Behavior is spread over the
//! modules that extend it (`behavior`, `movement`, `combat`, `turrets`,
//! `effects`, `orders`); this module holds construction, the shared
//! helpers and the battle lifecycle.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::buildings::{Building, BuildingCatalog, BuildingKind};
use crate::config::BattleConfig;
use crate::effects::{Explosion, Mine, Rocket};
use crate::error::{BattleError, Diagnostics, Result, ViolationKind};
use crate::math::{Fixed, Location, Vec2Fixed};
use crate::model::UnitRoster;
use crate::planet::Planet;
use crate::planner::{PathPlanner, PathRequest, Passability};
use crate::player::{Player, PlayerId, StatisticsLedger};
use crate::simulation::TickEvents;
use crate::spatial::SpatialIndex;
use crate::turrets::{Gun, GunStorage};
use crate::unit::{Unit, UnitId, UnitStorage};

/// Final result of a concluded battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// Winning player.
    pub winner: PlayerId,
    /// Losing player.
    pub loser: PlayerId,
    /// True if the attacker took the planet.
    pub conquered: bool,
    /// Live units left on the winning side.
    pub survivors: usize,
    /// Tick on which the battle concluded.
    pub tick: u64,
}

/// Serializable records of a battle in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSnapshot {
    /// Current tick.
    pub tick: u64,
    /// All units, including destroyed ones awaiting removal.
    pub units: UnitStorage,
    /// All guns.
    pub guns: Vec<Gun>,
    /// Buildings on the planet.
    pub buildings: Vec<Building>,
    /// Planted mines.
    pub mines: Vec<Mine>,
    /// Rockets in flight.
    pub rockets: Vec<Rocket>,
    /// Running explosions.
    pub explosions: Vec<Explosion>,
    /// Paralysis relation as (victim, paralyzer).
    pub paralysis: Vec<(UnitId, UnitId)>,
    /// Statistics so far.
    pub statistics: StatisticsLedger,
    /// Winner, once decided.
    pub winner: Option<PlayerId>,
}

impl BattleSnapshot {
    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A tactical battle for one planet.
#[derive(Debug)]
pub struct GroundBattle {
    pub(crate) config: BattleConfig,
    pub(crate) planet: Planet,
    pub(crate) catalog: BuildingCatalog,
    pub(crate) roster: UnitRoster,
    pub(crate) attacker: Player,
    pub(crate) defender: Player,
    pub(crate) units: UnitStorage,
    pub(crate) guns: GunStorage,
    pub(crate) explosions: Vec<Explosion>,
    pub(crate) rockets: Vec<Rocket>,
    pub(crate) mines: BTreeMap<Location, Mine>,
    pub(crate) minelayers: BTreeSet<UnitId>,
    pub(crate) selection: BTreeSet<UnitId>,
    pub(crate) index: SpatialIndex,
    /// Victim → paralyzer.
    pub(crate) paralysis: BTreeMap<UnitId, UnitId>,
    pub(crate) planner: PathPlanner,
    pub(crate) statistics: StatisticsLedger,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) events: TickEvents,
    pub(crate) rng: StdRng,
    pub(crate) tick: u64,
    pub(crate) winner: Option<PlayerId>,
    pub(crate) outcome: Option<BattleOutcome>,
}

impl GroundBattle {
    /// Set up a battle on `planet`, defended by the planet owner.
    ///
    /// Every complete building with turret definitions for its owner's race
    /// gets its guns; buildings already below half hitpoints start with the
    /// later half of their turrets missing.
    pub fn new(
        config: BattleConfig,
        planet: Planet,
        catalog: BuildingCatalog,
        roster: UnitRoster,
        attacker: Player,
        defender: Player,
    ) -> Result<Self> {
        if planet.owner() != defender.id {
            return Err(BattleError::InvalidState(format!(
                "planet {} is owned by {}, not the defender {}",
                planet.name(),
                planet.owner(),
                defender.id
            )));
        }
        let planner = PathPlanner::new(&config)?;
        let rng = StdRng::seed_from_u64(config.seed);
        let mut battle = Self {
            config,
            planet,
            catalog,
            roster,
            attacker,
            defender,
            units: UnitStorage::new(),
            guns: GunStorage::new(),
            explosions: Vec::new(),
            rockets: Vec::new(),
            mines: BTreeMap::new(),
            minelayers: BTreeSet::new(),
            selection: BTreeSet::new(),
            index: SpatialIndex::new(),
            paralysis: BTreeMap::new(),
            planner,
            statistics: StatisticsLedger::new(),
            diagnostics: Diagnostics::new(),
            events: TickEvents::default(),
            rng,
            tick: 0,
            winner: None,
            outcome: None,
        };
        battle.mount_guns()?;
        tracing::info!(
            planet = %battle.planet.name(),
            attacker = %battle.attacker.id,
            defender = %battle.defender.id,
            guns = battle.guns.len(),
            "Ground battle started"
        );
        Ok(battle)
    }

    fn mount_guns(&mut self) -> Result<()> {
        let buildings: Vec<(crate::buildings::BuildingId, PlayerId, String, u32)> = self
            .planet
            .buildings()
            .filter(|b| b.complete)
            .map(|b| (b.id, b.owner, b.type_id.clone(), b.hitpoints))
            .collect();
        for (id, owner, type_id, hitpoints) in buildings {
            let building_type = self.catalog.get(&type_id)?;
            let race = self.player(owner).race.clone();
            let turrets = building_type.turrets_for(&race);
            if turrets.is_empty() {
                continue;
            }
            let type_hp = building_type.hitpoints;
            let count = turrets.len();
            self.guns.mount(id, owner, turrets);
            if u64::from(hitpoints) * 2 < u64::from(type_hp) {
                self.guns.remove_last(id, count / 2);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Battle configuration.
    #[must_use]
    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// The contested planet.
    #[must_use]
    pub fn planet(&self) -> &Planet {
        &self.planet
    }

    /// Mutable planet access for the strategic layer (energy ratios etc.).
    pub fn planet_mut(&mut self) -> &mut Planet {
        &mut self.planet
    }

    /// Building types.
    #[must_use]
    pub fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    /// Unit models.
    #[must_use]
    pub fn roster(&self) -> &UnitRoster {
        &self.roster
    }

    /// The attacking player.
    #[must_use]
    pub fn attacker(&self) -> &Player {
        &self.attacker
    }

    /// The defending player.
    #[must_use]
    pub fn defender(&self) -> &Player {
        &self.defender
    }

    /// Player record by id. Unknown ids resolve to the defender.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> &Player {
        if id == self.attacker.id {
            &self.attacker
        } else {
            &self.defender
        }
    }

    /// The other side.
    #[must_use]
    pub fn opponent_of(&self, id: PlayerId) -> PlayerId {
        if id == self.attacker.id {
            self.defender.id
        } else {
            self.attacker.id
        }
    }

    /// All units.
    #[must_use]
    pub fn units(&self) -> &UnitStorage {
        &self.units
    }

    /// A unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// All guns.
    #[must_use]
    pub fn guns(&self) -> &GunStorage {
        &self.guns
    }

    /// Running explosions.
    #[must_use]
    pub fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    /// Rockets in flight.
    #[must_use]
    pub fn rockets(&self) -> &[Rocket] {
        &self.rockets
    }

    /// Launch a rocket.
    pub fn add_rocket(&mut self, rocket: Rocket) {
        self.rockets.push(rocket);
    }

    /// Planted mines.
    pub fn mines(&self) -> impl Iterator<Item = &Mine> {
        self.mines.values()
    }

    /// Plant a mine. Returns false if the cell already holds one.
    pub fn place_mine(&mut self, mine: Mine) -> bool {
        if self.mines.contains_key(&mine.location) {
            return false;
        }
        self.mines.insert(mine.location, mine);
        true
    }

    /// Units ordered to lay a mine.
    #[must_use]
    pub fn minelayers(&self) -> &BTreeSet<UnitId> {
        &self.minelayers
    }

    /// The paralyzer of `victim`, if it is paralyzed.
    #[must_use]
    pub fn paralyzer_of(&self, victim: UnitId) -> Option<UnitId> {
        self.paralysis.get(&victim).copied()
    }

    /// Spatial indices.
    #[must_use]
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Path planner state.
    #[must_use]
    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    /// Statistics counters.
    #[must_use]
    pub fn statistics(&self) -> &StatisticsLedger {
        &self.statistics
    }

    /// Recorded invariant violations.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Current tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The winner, once one side has no combat strength left.
    #[must_use]
    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// The outcome, once the battle concluded.
    #[must_use]
    pub fn outcome(&self) -> Option<&BattleOutcome> {
        self.outcome.as_ref()
    }

    /// True once the battle concluded.
    #[must_use]
    pub fn is_concluded(&self) -> bool {
        self.outcome.is_some()
    }

    /// Live units of one player.
    pub fn live_units_of(&self, owner: PlayerId) -> impl Iterator<Item = &Unit> {
        self.units
            .iter()
            .filter(move |u| u.is_alive() && u.owner == owner)
    }

    // ------------------------------------------------------------------
    // Spatial index maintenance
    // ------------------------------------------------------------------

    /// Insert a unit into storage and both indices.
    pub fn add_unit(&mut self, unit: Unit) {
        self.index.add(unit.id, unit.position);
        self.units.insert(unit);
    }

    /// Remove a unit from every collection.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.units.remove(id)?;
        if !self.index.remove(id, unit.position) {
            self.diagnostics.report(
                ViolationKind::SpatialIndex,
                format!("{id} missing from its bucket at removal"),
            );
        }
        self.selection.remove(&id);
        self.minelayers.remove(&id);
        self.release_victims(id);
        self.paralysis.remove(&id);
        self.planner.withdraw(id);
        Some(unit)
    }

    /// Move a unit, keeping both indices consistent.
    ///
    /// With `relative` the delta is added to the current position, otherwise
    /// it is the new position.
    pub fn update_unit_location(&mut self, id: UnitId, delta: Vec2Fixed, relative: bool) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        let from = unit.position;
        let to = if relative { from + delta } else { delta };
        unit.position = to;
        if !self.index.relocate(id, from, to) {
            self.diagnostics.report(
                ViolationKind::SpatialIndex,
                format!("{id} missing from its bucket while moving"),
            );
        }
    }

    /// Whether `cell` can be entered, treating units of `ignore` as absent.
    #[must_use]
    pub fn is_passable(&self, cell: Location, ignore: Option<PlayerId>) -> bool {
        self.passability().is_passable(cell, ignore)
    }

    pub(crate) fn passability(&self) -> Passability<'_> {
        Passability::new(
            &self.planet,
            &self.index,
            &self.units,
            self.config.half_yield(),
        )
    }

    /// First free cell in a square spiral around `near`.
    #[must_use]
    pub fn find_free_cell(&self, near: Location) -> Option<Location> {
        let radius = self.config.deployment_radius as i32;
        (0..=radius).find_map(|r| {
            ring(near, r).find(|cell| {
                self.planet.can_place_building(*cell) && self.index.units_at(*cell).is_none()
            })
        })
    }

    /// Place a new unit of `model_id` on the free cell nearest to `near`.
    ///
    /// Returns `Ok(None)` when no free cell exists within the deployment
    /// radius.
    pub fn deploy(
        &mut self,
        owner: PlayerId,
        model_id: &str,
        near: Location,
    ) -> Result<Option<UnitId>> {
        let model = self.roster.get(model_id)?;
        let Some(cell) = self.find_free_cell(near) else {
            tracing::debug!(%owner, model = model_id, ?near, "No free deployment cell");
            return Ok(None);
        };
        let id = self.units.allocate_id();
        let heading = if owner == self.attacker.id {
            Fixed::ZERO
        } else {
            crate::math::HALF_TURN
        };
        self.add_unit(Unit::new(id, owner, model, cell).with_heading(heading));
        tracing::trace!(unit = %id, %owner, model = model_id, ?cell, "Unit deployed");
        Ok(Some(id))
    }

    // ------------------------------------------------------------------
    // Path planning
    // ------------------------------------------------------------------

    /// Queue a path search for `id` from its cell to `goal`.
    pub(crate) fn request_path(&mut self, id: UnitId, goal: Location, ignore: Option<PlayerId>) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if unit.in_motion_planning {
            self.planner.withdraw(id);
        }
        unit.in_motion_planning = true;
        unit.goal = Some(goal);
        unit.closing_in = false;
        let request = PathRequest {
            unit: id,
            from: unit.cell(),
            goal,
            ignore,
        };
        self.planner.enqueue(request, &mut self.diagnostics);
    }

    /// Cancel a queued path search.
    pub(crate) fn cancel_path_request(&mut self, id: UnitId) {
        self.planner.withdraw(id);
        if let Some(unit) = self.units.get_mut(id) {
            unit.in_motion_planning = false;
        }
    }

    /// Search the next batch of paths and hand them to their units.
    pub(crate) fn run_path_batch(&mut self) {
        if self.planner.is_empty() {
            return;
        }
        let view = Passability::new(
            &self.planet,
            &self.index,
            &self.units,
            self.config.half_yield(),
        );
        let results = self.planner.run_batch(&view);
        for result in results {
            let request = result.request;
            let Some(unit) = self.units.get_mut(request.unit).filter(|u| u.is_alive()) else {
                tracing::trace!(unit = %request.unit, "Discarding path for a removed unit");
                continue;
            };
            unit.path.extend(result.cells.into_iter().skip(1));
            unit.in_motion_planning = false;
            unit.yield_ttl = 0;
            unit.goal = Some(request.goal);
        }
    }

    /// Random yield countdown in `[Y/2, 3Y/2)`.
    pub(crate) fn roll_yield_ttl(&mut self) -> u32 {
        let low = self.config.half_yield().max(1);
        let high = (self.config.yield_ttl * 3 / 2).max(low + 1);
        self.rng.gen_range(low..high)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Units plus complete defensive buildings of one side that still count.
    #[must_use]
    pub fn combat_strength(&self, side: PlayerId) -> usize {
        let units = self
            .live_units_of(side)
            .filter(|u| !self.config.non_combat_units.contains(&u.model.id))
            .count();
        let buildings = self
            .planet
            .buildings()
            .filter(|b| {
                b.owner == side
                    && b.kind == BuildingKind::Defensive
                    && b.complete
                    && !b.is_destroyed()
            })
            .count();
        units + buildings
    }

    /// Decide the winner if one side ran out of combat strength.
    pub(crate) fn check_winner(&mut self) {
        if self.winner.is_some() {
            return;
        }
        let attacker = self.combat_strength(self.attacker.id);
        let defender = self.combat_strength(self.defender.id);
        let winner = if attacker == 0 {
            Some(self.defender.id)
        } else if defender == 0 {
            Some(self.attacker.id)
        } else {
            None
        };
        if let Some(winner) = winner {
            tracing::info!(tick = self.tick, %winner, attacker, defender, "Battle decided");
            self.winner = Some(winner);
            self.events.winner = Some(winner);
        }
    }

    /// Halt every unit and drop all queued path requests.
    pub(crate) fn stop_all_units(&mut self) {
        for id in self.units.ids() {
            self.planner.withdraw(id);
            if let Some(unit) = self.units.get_mut(id) {
                unit.stop();
            }
        }
        self.minelayers.clear();
    }

    /// Wrap up once the winner is known and no effects are pending.
    pub(crate) fn try_conclude(&mut self) {
        let Some(winner) = self.winner else {
            return;
        };
        if self.outcome.is_some() || !self.explosions.is_empty() || !self.rockets.is_empty() {
            return;
        }
        let loser = self.opponent_of(winner);
        let conquered = winner == self.attacker.id;
        if conquered {
            self.planet.transfer_ownership(winner);
            let removed = self.planet.remove_incomplete_buildings();
            tracing::debug!(removed = removed.len(), "Incomplete buildings cleared");
        }
        self.planet.rebuild_roads();
        self.statistics.battle_concluded(winner, loser, conquered);

        let outcome = BattleOutcome {
            winner,
            loser,
            conquered,
            survivors: self.live_units_of(winner).count(),
            tick: self.tick,
        };
        tracing::info!(
            tick = self.tick,
            %winner,
            %loser,
            conquered,
            survivors = outcome.survivors,
            "Battle concluded"
        );
        self.events.outcome = Some(outcome.clone());
        self.outcome = Some(outcome);
    }

    /// Capture the battle records.
    #[must_use]
    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            tick: self.tick,
            units: self.units.clone(),
            guns: self.guns.iter().cloned().collect(),
            buildings: self.planet.buildings().cloned().collect(),
            mines: self.mines.values().copied().collect(),
            rockets: self.rockets.clone(),
            explosions: self.explosions.clone(),
            paralysis: self.paralysis.iter().map(|(v, p)| (*v, *p)).collect(),
            statistics: self.statistics.clone(),
            winner: self.winner,
        }
    }
}

/// Cells at Chebyshev distance `r` from `center`, row by row.
fn ring(center: Location, r: i32) -> impl Iterator<Item = Location> {
    (-r..=r).flat_map(move |dy| {
        (-r..=r)
            .filter(move |dx| dy.abs() == r || dx.abs() == r)
            .map(move |dx| center.offset(dx, dy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UnitModel;
    use crate::planet::GridSurface;

    fn small_battle() -> (GroundBattle, UnitId) {
        let mut roster = UnitRoster::new();
        roster.insert(UnitModel::new("tank", 100, 20, Fixed::from_num(3)));
        let planet = Planet::new("Testworld", PlayerId(2), GridSurface::new(16, 16));
        let mut battle = GroundBattle::new(
            BattleConfig::default(),
            planet,
            BuildingCatalog::new(),
            roster,
            Player::new(PlayerId(1), "human"),
            Player::new(PlayerId(2), "alien"),
        )
        .unwrap();
        let mover = battle
            .deploy(PlayerId(1), "tank", Location::new(2, 2))
            .unwrap()
            .unwrap();
        battle
            .deploy(PlayerId(2), "tank", Location::new(12, 12))
            .unwrap()
            .unwrap();
        (battle, mover)
    }

    #[test]
    fn test_path_for_a_dead_unit_is_discarded() {
        let (mut battle, mover) = small_battle();
        battle.order_move(mover, Location::new(8, 2)).unwrap();
        assert_eq!(battle.planner().len(), 1);

        // Killed after submission, without withdrawing the request.
        battle.units.get_mut(mover).unwrap().hp = 0;
        battle.run_path_batch();

        assert!(battle.planner().is_empty());
        let unit = battle.unit(mover).unwrap();
        assert!(unit.path.is_empty());
        assert!(battle.diagnostics().is_empty());
    }

    #[test]
    fn test_path_for_a_removed_unit_is_discarded() {
        let (mut battle, mover) = small_battle();
        battle.order_move(mover, Location::new(8, 2)).unwrap();
        battle.units.remove(mover);
        battle.run_path_batch();

        assert!(battle.planner().is_empty());
        assert!(battle.unit(mover).is_none());
    }

    #[test]
    fn test_path_result_skips_the_start_cell() {
        let (mut battle, mover) = small_battle();
        battle.order_move(mover, Location::new(5, 2)).unwrap();
        battle.run_path_batch();

        let unit = battle.unit(mover).unwrap();
        assert!(!unit.in_motion_planning);
        assert_eq!(unit.goal, Some(Location::new(5, 2)));
        assert_eq!(
            unit.path.iter().copied().collect::<Vec<_>>(),
            vec![Location::new(3, 2), Location::new(4, 2), Location::new(5, 2)]
        );
    }

    #[test]
    fn test_ring_sizes() {
        let center = Location::new(5, 5);
        assert_eq!(ring(center, 0).collect::<Vec<_>>(), vec![center]);
        assert_eq!(ring(center, 1).count(), 8);
        assert_eq!(ring(center, 2).count(), 16);
        assert!(ring(center, 2).all(|c| c.chebyshev(center) == 2));
    }
}

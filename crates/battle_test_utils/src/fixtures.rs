//! Test fixtures and helpers.
//!
//! Pre-built unit models, building types and a [`BattleBuilder`] for
//! consistent testing.

use battle_core::prelude::*;
use fixed::types::I32F32;

/// The attacking player in fixture battles.
pub const ATTACKER: PlayerId = PlayerId(1);
/// The defending player (planet owner) in fixture battles.
pub const DEFENDER: PlayerId = PlayerId(2);
/// Race of the attacker.
pub const ATTACKER_RACE: &str = "human";
/// Race of the defender.
pub const DEFENDER_RACE: &str = "alien";

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Plain direct-fire unit: 100 hp, 20 damage, range 3, fires every 10 ticks.
#[must_use]
pub fn tank() -> UnitModel {
    UnitModel::new("tank", 100, 20, fixed(3)).with_cost(500)
}

/// Indirect-fire unit with a dead zone and splash damage.
#[must_use]
pub fn artillery() -> UnitModel {
    UnitModel::new("artillery", 60, 40, fixed(7))
        .with_min_range(fixed(3))
        .with_area(2)
        .with_delay(20)
        .with_cost(900)
}

/// Self-detonating unit.
#[must_use]
pub fn kamikaze() -> UnitModel {
    UnitModel::new("kamikaze", 40, 30, fixed(1))
        .with_area(2)
        .with_ability(Ability::Kamikaze {
            multiplier: fixed(3),
        })
        .with_cost(300)
}

/// Unit whose hits paralyze for 30 ticks.
#[must_use]
pub fn paralyzer() -> UnitModel {
    UnitModel::new("paralyzer", 80, 5, fixed(4))
        .with_ability(Ability::Paralyzer { duration: 30 })
        .with_cost(700)
}

/// Rocket launcher with a long range.
#[must_use]
pub fn rocket_sled() -> UnitModel {
    UnitModel::new("rocket_sled", 70, 0, fixed(9))
        .with_delay(25)
        .with_ability(Ability::RocketSled {
            rocket: RocketModel {
                speed: 5,
                damage: 50,
                area: 2,
                penetration_ratio: fixed_f(0.5),
            },
        })
        .with_cost(1100)
}

/// Mine-laying unit.
#[must_use]
pub fn minelayer() -> UnitModel {
    UnitModel::new("minelayer", 90, 0, fixed(0))
        .with_ability(Ability::Minelayer {
            mine_damage: 120,
            mine_area: 2,
            lay_phases: 10,
        })
        .with_cost(600)
}

/// Rocket jammer with a jamming reach of 6 cells.
#[must_use]
pub fn jammer() -> UnitModel {
    UnitModel::new("jammer", 50, 0, fixed(6))
        .with_ability(Ability::RocketJammer)
        .with_cost(400)
}

/// A roster with every fixture model.
#[must_use]
pub fn standard_roster() -> UnitRoster {
    let mut roster = UnitRoster::new();
    for model in [
        tank(),
        artillery(),
        kamikaze(),
        paralyzer(),
        rocket_sled(),
        minelayer(),
        jammer(),
    ] {
        roster.insert(model);
    }
    roster
}

/// Defensive 2x2 building with two turrets for the defender's race.
#[must_use]
pub fn bunker() -> BuildingType {
    let turret = TurretModel::new(15, 10, fixed(5));
    let mut bunker = BuildingType::new("bunker", 400, BuildingKind::Defensive)
        .with_footprint(BuildingFootprint::square(2))
        .with_turrets(DEFENDER_RACE, vec![turret.clone(), turret]);
    bunker.cost = 2000;
    bunker
}

/// Defensive 1x1 building with four weak turrets for the defender's race.
#[must_use]
pub fn battery() -> BuildingType {
    let turret = TurretModel::new(5, 4, fixed(4));
    let mut battery = BuildingType::new("battery", 200, BuildingKind::Defensive)
        .with_turrets(DEFENDER_RACE, vec![turret; 4]);
    battery.cost = 1200;
    battery
}

/// Civilian building without turrets.
#[must_use]
pub fn habitat() -> BuildingType {
    let mut habitat = BuildingType::new("habitat", 150, BuildingKind::Civilian);
    habitat.cost = 500;
    habitat
}

/// A catalog with every fixture building type.
#[must_use]
pub fn standard_catalog() -> BuildingCatalog {
    let mut catalog = BuildingCatalog::new();
    for building_type in [bunker(), battery(), habitat()] {
        catalog.insert(building_type);
    }
    catalog
}

#[derive(Debug, Clone)]
struct PendingBuilding {
    type_id: String,
    owner: PlayerId,
    location: Location,
    hitpoints: Option<u32>,
    complete: bool,
}

/// Builder for fixture battles.
///
/// Defaults: a 32x32 open planet owned by [`DEFENDER`], the standard roster
/// and catalog, default config.
///
/// # Example
///
/// ```ignore
/// let (battle, units, _) = BattleBuilder::new()
///     .with_unit(ATTACKER, "tank", (2, 2))
///     .with_unit(DEFENDER, "tank", (10, 2))
///     .build_with_ids();
/// ```
#[derive(Debug, Clone)]
pub struct BattleBuilder {
    surface: GridSurface,
    config: BattleConfig,
    roster: UnitRoster,
    catalog: BuildingCatalog,
    defender_multiplier: Fixed,
    buildings: Vec<PendingBuilding>,
    units: Vec<(PlayerId, String, Location)>,
}

impl Default for BattleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BattleBuilder {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            surface: GridSurface::new(32, 32),
            config: BattleConfig::default(),
            roster: standard_roster(),
            catalog: standard_catalog(),
            defender_multiplier: Fixed::ONE,
            buildings: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Use an open surface of the given size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.surface = GridSurface::new(width, height);
        self
    }

    /// Use a surface drawn with `.`, `~` and `#` rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows are malformed.
    #[must_use]
    pub fn with_rows(mut self, rows: &[&str]) -> Self {
        self.surface = GridSurface::from_rows(rows).expect("valid surface rows");
        self
    }

    /// Replace the config.
    #[must_use]
    pub fn with_config(mut self, config: BattleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config = self.config.with_seed(seed);
        self
    }

    /// Add or replace a unit model.
    #[must_use]
    pub fn with_model(mut self, model: UnitModel) -> Self {
        self.roster.insert(model);
        self
    }

    /// Add or replace a building type.
    #[must_use]
    pub fn with_building_type(mut self, building_type: BuildingType) -> Self {
        self.catalog.insert(building_type);
        self
    }

    /// Set the defender's building hitpoint multiplier.
    #[must_use]
    pub fn with_defender_multiplier(mut self, multiplier: Fixed) -> Self {
        self.defender_multiplier = multiplier;
        self
    }

    /// Place a complete defender building.
    #[must_use]
    pub fn with_building(self, type_id: &str, at: (i32, i32)) -> Self {
        self.with_pending_building(type_id, DEFENDER, at, None, true)
    }

    /// Place a complete defender building starting at `hitpoints`.
    #[must_use]
    pub fn with_damaged_building(self, type_id: &str, at: (i32, i32), hitpoints: u32) -> Self {
        self.with_pending_building(type_id, DEFENDER, at, Some(hitpoints), true)
    }

    /// Place a defender building that is still under construction.
    #[must_use]
    pub fn with_incomplete_building(self, type_id: &str, at: (i32, i32)) -> Self {
        self.with_pending_building(type_id, DEFENDER, at, None, false)
    }

    /// Place a complete building owned by `owner`.
    #[must_use]
    pub fn with_building_for(self, owner: PlayerId, type_id: &str, at: (i32, i32)) -> Self {
        self.with_pending_building(type_id, owner, at, None, true)
    }

    fn with_pending_building(
        mut self,
        type_id: &str,
        owner: PlayerId,
        at: (i32, i32),
        hitpoints: Option<u32>,
        complete: bool,
    ) -> Self {
        self.buildings.push(PendingBuilding {
            type_id: type_id.to_string(),
            owner,
            location: Location::new(at.0, at.1),
            hitpoints,
            complete,
        });
        self
    }

    /// Deploy a unit at (or near) a cell once the battle exists.
    #[must_use]
    pub fn with_unit(mut self, owner: PlayerId, model: &str, at: (i32, i32)) -> Self {
        self.units
            .push((owner, model.to_string(), Location::new(at.0, at.1)));
        self
    }

    /// Build the battle, returning unit and building ids in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if a building or unit cannot be placed.
    #[must_use]
    pub fn build_with_ids(self) -> (GroundBattle, Vec<UnitId>, Vec<BuildingId>) {
        let mut planet = Planet::new("Testworld", DEFENDER, self.surface);
        let mut building_ids = Vec::with_capacity(self.buildings.len());
        for pending in &self.buildings {
            let building_type = self
                .catalog
                .get(&pending.type_id)
                .expect("fixture building type");
            let id = planet
                .place_building(building_type, pending.owner, pending.location)
                .expect("fixture building fits");
            let building = planet.building_mut(id).expect("just placed");
            if let Some(hitpoints) = pending.hitpoints {
                building.hitpoints = hitpoints;
            }
            building.complete = pending.complete;
            building_ids.push(id);
        }

        let mut battle = GroundBattle::new(
            self.config,
            planet,
            self.catalog,
            self.roster,
            Player::new(ATTACKER, ATTACKER_RACE),
            Player::new(DEFENDER, DEFENDER_RACE)
                .with_building_hp_multiplier(self.defender_multiplier),
        )
        .expect("fixture battle");

        let unit_ids = self
            .units
            .iter()
            .map(|(owner, model, at)| {
                battle
                    .deploy(*owner, model, *at)
                    .expect("fixture model")
                    .expect("free deployment cell")
            })
            .collect();

        (battle, unit_ids, building_ids)
    }

    /// Build the battle.
    #[must_use]
    pub fn build(self) -> GroundBattle {
        self.build_with_ids().0
    }

    /// Build the battle wrapped in a [`BattleSimulation`].
    #[must_use]
    pub fn simulation(self) -> BattleSimulation {
        BattleSimulation::new(self.build())
    }
}

/// Tick a battle until `done` holds or `max_ticks` pass. Returns the number
/// of ticks run.
pub fn tick_until(
    sim: &mut BattleSimulation,
    max_ticks: u64,
    mut done: impl FnMut(&BattleSimulation) -> bool,
) -> u64 {
    for ticks in 0..max_ticks {
        if done(sim) {
            return ticks;
        }
        sim.tick();
    }
    max_ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_helpers() {
        assert_eq!(fixed(3), I32F32::from_num(3));
        assert_eq!(fixed_f(0.5), I32F32::from_num(1) / 2);
    }

    #[test]
    fn test_builder_places_everything() {
        let (battle, units, buildings) = BattleBuilder::new()
            .with_building("bunker", (10, 10))
            .with_unit(ATTACKER, "tank", (2, 2))
            .with_unit(DEFENDER, "tank", (20, 20))
            .build_with_ids();

        assert_eq!(units.len(), 2);
        assert_eq!(buildings.len(), 1);
        assert_eq!(battle.guns().len(), 2);
        assert_eq!(battle.unit(units[0]).map(|u| u.owner), Some(ATTACKER));
        assert_eq!(battle.unit(units[1]).map(|u| u.cell()), Some(Location::new(20, 20)));
    }

    #[test]
    fn test_standard_roster_has_every_ability() {
        let roster = standard_roster();
        for id in [
            "tank",
            "artillery",
            "kamikaze",
            "paralyzer",
            "rocket_sled",
            "minelayer",
            "jammer",
        ] {
            assert!(roster.get(id).is_ok(), "missing {id}");
        }
    }
}

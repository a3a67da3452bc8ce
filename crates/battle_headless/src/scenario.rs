//! Scenario loading and battle setup.
//!
//! A scenario describes everything needed to start a ground battle: the
//! planet surface, the unit models and building types in play, the
//! defender's buildings, each side's starting units and who controls them.

use std::path::Path;
use std::result::Result;

use battle_core::math::decimal_serde;
use battle_core::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The map section is inconsistent.
    #[error("Invalid map: {0}")]
    InvalidMap(String),
    /// The battle rejected the setup.
    #[error("Battle setup failed: {0}")]
    Battle(#[from] BattleError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// The contested planet.
    pub map: MapSetup,
    /// Engine configuration. The seed is overridden per run.
    #[serde(default)]
    pub config: BattleConfig,
    /// Unit models available to both sides.
    pub units: Vec<UnitModel>,
    /// Building types that may appear on the planet.
    #[serde(default)]
    pub buildings: Vec<BuildingType>,
    /// The invading side.
    pub attacker: SideSetup,
    /// The planet owner.
    pub defender: SideSetup,
}

/// The planet surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSetup {
    /// Planet name.
    pub planet: String,
    /// Grid size in cells (width, height).
    pub size: (u32, u32),
    /// Optional terrain rows (`.` ground, `~` water, `#` rock). When given
    /// they must match `size`.
    #[serde(default)]
    pub rows: Vec<String>,
}

impl MapSetup {
    /// An open planet with no obstacles.
    #[must_use]
    pub fn open(planet: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            planet: planet.into(),
            size: (width, height),
            rows: Vec::new(),
        }
    }

    fn surface(&self) -> Result<GridSurface, ScenarioError> {
        if self.rows.is_empty() {
            return Ok(GridSurface::new(self.size.0, self.size.1));
        }
        let (width, height) = self.size;
        if self.rows.len() as u32 != height {
            return Err(ScenarioError::InvalidMap(format!(
                "{} rows for a map {height} cells high",
                self.rows.len()
            )));
        }
        if let Some(row) = self.rows.iter().find(|r| r.chars().count() as u32 != width) {
            return Err(ScenarioError::InvalidMap(format!(
                "row '{row}' is not {width} cells wide"
            )));
        }
        Ok(GridSurface::from_rows(&self.rows)?)
    }
}

/// How a side's units are controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AiController {
    /// Built-in skirmish AI that hunts the enemy.
    #[default]
    Aggressive,
    /// Built-in skirmish AI that guards its position.
    Defensive,
    /// No control (units only fight what comes into range).
    Passive,
}

/// One side of the battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideSetup {
    /// Player id.
    pub player: u32,
    /// Race key for turret lookups.
    pub race: String,
    /// Who gives this side's orders.
    #[serde(default)]
    pub ai: AiController,
    /// Ticks between AI decisions.
    #[serde(default = "default_ai_interval")]
    pub ai_interval: u64,
    /// Building hitpoint multiplier for this side.
    #[serde(with = "decimal_serde", default = "default_multiplier")]
    pub building_hp_multiplier: Fixed,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Starting buildings.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
}

const fn default_ai_interval() -> u64 {
    5
}

fn default_multiplier() -> Fixed {
    Fixed::ONE
}

impl SideSetup {
    /// A side with no units or buildings.
    #[must_use]
    pub fn new(player: u32, race: impl Into<String>, ai: AiController) -> Self {
        Self {
            player,
            race: race.into(),
            ai,
            ai_interval: default_ai_interval(),
            building_hp_multiplier: Fixed::ONE,
            units: Vec::new(),
            buildings: Vec::new(),
        }
    }

    /// Builder method to add units.
    #[must_use]
    pub fn with_units(mut self, model: &str, x: i32, y: i32, count: u32) -> Self {
        self.units.push(UnitPlacement::new(model, x, y, count));
        self
    }

    /// Builder method to add a building.
    #[must_use]
    pub fn with_building(mut self, type_id: &str, x: i32, y: i32) -> Self {
        self.buildings.push(BuildingPlacement::new(type_id, x, y));
        self
    }

    /// The player id as the engine sees it.
    #[must_use]
    pub fn player_id(&self) -> PlayerId {
        PlayerId(self.player)
    }

    fn player(&self) -> Player {
        Player::new(self.player_id(), self.race.clone())
            .with_building_hp_multiplier(self.building_hp_multiplier)
    }

    fn controller(&self) -> Option<SkirmishAi> {
        let ai = SkirmishAi::new(self.player_id()).with_interval(self.ai_interval);
        match self.ai {
            AiController::Aggressive => Some(ai),
            AiController::Defensive => Some(ai.with_stance(Stance::Defensive)),
            AiController::Passive => None,
        }
    }
}

/// Placement of units at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit model id.
    pub model: String,
    /// Cell (x, y). Extra units spread to the nearest free cells.
    pub position: (i32, i32),
    /// Number of units to deploy.
    #[serde(default = "default_count")]
    pub count: u32,
}

const fn default_count() -> u32 {
    1
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(model: impl Into<String>, x: i32, y: i32, count: u32) -> Self {
        Self {
            model: model.into(),
            position: (x, y),
            count,
        }
    }
}

/// Placement of a building at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building type id.
    pub kind: String,
    /// Top-left cell (x, y).
    pub position: (i32, i32),
    /// Starting hitpoints (defaults to full).
    #[serde(default)]
    pub hitpoints: Option<u32>,
    /// False while still under construction.
    #[serde(default = "default_complete")]
    pub complete: bool,
}

const fn default_complete() -> bool {
    true
}

impl BuildingPlacement {
    /// Create a new, complete building placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            kind: kind.into(),
            position: (x, y),
            hitpoints: None,
            complete: true,
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Resolve a built-in scenario name or a path to a RON file.
    pub fn named(name: &str) -> Result<Self, ScenarioError> {
        match name {
            "skirmish" => Ok(Self::skirmish()),
            "duel" => Ok(Self::duel()),
            path => Self::load(path),
        }
    }

    /// Names accepted by [`Scenario::named`] without a file.
    #[must_use]
    pub fn builtin_names() -> &'static [&'static str] {
        &["skirmish", "duel"]
    }

    /// Mixed-arms assault on a fortified colony.
    #[must_use]
    pub fn skirmish() -> Self {
        let mut config = BattleConfig::default().with_non_combat("minelayer");
        config = config.with_direct_attack("tank").with_get_closer("artillery");
        Self {
            name: "Colony Assault".to_string(),
            description: "Mixed attack force against a bunker line and a small garrison"
                .to_string(),
            map: MapSetup {
                planet: "Kepler Outpost".to_string(),
                size: (40, 24),
                rows: skirmish_rows(),
            },
            config,
            units: standard_models(),
            buildings: standard_buildings(),
            attacker: SideSetup::new(1, "human", AiController::Aggressive)
                .with_units("tank", 3, 8, 4)
                .with_units("artillery", 2, 12, 2)
                .with_units("paralyzer", 4, 15, 1)
                .with_units("rocket_sled", 2, 4, 1)
                .with_units("kamikaze", 5, 19, 2),
            defender: SideSetup::new(2, "alien", AiController::Defensive)
                .with_units("tank", 30, 10, 3)
                .with_units("jammer", 33, 12, 1)
                .with_units("minelayer", 28, 14, 1)
                .with_building("bunker", 32, 6)
                .with_building("bunker", 32, 16)
                .with_building("battery", 35, 11)
                .with_building("habitat", 37, 2)
                .with_building("habitat", 37, 20),
        }
    }

    /// Two tanks a side on an open field.
    #[must_use]
    pub fn duel() -> Self {
        Self {
            name: "Duel".to_string(),
            description: "Small open-field tank fight".to_string(),
            map: MapSetup::open("Proving Ground", 16, 12),
            config: BattleConfig::default(),
            units: standard_models(),
            buildings: standard_buildings(),
            attacker: SideSetup::new(1, "human", AiController::Aggressive)
                .with_units("tank", 2, 5, 2),
            defender: SideSetup::new(2, "alien", AiController::Aggressive)
                .with_units("tank", 13, 5, 2),
        }
    }

    /// Build a ready-to-run simulation, optionally overriding the seed.
    pub fn build(&self, seed: Option<u64>) -> Result<BattleSimulation, ScenarioError> {
        let config = match seed {
            Some(seed) => self.config.clone().with_seed(seed),
            None => self.config.clone(),
        };

        let mut roster = UnitRoster::new();
        for model in &self.units {
            roster.insert(model.clone());
        }
        let mut catalog = BuildingCatalog::new();
        for building_type in &self.buildings {
            catalog.insert(building_type.clone());
        }

        let defender = self.defender.player();
        let mut planet = Planet::new(self.map.planet.clone(), defender.id, self.map.surface()?);
        for side in [&self.defender, &self.attacker] {
            for placement in &side.buildings {
                let building_type = catalog.get(&placement.kind)?;
                let (x, y) = placement.position;
                let id = planet.place_building(building_type, side.player_id(), Location::new(x, y))?;
                if let Some(building) = planet.building_mut(id) {
                    if let Some(hitpoints) = placement.hitpoints {
                        building.hitpoints = hitpoints.min(building_type.hitpoints);
                    }
                    building.complete = placement.complete;
                }
            }
        }

        let mut battle = GroundBattle::new(
            config,
            planet,
            catalog,
            roster,
            self.attacker.player(),
            defender,
        )?;

        for side in [&self.attacker, &self.defender] {
            for placement in &side.units {
                let (x, y) = placement.position;
                for _ in 0..placement.count {
                    if battle
                        .deploy(side.player_id(), &placement.model, Location::new(x, y))?
                        .is_none()
                    {
                        tracing::warn!(
                            scenario = %self.name,
                            model = %placement.model,
                            x,
                            y,
                            "No free cell left for unit"
                        );
                        break;
                    }
                }
            }
        }

        let mut simulation = BattleSimulation::new(battle);
        for side in [&self.attacker, &self.defender] {
            if let Some(ai) = side.controller() {
                simulation = simulation.with_ai(ai);
            }
        }
        tracing::debug!(scenario = %self.name, seed = simulation.battle().config().seed, "Scenario built");
        Ok(simulation)
    }
}

fn skirmish_rows() -> Vec<String> {
    let mut rows = vec!["........................................".to_string(); 24];
    // A ridge with two gaps in the middle of the field.
    for (y, row) in rows.iter_mut().enumerate() {
        if !(4..=6).contains(&y) && !(17..=19).contains(&y) {
            row.replace_range(18..20, "##");
        }
    }
    rows[11].replace_range(10..13, "~~~");
    rows[12].replace_range(10..13, "~~~");
    rows
}

fn standard_models() -> Vec<UnitModel> {
    let cells = Fixed::from_num::<i32>;
    vec![
        UnitModel::new("tank", 100, 20, cells(3)).with_cost(500),
        UnitModel::new("artillery", 60, 40, cells(7))
            .with_min_range(cells(3))
            .with_area(2)
            .with_delay(20)
            .with_speed(28)
            .with_cost(900),
        UnitModel::new("kamikaze", 40, 30, cells(1))
            .with_area(2)
            .with_speed(14)
            .with_ability(Ability::Kamikaze {
                multiplier: cells(3),
            })
            .with_cost(300),
        UnitModel::new("paralyzer", 80, 5, cells(4))
            .with_ability(Ability::Paralyzer { duration: 30 })
            .with_cost(700),
        UnitModel::new("rocket_sled", 70, 0, cells(9))
            .with_delay(25)
            .with_ability(Ability::RocketSled {
                rocket: RocketModel {
                    speed: 5,
                    damage: 50,
                    area: 2,
                    penetration_ratio: Fixed::from_num(1) / Fixed::from_num(2),
                },
            })
            .with_cost(1100),
        UnitModel::new("minelayer", 90, 0, cells(0))
            .with_ability(Ability::Minelayer {
                mine_damage: 120,
                mine_area: 2,
                lay_phases: 10,
            })
            .with_cost(600),
        UnitModel::new("jammer", 50, 0, cells(6))
            .with_ability(Ability::RocketJammer)
            .with_cost(400),
    ]
}

fn standard_buildings() -> Vec<BuildingType> {
    let cells = Fixed::from_num::<i32>;
    let heavy = TurretModel::new(15, 10, cells(5)).with_rotation_time(18);
    let light = TurretModel::new(5, 4, cells(4));
    let mut bunker = BuildingType::new("bunker", 400, BuildingKind::Defensive)
        .with_footprint(BuildingFootprint::square(2))
        .with_turrets("alien", vec![heavy.clone(), heavy]);
    bunker.cost = 2000;
    let mut battery = BuildingType::new("battery", 200, BuildingKind::Defensive)
        .with_turrets("alien", vec![light; 4]);
    battery.cost = 1200;
    let mut habitat = BuildingType::new("habitat", 150, BuildingKind::Civilian);
    habitat.cost = 500;
    vec![bunker, battery, habitat]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_scenario_builds() {
        let scenario = Scenario::skirmish();
        assert_eq!(scenario.map.rows.len(), 24);
        let sim = scenario.build(Some(7)).unwrap();
        let battle = sim.battle();
        assert_eq!(battle.config().seed, 7);
        assert_eq!(battle.planet().building_count(), 5);
        assert_eq!(battle.live_units_of(PlayerId(1)).count(), 10);
        assert_eq!(battle.live_units_of(PlayerId(2)).count(), 5);
        assert_eq!(battle.guns().len(), 8);
    }

    #[test]
    fn test_named_resolves_builtins() {
        for name in Scenario::builtin_names() {
            assert!(Scenario::named(name).is_ok(), "{name}");
        }
        assert!(matches!(
            Scenario::named("no/such/scenario.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_mismatched_rows_are_rejected() {
        let mut scenario = Scenario::duel();
        scenario.map.rows = vec!["....".to_string(); 3];
        assert!(matches!(
            scenario.build(None),
            Err(ScenarioError::InvalidMap(_))
        ));
    }

    #[test]
    fn test_unknown_model_is_a_battle_error() {
        let mut scenario = Scenario::duel();
        scenario.attacker = scenario.attacker.with_units("mech", 1, 1, 1);
        assert!(matches!(
            scenario.build(None),
            Err(ScenarioError::Battle(BattleError::UnknownUnitModel(_)))
        ));
    }

    #[test]
    fn test_damaged_building_placement() {
        let mut scenario = Scenario::duel();
        scenario.defender.buildings.push(BuildingPlacement {
            kind: "battery".to_string(),
            position: (8, 1),
            hitpoints: Some(50),
            complete: true,
        });
        let sim = scenario.build(None).unwrap();
        let battery = sim.battle().planet().buildings().next().unwrap();
        assert_eq!(battery.hitpoints, 50);
        assert_eq!(sim.battle().guns().for_building(battery.id).len(), 2);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                map: MapSetup(planet: "Rock", size: (8, 4), rows: [
                    "........",
                    "...##...",
                    "...##...",
                    "........",
                ]),
                units: [
                    UnitModel(id: "tank", hp: 100, max_range: 3.0, movement_speed: 20, delay: 10, damage: 20),
                ],
                buildings: [
                    BuildingType(id: "gun", hitpoints: 50, kind: Defensive, turrets: {
                        "alien": [TurretModel(damage: 5, delay: 4, max_range: 4.5)],
                    }),
                ],
                attacker: SideSetup(player: 1, race: "human", units: [
                    UnitPlacement(model: "tank", position: (0, 0), count: 2),
                ]),
                defender: SideSetup(player: 2, race: "alien", ai: Passive, building_hp_multiplier: 1.5, buildings: [
                    BuildingPlacement(kind: "gun", position: (7, 3)),
                ]),
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.attacker.ai, AiController::Aggressive);
        assert_eq!(scenario.defender.ai, AiController::Passive);
        assert_eq!(scenario.defender.building_hp_multiplier, Fixed::from_num(1.5));

        let sim = scenario.build(Some(3)).unwrap();
        assert_eq!(sim.battle().live_units_of(PlayerId(1)).count(), 2);
        assert_eq!(sim.battle().guns().len(), 1);
        assert!(!sim.battle().planet().can_place_building(Location::new(3, 1)));
    }
}

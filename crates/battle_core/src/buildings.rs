//! Buildings on the contested planet and the read-only building catalog.
//!
//! Buildings are shared with the economic layer. The battle engine only
//! mutates their hitpoints and removes them when destroyed; footprint,
//! kind and type are read-only here.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::math::{decimal_serde, Fixed, Location, Vec2Fixed, FULL_TURN};
use crate::player::PlayerId;

/// Identifier of a building on the planet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BuildingId(pub u32);

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "building#{}", self.0)
    }
}

/// Coarse classification of a building type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Guns, fortresses, shields. Targeted by direct-attack units and
    /// counted for the win condition.
    Defensive,
    /// Anything else (factories, power plants, housing).
    #[default]
    Civilian,
}

/// Defines the size of a building in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildingFootprint {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl BuildingFootprint {
    /// Create a new building footprint.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a square footprint.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }

    /// Get the total number of cells this footprint covers.
    #[must_use]
    pub const fn cell_count(&self) -> u32 {
        self.width * self.height
    }
}

impl Default for BuildingFootprint {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Stats of one turret mounted on a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurretModel {
    /// Damage per hit.
    pub damage: u32,
    /// Ticks between shots.
    pub delay: u32,
    /// Length of the firing animation in ticks.
    #[serde(default = "default_fire_phases")]
    pub fire_phases: u32,
    /// Minimum firing distance in cells.
    #[serde(with = "decimal_serde", default = "zero")]
    pub min_range: Fixed,
    /// Maximum firing distance in cells.
    #[serde(with = "decimal_serde")]
    pub max_range: Fixed,
    /// Ticks for a full turn (0 turns instantly).
    #[serde(default)]
    pub rotation_time: u32,
}

const fn default_fire_phases() -> u32 {
    1
}

fn zero() -> Fixed {
    Fixed::ZERO
}

impl TurretModel {
    /// Create a turret with instant rotation and no minimum range.
    #[must_use]
    pub fn new(damage: u32, delay: u32, max_range: Fixed) -> Self {
        Self {
            damage,
            delay,
            fire_phases: 1,
            min_range: Fixed::ZERO,
            max_range,
            rotation_time: 0,
        }
    }

    /// Builder method to set the firing animation length.
    #[must_use]
    pub fn with_fire_phases(mut self, fire_phases: u32) -> Self {
        self.fire_phases = fire_phases.max(1);
        self
    }

    /// Builder method to set the ticks needed for a full turn.
    #[must_use]
    pub fn with_rotation_time(mut self, rotation_time: u32) -> Self {
        self.rotation_time = rotation_time;
        self
    }

    /// Whether `distance` lies inside the firing band.
    #[must_use]
    pub fn in_range(&self, distance: Fixed) -> bool {
        distance >= self.min_range && distance <= self.max_range
    }

    /// Degrees turned per tick, or `None` for instant rotation.
    #[must_use]
    pub fn rotation_step(&self) -> Option<Fixed> {
        (self.rotation_time > 0).then(|| FULL_TURN / Fixed::from_num(self.rotation_time))
    }
}

/// Read-only definition of a building type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingType {
    /// Type id.
    pub id: String,
    /// Base hitpoints (before owner multipliers).
    pub hitpoints: u32,
    /// Value used by the statistics counters.
    #[serde(default)]
    pub cost: u32,
    /// Classification.
    #[serde(default)]
    pub kind: BuildingKind,
    /// Size in cells.
    #[serde(default)]
    pub footprint: BuildingFootprint,
    /// Turret definitions per race.
    #[serde(default)]
    pub turrets: BTreeMap<String, Vec<TurretModel>>,
}

impl BuildingType {
    /// Create a building type without turrets.
    #[must_use]
    pub fn new(id: impl Into<String>, hitpoints: u32, kind: BuildingKind) -> Self {
        Self {
            id: id.into(),
            hitpoints,
            cost: 0,
            kind,
            footprint: BuildingFootprint::default(),
            turrets: BTreeMap::new(),
        }
    }

    /// Builder method to set the footprint.
    #[must_use]
    pub fn with_footprint(mut self, footprint: BuildingFootprint) -> Self {
        self.footprint = footprint;
        self
    }

    /// Builder method to add turrets for a race.
    #[must_use]
    pub fn with_turrets(mut self, race: impl Into<String>, turrets: Vec<TurretModel>) -> Self {
        self.turrets.insert(race.into(), turrets);
        self
    }

    /// Turret definitions for a race (empty if none).
    #[must_use]
    pub fn turrets_for(&self, race: &str) -> &[TurretModel] {
        self.turrets.get(race).map_or(&[], Vec::as_slice)
    }
}

/// The building model: all building types keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingCatalog {
    types: BTreeMap<String, BuildingType>,
}

impl BuildingCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from a RON list of [`BuildingType`]s.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        let types: Vec<BuildingType> =
            ron::from_str(text).map_err(|e| BattleError::DataParseError {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        let mut catalog = Self::new();
        for building_type in types {
            catalog.insert(building_type);
        }
        Ok(catalog)
    }

    /// Add or replace a type.
    pub fn insert(&mut self, building_type: BuildingType) {
        self.types.insert(building_type.id.clone(), building_type);
    }

    /// Look up a type.
    pub fn get(&self, id: &str) -> Result<&BuildingType> {
        self.types
            .get(id)
            .ok_or_else(|| BattleError::UnknownBuildingType(id.to_string()))
    }
}

/// A building instance on the planet surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Unique id.
    pub id: BuildingId,
    /// Type id into the [`BuildingCatalog`].
    pub type_id: String,
    /// Owning player.
    pub owner: PlayerId,
    /// Top-left cell of the footprint.
    pub location: Location,
    /// Size in cells (copied from the type at placement).
    pub footprint: BuildingFootprint,
    /// Classification (copied from the type at placement).
    pub kind: BuildingKind,
    /// Current hitpoints on the type's scale.
    pub hitpoints: u32,
    /// Upgrade level.
    pub upgrade_level: u32,
    /// Whether construction has finished.
    pub complete: bool,
    /// Fraction of required energy the building receives, in `[0, 1]`.
    #[serde(with = "crate::math::fixed_serde")]
    pub energy_ratio: Fixed,
}

impl Building {
    /// Create a complete, fully powered building at full health.
    #[must_use]
    pub fn new(
        id: BuildingId,
        building_type: &BuildingType,
        owner: PlayerId,
        location: Location,
    ) -> Self {
        Self {
            id,
            type_id: building_type.id.clone(),
            owner,
            location,
            footprint: building_type.footprint,
            kind: building_type.kind,
            hitpoints: building_type.hitpoints,
            upgrade_level: 0,
            complete: true,
            energy_ratio: Fixed::ONE,
        }
    }

    /// True once hitpoints reach zero.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.hitpoints == 0
    }

    /// Iterate all cells covered by the footprint.
    pub fn cells(&self) -> impl Iterator<Item = Location> + '_ {
        let origin = self.location;
        (0..self.footprint.height as i32).flat_map(move |dy| {
            (0..self.footprint.width as i32).map(move |dx| origin.offset(dx, dy))
        })
    }

    /// True if `cell` lies inside the footprint.
    #[must_use]
    pub fn covers(&self, cell: Location) -> bool {
        cell.x >= self.location.x
            && cell.y >= self.location.y
            && cell.x < self.location.x + self.footprint.width as i32
            && cell.y < self.location.y + self.footprint.height as i32
    }

    /// Center of the footprint in world coordinates.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        let half = Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(self.location.x)
                + Fixed::from_num(self.footprint.width as i32 - 1) / half,
            Fixed::from_num(self.location.y)
                + Fixed::from_num(self.footprint.height as i32 - 1) / half,
        )
    }

    /// The footprint cell center closest to `point`.
    #[must_use]
    pub fn nearest_point(&self, point: Vec2Fixed) -> Vec2Fixed {
        let min_x = Fixed::from_num(self.location.x);
        let min_y = Fixed::from_num(self.location.y);
        let max_x = min_x + Fixed::from_num(self.footprint.width as i32 - 1);
        let max_y = min_y + Fixed::from_num(self.footprint.height as i32 - 1);
        Vec2Fixed::new(point.x.clamp(min_x, max_x), point.y.clamp(min_y, max_y))
    }

    /// Distance from `point` to the nearest footprint cell center.
    #[must_use]
    pub fn distance_to(&self, point: Vec2Fixed) -> Fixed {
        point.distance(self.nearest_point(point))
    }
}

//! Data-driven unit model definitions.
//!
//! Unit stats are opaque read-only records supplied by the asset layer.
//! They can be deserialized from RON so scenarios and tests can define
//! their own rosters.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::math::{decimal_serde, Fixed, FULL_TURN};
use crate::simulation::TICK_DURATION_MS;

/// Divisor of the movement budget formula `tick_ms / speed / 28`.
const MOVEMENT_DIVISOR: i32 = 28;

/// Distance in cells covered in one tick by something with this speed.
///
/// Lower speed values are faster. A speed of zero means immobile.
#[must_use]
pub fn movement_budget(speed: u32) -> Fixed {
    if speed == 0 {
        return Fixed::ZERO;
    }
    Fixed::from_num(TICK_DURATION_MS)
        / Fixed::from_num(speed)
        / Fixed::from_num(MOVEMENT_DIVISOR)
}

/// Rocket stats carried by rocket sled units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocketModel {
    /// Movement speed (same scale as unit movement speed).
    pub speed: u32,
    /// Damage at the impact point.
    pub damage: u32,
    /// Blast radius in cells.
    pub area: u32,
    /// Fraction of a jammer's range within which this rocket is jammed.
    #[serde(with = "decimal_serde")]
    pub penetration_ratio: Fixed,
}

/// Special capability of a unit model.
///
/// # Example RON
///
/// ```ron
/// Minelayer(mine_damage: 120, mine_area: 2, lay_phases: 10)
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Ability {
    /// No special behavior.
    #[default]
    None,
    /// Self-detonates when badly damaged.
    Kamikaze {
        /// Multiplier applied to the unit's damage for the detonation.
        #[serde(with = "decimal_serde")]
        multiplier: Fixed,
    },
    /// Hits paralyze the target for a while.
    Paralyzer {
        /// Paralysis length in ticks.
        duration: u32,
    },
    /// Fires rockets instead of dealing instant damage.
    RocketSled {
        /// The launched rocket's stats.
        rocket: RocketModel,
    },
    /// Can plant mines.
    Minelayer {
        /// Damage of a planted mine.
        mine_damage: u32,
        /// Blast radius of a planted mine.
        mine_area: u32,
        /// Ticks of standing still needed to plant.
        lay_phases: u32,
    },
    /// Destroys enemy rockets passing close by.
    RocketJammer,
}

/// Tag identifying an [`Ability`] variant, used to key behavior handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AbilityTag {
    /// [`Ability::None`].
    Plain,
    /// [`Ability::Kamikaze`].
    Kamikaze,
    /// [`Ability::Paralyzer`].
    Paralyzer,
    /// [`Ability::RocketSled`].
    RocketSled,
    /// [`Ability::Minelayer`].
    Minelayer,
    /// [`Ability::RocketJammer`].
    RocketJammer,
}

impl Ability {
    /// The tag of this ability.
    #[must_use]
    pub const fn tag(&self) -> AbilityTag {
        match self {
            Self::None => AbilityTag::Plain,
            Self::Kamikaze { .. } => AbilityTag::Kamikaze,
            Self::Paralyzer { .. } => AbilityTag::Paralyzer,
            Self::RocketSled { .. } => AbilityTag::RocketSled,
            Self::Minelayer { .. } => AbilityTag::Minelayer,
            Self::RocketJammer => AbilityTag::RocketJammer,
        }
    }
}

/// Stats of a ground unit type.
///
/// # Example RON
///
/// ```ron
/// UnitModel(
///     id: "light_tank",
///     cost: 800,
///     hp: 240,
///     min_range: 0.0,
///     max_range: 3.0,
///     movement_speed: 20,
///     rotation_time: 8,
///     delay: 12,
///     fire_phases: 3,
///     damage: 30,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitModel {
    /// Unique string identifier for this unit type.
    pub id: String,
    /// Value used by the statistics counters.
    #[serde(default)]
    pub cost: u32,
    /// Maximum hitpoints.
    pub hp: u32,
    /// Minimum firing distance in cells.
    #[serde(with = "decimal_serde", default = "zero")]
    pub min_range: Fixed,
    /// Maximum firing distance in cells.
    #[serde(with = "decimal_serde")]
    pub max_range: Fixed,
    /// Movement speed (lower is faster, 0 is immobile).
    pub movement_speed: u32,
    /// Ticks needed for a full turn (0 turns instantly).
    #[serde(default)]
    pub rotation_time: u32,
    /// Ticks between shots.
    pub delay: u32,
    /// Length of the firing animation in ticks.
    #[serde(default = "default_fire_phases")]
    pub fire_phases: u32,
    /// Damage per hit.
    pub damage: u32,
    /// Area-of-effect radius in cells (0 hits a single target).
    #[serde(default)]
    pub area: u32,
    /// Hitpoints regained per tick.
    #[serde(default)]
    pub self_repair: u32,
    /// Special capability.
    #[serde(default)]
    pub ability: Ability,
}

fn zero() -> Fixed {
    Fixed::ZERO
}

const fn default_fire_phases() -> u32 {
    1
}

impl UnitModel {
    /// Create a plain combat model with instant rotation.
    #[must_use]
    pub fn new(id: impl Into<String>, hp: u32, damage: u32, max_range: Fixed) -> Self {
        Self {
            id: id.into(),
            cost: 0,
            hp,
            min_range: Fixed::ZERO,
            max_range,
            movement_speed: 20,
            rotation_time: 0,
            delay: 10,
            fire_phases: 1,
            damage,
            area: 0,
            self_repair: 0,
            ability: Ability::None,
        }
    }

    /// Builder method to set the ability.
    #[must_use]
    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.ability = ability;
        self
    }

    /// Builder method to set the minimum range.
    #[must_use]
    pub fn with_min_range(mut self, min_range: Fixed) -> Self {
        self.min_range = min_range;
        self
    }

    /// Builder method to set the firing delay.
    #[must_use]
    pub fn with_delay(mut self, delay: u32) -> Self {
        self.delay = delay;
        self
    }

    /// Builder method to set the movement speed.
    #[must_use]
    pub fn with_speed(mut self, movement_speed: u32) -> Self {
        self.movement_speed = movement_speed;
        self
    }

    /// Builder method to set the area of effect.
    #[must_use]
    pub fn with_area(mut self, area: u32) -> Self {
        self.area = area;
        self
    }

    /// Builder method to set the cost.
    #[must_use]
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
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

    /// Builder method to set hitpoints regained per tick.
    #[must_use]
    pub fn with_self_repair(mut self, self_repair: u32) -> Self {
        self.self_repair = self_repair;
        self
    }

    /// Cells moved per tick.
    #[must_use]
    pub fn movement_per_tick(&self) -> Fixed {
        movement_budget(self.movement_speed)
    }

    /// Degrees turned per tick, or `None` for instant rotation.
    #[must_use]
    pub fn rotation_step(&self) -> Option<Fixed> {
        if self.rotation_time == 0 {
            None
        } else {
            Some(FULL_TURN / Fixed::from_num(self.rotation_time))
        }
    }

    /// Whether `distance` lies inside the firing band.
    #[must_use]
    pub fn in_range(&self, distance: Fixed) -> bool {
        distance >= self.min_range && distance <= self.max_range
    }
}

/// All unit models available to a battle, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct UnitRoster {
    models: BTreeMap<String, Arc<UnitModel>>,
}

impl UnitRoster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a roster from a RON list of [`UnitModel`]s.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        let models: Vec<UnitModel> =
            ron::from_str(text).map_err(|e| BattleError::DataParseError {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        let mut roster = Self::new();
        for model in models {
            roster.insert(model);
        }
        Ok(roster)
    }

    /// Add or replace a model.
    pub fn insert(&mut self, model: UnitModel) -> Arc<UnitModel> {
        let model = Arc::new(model);
        self.models.insert(model.id.clone(), Arc::clone(&model));
        model
    }

    /// Look up a model.
    pub fn get(&self, id: &str) -> Result<Arc<UnitModel>> {
        self.models
            .get(id)
            .cloned()
            .ok_or_else(|| BattleError::UnknownUnitModel(id.to_string()))
    }

    /// Number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True if the roster has no models.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

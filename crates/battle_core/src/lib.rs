//! # Battle Core
//!
//! Deterministic tactical ground-battle engine.
//!
//! Two players fight over one planet on a square grid: the attacker brings
//! ground units, the defender holds the planet with its own units and the
//! turrets mounted on its defensive buildings. The battle runs in fixed
//! ticks until one side has no combat strength left.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond parsing RON data handed in by the caller
//! - Seeded randomness only
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`battle`] - The [`GroundBattle`](battle::GroundBattle) aggregate and lifecycle
//! - [`simulation`] - Tick driver and determinism hash
//! - [`behavior`] / [`movement`] / [`orders`] - Unit decision cycle
//! - [`combat`] / [`turrets`] / [`effects`] / [`abilities`] - Damage and weapons
//! - [`pathfinding`] / [`planner`] / [`spatial`] - Grid search and occupancy
//! - [`planet`] / [`buildings`] - The contested surface
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod ai;
pub mod battle;
pub mod behavior;
pub mod buildings;
pub mod combat;
pub mod config;
pub mod effects;
pub mod error;
pub mod math;
pub mod model;
pub mod movement;
pub mod orders;
pub mod pathfinding;
pub mod planet;
pub mod planner;
pub mod player;
pub mod simulation;
pub mod spatial;
pub mod turrets;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{GroundAi, SkirmishAi, Stance};
    pub use crate::battle::{BattleOutcome, BattleSnapshot, GroundBattle};
    pub use crate::buildings::{
        Building, BuildingCatalog, BuildingFootprint, BuildingId, BuildingKind, BuildingType,
        TurretModel,
    };
    pub use crate::config::{BattleConfig, ExplosionPhases};
    pub use crate::effects::{Explosion, ExplosionKind, Mine, Rocket, SoundEvent};
    pub use crate::error::{BattleError, Diagnostics, Result, ViolationKind};
    pub use crate::math::{Fixed, Location, Vec2Fixed};
    pub use crate::model::{Ability, RocketModel, UnitModel, UnitRoster};
    pub use crate::planet::{GridSurface, Planet, SurfaceCell, Terrain};
    pub use crate::player::{Player, PlayerId, Statistics, StatisticsLedger};
    pub use crate::simulation::{BattleSimulation, TickEvents, TICK_DURATION_MS, TICK_RATE};
    pub use crate::turrets::{Gun, GunId};
    pub use crate::unit::{AttackTarget, Unit, UnitId};
}

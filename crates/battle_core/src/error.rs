//! Error types and the non-fatal diagnostics sink.
//!
//! Two kinds of failure exist in the battle engine:
//!
//! - [`BattleError`] for operations a caller can reasonably get wrong
//!   (ordering a unit that does not exist, malformed configuration).
//! - [`Diagnostics`] for internal inconsistencies detected mid-tick. These
//!   are recorded and logged, and the tick carries on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buildings::BuildingId;
use crate::unit::UnitId;

/// Result type alias using [`BattleError`].
pub type Result<T> = std::result::Result<T, BattleError>;

/// Top-level error type for all battle simulation errors.
#[derive(Debug, Error)]
pub enum BattleError {
    /// Invalid unit identifier.
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    /// Invalid building identifier.
    #[error("Unknown building: {0}")]
    UnknownBuilding(BuildingId),

    /// A building type id missing from the catalog.
    #[error("Unknown building type: {0}")]
    UnknownBuildingType(String),

    /// A unit model id missing from the roster.
    #[error("Unknown unit model: {0}")]
    UnknownUnitModel(String),

    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the file or string that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// The path planning worker pool could not be created.
    #[error("Failed to build path planning pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Snapshot encoding or decoding failed.
    #[error("Snapshot encoding failed: {0}")]
    Snapshot(#[from] bincode::Error),

    /// Invalid battle state.
    #[error("Invalid battle state: {0}")]
    InvalidState(String),
}

/// Category of an internal inconsistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A unit was missing from a spatial index bucket it should occupy.
    SpatialIndex,
    /// A path request was enqueued for a unit that already has one.
    DuplicatePathRequest,
    /// A gun refers to a building that no longer exists.
    OrphanGun,
    /// A building cascade step found inconsistent state.
    BuildingCascade,
    /// An attack order referred to an invalid target.
    InvalidTarget,
}

/// A single recorded invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Tick on which the violation was detected.
    pub tick: u64,
    /// Category.
    pub kind: ViolationKind,
    /// Human readable detail.
    pub detail: String,
}

/// Collects invariant violations without interrupting the simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    tick: u64,
    violations: Vec<InvariantViolation>,
}

impl Diagnostics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp subsequent reports with this tick.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Record a violation and log it.
    pub fn report(&mut self, kind: ViolationKind, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(tick = self.tick, ?kind, %detail, "Battle invariant violated");
        self.violations.push(InvariantViolation {
            tick: self.tick,
            kind,
            detail,
        });
    }

    /// All violations recorded so far.
    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    /// Count violations of one kind.
    #[must_use]
    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    /// True if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_tick() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.set_tick(7);
        diagnostics.report(ViolationKind::OrphanGun, "gun 3 lost building 9");

        assert_eq!(diagnostics.violations().len(), 1);
        assert_eq!(diagnostics.violations()[0].tick, 7);
        assert_eq!(diagnostics.count(ViolationKind::OrphanGun), 1);
        assert_eq!(diagnostics.count(ViolationKind::SpatialIndex), 0);
    }

    #[test]
    fn test_error_display() {
        let err = BattleError::UnknownUnit(UnitId(4));
        assert_eq!(err.to_string(), "Unknown unit: unit#4");
    }
}

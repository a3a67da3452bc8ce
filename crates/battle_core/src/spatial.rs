//! Cell buckets of unit ids.
//!
//! Two indices are kept side by side: the render index buckets a unit by
//! the cell its position falls in (floor), the path index by the cell whose
//! center is nearest (round). Movement and path searches use the path index.

use std::collections::{BTreeSet, HashMap};

use crate::math::{Location, Vec2Fixed};
use crate::unit::UnitId;

type Buckets = HashMap<Location, BTreeSet<UnitId>>;

fn insert(buckets: &mut Buckets, cell: Location, unit: UnitId) {
    buckets.entry(cell).or_default().insert(unit);
}

fn remove(buckets: &mut Buckets, cell: Location, unit: UnitId) -> bool {
    let Some(bucket) = buckets.get_mut(&cell) else {
        return false;
    };
    let removed = bucket.remove(&unit);
    if bucket.is_empty() {
        buckets.remove(&cell);
    }
    removed
}

/// Render and pathfinding indices of unit positions.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    render: Buckets,
    paths: Buckets,
}

impl SpatialIndex {
    /// Create empty indices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit at `position` to both indices.
    pub fn add(&mut self, unit: UnitId, position: Vec2Fixed) {
        insert(&mut self.render, position.footprint_cell(), unit);
        insert(&mut self.paths, position.nearest_cell(), unit);
    }

    /// Remove a unit at `position` from both indices.
    ///
    /// Returns false if the unit was missing from either bucket.
    pub fn remove(&mut self, unit: UnitId, position: Vec2Fixed) -> bool {
        let in_render = remove(&mut self.render, position.footprint_cell(), unit);
        let in_paths = remove(&mut self.paths, position.nearest_cell(), unit);
        in_render && in_paths
    }

    /// Move a unit between buckets. Returns false if it was missing from
    /// its old bucket in either index.
    pub fn relocate(&mut self, unit: UnitId, from: Vec2Fixed, to: Vec2Fixed) -> bool {
        let mut consistent = true;
        let (old_render, new_render) = (from.footprint_cell(), to.footprint_cell());
        if old_render != new_render {
            consistent &= remove(&mut self.render, old_render, unit);
            insert(&mut self.render, new_render, unit);
        }
        let (old_path, new_path) = (from.nearest_cell(), to.nearest_cell());
        if old_path != new_path {
            consistent &= remove(&mut self.paths, old_path, unit);
            insert(&mut self.paths, new_path, unit);
        }
        consistent
    }

    /// Units whose nearest cell is `cell`.
    #[must_use]
    pub fn units_at(&self, cell: Location) -> Option<&BTreeSet<UnitId>> {
        self.paths.get(&cell)
    }

    /// Units drawn in `cell`.
    #[must_use]
    pub fn units_rendered_at(&self, cell: Location) -> Option<&BTreeSet<UnitId>> {
        self.render.get(&cell)
    }

    /// True if any unit other than `except` occupies `cell`.
    #[must_use]
    pub fn is_occupied_by_other(&self, cell: Location, except: UnitId) -> bool {
        self.paths
            .get(&cell)
            .is_some_and(|bucket| bucket.iter().any(|id| *id != except))
    }

    /// Number of non-empty path buckets.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    fn pos(x: f64, y: f64) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    #[test]
    fn test_render_and_path_buckets_differ() {
        let mut index = SpatialIndex::new();
        index.add(UnitId(1), pos(2.75, 4.0));

        assert!(index.units_rendered_at(Location::new(2, 4)).is_some());
        assert!(index.units_at(Location::new(3, 4)).is_some());
        assert!(index.units_at(Location::new(2, 4)).is_none());
    }

    #[test]
    fn test_relocate_drops_empty_buckets() {
        let mut index = SpatialIndex::new();
        index.add(UnitId(1), pos(0.0, 0.0));
        assert!(index.relocate(UnitId(1), pos(0.0, 0.0), pos(1.0, 0.0)));

        assert!(index.units_at(Location::new(0, 0)).is_none());
        assert!(index.units_rendered_at(Location::new(0, 0)).is_none());
        assert_eq!(index.occupied_cells(), 1);
    }

    #[test]
    fn test_relocate_reports_missing_unit() {
        let mut index = SpatialIndex::new();
        assert!(!index.relocate(UnitId(9), pos(0.0, 0.0), pos(1.0, 0.0)));
        // The unit still lands in its new bucket
        assert!(index.remove(UnitId(9), pos(1.0, 0.0)));
        assert_eq!(index.occupied_cells(), 0);
    }

    #[test]
    fn test_occupied_by_other() {
        let mut index = SpatialIndex::new();
        index.add(UnitId(1), pos(5.0, 5.0));
        assert!(!index.is_occupied_by_other(Location::new(5, 5), UnitId(1)));
        assert!(index.is_occupied_by_other(Location::new(5, 5), UnitId(2)));
    }
}

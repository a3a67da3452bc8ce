//! The contested planet: terrain plus the building overlay.
//!
//! The surface grid is the only passability oracle the battle consults.
//! [`Planet::can_place_building`] rejects out-of-bounds cells, unbuildable
//! terrain and cells covered by a building footprint.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buildings::{Building, BuildingId, BuildingType};
use crate::error::{BattleError, Result};
use crate::math::Location;
use crate::player::PlayerId;

/// Read-only terrain of a planet surface.
///
/// Shared with path-planning workers, so implementations must be
/// thread-safe.
pub trait Terrain: fmt::Debug + Send + Sync {
    /// Width in cells.
    fn width(&self) -> u32;

    /// Height in cells.
    fn height(&self) -> u32;

    /// Whether the terrain itself allows a building (or a vehicle) here.
    ///
    /// Out-of-bounds cells are never buildable.
    fn is_buildable(&self, location: Location) -> bool;

    /// Whether `location` lies on the grid.
    fn in_bounds(&self, location: Location) -> bool {
        location.x >= 0
            && location.y >= 0
            && (location.x as u32) < self.width()
            && (location.y as u32) < self.height()
    }
}

/// Terrain type of a single surface cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SurfaceCell {
    /// Open ground.
    #[default]
    Ground,
    /// Water, impassable for ground units.
    Water,
    /// Rock or cliffs, impassable.
    Rock,
}

impl SurfaceCell {
    /// Returns true if ground units can stand here.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Ground)
    }

    fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Self::Ground),
            '~' => Some(Self::Water),
            '#' => Some(Self::Rock),
            _ => None,
        }
    }
}

/// Rectangular terrain grid stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSurface {
    width: u32,
    height: u32,
    cells: Vec<SurfaceCell>,
}

impl GridSurface {
    /// Create an all-ground surface.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![SurfaceCell::Ground; cell_count],
        }
    }

    /// Parse a surface from text rows: `.` ground, `~` water, `#` rock.
    ///
    /// Row 0 is `y = 0`. All rows must have the same length.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count()) as u32;
        let mut cells = Vec::with_capacity((width * height) as usize);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() as u32 != width {
                return Err(BattleError::DataParseError {
                    source_name: "surface".into(),
                    message: format!("row {y} has length {}, expected {width}", row.len()),
                });
            }
            for glyph in row.chars() {
                let cell =
                    SurfaceCell::from_glyph(glyph).ok_or_else(|| BattleError::DataParseError {
                        source_name: "surface".into(),
                        message: format!("unknown surface glyph '{glyph}' in row {y}"),
                    })?;
                cells.push(cell);
            }
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    #[inline]
    fn index(&self, location: Location) -> usize {
        (location.y as usize) * (self.width as usize) + (location.x as usize)
    }

    /// Get the cell type, `None` if out of bounds.
    #[must_use]
    pub fn cell(&self, location: Location) -> Option<SurfaceCell> {
        self.in_bounds(location)
            .then(|| self.cells[self.index(location)])
    }

    /// Set a cell type. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, location: Location, cell: SurfaceCell) -> bool {
        if self.in_bounds(location) {
            let index = self.index(location);
            self.cells[index] = cell;
            true
        } else {
            false
        }
    }
}

impl Terrain for GridSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_buildable(&self, location: Location) -> bool {
        self.cell(location).is_some_and(SurfaceCell::is_open)
    }
}

/// A planet surface with its buildings.
#[derive(Debug)]
pub struct Planet {
    name: String,
    owner: PlayerId,
    terrain: Box<dyn Terrain>,
    buildings: BTreeMap<BuildingId, Building>,
    occupancy: HashMap<Location, BuildingId>,
    next_building_id: u32,
    needs_allocation: bool,
    road_rebuilds: u32,
}

impl Planet {
    /// Create a planet owned by `owner` with no buildings.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: PlayerId, terrain: impl Terrain + 'static) -> Self {
        Self {
            name: name.into(),
            owner,
            terrain: Box::new(terrain),
            buildings: BTreeMap::new(),
            occupancy: HashMap::new(),
            next_building_id: 1,
            needs_allocation: false,
            road_rebuilds: 0,
        }
    }

    /// Planet name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current owner (the defender while a battle runs).
    #[must_use]
    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    /// Transfer ownership of the planet and all its buildings.
    pub fn transfer_ownership(&mut self, new_owner: PlayerId) {
        self.owner = new_owner;
        for building in self.buildings.values_mut() {
            building.owner = new_owner;
        }
    }

    /// The terrain grid.
    #[must_use]
    pub fn terrain(&self) -> &dyn Terrain {
        self.terrain.as_ref()
    }

    /// True if a building (and therefore a ground unit) may occupy `location`.
    #[must_use]
    pub fn can_place_building(&self, location: Location) -> bool {
        self.terrain.is_buildable(location) && !self.occupancy.contains_key(&location)
    }

    /// Place a building of `building_type` with its top-left cell at `location`.
    pub fn place_building(
        &mut self,
        building_type: &BuildingType,
        owner: PlayerId,
        location: Location,
    ) -> Result<BuildingId> {
        let id = BuildingId(self.next_building_id);
        let building = Building::new(id, building_type, owner, location);
        if let Some(blocked) = building.cells().find(|c| !self.can_place_building(*c)) {
            return Err(BattleError::InvalidState(format!(
                "cannot place {} at ({}, {}): cell ({}, {}) is blocked",
                building_type.id, location.x, location.y, blocked.x, blocked.y
            )));
        }
        self.next_building_id += 1;
        for cell in building.cells() {
            self.occupancy.insert(cell, id);
        }
        self.buildings.insert(id, building);
        Ok(id)
    }

    /// Get a building by id.
    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Get a mutable building by id.
    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// The building covering `location`, if any.
    #[must_use]
    pub fn building_at(&self, location: Location) -> Option<&Building> {
        self.occupancy
            .get(&location)
            .and_then(|id| self.buildings.get(id))
    }

    /// All buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Number of buildings.
    #[must_use]
    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// Remove a building and free its footprint.
    pub fn remove_building(&mut self, id: BuildingId) -> Option<Building> {
        let building = self.buildings.remove(&id)?;
        for cell in building.cells() {
            self.occupancy.remove(&cell);
        }
        Some(building)
    }

    /// Remove every building whose construction never finished.
    pub fn remove_incomplete_buildings(&mut self) -> Vec<BuildingId> {
        let incomplete: Vec<_> = self
            .buildings
            .values()
            .filter(|b| !b.complete)
            .map(|b| b.id)
            .collect();
        for id in &incomplete {
            self.remove_building(*id);
        }
        incomplete
    }

    /// Ask the economic layer to rerun worker and energy allocation.
    pub fn request_allocation(&mut self) {
        self.needs_allocation = true;
    }

    /// Whether an allocation rerun is pending.
    #[must_use]
    pub fn needs_allocation(&self) -> bool {
        self.needs_allocation
    }

    /// Consume the allocation flag.
    pub fn take_allocation_request(&mut self) -> bool {
        std::mem::take(&mut self.needs_allocation)
    }

    /// Road network rebuild hook, called when the building layout changes.
    pub fn rebuild_roads(&mut self) {
        self.road_rebuilds += 1;
        tracing::trace!(planet = %self.name, rebuilds = self.road_rebuilds, "Roads rebuilt");
    }

    /// How many times the road network was rebuilt.
    #[must_use]
    pub fn road_rebuilds(&self) -> u32 {
        self.road_rebuilds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::{BuildingFootprint, BuildingKind};

    fn depot() -> BuildingType {
        BuildingType::new("depot", 300, BuildingKind::Civilian)
            .with_footprint(BuildingFootprint::square(2))
    }

    #[test]
    fn test_surface_from_rows() {
        let surface = GridSurface::from_rows(&["..~", ".#."]).unwrap();
        assert_eq!(surface.width(), 3);
        assert_eq!(surface.height(), 2);
        assert!(surface.is_buildable(Location::new(0, 0)));
        assert!(!surface.is_buildable(Location::new(2, 0)));
        assert!(!surface.is_buildable(Location::new(1, 1)));
        assert!(!surface.is_buildable(Location::new(-1, 0)));
        assert!(!surface.is_buildable(Location::new(3, 0)));
    }

    #[test]
    fn test_surface_rejects_ragged_rows() {
        assert!(GridSurface::from_rows(&["...", ".."]).is_err());
        assert!(GridSurface::from_rows(&["..x"]).is_err());
    }

    #[test]
    fn test_building_blocks_placement() {
        let mut planet = Planet::new("Ymir", PlayerId(2), GridSurface::new(8, 8));
        let id = planet
            .place_building(&depot(), PlayerId(2), Location::new(2, 2))
            .unwrap();

        assert!(!planet.can_place_building(Location::new(3, 3)));
        assert!(planet.can_place_building(Location::new(4, 3)));
        assert_eq!(planet.building_at(Location::new(2, 3)).map(|b| b.id), Some(id));

        // Overlapping placement fails
        assert!(planet
            .place_building(&depot(), PlayerId(2), Location::new(3, 3))
            .is_err());

        planet.remove_building(id);
        assert!(planet.can_place_building(Location::new(3, 3)));
    }

    #[test]
    fn test_remove_incomplete_buildings() {
        let mut planet = Planet::new("Ymir", PlayerId(2), GridSurface::new(8, 8));
        let done = planet
            .place_building(&depot(), PlayerId(2), Location::new(0, 0))
            .unwrap();
        let pending = planet
            .place_building(&depot(), PlayerId(2), Location::new(4, 4))
            .unwrap();
        planet.building_mut(pending).unwrap().complete = false;

        assert_eq!(planet.remove_incomplete_buildings(), vec![pending]);
        assert!(planet.building(done).is_some());
        assert!(planet.can_place_building(Location::new(4, 4)));
    }

    #[test]
    fn test_transfer_ownership() {
        let mut planet = Planet::new("Ymir", PlayerId(2), GridSurface::new(8, 8));
        let id = planet
            .place_building(&depot(), PlayerId(2), Location::new(0, 0))
            .unwrap();
        planet.transfer_ownership(PlayerId(1));
        assert_eq!(planet.owner(), PlayerId(1));
        assert_eq!(planet.building(id).unwrap().owner, PlayerId(1));
    }
}

//! Batched, parallel path planning.
//!
//! Requests queue up in arrival order, at most one per unit. Each tick a
//! batch is taken from the front of the queue and searched on a rayon pool
//! while the tick thread waits. Results come back in submission order.
//!
//! Workers only read the battle through a [`Passability`] view; no unit
//! state changes while a batch runs.

use std::collections::{HashSet, VecDeque};

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::config::BattleConfig;
use crate::error::{Diagnostics, Result, ViolationKind};
use crate::math::Location;
use crate::pathfinding::Pathfinder;
use crate::planet::Planet;
use crate::player::PlayerId;
use crate::spatial::SpatialIndex;
use crate::unit::{UnitId, UnitStorage};

/// A pending path search for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequest {
    /// The unit that will follow the path.
    pub unit: UnitId,
    /// Start cell.
    pub from: Location,
    /// Goal cell.
    pub goal: Location,
    /// Units of this player never block the search.
    pub ignore: Option<PlayerId>,
}

/// A finished search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    /// The request that produced this path.
    pub request: PathRequest,
    /// Cells from the start cell to the goal or the nearest reachable cell.
    pub cells: Vec<Location>,
}

/// Read-only passability view shared with worker threads.
#[derive(Debug, Clone, Copy)]
pub struct Passability<'a> {
    planet: &'a Planet,
    index: &'a SpatialIndex,
    units: &'a UnitStorage,
    half_yield: u32,
}

impl<'a> Passability<'a> {
    /// Build a view over the battle state.
    #[must_use]
    pub fn new(
        planet: &'a Planet,
        index: &'a SpatialIndex,
        units: &'a UnitStorage,
        half_yield: u32,
    ) -> Self {
        Self {
            planet,
            index,
            units,
            half_yield,
        }
    }

    /// A cell is passable if the surface allows it and every unit standing
    /// there is about to leave, is waiting for a path, or belongs to
    /// `ignore`.
    #[must_use]
    pub fn is_passable(&self, cell: Location, ignore: Option<PlayerId>) -> bool {
        if !self.planet.can_place_building(cell) {
            return false;
        }
        self.index.units_at(cell).map_or(true, |bucket| {
            bucket.iter().all(|id| {
                self.units
                    .get(*id)
                    .map_or(true, |u| u.is_non_blocking(self.half_yield, ignore))
            })
        })
    }
}

/// Queue of path requests and the worker pool that serves them.
#[derive(Debug)]
pub struct PathPlanner {
    queue: VecDeque<PathRequest>,
    pending: HashSet<UnitId>,
    pool: ThreadPool,
    batch_size: usize,
    max_expansions: usize,
}

impl PathPlanner {
    /// Create a planner with its own worker pool.
    pub fn new(config: &BattleConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.path_workers)
            .thread_name(|i| format!("path-worker-{i}"))
            .build()?;
        Ok(Self {
            queue: VecDeque::new(),
            pending: HashSet::new(),
            pool,
            batch_size: config.path_batch_size.max(1),
            max_expansions: config.max_path_expansions,
        })
    }

    /// Queue a request. A second request for the same unit is reported and
    /// ignored.
    pub fn enqueue(&mut self, request: PathRequest, diagnostics: &mut Diagnostics) -> bool {
        if !self.pending.insert(request.unit) {
            diagnostics.report(
                ViolationKind::DuplicatePathRequest,
                format!("{} already has a path request queued", request.unit),
            );
            return false;
        }
        tracing::trace!(
            unit = %request.unit,
            from = ?request.from,
            goal = ?request.goal,
            "Path request queued"
        );
        self.queue.push_back(request);
        true
    }

    /// Remove a queued request. Returns true if one was queued.
    pub fn withdraw(&mut self, unit: UnitId) -> bool {
        if !self.pending.remove(&unit) {
            return false;
        }
        self.queue.retain(|r| r.unit != unit);
        true
    }

    /// Whether `unit` has a request queued.
    #[must_use]
    pub fn is_pending(&self, unit: UnitId) -> bool {
        self.pending.contains(&unit)
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued requests in order.
    pub fn queued(&self) -> impl Iterator<Item = &PathRequest> {
        self.queue.iter()
    }

    /// Search the next batch and block until every search finished.
    ///
    /// Results are in submission order.
    pub fn run_batch(&mut self, view: &Passability<'_>) -> Vec<PathResult> {
        let count = self.batch_size.min(self.queue.len());
        if count == 0 {
            return Vec::new();
        }
        let batch: Vec<PathRequest> = self.queue.drain(..count).collect();
        for request in &batch {
            self.pending.remove(&request.unit);
        }

        let max_expansions = self.max_expansions;
        let results: Vec<PathResult> = self.pool.install(|| {
            batch
                .par_iter()
                .map(|request| {
                    let finder = Pathfinder::new(|cell: Location| view.is_passable(cell, request.ignore))
                        .with_max_expansions(max_expansions);
                    PathResult {
                        request: *request,
                        cells: finder.search_approximate(request.from, request.goal),
                    }
                })
                .collect()
        });
        tracing::debug!(searched = results.len(), queued = self.queue.len(), "Path batch done");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planet::GridSurface;

    fn request(unit: u32, goal: (i32, i32)) -> PathRequest {
        PathRequest {
            unit: UnitId(unit),
            from: Location::new(0, 0),
            goal: Location::new(goal.0, goal.1),
            ignore: None,
        }
    }

    fn planner(batch: usize) -> PathPlanner {
        let config = BattleConfig {
            path_batch_size: batch,
            path_workers: 2,
            ..BattleConfig::default()
        };
        PathPlanner::new(&config).unwrap()
    }

    #[test]
    fn test_duplicate_request_is_reported() {
        let mut planner = planner(10);
        let mut diagnostics = Diagnostics::new();
        assert!(planner.enqueue(request(1, (3, 0)), &mut diagnostics));
        assert!(!planner.enqueue(request(1, (5, 0)), &mut diagnostics));
        assert_eq!(planner.len(), 1);
        assert_eq!(diagnostics.count(ViolationKind::DuplicatePathRequest), 1);
    }

    #[test]
    fn test_withdraw() {
        let mut planner = planner(10);
        let mut diagnostics = Diagnostics::new();
        planner.enqueue(request(1, (3, 0)), &mut diagnostics);
        planner.enqueue(request(2, (3, 0)), &mut diagnostics);
        assert!(planner.withdraw(UnitId(1)));
        assert!(!planner.withdraw(UnitId(1)));
        assert_eq!(planner.queued().map(|r| r.unit).collect::<Vec<_>>(), vec![UnitId(2)]);
    }

    #[test]
    fn test_batch_size_and_order() {
        let mut planner = planner(3);
        let mut diagnostics = Diagnostics::new();
        for unit in 1..=5 {
            planner.enqueue(request(unit, (unit as i32, 2)), &mut diagnostics);
        }

        let planet = Planet::new("test", PlayerId(1), GridSurface::new(10, 10));
        let index = SpatialIndex::new();
        let units = UnitStorage::new();
        let view = Passability::new(&planet, &index, &units, 5);

        let results = planner.run_batch(&view);
        let order: Vec<_> = results.iter().map(|r| r.request.unit).collect();
        assert_eq!(order, vec![UnitId(1), UnitId(2), UnitId(3)]);
        assert_eq!(results[2].cells.last(), Some(&Location::new(3, 2)));
        assert_eq!(planner.len(), 2);
        assert!(!planner.is_pending(UnitId(1)));
        assert!(planner.is_pending(UnitId(4)));
    }
}

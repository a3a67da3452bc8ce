//! Grid-based pathfinding using the A* algorithm.
//!
//! All costs are integers: an orthogonal step costs 1000, a diagonal step
//! 1414, and the heuristic is the Manhattan distance × 1000. Diagonal steps
//! may not cut the corner of a blocked cell.
//!
//! The passability predicate is supplied by the caller, which lets the same
//! search run against the live battle view on a worker thread.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::math::{isqrt, Location};

/// Cost of an orthogonal step.
pub const ORTHOGONAL_COST: u32 = 1000;

/// Cost of a diagonal step.
pub const DIAGONAL_COST: u32 = 1414;

/// Default node expansion limit.
pub const DEFAULT_MAX_EXPANSIONS: usize = 20_000;

/// Direction offsets for 8-directional movement.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    cell: Location,
    g_score: u32,
    f_score: u32,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; lower f_score must come out first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn tie_breaker(cell: Location) -> u64 {
    (u64::from(cell.y as u32) << 32) | u64::from(cell.x as u32)
}

/// Manhattan distance × 1000.
#[must_use]
pub fn manhattan_estimate(from: Location, to: Location) -> u32 {
    (from.x.abs_diff(to.x) + from.y.abs_diff(to.y)) * ORTHOGONAL_COST
}

/// Euclidean distance × 1000, rounded down.
#[must_use]
pub fn euclidean_distance(from: Location, to: Location) -> u64 {
    let dx = u64::from(from.x.abs_diff(to.x));
    let dy = u64::from(from.y.abs_diff(to.y));
    isqrt((dx * dx + dy * dy) * 1_000_000)
}

/// Cost of stepping by `(dx, dy)`.
#[inline]
const fn step_cost(dx: i32, dy: i32) -> u32 {
    if dx != 0 && dy != 0 {
        DIAGONAL_COST
    } else {
        ORTHOGONAL_COST
    }
}

/// A* search under a caller-supplied passability predicate.
#[derive(Debug, Clone)]
pub struct Pathfinder<F> {
    passable: F,
    max_expansions: usize,
}

/// Outcome of one A* run.
struct SearchState {
    came_from: HashMap<Location, Location>,
    reached_goal: bool,
    /// Closest explored cell to the goal: (euclidean, g, cell).
    closest: (u64, u32, Location),
}

impl<F> Pathfinder<F>
where
    F: Fn(Location) -> bool,
{
    /// Create a pathfinder over `passable`.
    pub fn new(passable: F) -> Self {
        Self {
            passable,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }

    /// Builder method to bound the number of expanded nodes.
    #[must_use]
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Whether `cell` can be entered.
    #[must_use]
    pub fn is_passable(&self, cell: Location) -> bool {
        (self.passable)(cell)
    }

    /// A diagonal step needs both adjacent orthogonal cells free.
    fn is_diagonal_valid(&self, from: Location, dx: i32, dy: i32) -> bool {
        if dx != 0 && dy != 0 {
            self.is_passable(from.offset(dx, 0)) && self.is_passable(from.offset(0, dy))
        } else {
            true
        }
    }

    /// Find a path from `start` to `goal`.
    ///
    /// The returned cells include `start` and `goal`. The start cell is
    /// never tested for passability. Returns `None` if the goal cannot be
    /// reached within the expansion limit.
    #[must_use]
    pub fn search(&self, start: Location, goal: Location) -> Option<Vec<Location>> {
        let state = self.run(start, goal);
        state
            .reached_goal
            .then(|| reconstruct_path(&state.came_from, start, goal))
    }

    /// Find a path to `goal`, or to the reachable cell nearest to it.
    ///
    /// Nearness is the true Euclidean distance; ties go to the cheaper cell.
    /// Used for targets that are themselves impassable, such as buildings.
    /// Returns `[start]` if no explored cell is closer than the start.
    #[must_use]
    pub fn search_approximate(&self, start: Location, goal: Location) -> Vec<Location> {
        let state = self.run(start, goal);
        let end = if state.reached_goal {
            goal
        } else {
            state.closest.2
        };
        reconstruct_path(&state.came_from, start, end)
    }

    fn run(&self, start: Location, goal: Location) -> SearchState {
        let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
        let mut came_from: HashMap<Location, Location> = HashMap::new();
        let mut g_score: HashMap<Location, u32> = HashMap::new();
        let mut closed: HashSet<Location> = HashSet::new();
        let mut closest = (euclidean_distance(start, goal), 0, start);

        g_score.insert(start, 0);
        open_set.push(AStarNode {
            cell: start,
            g_score: 0,
            f_score: manhattan_estimate(start, goal),
            tie_breaker: tie_breaker(start),
        });

        let mut expansions = 0;
        while let Some(current) = open_set.pop() {
            if current.cell == goal {
                return SearchState {
                    came_from,
                    reached_goal: true,
                    closest,
                };
            }
            if !closed.insert(current.cell) {
                continue;
            }
            expansions += 1;
            if expansions > self.max_expansions {
                break;
            }

            let distance = euclidean_distance(current.cell, goal);
            if (distance, current.g_score) < (closest.0, closest.1) {
                closest = (distance, current.g_score, current.cell);
            }

            for &(dx, dy) in &DIRECTIONS {
                let neighbor = current.cell.offset(dx, dy);
                if closed.contains(&neighbor) || !self.is_passable(neighbor) {
                    continue;
                }
                if !self.is_diagonal_valid(current.cell, dx, dy) {
                    continue;
                }

                let tentative_g = current.g_score + step_cost(dx, dy);
                let neighbor_g = g_score.get(&neighbor).copied().unwrap_or(u32::MAX);
                if tentative_g < neighbor_g {
                    came_from.insert(neighbor, current.cell);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(AStarNode {
                        cell: neighbor,
                        g_score: tentative_g,
                        f_score: tentative_g + manhattan_estimate(neighbor, goal),
                        tie_breaker: tie_breaker(neighbor),
                    });
                }
            }
        }

        SearchState {
            came_from,
            reached_goal: false,
            closest,
        }
    }
}

/// Walk `came_from` back from `end` to `start`.
fn reconstruct_path(
    came_from: &HashMap<Location, Location>,
    start: Location,
    end: Location,
) -> Vec<Location> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        match came_from.get(&current) {
            Some(&previous) => {
                path.push(previous);
                current = previous;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Open 10×10 grid with the given blocked cells.
    fn grid(blocked: &[(i32, i32)]) -> impl Fn(Location) -> bool + '_ {
        move |cell: Location| {
            (0..10).contains(&cell.x)
                && (0..10).contains(&cell.y)
                && !blocked.contains(&(cell.x, cell.y))
        }
    }

    #[test]
    fn test_straight_path() {
        let finder = Pathfinder::new(grid(&[]));
        let path = finder
            .search(Location::new(0, 0), Location::new(4, 0))
            .unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.first(), Some(&Location::new(0, 0)));
        assert_eq!(path.last(), Some(&Location::new(4, 0)));
    }

    #[test]
    fn test_diagonal_path_uses_diagonals() {
        let finder = Pathfinder::new(grid(&[]));
        let path = finder
            .search(Location::new(0, 0), Location::new(3, 3))
            .unwrap();
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_no_corner_cutting() {
        // (1,0) blocked: the diagonal (0,0)->(1,1) would cut its corner.
        let blocked = [(1, 0)];
        let finder = Pathfinder::new(grid(&blocked));
        let path = finder
            .search(Location::new(0, 0), Location::new(1, 1))
            .unwrap();
        assert_eq!(
            path,
            vec![Location::new(0, 0), Location::new(0, 1), Location::new(1, 1)]
        );
    }

    #[test]
    fn test_walled_goal_is_unreachable() {
        let wall = [(4, 4), (5, 4), (6, 4), (4, 5), (6, 5), (4, 6), (5, 6), (6, 6)];
        let finder = Pathfinder::new(grid(&wall));
        assert!(finder
            .search(Location::new(0, 0), Location::new(5, 5))
            .is_none());
    }

    #[test]
    fn test_approximate_ends_next_to_blocked_goal() {
        let blocked = [(5, 5)];
        let finder = Pathfinder::new(grid(&blocked));
        let path = finder.search_approximate(Location::new(0, 5), Location::new(5, 5));
        assert_eq!(path.last(), Some(&Location::new(4, 5)));
    }

    #[test]
    fn test_approximate_without_progress_returns_start() {
        let finder = Pathfinder::new(|cell: Location| cell == Location::new(0, 0));
        let path = finder.search_approximate(Location::new(0, 0), Location::new(5, 0));
        assert_eq!(path, vec![Location::new(0, 0)]);
    }

    #[test]
    fn test_expansion_limit() {
        let finder = Pathfinder::new(grid(&[])).with_max_expansions(2);
        assert!(finder
            .search(Location::new(0, 0), Location::new(9, 9))
            .is_none());
    }

    #[test]
    fn test_search_is_deterministic() {
        let finder = Pathfinder::new(grid(&[(3, 3), (3, 4), (4, 3)]));
        let first = finder.search(Location::new(0, 0), Location::new(8, 7));
        for _ in 0..10 {
            assert_eq!(finder.search(Location::new(0, 0), Location::new(8, 7)), first);
        }
    }

    #[test]
    fn test_estimates() {
        let a = Location::new(0, 0);
        let b = Location::new(3, 4);
        assert_eq!(manhattan_estimate(a, b), 7000);
        assert_eq!(euclidean_distance(a, b), 5000);
    }
}

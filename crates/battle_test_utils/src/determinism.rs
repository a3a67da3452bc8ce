//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a battle produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Battles must replay exactly from a seed. Sources of non-determinism
//! include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`battle_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Units, guns and buildings are always visited in id order.
//!
//! - **Worker threads**: Path searches run on a pool, but results are
//!   applied in submission order.
//!
//! - **System randomness**: The battle owns a seeded RNG; nothing else
//!   draws random numbers.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual passes (movement, combat, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full battles are reproducible
//! 4. **Parallel tests**: Running N battles in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use battle_core::battle::BattleSnapshot;
use battle_core::simulation::BattleSimulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the battle was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use battle_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     || setup_skirmish(),
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battle twice from the same setup and compare the final hashes.
pub fn verify_battle_determinism<F>(setup_fn: F, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> BattleSimulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        BattleSimulation::state_hash,
    )
}

/// Run N battles on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// variations, such as the path planner's worker pool racing another
/// battle's.
pub fn run_parallel_battles<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> BattleSimulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two battle runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if the runs match, `Some(tick)` if they diverge at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> BattleSimulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot survives a bincode round trip byte for byte.
pub fn verify_snapshot_round_trip<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> BattleSimulation,
{
    let mut sim = setup_fn();
    for _ in 0..num_ticks {
        sim.tick();
    }

    let Ok(bytes) = sim.battle().snapshot().to_bytes() else {
        return false;
    };
    let Ok(restored) = BattleSnapshot::from_bytes(&bytes) else {
        return false;
    };
    restored.to_bytes().is_ok_and(|again| again == bytes)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for battle testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use battle_core::math::{Fixed, Location};
    use proptest::prelude::*;

    /// A cell inside a `size` x `size` map.
    pub fn arb_location(size: i32) -> impl Strategy<Value = Location> {
        (0..size, 0..size).prop_map(|(x, y)| Location::new(x, y))
    }

    /// A battle seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Hitpoints in a typical range.
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..1000
    }

    /// Damage in a typical range.
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        1u32..200
    }

    /// An angle in whole degrees as fixed-point.
    pub fn arb_degrees() -> impl Strategy<Value = Fixed> {
        (0i32..360).prop_map(Fixed::from_num)
    }

    /// Fixture model ids that fight.
    pub fn arb_combat_model() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("tank"),
            Just("artillery"),
            Just("kamikaze"),
            Just("paralyzer"),
            Just("rocket_sled"),
        ]
    }

    /// A list of (model, cell) deployments.
    pub fn arb_deployments(
        max_units: usize,
        size: i32,
    ) -> impl Strategy<Value = Vec<(&'static str, Location)>> {
        prop::collection::vec((arb_combat_model(), arb_location(size)), 1..=max_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{BattleBuilder, ATTACKER, DEFENDER};

    fn duel() -> BattleSimulation {
        BattleBuilder::new()
            .with_seed(11)
            .with_unit(ATTACKER, "tank", (2, 2))
            .with_unit(DEFENDER, "tank", (12, 2))
            .simulation()
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_non_determinism_is_reported() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let counter = AtomicU64::new(0);
        let result = verify_determinism(
            2,
            1,
            || counter.fetch_add(1, Ordering::SeqCst),
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_duel_is_deterministic() {
        verify_battle_determinism(duel, 100).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(duel, 50), None);
    }

    #[test]
    fn test_snapshot_round_trip() {
        assert!(verify_snapshot_round_trip(duel, 20));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "x")), compute_hash(&(1u32, "x")));
    }
}

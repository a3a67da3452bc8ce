//! Benchmarks for battle_core.
//!
//! Run with: `cargo bench -p battle_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use battle_core::math::Location;
use battle_core::pathfinding::Pathfinder;
use battle_core::prelude::*;
use battle_test_utils::fixtures::{BattleBuilder, ATTACKER, DEFENDER};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// A 64x64 grid with a wall that forces a detour.
fn walled(cell: Location) -> bool {
    let in_bounds = (0..64).contains(&cell.x) && (0..64).contains(&cell.y);
    in_bounds && !(cell.x == 32 && cell.y < 60)
}

fn skirmish() -> BattleSimulation {
    let mut builder = BattleBuilder::new()
        .with_size(48, 48)
        .with_seed(1)
        .with_building("bunker", (40, 20))
        .with_building("battery", (40, 28));
    for y in (4..44).step_by(4) {
        builder = builder
            .with_unit(ATTACKER, "tank", (2, y))
            .with_unit(DEFENDER, "tank", (36, y));
    }
    builder
        .simulation()
        .with_ai(SkirmishAi::new(ATTACKER))
        .with_ai(SkirmishAi::new(DEFENDER).with_stance(Stance::Defensive))
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let finder = Pathfinder::new(walled);
    c.bench_function("astar_64x64_detour", |b| {
        b.iter(|| finder.search(black_box(Location::new(2, 2)), black_box(Location::new(62, 2))))
    });
    c.bench_function("astar_approximate_unreachable", |b| {
        b.iter(|| {
            finder.search_approximate(black_box(Location::new(2, 2)), black_box(Location::new(99, 99)))
        })
    });
}

pub fn tick_benchmark(c: &mut Criterion) {
    c.bench_function("skirmish_100_ticks", |b| {
        b.iter_batched(
            skirmish,
            |mut sim| {
                for _ in 0..100 {
                    black_box(sim.tick());
                }
                sim.state_hash()
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, pathfinding_benchmark, tick_benchmark);
criterion_main!(benches);

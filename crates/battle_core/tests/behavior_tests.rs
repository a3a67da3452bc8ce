//! Target selection, engagement and firing positions.

use battle_core::prelude::*;
use battle_test_utils::fixtures::{fixed, fixed_f, tick_until, BattleBuilder, ATTACKER, DEFENDER};

fn hp(battle: &GroundBattle, id: UnitId) -> u32 {
    battle.unit(id).map_or(0, |u| u.hp)
}

fn distance(battle: &GroundBattle, a: UnitId, b: UnitId) -> Option<Fixed> {
    let a = battle.unit(a)?.position;
    let b = battle.unit(b)?.position;
    Some(a.distance(b))
}

fn target_of(battle: &GroundBattle, id: UnitId) -> Option<AttackTarget> {
    battle.unit(id).and_then(|u| u.target)
}

// =========================================================================
// Firing positions
// =========================================================================

#[test]
fn test_get_closer_unit_steps_in_between_shots() {
    let (battle, units, _) = BattleBuilder::new()
        .with_config(BattleConfig::default().with_get_closer("tank"))
        .with_unit(ATTACKER, "tank", (2, 2))
        .with_unit(DEFENDER, "tank", (5, 2))
        .with_unit(DEFENDER, "tank", (25, 25))
        .build_with_ids();
    let (shooter, victim) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut().order_attack_unit(shooter, victim).unwrap();

    let mut closest = fixed(3);
    for _ in 0..60 {
        sim.tick();
        match distance(sim.battle(), shooter, victim) {
            Some(d) if hp(sim.battle(), victim) > 0 => closest = closest.min(d),
            _ => break,
        }
    }

    assert!(closest <= fixed(2), "never stepped closer: {closest}");
    assert!(hp(sim.battle(), victim) < 100);
    let cell = sim.battle().unit(shooter).map(Unit::cell).expect("alive");
    assert_eq!(cell.y, 2);
    assert!((3..=4).contains(&cell.x), "ended on {cell:?}");
}

#[test]
fn test_plain_unit_holds_its_firing_position() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "tank", (2, 2))
        .with_unit(DEFENDER, "tank", (5, 2))
        .with_unit(DEFENDER, "tank", (25, 25))
        .build_with_ids();
    let (shooter, victim) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut().order_attack_unit(shooter, victim).unwrap();

    for _ in 0..30 {
        sim.tick();
        let unit = sim.battle().unit(shooter).expect("alive");
        assert_eq!(unit.position, Location::new(2, 2).center());
    }
    assert_eq!(hp(sim.battle(), victim), 40);
}

#[test]
fn test_unit_backs_out_of_its_dead_zone_before_firing() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "artillery", (2, 2))
        .with_unit(DEFENDER, "tank", (4, 2))
        .with_unit(DEFENDER, "tank", (25, 25))
        .build_with_ids();
    let (gunner, victim) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut().order_attack_unit(gunner, victim).unwrap();

    let mut fired_from = None;
    for _ in 0..200 {
        sim.tick();
        if hp(sim.battle(), victim) < 100 {
            fired_from = distance(sim.battle(), gunner, victim);
            break;
        }
    }

    let fired_from = fired_from.expect("never fired");
    assert!(fired_from >= fixed(3), "fired from inside the dead zone: {fired_from}");
    assert!(fired_from <= fixed(7));
    assert_eq!(hp(sim.battle(), victim), 60);
}

#[test]
fn test_building_takes_scaled_hits_every_delay_ticks() {
    let (battle, units, buildings) = BattleBuilder::new()
        .with_defender_multiplier(fixed_f(1.5))
        .with_building("habitat", (4, 2))
        .with_unit(ATTACKER, "tank", (2, 2))
        .with_unit(DEFENDER, "tank", (25, 25))
        .build_with_ids();
    let (shooter, habitat) = (units[0], buildings[0]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut()
        .order_attack_building(shooter, habitat)
        .unwrap();
    let hitpoints = |sim: &BattleSimulation| {
        sim.battle()
            .planet()
            .building(habitat)
            .map(|b| b.hitpoints)
    };

    // floor(20 * 150 / 225) = 13 per shot, one shot per 10 ticks.
    let mut expected = 150;
    for tick in 1..=31 {
        sim.tick();
        if tick % 10 == 1 {
            expected -= 13;
        }
        assert_eq!(hitpoints(&sim), Some(expected), "tick {tick}");
    }
    assert_eq!(hp(sim.battle(), shooter), 100);
}

// =========================================================================
// Target acquisition
// =========================================================================

#[test]
fn test_direct_attack_units_pick_units_before_buildings() {
    let (battle, units, _) = BattleBuilder::new()
        .with_config(BattleConfig::default().with_direct_attack("tank"))
        .with_building("bunker", (10, 10))
        .with_unit(ATTACKER, "tank", (13, 10))
        .with_unit(DEFENDER, "tank", (13, 12))
        .build_with_ids();
    let (attacker, defender) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);

    sim.tick();
    assert_eq!(
        target_of(sim.battle(), attacker),
        Some(AttackTarget::Unit(defender))
    );
    assert_eq!(
        target_of(sim.battle(), defender),
        Some(AttackTarget::Unit(attacker))
    );
}

#[test]
fn test_direct_attack_units_fall_back_to_defensive_buildings() {
    let (battle, units, buildings) = BattleBuilder::new()
        .with_config(BattleConfig::default().with_direct_attack("tank"))
        .with_building("bunker", (10, 10))
        .with_building("habitat", (14, 10))
        .with_unit(ATTACKER, "tank", (13, 10))
        .build_with_ids();
    let (attacker, bunker) = (units[0], buildings[0]);
    let mut sim = BattleSimulation::new(battle);

    sim.tick();
    assert_eq!(
        target_of(sim.battle(), attacker),
        Some(AttackTarget::Building(bunker))
    );
}

#[test]
fn test_idle_units_wait_for_orders() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "tank", (5, 5))
        .with_unit(DEFENDER, "tank", (7, 5))
        .build_with_ids();
    let mut sim = BattleSimulation::new(battle);
    for _ in 0..5 {
        sim.tick();
    }
    assert_eq!(target_of(sim.battle(), units[0]), None);
    assert_eq!(target_of(sim.battle(), units[1]), None);
    assert_eq!(hp(sim.battle(), units[0]), 100);
    assert_eq!(hp(sim.battle(), units[1]), 100);
}

#[test]
fn test_guard_drops_a_target_that_leaves_range() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "tank", (5, 5))
        .with_unit(DEFENDER, "tank", (7, 5))
        .build_with_ids();
    let (guard, runner) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut().order_guard(guard).unwrap();
    sim.battle_mut()
        .order_move(runner, Location::new(16, 5))
        .unwrap();

    let post = Location::new(5, 5).center();
    let ticks = tick_until(&mut sim, 300, |s| {
        let unit = s.battle().unit(guard).expect("guard alive");
        assert_eq!(unit.position, post, "guard left its post");
        s.battle()
            .unit(runner)
            .is_some_and(|u| u.cell() == Location::new(16, 5) && !u.is_moving())
    });

    assert!(ticks < 300, "runner never got away");
    assert!(hp(sim.battle(), runner) < 100, "guard never fired");
    let unit = sim.battle().unit(guard).expect("alive");
    assert!(unit.guard);
    assert_eq!(unit.target, None);
    assert!(!unit.is_moving());
    assert!(!unit.in_motion_planning);
}

#[test]
fn test_attack_move_engages_then_carries_on() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "tank", (2, 2))
        .with_unit(DEFENDER, "tank", (9, 3))
        .with_unit(DEFENDER, "tank", (28, 28))
        .build_with_ids();
    let (raider, victim) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);
    let destination = Location::new(16, 2);
    sim.battle_mut()
        .order_attack_move(raider, destination)
        .unwrap();

    let mut engaged = false;
    let ticks = tick_until(&mut sim, 600, |s| {
        engaged |= target_of(s.battle(), raider) == Some(AttackTarget::Unit(victim));
        s.battle()
            .unit(raider)
            .is_some_and(|u| u.position == destination.center() && !u.is_moving())
    });

    assert!(ticks < 600, "never reached the destination");
    assert!(engaged, "passed the enemy without engaging");
    assert_eq!(hp(sim.battle(), victim), 0);
    sim.tick();
    assert_eq!(sim.battle().unit(raider).and_then(|u| u.attack_move), None);
}

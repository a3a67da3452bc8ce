//! Damage, turret and ability scenarios.

use battle_core::prelude::*;
use battle_test_utils::fixtures::{fixed, BattleBuilder, ATTACKER, DEFENDER};

fn hp(battle: &GroundBattle, id: UnitId) -> u32 {
    battle.unit(id).map_or(0, |u| u.hp)
}

#[test]
fn test_battery_volleys_every_delay_ticks() {
    let (battle, units, _) = BattleBuilder::new()
        .with_building("battery", (10, 10))
        .with_unit(ATTACKER, "tank", (12, 10))
        .build_with_ids();
    let tank = units[0];
    let mut sim = BattleSimulation::new(battle);

    // Four guns of 5 damage fire on tick 1, then every 4 ticks.
    sim.tick();
    assert_eq!(hp(sim.battle(), tank), 80);
    for _ in 0..3 {
        sim.tick();
    }
    assert_eq!(hp(sim.battle(), tank), 80);
    sim.tick();
    assert_eq!(hp(sim.battle(), tank), 60);

    while sim.current_tick() < 17 {
        sim.tick();
    }
    assert_eq!(hp(sim.battle(), tank), 0);
    assert_eq!(sim.battle().winner(), Some(DEFENDER));
    assert!(!sim.battle().is_concluded(), "explosions still running");

    // The unit's explosion runs 12 phases after the killing volley.
    let outcome = sim.run_to_completion(100).expect("concluded");
    assert_eq!(outcome.tick, 29);
    assert_eq!(outcome.winner, DEFENDER);
    assert!(!outcome.conquered);
    assert!(sim.battle().unit(tank).is_none());
    assert!(sim.battle().diagnostics().is_empty());
}

#[test]
fn test_building_loses_half_its_turrets_below_half_hp() {
    let (mut battle, _, buildings) = BattleBuilder::new()
        .with_building("battery", (10, 10))
        .with_unit(ATTACKER, "tank", (2, 2))
        .build_with_ids();
    let battery = buildings[0];
    assert_eq!(battle.guns().for_building(battery).len(), 4);

    battle.damage_building(battery, 100, Some(ATTACKER));
    assert_eq!(battle.planet().building(battery).map(|b| b.hitpoints), Some(100));
    assert_eq!(battle.guns().for_building(battery).len(), 4);

    battle.damage_building(battery, 1, Some(ATTACKER));
    assert_eq!(battle.guns().for_building(battery).len(), 2);

    battle.damage_building(battery, 99, Some(ATTACKER));
    assert!(battle.planet().building(battery).is_none());
    assert!(battle.guns().is_empty());

    let stats = battle.statistics();
    assert_eq!(stats.player(ATTACKER).buildings_destroyed, 1);
    assert_eq!(stats.player(ATTACKER).buildings_destroyed_cost, 1200);
    assert_eq!(stats.player(DEFENDER).buildings_lost, 1);
    assert_eq!(stats.world().buildings_lost, 1);
    assert!(battle.planet().road_rebuilds() >= 1);
}

#[test]
fn test_damaged_building_starts_with_half_turrets() {
    let (battle, _, buildings) = BattleBuilder::new()
        .with_damaged_building("battery", (10, 10), 90)
        .with_unit(ATTACKER, "tank", (2, 2))
        .build_with_ids();
    assert_eq!(battle.guns().for_building(buildings[0]).len(), 2);
}

#[test]
fn test_incomplete_building_has_no_guns() {
    let (battle, _, buildings) = BattleBuilder::new()
        .with_incomplete_building("bunker", (10, 10))
        .with_unit(ATTACKER, "tank", (2, 2))
        .build_with_ids();
    assert!(battle.guns().for_building(buildings[0]).is_empty());
}

#[test]
fn test_hitpoint_multiplier_scales_building_damage() {
    let (mut battle, _, buildings) = BattleBuilder::new()
        .with_defender_multiplier(fixed(2))
        .with_building("battery", (10, 10))
        .with_unit(ATTACKER, "tank", (2, 2))
        .build_with_ids();
    battle.damage_building(buildings[0], 100, Some(ATTACKER));
    assert_eq!(
        battle.planet().building(buildings[0]).map(|b| b.hitpoints),
        Some(150)
    );
}

#[test]
fn test_civilian_damage_requests_allocation() {
    let (mut battle, _, buildings) = BattleBuilder::new()
        .with_building("habitat", (10, 10))
        .with_building("battery", (20, 20))
        .with_unit(ATTACKER, "tank", (2, 2))
        .build_with_ids();
    assert!(!battle.planet().needs_allocation());

    battle.damage_building(buildings[1], 10, Some(ATTACKER));
    assert!(!battle.planet().needs_allocation());

    battle.damage_building(buildings[0], 10, Some(ATTACKER));
    assert!(battle.planet_mut().take_allocation_request());
}

#[test]
fn test_area_damage_falls_off_and_spares_the_shooter() {
    let (mut battle, units, _) = BattleBuilder::new()
        .with_unit(DEFENDER, "tank", (5, 5))
        .with_unit(DEFENDER, "tank", (6, 5))
        .with_unit(DEFENDER, "tank", (9, 5))
        .with_unit(ATTACKER, "tank", (5, 6))
        .build_with_ids();

    battle.damage_area(Location::new(5, 5).center(), 40, 2, ATTACKER);

    assert_eq!(hp(&battle, units[0]), 60);
    assert_eq!(hp(&battle, units[1]), 80);
    assert_eq!(hp(&battle, units[2]), 100);
    assert_eq!(hp(&battle, units[3]), 100);
    assert_eq!(battle.statistics().player(ATTACKER).vehicles_destroyed, 0);
}

#[test]
fn test_kamikaze_detonates_when_badly_damaged() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "kamikaze", (5, 5))
        .with_unit(DEFENDER, "tank", (6, 5))
        .with_unit(DEFENDER, "tank", (15, 15))
        .build_with_ids();
    let (bomber, victim) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut().damage_unit(bomber, 37, Some(DEFENDER));
    sim.battle_mut().order_attack_unit(bomber, victim).unwrap();

    let events = sim.tick();

    // 30 from the shot, then 90 * (2 - 1) / 2 from the blast one cell away.
    assert_eq!(hp(sim.battle(), victim), 25);
    assert_eq!(hp(sim.battle(), units[2]), 100);
    assert!(!sim.battle().unit(bomber).is_some_and(Unit::is_alive));
    assert!(events.sounds.contains(&SoundEvent::Kamikaze));
    assert!(events.destroyed_units.contains(&bomber));

    let stats = sim.battle().statistics();
    assert_eq!(stats.player(ATTACKER).vehicles_lost, 1);
    assert_eq!(stats.player(DEFENDER).vehicles_destroyed, 0);
}

#[test]
fn test_paralysis_is_released_when_the_paralyzer_is_paralyzed() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "paralyzer", (2, 2))
        .with_unit(DEFENDER, "paralyzer", (5, 2))
        .with_unit(DEFENDER, "paralyzer", (2, 5))
        .build_with_ids();
    let (p, q, r) = (units[0], units[1], units[2]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut().order_attack_unit(p, q).unwrap();
    sim.battle_mut().order_attack_unit(r, p).unwrap();

    sim.tick();

    let battle = sim.battle();
    assert_eq!(battle.paralyzer_of(p), Some(r));
    assert_eq!(battle.paralyzer_of(q), None);
    assert_eq!(battle.unit(q).map(|u| u.paralyzed), Some(0));
    assert_eq!(battle.unit(p).map(|u| u.paralyzed), Some(30));
    assert_eq!(hp(battle, q), 75);
    assert_eq!(hp(battle, p), 75);
}

#[test]
fn test_paralysis_ends_with_the_paralyzer() {
    let (battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "paralyzer", (2, 2))
        .with_unit(DEFENDER, "tank", (5, 2))
        .with_unit(DEFENDER, "tank", (20, 20))
        .build_with_ids();
    let (p, victim) = (units[0], units[1]);
    let mut sim = BattleSimulation::new(battle);
    sim.battle_mut().order_attack_unit(p, victim).unwrap();
    sim.tick();
    assert_eq!(sim.battle().paralyzer_of(victim), Some(p));

    sim.battle_mut().damage_unit(p, 1000, Some(DEFENDER));
    assert_eq!(sim.battle().paralyzer_of(victim), None);
    assert_eq!(sim.battle().unit(victim).map(|u| u.paralyzed), Some(0));
}

#[test]
fn test_friendly_attack_order_is_reported_and_ignored() {
    let (mut battle, units, _) = BattleBuilder::new()
        .with_unit(ATTACKER, "tank", (2, 2))
        .with_unit(ATTACKER, "tank", (4, 2))
        .with_unit(DEFENDER, "tank", (20, 20))
        .build_with_ids();
    battle.order_attack_unit(units[0], units[1]).unwrap();
    assert!(battle.unit(units[0]).is_some_and(|u| u.target.is_none()));
    assert_eq!(battle.diagnostics().count(ViolationKind::InvalidTarget), 1);
}

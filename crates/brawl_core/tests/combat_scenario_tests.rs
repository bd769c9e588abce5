//! End-to-end combat scenarios.
//!
//! Each test drives a full `Simulation` through its public surface and
//! checks one observable outcome.

use brawl_core::combatant::{CombatState, StateKind};
use brawl_core::decision::{Action, BehaviorProfile, DecisionSource, Snapshot, UtilityScorer};
use brawl_core::math::{ArenaBounds, Fixed, Vec2Fixed};
use brawl_core::moves::{
    CooldownArming, DamageType, FrameTiming, HitShape, MoveDefinition, MoveId, MoveKind,
    MoveLibrary,
};
use brawl_core::prelude::{SimConfig, SimEvent, Simulation};
use brawl_core::stats::{Defense, Mitigation};
use brawl_test_utils::balance::run_battles;
use brawl_test_utils::determinism::{
    find_first_divergence, find_restore_divergence, run_parallel_simulations,
    verify_serialization_determinism, verify_simulation_determinism,
};
use brawl_test_utils::fixtures::{duel, fighter, fixed, team_fight, STRIKER};

/// Never acts on its own; only manual actions move anyone.
struct Passive;

impl DecisionSource for Passive {
    fn try_decide(&mut self, _: &BehaviorProfile, _: &Snapshot) -> Option<Action> {
        Some(Action::Idle)
    }
}

fn burst(radius: i32, damage: i32) -> MoveDefinition {
    MoveDefinition {
        id: MoveId::new("burst"),
        damage_type: DamageType::Physical,
        timing: FrameTiming::new(2, 3, 2),
        cost: Fixed::ZERO,
        cooldown: None,
        cooldown_arming: CooldownArming::OnActivation,
        kind: MoveKind::Damaging {
            damage: fixed(damage),
            stun: 10,
            hit_stop: 0,
            reach: Fixed::ZERO,
            radius: fixed(radius),
            shape: HitShape::Circle,
            lunge: None,
            knockback: Fixed::ONE,
            hits: None,
        },
    }
}

fn library_with(definition: MoveDefinition) -> MoveLibrary {
    let mut library = MoveLibrary::standard();
    library.insert(definition);
    library
}

fn passive_sim() -> Simulation {
    Simulation::new(SimConfig::default(), 1).with_decision_source(Passive)
}

fn hits(events: &[SimEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SimEvent::Hit { .. }))
        .count()
}

/// Attacker fires a zero-reach radius-50 burst at a defender `gap` away.
fn burst_lands(gap: i32) -> bool {
    let library = library_with(burst(50, 10));
    let mut sim = passive_sim();
    sim.spawn(fighter(1, 0, 500, 360, &["burst"]), &library).unwrap();
    sim.spawn(fighter(2, 1, 500 + gap, 360, &["punch"]), &library)
        .unwrap();

    assert!(sim.apply_action(1, Action::LightAttack));
    let mut landed = 0;
    for _ in 0..10 {
        landed += hits(&sim.step().events);
    }
    landed > 0
}

#[test]
fn zero_reach_burst_hits_within_combined_radius() {
    // Hurt radius 22 + burst radius 50 = 72
    assert!(burst_lands(40));
    assert!(burst_lands(72));
    assert!(!burst_lands(73));
    assert!(!burst_lands(120));
}

#[test]
fn flat_defense_subtracts_from_hit() {
    let library = library_with(burst(50, 35));
    let mut sim = passive_sim();
    sim.spawn(fighter(1, 0, 500, 360, &["burst"]), &library).unwrap();
    let mut defender = fighter(2, 1, 540, 360, &["punch"]);
    defender.stats.physical_defense = Defense::new(fixed(20), Mitigation::Flat);
    sim.spawn(defender, &library).unwrap();

    sim.apply_action(1, Action::LightAttack);
    let mut damage = Vec::new();
    for _ in 0..10 {
        for event in sim.step().events {
            if let SimEvent::Hit { damage: d, .. } = event {
                damage.push(d);
            }
        }
    }

    assert_eq!(damage, vec![fixed(15)]);
    assert_eq!(sim.combatant(2).unwrap().health, fixed(85));
}

#[test]
fn low_health_defender_prefers_heal_out_of_range() {
    let library = MoveLibrary::standard();
    let mut sim = passive_sim();
    let mut healer = fighter(1, 0, 400, 360, &STRIKER);
    healer.profile = BehaviorProfile::Defensive;
    sim.spawn(healer, &library).unwrap();
    sim.spawn(fighter(2, 1, 800, 360, &["punch"]), &library).unwrap();
    sim.combatant_mut(1).unwrap().health = fixed(30);

    let snapshot = Snapshot::capture(sim.combatants(), 0, 0, ArenaBounds::default());
    assert!(snapshot.enemy_distance().unwrap() > sim.config().attack_range);

    let scorer = UtilityScorer::new(9);
    let heal = scorer.base_score(Action::Heal, &BehaviorProfile::Defensive, &snapshot);
    let advance = scorer.base_score(Action::Advance, &BehaviorProfile::Defensive, &snapshot);
    assert!(heal > advance, "heal {heal} vs advance {advance}");

    let mut scorer = UtilityScorer::new(9);
    assert_eq!(
        scorer.select(&BehaviorProfile::Defensive, &snapshot),
        Action::Heal
    );
}

#[test]
fn hit_stop_freezes_exactly_its_length() {
    let library = MoveLibrary::standard();
    let mut sim = passive_sim();
    sim.spawn(fighter(1, 0, 400, 360, &["power_strike"]), &library)
        .unwrap();
    sim.spawn(fighter(2, 1, 800, 360, &["punch"]), &library).unwrap();

    // Something to observe on every axis: motion, a timer and a cooldown
    sim.apply_action(1, Action::LightAttack);
    sim.step();
    sim.combatant_mut(2).unwrap().velocity = Vec2Fixed::from_ints(-120, 0);
    sim.trigger_hit_stop(6);

    let frozen_view = |sim: &Simulation| {
        sim.combatants()
            .iter()
            .map(|c| {
                let cooldowns: Vec<(MoveId, Fixed)> =
                    c.cooldowns.iter().map(|(id, s)| (id.clone(), s)).collect();
                (c.position, c.state_timer, cooldowns, c.cooldowns.dash())
            })
            .collect::<Vec<_>>()
    };
    let before = frozen_view(&sim);

    for _ in 0..6 {
        let events = sim.step();
        assert!(events.frozen);
        assert_eq!(frozen_view(&sim), before);
    }

    let resumed = sim.step();
    assert!(!resumed.frozen);
    assert_ne!(frozen_view(&sim), before);
}

#[test]
fn multi_hit_strikes_once_per_window() {
    let library = MoveLibrary::standard();
    let mut sim = passive_sim();
    sim.spawn(fighter(1, 0, 500, 360, &["whirlwind"]), &library)
        .unwrap();
    sim.spawn(fighter(2, 1, 560, 360, &["punch"]), &library).unwrap();

    sim.apply_action(1, Action::LightAttack);
    let mut landed = 0;
    for _ in 0..120 {
        landed += hits(&sim.step().events);
    }
    // Three hits authored, one per re-armed window
    assert_eq!(landed, 3);
    assert_eq!(sim.combatant(2).unwrap().health, fixed(100 - 18));
}

#[test]
fn area_heal_never_exceeds_max_health() {
    let library = MoveLibrary::standard();
    let mut sim = passive_sim();
    sim.spawn(fighter(1, 0, 500, 360, &["area_heal"]), &library)
        .unwrap();
    sim.spawn(fighter(2, 0, 560, 360, &["punch"]), &library).unwrap();
    sim.spawn(fighter(3, 0, 900, 360, &["punch"]), &library).unwrap();
    sim.spawn(fighter(4, 1, 980, 560, &["punch"]), &library).unwrap();
    sim.combatant_mut(1).unwrap().health = fixed(95);
    sim.combatant_mut(2).unwrap().health = fixed(50);
    sim.combatant_mut(3).unwrap().health = fixed(50);
    sim.combatant_mut(4).unwrap().health = fixed(50);

    sim.apply_action(1, Action::LightAttack);
    let mut healed = None;
    for _ in 0..30 {
        for event in sim.step().events {
            if let SimEvent::HealUsed { combatant, amount } = event {
                assert_eq!(combatant, 1);
                healed = Some(amount);
            }
        }
    }

    // Caster capped at max, nearby ally healed, distant ally and enemy untouched
    assert_eq!(sim.combatant(1).unwrap().health, fixed(100));
    assert_eq!(sim.combatant(2).unwrap().health, fixed(62));
    assert_eq!(sim.combatant(3).unwrap().health, fixed(50));
    assert_eq!(sim.combatant(4).unwrap().health, fixed(50));
    assert_eq!(healed, Some(fixed(5 + 12)));
    assert_eq!(sim.combatant(1).unwrap().resource, fixed(65));
}

#[test]
fn cooldown_blocks_repeat_without_side_effects() {
    let library = MoveLibrary::standard();
    let mut sim = passive_sim();
    sim.spawn(fighter(1, 0, 400, 360, &["power_strike"]), &library)
        .unwrap();
    sim.spawn(fighter(2, 1, 900, 360, &["punch"]), &library).unwrap();

    sim.apply_action(1, Action::LightAttack);
    // Runs the full 30 frames; the 50-frame cooldown is still armed
    for _ in 0..31 {
        sim.step();
    }
    let before = sim.combatant(1).unwrap().clone();
    assert_eq!(before.state.kind(), StateKind::Idle);

    sim.apply_action(1, Action::LightAttack);
    let events = sim.step();
    assert!(events.events.is_empty());
    let after = sim.combatant(1).unwrap();
    assert_eq!(after.state, CombatState::Idle);
    assert_eq!(after.resource, before.resource);
}

#[test]
fn knocked_out_combatants_are_inert() {
    let library = MoveLibrary::standard();
    let mut sim = Simulation::new(SimConfig::default(), 4);
    sim.spawn(fighter(1, 0, 500, 360, &["slash"]), &library).unwrap();
    sim.spawn(fighter(2, 1, 540, 360, &["slash"]), &library).unwrap();
    sim.spawn(fighter(3, 1, 700, 360, &["slash"]), &library).unwrap();
    sim.combatant_mut(2).unwrap().knock_out();

    let snapshot = Snapshot::capture(sim.combatants(), 0, 0, ArenaBounds::default());
    assert_eq!(snapshot.enemy.unwrap().id, 3);
    assert!(!sim.apply_action(2, Action::LightAttack));

    let ko = sim.combatant(2).unwrap().clone();
    for _ in 0..240 {
        let events = sim.step();
        for event in &events.events {
            if let SimEvent::Hit { defender, .. } = event {
                assert_ne!(*defender, 2);
            }
            if let SimEvent::SkillUsed { combatant, .. } = event {
                assert_ne!(*combatant, 2);
            }
        }
    }
    assert_eq!(sim.combatant(2).unwrap(), &ko);
}

#[test]
fn first_tick_dash_closes_on_enemy_to_the_left() {
    let library = MoveLibrary::standard();
    let mut sim = passive_sim();
    sim.spawn(fighter(1, 0, 700, 360, &["slash"]), &library).unwrap();
    sim.spawn(fighter(2, 1, 400, 360, &["punch"]), &library).unwrap();

    assert!(sim.apply_action(1, Action::Dash));
    sim.step();

    let dasher = sim.combatant(1).unwrap();
    assert_eq!(dasher.state, CombatState::Dashing);
    assert!(dasher.velocity.x < Fixed::ZERO, "dash moved away: {:?}", dasher.velocity);
    assert!(dasher.position.x < fixed(700));
}

#[test]
fn match_ends_exactly_once() {
    let library = MoveLibrary::standard();
    let mut sim = Simulation::new(SimConfig::default(), 8);
    sim.spawn(
        fighter(1, 0, 560, 360, &["slash", "power_strike", "whirlwind"]),
        &library,
    )
    .unwrap();
    sim.spawn(fighter(2, 1, 720, 360, &["punch"]), &library).unwrap();
    sim.combatant_mut(2).unwrap().health = fixed(5);

    let mut ended = Vec::new();
    for _ in 0..(60 * 60) {
        for event in sim.step().events {
            if let SimEvent::MatchEnded { winner } = event {
                ended.push(winner);
            }
        }
    }

    assert_eq!(ended, vec![Some(0)]);
    assert_eq!(sim.outcome().unwrap().winner, Some(0));
}

#[test]
fn same_seed_same_match() {
    let run = |seed| {
        let mut sim = team_fight(seed, 3);
        let mut log = Vec::new();
        for _ in 0..900 {
            log.push(sim.step());
        }
        (sim.state_hash(), log)
    };
    let (hash_a, log_a) = run(77);
    let (hash_b, log_b) = run(77);
    assert_eq!(hash_a, hash_b);
    assert_eq!(log_a, log_b);
}

#[test]
fn team_fight_is_deterministic_across_threads() {
    assert!(verify_simulation_determinism(|| team_fight(5, 2), 600));
    assert_eq!(find_first_divergence(|| team_fight(6, 3), 600), None);
    run_parallel_simulations(|| team_fight(7, 3), 4, 600).assert_deterministic();
}

#[test]
fn restored_state_continues_identically() {
    assert!(verify_serialization_determinism(|| team_fight(9, 2), 300));
    assert_eq!(find_restore_divergence(|| team_fight(9, 2), 300, 600), None);
    assert_eq!(find_restore_divergence(|| duel(3, 240), 45, 600), None);
}

#[test]
fn duels_resolve_before_time_runs_out() {
    let stats = run_battles(10..16, 60 * 120, |seed| duel(seed, 240));
    assert_eq!(stats.total_battles, 6);
    assert!(stats.wins_a + stats.wins_b > 0, "no duel produced a winner: {stats:?}");
    assert!(stats.avg_ticks() <= (60 * 120) as f64);
}

//! Property tests for the combat core.

use brawl_core::collision::{overlaps, Shape};
use brawl_core::combatant::{Combatant, CombatState};
use brawl_core::decision::{Action, BehaviorProfile, DecisionSource, Snapshot, UtilityScorer};
use brawl_core::math::{ArenaBounds, Fixed, Vec2Fixed};
use brawl_core::moves::{DamageType, FrameTiming, MoveId, MoveLibrary};
use brawl_core::prelude::{SimConfig, SimEvent, Simulation};
use brawl_test_utils::determinism::strategies::{
    arb_arena_coord, arb_extent, arb_heading, arb_profile, arb_shape, arb_vec2_position,
};
use brawl_test_utils::fixtures::{fighter, team_fight, STRIKER};
use proptest::prelude::*;

struct Passive;

impl DecisionSource for Passive {
    fn try_decide(&mut self, _: &BehaviorProfile, _: &Snapshot) -> Option<Action> {
        Some(Action::Idle)
    }
}

fn combatant(loadout: &[&str]) -> Combatant {
    Combatant::new(fighter(1, 0, 640, 360, loadout), &MoveLibrary::standard()).unwrap()
}

fn to_f64(v: Vec2Fixed) -> (f64, f64) {
    (v.x.to_num::<f64>(), v.y.to_num::<f64>())
}

/// Samples per rectangle side for the brute-force overlap reference.
const GRID: i32 = 40;

/// Slack for the fixed-point heading not being exactly unit length.
const EPSILON: f64 = 0.05;

/// World-space points on a `GRID` x `GRID` lattice covering an oriented
/// rectangle, edges and corners included.
fn rect_samples(center: Vec2Fixed, half: Vec2Fixed, heading: Vec2Fixed) -> Vec<(f64, f64)> {
    let (cx, cy) = to_f64(center);
    let (hx, hy) = to_f64(half);
    let (dx, dy) = to_f64(heading);
    let mut samples = Vec::new();
    for i in 0..=GRID {
        for j in 0..=GRID {
            let u = -hx + 2.0 * hx * f64::from(i) / f64::from(GRID);
            let v = -hy + 2.0 * hy * f64::from(j) / f64::from(GRID);
            samples.push((cx + u * dx - v * dy, cy + u * dy + v * dx));
        }
    }
    samples
}

/// Half the diagonal of one lattice cell: no point of the rectangle is
/// farther than this from its nearest sample.
fn sample_spacing(half: Vec2Fixed) -> f64 {
    let (hx, hy) = to_f64(half);
    let cell_x = 2.0 * hx / f64::from(GRID);
    let cell_y = 2.0 * hy / f64::from(GRID);
    (cell_x * cell_x + cell_y * cell_y).sqrt() / 2.0
}

/// Point-in-rectangle by the four edge half-planes.
fn rect_contains(
    center: Vec2Fixed,
    half: Vec2Fixed,
    heading: Vec2Fixed,
    point: Vec2Fixed,
) -> bool {
    let (cx, cy) = to_f64(center);
    let (hx, hy) = to_f64(half);
    let (dx, dy) = to_f64(heading);
    let (px, py) = to_f64(point);
    let along = (px - cx) * dx + (py - cy) * dy;
    let across = -(px - cx) * dy + (py - cy) * dx;
    along.abs() <= hx + EPSILON && across.abs() <= hy + EPSILON
}

#[derive(Debug, Clone, Copy)]
enum PoolChange {
    Hit(i32),
    Heal(i32),
}

fn arb_pool_change() -> impl Strategy<Value = PoolChange> {
    prop_oneof![
        (0i32..300).prop_map(PoolChange::Hit),
        (-50i32..300).prop_map(PoolChange::Heal),
    ]
}

proptest! {
    #[test]
    fn overlap_is_symmetric(a in arb_shape(), b in arb_shape()) {
        prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
    }

    #[test]
    fn rect_circle_matches_sampled_reference(
        center in arb_vec2_position(),
        hw in arb_extent(),
        hh in arb_extent(),
        heading in arb_heading(),
        offset in (-300i32..=300, -300i32..=300),
        radius in arb_extent(),
    ) {
        let half = Vec2Fixed::new(hw, hh);
        let point = center + Vec2Fixed::from_ints(offset.0, offset.1);
        let (px, py) = to_f64(point);
        let r = radius.to_num::<f64>();
        let nearest = rect_samples(center, half, heading)
            .into_iter()
            .map(|(x, y)| ((x - px).powi(2) + (y - py).powi(2)).sqrt())
            .fold(f64::INFINITY, f64::min);

        let rect = Shape::Rect { center, half_extents: half, heading };
        let hit = overlaps(&rect, &Shape::Circle { center: point, radius });
        if nearest <= r - EPSILON || rect_contains(center, half, heading, point) {
            prop_assert!(hit, "sample {nearest} within radius {r}");
        }
        if nearest > r + sample_spacing(half) + EPSILON {
            prop_assert!(!hit, "nearest sample {nearest} beyond radius {r}");
        }
    }

    #[test]
    fn circle_inside_rect_overlaps(
        center in arb_vec2_position(),
        hw in arb_extent(),
        hh in arb_extent(),
        heading in arb_heading(),
        along in -100i32..=100,
        across in -100i32..=100,
        radius in 1i32..4,
    ) {
        let half = Vec2Fixed::new(hw, hh);
        // Inset by the heading slack so the point is strictly inside
        let u = hw.to_num::<f64>() * f64::from(along) / 101.0;
        let v = hh.to_num::<f64>() * f64::from(across) / 101.0;
        let (dx, dy) = to_f64(heading);
        let offset = Vec2Fixed::new(
            Fixed::from_num(u * dx - v * dy),
            Fixed::from_num(u * dy + v * dx),
        );
        let point = center + offset;
        prop_assume!(rect_contains(center, half, heading, point));

        let rect = Shape::Rect { center, half_extents: half, heading };
        let circle = Shape::Circle { center: point, radius: Fixed::from_num(radius) };
        prop_assert!(overlaps(&rect, &circle));
        prop_assert!(overlaps(&circle, &rect));
    }

    #[test]
    fn circle_centered_in_rect_overlaps(
        center in arb_vec2_position(),
        hw in arb_extent(),
        hh in arb_extent(),
        heading in arb_heading(),
        radius in arb_extent(),
    ) {
        let rect = Shape::Rect { center, half_extents: Vec2Fixed::new(hw, hh), heading };
        let circle = Shape::Circle { center, radius };
        prop_assert!(overlaps(&rect, &circle));
    }

    #[test]
    fn health_stays_in_bounds(changes in proptest::collection::vec(arb_pool_change(), 1..40)) {
        let mut c = combatant(&["punch"]);
        let max = c.stats.max_health;
        for change in changes {
            match change {
                PoolChange::Hit(d) => {
                    c.receive_hit(DamageType::Physical, Fixed::from_num(d), 4, Vec2Fixed::ZERO);
                }
                PoolChange::Heal(h) => {
                    c.heal(Fixed::from_num(h));
                }
            }
            prop_assert!(c.health >= Fixed::ZERO);
            prop_assert!(c.health <= max);
            if c.health == Fixed::ZERO {
                prop_assert_eq!(&c.state, &CombatState::KnockedOut);
            }
        }
    }

    #[test]
    fn scaled_frames_respect_floors(
        startup in 0u32..60,
        active in 0u32..60,
        recovery in 0u32..60,
        bits in any::<i64>(),
    ) {
        let scaled = FrameTiming::new(startup, active, recovery).scaled(Fixed::from_bits(bits));
        prop_assert!(scaled.startup >= 1);
        prop_assert!(scaled.recovery >= 1);
    }

    #[test]
    fn move_on_cooldown_is_noop(remaining in 1i32..600, resource in 0i32..=100) {
        let mut c = combatant(&["power_strike", "quick_heal"]);
        c.resource = Fixed::from_num(resource);
        let id = MoveId::new("power_strike");
        c.cooldowns.arm(&id, Fixed::from_num(remaining) / Fixed::from_num(60));
        let before = c.clone();

        prop_assert!(c.try_start_move(&id).is_none());
        prop_assert_eq!(&c, &before);
    }

    #[test]
    fn single_hit_move_strikes_at_most_once(
        x in arb_arena_coord(),
        y in (260i32..460).prop_map(Fixed::from_num),
        move_index in 0usize..2,
    ) {
        let library = MoveLibrary::standard();
        let mut sim = Simulation::new(SimConfig::default(), 3).with_decision_source(Passive);
        sim.spawn(fighter(1, 0, 640, 360, &STRIKER), &library).unwrap();
        let mut defender = fighter(2, 1, 0, 0, &["punch"]);
        defender.position = Vec2Fixed::new(x, y);
        prop_assume!(defender.position != Vec2Fixed::from_ints(640, 360));
        sim.spawn(defender, &library).unwrap();

        let action = [Action::LightAttack, Action::HeavyAttack][move_index];
        sim.apply_action(1, action);
        let mut landed = 0;
        for _ in 0..90 {
            landed += sim
                .step()
                .events
                .iter()
                .filter(|e| matches!(e, SimEvent::Hit { .. }))
                .count();
        }
        prop_assert!(landed <= 1);
    }

    #[test]
    fn knocked_out_never_targeted(
        positions in proptest::collection::vec((arb_arena_coord(), arb_arena_coord()), 3..8),
        knocked in any::<prop::sample::Index>(),
    ) {
        let library = MoveLibrary::standard();
        let mut roster: Vec<Combatant> = positions
            .iter()
            .enumerate()
            .map(|(i, (x, y))| {
                let mut spec = fighter(i as u64 + 1, (i % 2) as u8, 0, 0, &["punch"]);
                spec.position = Vec2Fixed::new(*x, *y);
                Combatant::new(spec, &library).unwrap()
            })
            .collect();
        let ko = knocked.index(roster.len());
        roster[ko].knock_out();
        let ko_id = roster[ko].id;

        for index in 0..roster.len() {
            let snapshot = Snapshot::capture(&roster, index, 0, ArenaBounds::default());
            prop_assert!(snapshot.enemy.map_or(true, |e| e.id != ko_id));
            prop_assert!(snapshot.ally.map_or(true, |a| a.id != ko_id));
        }
    }

    #[test]
    fn same_seed_scorers_agree(
        profile in arb_profile(),
        seed in any::<u64>(),
        index in 0usize..4,
    ) {
        let sim = team_fight(1, 2);
        let snapshot = Snapshot::capture(sim.combatants(), index, 0, ArenaBounds::default());
        let mut a = UtilityScorer::new(seed);
        let mut b = UtilityScorer::new(seed);
        for _ in 0..8 {
            prop_assert_eq!(a.select(&profile, &snapshot), b.select(&profile, &snapshot));
        }
    }
}

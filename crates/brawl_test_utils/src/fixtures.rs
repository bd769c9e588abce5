//! Test fixtures and helpers.
//!
//! Pre-built rosters and simulations for consistent testing.

use brawl_core::combatant::{CombatantSpec, TeamId};
use brawl_core::config::SimConfig;
use brawl_core::decision::BehaviorProfile;
use brawl_core::math::Vec2Fixed;
use brawl_core::moves::MoveLibrary;
use brawl_core::simulation::Simulation;
use fixed::types::I32F32;

/// Fast melee loadout with a self heal.
pub const STRIKER: [&str; 4] = ["slash", "power_strike", "whirlwind", "quick_heal"];

/// Slow, sturdy loadout with a guard buff.
pub const GUARDIAN: [&str; 4] = ["punch", "shield_bash", "ground_slam", "guard"];

/// Ranged loadout with an area heal.
pub const MEDIC: [&str; 4] = ["poke", "snipe", "dash_strike", "area_heal"];

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// A combatant spec at integer coordinates.
#[must_use]
pub fn fighter(id: u64, team: TeamId, x: i32, y: i32, loadout: &[&str]) -> CombatantSpec {
    CombatantSpec::new(id, team, Vec2Fixed::from_ints(x, y), loadout)
}

/// Two fighters facing each other across the default arena center.
#[must_use]
pub fn duel(seed: u64, gap: i32) -> Simulation {
    let library = MoveLibrary::standard();
    let mut sim = Simulation::new(SimConfig::default(), seed);
    let mut left = fighter(1, 0, 640 - gap / 2, 360, &STRIKER);
    left.profile = BehaviorProfile::Aggressive;
    let mut right = fighter(2, 1, 640 + gap / 2, 360, &GUARDIAN);
    right.profile = BehaviorProfile::Defensive;
    for spec in [left, right] {
        if let Err(err) = sim.spawn(spec, &library) {
            panic!("duel fixture failed to spawn: {err}");
        }
    }
    sim
}

/// Two teams of `per_team` fighters, rotating through the fixture
/// loadouts and profiles.
#[must_use]
pub fn team_fight(seed: u64, per_team: u64) -> Simulation {
    let library = MoveLibrary::standard();
    let loadouts = [STRIKER, GUARDIAN, MEDIC];
    let profiles = [
        BehaviorProfile::Aggressive,
        BehaviorProfile::Defensive,
        BehaviorProfile::Random,
    ];
    let mut sim = Simulation::new(SimConfig::default(), seed);
    for team in 0..2u8 {
        for slot in 0..per_team {
            let id = u64::from(team) * 100 + slot + 1;
            let x = if team == 0 { 420 } else { 860 };
            let y = 220 + (slot as i32 % 4) * 90;
            let index = slot as usize % loadouts.len();
            let mut spec = fighter(id, team, x, y, &loadouts[index]);
            spec.profile = profiles[(index + team as usize) % profiles.len()];
            if let Err(err) = sim.spawn(spec, &library) {
                panic!("team fixture failed to spawn: {err}");
            }
        }
    }
    sim
}

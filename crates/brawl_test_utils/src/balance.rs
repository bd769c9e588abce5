//! Balance testing utilities.
//!
//! Runs many seeded matches to check that mirror matchups stay close to
//! even and that no loadout dominates.

use brawl_core::combatant::TeamId;
use brawl_core::simulation::Simulation;

/// Result of one simulated match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleResult {
    /// Winning team, `None` for a timeout or mutual knockout.
    pub winner: Option<TeamId>,
    /// Ticks until the match ended or timed out.
    pub ticks: u64,
}

/// Statistics for a set of matches between team 0 and team 1.
#[derive(Debug, Clone, Default)]
pub struct BattleStats {
    /// Total matches run.
    pub total_battles: u32,
    /// Wins for team 0.
    pub wins_a: u32,
    /// Wins for team 1.
    pub wins_b: u32,
    /// Timeouts and mutual knockouts.
    pub draws: u32,
    /// Sum of match lengths, for the average.
    pub total_ticks: u64,
}

impl BattleStats {
    /// Add one result.
    pub fn record(&mut self, result: BattleResult) {
        self.total_battles += 1;
        self.total_ticks += result.ticks;
        match result.winner {
            Some(0) => self.wins_a += 1,
            Some(_) => self.wins_b += 1,
            None => self.draws += 1,
        }
    }

    /// Win rate for team 0 (0.0 to 1.0).
    pub fn win_rate_a(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_a as f64 / self.total_battles as f64
    }

    /// Win rate for team 1 (0.0 to 1.0).
    pub fn win_rate_b(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_b as f64 / self.total_battles as f64
    }

    /// Average match length in ticks.
    pub fn avg_ticks(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.0;
        }
        self.total_ticks as f64 / self.total_battles as f64
    }

    /// Check if team 0's win rate is within `[min_rate, max_rate]`.
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.win_rate_a();
        rate >= min_rate && rate <= max_rate
    }
}

/// Step `sim` until the match ends or `max_ticks` pass.
pub fn run_battle(mut sim: Simulation, max_ticks: u64) -> BattleResult {
    while sim.tick_count() < max_ticks {
        sim.step();
        if let Some(outcome) = sim.outcome() {
            return BattleResult {
                winner: outcome.winner,
                ticks: outcome.tick,
            };
        }
    }
    BattleResult {
        winner: None,
        ticks: sim.tick_count(),
    }
}

/// Run one battle per seed and aggregate.
pub fn run_battles<F>(seeds: impl IntoIterator<Item = u64>, max_ticks: u64, setup: F) -> BattleStats
where
    F: Fn(u64) -> Simulation,
{
    let mut stats = BattleStats::default();
    for seed in seeds {
        stats.record(run_battle(setup(seed), max_ticks));
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel, fighter, STRIKER};
    use brawl_core::config::SimConfig;
    use brawl_core::moves::MoveLibrary;

    #[test]
    fn test_battle_stats_win_rate() {
        let mut stats = BattleStats::default();
        for _ in 0..55 {
            stats.record(BattleResult {
                winner: Some(0),
                ticks: 1000,
            });
        }
        for _ in 0..40 {
            stats.record(BattleResult {
                winner: Some(1),
                ticks: 1000,
            });
        }
        for _ in 0..5 {
            stats.record(BattleResult {
                winner: None,
                ticks: 1000,
            });
        }

        assert!((stats.win_rate_a() - 0.55).abs() < 0.001);
        assert!((stats.win_rate_b() - 0.40).abs() < 0.001);
        assert!((stats.avg_ticks() - 1000.0).abs() < 0.001);
        assert!(stats.is_balanced(0.45, 0.55));
    }

    #[test]
    fn test_empty_stats_are_even() {
        let stats = BattleStats::default();
        assert!((stats.win_rate_a() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_battle_times_out() {
        // Too far apart to finish in a handful of ticks
        let result = run_battle(duel(3, 600), 10);
        assert_eq!(result.winner, None);
        assert_eq!(result.ticks, 10);
    }

    #[test]
    fn test_battles_finish() {
        let stats = run_battles(0..4, 60 * 120, |seed| duel(seed, 200));
        assert_eq!(stats.total_battles, 4);
        assert!(stats.draws < 4, "every duel timed out: {stats:?}");
    }

    #[test]
    fn test_lone_team_is_not_a_match() {
        let mut sim = Simulation::new(SimConfig::default(), 1);
        sim.spawn(fighter(1, 0, 600, 360, &STRIKER), &MoveLibrary::standard())
            .unwrap();
        let result = run_battle(sim, 30);
        assert_eq!(result.winner, None);
        assert_eq!(result.ticks, 30);
    }
}

//! Match metrics collection for balance analysis.

use std::collections::BTreeMap;

use brawl_core::combatant::{CombatantId, TeamId};
use brawl_core::simulation::{SimEvent, Simulation, TickEvents};
use serde::{Deserialize, Serialize};

/// Metrics for a single match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Winning team, if any.
    pub winner: Option<TeamId>,
    /// True if the tick limit ended the match.
    pub timed_out: bool,
    /// Match duration in ticks.
    pub duration_ticks: u64,
    /// Final state hash for determinism checks.
    pub final_state_hash: u64,
    /// Per-team metrics.
    pub teams: BTreeMap<TeamId, TeamMetrics>,
}

/// Metrics for one team within a match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Health removed from enemies.
    pub damage_dealt: f64,
    /// Health lost.
    pub damage_taken: f64,
    /// Hits landed.
    pub hits_landed: u32,
    /// Enemies knocked out.
    pub knockouts: u32,
    /// Own fighters knocked out.
    pub fighters_lost: u32,
    /// Health restored.
    pub healing_done: f64,
    /// Moves started.
    pub skills_used: u32,
    /// Tick of the first landed hit.
    pub first_hit_tick: Option<u64>,
}

/// Accumulates [`MatchMetrics`] from tick events.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: MatchMetrics,
    teams: BTreeMap<CombatantId, TeamId>,
}

impl MetricsCollector {
    /// Start collecting for a freshly built simulation.
    #[must_use]
    pub fn new(scenario: &str, seed: u64, sim: &Simulation) -> Self {
        let teams: BTreeMap<CombatantId, TeamId> =
            sim.combatants().iter().map(|c| (c.id, c.team)).collect();
        let mut metrics = MatchMetrics {
            scenario: scenario.to_string(),
            seed,
            ..Default::default()
        };
        for team in teams.values() {
            metrics.teams.entry(*team).or_default();
        }
        Self { metrics, teams }
    }

    fn team_of(&mut self, id: CombatantId) -> Option<&mut TeamMetrics> {
        let team = self.teams.get(&id)?;
        self.metrics.teams.get_mut(team)
    }

    /// Fold one tick's events into the totals.
    pub fn record(&mut self, tick: &TickEvents) {
        for event in &tick.events {
            match event {
                SimEvent::SkillUsed { combatant, .. } => {
                    if let Some(team) = self.team_of(*combatant) {
                        team.skills_used += 1;
                    }
                }
                SimEvent::HealUsed { combatant, amount } => {
                    if let Some(team) = self.team_of(*combatant) {
                        team.healing_done += amount.to_num::<f64>();
                    }
                }
                SimEvent::Hit {
                    attacker,
                    defender,
                    damage,
                    ..
                } => {
                    let damage = damage.to_num::<f64>();
                    if let Some(team) = self.team_of(*attacker) {
                        team.damage_dealt += damage;
                        team.hits_landed += 1;
                        team.first_hit_tick.get_or_insert(tick.tick);
                    }
                    if let Some(team) = self.team_of(*defender) {
                        team.damage_taken += damage;
                    }
                }
                SimEvent::KnockedOut { winner, loser } => {
                    if let Some(team) = self.team_of(*winner) {
                        team.knockouts += 1;
                    }
                    if let Some(team) = self.team_of(*loser) {
                        team.fighters_lost += 1;
                    }
                }
                SimEvent::MoveStarted { .. } | SimEvent::MatchEnded { .. } => {}
            }
        }
    }

    /// Close out the match.
    #[must_use]
    pub fn finalize(mut self, sim: &Simulation) -> MatchMetrics {
        let outcome = sim.outcome();
        self.metrics.winner = outcome.and_then(|o| o.winner);
        self.metrics.timed_out = outcome.is_none();
        self.metrics.duration_ticks = sim.tick_count();
        self.metrics.final_state_hash = sim.state_hash();
        self.metrics
    }
}

/// Summary statistics across multiple matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total matches played.
    pub total_games: u32,
    /// Matches won by each team.
    pub wins_by_team: BTreeMap<TeamId, u32>,
    /// Win rates by team.
    pub win_rates: BTreeMap<TeamId, f64>,
    /// Matches where every fighter went down together.
    pub draws: u32,
    /// Matches stopped by the tick limit.
    pub timeouts: u32,
    /// Average match duration in ticks.
    pub avg_duration_ticks: f64,
    /// Shortest match.
    pub min_duration_ticks: u64,
    /// Longest match.
    pub max_duration_ticks: u64,
    /// Average damage dealt per match by team.
    pub avg_damage_dealt: BTreeMap<TeamId, f64>,
    /// Average healing per match by team.
    pub avg_healing_done: BTreeMap<TeamId, f64>,
}

impl BatchSummary {
    /// Calculate summary from a list of match metrics.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn from_games(games: &[MatchMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let total = games.len() as f64;
        let mut summary = Self {
            total_games: games.len() as u32,
            min_duration_ticks: u64::MAX,
            ..Default::default()
        };

        let mut duration_sum = 0u64;
        for game in games {
            duration_sum += game.duration_ticks;
            summary.min_duration_ticks = summary.min_duration_ticks.min(game.duration_ticks);
            summary.max_duration_ticks = summary.max_duration_ticks.max(game.duration_ticks);

            match (game.winner, game.timed_out) {
                (Some(team), _) => *summary.wins_by_team.entry(team).or_default() += 1,
                (None, true) => summary.timeouts += 1,
                (None, false) => summary.draws += 1,
            }

            for (team, stats) in &game.teams {
                *summary.avg_damage_dealt.entry(*team).or_default() += stats.damage_dealt;
                *summary.avg_healing_done.entry(*team).or_default() += stats.healing_done;
            }
        }

        summary.avg_duration_ticks = duration_sum as f64 / total;
        for value in summary
            .avg_damage_dealt
            .values_mut()
            .chain(summary.avg_healing_done.values_mut())
        {
            *value /= total;
        }
        for (team, wins) in &summary.wins_by_team {
            summary.win_rates.insert(*team, f64::from(*wins) / total);
        }

        summary
    }

    /// Check whether every team's win rate is within `threshold` of an
    /// even split.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_balanced(&self, threshold: f64) -> bool {
        let teams = self.avg_damage_dealt.len().max(1) as f64;
        let even = 1.0 / teams;
        self.win_rates
            .values()
            .all(|rate| (rate - even).abs() <= threshold)
    }

    /// The team winning noticeably more than an even share, if any.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn dominant_team(&self, threshold: f64) -> Option<TeamId> {
        let teams = self.avg_damage_dealt.len().max(1) as f64;
        let even = 1.0 / teams;
        self.win_rates
            .iter()
            .find(|(_, rate)| **rate > even + threshold)
            .map(|(team, _)| *team)
    }
}

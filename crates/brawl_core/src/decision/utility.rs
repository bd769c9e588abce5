//! Utility scoring of the action catalogue.
//!
//! Scoring runs in five stages per action:
//!
//! 1. **Usability**: unusable actions get [`UNUSABLE`] and skip the rest.
//! 2. **Distance bands**: a base score from the distance to the nearest
//!    enemy; every action has a preferred range.
//! 3. **Profile**: multipliers keyed to the [`BehaviorProfile`].
//! 4. **Context**: bonuses for low health, a weak target, and so on.
//! 5. **Jitter**: a bounded multiplicative nudge from a seeded
//!    [`ChaCha8Rng`]. Every decision reads its own stream, keyed by
//!    combatant id and tick, so the scorer carries no history and a
//!    simulation restored mid-match decides exactly as the original.
//!
//! The highest score wins. Ties go to the earlier action in
//! [`Action::ALL`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{Action, BehaviorProfile, DecisionSource, Personality, SelfView, Snapshot};
use crate::combatant::StateKind;
use crate::config::SimConfig;
use crate::math::Fixed;

/// Score of an action that cannot be taken right now.
pub const UNUSABLE: Fixed = Fixed::from_bits(-1000_i64 << 32);

/// Jitter resolution: the jitter bound is split into this many steps.
const JITTER_STEPS: i32 = 1000;

fn fx(n: i32) -> Fixed {
    Fixed::from_num(n)
}

fn pct(n: i32) -> Fixed {
    Fixed::from_num(n) / Fixed::from_num(100)
}

/// `score * percent / 100`, exact for whole-number scores.
fn scale(score: Fixed, percent: i32) -> Fixed {
    score.saturating_mul(Fixed::from_num(percent)) / Fixed::from_num(100)
}

/// The built-in utility scorer.
#[derive(Debug, Clone)]
pub struct UtilityScorer {
    rng: ChaCha8Rng,
    attack_range: Fixed,
    jitter: Fixed,
}

impl UtilityScorer {
    /// Scorer with default tuning.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::from_config(seed, &SimConfig::default())
    }

    /// Scorer using the attack range and jitter bound of `config`.
    #[must_use]
    pub fn from_config(seed: u64, config: &SimConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            attack_range: config.attack_range,
            jitter: config.decision_jitter.max(Fixed::ZERO),
        }
    }

    /// Deterministic score of `action` (stages 1 to 4).
    #[must_use]
    pub fn base_score(
        &self,
        action: Action,
        profile: &BehaviorProfile,
        snapshot: &Snapshot,
    ) -> Fixed {
        let me = &snapshot.me;
        if !is_usable(action, me) {
            return UNUSABLE;
        }
        let Some(enemy) = snapshot.enemy else {
            return if action == Action::Idle { fx(-100) } else { UNUSABLE };
        };

        let dist = me.position.distance(enemy.position);
        let hp = me.health_ratio();
        let enemy_hp = enemy.health_ratio();
        let style = Style::of(profile);

        let score = match action {
            Action::Advance => {
                let mut s = band_above(dist, &[(150, 500), (100, 300)], 50);
                s = style.aggressive(s, 140);
                if hp < pct(30) {
                    s -= fx(300);
                }
                s
            }
            Action::Retreat => {
                let s = if hp < pct(30) {
                    fx(600)
                } else {
                    band_below(dist, &[(60, 400), (100, 200)], -200)
                };
                style.defensive(s, 150)
            }
            Action::StrafeLeft | Action::StrafeRight => {
                let s = if dist > fx(80) && dist < fx(160) {
                    fx(300)
                } else if dist < fx(80) {
                    fx(400)
                } else {
                    fx(100)
                };
                style.defensive(s, 130)
            }
            Action::Dash => {
                let s = band_above(dist, &[(200, 400), (150, 200)], -200);
                style.aggressive(s, 150)
            }
            Action::LightAttack | Action::HeavyAttack | Action::SpecialAttack | Action::Heal => {
                let slot = action.slot().unwrap_or(0);
                let view = me.slots[slot];
                if view.is_support {
                    self.support_score(view.heals, view.area, dist, hp, snapshot, &style)
                } else {
                    strike_score(action, dist, hp, enemy_hp, &style)
                }
            }
            Action::Idle => fx(-100),
        };

        style
            .personality(action, score, snapshot, spends_resource(me, action))
            .max(UNUSABLE + Fixed::DELTA)
    }

    fn support_score(
        &self,
        heals: bool,
        area: bool,
        dist: Fixed,
        hp: Fixed,
        snapshot: &Snapshot,
        style: &Style,
    ) -> Fixed {
        if !heals {
            // Defensive buff: worth it once someone is closing in.
            let s = if dist < fx(140) { fx(300) } else { fx(-200) };
            return style.defensive(s, 130);
        }

        let mut s = if hp < pct(25) {
            fx(1000)
        } else if hp < pct(40) {
            fx(600)
        } else if hp < pct(60) {
            fx(300)
        } else {
            fx(-500)
        };
        s = style.defensive(s, 130);
        if dist < self.attack_range {
            s -= fx(400);
        }
        if area {
            if let (Some(ally), Some(p)) = (snapshot.ally, style.traits) {
                if ally.health_ratio() < pct(50) {
                    s += fx(i32::from(p.teamplay) * 40);
                }
            }
        }
        s
    }

    /// Scores for every action including jitter, in evaluation order.
    pub fn evaluate_all(
        &mut self,
        profile: &BehaviorProfile,
        snapshot: &Snapshot,
    ) -> [(Action, Fixed); 10] {
        position_stream(&mut self.rng, snapshot);
        let mut scores = [(Action::Idle, UNUSABLE); 10];
        for (slot, action) in scores.iter_mut().zip(Action::ALL) {
            let base = self.base_score(action, profile, snapshot);
            // Usable actions always stay strictly above the sentinel
            let score = if base == UNUSABLE {
                base
            } else {
                (base * self.jitter_factor()).max(UNUSABLE + Fixed::DELTA)
            };
            *slot = (action, score);
        }
        scores
    }

    fn jitter_factor(&mut self) -> Fixed {
        let step = self.rng.gen_range(-JITTER_STEPS..=JITTER_STEPS);
        Fixed::ONE + self.jitter * Fixed::from_num(step) / Fixed::from_num(JITTER_STEPS)
    }

    /// Pick an action for `snapshot`.
    ///
    /// Knocked-out combatants and combatants with no living enemy idle.
    pub fn select(&mut self, profile: &BehaviorProfile, snapshot: &Snapshot) -> Action {
        if snapshot.me.state == StateKind::KnockedOut || snapshot.enemy.is_none() {
            return Action::Idle;
        }

        let scores = self.evaluate_all(profile, snapshot);
        for (action, score) in &scores {
            debug!(combatant = snapshot.me.id, ?action, %score, "Action scored");
        }

        if matches!(profile, BehaviorProfile::Random) {
            return self.pick_top_three(&scores);
        }

        let mut best = scores[0];
        for &(action, score) in &scores[1..] {
            // Strictly greater: the first action wins ties
            if score > best.1 {
                best = (action, score);
            }
        }
        debug!(combatant = snapshot.me.id, action = ?best.0, score = %best.1, "Action selected");
        best.0
    }

    fn pick_top_three(&mut self, scores: &[(Action, Fixed); 10]) -> Action {
        let mut usable: Vec<(Action, Fixed)> = scores
            .iter()
            .copied()
            .filter(|(_, score)| *score > UNUSABLE)
            .collect();
        // Stable sort keeps evaluation order among equal scores
        usable.sort_by(|a, b| b.1.cmp(&a.1));
        usable.truncate(3);
        if usable.is_empty() {
            return Action::Idle;
        }
        let pick = self.rng.gen_range(0..usable.len());
        usable[pick].0
    }
}

/// Move `rng` to the words reserved for this combatant on this tick.
pub(crate) fn position_stream(rng: &mut ChaCha8Rng, snapshot: &Snapshot) {
    rng.set_stream(snapshot.me.id);
    rng.set_word_pos(u128::from(snapshot.tick) << 32);
}

impl DecisionSource for UtilityScorer {
    fn try_decide(&mut self, profile: &BehaviorProfile, snapshot: &Snapshot) -> Option<Action> {
        Some(self.select(profile, snapshot))
    }
}

fn is_usable(action: Action, me: &SelfView) -> bool {
    match action {
        Action::Idle => true,
        Action::Advance | Action::Retreat | Action::StrafeLeft | Action::StrafeRight => {
            me.state.can_act()
        }
        Action::Dash => me.dash_ready(),
        Action::LightAttack | Action::HeavyAttack | Action::SpecialAttack | Action::Heal => {
            action.slot().is_some_and(|slot| me.slot_ready(slot))
        }
    }
}

fn strike_score(action: Action, dist: Fixed, hp: Fixed, enemy_hp: Fixed, style: &Style) -> Fixed {
    match action {
        Action::HeavyAttack => {
            let mut s = band_below(dist, &[(70, 600), (110, 400)], -200);
            if enemy_hp < pct(30) {
                s += fx(400);
            }
            style.aggressive(s, 130)
        }
        Action::SpecialAttack => {
            let mut s = band_below(dist, &[(60, 800), (100, 400), (140, 100)], -500);
            if hp < pct(30) {
                s += fx(200);
            }
            s
        }
        _ => {
            let s = band_below(dist, &[(60, 500), (90, 400), (120, 200)], -100);
            style.defensive(s, 120)
        }
    }
}

/// First band whose upper limit `dist` is under.
fn band_below(dist: Fixed, bands: &[(i32, i32)], otherwise: i32) -> Fixed {
    bands
        .iter()
        .find(|(limit, _)| dist < fx(*limit))
        .map_or(fx(otherwise), |(_, score)| fx(*score))
}

/// First band whose lower limit `dist` is over.
fn band_above(dist: Fixed, bands: &[(i32, i32)], otherwise: i32) -> Fixed {
    bands
        .iter()
        .find(|(limit, _)| dist > fx(*limit))
        .map_or(fx(otherwise), |(_, score)| fx(*score))
}

fn spends_resource(me: &SelfView, action: Action) -> bool {
    action
        .slot()
        .and_then(|slot| me.slots.get(slot))
        .is_some_and(|s| s.available && s.spends_resource)
}

/// Profile multipliers resolved once per decision.
struct Style {
    aggressive: bool,
    defensive: bool,
    traits: Option<Personality>,
}

impl Style {
    fn of(profile: &BehaviorProfile) -> Self {
        match profile {
            // Random picks from the top three of an aggressive evaluation
            BehaviorProfile::Aggressive | BehaviorProfile::Random => Self {
                aggressive: true,
                defensive: false,
                traits: None,
            },
            BehaviorProfile::Defensive => Self {
                aggressive: false,
                defensive: true,
                traits: None,
            },
            BehaviorProfile::Personality(p) => Self {
                aggressive: false,
                defensive: false,
                traits: Some(*p),
            },
        }
    }

    fn aggressive(&self, score: Fixed, percent: i32) -> Fixed {
        if self.aggressive {
            scale(score, percent)
        } else {
            score
        }
    }

    fn defensive(&self, score: Fixed, percent: i32) -> Fixed {
        if self.defensive {
            scale(score, percent)
        } else {
            score
        }
    }

    /// Trait weights: 5 is neutral, each point away moves the weight by 10%.
    fn personality(
        &self,
        action: Action,
        score: Fixed,
        snapshot: &Snapshot,
        spends: bool,
    ) -> Fixed {
        let Some(p) = self.traits else {
            return score;
        };
        let weight = |t: u8| 100 + (i32::from(t.min(10)) - 5) * 10;
        let inverse = |t: u8| 200 - weight(t);

        let mut s = match action {
            Action::Advance
            | Action::Dash
            | Action::LightAttack
            | Action::HeavyAttack
            | Action::SpecialAttack => scale(score, weight(p.aggression)),
            Action::StrafeLeft | Action::StrafeRight => scale(score, weight(p.positioning)),
            Action::Retreat => scale(
                scale(score, weight(p.positioning)),
                inverse(p.risk_taking),
            ),
            Action::Heal => scale(score, inverse(p.risk_taking)),
            Action::Idle => score,
        };
        if spends && snapshot.me.resource_ratio() < pct(50) {
            s = scale(s, inverse(p.energy_management));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{EnemyView, SlotView};
    use crate::math::Vec2Fixed;

    fn snapshot_at(distance: i32, health: i32) -> Snapshot {
        let mut snap = Snapshot::test_default();
        snap.me.health = fx(health);
        snap.enemy = Some(EnemyView {
            id: 2,
            position: Vec2Fixed::from_ints(distance, 0),
            health: fx(100),
            max_health: fx(100),
        });
        let strike = SlotView {
            available: true,
            ..SlotView::default()
        };
        let heal = SlotView {
            available: true,
            cost: fx(20),
            spends_resource: true,
            is_support: true,
            heals: true,
            ..SlotView::default()
        };
        snap.me.slots = [strike, strike, strike, heal];
        snap
    }

    #[test]
    fn test_unusable_when_stunned() {
        let scorer = UtilityScorer::new(1);
        let mut snap = snapshot_at(50, 100);
        snap.me.state = StateKind::Stunned;
        for action in Action::ALL {
            let score = scorer.base_score(action, &BehaviorProfile::Aggressive, &snap);
            if action == Action::Idle {
                assert!(score > UNUSABLE);
            } else {
                assert_eq!(score, UNUSABLE, "{action:?}");
            }
        }
    }

    #[test]
    fn test_stunned_combatant_idles() {
        let mut scorer = UtilityScorer::new(1);
        let mut snap = snapshot_at(50, 100);
        snap.me.state = StateKind::Stunned;
        assert_eq!(scorer.select(&BehaviorProfile::Aggressive, &snap), Action::Idle);
    }

    #[test]
    fn test_attacking_combatant_idles() {
        let mut scorer = UtilityScorer::new(1);
        let mut snap = snapshot_at(50, 100);
        snap.me.state = StateKind::Attacking;
        assert_eq!(scorer.select(&BehaviorProfile::Aggressive, &snap), Action::Idle);
    }

    #[test]
    fn test_no_enemy_idles() {
        let mut scorer = UtilityScorer::new(1);
        let snap = Snapshot::test_default();
        assert_eq!(scorer.select(&BehaviorProfile::Aggressive, &snap), Action::Idle);
    }

    #[test]
    fn test_heal_preferred_when_low_and_safe() {
        let scorer = UtilityScorer::new(3);
        let snap = snapshot_at(300, 34);
        let heal = scorer.base_score(Action::Heal, &BehaviorProfile::Defensive, &snap);
        let advance = scorer.base_score(Action::Advance, &BehaviorProfile::Defensive, &snap);
        assert_eq!(heal, fx(780));
        assert_eq!(advance, fx(500));

        let mut scorer = UtilityScorer::new(3);
        for _ in 0..50 {
            let scores = scorer.evaluate_all(&BehaviorProfile::Defensive, &snap);
            let heal = scores[8].1;
            let advance = scores[0].1;
            assert!(heal > advance);
        }
    }

    #[test]
    fn test_heal_on_cooldown_unusable() {
        let scorer = UtilityScorer::new(3);
        let mut snap = snapshot_at(300, 20);
        snap.me.slots[3].cooldown = fx(1);
        assert_eq!(
            scorer.base_score(Action::Heal, &BehaviorProfile::Defensive, &snap),
            UNUSABLE
        );
    }

    #[test]
    fn test_aggressive_close_range_prefers_attack() {
        let mut scorer = UtilityScorer::new(9);
        let snap = snapshot_at(50, 100);
        let action = scorer.select(&BehaviorProfile::Aggressive, &snap);
        // Special 800, heavy 780, light 500 before jitter
        assert!(matches!(action, Action::SpecialAttack | Action::HeavyAttack));
    }

    #[test]
    fn test_random_profile_picks_top_three() {
        let mut scorer = UtilityScorer::new(11);
        let snap = snapshot_at(50, 100);
        for _ in 0..100 {
            let action = scorer.select(&BehaviorProfile::Random, &snap);
            assert!(matches!(
                action,
                Action::SpecialAttack | Action::HeavyAttack | Action::LightAttack
            ));
        }
    }

    #[test]
    fn test_same_seed_same_choices() {
        let snap = snapshot_at(120, 60);
        let mut a = UtilityScorer::new(42);
        let mut b = UtilityScorer::new(42);
        for _ in 0..100 {
            assert_eq!(
                a.select(&BehaviorProfile::Random, &snap),
                b.select(&BehaviorProfile::Random, &snap)
            );
        }
    }

    #[test]
    fn test_choices_independent_of_history() {
        let snap = snapshot_at(120, 60);
        let mut fresh = UtilityScorer::new(42);
        let mut used = UtilityScorer::new(42);
        let mut other = snap;
        other.me.id = 7;
        for tick in 0..40 {
            other.tick = tick;
            used.select(&BehaviorProfile::Random, &other);
            used.evaluate_all(&BehaviorProfile::Aggressive, &other);
        }
        for tick in 0..40 {
            let mut at = snap;
            at.tick = tick;
            assert_eq!(
                fresh.evaluate_all(&BehaviorProfile::Random, &at),
                used.evaluate_all(&BehaviorProfile::Random, &at)
            );
            assert_eq!(
                fresh.select(&BehaviorProfile::Random, &at),
                used.select(&BehaviorProfile::Random, &at)
            );
        }
    }

    #[test]
    fn test_jitter_varies_across_ticks() {
        let mut scorer = UtilityScorer::new(5);
        let mut snap = snapshot_at(300, 100);
        let first = scorer.evaluate_all(&BehaviorProfile::Aggressive, &snap);
        let differs = (1..20).any(|tick| {
            snap.tick = tick;
            scorer.evaluate_all(&BehaviorProfile::Aggressive, &snap) != first
        });
        assert!(differs);
    }

    #[test]
    fn test_personality_aggression_scales_advance() {
        let scorer = UtilityScorer::new(1);
        let snap = snapshot_at(300, 100);
        let bold = BehaviorProfile::Personality(Personality {
            aggression: 10,
            ..Personality::default()
        });
        let neutral = BehaviorProfile::Personality(Personality::default());
        assert_eq!(scorer.base_score(Action::Advance, &neutral, &snap), fx(500));
        assert_eq!(scorer.base_score(Action::Advance, &bold, &snap), fx(750));
    }
}

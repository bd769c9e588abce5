//! A scripted controller with fixed distance thresholds.
//!
//! Much cheaper than the utility scorer and much easier to read; used as
//! an alternative fallback and as a sparring partner in batch runs. It
//! does not check usability: an action the combatant cannot take this
//! tick is simply ignored by the state machine.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::utility::position_stream;
use super::{Action, BehaviorProfile, DecisionSource, Snapshot};
use crate::combatant::StateKind;
use crate::math::Fixed;

/// Rule-based decision source driven by a seeded RNG, keyed per
/// combatant and tick like [`UtilityScorer`](super::UtilityScorer).
#[derive(Debug, Clone)]
pub struct RuleBasedSource {
    rng: ChaCha8Rng,
}

impl RuleBasedSource {
    /// Create with a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// True with `percent`% probability.
    fn chance(&mut self, percent: u32) -> bool {
        self.rng.gen_range(0..100) < percent
    }

    fn aggressive(&mut self, dist: Fixed) -> Action {
        if dist > Fixed::from_num(220) {
            Action::Advance
        } else if dist > Fixed::from_num(140) && self.chance(35) {
            Action::Dash
        } else if dist < Fixed::from_num(90) && self.chance(35) {
            Action::SpecialAttack
        } else if self.chance(60) {
            Action::LightAttack
        } else {
            Action::HeavyAttack
        }
    }

    fn defensive(&mut self, dist: Fixed) -> Action {
        if dist < Fixed::from_num(120) && self.chance(40) {
            if self.chance(50) {
                Action::StrafeLeft
            } else {
                Action::StrafeRight
            }
        } else if dist < Fixed::from_num(140) {
            Action::Retreat
        } else if dist > Fixed::from_num(220) && self.chance(25) {
            Action::Dash
        } else {
            Action::LightAttack
        }
    }
}

impl DecisionSource for RuleBasedSource {
    fn try_decide(&mut self, profile: &BehaviorProfile, snapshot: &Snapshot) -> Option<Action> {
        if snapshot.me.state == StateKind::KnockedOut {
            return Some(Action::Idle);
        }
        let dist = snapshot.enemy_distance()?;
        position_stream(&mut self.rng, snapshot);

        let low = snapshot.me.health * Fixed::from_num(100)
            < snapshot.me.max_health * Fixed::from_num(35);
        if low && snapshot.me.slots[3].cooldown <= Fixed::ZERO && snapshot.me.slots[3].available {
            return Some(Action::Heal);
        }

        let action = match profile {
            BehaviorProfile::Aggressive => self.aggressive(dist),
            BehaviorProfile::Defensive => self.defensive(dist),
            BehaviorProfile::Personality(p) if p.aggression >= 5 => self.aggressive(dist),
            BehaviorProfile::Personality(_) => self.defensive(dist),
            BehaviorProfile::Random => {
                let index = self.rng.gen_range(0..Action::ALL.len());
                Action::ALL[index]
            }
        };
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{EnemyView, SlotView};
    use crate::math::Vec2Fixed;

    fn snapshot(distance: i32) -> Snapshot {
        let mut snap = Snapshot::test_default();
        snap.enemy = Some(EnemyView {
            id: 2,
            position: Vec2Fixed::from_ints(distance, 0),
            health: Fixed::from_num(100),
            max_health: Fixed::from_num(100),
        });
        snap
    }

    #[test]
    fn test_no_enemy_declines() {
        let mut source = RuleBasedSource::new(1);
        let snap = Snapshot::test_default();
        assert_eq!(source.try_decide(&BehaviorProfile::Aggressive, &snap), None);
    }

    #[test]
    fn test_far_aggressive_advances() {
        let mut source = RuleBasedSource::new(1);
        let snap = snapshot(400);
        for _ in 0..20 {
            assert_eq!(
                source.decide(&BehaviorProfile::Aggressive, &snap),
                Action::Advance
            );
        }
    }

    #[test]
    fn test_defensive_backs_off() {
        let mut source = RuleBasedSource::new(5);
        let snap = snapshot(130);
        for _ in 0..20 {
            assert_eq!(
                source.decide(&BehaviorProfile::Defensive, &snap),
                Action::Retreat
            );
        }
    }

    #[test]
    fn test_low_health_heals() {
        let mut source = RuleBasedSource::new(7);
        let mut snap = snapshot(50);
        snap.me.health = Fixed::from_num(20);
        snap.me.slots[3] = SlotView {
            available: true,
            ..SlotView::default()
        };
        assert_eq!(source.decide(&BehaviorProfile::Aggressive, &snap), Action::Heal);
    }
}

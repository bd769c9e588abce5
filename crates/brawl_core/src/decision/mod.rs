//! Per-tick action selection for autonomous combatants.
//!
//! Each living combatant gets a read-only [`Snapshot`] taken before any
//! combatant mutates this tick. A [`DecisionSource`] turns the snapshot
//! and the combatant's [`BehaviorProfile`] into exactly one [`Action`].
//!
//! - [`UtilityScorer`] is the built-in source: every action is scored
//!   independently and the best one wins.
//! - [`RuleBasedSource`] is a lightweight scripted controller.
//! - [`FallbackSource`] composes an external source with a fallback, so a
//!   plugged-in controller that declines (or is absent) never leaves a
//!   combatant without a decision.

mod rules;
mod snapshot;
mod utility;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use rules::RuleBasedSource;
pub use snapshot::{AllyView, EnemyView, SelfView, SlotView, Snapshot, SLOT_COUNT};
pub use utility::{UtilityScorer, UNUSABLE};

/// The fixed action catalogue, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Accelerate toward the nearest enemy.
    Advance,
    /// Accelerate away from the nearest enemy.
    Retreat,
    /// Accelerate along the left perpendicular.
    StrafeLeft,
    /// Accelerate along the right perpendicular.
    StrafeRight,
    /// Burst toward the current facing.
    Dash,
    /// Move in slot 0.
    LightAttack,
    /// Move in slot 1.
    HeavyAttack,
    /// Move in slot 2.
    SpecialAttack,
    /// Move in slot 3.
    Heal,
    /// Do nothing; a walking combatant stops walking.
    Idle,
}

impl Action {
    /// Every action in evaluation order. Earlier actions win ties.
    pub const ALL: [Action; 10] = [
        Action::Advance,
        Action::Retreat,
        Action::StrafeLeft,
        Action::StrafeRight,
        Action::Dash,
        Action::LightAttack,
        Action::HeavyAttack,
        Action::SpecialAttack,
        Action::Heal,
        Action::Idle,
    ];

    /// Loadout slot used by move actions.
    #[must_use]
    pub const fn slot(self) -> Option<usize> {
        match self {
            Action::LightAttack => Some(0),
            Action::HeavyAttack => Some(1),
            Action::SpecialAttack => Some(2),
            Action::Heal => Some(3),
            _ => None,
        }
    }

    /// True for the four steering actions.
    #[must_use]
    pub const fn is_movement(self) -> bool {
        matches!(
            self,
            Action::Advance | Action::Retreat | Action::StrafeLeft | Action::StrafeRight
        )
    }
}

/// Continuous personality traits on a 0–10 scale. 5 is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    /// Appetite for closing distance and attacking.
    pub aggression: u8,
    /// Willingness to heal allies.
    pub teamplay: u8,
    /// Tolerance for staying in at low health.
    pub risk_taking: u8,
    /// Preference for strafing and spacing.
    pub positioning: u8,
    /// Reluctance to spend resource when it runs low.
    pub energy_management: u8,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            aggression: 5,
            teamplay: 5,
            risk_taking: 5,
            positioning: 5,
            energy_management: 5,
        }
    }
}

/// How a combatant's AI weights its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BehaviorProfile {
    /// Favors advancing, dashing and heavy attacks.
    #[default]
    Aggressive,
    /// Favors retreating, strafing and healing.
    Defensive,
    /// Picks uniformly among the three best actions.
    Random,
    /// Weights derived from a trait vector.
    Personality(Personality),
}

/// A pluggable decision strategy.
pub trait DecisionSource {
    /// Choose an action, or `None` to decline.
    fn try_decide(&mut self, profile: &BehaviorProfile, snapshot: &Snapshot) -> Option<Action>;

    /// Choose an action, idling if the source declines.
    fn decide(&mut self, profile: &BehaviorProfile, snapshot: &Snapshot) -> Action {
        self.try_decide(profile, snapshot).unwrap_or(Action::Idle)
    }
}

impl<T: DecisionSource + ?Sized> DecisionSource for Box<T> {
    fn try_decide(&mut self, profile: &BehaviorProfile, snapshot: &Snapshot) -> Option<Action> {
        (**self).try_decide(profile, snapshot)
    }
}

/// Tries `primary` first and falls back to `fallback` when it declines.
#[derive(Debug, Clone)]
pub struct FallbackSource<P, F> {
    primary: Option<P>,
    fallback: F,
}

impl<P, F> FallbackSource<P, F> {
    /// Compose a primary source with a fallback.
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary: Some(primary),
            fallback,
        }
    }

    /// Only the fallback, until a primary source is plugged in.
    pub fn fallback_only(fallback: F) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    /// Plug in (or replace) the primary source.
    pub fn set_primary(&mut self, primary: P) {
        self.primary = Some(primary);
    }

    /// Remove the primary source.
    pub fn clear_primary(&mut self) -> Option<P> {
        self.primary.take()
    }
}

impl<P: DecisionSource, F: DecisionSource> DecisionSource for FallbackSource<P, F> {
    fn try_decide(&mut self, profile: &BehaviorProfile, snapshot: &Snapshot) -> Option<Action> {
        if let Some(primary) = self.primary.as_mut() {
            if let Some(action) = primary.try_decide(profile, snapshot) {
                return Some(action);
            }
            debug!(tick = snapshot.tick, "Primary decision source declined, falling back");
        }
        self.fallback.try_decide(profile, snapshot)
    }
}

//! Simulation tuning constants.
//!
//! Every constant the tick reads lives here so a scenario can override
//! it from RON. Defaults reproduce the reference feel at 60 Hz.

use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::math::{fixed_serde, Fixed};

/// Tuning for one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Nominal ticks per second.
    pub tick_rate: u32,
    /// Upper bound on the global hit-stop counter.
    pub hit_stop_cap: u32,
    /// Fraction of a volume's knockback added to the defender's velocity.
    #[serde(with = "fixed_serde")]
    pub knockback_transfer: Fixed,
    /// Length of a unit knockback vector.
    #[serde(with = "fixed_serde")]
    pub knockback_base: Fixed,
    /// Velocity components below this magnitude are zeroed.
    #[serde(with = "fixed_serde")]
    pub velocity_epsilon: Fixed,
    /// Length of a dash in ticks.
    pub dash_ticks: u32,
    /// Dash cooldown in seconds.
    #[serde(with = "fixed_serde")]
    pub dash_cooldown: Fixed,
    /// Cooldown, in frames, of heal and buff moves that author none.
    pub support_cooldown_frames: u32,
    /// Distance the decision engine treats as "in attack range".
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Bound of the multiplicative decision jitter (0.1 is ±10%).
    #[serde(with = "fixed_serde")]
    pub decision_jitter: Fixed,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            hit_stop_cap: 20,
            knockback_transfer: Fixed::from_num(2) / Fixed::from_num(100),
            knockback_base: Fixed::from_num(140),
            velocity_epsilon: Fixed::from_num(5) / Fixed::from_num(100),
            dash_ticks: 12,
            dash_cooldown: Fixed::ONE,
            support_cooldown_frames: 120,
            attack_range: Fixed::from_num(80),
            decision_jitter: Fixed::from_num(1) / Fixed::from_num(10),
        }
    }
}

impl SimConfig {
    /// Seconds in one nominal tick.
    #[must_use]
    pub fn frame_seconds(&self) -> Fixed {
        Fixed::ONE / Fixed::saturating_from_num(self.tick_rate.max(1))
    }

    /// Default heal/buff cooldown in seconds.
    #[must_use]
    pub fn support_cooldown(&self) -> Fixed {
        Fixed::saturating_from_num(self.support_cooldown_frames).saturating_mul(self.frame_seconds())
    }

    /// Parse from RON. Missing fields keep their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| CombatError::DataParse {
            what: "simulation config".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.hit_stop_cap, 20);
        assert_eq!(config.dash_ticks, 12);
        // 120 frames at 60 Hz
        let two = Fixed::from_num(2);
        let epsilon = Fixed::ONE / Fixed::from_num(1000);
        assert!((config.support_cooldown() - two).abs() < epsilon);
    }

    #[test]
    fn test_partial_ron_override() {
        let config = SimConfig::from_ron_str("(hit_stop_cap: 8, attack_range: 100.0)").unwrap();
        assert_eq!(config.hit_stop_cap, 8);
        assert_eq!(config.attack_range, Fixed::from_num(100));
        assert_eq!(config.tick_rate, 60);
    }

    #[test]
    fn test_bad_ron() {
        assert!(matches!(
            SimConfig::from_ron_str("(tick_rate: \"fast\")"),
            Err(CombatError::DataParse { .. })
        ));
    }
}

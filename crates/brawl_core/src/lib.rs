//! # Brawl Core
//!
//! Deterministic combat core for a small-team arena brawler.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO outside replay files
//! - No system randomness (decision jitter is seeded)
//! - No floating-point math in the tick (uses fixed-point)
//!
//! This separation enables:
//! - Headless batch simulation
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`combatant`] - The combatant entity and its stat-driven mutators
//! - [`state_machine`] - Per-tick state transitions, move frames and physics
//! - [`collision`] - Hitbox geometry and hit resolution
//! - [`decision`] - Utility-scored and rule-based action selection
//! - [`simulation`] - The tick loop tying it all together
//! - [`moves`] / [`stats`] - Authored move and stat data
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod collision;
pub mod combatant;
pub mod config;
pub mod decision;
pub mod error;
pub mod math;
pub mod moves;
pub mod replay;
pub mod simulation;
pub mod state_machine;
pub mod stats;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::collision::{overlaps, AttackVolume, Shape};
    pub use crate::combatant::{CombatState, Combatant, CombatantId, CombatantSpec, TeamId};
    pub use crate::config::SimConfig;
    pub use crate::decision::{
        Action, BehaviorProfile, DecisionSource, FallbackSource, Personality, RuleBasedSource,
        Snapshot, UtilityScorer,
    };
    pub use crate::error::{CombatError, Result};
    pub use crate::math::{ArenaBounds, Fixed, Vec2Fixed};
    pub use crate::moves::{DamageType, MoveDefinition, MoveId, MoveLibrary};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::simulation::{MatchOutcome, SimEvent, Simulation, TickEvents};
    pub use crate::stats::{Equipment, Item, StatBlock, StatKind, StatModifier};
}

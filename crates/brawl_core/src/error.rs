//! Error types for the combat simulation.
//!
//! The tick itself never fails: unusable actions are silent no-ops and
//! unknown identifiers are dropped. Errors only surface when building
//! combatants, parsing authored data, or reading replays.

use thiserror::Error;

use crate::combatant::CombatantId;

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for all combat simulation errors.
#[derive(Debug, Error)]
pub enum CombatError {
    /// A combatant was built without a single usable move.
    #[error("Combatant '{name}' has an empty move catalogue (loadout: {loadout:?})")]
    EmptyMoveCatalogue {
        /// Display name of the rejected combatant.
        name: String,
        /// The loadout that failed to resolve.
        loadout: Vec<String>,
    },

    /// Invalid combatant reference.
    #[error("Combatant not found: {0}")]
    UnknownCombatant(CombatantId),

    /// Data parsing error.
    #[error("Failed to parse {what}: {message}")]
    DataParse {
        /// What was being parsed (e.g. "move library").
        what: String,
        /// Error message.
        message: String,
    },

    /// Replay could not be read, written, or verified.
    #[error("Replay error: {0}")]
    Replay(String),

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}

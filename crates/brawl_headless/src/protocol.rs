//! JSON protocol for driving a match from another process.
//!
//! The runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the external controller
//! **Output (stdout):** Tick events, state dumps and responses
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. The controller sends commands as JSON lines
//! 3. Every processed tick outputs its events
//! 4. Once a team wins, outputs `{"type":"match_over",...}` once
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"action","combatant":1,"action":"Dash"}
//! <- {"type":"ack","cmd":"action"}
//! -> {"cmd":"tick","count":2}
//! <- {"type":"tick","tick":1,"frozen":false,"events":[]}
//! <- {"type":"tick","tick":2,"frozen":false,"events":[{"event":"skill_used",...}]}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":2,"hit_stop":0,"combatants":[...]}
//! ```

use brawl_core::combatant::{Combatant, CombatantId, StateKind, TeamId};
use brawl_core::decision::Action;
use brawl_core::simulation::{SimEvent, Simulation, TickEvents};
use serde::{Deserialize, Serialize};

/// Protocol version reported in the ready message.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the simulation by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Override one combatant's next decision.
    Action {
        /// Target combatant.
        combatant: CombatantId,
        /// The action to take.
        action: Action,
    },

    /// Request a state dump without advancing time.
    Query,

    /// End the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

impl Command {
    /// Parse a command from one JSON line.
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses written by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// Events of one processed tick.
    Tick {
        /// Tick number.
        tick: u64,
        /// True if the tick was consumed by hit-stop.
        frozen: bool,
        /// Events in emission order.
        events: Vec<SimEvent>,
    },

    /// Full state dump.
    State(StateDump),

    /// A command was accepted.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// The match has been decided.
    MatchOver {
        /// Surviving team, if any.
        winner: Option<TeamId>,
        /// Tick the match ended on.
        tick: u64,
        /// Final state hash.
        state_hash: u64,
    },

    /// Something went wrong.
    Error {
        /// Description.
        message: String,
        /// The command that failed, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },
}

impl Response {
    /// Ready message at `tick`.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Acknowledge `cmd`.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Error message.
    #[must_use]
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(str::to_string),
        }
    }

    /// Wrap one tick's events.
    #[must_use]
    pub fn tick(events: TickEvents) -> Self {
        Self::Tick {
            tick: events.tick,
            frozen: events.frozen,
            events: events.events,
        }
    }

    /// Serialize as a JSON line with trailing newline.
    #[must_use]
    pub fn to_json_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("{json}\n"),
            Err(e) => format!("{{\"type\":\"error\",\"message\":\"serialization failed: {e}\"}}\n"),
        }
    }
}

/// Snapshot of the whole match for the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDump {
    /// Current tick.
    pub tick: u64,
    /// Remaining hit-stop.
    pub hit_stop: u32,
    /// Every combatant, sorted by id.
    pub combatants: Vec<CombatantState>,
}

impl StateDump {
    /// Capture the simulation's current state.
    #[must_use]
    pub fn capture(sim: &Simulation) -> Self {
        Self {
            tick: sim.tick_count(),
            hit_stop: sim.hit_stop(),
            combatants: sim.combatants().iter().map(CombatantState::from).collect(),
        }
    }
}

/// One combatant as seen by the controller.
///
/// Values are converted to floats for display only; nothing read back
/// from this struct feeds the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantState {
    /// Id.
    pub id: CombatantId,
    /// Team.
    pub team: TeamId,
    /// Display name.
    pub name: String,
    /// Position (x, y).
    pub position: (f64, f64),
    /// Health.
    pub health: f64,
    /// Max health.
    pub max_health: f64,
    /// Resource.
    pub resource: f64,
    /// Discrete state.
    pub state: StateKind,
}

impl From<&Combatant> for CombatantState {
    fn from(c: &Combatant) -> Self {
        Self {
            id: c.id,
            team: c.team,
            name: c.name.clone(),
            position: (c.position.x.to_num(), c.position.y.to_num()),
            health: c.health.to_num(),
            max_health: c.stats.max_health.to_num(),
            resource: c.resource.to_num(),
            state: c.state.kind(),
        }
    }
}

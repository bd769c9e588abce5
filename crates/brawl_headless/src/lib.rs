//! Headless match runner for AI testing and CI verification.
//!
//! This crate drives `brawl_core` matches without graphics. This enables:
//!
//! - **AI testing**: An external agent can issue manual actions over JSON
//! - **Balance runs**: Many seeds in parallel with win-rate summaries
//! - **Replay verification**: Check that replays produce identical results
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (tick, action, query, quit)
//! - **stdout**: Tick events and responses (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See the [`protocol`] module for every command and response.
//!
//! # Example
//!
//! ```bash
//! # Play interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p brawl_headless -- play
//!
//! # Run a scenario to completion, recording a replay
//! cargo run -p brawl_headless -- run --scenario scenarios/skirmish_3v3.ron --record match.replay
//!
//! # Verify the replay
//! cargo run -p brawl_headless -- replay --file match.replay --verify
//! ```

pub mod batch;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, run_match, verify_determinism, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, MatchMetrics, MetricsCollector};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};

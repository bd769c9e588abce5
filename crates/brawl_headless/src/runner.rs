//! Headless match runner implementation.

use std::io::{self, BufRead, Write};

use brawl_core::error::Result as CombatResult;
use brawl_core::replay::Replay;
use brawl_core::simulation::{MatchOutcome, Simulation, TickEvents};
use tracing::{debug, info, warn};

use crate::protocol::{Command, Response, StateDump};
use crate::scenario::{Scenario, ScenarioError};

/// Headless runner configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessConfig {
    /// Output a state dump after every tick (vs only on query).
    pub auto_state_output: bool,
    /// Tick limit; 0 means unlimited.
    pub max_ticks: u64,
}

/// Drives one simulation from JSON commands or to completion.
///
/// Every runner records a replay from its initial state; manual actions
/// are captured by the simulation itself.
#[derive(Debug)]
pub struct HeadlessRunner {
    sim: Simulation,
    config: HeadlessConfig,
    replay: Replay,
    match_reported: bool,
}

impl HeadlessRunner {
    /// Build a runner for a scenario.
    ///
    /// # Errors
    /// Returns an error if the roster cannot be built.
    pub fn new(scenario: &Scenario, seed: u64) -> Result<Self, ScenarioError> {
        let sim = scenario.build_with_seed(seed)?;
        let config = HeadlessConfig {
            auto_state_output: false,
            max_ticks: scenario.max_ticks,
        };
        Ok(Self::from_simulation(sim, &scenario.name, config)?)
    }

    /// Wrap an existing simulation.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be serialized.
    pub fn from_simulation(
        sim: Simulation,
        scenario_id: &str,
        config: HeadlessConfig,
    ) -> CombatResult<Self> {
        let replay = Replay::new(scenario_id, &sim)?;
        Ok(Self {
            sim,
            config,
            replay,
            match_reported: false,
        })
    }

    /// Set whether every tick is followed by a state dump.
    #[must_use]
    pub fn with_auto_state(mut self, enabled: bool) -> Self {
        self.config.auto_state_output = enabled;
        self
    }

    /// The simulation being driven.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// True once the tick limit is hit.
    #[must_use]
    pub const fn limit_reached(&self) -> bool {
        self.config.max_ticks > 0 && self.sim.tick_count() >= self.config.max_ticks
    }

    /// The replay of everything run so far.
    #[must_use]
    pub fn replay(&self) -> Replay {
        let mut replay = self.replay.clone();
        replay.finalize(&self.sim);
        replay
    }

    fn report_outcome(&mut self) -> Option<Response> {
        if self.match_reported {
            return None;
        }
        let outcome = self.sim.outcome()?;
        self.match_reported = true;
        Some(Response::MatchOver {
            winner: outcome.winner,
            tick: outcome.tick,
            state_hash: self.sim.state_hash(),
        })
    }

    /// Process one command and return its responses in order.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        match command {
            Command::Tick { count } => {
                let mut responses = Vec::new();
                for _ in 0..count {
                    if self.limit_reached() {
                        responses.push(Response::error("Tick limit reached", Some("tick")));
                        break;
                    }
                    responses.push(Response::tick(self.sim.step()));
                    if self.config.auto_state_output {
                        responses.push(Response::State(StateDump::capture(&self.sim)));
                    }
                    responses.extend(self.report_outcome());
                }
                responses
            }
            Command::Action { combatant, action } => {
                if self.sim.apply_action(combatant, action) {
                    debug!(combatant, ?action, "Manual action queued");
                    vec![Response::ack("action")]
                } else {
                    vec![Response::error(
                        format!("Combatant {combatant} is unknown or knocked out"),
                        Some("action"),
                    )]
                }
            }
            Command::Query => vec![Response::State(StateDump::capture(&self.sim))],
            Command::Quit => vec![Response::ack("quit")],
        }
    }

    /// Serve the JSON-lines protocol until `quit` or end of input.
    ///
    /// # Errors
    /// Returns an error if reading input or writing output fails.
    pub fn serve<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(Response::ready(self.sim.tick_count()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let command = match Command::from_json(line) {
                Ok(command) => command,
                Err(e) => {
                    warn!(error = %e, "Invalid command");
                    let response = Response::error(format!("Invalid command: {e}"), None);
                    output.write_all(response.to_json_line().as_bytes())?;
                    output.flush()?;
                    continue;
                }
            };

            let quit = command == Command::Quit;
            for response in self.handle(command) {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if quit {
                break;
            }
        }

        info!(tick = self.sim.tick_count(), "Session ended");
        Ok(())
    }

    /// Run without input until the match ends or the tick limit is hit,
    /// writing every tick that produced events.
    ///
    /// # Errors
    /// Returns an error if writing output fails.
    pub fn run_to_end<W: Write>(&mut self, mut output: W) -> io::Result<Option<MatchOutcome>> {
        while self.sim.outcome().is_none() && !self.limit_reached() {
            let events: TickEvents = self.sim.step();
            if !events.events.is_empty() {
                output.write_all(Response::tick(events).to_json_line().as_bytes())?;
            }
        }
        if let Some(response) = self.report_outcome() {
            output.write_all(response.to_json_line().as_bytes())?;
        } else {
            info!(tick = self.sim.tick_count(), "Tick limit reached without a winner");
        }
        output.flush()?;
        Ok(self.sim.outcome())
    }
}

//! Replay system for recording and playing back matches.
//!
//! Replays store the initial simulation state and the stream of manual
//! actions issued during the match. Everything else is recomputed by the
//! seeded decision engine, so a replay recreates the match exactly.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::combatant::CombatantId;
use crate::decision::Action;
use crate::error::{CombatError, Result};
use crate::simulation::Simulation;

/// A manual action record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayAction {
    /// Tick count when the action was issued; it takes effect on the
    /// next non-frozen tick.
    pub tick: u64,
    /// Combatant the action was issued to.
    pub combatant: CombatantId,
    /// The action.
    pub action: Action,
}

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Seed of the decision engine.
    pub seed: u64,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// Manual actions in issue order.
    pub actions: Vec<ReplayAction>,
    /// Tick count when the match ended.
    pub final_tick: u64,
    /// Final state hash for verification.
    pub final_hash: u64,
}

impl Replay {
    /// Create a replay from a simulation's initial state.
    ///
    /// # Errors
    /// Returns an error if the state cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, initial_state: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed: initial_state.seed(),
            initial_state: initial_state.serialize()?,
            actions: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        })
    }

    /// Finalize from a finished simulation, copying its manual actions,
    /// tick count and state hash.
    pub fn finalize(&mut self, simulation: &Simulation) {
        self.actions = simulation.overrides().to_vec();
        self.final_tick = simulation.tick_count();
        self.final_hash = simulation.state_hash();
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| CombatError::Replay(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| CombatError::Replay(format!("Failed to write replay file: {e}")))?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if reading or deserialization fails, or on a
    /// version mismatch.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| CombatError::Replay(format!("Failed to read replay file: {e}")))?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| CombatError::Replay(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(CombatError::Replay(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }

    /// Rebuild the simulation at tick 0.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// Actions issued at a specific tick count.
    #[must_use]
    pub fn actions_at_tick(&self, tick: u64) -> Vec<&ReplayAction> {
        self.actions.iter().filter(|a| a.tick == tick).collect()
    }

    /// Length of the replay in ticks.
    #[must_use]
    pub const fn duration(&self) -> u64 {
        self.final_tick
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    simulation: Simulation,
    /// Index into the action stream.
    action_index: usize,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Create a player positioned at tick 0.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            simulation,
            action_index: 0,
            paused: false,
        })
    }

    fn step(&mut self) {
        let current = self.simulation.tick_count();
        while let Some(action) = self.replay.actions.get(self.action_index) {
            if action.tick > current {
                break;
            }
            self.simulation.apply_action(action.combatant, action.action);
            self.action_index += 1;
        }
        self.simulation.step();
    }

    /// Advance by one tick. Returns true if there are more ticks to play.
    pub fn advance(&mut self) -> bool {
        if !self.paused && !self.is_finished() {
            self.step();
        }
        !self.is_finished()
    }

    /// Seek to a specific tick, replaying from the start.
    ///
    /// # Errors
    /// Returns an error if state restoration fails.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.simulation = self.replay.restore_initial_state()?;
        self.action_index = 0;
        let target = target_tick.min(self.replay.final_tick);
        while self.simulation.tick_count() < target {
            self.step();
        }
        Ok(())
    }

    /// Current tick count.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.simulation.tick_count()
    }

    /// The simulation being played.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.simulation.tick_count() >= self.replay.final_tick
    }

    /// Replay to the end and compare against the recorded final hash.
    ///
    /// # Errors
    /// Returns an error if state restoration fails.
    pub fn verify(&mut self) -> Result<bool> {
        self.seek(self.replay.final_tick)?;
        Ok(self.simulation.state_hash() == self.replay.final_hash)
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::CombatantSpec;
    use crate::config::SimConfig;
    use crate::math::Vec2Fixed;
    use crate::moves::MoveLibrary;

    fn create_test_simulation() -> Simulation {
        let library = MoveLibrary::standard();
        let mut sim = Simulation::new(SimConfig::default(), 12345);
        sim.spawn(
            CombatantSpec::new(1, 0, Vec2Fixed::from_ints(500, 360), &["slash", "power_strike"]),
            &library,
        )
        .unwrap();
        sim.spawn(
            CombatantSpec::new(2, 1, Vec2Fixed::from_ints(780, 360), &["punch", "quick_heal"]),
            &library,
        )
        .unwrap();
        sim
    }

    fn recorded(ticks: u64) -> Replay {
        let mut sim = create_test_simulation();
        let mut replay = Replay::new("test_scenario", &sim).unwrap();
        for t in 0..ticks {
            if t == 3 {
                sim.apply_action(1, Action::Dash);
            }
            sim.step();
        }
        replay.finalize(&sim);
        replay
    }

    #[test]
    fn test_replay_create() {
        let sim = create_test_simulation();
        let replay = Replay::new("test_scenario", &sim).unwrap();
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.scenario_id, "test_scenario");
        assert_eq!(replay.seed, 12345);
        assert!(replay.actions.is_empty());
    }

    #[test]
    fn test_actions_grouped_by_tick() {
        let mut sim = create_test_simulation();
        let mut replay = Replay::new("test_scenario", &sim).unwrap();
        sim.apply_action(1, Action::Advance);
        for _ in 0..5 {
            sim.step();
        }
        sim.apply_action(1, Action::Dash);
        sim.apply_action(2, Action::Retreat);
        sim.step();
        replay.finalize(&sim);

        assert_eq!(replay.actions_at_tick(0).len(), 1);
        assert_eq!(replay.actions_at_tick(5).len(), 2);
        assert!(replay.actions_at_tick(7).is_empty());
    }

    #[test]
    fn test_finalize_copies_overrides() {
        let replay = recorded(20);
        assert_eq!(replay.duration(), 20);
        assert_eq!(replay.actions.len(), 1);
        assert_eq!(replay.actions[0].tick, 3);
    }

    #[test]
    fn test_replay_save_load() {
        let replay = recorded(30);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.replay");
        replay.save(&path).unwrap();

        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded.scenario_id, "test_scenario");
        assert_eq!(loaded.actions, replay.actions);
        assert_eq!(loaded.final_hash, replay.final_hash);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut replay = recorded(1);
        replay.version = REPLAY_VERSION + 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.replay");
        replay.save(&path).unwrap();
        assert!(matches!(Replay::load(&path), Err(CombatError::Replay(_))));
    }

    #[test]
    fn test_replay_player_advance() {
        let mut player = ReplayPlayer::new(recorded(10)).unwrap();
        for _ in 0..5 {
            assert!(player.advance());
        }
        assert_eq!(player.current_tick(), 5);
        while player.advance() {}
        assert!(player.is_finished());
        assert_eq!(player.current_tick(), 10);
    }

    #[test]
    fn test_replay_player_pause() {
        let mut player = ReplayPlayer::new(recorded(10)).unwrap();
        player.paused = true;
        player.advance();
        assert_eq!(player.current_tick(), 0);
        player.toggle_pause();
        player.advance();
        assert_eq!(player.current_tick(), 1);
    }

    #[test]
    fn test_replay_player_seek() {
        let mut player = ReplayPlayer::new(recorded(100)).unwrap();
        player.seek(50).unwrap();
        assert_eq!(player.current_tick(), 50);
        player.seek(10).unwrap();
        assert_eq!(player.current_tick(), 10);
    }

    #[test]
    fn test_replay_verifies() {
        let mut player = ReplayPlayer::new(recorded(240)).unwrap();
        assert!(player.verify().unwrap());
    }
}

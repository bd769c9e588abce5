//! Scenario loading and configuration.
//!
//! Scenarios define the starting roster for a headless match: arena,
//! tuning, extra moves, and the fighters of every team.

use std::path::Path;

use brawl_core::combatant::{CombatantId, CombatantSpec, TeamId};
use brawl_core::config::SimConfig;
use brawl_core::decision::BehaviorProfile;
use brawl_core::error::CombatError;
use brawl_core::math::{ArenaBounds, Fixed, Vec2Fixed};
use brawl_core::moves::{MoveDefinition, MoveLibrary};
use brawl_core::simulation::Simulation;
use brawl_core::stats::{Item, StatBlock, EQUIPMENT_SLOTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The roster could not be built.
    #[error("Invalid roster: {0}")]
    Roster(#[from] CombatError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Decision engine seed.
    pub seed: u64,
    /// Tick limit; the match is a draw if it runs out.
    pub max_ticks: u64,
    /// Arena bounds.
    pub arena: ArenaBounds,
    /// Simulation tuning.
    pub config: SimConfig,
    /// Moves added to (or replacing) the built-in catalogue.
    pub moves: Vec<MoveDefinition>,
    /// Fighters, grouped by team.
    pub teams: Vec<TeamSetup>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::duel()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Resolve a scenario by built-in name or file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match name_or_path {
            "duel" => Ok(Self::duel()),
            "skirmish_3v3" => Ok(Self::skirmish_3v3()),
            path => Self::load(path),
        }
    }

    /// Striker against guardian, mid-arena.
    #[must_use]
    pub fn duel() -> Self {
        Self {
            name: "duel".to_string(),
            description: "Aggressive striker against a defensive guardian".to_string(),
            seed: 0,
            max_ticks: 60 * 120,
            arena: ArenaBounds::default(),
            config: SimConfig::default(),
            moves: Vec::new(),
            teams: vec![
                TeamSetup {
                    team: 0,
                    fighters: vec![FighterSetup::new(1, "striker", (520, 360), &STRIKER)
                        .with_profile(BehaviorProfile::Aggressive)],
                },
                TeamSetup {
                    team: 1,
                    fighters: vec![FighterSetup::new(2, "guardian", (760, 360), &GUARDIAN)
                        .with_profile(BehaviorProfile::Defensive)],
                },
            ],
        }
    }

    /// Three fighters per side with mixed roles.
    #[must_use]
    pub fn skirmish_3v3() -> Self {
        let side = |team: TeamId, x: i32| TeamSetup {
            team,
            fighters: vec![
                FighterSetup::new(u64::from(team) * 10 + 1, "striker", (x, 240), &STRIKER)
                    .with_profile(BehaviorProfile::Aggressive),
                FighterSetup::new(u64::from(team) * 10 + 2, "guardian", (x, 360), &GUARDIAN)
                    .with_profile(BehaviorProfile::Defensive),
                FighterSetup::new(u64::from(team) * 10 + 3, "medic", (x, 480), &MEDIC)
                    .with_profile(BehaviorProfile::Random),
            ],
        };
        Self {
            name: "skirmish_3v3".to_string(),
            description: "Striker, guardian and medic on each side".to_string(),
            teams: vec![side(0, 400), side(1, 880)],
            ..Self::duel()
        }
    }

    /// The built-in catalogue with this scenario's moves merged over it.
    #[must_use]
    pub fn library(&self) -> MoveLibrary {
        let mut library = MoveLibrary::standard();
        for definition in &self.moves {
            library.insert(definition.clone());
        }
        library
    }

    /// Number of fighters across all teams.
    #[must_use]
    pub fn fighter_count(&self) -> usize {
        self.teams.iter().map(|t| t.fighters.len()).sum()
    }

    /// Build a simulation with the scenario's own seed.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        self.build_with_seed(self.seed)
    }

    /// Build a simulation, overriding the seed.
    ///
    /// Unknown move ids are logged and dropped; a fighter with no known
    /// move at all is an error.
    pub fn build_with_seed(&self, seed: u64) -> Result<Simulation, ScenarioError> {
        let library = self.library();
        let mut sim = Simulation::new(self.config, seed);
        sim.set_arena(self.arena);

        for team in &self.teams {
            for fighter in &team.fighters {
                let (_, unknown) = library.resolve(&fighter.loadout);
                for id in &unknown {
                    warn!(fighter = %fighter.name, move_id = %id, "Unknown move id, dropped");
                }
                sim.spawn(fighter.to_spec(team.team), &library)?;
            }
        }

        info!(
            scenario = %self.name,
            seed,
            fighters = sim.combatants().len(),
            "Scenario loaded"
        );
        Ok(sim)
    }
}

/// Fast melee loadout with a self heal.
pub const STRIKER: [&str; 4] = ["slash", "power_strike", "whirlwind", "quick_heal"];

/// Slow, sturdy loadout with a guard buff.
pub const GUARDIAN: [&str; 4] = ["punch", "shield_bash", "ground_slam", "guard"];

/// Ranged loadout with an area heal.
pub const MEDIC: [&str; 4] = ["poke", "snipe", "dash_strike", "area_heal"];

/// The fighters of one team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Team id.
    pub team: TeamId,
    /// Fighters on this team.
    pub fighters: Vec<FighterSetup>,
}

/// Placement and build of one fighter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FighterSetup {
    /// Unique id across the scenario.
    pub id: CombatantId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Starting position (x, y).
    pub position: (i32, i32),
    /// Move ids in slot order.
    pub loadout: Vec<String>,
    /// Stat overrides; missing fields keep their defaults.
    #[serde(default)]
    pub stats: StatBlock,
    /// AI profile.
    #[serde(default)]
    pub profile: BehaviorProfile,
    /// Items equipped in slot order.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl FighterSetup {
    /// Create a fighter with default stats and no items.
    #[must_use]
    pub fn new(id: CombatantId, name: &str, position: (i32, i32), loadout: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            position,
            loadout: loadout.iter().map(|s| (*s).to_string()).collect(),
            stats: StatBlock::default(),
            profile: BehaviorProfile::default(),
            items: Vec::new(),
        }
    }

    /// Set the AI profile.
    #[must_use]
    pub fn with_profile(mut self, profile: BehaviorProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Convert into a spawnable spec.
    #[must_use]
    pub fn to_spec(&self, team: TeamId) -> CombatantSpec {
        let position = Vec2Fixed::new(
            Fixed::from_num(self.position.0),
            Fixed::from_num(self.position.1),
        );
        let loadout: Vec<&str> = self.loadout.iter().map(String::as_str).collect();
        let mut spec = CombatantSpec::new(self.id, team, position, &loadout);
        if !self.name.is_empty() {
            spec.name.clone_from(&self.name);
        }
        spec.stats = self.stats;
        spec.profile = self.profile;
        for (slot, item) in self.items.iter().take(EQUIPMENT_SLOTS).enumerate() {
            spec.equipment.equip(slot, item.clone());
        }
        if self.items.len() > EQUIPMENT_SLOTS {
            warn!(fighter = %self.name, items = self.items.len(), "Extra items ignored");
        }
        spec
    }
}

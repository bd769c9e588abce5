//! Core simulation loop.
//!
//! The simulation owns the roster and advances it one fixed tick at a
//! time. All combat logic runs here, deterministically.
//!
//! # Determinism
//!
//! - No floating-point math in the tick (fixed-point via [`Fixed`])
//! - No system randomness (decision jitter uses a seeded RNG)
//! - Consistent iteration order (roster sorted by combatant id)
//! - Same seed, roster and manual actions always produce the same ticks
//!
//! # Example
//!
//! ```
//! use brawl_core::prelude::*;
//!
//! let library = MoveLibrary::standard();
//! let mut sim = Simulation::new(SimConfig::default(), 7);
//! sim.spawn(CombatantSpec::new(1, 0, Vec2Fixed::from_ints(500, 360), &["slash"]), &library)
//!     .unwrap();
//! sim.spawn(CombatantSpec::new(2, 1, Vec2Fixed::from_ints(780, 360), &["punch"]), &library)
//!     .unwrap();
//!
//! let events = sim.step();
//! assert_eq!(events.tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::collision::{self, AttackVolume};
use crate::combatant::{Combatant, CombatantId, CombatantSpec, TeamId};
use crate::config::SimConfig;
use crate::decision::{Action, DecisionSource, Snapshot, UtilityScorer};
use crate::error::{CombatError, Result};
use crate::math::{fixed_serde, ArenaBounds, Fixed};
use crate::moves::{MoveId, MoveLibrary};
use crate::replay::ReplayAction;
use crate::state_machine::AreaHeal;

/// Nominal ticks per second.
pub const TICK_RATE: u32 = 60;

/// Per-simulation state shared with the systems during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimContext {
    /// Ticks processed so far, frozen ticks included.
    pub tick: u64,
    /// Remaining global freeze, in ticks.
    pub hit_stop: u32,
    /// Arena for the current tick.
    pub arena: ArenaBounds,
    /// Tuning constants.
    pub config: SimConfig,
}

impl SimContext {
    /// Fresh context at tick 0.
    #[must_use]
    pub fn new(config: SimConfig, arena: ArenaBounds) -> Self {
        Self {
            tick: 0,
            hit_stop: 0,
            arena,
            config,
        }
    }

    /// Add `ticks` of hit-stop, capped at the configured maximum.
    pub fn trigger_hit_stop(&mut self, ticks: u32) {
        self.hit_stop = self
            .hit_stop
            .saturating_add(ticks)
            .min(self.config.hit_stop_cap);
    }

    /// True while the world is frozen.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.hit_stop > 0
    }
}

/// Notification emitted by a tick. Consumers never feed these back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A move was accepted and entered startup.
    SkillUsed {
        /// Caster.
        combatant: CombatantId,
        /// Move.
        move_id: MoveId,
    },
    /// A move completed startup: costs are paid and effects resolve.
    MoveStarted {
        /// Caster.
        combatant: CombatantId,
        /// Move.
        move_id: MoveId,
    },
    /// A heal resolved.
    HealUsed {
        /// Caster.
        combatant: CombatantId,
        /// Total health restored across every recipient.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A volume struck a defender.
    Hit {
        /// Attacker.
        attacker: CombatantId,
        /// Defender.
        defender: CombatantId,
        /// Move that landed.
        move_id: MoveId,
        /// Health removed after mitigation.
        #[serde(with = "fixed_serde")]
        damage: Fixed,
    },
    /// A defender's health reached zero.
    KnockedOut {
        /// Attacker that landed the final hit.
        winner: CombatantId,
        /// Knocked-out combatant.
        loser: CombatantId,
    },
    /// At most one team has a living combatant.
    MatchEnded {
        /// Surviving team, or `None` if nobody survived.
        winner: Option<TeamId>,
    },
}

/// Events generated during a simulation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick number just processed.
    pub tick: u64,
    /// True if the tick was consumed by hit-stop.
    pub frozen: bool,
    /// Events in emission order.
    pub events: Vec<SimEvent>,
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Surviving team, if any.
    pub winner: Option<TeamId>,
    /// Tick the match ended on.
    pub tick: u64,
}

/// Serializable part of a simulation.
#[derive(Serialize, Deserialize)]
struct SimulationState {
    ctx: SimContext,
    seed: u64,
    roster: Vec<Combatant>,
    pending: BTreeMap<CombatantId, Action>,
    outcome: Option<MatchOutcome>,
}

/// The combat simulation.
///
/// # Tick Order
///
/// Each non-frozen tick runs these phases in order:
/// 1. **Hit-stop** - a frozen tick only decrements the freeze counter
/// 2. **Decision** - snapshot every living combatant, then choose actions
/// 3. **State machine** - apply actions, advance moves, integrate physics
/// 4. **Collision** - resolve this tick's attack volumes
/// 5. **Outcome** - end the match once at most one team stands
pub struct Simulation {
    /// Roster, sorted by id.
    roster: Vec<Combatant>,
    ctx: SimContext,
    seed: u64,
    decider: Box<dyn DecisionSource + Send>,
    /// Manual actions consumed on the next non-frozen tick.
    pending: BTreeMap<CombatantId, Action>,
    /// Manual actions in the order they were issued.
    overrides: Vec<ReplayAction>,
    outcome: Option<MatchOutcome>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.ctx.tick)
            .field("hit_stop", &self.ctx.hit_stop)
            .field("seed", &self.seed)
            .field("roster", &self.roster.len())
            .field("pending", &self.pending)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create an empty simulation using the built-in utility scorer.
    #[must_use]
    pub fn new(config: SimConfig, seed: u64) -> Self {
        Self {
            roster: Vec::new(),
            ctx: SimContext::new(config, ArenaBounds::default()),
            seed,
            decider: Box::new(UtilityScorer::from_config(seed, &config)),
            pending: BTreeMap::new(),
            overrides: Vec::new(),
            outcome: None,
        }
    }

    /// Replace the decision source.
    #[must_use]
    pub fn with_decision_source(mut self, source: impl DecisionSource + Send + 'static) -> Self {
        self.decider = Box::new(source);
        self
    }

    /// Replace the decision source in place.
    pub fn set_decision_source(&mut self, source: Box<dyn DecisionSource + Send>) {
        self.decider = source;
    }

    /// Set the arena used until the next [`tick`](Self::tick).
    pub fn set_arena(&mut self, arena: ArenaBounds) {
        self.ctx.arena = arena;
    }

    /// Add a combatant.
    ///
    /// # Errors
    /// Fails if the id is already taken.
    pub fn add_combatant(&mut self, combatant: Combatant) -> Result<()> {
        match self.roster.binary_search_by_key(&combatant.id, |c| c.id) {
            Ok(_) => Err(CombatError::InvalidState(format!(
                "Duplicate combatant id {}",
                combatant.id
            ))),
            Err(index) => {
                debug!(combatant = combatant.id, team = combatant.team, "Combatant added");
                self.roster.insert(index, combatant);
                Ok(())
            }
        }
    }

    /// Create a combatant from `spec` and add it.
    ///
    /// # Errors
    /// Fails if no move resolves or the id is already taken.
    pub fn spawn(&mut self, spec: CombatantSpec, library: &MoveLibrary) -> Result<CombatantId> {
        let combatant = Combatant::new(spec, library)?;
        let id = combatant.id;
        self.add_combatant(combatant)?;
        Ok(id)
    }

    /// Remove a combatant.
    ///
    /// # Errors
    /// Fails if the id is unknown.
    pub fn remove_combatant(&mut self, id: CombatantId) -> Result<Combatant> {
        let index = self
            .roster
            .binary_search_by_key(&id, |c| c.id)
            .map_err(|_| CombatError::UnknownCombatant(id))?;
        self.pending.remove(&id);
        Ok(self.roster.remove(index))
    }

    /// Queue a manual action for `id`, replacing its decision on the next
    /// non-frozen tick. Returns false for unknown or knocked-out ids.
    pub fn apply_action(&mut self, id: CombatantId, action: Action) -> bool {
        if !self.combatant(id).is_some_and(Combatant::is_alive) {
            return false;
        }
        self.pending.insert(id, action);
        self.overrides.push(ReplayAction {
            tick: self.ctx.tick,
            combatant: id,
            action,
        });
        true
    }

    /// Advance one nominal tick in the current arena.
    pub fn step(&mut self) -> TickEvents {
        let dt = self.ctx.config.frame_seconds();
        let arena = self.ctx.arena;
        self.tick(dt, arena)
    }

    /// Advance one tick.
    ///
    /// `elapsed` is the frame time used for cooldowns, regeneration and
    /// integration. Frame counters always advance by exactly one.
    pub fn tick(&mut self, elapsed: Fixed, arena: ArenaBounds) -> TickEvents {
        self.ctx.arena = arena;
        self.ctx.tick += 1;
        let tick = self.ctx.tick;

        // 1. Hit-stop
        if self.ctx.is_frozen() {
            self.ctx.hit_stop -= 1;
            trace!(tick, remaining = self.ctx.hit_stop, "Frozen tick");
            return TickEvents {
                tick,
                frozen: true,
                events: Vec::new(),
            };
        }

        // 2. Decision, from snapshots taken before anyone moves
        let snapshots: Vec<Option<Snapshot>> = (0..self.roster.len())
            .map(|i| {
                self.roster[i]
                    .is_alive()
                    .then(|| Snapshot::capture(&self.roster, i, tick, arena))
            })
            .collect();
        let mut pending = std::mem::take(&mut self.pending);
        let actions: Vec<Option<Action>> = snapshots
            .iter()
            .zip(&self.roster)
            .map(|(snapshot, combatant)| {
                let snapshot = snapshot.as_ref()?;
                Some(
                    pending
                        .remove(&combatant.id)
                        .unwrap_or_else(|| self.decider.decide(&combatant.profile, snapshot)),
                )
            })
            .collect();

        // 3. State machine
        let mut events = Vec::new();
        let mut volumes: Vec<AttackVolume> = Vec::new();
        let mut heals: Vec<AreaHeal> = Vec::new();
        for (i, combatant) in self.roster.iter_mut().enumerate() {
            let target = snapshots[i]
                .as_ref()
                .and_then(|s| s.enemy)
                .map(|e| e.position);
            if let Some(action) = actions[i] {
                events.extend(combatant.apply_action(action, target, &self.ctx));
            }
            let output = combatant.advance(elapsed, target, &self.ctx);
            events.extend(output.events);
            volumes.extend(output.volume);
            heals.extend(output.area_heal);
        }
        for heal in &heals {
            events.push(self.apply_area_heal(heal));
        }

        // 4. Collision
        events.extend(collision::resolve(&volumes, &mut self.roster, &mut self.ctx));

        // 5. Outcome
        events.extend(self.check_outcome());

        TickEvents {
            tick,
            frozen: false,
            events,
        }
    }

    /// Heal every living teammate of the caster within range.
    fn apply_area_heal(&mut self, heal: &AreaHeal) -> SimEvent {
        let radius_sq = heal.radius.saturating_mul(heal.radius);
        let mut total = Fixed::ZERO;
        for ally in &mut self.roster {
            if ally.team == heal.team
                && ally.is_alive()
                && ally.position.distance_squared(heal.center) <= radius_sq
            {
                total += ally.heal(heal.amount);
            }
        }
        debug!(caster = heal.caster, amount = %total, "Area heal resolved");
        SimEvent::HealUsed {
            combatant: heal.caster,
            amount: total,
        }
    }

    fn check_outcome(&mut self) -> Option<SimEvent> {
        if self.outcome.is_some() {
            return None;
        }
        let teams: BTreeSet<TeamId> = self.roster.iter().map(|c| c.team).collect();
        let standing: BTreeSet<TeamId> = self
            .roster
            .iter()
            .filter(|c| c.is_alive())
            .map(|c| c.team)
            .collect();
        if teams.len() < 2 || standing.len() > 1 {
            return None;
        }

        let winner = standing.first().copied();
        info!(tick = self.ctx.tick, ?winner, "Match ended");
        self.outcome = Some(MatchOutcome {
            winner,
            tick: self.ctx.tick,
        });
        Some(SimEvent::MatchEnded { winner })
    }

    /// Ticks processed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.ctx.tick
    }

    /// Remaining hit-stop.
    #[must_use]
    pub const fn hit_stop(&self) -> u32 {
        self.ctx.hit_stop
    }

    /// Add hit-stop as if a hit requested it.
    pub fn trigger_hit_stop(&mut self, ticks: u32) {
        self.ctx.trigger_hit_stop(ticks);
    }

    /// Shared tick context.
    #[must_use]
    pub const fn context(&self) -> &SimContext {
        &self.ctx
    }

    /// Tuning constants.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.ctx.config
    }

    /// Seed of the built-in scorer.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// All combatants, sorted by id.
    #[must_use]
    pub fn combatants(&self) -> &[Combatant] {
        &self.roster
    }

    /// Combatant by id.
    #[must_use]
    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.roster
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.roster[i])
    }

    /// Mutable combatant by id.
    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.roster
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &mut self.roster[i])
    }

    /// The match result, once decided.
    #[must_use]
    pub const fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    /// Manual actions issued so far.
    #[must_use]
    pub fn overrides(&self) -> &[ReplayAction] {
        &self.overrides
    }

    /// Hash of the deterministic state, for desync and replay checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.ctx.tick.hash(&mut hasher);
        self.ctx.hit_stop.hash(&mut hasher);
        self.roster.len().hash(&mut hasher);

        for c in &self.roster {
            c.id.hash(&mut hasher);
            c.team.hash(&mut hasher);
            c.position.hash(&mut hasher);
            c.velocity.hash(&mut hasher);
            c.heading.hash(&mut hasher);
            c.health.to_bits().hash(&mut hasher);
            c.resource.to_bits().hash(&mut hasher);
            c.state.hash(&mut hasher);
            c.state_timer.hash(&mut hasher);
            c.cooldowns.hash(&mut hasher);
            c.struck.hash(&mut hasher);
            c.buffs.hash(&mut hasher);
            if let Some(active) = &c.active_move {
                active.definition.id.hash(&mut hasher);
                active.frame.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the roster and context for replay.
    ///
    /// Manual actions not yet consumed are included. The decision source
    /// is not; a restored simulation runs the built-in scorer seeded from
    /// the stored seed, which keys its randomness by combatant and tick
    /// and so continues exactly where the original left off.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let state = SimulationState {
            ctx: self.ctx,
            seed: self.seed,
            roster: self.roster.clone(),
            pending: self.pending.clone(),
            outcome: self.outcome,
        };
        bincode::serialize(&state)
            .map_err(|e| CombatError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Restore a simulation serialized with [`serialize`](Self::serialize).
    ///
    /// # Errors
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let state: SimulationState = bincode::deserialize(data).map_err(|e| {
            CombatError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })?;
        let mut sim = Self::new(state.ctx.config, state.seed);
        sim.ctx = state.ctx;
        sim.roster = state.roster;
        sim.pending = state.pending;
        sim.outcome = state.outcome;
        Ok(sim)
    }
}

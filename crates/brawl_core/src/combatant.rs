//! The combatant entity: identity, pools, move catalogue and transient
//! combat state.
//!
//! This module holds data and the invariant-preserving mutators (damage,
//! heals, equipment). Per-tick behavior lives in
//! [`state_machine`](crate::state_machine); hit resolution lives in
//! [`collision`](crate::collision).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collision::Shape;
use crate::decision::BehaviorProfile;
use crate::error::{CombatError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::moves::{ActiveMove, BuffEffect, BuffKind, DamageType, MoveDefinition, MoveId, MoveLibrary};
use crate::stats::{Equipment, Item, StatBlock};

/// Unique identifier for a combatant.
pub type CombatantId = u64;

/// Team affiliation. Combatants on the same team never strike each other.
pub type TeamId = u8;

/// Discrete state of a combatant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CombatState {
    /// Standing still.
    #[default]
    Idle,
    /// Walking or strafing.
    Moving,
    /// Fixed-duration burst of speed.
    Dashing,
    /// Executing a move.
    Attacking(MoveId),
    /// Hitstun.
    Stunned,
    /// Terminal state once health reaches zero.
    KnockedOut,
}

/// Payload-free view of [`CombatState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// See [`CombatState::Idle`].
    Idle,
    /// See [`CombatState::Moving`].
    Moving,
    /// See [`CombatState::Dashing`].
    Dashing,
    /// See [`CombatState::Attacking`].
    Attacking,
    /// See [`CombatState::Stunned`].
    Stunned,
    /// See [`CombatState::KnockedOut`].
    KnockedOut,
}

impl StateKind {
    /// True if dashes and moves may be started from this state.
    #[must_use]
    pub const fn can_act(self) -> bool {
        matches!(self, StateKind::Idle | StateKind::Moving)
    }
}

impl CombatState {
    /// Payload-free kind of this state.
    #[must_use]
    pub fn kind(&self) -> StateKind {
        match self {
            CombatState::Idle => StateKind::Idle,
            CombatState::Moving => StateKind::Moving,
            CombatState::Dashing => StateKind::Dashing,
            CombatState::Attacking(_) => StateKind::Attacking,
            CombatState::Stunned => StateKind::Stunned,
            CombatState::KnockedOut => StateKind::KnockedOut,
        }
    }

    /// True if dashes and moves may be started from this state.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.kind().can_act()
    }
}

/// Moves known by a combatant, in loadout order.
///
/// The position in the loadout is the action slot: 0 light, 1 heavy,
/// 2 special, 3 support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCatalogue {
    moves: Vec<Arc<MoveDefinition>>,
}

impl MoveCatalogue {
    /// Build from resolved templates.
    #[must_use]
    pub fn new(moves: Vec<Arc<MoveDefinition>>) -> Self {
        Self { moves }
    }

    /// Move by id.
    #[must_use]
    pub fn get(&self, id: &MoveId) -> Option<&Arc<MoveDefinition>> {
        self.moves.iter().find(|m| &m.id == id)
    }

    /// Move in an action slot.
    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&Arc<MoveDefinition>> {
        self.moves.get(slot)
    }

    /// Number of moves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// True if no move resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Iterate in loadout order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MoveDefinition>> {
        self.moves.iter()
    }
}

/// Seconds left on one cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct Remaining(#[serde(with = "fixed_serde")] Fixed);

/// Cooldown timers in seconds remaining.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cooldowns {
    moves: BTreeMap<MoveId, Remaining>,
    #[serde(with = "fixed_serde")]
    dash: Fixed,
}

impl Cooldowns {
    /// Seconds remaining on a move. Unknown moves are ready.
    #[must_use]
    pub fn remaining(&self, id: &MoveId) -> Fixed {
        self.moves.get(id).map_or(Fixed::ZERO, |r| r.0)
    }

    /// True when the move's cooldown is at or below zero.
    #[must_use]
    pub fn is_ready(&self, id: &MoveId) -> bool {
        self.remaining(id) <= Fixed::ZERO
    }

    /// Set a move's cooldown.
    pub fn arm(&mut self, id: &MoveId, seconds: Fixed) {
        self.moves.insert(id.clone(), Remaining(seconds));
    }

    /// Seconds remaining on the dash.
    #[must_use]
    pub fn dash(&self) -> Fixed {
        self.dash
    }

    /// Set the dash cooldown.
    pub fn arm_dash(&mut self, seconds: Fixed) {
        self.dash = seconds;
    }

    /// Decrement every timer by `dt`, flooring at zero.
    pub fn decay(&mut self, dt: Fixed) {
        for remaining in self.moves.values_mut() {
            remaining.0 = (remaining.0 - dt).max(Fixed::ZERO);
        }
        self.dash = (self.dash - dt).max(Fixed::ZERO);
    }

    /// Iterate over move cooldowns in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&MoveId, Fixed)> {
        self.moves.iter().map(|(id, r)| (id, r.0))
    }
}

/// A buff currently affecting a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveBuff {
    /// Buff kind.
    pub kind: BuffKind,
    /// Defense added.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Ticks until expiry.
    pub remaining_ticks: u32,
}

/// Everything needed to create a combatant.
#[derive(Debug, Clone)]
pub struct CombatantSpec {
    /// Unique id within the roster.
    pub id: CombatantId,
    /// Team.
    pub team: TeamId,
    /// Display name.
    pub name: String,
    /// Starting position.
    pub position: Vec2Fixed,
    /// Authored stats.
    pub stats: StatBlock,
    /// Move ids in slot order.
    pub loadout: Vec<String>,
    /// Starting equipment.
    pub equipment: Equipment,
    /// AI profile.
    pub profile: BehaviorProfile,
}

impl CombatantSpec {
    /// Spec with default stats, no equipment and a default profile.
    #[must_use]
    pub fn new(id: CombatantId, team: TeamId, position: Vec2Fixed, loadout: &[&str]) -> Self {
        Self {
            id,
            team,
            name: format!("fighter-{id}"),
            position,
            stats: StatBlock::default(),
            loadout: loadout.iter().map(|s| (*s).to_string()).collect(),
            equipment: Equipment::new(),
            profile: BehaviorProfile::default(),
        }
    }
}

/// Result of a hit landing on a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitOutcome {
    /// Health actually removed.
    pub damage: Fixed,
    /// True if this hit knocked the combatant out.
    pub knocked_out: bool,
}

/// One fighter in the arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Unique id.
    pub id: CombatantId,
    /// Team.
    pub team: TeamId,
    /// Display name.
    pub name: String,
    /// World position.
    pub position: Vec2Fixed,
    /// Velocity in units per second.
    pub velocity: Vec2Fixed,
    /// Unit facing vector.
    pub heading: Vec2Fixed,
    /// Authored stats.
    pub base_stats: StatBlock,
    /// Base stats plus equipment. Read by every system.
    pub stats: StatBlock,
    /// Equipped items.
    pub equipment: Equipment,
    /// Current health, in `[0, stats.max_health]`.
    #[serde(with = "fixed_serde")]
    pub health: Fixed,
    /// Current resource, in `[0, stats.max_resource]`.
    #[serde(with = "fixed_serde")]
    pub resource: Fixed,
    /// Known moves.
    pub moves: MoveCatalogue,
    /// Cooldown timers.
    pub cooldowns: Cooldowns,
    /// Discrete state.
    pub state: CombatState,
    /// Ticks left in the current state.
    pub state_timer: u32,
    /// Move being executed.
    pub active_move: Option<ActiveMove>,
    /// Defenders already struck by the current activation.
    pub struck: BTreeSet<CombatantId>,
    /// Active buffs.
    pub buffs: Vec<ActiveBuff>,
    /// AI profile.
    pub profile: BehaviorProfile,
}

impl Combatant {
    /// Create a combatant, resolving its loadout against `library`.
    ///
    /// Unknown move ids are dropped. Fails if no move resolves.
    pub fn new(spec: CombatantSpec, library: &MoveLibrary) -> Result<Self> {
        let (moves, _unknown) = library.resolve(&spec.loadout);
        if moves.is_empty() {
            return Err(CombatError::EmptyMoveCatalogue {
                name: spec.name,
                loadout: spec.loadout,
            });
        }

        let stats = spec.stats.derive(&spec.equipment);
        Ok(Self {
            id: spec.id,
            team: spec.team,
            name: spec.name,
            position: spec.position,
            velocity: Vec2Fixed::ZERO,
            heading: Vec2Fixed::UNIT_X,
            base_stats: spec.stats,
            health: stats.max_health.max(Fixed::ZERO),
            resource: stats.max_resource.max(Fixed::ZERO),
            stats,
            equipment: spec.equipment,
            moves: MoveCatalogue::new(moves),
            cooldowns: Cooldowns::default(),
            state: CombatState::Idle,
            state_timer: 0,
            active_move: None,
            struck: BTreeSet::new(),
            buffs: Vec::new(),
            profile: spec.profile,
        })
    }

    /// True unless knocked out.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state != CombatState::KnockedOut
    }

    /// Health as a fraction of max health.
    #[must_use]
    pub fn health_ratio(&self) -> Fixed {
        if self.stats.max_health <= Fixed::ZERO {
            Fixed::ZERO
        } else {
            self.health / self.stats.max_health
        }
    }

    /// The circular region this combatant can be struck in.
    #[must_use]
    pub fn hurt_volume(&self) -> Shape {
        Shape::Circle {
            center: self.position,
            radius: self.stats.body_radius,
        }
    }

    /// Equip `item` in `slot` and recompute stats.
    pub fn equip(&mut self, slot: usize, item: Item) -> Option<Item> {
        let previous = self.equipment.equip(slot, item);
        self.recompute_stats();
        previous
    }

    /// Empty `slot` and recompute stats.
    pub fn unequip(&mut self, slot: usize) -> Option<Item> {
        let removed = self.equipment.unequip(slot);
        self.recompute_stats();
        removed
    }

    /// Recompute derived stats from base stats and equipment, clamping
    /// the pools to the new maxima.
    pub fn recompute_stats(&mut self) {
        self.stats = self.base_stats.derive(&self.equipment);
        self.health = self
            .health
            .clamp(Fixed::ZERO, self.stats.max_health.max(Fixed::ZERO));
        self.resource = self
            .resource
            .clamp(Fixed::ZERO, self.stats.max_resource.max(Fixed::ZERO));
    }

    /// Restore health, clamped to max. Returns the amount restored.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        if !self.is_alive() || amount <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let before = self.health;
        self.health = self
            .health
            .saturating_add(amount)
            .min(self.stats.max_health.max(Fixed::ZERO));
        self.health - before
    }

    /// Spend resource, flooring at zero.
    pub fn spend_resource(&mut self, amount: Fixed) {
        self.resource = (self.resource - amount.max(Fixed::ZERO)).max(Fixed::ZERO);
    }

    /// Apply a buff, replacing any active buff of the same kind.
    pub fn apply_buff(&mut self, effect: BuffEffect) {
        self.buffs.retain(|b| b.kind != effect.kind);
        self.buffs.push(ActiveBuff {
            kind: effect.kind,
            amount: effect.amount,
            remaining_ticks: effect.duration_ticks,
        });
    }

    /// Defense added by active buffs against `damage_type`.
    #[must_use]
    pub fn buff_defense(&self, damage_type: DamageType) -> Fixed {
        self.buffs
            .iter()
            .filter(|b| match (b.kind, damage_type) {
                (BuffKind::Guard, DamageType::Physical) => true,
                (BuffKind::Guard, DamageType::Energy) => false,
                (BuffKind::Fortify, _) => true,
            })
            .fold(Fixed::ZERO, |acc, b| acc + b.amount)
    }

    /// Stun duration after status resistance.
    #[must_use]
    pub fn resisted_stun(&self, stun: u32) -> u32 {
        if stun == 0 {
            return 0;
        }
        let hundred = Fixed::from_num(100);
        let resist = hundred / hundred.saturating_add(self.stats.status_resist.max(Fixed::ZERO));
        let ticks = Fixed::saturating_from_num(stun)
            .saturating_mul(self.stats.status_duration_resist.max(Fixed::ZERO))
            .saturating_mul(resist)
            .saturating_round()
            .to_num::<i64>();
        u32::try_from(ticks.max(1)).unwrap_or(u32::MAX)
    }

    /// Take a hit: mitigate, subtract health, then either knock out or
    /// stun (overriding any state), adding `knockback` to velocity.
    ///
    /// An interrupted move is discarded; if its startup had not completed
    /// its cost is never paid.
    pub fn receive_hit(
        &mut self,
        damage_type: DamageType,
        raw_damage: Fixed,
        stun: u32,
        knockback: Vec2Fixed,
    ) -> HitOutcome {
        if !self.is_alive() {
            return HitOutcome {
                damage: Fixed::ZERO,
                knocked_out: false,
            };
        }

        let defense = match damage_type {
            DamageType::Physical => self.stats.physical_defense,
            DamageType::Energy => self.stats.energy_defense,
        };
        let mitigated = defense
            .mitigate(raw_damage.max(Fixed::ZERO), self.buff_defense(damage_type))
            .max(Fixed::ZERO);
        let before = self.health;
        self.health = (self.health - mitigated).max(Fixed::ZERO);
        let damage = before - self.health;

        self.active_move = None;
        if self.health <= Fixed::ZERO {
            self.knock_out();
            return HitOutcome {
                damage,
                knocked_out: true,
            };
        }

        self.state = CombatState::Stunned;
        self.state_timer = self.resisted_stun(stun);
        self.velocity += knockback;
        HitOutcome {
            damage,
            knocked_out: false,
        }
    }

    /// Enter the terminal state.
    pub fn knock_out(&mut self) {
        self.health = Fixed::ZERO;
        self.state = CombatState::KnockedOut;
        self.state_timer = 0;
        self.active_move = None;
        self.velocity = Vec2Fixed::ZERO;
        self.buffs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Defense, Mitigation, StatKind, StatModifier};

    fn fighter(loadout: &[&str]) -> Combatant {
        let spec = CombatantSpec::new(1, 0, Vec2Fixed::ZERO, loadout);
        Combatant::new(spec, &MoveLibrary::standard()).unwrap()
    }

    #[test]
    fn test_new_starts_full() {
        let c = fighter(&["slash", "power_strike"]);
        assert_eq!(c.health, Fixed::from_num(100));
        assert_eq!(c.resource, Fixed::from_num(100));
        assert_eq!(c.moves.len(), 2);
        assert_eq!(c.state, CombatState::Idle);
    }

    #[test]
    fn test_empty_catalogue_rejected() {
        let spec = CombatantSpec::new(1, 0, Vec2Fixed::ZERO, &["missing", "also_missing"]);
        let err = Combatant::new(spec, &MoveLibrary::standard()).unwrap_err();
        match err {
            CombatError::EmptyMoveCatalogue { loadout, .. } => assert_eq!(loadout.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unknown_moves_dropped() {
        let c = fighter(&["nope", "punch"]);
        assert_eq!(c.moves.len(), 1);
        assert_eq!(c.moves.slot(0).unwrap().id.as_str(), "punch");
    }

    #[test]
    fn test_flat_defense_hit() {
        let mut spec = CombatantSpec::new(1, 0, Vec2Fixed::ZERO, &["punch"]);
        spec.stats.physical_defense = Defense::new(Fixed::from_num(20), Mitigation::Flat);
        let mut c = Combatant::new(spec, &MoveLibrary::standard()).unwrap();
        let outcome = c.receive_hit(DamageType::Physical, Fixed::from_num(35), 10, Vec2Fixed::ZERO);
        assert_eq!(c.health, Fixed::from_num(85));
        assert_eq!(outcome.damage, Fixed::from_num(15));
        assert_eq!(c.state, CombatState::Stunned);
        assert_eq!(c.state_timer, 10);
    }

    #[test]
    fn test_lethal_hit_knocks_out() {
        let mut c = fighter(&["punch"]);
        let outcome = c.receive_hit(DamageType::Physical, Fixed::from_num(500), 10, Vec2Fixed::ZERO);
        assert!(outcome.knocked_out);
        assert_eq!(outcome.damage, Fixed::from_num(100));
        assert_eq!(c.health, Fixed::ZERO);
        assert_eq!(c.state, CombatState::KnockedOut);

        // Further hits and heals are ignored
        let again = c.receive_hit(DamageType::Physical, Fixed::from_num(5), 10, Vec2Fixed::ZERO);
        assert!(!again.knocked_out);
        assert_eq!(c.heal(Fixed::from_num(50)), Fixed::ZERO);
        assert_eq!(c.state, CombatState::KnockedOut);
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut c = fighter(&["punch"]);
        c.health = Fixed::from_num(90);
        assert_eq!(c.heal(Fixed::from_num(30)), Fixed::from_num(10));
        assert_eq!(c.health, Fixed::from_num(100));
    }

    #[test]
    fn test_buffs_add_defense() {
        let mut c = fighter(&["punch"]);
        c.apply_buff(BuffEffect {
            kind: BuffKind::Guard,
            amount: Fixed::from_num(15),
            duration_ticks: 10,
        });
        assert_eq!(c.buff_defense(DamageType::Physical), Fixed::from_num(15));
        assert_eq!(c.buff_defense(DamageType::Energy), Fixed::ZERO);

        // Reapplying replaces instead of stacking
        c.apply_buff(BuffEffect {
            kind: BuffKind::Guard,
            amount: Fixed::from_num(15),
            duration_ticks: 10,
        });
        assert_eq!(c.buffs.len(), 1);
    }

    #[test]
    fn test_unequip_clamps_pools() {
        let mut c = fighter(&["punch"]);
        c.equip(
            0,
            Item {
                id: "heart".to_string(),
                modifiers: vec![StatModifier::add(StatKind::MaxHealth, Fixed::from_num(50))],
            },
        );
        assert_eq!(c.stats.max_health, Fixed::from_num(150));
        c.heal(Fixed::from_num(50));
        assert_eq!(c.health, Fixed::from_num(150));

        c.unequip(0);
        assert_eq!(c.stats.max_health, Fixed::from_num(100));
        assert_eq!(c.health, Fixed::from_num(100));
    }

    #[test]
    fn test_stun_resistance() {
        let mut c = fighter(&["punch"]);
        assert_eq!(c.resisted_stun(10), 10);
        c.base_stats.status_resist = Fixed::from_num(100);
        c.recompute_stats();
        assert_eq!(c.resisted_stun(10), 5);
        assert_eq!(c.resisted_stun(0), 0);
    }

    #[test]
    fn test_extreme_stun_saturates() {
        let mut c = fighter(&["punch"]);
        c.base_stats.status_duration_resist = Fixed::from_num(4);
        c.recompute_stats();
        assert_eq!(c.resisted_stun(u32::MAX), i32::MAX as u32);
        let outcome = c.receive_hit(DamageType::Physical, Fixed::MAX, u32::MAX, Vec2Fixed::ZERO);
        assert!(outcome.knocked_out);
    }

    #[test]
    fn test_cooldowns_decay_floor() {
        let mut cooldowns = Cooldowns::default();
        let id = MoveId::new("slash");
        cooldowns.arm(&id, Fixed::from_num(1));
        cooldowns.arm_dash(Fixed::from_num(2));
        cooldowns.decay(Fixed::from_num(3));
        assert!(cooldowns.is_ready(&id));
        assert_eq!(cooldowns.dash(), Fixed::ZERO);
    }
}

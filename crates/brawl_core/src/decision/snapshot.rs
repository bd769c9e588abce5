//! Read-only world views handed to decision sources.

use crate::combatant::{Combatant, CombatantId, StateKind, TeamId};
use crate::math::{ArenaBounds, Fixed, Vec2Fixed};
use crate::moves::MoveKind;

/// Number of move slots an action can address.
pub const SLOT_COUNT: usize = 4;

/// Readiness of one move slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotView {
    /// True if the loadout fills this slot.
    pub available: bool,
    /// Seconds of cooldown left.
    pub cooldown: Fixed,
    /// Resource cost.
    pub cost: Fixed,
    /// True if starting the move needs `cost` resource.
    pub spends_resource: bool,
    /// True for heals and buffs.
    pub is_support: bool,
    /// True for heals.
    pub heals: bool,
    /// True for heals that also reach allies.
    pub area: bool,
}

impl SlotView {
    /// True if the move could start now, given `resource`.
    #[must_use]
    pub fn is_ready(&self, resource: Fixed) -> bool {
        self.available
            && self.cooldown <= Fixed::ZERO
            && (!self.spends_resource || resource >= self.cost)
    }
}

/// The deciding combatant's own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelfView {
    /// Id.
    pub id: CombatantId,
    /// Team.
    pub team: TeamId,
    /// Position.
    pub position: Vec2Fixed,
    /// Velocity.
    pub velocity: Vec2Fixed,
    /// Health.
    pub health: Fixed,
    /// Max health.
    pub max_health: Fixed,
    /// Resource.
    pub resource: Fixed,
    /// Max resource.
    pub max_resource: Fixed,
    /// Current state.
    pub state: StateKind,
    /// Seconds of dash cooldown left.
    pub dash_cooldown: Fixed,
    /// Move slots in action order.
    pub slots: [SlotView; SLOT_COUNT],
}

impl SelfView {
    /// Health as a fraction of max.
    #[must_use]
    pub fn health_ratio(&self) -> Fixed {
        ratio(self.health, self.max_health)
    }

    /// Resource as a fraction of max.
    #[must_use]
    pub fn resource_ratio(&self) -> Fixed {
        ratio(self.resource, self.max_resource)
    }

    /// True if the slot's move could start now.
    #[must_use]
    pub fn slot_ready(&self, slot: usize) -> bool {
        self.state.can_act()
            && self
                .slots
                .get(slot)
                .is_some_and(|s| s.is_ready(self.resource))
    }

    /// True if a dash could start now.
    #[must_use]
    pub fn dash_ready(&self) -> bool {
        self.state.can_act() && self.dash_cooldown <= Fixed::ZERO
    }
}

/// The nearest living enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnemyView {
    /// Id.
    pub id: CombatantId,
    /// Position.
    pub position: Vec2Fixed,
    /// Health.
    pub health: Fixed,
    /// Max health.
    pub max_health: Fixed,
}

impl EnemyView {
    /// Health as a fraction of max.
    #[must_use]
    pub fn health_ratio(&self) -> Fixed {
        ratio(self.health, self.max_health)
    }
}

/// The nearest living ally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllyView {
    /// Id.
    pub id: CombatantId,
    /// Position.
    pub position: Vec2Fixed,
    /// Health.
    pub health: Fixed,
    /// Max health.
    pub max_health: Fixed,
    /// Distance from the deciding combatant.
    pub distance: Fixed,
}

impl AllyView {
    /// Health as a fraction of max.
    #[must_use]
    pub fn health_ratio(&self) -> Fixed {
        ratio(self.health, self.max_health)
    }
}

/// Everything a decision source may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Snapshot {
    /// Tick the snapshot was taken on.
    pub tick: u64,
    /// The deciding combatant.
    pub me: SelfView,
    /// Nearest living enemy, if any.
    pub enemy: Option<EnemyView>,
    /// Nearest living ally, if any.
    pub ally: Option<AllyView>,
    /// Arena bounds this tick.
    pub arena: ArenaBounds,
}

fn ratio(value: Fixed, max: Fixed) -> Fixed {
    if max <= Fixed::ZERO {
        Fixed::ZERO
    } else {
        value / max
    }
}

/// Index of the nearest living combatant passing `filter`, ties going to
/// the earlier roster entry.
pub(crate) fn nearest(
    roster: &[Combatant],
    from: Vec2Fixed,
    filter: impl Fn(&Combatant) -> bool,
) -> Option<usize> {
    let mut best: Option<(usize, Fixed)> = None;
    for (idx, other) in roster.iter().enumerate() {
        if !other.is_alive() || !filter(other) {
            continue;
        }
        let dist = from.distance_squared(other.position);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((idx, dist));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Index of the nearest living enemy of `roster[index]`.
pub(crate) fn nearest_enemy(roster: &[Combatant], index: usize) -> Option<usize> {
    let me = &roster[index];
    nearest(roster, me.position, |other| other.team != me.team)
}

impl Snapshot {
    /// Capture the view of `roster[index]`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn capture(roster: &[Combatant], index: usize, tick: u64, arena: ArenaBounds) -> Self {
        let me = &roster[index];

        let mut slots = [SlotView::default(); SLOT_COUNT];
        for (slot, view) in slots.iter_mut().enumerate() {
            if let Some(def) = me.moves.slot(slot) {
                *view = SlotView {
                    available: true,
                    cooldown: me.cooldowns.remaining(&def.id),
                    cost: def.cost,
                    spends_resource: def.spends_resource(),
                    is_support: def.is_support(),
                    heals: matches!(def.kind, MoveKind::Healing { .. }),
                    area: matches!(
                        def.kind,
                        MoveKind::Healing {
                            area_radius: Some(_),
                            ..
                        }
                    ),
                };
            }
        }

        let enemy = nearest_enemy(roster, index).map(|idx| {
            let e = &roster[idx];
            EnemyView {
                id: e.id,
                position: e.position,
                health: e.health,
                max_health: e.stats.max_health,
            }
        });

        let ally = nearest(roster, me.position, |other| {
            other.team == me.team && other.id != me.id
        })
        .map(|idx| {
            let a = &roster[idx];
            AllyView {
                id: a.id,
                position: a.position,
                health: a.health,
                max_health: a.stats.max_health,
                distance: me.position.distance(a.position),
            }
        });

        Self {
            tick,
            me: SelfView {
                id: me.id,
                team: me.team,
                position: me.position,
                velocity: me.velocity,
                health: me.health,
                max_health: me.stats.max_health,
                resource: me.resource,
                max_resource: me.stats.max_resource,
                state: me.state.kind(),
                dash_cooldown: me.cooldowns.dash(),
                slots,
            },
            enemy,
            ally,
            arena,
        }
    }

    /// Distance to the nearest enemy.
    #[must_use]
    pub fn enemy_distance(&self) -> Option<Fixed> {
        self.enemy.map(|e| self.me.position.distance(e.position))
    }

    #[cfg(test)]
    pub(crate) fn test_default() -> Self {
        let hundred = Fixed::from_num(100);
        Self {
            tick: 0,
            me: SelfView {
                id: 1,
                team: 0,
                position: Vec2Fixed::ZERO,
                velocity: Vec2Fixed::ZERO,
                health: hundred,
                max_health: hundred,
                resource: hundred,
                max_resource: hundred,
                state: StateKind::Idle,
                dash_cooldown: Fixed::ZERO,
                slots: [SlotView::default(); SLOT_COUNT],
            },
            enemy: None,
            ally: None,
            arena: ArenaBounds::default(),
        }
    }
}

//! Combatant stat blocks, defense mitigation, and equipment modifiers.
//!
//! A combatant carries two blocks: the authored base block and the
//! derived block (base plus equipment). The derived block is recomputed
//! whenever equipment changes and is what every other system reads.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// Number of equipment slots per combatant.
pub const EQUIPMENT_SLOTS: usize = 3;

/// How a defense stat reduces incoming damage.
///
/// Chosen per stat when the character is authored; the resolver never
/// switches family at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Mitigation {
    /// Diminishing returns: `damage * 100 / (100 + defense)`.
    #[default]
    Ratio,
    /// Flat subtraction: `max(0, damage - defense)`.
    Flat,
}

impl Mitigation {
    /// Apply this mitigation family to a raw damage value.
    #[must_use]
    pub fn apply(self, damage: Fixed, defense: Fixed) -> Fixed {
        match self {
            Mitigation::Ratio => {
                let hundred = Fixed::from_num(100);
                let divisor = hundred.saturating_add(defense).max(Fixed::ONE);
                damage.saturating_mul(hundred) / divisor
            }
            Mitigation::Flat => damage.saturating_sub(defense).max(Fixed::ZERO),
        }
    }
}

/// A defense stat together with its mitigation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Defense {
    /// Defense amount.
    #[serde(with = "fixed_serde", default)]
    pub amount: Fixed,
    /// Mitigation family used with this stat.
    #[serde(default)]
    pub mitigation: Mitigation,
}

impl Defense {
    /// Create a defense stat.
    #[must_use]
    pub const fn new(amount: Fixed, mitigation: Mitigation) -> Self {
        Self { amount, mitigation }
    }

    /// Reduce `damage` by this defense plus a temporary `bonus`.
    #[must_use]
    pub fn mitigate(&self, damage: Fixed, bonus: Fixed) -> Fixed {
        self.mitigation.apply(damage, self.amount.saturating_add(bonus))
    }
}

impl Default for Defense {
    fn default() -> Self {
        Self::new(Fixed::ZERO, Mitigation::Ratio)
    }
}

/// Identifies one numeric stat, used by equipment modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    /// Maximum health.
    MaxHealth,
    /// Maximum resource (energy).
    MaxResource,
    /// Physical attack multiplier.
    PhysicalAttack,
    /// Energy attack multiplier.
    EnergyAttack,
    /// Physical move speed multiplier.
    AttackSpeed,
    /// Energy move speed multiplier.
    CastSpeed,
    /// Physical reach multiplier.
    PhysicalRange,
    /// Energy reach multiplier.
    EnergyRange,
    /// Acceleration per second.
    Acceleration,
    /// Maximum move speed.
    MoveSpeed,
    /// Dash burst speed.
    DashSpeed,
    /// Per-tick velocity retention.
    Friction,
    /// Physical defense amount.
    PhysicalDefense,
    /// Energy defense amount.
    EnergyDefense,
    /// Health regenerated per second.
    HealthRegen,
    /// Resource regenerated per second.
    ResourceRegen,
    /// Buff strength bonus (percent).
    StatusPower,
    /// Buff duration multiplier.
    StatusDuration,
    /// Stun resistance (percent-style, diminishing).
    StatusResist,
    /// Incoming stun duration multiplier.
    StatusDurationResist,
    /// Outgoing damage multiplier.
    DamageScale,
}

/// How a modifier combines with the stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierOp {
    /// Add the value.
    Add,
    /// Multiply by `1 + value`.
    Multiply,
}

/// One stat change granted by an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatModifier {
    /// Stat affected.
    pub stat: StatKind,
    /// Combination rule.
    pub op: ModifierOp,
    /// Modifier value.
    #[serde(with = "fixed_serde")]
    pub value: Fixed,
}

impl StatModifier {
    /// Additive modifier.
    #[must_use]
    pub const fn add(stat: StatKind, value: Fixed) -> Self {
        Self {
            stat,
            op: ModifierOp::Add,
            value,
        }
    }

    /// Multiplicative modifier (`+20%` is `0.2`).
    #[must_use]
    pub const fn multiply(stat: StatKind, value: Fixed) -> Self {
        Self {
            stat,
            op: ModifierOp::Multiply,
            value,
        }
    }
}

/// An equippable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Item identifier.
    pub id: String,
    /// Stat changes while equipped.
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
}

/// Fixed-size equipment slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Equipment {
    slots: [Option<Item>; EQUIPMENT_SLOTS],
}

impl Equipment {
    /// Empty equipment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `item` in `slot`, returning the previous occupant.
    ///
    /// Out-of-range slots are ignored and hand the item back.
    pub fn equip(&mut self, slot: usize, item: Item) -> Option<Item> {
        match self.slots.get_mut(slot) {
            Some(target) => target.replace(item),
            None => Some(item),
        }
    }

    /// Empty `slot`, returning what was there.
    pub fn unequip(&mut self, slot: usize) -> Option<Item> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Item in `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Item> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Iterate over equipped items in slot order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.slots.iter().flatten()
    }
}

/// A complete stat block.
///
/// Used both for the authored base stats and for the derived stats
/// (base plus equipment). Missing fields in data files fall back to the
/// defaults of an unremarkable fighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Maximum resource (energy).
    #[serde(with = "fixed_serde")]
    pub max_resource: Fixed,
    /// Physical damage multiplier.
    #[serde(with = "fixed_serde")]
    pub physical_attack: Fixed,
    /// Energy damage and heal multiplier.
    #[serde(with = "fixed_serde")]
    pub energy_attack: Fixed,
    /// Speed multiplier for physical move frames.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
    /// Speed multiplier for energy move frames.
    #[serde(with = "fixed_serde")]
    pub cast_speed: Fixed,
    /// Reach multiplier for physical moves.
    #[serde(with = "fixed_serde")]
    pub physical_range: Fixed,
    /// Reach multiplier for energy moves.
    #[serde(with = "fixed_serde")]
    pub energy_range: Fixed,
    /// Acceleration (units per second squared).
    #[serde(with = "fixed_serde")]
    pub acceleration: Fixed,
    /// Maximum move speed (units per second).
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,
    /// Dash burst speed (units per second).
    #[serde(with = "fixed_serde")]
    pub dash_speed: Fixed,
    /// Fraction of velocity retained each tick.
    #[serde(with = "fixed_serde")]
    pub friction: Fixed,
    /// Defense against physical hits.
    pub physical_defense: Defense,
    /// Defense against energy hits.
    pub energy_defense: Defense,
    /// Health regenerated per second.
    #[serde(with = "fixed_serde")]
    pub health_regen: Fixed,
    /// Resource regenerated per second.
    #[serde(with = "fixed_serde")]
    pub resource_regen: Fixed,
    /// Buff strength bonus, in percent.
    #[serde(with = "fixed_serde")]
    pub status_power: Fixed,
    /// Multiplier on the duration of buffs this combatant casts.
    #[serde(with = "fixed_serde")]
    pub status_duration: Fixed,
    /// Diminishing resistance against incoming stun.
    #[serde(with = "fixed_serde")]
    pub status_resist: Fixed,
    /// Multiplier on incoming stun duration.
    #[serde(with = "fixed_serde")]
    pub status_duration_resist: Fixed,
    /// Multiplier on all outgoing damage.
    #[serde(with = "fixed_serde")]
    pub damage_scale: Fixed,
    /// Radius of the hurt circle.
    #[serde(with = "fixed_serde")]
    pub body_radius: Fixed,
}

impl Default for StatBlock {
    fn default() -> Self {
        Self {
            max_health: Fixed::from_num(100),
            max_resource: Fixed::from_num(100),
            physical_attack: Fixed::ONE,
            energy_attack: Fixed::ONE,
            attack_speed: Fixed::ONE,
            cast_speed: Fixed::ONE,
            physical_range: Fixed::ONE,
            energy_range: Fixed::ONE,
            acceleration: Fixed::from_num(1800),
            move_speed: Fixed::from_num(240),
            dash_speed: Fixed::from_num(560),
            friction: Fixed::from_num(0.86),
            physical_defense: Defense::default(),
            energy_defense: Defense::default(),
            health_regen: Fixed::ZERO,
            resource_regen: Fixed::ZERO,
            status_power: Fixed::ZERO,
            status_duration: Fixed::ONE,
            status_resist: Fixed::ZERO,
            status_duration_resist: Fixed::ONE,
            damage_scale: Fixed::ONE,
            body_radius: Fixed::from_num(22),
        }
    }
}

impl StatBlock {
    /// Mutable access to a single stat by kind.
    pub fn stat_mut(&mut self, kind: StatKind) -> &mut Fixed {
        match kind {
            StatKind::MaxHealth => &mut self.max_health,
            StatKind::MaxResource => &mut self.max_resource,
            StatKind::PhysicalAttack => &mut self.physical_attack,
            StatKind::EnergyAttack => &mut self.energy_attack,
            StatKind::AttackSpeed => &mut self.attack_speed,
            StatKind::CastSpeed => &mut self.cast_speed,
            StatKind::PhysicalRange => &mut self.physical_range,
            StatKind::EnergyRange => &mut self.energy_range,
            StatKind::Acceleration => &mut self.acceleration,
            StatKind::MoveSpeed => &mut self.move_speed,
            StatKind::DashSpeed => &mut self.dash_speed,
            StatKind::Friction => &mut self.friction,
            StatKind::PhysicalDefense => &mut self.physical_defense.amount,
            StatKind::EnergyDefense => &mut self.energy_defense.amount,
            StatKind::HealthRegen => &mut self.health_regen,
            StatKind::ResourceRegen => &mut self.resource_regen,
            StatKind::StatusPower => &mut self.status_power,
            StatKind::StatusDuration => &mut self.status_duration,
            StatKind::StatusResist => &mut self.status_resist,
            StatKind::StatusDurationResist => &mut self.status_duration_resist,
            StatKind::DamageScale => &mut self.damage_scale,
        }
    }

    /// Derive the effective block from this base block and `equipment`.
    ///
    /// All additive modifiers apply first, then multiplicative ones, so
    /// the result does not depend on slot order.
    #[must_use]
    pub fn derive(&self, equipment: &Equipment) -> StatBlock {
        let mut derived = *self;
        let modifiers = || equipment.items().flat_map(|item| item.modifiers.iter());

        for modifier in modifiers().filter(|m| m.op == ModifierOp::Add) {
            let stat = derived.stat_mut(modifier.stat);
            *stat = stat.saturating_add(modifier.value);
        }
        for modifier in modifiers().filter(|m| m.op == ModifierOp::Multiply) {
            let stat = derived.stat_mut(modifier.stat);
            *stat = stat.saturating_mul(Fixed::ONE.saturating_add(modifier.value));
        }

        derived
    }
}

//! Move templates, the move library, and running move instances.
//!
//! A [`MoveDefinition`] is an immutable template shared between every
//! combatant that knows the move. When a combatant starts a move, an
//! [`ActiveMove`] captures the speed-scaled frame counts and the
//! stat-scaled damage, heal and reach at that instant. Later stat changes
//! never rescale a move already in flight.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::math::{fixed_serde, option_fixed_serde, Fixed};
use crate::stats::StatBlock;

/// Lowest speed multiplier used when rescaling frames.
///
/// Speeds at or below this value are treated as this value, so a zero or
/// negative speed stat still yields finite frame counts.
pub const MIN_SPEED_SCALE: Fixed = Fixed::from_bits(1 << 27); // 1/32

/// Identifier of a move template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveId(Arc<str>);

impl MoveId {
    /// Create a move id.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MoveId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MoveId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which attack, speed and defense stats a move uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DamageType {
    /// Uses attack speed, physical attack, physical range and physical defense.
    #[default]
    Physical,
    /// Uses cast speed, energy attack, energy range and energy defense.
    /// Energy moves spend resource.
    Energy,
}

/// Authored frame counts, before speed scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameTiming {
    /// Windup frames.
    pub startup: u32,
    /// Damage window frames.
    pub active: u32,
    /// Post-move lockout frames.
    pub recovery: u32,
}

impl FrameTiming {
    /// Create a timing triple.
    #[must_use]
    pub const fn new(startup: u32, active: u32, recovery: u32) -> Self {
        Self {
            startup,
            active,
            recovery,
        }
    }

    /// Rescale by `speed` with the floors of a running move: startup and
    /// recovery are at least 1, active is at least 0.
    #[must_use]
    pub fn scaled(self, speed: Fixed) -> FrameTiming {
        let speed = speed.max(MIN_SPEED_SCALE);
        FrameTiming {
            startup: scale_frames(self.startup, speed, 1),
            active: scale_frames(self.active, speed, 0),
            recovery: scale_frames(self.recovery, speed, 1),
        }
    }
}

/// `frames` as a fixed-point count, saturating past the integer range.
fn frames_to_fixed(frames: u32) -> Fixed {
    Fixed::saturating_from_num(frames)
}

fn scale_frames(frames: u32, speed: Fixed, floor: u32) -> u32 {
    let scaled = frames_to_fixed(frames).saturating_div(speed).saturating_round();
    let frames = scaled.to_num::<i64>().max(i64::from(floor));
    u32::try_from(frames).unwrap_or(u32::MAX)
}

/// When a move's cooldown starts counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CooldownArming {
    /// On the first frame of the activation.
    #[default]
    OnActivation,
    /// On the tick startup completes.
    OnStartup,
}

/// Shape of a damaging move's hitbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HitShape {
    /// Circle using the move's radius.
    #[default]
    Circle,
    /// Rectangle aligned with the attacker's facing.
    Rect {
        /// Extent along the facing.
        #[serde(with = "fixed_serde")]
        width: Fixed,
        /// Extent across the facing.
        #[serde(with = "fixed_serde")]
        height: Fixed,
    },
}

/// Temporary defensive buffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuffKind {
    /// Adds to physical defense.
    Guard,
    /// Adds to physical and energy defense.
    Fortify,
}

/// A buff applied by a buff move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuffEffect {
    /// Which buff.
    pub kind: BuffKind,
    /// Defense added while active.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Lifetime in ticks.
    pub duration_ticks: u32,
}

fn default_knockback() -> Fixed {
    Fixed::ONE
}

/// What a move does once it resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// Emits attack volumes during the active window.
    Damaging {
        /// Base damage.
        #[serde(with = "fixed_serde")]
        damage: Fixed,
        /// Hitstun imparted, in ticks.
        stun: u32,
        /// Global freeze requested on hit, in ticks.
        hit_stop: u32,
        /// Forward reach. Zero centres the hitbox on the attacker.
        #[serde(with = "fixed_serde")]
        reach: Fixed,
        /// Hitbox radius for circular shapes.
        #[serde(with = "fixed_serde")]
        radius: Fixed,
        /// Hitbox shape.
        #[serde(default)]
        shape: HitShape,
        /// Forward impulse applied when startup completes.
        #[serde(with = "option_fixed_serde", default)]
        lunge: Option<Fixed>,
        /// Knockback multiplier.
        #[serde(with = "fixed_serde", default = "default_knockback")]
        knockback: Fixed,
        /// Number of separate hits per activation.
        #[serde(default)]
        hits: Option<u32>,
    },
    /// Restores health when startup completes.
    Healing {
        /// Base heal.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
        /// Heals the caster and living allies within this radius.
        #[serde(with = "option_fixed_serde", default)]
        area_radius: Option<Fixed>,
    },
    /// Applies a buff to the caster when startup completes.
    Buff {
        /// The buff granted.
        effect: BuffEffect,
    },
}

/// Immutable move template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveDefinition {
    /// Move identifier.
    pub id: MoveId,
    /// Stat family used.
    #[serde(default)]
    pub damage_type: DamageType,
    /// Authored frame counts.
    pub timing: FrameTiming,
    /// Resource spent by energy moves.
    #[serde(with = "fixed_serde", default)]
    pub cost: Fixed,
    /// Cooldown in seconds.
    #[serde(with = "option_fixed_serde", default)]
    pub cooldown: Option<Fixed>,
    /// When the cooldown is armed.
    #[serde(default)]
    pub cooldown_arming: CooldownArming,
    /// Effect of the move.
    pub kind: MoveKind,
}

impl MoveDefinition {
    /// True for heals and buffs.
    #[must_use]
    pub fn is_support(&self) -> bool {
        !matches!(self.kind, MoveKind::Damaging { .. })
    }

    /// True if the move needs resource to start.
    #[must_use]
    pub fn spends_resource(&self) -> bool {
        self.damage_type == DamageType::Energy
    }

    /// Cooldown to arm, in seconds. Support moves without an authored
    /// cooldown fall back to `support_default`.
    #[must_use]
    pub fn cooldown_seconds(&self, support_default: Fixed) -> Option<Fixed> {
        match self.cooldown {
            Some(cooldown) => Some(cooldown),
            None if self.is_support() => Some(support_default),
            None => None,
        }
    }
}

/// Ordered set of move templates keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MoveLibrary {
    moves: BTreeMap<MoveId, Arc<MoveDefinition>>,
}

impl MoveLibrary {
    /// Empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a move.
    pub fn insert(&mut self, definition: MoveDefinition) {
        self.moves
            .insert(definition.id.clone(), Arc::new(definition));
    }

    /// Look up a move by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<MoveDefinition>> {
        self.moves.get(id)
    }

    /// Number of moves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// True if the library holds no moves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Iterate over the moves in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MoveDefinition>> {
        self.moves.values()
    }

    /// Resolve a loadout into templates in loadout order.
    ///
    /// Returns the resolved moves and the ids that were not found.
    /// Duplicate ids resolve once.
    #[must_use]
    pub fn resolve<S: AsRef<str>>(
        &self,
        loadout: &[S],
    ) -> (Vec<Arc<MoveDefinition>>, Vec<String>) {
        let mut resolved: Vec<Arc<MoveDefinition>> = Vec::with_capacity(loadout.len());
        let mut unknown = Vec::new();
        for id in loadout {
            let id = id.as_ref();
            match self.moves.get(id) {
                Some(def) if !resolved.iter().any(|m| m.id == def.id) => {
                    resolved.push(Arc::clone(def));
                }
                Some(_) => {}
                None => unknown.push(id.to_string()),
            }
        }
        (resolved, unknown)
    }

    /// Parse a list of move definitions from RON and merge them over the
    /// built-in catalogue.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let definitions: Vec<MoveDefinition> =
            ron::from_str(text).map_err(|e| CombatError::DataParse {
                what: "move library".to_string(),
                message: e.to_string(),
            })?;
        let mut library = Self::standard();
        for definition in definitions {
            library.insert(definition);
        }
        Ok(library)
    }

    /// The built-in move catalogue.
    #[must_use]
    pub fn standard() -> Self {
        let mut library = Self::new();
        let strikes = [
            Strike::new("slash", (5, 3, 7), 8, 10, 5, 45, 22).rect(80, 50),
            Strike::new("power_strike", (12, 4, 14), 18, 18, 10, 60, 28)
                .rect(100, 60)
                .lunge(90)
                .cooldown(50),
            Strike::new("whirlwind", (8, 8, 12), 6, 8, 6, 0, 65)
                .cooldown(80)
                .hits(3),
            Strike::new("dash_strike", (10, 4, 12), 13, 15, 8, 80, 24)
                .lunge(140)
                .cooldown(60),
            Strike::new("poke", (6, 2, 6), 6, 8, 4, 70, 18).rect(120, 30),
            Strike::new("snipe", (8, 2, 10), 10, 12, 6, 140, 16).cooldown(50),
            Strike::new("shield_bash", (10, 3, 10), 10, 16, 8, 50, 26)
                .lunge(40)
                .cooldown(60)
                .knockback(Fixed::from_num(5) / Fixed::from_num(2)),
            Strike::new("retreat", (6, 2, 8), 4, 6, 3, 50, 20)
                .lunge(-80)
                .cooldown(70),
            Strike::new("ground_slam", (14, 5, 14), 14, 14, 9, 0, 70).cooldown(70),
            Strike::new("punch", (6, 3, 8), 9, 10, 6, 40, 20),
        ];
        for strike in strikes {
            library.insert(strike.build());
        }

        let support = [
            support_move(
                "guard",
                (6, 0, 6),
                30,
                150,
                MoveKind::Buff {
                    effect: BuffEffect {
                        kind: BuffKind::Guard,
                        amount: Fixed::from_num(15),
                        duration_ticks: 180,
                    },
                },
            ),
            support_move(
                "fortify",
                (8, 0, 8),
                25,
                160,
                MoveKind::Buff {
                    effect: BuffEffect {
                        kind: BuffKind::Fortify,
                        amount: Fixed::from_num(20),
                        duration_ticks: 240,
                    },
                },
            ),
            support_move(
                "area_heal",
                (12, 0, 10),
                35,
                140,
                MoveKind::Healing {
                    amount: Fixed::from_num(12),
                    area_radius: Some(Fixed::from_num(120)),
                },
            ),
            support_move(
                "quick_heal",
                (8, 0, 8),
                20,
                100,
                MoveKind::Healing {
                    amount: Fixed::from_num(15),
                    area_radius: None,
                },
            ),
            support_move(
                "self_heal",
                (10, 0, 10),
                25,
                120,
                MoveKind::Healing {
                    amount: Fixed::from_num(20),
                    area_radius: None,
                },
            ),
        ];
        for definition in support {
            library.insert(definition);
        }

        library
    }
}

/// Authored cooldowns are counted in 60 Hz frames.
fn frames_to_seconds(frames: u32) -> Fixed {
    Fixed::from_num(frames) / Fixed::from_num(60)
}

fn support_move(
    id: &str,
    (startup, active, recovery): (u32, u32, u32),
    cost: i32,
    cooldown_frames: u32,
    kind: MoveKind,
) -> MoveDefinition {
    MoveDefinition {
        id: MoveId::new(id),
        damage_type: DamageType::Energy,
        timing: FrameTiming::new(startup, active, recovery),
        cost: Fixed::from_num(cost),
        cooldown: Some(frames_to_seconds(cooldown_frames)),
        cooldown_arming: CooldownArming::OnStartup,
        kind,
    }
}

/// Builder for the physical strikes of the built-in catalogue.
struct Strike {
    id: &'static str,
    timing: FrameTiming,
    damage: i32,
    stun: u32,
    hit_stop: u32,
    reach: i32,
    radius: i32,
    shape: HitShape,
    lunge: Option<Fixed>,
    cooldown: Option<Fixed>,
    knockback: Fixed,
    hits: Option<u32>,
}

impl Strike {
    fn new(
        id: &'static str,
        (startup, active, recovery): (u32, u32, u32),
        damage: i32,
        stun: u32,
        hit_stop: u32,
        reach: i32,
        radius: i32,
    ) -> Self {
        Self {
            id,
            timing: FrameTiming::new(startup, active, recovery),
            damage,
            stun,
            hit_stop,
            reach,
            radius,
            shape: HitShape::Circle,
            lunge: None,
            cooldown: None,
            knockback: Fixed::ONE,
            hits: None,
        }
    }

    fn rect(mut self, width: i32, height: i32) -> Self {
        self.shape = HitShape::Rect {
            width: Fixed::from_num(width),
            height: Fixed::from_num(height),
        };
        self
    }

    fn lunge(mut self, impulse: i32) -> Self {
        self.lunge = Some(Fixed::from_num(impulse));
        self
    }

    fn cooldown(mut self, frames: u32) -> Self {
        self.cooldown = Some(frames_to_seconds(frames));
        self
    }

    fn knockback(mut self, multiplier: Fixed) -> Self {
        self.knockback = multiplier;
        self
    }

    fn hits(mut self, hits: u32) -> Self {
        self.hits = Some(hits);
        self
    }

    fn build(self) -> MoveDefinition {
        MoveDefinition {
            id: MoveId::new(self.id),
            damage_type: DamageType::Physical,
            timing: self.timing,
            cost: Fixed::ZERO,
            cooldown: self.cooldown,
            cooldown_arming: CooldownArming::OnActivation,
            kind: MoveKind::Damaging {
                damage: Fixed::from_num(self.damage),
                stun: self.stun,
                hit_stop: self.hit_stop,
                reach: Fixed::from_num(self.reach),
                radius: Fixed::from_num(self.radius),
                shape: self.shape,
                lunge: self.lunge,
                knockback: self.knockback,
                hits: self.hits,
            },
        }
    }
}

/// A move being executed, with values captured at start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveMove {
    /// The template.
    pub definition: Arc<MoveDefinition>,
    /// Speed-scaled frame counts.
    pub timing: FrameTiming,
    /// Frames elapsed since the move started.
    pub frame: u32,
    /// Damage after attack and damage-scale stats.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Heal after energy attack.
    #[serde(with = "fixed_serde")]
    pub heal: Fixed,
    /// Reach after range stats.
    #[serde(with = "fixed_serde")]
    pub reach: Fixed,
    /// Buff after status power and status duration.
    pub buff: Option<BuffEffect>,
}

impl ActiveMove {
    /// Start `definition` with the caster's current `stats`.
    #[must_use]
    pub fn start(definition: Arc<MoveDefinition>, stats: &StatBlock) -> Self {
        let (speed, attack, range) = match definition.damage_type {
            DamageType::Physical => (
                stats.attack_speed,
                stats.physical_attack,
                stats.physical_range,
            ),
            DamageType::Energy => (stats.cast_speed, stats.energy_attack, stats.energy_range),
        };
        let timing = definition.timing.scaled(speed);

        let (damage, heal, reach, buff) = match &definition.kind {
            MoveKind::Damaging { damage, reach, .. } => (
                damage.saturating_mul(attack).saturating_mul(stats.damage_scale),
                Fixed::ZERO,
                reach.saturating_mul(range),
                None,
            ),
            MoveKind::Healing { amount, .. } => (
                Fixed::ZERO,
                amount.saturating_mul(stats.energy_attack),
                Fixed::ZERO,
                None,
            ),
            MoveKind::Buff { effect } => {
                let power = Fixed::ONE.saturating_add(stats.status_power / Fixed::from_num(100));
                let duration = frames_to_fixed(effect.duration_ticks)
                    .saturating_mul(stats.status_duration.max(Fixed::ZERO))
                    .saturating_round()
                    .to_num::<i64>();
                let buff = BuffEffect {
                    kind: effect.kind,
                    amount: effect.amount.saturating_mul(power),
                    duration_ticks: u32::try_from(duration.max(1)).unwrap_or(u32::MAX),
                };
                (Fixed::ZERO, Fixed::ZERO, Fixed::ZERO, Some(buff))
            }
        };

        Self {
            definition,
            timing,
            frame: 0,
            damage,
            heal,
            reach,
            buff,
        }
    }

    /// Ticks the move occupies: startup + active + recovery for strikes,
    /// startup + recovery for heals and buffs.
    #[must_use]
    pub fn total_ticks(&self) -> u32 {
        if self.definition.is_support() {
            self.timing.startup.saturating_add(self.timing.recovery)
        } else {
            self.timing
                .startup
                .saturating_add(self.timing.active)
                .saturating_add(self.timing.recovery)
        }
    }

    /// True while the current frame is inside the damage window.
    #[must_use]
    pub fn in_active_window(&self) -> bool {
        !self.definition.is_support()
            && self.frame > self.timing.startup
            && self.frame <= self.timing.startup.saturating_add(self.timing.active)
    }
}

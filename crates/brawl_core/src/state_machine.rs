//! Per-tick combatant behavior: action gating, move frame advancement,
//! and physics integration.
//!
//! # Transitions
//!
//! | From | To | Trigger |
//! |------|----|---------|
//! | `Idle`/`Moving` | `Attacking(id)` | successful [`Combatant::try_start_move`] |
//! | `Idle`/`Moving` | `Dashing` | successful [`Combatant::try_dash`] |
//! | any but `KnockedOut` | `Stunned` | struck (see [`collision`](crate::collision)) |
//! | `Attacking`/`Dashing`/`Stunned` | `Idle` | state timer reaches zero |
//! | any | `KnockedOut` | health reaches zero |
//!
//! Requests that are not allowed right now are silent no-ops.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::collision::{AttackVolume, Shape};
use crate::combatant::{CombatState, Combatant, CombatantId, TeamId};
use crate::decision::Action;
use crate::math::{Fixed, Vec2Fixed};
use crate::moves::{ActiveMove, CooldownArming, HitShape, MoveDefinition, MoveId, MoveKind};
use crate::simulation::{SimContext, SimEvent};

/// A heal that reaches the caster and nearby allies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaHeal {
    /// Caster.
    pub caster: CombatantId,
    /// Caster's team; only this team is healed.
    pub team: TeamId,
    /// Center of the area.
    pub center: Vec2Fixed,
    /// Radius of the area.
    pub radius: Fixed,
    /// Health restored to each recipient.
    pub amount: Fixed,
}

/// Everything one combatant produced while advancing one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceOutput {
    /// Hitbox for this tick, while a damaging move is active.
    pub volume: Option<AttackVolume>,
    /// Area heal resolved this tick, applied by the simulation.
    pub area_heal: Option<AreaHeal>,
    /// Notifications.
    pub events: Vec<SimEvent>,
}

impl Combatant {
    /// Apply a chosen action.
    ///
    /// `target` is the nearest living enemy's position, if any. Returns a
    /// `SkillUsed` event when a move starts.
    pub fn apply_action(
        &mut self,
        action: Action,
        target: Option<Vec2Fixed>,
        ctx: &SimContext,
    ) -> Option<SimEvent> {
        if !self.is_alive() {
            return None;
        }

        match action {
            Action::Advance | Action::Retreat | Action::StrafeLeft | Action::StrafeRight => {
                self.steer(action, target, ctx);
                None
            }
            Action::Dash => {
                self.try_dash(target, ctx);
                None
            }
            Action::LightAttack
            | Action::HeavyAttack
            | Action::SpecialAttack
            | Action::Heal => {
                let id = action
                    .slot()
                    .and_then(|slot| self.moves.slot(slot))
                    .map(|def| def.id.clone())?;
                self.try_start_move(&id)
            }
            Action::Idle => {
                if self.state == CombatState::Moving {
                    self.state = CombatState::Idle;
                }
                None
            }
        }
    }

    fn steer(&mut self, action: Action, target: Option<Vec2Fixed>, ctx: &SimContext) {
        if !self.state.can_act() {
            return;
        }
        let toward = target
            .map(|t| (t - self.position).normalize())
            .filter(|dir| *dir != Vec2Fixed::ZERO)
            .unwrap_or(self.heading);
        let direction = match action {
            Action::Advance => toward,
            Action::Retreat => -toward,
            Action::StrafeLeft => toward.perp(),
            _ => -toward.perp(),
        };
        let impulse = self.stats.acceleration.saturating_mul(ctx.config.frame_seconds());
        self.velocity += direction.scale(impulse);
        self.state = CombatState::Moving;
    }

    /// Start a dash toward `target`, or along the current heading when
    /// there is none. Returns true on success.
    pub fn try_dash(&mut self, target: Option<Vec2Fixed>, ctx: &SimContext) -> bool {
        if !self.state.can_act() || self.cooldowns.dash() > Fixed::ZERO {
            return false;
        }
        self.face(target);
        self.velocity = self.heading.scale(self.stats.dash_speed);
        self.state = CombatState::Dashing;
        self.state_timer = ctx.config.dash_ticks.max(1);
        self.cooldowns.arm_dash(ctx.config.dash_cooldown);
        debug!(combatant = self.id, "Dash started");
        true
    }

    /// Start the move `id`. Returns `SkillUsed` on success.
    ///
    /// Requires `Idle`/`Moving`, a ready cooldown and, for energy moves,
    /// enough resource. Resource is not spent here.
    pub fn try_start_move(&mut self, id: &MoveId) -> Option<SimEvent> {
        if !self.state.can_act() || !self.cooldowns.is_ready(id) {
            return None;
        }
        let definition = Arc::clone(self.moves.get(id)?);
        if definition.spends_resource() && self.resource < definition.cost {
            return None;
        }

        let active = ActiveMove::start(definition, &self.stats);
        self.state_timer = active.total_ticks();
        self.state = CombatState::Attacking(id.clone());
        self.active_move = Some(active);
        self.struck.clear();

        debug!(combatant = self.id, move_id = %id, ticks = self.state_timer, "Move started");
        Some(SimEvent::SkillUsed {
            combatant: self.id,
            move_id: id.clone(),
        })
    }

    /// Advance one tick. Knocked-out combatants are left untouched.
    pub fn advance(
        &mut self,
        dt: Fixed,
        target: Option<Vec2Fixed>,
        ctx: &SimContext,
    ) -> AdvanceOutput {
        let mut output = AdvanceOutput::default();
        if !self.is_alive() {
            return output;
        }

        self.cooldowns.decay(dt);
        self.regenerate(dt);
        for buff in &mut self.buffs {
            buff.remaining_ticks = buff.remaining_ticks.saturating_sub(1);
        }
        self.buffs.retain(|b| b.remaining_ticks > 0);
        self.face(target);

        match self.state {
            CombatState::Attacking(_) => self.advance_move(ctx, &mut output),
            CombatState::Dashing | CombatState::Stunned => {
                self.state_timer = self.state_timer.saturating_sub(1);
                if self.state_timer == 0 {
                    trace!(combatant = self.id, "Back to idle");
                    self.state = CombatState::Idle;
                }
            }
            CombatState::Idle | CombatState::Moving | CombatState::KnockedOut => {}
        }

        self.integrate(dt, ctx);

        if self.health <= Fixed::ZERO {
            self.knock_out();
        }
        output
    }

    fn regenerate(&mut self, dt: Fixed) {
        let max_health = self.stats.max_health.max(Fixed::ZERO);
        let max_resource = self.stats.max_resource.max(Fixed::ZERO);
        self.health = self
            .health
            .saturating_add(self.stats.health_regen.saturating_mul(dt))
            .clamp(Fixed::ZERO, max_health);
        self.resource = self
            .resource
            .saturating_add(self.stats.resource_regen.saturating_mul(dt))
            .clamp(Fixed::ZERO, max_resource);
    }

    fn face(&mut self, target: Option<Vec2Fixed>) {
        if let Some(target) = target {
            let heading = (target - self.position).normalize();
            if heading != Vec2Fixed::ZERO {
                self.heading = heading;
            }
        }
    }

    fn advance_move(&mut self, ctx: &SimContext, output: &mut AdvanceOutput) {
        let Some(running) = self.active_move.as_mut() else {
            self.state = CombatState::Idle;
            self.state_timer = 0;
            return;
        };
        running.frame += 1;
        let active = running.clone();
        let definition = Arc::clone(&active.definition);

        if active.frame == 1 && definition.cooldown_arming == CooldownArming::OnActivation {
            self.arm_cooldown(&definition, ctx);
        }
        if active.frame == active.timing.startup {
            self.complete_startup(&active, ctx, output);
        }
        if active.in_active_window() {
            output.volume = self.emit_volume(&active, ctx);
        }

        self.state_timer = self.state_timer.saturating_sub(1);
        if self.state_timer == 0 {
            self.state = CombatState::Idle;
            self.active_move = None;
        }
    }

    /// Startup finished: pay, arm, and apply non-damaging effects.
    fn complete_startup(&mut self, active: &ActiveMove, ctx: &SimContext, output: &mut AdvanceOutput) {
        let definition = &active.definition;
        if definition.cooldown_arming == CooldownArming::OnStartup {
            self.arm_cooldown(definition, ctx);
        }
        if definition.spends_resource() {
            self.spend_resource(definition.cost);
        }
        output.events.push(SimEvent::MoveStarted {
            combatant: self.id,
            move_id: definition.id.clone(),
        });

        match definition.kind {
            MoveKind::Damaging { lunge, .. } => {
                if let Some(lunge) = lunge {
                    self.velocity += self.heading.scale(lunge);
                }
            }
            MoveKind::Healing { area_radius, .. } => match area_radius {
                Some(radius) => {
                    output.area_heal = Some(AreaHeal {
                        caster: self.id,
                        team: self.team,
                        center: self.position,
                        radius,
                        amount: active.heal,
                    });
                }
                None => {
                    let healed = self.heal(active.heal);
                    output.events.push(SimEvent::HealUsed {
                        combatant: self.id,
                        amount: healed,
                    });
                }
            },
            MoveKind::Buff { .. } => {
                if let Some(buff) = active.buff {
                    self.apply_buff(buff);
                }
            }
        }
    }

    fn arm_cooldown(&mut self, definition: &MoveDefinition, ctx: &SimContext) {
        if let Some(seconds) = definition.cooldown_seconds(ctx.config.support_cooldown()) {
            self.cooldowns.arm(&definition.id, seconds);
        }
    }

    fn emit_volume(&mut self, active: &ActiveMove, ctx: &SimContext) -> Option<AttackVolume> {
        let definition = &active.definition;
        let MoveKind::Damaging {
            stun,
            hit_stop,
            radius,
            shape,
            knockback,
            hits,
            ..
        } = definition.kind
        else {
            return None;
        };

        // Multi-hit moves re-arm every ceil(active / hits) frames
        if let Some(hits) = hits.filter(|h| *h > 1) {
            let interval = active.timing.active.div_ceil(hits).max(1);
            let offset = active.frame - active.timing.startup - 1;
            if offset > 0 && offset % interval == 0 {
                self.struck.clear();
            }
        }

        let two = Fixed::from_num(2);
        let center = if active.reach == Fixed::ZERO {
            self.position
        } else {
            let offset = self.stats.body_radius + active.reach / two;
            self.position + self.heading.scale(offset)
        };
        let shape = match shape {
            HitShape::Circle => Shape::Circle { center, radius },
            HitShape::Rect { width, height } => Shape::Rect {
                center,
                half_extents: Vec2Fixed::new(width / two, height / two),
                heading: self.heading,
            },
        };

        Some(AttackVolume {
            owner: self.id,
            team: self.team,
            move_id: definition.id.clone(),
            damage_type: definition.damage_type,
            shape,
            damage: active.damage,
            stun,
            hit_stop,
            knockback: self
                .heading
                .scale(ctx.config.knockback_base.saturating_mul(knockback)),
        })
    }

    fn integrate(&mut self, dt: Fixed, ctx: &SimContext) {
        let epsilon = ctx.config.velocity_epsilon;
        let mut velocity = self.velocity.scale(self.stats.friction);
        if velocity.x.abs() < epsilon {
            velocity.x = Fixed::ZERO;
        }
        if velocity.y.abs() < epsilon {
            velocity.y = Fixed::ZERO;
        }
        if self.state != CombatState::Dashing {
            velocity = velocity.clamp_length(self.stats.move_speed.max(Fixed::ZERO));
        }
        self.velocity = velocity;

        self.position = ctx
            .arena
            .clamp_inset(self.position + velocity.scale(dt), self.stats.body_radius);

        if self.state == CombatState::Moving && self.velocity == Vec2Fixed::ZERO {
            self.state = CombatState::Idle;
        }
    }
}

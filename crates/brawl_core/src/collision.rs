//! Hitbox/hurtbox geometry and hit resolution.
//!
//! Attack volumes live for one tick. The resolver tests every volume
//! against every eligible hurt volume, applies each hit at most once per
//! (activation, defender) pair via the attacker's struck set, and then
//! drops the volumes. The only cross-tick state it touches is that struck
//! set, which belongs to the attacker.

use tracing::{debug, info};

use crate::combatant::{Combatant, CombatantId, TeamId};
use crate::math::{Fixed, Vec2Fixed};
use crate::moves::{DamageType, MoveId};
use crate::simulation::{SimContext, SimEvent};

/// World-space collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Circle.
    Circle {
        /// Center.
        center: Vec2Fixed,
        /// Radius.
        radius: Fixed,
    },
    /// Oriented rectangle.
    Rect {
        /// Center.
        center: Vec2Fixed,
        /// Half width (along `heading`) and half height (across it).
        half_extents: Vec2Fixed,
        /// Unit vector of the rectangle's local +X axis.
        heading: Vec2Fixed,
    },
}

impl Shape {
    /// Center of the shape.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        match *self {
            Shape::Circle { center, .. } | Shape::Rect { center, .. } => center,
        }
    }
}

/// Test two shapes for overlap. Touching counts as overlapping.
#[must_use]
pub fn overlaps(a: &Shape, b: &Shape) -> bool {
    match (*a, *b) {
        (
            Shape::Circle {
                center: ca,
                radius: ra,
            },
            Shape::Circle {
                center: cb,
                radius: rb,
            },
        ) => circle_circle(ca, ra, cb, rb),
        (
            Shape::Rect {
                center,
                half_extents,
                heading,
            },
            Shape::Circle {
                center: circle,
                radius,
            },
        )
        | (
            Shape::Circle {
                center: circle,
                radius,
            },
            Shape::Rect {
                center,
                half_extents,
                heading,
            },
        ) => rect_circle(center, half_extents, heading, circle, radius),
        (
            Shape::Rect {
                center: ca,
                half_extents: ha,
                heading: da,
            },
            Shape::Rect {
                center: cb,
                half_extents: hb,
                heading: db,
            },
        ) => rect_rect(ca, ha, da, cb, hb, db),
    }
}

fn circle_circle(ca: Vec2Fixed, ra: Fixed, cb: Vec2Fixed, rb: Fixed) -> bool {
    let reach = ra.saturating_add(rb);
    ca.distance_squared(cb) <= reach.saturating_mul(reach)
}

fn rect_circle(
    center: Vec2Fixed,
    half: Vec2Fixed,
    heading: Vec2Fixed,
    circle: Vec2Fixed,
    radius: Fixed,
) -> bool {
    let local = (circle - center).to_local(heading);
    let closest = Vec2Fixed::new(
        local.x.clamp(-half.x, half.x),
        local.y.clamp(-half.y, half.y),
    );
    (local - closest).length_squared() <= radius.saturating_mul(radius)
}

/// Separating-axis test on the four face normals.
fn rect_rect(
    ca: Vec2Fixed,
    ha: Vec2Fixed,
    da: Vec2Fixed,
    cb: Vec2Fixed,
    hb: Vec2Fixed,
    db: Vec2Fixed,
) -> bool {
    let offset = cb - ca;
    let projected_radius = |half: Vec2Fixed, dir: Vec2Fixed, axis: Vec2Fixed| {
        (half.x * dir.dot(axis)).abs() + (half.y * dir.perp().dot(axis)).abs()
    };
    [da, da.perp(), db, db.perp()].into_iter().all(|axis| {
        let distance = offset.dot(axis).abs();
        distance <= projected_radius(ha, da, axis) + projected_radius(hb, db, axis)
    })
}

/// One tick of an attack's hitbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackVolume {
    /// Attacker.
    pub owner: CombatantId,
    /// Attacker's team.
    pub team: TeamId,
    /// Move that produced the volume.
    pub move_id: MoveId,
    /// Which defense applies.
    pub damage_type: DamageType,
    /// World-space hitbox.
    pub shape: Shape,
    /// Damage before the defender's mitigation.
    pub damage: Fixed,
    /// Hitstun in ticks.
    pub stun: u32,
    /// Global freeze requested on hit.
    pub hit_stop: u32,
    /// Full knockback vector; only a fraction reaches the defender.
    pub knockback: Vec2Fixed,
}

/// Resolve all volumes emitted this tick against the roster.
///
/// Returns `Hit` and `KnockedOut` events in volume order, then defender
/// roster order.
pub fn resolve(
    volumes: &[AttackVolume],
    roster: &mut [Combatant],
    ctx: &mut SimContext,
) -> Vec<SimEvent> {
    let mut events = Vec::new();

    for volume in volumes {
        let Some(owner_idx) = roster.iter().position(|c| c.id == volume.owner) else {
            continue;
        };

        for defender_idx in 0..roster.len() {
            let defender = &roster[defender_idx];
            if defender.id == volume.owner
                || defender.team == volume.team
                || !defender.is_alive()
                || roster[owner_idx].struck.contains(&defender.id)
                || !overlaps(&volume.shape, &defender.hurt_volume())
            {
                continue;
            }

            let defender_id = defender.id;
            roster[owner_idx].struck.insert(defender_id);

            let knockback = volume.knockback.scale(ctx.config.knockback_transfer);
            let outcome = roster[defender_idx].receive_hit(
                volume.damage_type,
                volume.damage,
                volume.stun,
                knockback,
            );
            ctx.trigger_hit_stop(volume.hit_stop);

            debug!(
                attacker = volume.owner,
                defender = defender_id,
                move_id = %volume.move_id,
                damage = %outcome.damage,
                "Hit landed"
            );
            events.push(SimEvent::Hit {
                attacker: volume.owner,
                defender: defender_id,
                move_id: volume.move_id.clone(),
                damage: outcome.damage,
            });

            if outcome.knocked_out {
                info!(winner = volume.owner, loser = defender_id, "Combatant knocked out");
                events.push(SimEvent::KnockedOut {
                    winner: volume.owner,
                    loser: defender_id,
                });
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(x: i32, y: i32, r: i32) -> Shape {
        Shape::Circle {
            center: Vec2Fixed::from_ints(x, y),
            radius: Fixed::from_num(r),
        }
    }

    fn rect(x: i32, y: i32, w: i32, h: i32, heading: Vec2Fixed) -> Shape {
        Shape::Rect {
            center: Vec2Fixed::from_ints(x, y),
            half_extents: Vec2Fixed::new(
                Fixed::from_num(w) / Fixed::from_num(2),
                Fixed::from_num(h) / Fixed::from_num(2),
            ),
            heading,
        }
    }

    #[test]
    fn test_circle_circle_touching() {
        assert!(overlaps(&circle(0, 0, 10), &circle(20, 0, 10)));
        assert!(!overlaps(&circle(0, 0, 10), &circle(21, 0, 10)));
    }

    #[test]
    fn test_rect_circle_axis_aligned() {
        let r = rect(0, 0, 80, 50, Vec2Fixed::UNIT_X);
        // Circle just beyond the right face
        assert!(overlaps(&r, &circle(50, 0, 10)));
        assert!(!overlaps(&r, &circle(51, 0, 10)));
        // Center inside the rectangle
        assert!(overlaps(&r, &circle(5, 5, 1)));
    }

    #[test]
    fn test_rect_circle_rotated() {
        // Long thin rect pointing along +Y
        let r = rect(0, 0, 120, 30, Vec2Fixed::new(Fixed::ZERO, Fixed::ONE));
        assert!(overlaps(&r, &circle(0, 65, 10)));
        assert!(!overlaps(&r, &circle(40, 0, 10)));
    }

    #[test]
    fn test_rect_circle_argument_order() {
        let r = rect(0, 0, 40, 40, Vec2Fixed::UNIT_X);
        let c = circle(25, 25, 8);
        assert_eq!(overlaps(&r, &c), overlaps(&c, &r));
    }

    #[test]
    fn test_rect_rect() {
        let a = rect(0, 0, 20, 20, Vec2Fixed::UNIT_X);
        assert!(overlaps(&a, &rect(15, 0, 20, 20, Vec2Fixed::UNIT_X)));
        assert!(!overlaps(&a, &rect(30, 30, 20, 20, Vec2Fixed::UNIT_X)));
    }
}

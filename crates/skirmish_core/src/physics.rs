//! Physics collaborator boundary.
//!
//! The simulation core treats rigid-body motion as an external service:
//! it adds and removes bodies, toggles them, steps the world, and asks
//! for ray casts and overlap queries. [`Physics`] is that boundary;
//! [`CirclePhysics`] is a deterministic fixed-point implementation with
//! circular bodies, linear damping, sensors and pairwise separation.
//!
//! Disabled bodies are neither integrated nor returned by any query.
//! This is how garrisoned and hangared units drop out of the field
//! without leaving the Entity World.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::entity::EntityId;
use crate::math::{fixed_sqrt, Fixed, Vec2Fixed};

/// Which of an entity's bodies a [`BodyId`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BodySlot {
    /// The entity's own collision body.
    Main,
    /// A shield sensor owned by the entity.
    Sensor,
}

/// Identifier of a physics body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId {
    /// Owning entity.
    pub entity: EntityId,
    /// Which body of the entity.
    pub slot: BodySlot,
}

impl BodyId {
    /// The main body of an entity.
    #[must_use]
    pub const fn main(entity: EntityId) -> Self {
        Self {
            entity,
            slot: BodySlot::Main,
        }
    }

    /// The shield sensor of an entity.
    #[must_use]
    pub const fn sensor(entity: EntityId) -> Self {
        Self {
            entity,
            slot: BodySlot::Sensor,
        }
    }
}

/// How a body participates in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Collides with other solids on its layer; blocks rays.
    Solid,
    /// Never collides; intercepts rays that start outside it.
    Sensor,
    /// Never collides and never intercepts rays; just moves.
    Projectile,
}

/// Everything needed to create a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyDesc {
    /// Initial position.
    pub position: Vec2Fixed,
    /// Initial velocity (units per second).
    pub velocity: Vec2Fixed,
    /// Circle radius; must be positive.
    pub radius: Fixed,
    /// Participation kind.
    pub kind: BodyKind,
    /// Static bodies never move and are never pushed.
    pub is_static: bool,
    /// Fraction of velocity lost per second; must be non-negative.
    pub linear_damping: Fixed,
    /// Collision layer; solids only collide within the same layer.
    pub layer: u8,
    /// Whether the body starts enabled.
    pub enabled: bool,
}

impl BodyDesc {
    /// A dynamic solid body.
    #[must_use]
    pub fn solid(position: Vec2Fixed, radius: Fixed, layer: u8) -> Self {
        Self {
            position,
            velocity: Vec2Fixed::ZERO,
            radius,
            kind: BodyKind::Solid,
            is_static: false,
            linear_damping: Fixed::ZERO,
            layer,
            enabled: true,
        }
    }

    /// Make the body static.
    #[must_use]
    pub fn fixed_in_place(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// A static sensor, initially disabled.
    #[must_use]
    pub fn sensor(position: Vec2Fixed, radius: Fixed) -> Self {
        Self {
            kind: BodyKind::Sensor,
            is_static: true,
            enabled: false,
            ..Self::solid(position, radius, 0)
        }
    }

    /// A moving projectile body.
    #[must_use]
    pub fn projectile(position: Vec2Fixed, velocity: Vec2Fixed, radius: Fixed, damping: Fixed) -> Self {
        Self {
            velocity,
            kind: BodyKind::Projectile,
            linear_damping: damping,
            ..Self::solid(position, radius, 0)
        }
    }
}

/// Result of a ray cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayHit {
    /// Body struck.
    pub body: BodyId,
    /// Point of entry.
    pub point: Vec2Fixed,
    /// Distance from the ray origin.
    pub distance: Fixed,
}

/// Faults reported by the physics collaborator.
///
/// These indicate bugs or broken configuration and are never absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// The body description is unusable.
    #[error("malformed body {body:?}: {reason}")]
    MalformedBody {
        /// Offending body.
        body: BodyId,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// A body with that id already exists.
    #[error("body {0:?} already exists")]
    DuplicateBody(BodyId),
}

/// Rigid-body service consumed by the Entity World.
///
/// Must be mutated only by the owning match's loop.
pub trait Physics: Send + std::fmt::Debug {
    /// Add a body.
    fn add_body(&mut self, id: BodyId, desc: BodyDesc) -> Result<(), PhysicsError>;

    /// Remove a body; returns whether it existed.
    fn remove_body(&mut self, id: BodyId) -> bool;

    /// Whether a body exists.
    fn contains(&self, id: BodyId) -> bool;

    /// Enable or disable a body.
    fn set_enabled(&mut self, id: BodyId, enabled: bool);

    /// Whether a body exists and is enabled.
    fn is_enabled(&self, id: BodyId) -> bool;

    /// Teleport a body.
    fn set_position(&mut self, id: BodyId, position: Vec2Fixed);

    /// Current position.
    fn position(&self, id: BodyId) -> Option<Vec2Fixed>;

    /// Set velocity in units per second.
    fn set_velocity(&mut self, id: BodyId, velocity: Vec2Fixed);

    /// Current velocity.
    fn velocity(&self, id: BodyId) -> Option<Vec2Fixed>;

    /// Body radius.
    fn radius(&self, id: BodyId) -> Option<Fixed>;

    /// Advance the world by `dt` seconds.
    fn step(&mut self, dt: Fixed);

    /// First solid or sensor body entered by a ray, within `max_distance`.
    ///
    /// `direction` must be normalized. Bodies containing the origin are
    /// not hit.
    fn ray_cast(
        &self,
        origin: Vec2Fixed,
        direction: Vec2Fixed,
        max_distance: Fixed,
        filter: &dyn Fn(BodyId) -> bool,
    ) -> Option<RayHit>;

    /// Whether no enabled solid body on `layer` overlaps the circle.
    fn is_area_free(&self, center: Vec2Fixed, radius: Fixed, layer: u8) -> bool;

    /// Enabled bodies overlapping a circle, in id order.
    fn overlapping(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        filter: &dyn Fn(BodyId) -> bool,
    ) -> Vec<BodyId>;
}

#[derive(Debug, Clone)]
struct Body {
    position: Vec2Fixed,
    velocity: Vec2Fixed,
    radius: Fixed,
    kind: BodyKind,
    is_static: bool,
    linear_damping: Fixed,
    layer: u8,
    enabled: bool,
}

/// Deterministic circle-body physics.
///
/// Bodies are stored in a `BTreeMap` so stepping and queries always run in
/// body-id order.
#[derive(Debug, Clone, Default)]
pub struct CirclePhysics {
    bodies: BTreeMap<BodyId, Body>,
}

impl CirclePhysics {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies (enabled or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the world has no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn separate_solids(&mut self) {
        let ids: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.enabled && b.kind == BodyKind::Solid)
            .map(|(id, _)| *id)
            .collect();

        for (i, a_id) in ids.iter().enumerate() {
            for b_id in &ids[i + 1..] {
                let (Some(a), Some(b)) = (self.bodies.get(a_id), self.bodies.get(b_id)) else {
                    continue;
                };
                if a.layer != b.layer || (a.is_static && b.is_static) {
                    continue;
                }

                let min_dist = a.radius + b.radius;
                let dist_sq = a.position.distance_squared(b.position);
                if dist_sq >= min_dist.saturating_mul(min_dist) {
                    continue;
                }

                let dist = fixed_sqrt(dist_sq);
                let normal = a.position.direction_to(b.position, Vec2Fixed::UNIT_X);
                let overlap = min_dist - dist;

                let (push_a, push_b) = match (a.is_static, b.is_static) {
                    (true, false) => (Fixed::ZERO, overlap),
                    (false, true) => (overlap, Fixed::ZERO),
                    _ => (overlap / 2, overlap / 2),
                };

                if let Some(a) = self.bodies.get_mut(a_id) {
                    a.position = a.position - normal.scale(push_a);
                }
                if let Some(b) = self.bodies.get_mut(b_id) {
                    b.position = b.position + normal.scale(push_b);
                }
            }
        }
    }
}

impl Physics for CirclePhysics {
    fn add_body(&mut self, id: BodyId, desc: BodyDesc) -> Result<(), PhysicsError> {
        if desc.radius <= Fixed::ZERO {
            return Err(PhysicsError::MalformedBody {
                body: id,
                reason: "radius must be positive",
            });
        }
        if desc.linear_damping < Fixed::ZERO {
            return Err(PhysicsError::MalformedBody {
                body: id,
                reason: "linear damping must be non-negative",
            });
        }
        if self.bodies.contains_key(&id) {
            return Err(PhysicsError::DuplicateBody(id));
        }

        self.bodies.insert(
            id,
            Body {
                position: desc.position,
                velocity: desc.velocity,
                radius: desc.radius,
                kind: desc.kind,
                is_static: desc.is_static,
                linear_damping: desc.linear_damping,
                layer: desc.layer,
                enabled: desc.enabled,
            },
        );
        Ok(())
    }

    fn remove_body(&mut self, id: BodyId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    fn set_enabled(&mut self, id: BodyId, enabled: bool) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.enabled = enabled;
            if !enabled {
                body.velocity = Vec2Fixed::ZERO;
            }
        }
    }

    fn is_enabled(&self, id: BodyId) -> bool {
        self.bodies.get(&id).is_some_and(|b| b.enabled)
    }

    fn set_position(&mut self, id: BodyId, position: Vec2Fixed) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.position = position;
        }
    }

    fn position(&self, id: BodyId) -> Option<Vec2Fixed> {
        self.bodies.get(&id).map(|b| b.position)
    }

    fn set_velocity(&mut self, id: BodyId, velocity: Vec2Fixed) {
        if let Some(body) = self.bodies.get_mut(&id) {
            if !body.is_static {
                body.velocity = velocity;
            }
        }
    }

    fn velocity(&self, id: BodyId) -> Option<Vec2Fixed> {
        self.bodies.get(&id).map(|b| b.velocity)
    }

    fn radius(&self, id: BodyId) -> Option<Fixed> {
        self.bodies.get(&id).map(|b| b.radius)
    }

    fn step(&mut self, dt: Fixed) {
        if dt <= Fixed::ZERO {
            return;
        }

        for body in self.bodies.values_mut() {
            if !body.enabled || body.is_static {
                continue;
            }
            body.position = body.position + body.velocity.scale(dt);
            if body.linear_damping > Fixed::ZERO {
                let keep = (Fixed::ONE - body.linear_damping * dt).max(Fixed::ZERO);
                body.velocity = body.velocity.scale(keep);
            }
        }

        self.separate_solids();
    }

    fn ray_cast(
        &self,
        origin: Vec2Fixed,
        direction: Vec2Fixed,
        max_distance: Fixed,
        filter: &dyn Fn(BodyId) -> bool,
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;

        for (id, body) in &self.bodies {
            if !body.enabled || body.kind == BodyKind::Projectile || !filter(*id) {
                continue;
            }

            let oc = origin - body.position;
            let c = oc.dot(oc) - body.radius * body.radius;
            if c <= Fixed::ZERO {
                // Origin inside the circle.
                continue;
            }
            let b = oc.dot(direction);
            if b > Fixed::ZERO {
                continue;
            }
            let disc = b * b - c;
            if disc < Fixed::ZERO {
                continue;
            }

            let t = (-b - fixed_sqrt(disc)).max(Fixed::ZERO);
            if t > max_distance {
                continue;
            }
            if best.map_or(true, |hit| t < hit.distance) {
                best = Some(RayHit {
                    body: *id,
                    point: origin + direction.scale(t),
                    distance: t,
                });
            }
        }

        best
    }

    fn is_area_free(&self, center: Vec2Fixed, radius: Fixed, layer: u8) -> bool {
        !self.bodies.values().any(|body| {
            body.enabled
                && body.kind == BodyKind::Solid
                && body.layer == layer
                && {
                    let min_dist = body.radius + radius;
                    body.position.distance_squared(center) < min_dist.saturating_mul(min_dist)
                }
        })
    }

    fn overlapping(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        filter: &dyn Fn(BodyId) -> bool,
    ) -> Vec<BodyId> {
        self.bodies
            .iter()
            .filter(|(id, body)| {
                let min_dist = body.radius + radius;
                body.enabled
                    && body.position.distance_squared(center) <= min_dist.saturating_mul(min_dist)
                    && filter(**id)
            })
            .map(|(id, _)| *id)
            .collect()
    }
}

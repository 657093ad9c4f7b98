//! Defensive weapon mounted on a building.
//!
//! The turret carries its own [`Weapon`] separate from the building, keeps
//! its target while it stays legal, and goes quiet while the building is
//! under construction or its owner is short on power.

use super::{Behavior, ModuleCtx};
use crate::combat::{engage, Shooter};
use crate::entity::EntityId;
use crate::modifier::ResearchModifier;
use crate::weapon::Weapon;

/// A building-mounted weapon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurretModule {
    weapon: Weapon,
    target: Option<EntityId>,
    modifier: ResearchModifier,
}

impl TurretModule {
    /// Mount a weapon.
    #[must_use]
    pub fn new(weapon: Weapon) -> Self {
        Self {
            weapon,
            target: None,
            modifier: ResearchModifier::IDENTITY,
        }
    }

    /// The mounted weapon.
    #[must_use]
    pub fn weapon(&self) -> &Weapon {
        &self.weapon
    }

    /// Current target.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }
}

impl Behavior for TurretModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if ctx.low_power || !ctx.host_operational() {
            self.target = None;
            return;
        }
        let Some(shooter) = Shooter::from_entity(ctx.world, ctx.host) else {
            return;
        };
        match engage(ctx.world, &mut self.weapon, &self.modifier, &shooter, self.target, ctx.now_ms) {
            Ok((target, _)) => {
                self.target = target;
                let aim = target.and_then(|t| ctx.world.core(t)).map(|c| c.position);
                if let (Some(point), Some(core)) = (aim, ctx.world.core_mut(ctx.host)) {
                    core.face(point);
                }
            }
            Err(error) => ctx.fail(error),
        }
    }

    fn apply_research_modifiers(&mut self, modifier: &ResearchModifier) {
        self.modifier = modifier.clone();
    }
}

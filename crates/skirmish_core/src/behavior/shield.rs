//! Shield generator.
//!
//! A sensor body around the building intercepts hostile beams and
//! projectiles that originate outside it. The sensor is up only while the
//! building is complete and its owner has enough power.

use tracing::debug;

use super::{Behavior, ModuleCtx};
use crate::error::Result;
use crate::math::Fixed;

/// Shield sensor of one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldModule {
    radius: Fixed,
    raised: bool,
}

impl ShieldModule {
    /// Create a lowered shield.
    #[must_use]
    pub fn new(radius: Fixed) -> Self {
        Self {
            radius,
            raised: false,
        }
    }

    /// Sensor radius.
    #[must_use]
    pub fn radius(&self) -> Fixed {
        self.radius
    }

    /// Whether the shield is currently up.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised
    }
}

impl Behavior for ShieldModule {
    fn init(&mut self, ctx: &mut ModuleCtx<'_>) -> Result<()> {
        ctx.world.add_shield_sensor(ctx.host, self.radius)
    }

    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        let raised = !ctx.low_power && ctx.host_operational();
        if raised != self.raised {
            self.raised = raised;
            ctx.world.set_shield_enabled(ctx.host, raised);
            debug!(building = %ctx.host, raised, "Shield toggled");
        }
    }

    fn on_destroy(&mut self, ctx: &mut ModuleCtx<'_>) {
        self.raised = false;
        ctx.world.set_shield_enabled(ctx.host, false);
    }
}

//! Passive area healing.

use super::{Behavior, ModuleCtx};
use crate::math::{ms_to_seconds, Fixed};

/// Heals friendly units around the host every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuraModule {
    radius: Fixed,
    heal_per_second: Fixed,
}

impl AuraModule {
    /// Create an aura.
    #[must_use]
    pub fn new(radius: Fixed, heal_per_second: Fixed) -> Self {
        Self {
            radius,
            heal_per_second,
        }
    }

    /// Reach measured center to center.
    #[must_use]
    pub fn radius(&self) -> Fixed {
        self.radius
    }
}

impl Behavior for AuraModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if !ctx.host_operational() {
            return;
        }
        if ctx.host_unit().is_some_and(|u| !u.is_on_field()) {
            return;
        }
        let Some((center, team)) = ctx.host_core().map(|c| (c.position, c.team)) else {
            return;
        };
        let amount = self.heal_per_second.saturating_mul(ms_to_seconds(ctx.dt_ms));
        let host = ctx.host;
        let radius_sq = self.radius.saturating_mul(self.radius);

        let patients: Vec<_> = ctx
            .world
            .units()
            .filter(|u| u.core.id != host && u.is_on_field() && u.core.team == team)
            .filter(|u| !u.core.health.is_full())
            .filter(|u| u.core.position.distance_squared(center) <= radius_sq)
            .map(|u| u.core.id)
            .collect();
        for patient in patients {
            ctx.world.heal(patient, amount);
        }
    }
}

//! Healing and repair.
//!
//! Medics heal friendly infantry; engineers repair friendly buildings,
//! vehicles and aircraft. Either works one target at a time, walks into
//! range, and stops once the target is at full health or gone.

use tracing::debug;

use super::{cooldown_ready, gap_between, halt_host, move_host_to, Behavior, ModuleCtx};
use crate::entity::EntityId;
use crate::math::Fixed;
use crate::roles::UnitRole;

/// What a support module restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportKind {
    /// Living tissue: infantry.
    Heal,
    /// Machinery: buildings, vehicles and aircraft.
    Repair,
}

/// Heal or repair ability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportModule {
    kind: SupportKind,
    amount: Fixed,
    cooldown_ms: u64,
    range: Fixed,
    target: Option<EntityId>,
    last_cycle_ms: Option<u64>,
}

impl SupportModule {
    /// Create an idle support ability.
    #[must_use]
    pub fn new(kind: SupportKind, amount: Fixed, cooldown_ms: u64, range: Fixed) -> Self {
        Self {
            kind,
            amount,
            cooldown_ms,
            range,
            target: None,
            last_cycle_ms: None,
        }
    }

    /// Heal or repair.
    #[must_use]
    pub fn kind(&self) -> SupportKind {
        self.kind
    }

    /// Entity being worked on.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Whether `target` is something this ability may work on now.
    fn eligible(&self, ctx: &ModuleCtx<'_>, target: EntityId) -> bool {
        if target == ctx.host {
            return false;
        }
        let Some(me) = ctx.host_core() else {
            return false;
        };
        let kind_ok = match (self.kind, ctx.world.unit(target), ctx.world.building(target)) {
            (SupportKind::Heal, Some(unit), _) => {
                unit.is_on_field() && unit.roles.contains(UnitRole::INFANTRY)
            }
            (SupportKind::Repair, Some(unit), _) => {
                unit.is_on_field() && unit.roles.intersects(UnitRole::MECHANICAL)
            }
            (SupportKind::Repair, None, Some(building)) => !building.is_deposit(),
            _ => false,
        };
        let Some(core) = ctx.world.core(target) else {
            return false;
        };
        kind_ok && core.active && core.team == me.team && !core.health.is_full()
    }

    /// Start working on a target.
    pub fn assign(&mut self, ctx: &mut ModuleCtx<'_>, target: EntityId) -> bool {
        if !self.eligible(ctx, target) {
            return false;
        }
        self.target = Some(target);
        debug!(unit = %ctx.host, target = %target, kind = ?self.kind, "Support assigned");
        true
    }
}

impl Behavior for SupportModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        let Some(target) = self.target else {
            return;
        };
        if ctx.host_unit().map_or(true, |u| !u.is_on_field()) {
            return;
        }
        if !self.eligible(ctx, target) {
            self.target = None;
            return;
        }

        let in_reach = gap_between(ctx.world, ctx.host, target).is_some_and(|gap| gap <= self.range);
        if !in_reach {
            if let Some(point) = ctx.world.core(target).map(|c| c.position) {
                move_host_to(ctx, point);
            }
            return;
        }
        halt_host(ctx);
        if !cooldown_ready(self.last_cycle_ms, self.cooldown_ms, ctx.now_ms) {
            return;
        }

        ctx.world.heal(target, self.amount);
        self.last_cycle_ms = Some(ctx.now_ms);
        if ctx.world.core(target).map_or(true, |c| c.health.is_full()) {
            self.target = None;
        }
    }
}

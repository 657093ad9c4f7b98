//! Resource gathering.
//!
//! Two flavors work a neutral deposit:
//! - [`HarvestModule`] fills a cargo hold and hauls it to the nearest
//!   friendly depot, round trip after round trip
//! - [`MineModule`] strips the deposit in place, crediting the owner
//!   directly, and destroys it once the reserve is gone
//!
//! Both are cooldown-gated and range-checked against their one deposit,
//! and walk toward it when out of reach.

use tracing::debug;

use super::{cooldown_ready, gap_between, halt_host, move_host_to, Behavior, ModuleCtx};
use crate::entity::EntityId;
use crate::math::Fixed;
use crate::modifier::ResearchModifier;

/// Validate a deposit and return its remaining reserve.
fn deposit_reserve(ctx: &ModuleCtx<'_>, deposit: EntityId) -> Option<u32> {
    let building = ctx.world.building(deposit)?;
    if !building.core.active {
        return None;
    }
    building.reserve.filter(|r| *r > 0)
}

/// Take up to `amount` from a deposit; returns what was taken.
fn draw(ctx: &mut ModuleCtx<'_>, deposit: EntityId, amount: u32) -> u32 {
    let Some(building) = ctx.world.building_mut(deposit) else {
        return 0;
    };
    let Some(reserve) = building.reserve.as_mut() else {
        return 0;
    };
    let taken = amount.min(*reserve);
    *reserve -= taken;
    taken
}

fn scaled(amount: u32, rate: Fixed) -> u32 {
    Fixed::saturating_from_num(amount)
        .saturating_mul(rate)
        .floor()
        .saturating_to_num::<u32>()
}

// ========================================
// Harvest
// ========================================

/// Round-trip hauler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestModule {
    capacity: u32,
    amount_per_cycle: u32,
    cooldown_ms: u64,
    range: Fixed,
    cargo: u32,
    bonus: u32,
    rate: Fixed,
    deposit: Option<EntityId>,
    last_cycle_ms: Option<u64>,
}

impl HarvestModule {
    /// Create an empty hauler.
    #[must_use]
    pub fn new(capacity: u32, amount_per_cycle: u32, cooldown_ms: u64, range: Fixed) -> Self {
        Self {
            capacity,
            amount_per_cycle,
            cooldown_ms,
            range,
            cargo: 0,
            bonus: 0,
            rate: Fixed::ONE,
            deposit: None,
            last_cycle_ms: None,
        }
    }

    /// Resources on board.
    #[must_use]
    pub fn cargo(&self) -> u32 {
        self.cargo
    }

    /// Hold size including research bonuses.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity.saturating_add(self.bonus)
    }

    /// Deposit being worked.
    #[must_use]
    pub fn deposit(&self) -> Option<EntityId> {
        self.deposit
    }

    /// Start working a deposit.
    pub fn assign(&mut self, ctx: &mut ModuleCtx<'_>, deposit: EntityId) -> bool {
        if deposit_reserve(ctx, deposit).is_none() {
            return false;
        }
        self.deposit = Some(deposit);
        debug!(unit = %ctx.host, deposit = %deposit, "Harvest assigned");
        true
    }

    fn is_full(&self) -> bool {
        self.cargo >= self.capacity()
    }

    /// Nearest completed friendly depot.
    fn nearest_depot(ctx: &ModuleCtx<'_>) -> Option<EntityId> {
        let me = ctx.host_core()?;
        ctx.world
            .buildings()
            .filter(|b| b.is_operational() && b.core.team == me.team && b.has_tag("depot"))
            .min_by_key(|b| b.core.position.distance_squared(me.position))
            .map(|b| b.core.id)
    }

    fn deliver(&mut self, ctx: &mut ModuleCtx<'_>) {
        let Some(depot) = Self::nearest_depot(ctx) else {
            halt_host(ctx);
            return;
        };
        let in_reach = gap_between(ctx.world, ctx.host, depot).is_some_and(|gap| gap <= self.range);
        if !in_reach {
            if let Some(point) = ctx.world.core(depot).map(|c| c.position) {
                move_host_to(ctx, point);
            }
            return;
        }

        halt_host(ctx);
        let Some(owner) = ctx.host_core().map(|c| c.owner) else {
            return;
        };
        let delivered = std::mem::take(&mut self.cargo);
        if let Some(player) = ctx.player_mut(owner) {
            player.deposit(delivered);
        }
        debug!(unit = %ctx.host, depot = %depot, delivered, "Cargo delivered");
    }
}

impl Behavior for HarvestModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if ctx.host_unit().map_or(true, |u| !u.is_on_field()) {
            return;
        }
        let deposit = self.deposit.filter(|d| deposit_reserve(ctx, *d).is_some());
        if deposit.is_none() {
            self.deposit = None;
        }

        if self.is_full() || (deposit.is_none() && self.cargo > 0) {
            self.deliver(ctx);
            return;
        }
        let Some(deposit) = deposit else {
            return;
        };

        let in_reach = gap_between(ctx.world, ctx.host, deposit).is_some_and(|gap| gap <= self.range);
        if !in_reach {
            if let Some(point) = ctx.world.core(deposit).map(|c| c.position) {
                move_host_to(ctx, point);
            }
            return;
        }
        halt_host(ctx);
        if !cooldown_ready(self.last_cycle_ms, self.cooldown_ms, ctx.now_ms) {
            return;
        }

        let space = self.capacity().saturating_sub(self.cargo);
        let want = scaled(self.amount_per_cycle, self.rate).min(space);
        let taken = draw(ctx, deposit, want);
        self.cargo += taken;
        self.last_cycle_ms = Some(ctx.now_ms);
    }

    fn apply_research_modifiers(&mut self, modifier: &ResearchModifier) {
        self.bonus = modifier.worker_capacity;
        self.rate = modifier.harvest_rate;
    }
}

// ========================================
// Mine
// ========================================

/// In-place deposit stripper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MineModule {
    yield_per_cycle: u32,
    cooldown_ms: u64,
    range: Fixed,
    rate: Fixed,
    deposit: Option<EntityId>,
    last_cycle_ms: Option<u64>,
}

impl MineModule {
    /// Create an idle miner.
    #[must_use]
    pub fn new(yield_per_cycle: u32, cooldown_ms: u64, range: Fixed) -> Self {
        Self {
            yield_per_cycle,
            cooldown_ms,
            range,
            rate: Fixed::ONE,
            deposit: None,
            last_cycle_ms: None,
        }
    }

    /// Deposit being worked.
    #[must_use]
    pub fn deposit(&self) -> Option<EntityId> {
        self.deposit
    }

    /// Start working a deposit.
    pub fn assign(&mut self, ctx: &mut ModuleCtx<'_>, deposit: EntityId) -> bool {
        if deposit_reserve(ctx, deposit).is_none() {
            return false;
        }
        self.deposit = Some(deposit);
        debug!(unit = %ctx.host, deposit = %deposit, "Mining assigned");
        true
    }
}

impl Behavior for MineModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        let Some(deposit) = self.deposit else {
            return;
        };
        if ctx.host_unit().map_or(true, |u| !u.is_on_field()) {
            return;
        }
        if deposit_reserve(ctx, deposit).is_none() {
            self.deposit = None;
            return;
        }

        let in_reach = gap_between(ctx.world, ctx.host, deposit).is_some_and(|gap| gap <= self.range);
        if !in_reach {
            if let Some(point) = ctx.world.core(deposit).map(|c| c.position) {
                move_host_to(ctx, point);
            }
            return;
        }
        halt_host(ctx);
        if !cooldown_ready(self.last_cycle_ms, self.cooldown_ms, ctx.now_ms) {
            return;
        }

        let taken = draw(ctx, deposit, scaled(self.yield_per_cycle, self.rate));
        self.last_cycle_ms = Some(ctx.now_ms);
        if let Some(owner) = ctx.host_core().map(|c| c.owner) {
            if let Some(player) = ctx.player_mut(owner) {
                player.deposit(taken);
            }
        }

        let exhausted = ctx
            .world
            .building(deposit)
            .is_some_and(|b| b.reserve == Some(0));
        if exhausted {
            if let Some(core) = ctx.world.core_mut(deposit) {
                core.active = false;
            }
            self.deposit = None;
            debug!(unit = %ctx.host, deposit = %deposit, "Deposit mined out");
        }
    }

    fn apply_research_modifiers(&mut self, modifier: &ResearchModifier) {
        self.rate = modifier.harvest_rate;
    }
}

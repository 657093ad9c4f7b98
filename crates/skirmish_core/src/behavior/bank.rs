//! Vault interest.
//!
//! Every interval the vault pays its owner a fraction of the resources they
//! hold, scaled by the bank-interest modifier and floored to whole units.
//! Payouts above the configured threshold are announced.

use tracing::debug;

use super::{notify_owner, Behavior, ModuleCtx};
use crate::math::Fixed;
use crate::modifier::ResearchModifier;
use crate::notification::NotificationCategory;

/// Interest generator of one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankModule {
    interval_ms: u64,
    rate: Fixed,
    min_notify: u32,
    elapsed_ms: u64,
    interest: Fixed,
}

impl BankModule {
    /// Create a vault paying `rate` every `interval_ms`.
    #[must_use]
    pub fn new(interval_ms: u64, rate: Fixed, min_notify: u32) -> Self {
        Self {
            interval_ms,
            rate,
            min_notify,
            elapsed_ms: 0,
            interest: Fixed::ONE,
        }
    }

    /// Time accumulated toward the next payout.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Payout for a given balance.
    #[must_use]
    pub fn payout(&self, stored: u32) -> u32 {
        Fixed::saturating_from_num(stored)
            .saturating_mul(self.rate)
            .saturating_mul(self.interest)
            .floor()
            .saturating_to_num::<u32>()
    }
}

impl Behavior for BankModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if self.interval_ms == 0 || ctx.low_power || !ctx.host_operational() {
            return;
        }
        let Some(owner) = ctx.host_core().map(|c| c.owner) else {
            return;
        };
        self.elapsed_ms = self.elapsed_ms.saturating_add(ctx.dt_ms);

        while self.elapsed_ms >= self.interval_ms {
            self.elapsed_ms -= self.interval_ms;
            let Some(player) = ctx.player_mut(owner) else {
                return;
            };
            let paid = self.payout(player.resources);
            player.deposit(paid);
            debug!(building = %ctx.host, paid, "Interest paid");
            if paid > self.min_notify {
                notify_owner(ctx, NotificationCategory::Economy, format!("Vault paid {paid} in interest"));
            }
        }
    }

    fn apply_research_modifiers(&mut self, modifier: &ResearchModifier) {
        self.interest = modifier.bank_interest;
    }
}

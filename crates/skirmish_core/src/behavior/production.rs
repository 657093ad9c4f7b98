//! FIFO unit production.
//!
//! Progress accumulates in simulated milliseconds scaled by the owner's
//! production-speed modifier. When the front order reaches its build time
//! the unit spawns next to the building and any overflow carries into the
//! next order, so a queue of N identical units finishes in exactly N build
//! times. Production pauses while the building is under construction or its
//! owner is short on power.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, info};

use super::{move_unit_to, spawn_unit, Behavior, ModuleCtx};
use crate::entity::PlayerId;
use crate::math::{Fixed, Vec2Fixed};
use crate::modifier::ResearchModifier;
use crate::notification::NotificationCategory;

/// Why a production order was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductionError {
    /// This building does not make that unit.
    #[error("{building} cannot produce {unit}")]
    NotProducible {
        /// Building type.
        building: String,
        /// Unit type.
        unit: String,
    },
    /// The unit has not been unlocked by research.
    #[error("{0} is not available")]
    Unavailable(String),
    /// No free queue slot.
    #[error("production queue is full ({0} slots)")]
    QueueFull(usize),
    /// The owner cannot pay.
    #[error("costs {cost}, have {available}")]
    InsufficientResources {
        /// Unit cost.
        cost: u32,
        /// Owner's resources.
        available: u32,
    },
    /// The building is gone or the owner has left.
    #[error("producer is not available")]
    NoProducer,
}

/// Production queue of one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionModule {
    queue: VecDeque<String>,
    queue_size: usize,
    /// Scaled milliseconds accumulated toward the front order.
    progress_ms: Fixed,
    speed: Fixed,
    rally_point: Option<Vec2Fixed>,
}

impl ProductionModule {
    /// Create an empty queue with `queue_size` slots.
    #[must_use]
    pub fn new(queue_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queue_size,
            progress_ms: Fixed::ZERO,
            speed: Fixed::ONE,
            rally_point: None,
        }
    }

    /// Queued unit types, front first.
    pub fn queue(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    /// Number of queued orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Scaled milliseconds of progress on the front order.
    #[must_use]
    pub fn progress_ms(&self) -> Fixed {
        self.progress_ms
    }

    /// Where new units are sent.
    #[must_use]
    pub fn rally_point(&self) -> Option<Vec2Fixed> {
        self.rally_point
    }

    /// Set or clear the rally point.
    pub fn set_rally_point(&mut self, point: Option<Vec2Fixed>) {
        self.rally_point = point;
    }

    /// Queue a unit, charging its owner.
    pub fn enqueue(&mut self, ctx: &mut ModuleCtx<'_>, unit_type: &str) -> Result<(), ProductionError> {
        let Some(host) = ctx.host_building() else {
            return Err(ProductionError::NoProducer);
        };
        let building = host.core.type_id.clone();
        let owner = host.core.owner;
        let data = ctx.data;
        let Some(player) = ctx.players.get(&owner) else {
            return Err(ProductionError::NoProducer);
        };

        if !data
            .producible_units(&player.faction, &building)
            .iter()
            .any(|u| u == unit_type)
        {
            return Err(ProductionError::NotProducible {
                building,
                unit: unit_type.to_string(),
            });
        }
        if !player.research.is_unit_available(unit_type) {
            return Err(ProductionError::Unavailable(unit_type.to_string()));
        }
        if self.queue.len() >= self.queue_size {
            return Err(ProductionError::QueueFull(self.queue_size));
        }
        let cost = data.unit(unit_type).map_or(0, |u| u.cost);
        let available = player.resources;

        let paid = ctx.player_mut(owner).is_some_and(|p| p.spend(cost));
        if !paid {
            return Err(ProductionError::InsufficientResources { cost, available });
        }
        self.queue.push_back(unit_type.to_string());
        debug!(building = %ctx.host, unit = unit_type, queued = self.queue.len(), "Unit queued");
        Ok(())
    }

    /// Cancel the order at `index`.
    ///
    /// Orders that have not started are refunded in full. The order in
    /// progress is refunded for its unbuilt fraction. Returns the refund,
    /// or `None` if there is no such order.
    pub fn cancel(&mut self, ctx: &mut ModuleCtx<'_>, index: usize) -> Option<u32> {
        let unit_type = self.queue.get(index)?.clone();
        let template = ctx.data.unit(&unit_type);
        let cost = template.map_or(0, |u| u.cost);

        let refund = if index == 0 && self.progress_ms > Fixed::ZERO {
            let build = Fixed::saturating_from_num(template.map_or(0, |u| u.build_time_ms));
            let remaining = if build > Fixed::ZERO {
                (Fixed::ONE - self.progress_ms / build).max(Fixed::ZERO)
            } else {
                Fixed::ZERO
            };
            Fixed::saturating_from_num(cost)
                .saturating_mul(remaining)
                .floor()
                .to_num::<u32>()
        } else {
            cost
        };

        self.queue.remove(index);
        if index == 0 {
            self.progress_ms = Fixed::ZERO;
        }
        if let Some(owner) = ctx.host_core().map(|c| c.owner) {
            if let Some(player) = ctx.player_mut(owner) {
                player.deposit(refund);
            }
        }
        debug!(building = %ctx.host, unit = %unit_type, refund, "Production cancelled");
        Some(refund)
    }

    fn complete(&mut self, ctx: &mut ModuleCtx<'_>, owner: PlayerId, unit_type: &str) {
        let Some(host) = ctx.host_core() else {
            return;
        };
        let (center, host_radius) = (host.position, host.radius);
        let Some(template) = ctx.data.unit(unit_type) else {
            return;
        };
        let spot = ctx.world.find_spawn_position(
            center,
            host_radius,
            template.radius,
            template.elevation.layer(),
        );

        match spawn_unit(ctx, unit_type, owner, spot) {
            Ok(unit) => {
                info!(building = %ctx.host, unit = %unit, kind = unit_type, "Unit produced");
                if let Some(rally) = self.rally_point {
                    move_unit_to(ctx, unit, rally);
                }
                ctx.notify(
                    owner,
                    NotificationCategory::Production,
                    format!("{unit_type} ready"),
                );
            }
            Err(error) => ctx.fail(error),
        }
    }

    /// Drop everything; used when the producer is destroyed.
    fn clear(&mut self) {
        self.queue.clear();
        self.progress_ms = Fixed::ZERO;
    }
}

impl Behavior for ProductionModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if ctx.low_power || !ctx.host_operational() {
            return;
        }
        let Some(owner) = ctx.host_core().map(|c| c.owner) else {
            return;
        };
        if self.queue.is_empty() {
            self.progress_ms = Fixed::ZERO;
            return;
        }

        let step = Fixed::saturating_from_num(ctx.dt_ms).saturating_mul(self.speed);
        self.progress_ms = self.progress_ms.saturating_add(step);

        while let Some(front) = self.queue.front() {
            let build = Fixed::saturating_from_num(ctx.data.unit(front).map_or(0, |u| u.build_time_ms));
            if self.progress_ms < build {
                break;
            }
            self.progress_ms -= build;
            let Some(unit_type) = self.queue.pop_front() else {
                break;
            };
            self.complete(ctx, owner, &unit_type);
        }
        if self.queue.is_empty() {
            self.progress_ms = Fixed::ZERO;
        }
    }

    fn on_destroy(&mut self, _ctx: &mut ModuleCtx<'_>) {
        self.clear();
    }

    fn apply_research_modifiers(&mut self, modifier: &ResearchModifier) {
        self.speed = modifier.production_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::PlayerCommand;
    use crate::entity::{EntityId, Team, UnitOrder};
    use crate::factions::FactionId;
    use crate::physics::CirclePhysics;
    use crate::simulation::{Match, MatchConfig};
    use crate::notification::NullSink;
    use crate::test_data::sample_data;

    fn setup(resources: u32) -> (Match, EntityId) {
        let config = MatchConfig {
            starting_resources: resources,
            ..MatchConfig::default()
        };
        let mut game = Match::new(sample_data(), config, Box::new(CirclePhysics::new()), Box::new(NullSink));
        game.add_player(PlayerId(1), Team(1), &FactionId::new("sample")).unwrap();
        let barracks = game
            .spawn_building(PlayerId(1), "barracks", Vec2Fixed::ZERO)
            .unwrap();
        game.spawn_building(PlayerId(1), "plant", Vec2Fixed::from_ints(20, 0))
            .unwrap();
        (game, barracks)
    }

    fn queue(game: &mut Match, barracks: EntityId, unit: &str) {
        assert!(game.accept_player_command(
            PlayerId(1),
            PlayerCommand::QueueUnit {
                building: barracks,
                unit_type: unit.to_string(),
            },
        ));
    }

    fn rifles(game: &Match) -> usize {
        game.world()
            .units()
            .filter(|u| u.core.type_id == "rifle_squad")
            .count()
    }

    #[test]
    fn test_queue_charges_and_completes_on_time() {
        let (mut game, barracks) = setup(500);
        queue(&mut game, barracks, "rifle_squad");
        queue(&mut game, barracks, "rifle_squad");

        game.tick(100).unwrap();
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 400);

        // 1000 ms build time: first at t=1000, second at t=2000.
        for _ in 0..8 {
            game.tick(100).unwrap();
        }
        assert_eq!(rifles(&game), 0);
        game.tick(100).unwrap();
        assert_eq!(rifles(&game), 1);
        for _ in 0..10 {
            game.tick(100).unwrap();
        }
        assert_eq!(rifles(&game), 2);
    }

    #[test]
    fn test_rejects_unproducible_and_unaffordable() {
        let (mut game, barracks) = setup(60);
        queue(&mut game, barracks, "tank");
        queue(&mut game, barracks, "rifle_squad");
        queue(&mut game, barracks, "rifle_squad");
        let report = game.tick(10).unwrap();

        assert_eq!(report.rejected_commands.len(), 2);
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 10);
        let production = game
            .world()
            .core(barracks)
            .unwrap()
            .module(crate::behavior::Module::as_production)
            .unwrap();
        assert_eq!(production.len(), 1);
    }

    #[test]
    fn test_queue_full() {
        let (mut game, barracks) = setup(10_000);
        for _ in 0..4 {
            queue(&mut game, barracks, "rifle_squad");
        }
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 10_000 - 150);
    }

    #[test]
    fn test_cancel_refunds_unbuilt_fraction() {
        let (mut game, barracks) = setup(500);
        queue(&mut game, barracks, "rifle_squad");
        queue(&mut game, barracks, "rifle_squad");
        game.tick(500).unwrap();
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 400);

        game.accept_player_command(PlayerId(1), PlayerCommand::CancelUnit { building: barracks, index: 1 });
        game.tick(0).unwrap();
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 450);

        game.accept_player_command(PlayerId(1), PlayerCommand::CancelUnit { building: barracks, index: 0 });
        game.tick(0).unwrap();
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 475);
    }

    #[test]
    fn test_rally_point_orders_new_unit() {
        let (mut game, barracks) = setup(500);
        let rally = Vec2Fixed::from_ints(0, 15);
        game.accept_player_command(PlayerId(1), PlayerCommand::SetRallyPoint { building: barracks, point: Some(rally) });
        queue(&mut game, barracks, "rifle_squad");
        let mut produced = None;
        for _ in 0..10 {
            let report = game.tick(100).unwrap();
            produced = produced.or_else(|| report.spawned.last().copied());
        }
        let unit = game.world().unit(produced.unwrap()).unwrap();
        assert_eq!(unit.order, Some(UnitOrder::MoveTo(rally)));
    }

    #[test]
    fn test_low_power_pauses_production() {
        let (mut game, barracks) = setup(500);
        let plant = game
            .world()
            .buildings()
            .find(|b| b.core.type_id == "plant")
            .map(|b| b.core.id)
            .unwrap();
        game.destroy(plant);
        game.tick(0).unwrap();
        // Barracks alone draws 5 with nothing produced.
        queue(&mut game, barracks, "rifle_squad");
        for _ in 0..20 {
            game.tick(100).unwrap();
        }
        assert!(game.player(PlayerId(1)).unwrap().low_power);
        assert_eq!(rifles(&game), 0);
    }
}

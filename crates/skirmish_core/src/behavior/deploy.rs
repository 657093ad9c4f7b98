//! Mobile/immobile toggle.
//!
//! Deployed, the unit stops, refuses move orders and fires every turret it
//! carries, each with its own cooldown and sticky target. Packed up, it is
//! an ordinary unarmed vehicle. Entering a garrison packs it up.

use tracing::debug;

use super::{cooldown_ready, Behavior, ModuleCtx};
use crate::combat::{engage, Shooter};
use crate::entity::EntityId;
use crate::math::Vec2Fixed;
use crate::weapon::Weapon;

/// Deployable turret set of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployModule {
    cooldown_ms: u64,
    last_toggle_ms: Option<u64>,
    deployed: bool,
    turrets: Vec<Weapon>,
    targets: Vec<Option<EntityId>>,
}

impl DeployModule {
    /// Create a packed-up unit with `turrets`.
    #[must_use]
    pub fn new(cooldown_ms: u64, turrets: Vec<Weapon>) -> Self {
        let targets = vec![None; turrets.len()];
        Self {
            cooldown_ms,
            last_toggle_ms: None,
            deployed: false,
            turrets,
            targets,
        }
    }

    /// Whether the turrets are out.
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.deployed
    }

    /// The deployed weapons.
    #[must_use]
    pub fn turrets(&self) -> &[Weapon] {
        &self.turrets
    }

    /// Deploy or pack up if the cooldown allows.
    pub fn toggle(&mut self, ctx: &mut ModuleCtx<'_>) -> bool {
        if !cooldown_ready(self.last_toggle_ms, self.cooldown_ms, ctx.now_ms) {
            return false;
        }
        if ctx.host_unit().map_or(true, |u| !u.is_on_field()) {
            return false;
        }
        let deployed = !self.deployed;
        self.set_deployed(ctx, deployed);
        self.last_toggle_ms = Some(ctx.now_ms);
        true
    }

    fn set_deployed(&mut self, ctx: &mut ModuleCtx<'_>, deployed: bool) {
        self.deployed = deployed;
        if let Some(unit) = ctx.host_unit_mut() {
            unit.deployed = deployed;
            if deployed {
                unit.order = None;
            }
        }
        if deployed {
            ctx.world.set_velocity(ctx.host, Vec2Fixed::ZERO);
        } else {
            self.targets.iter_mut().for_each(|t| *t = None);
        }
        debug!(unit = %ctx.host, deployed, "Deploy toggled");
    }
}

impl Behavior for DeployModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if !self.deployed {
            return;
        }
        let Some(unit) = ctx.host_unit() else {
            return;
        };
        if !unit.is_on_field() {
            return;
        }
        let owner = unit.core.owner;
        let Some(shooter) = Shooter::from_entity(ctx.world, ctx.host) else {
            return;
        };
        let modifier = ctx.modifier_of(owner);

        for (weapon, target) in self.turrets.iter_mut().zip(self.targets.iter_mut()) {
            match engage(ctx.world, weapon, &modifier, &shooter, *target, ctx.now_ms) {
                Ok((next, _)) => *target = next,
                Err(error) => {
                    ctx.fail(error);
                    return;
                }
            }
        }
    }

    fn on_garrison(&mut self, ctx: &mut ModuleCtx<'_>) {
        if self.deployed {
            self.set_deployed(ctx, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::command::PlayerCommand;
    use crate::entity::{EntityId, PlayerId, Team, UnitOrder};
    use crate::factions::FactionId;
    use crate::math::Vec2Fixed;
    use crate::notification::NullSink;
    use crate::physics::CirclePhysics;
    use crate::simulation::{Match, MatchConfig};
    use crate::test_data::sample_data;

    fn game() -> Match {
        let mut game = Match::new(
            sample_data(),
            MatchConfig::default(),
            Box::new(CirclePhysics::new()),
            Box::new(NullSink),
        );
        game.add_player(PlayerId(1), Team(1), &FactionId::new("sample")).unwrap();
        game.add_player(PlayerId(2), Team(2), &FactionId::new("sample")).unwrap();
        game
    }

    fn deploy(game: &mut Match, unit: EntityId) -> bool {
        game.accept_player_command(PlayerId(1), PlayerCommand::ToggleDeploy { unit });
        game.tick(10).unwrap().rejected_commands.is_empty()
    }

    #[test]
    fn test_deployed_walker_fires_both_turrets() {
        let mut game = game();
        let walker = game.spawn_unit(PlayerId(1), "walker", Vec2Fixed::ZERO).unwrap();
        game.spawn_unit(PlayerId(2), "tank", Vec2Fixed::from_ints(8, 0)).unwrap();

        game.tick(10).unwrap();
        assert_eq!(game.world().projectiles().filter(|p| p.source == walker).count(), 0);

        assert!(deploy(&mut game, walker));
        assert!(game.world().unit(walker).unwrap().deployed);
        assert_eq!(game.world().projectiles().filter(|p| p.source == walker).count(), 2);
    }

    #[test]
    fn test_deployed_walker_ignores_move_orders() {
        let mut game = game();
        let walker = game.spawn_unit(PlayerId(1), "walker", Vec2Fixed::ZERO).unwrap();
        deploy(&mut game, walker);

        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::Move { units: vec![walker], target: Vec2Fixed::from_ints(10, 0) },
        );
        for _ in 0..10 {
            game.tick(100).unwrap();
        }
        let unit = game.world().unit(walker).unwrap();
        assert_ne!(unit.order, Some(UnitOrder::MoveTo(Vec2Fixed::from_ints(10, 0))));
        assert_eq!(unit.core.position, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_toggle_cooldown() {
        let mut game = game();
        let walker = game.spawn_unit(PlayerId(1), "walker", Vec2Fixed::ZERO).unwrap();
        assert!(deploy(&mut game, walker));
        assert!(!deploy(&mut game, walker));
        game.tick(1000).unwrap();
        assert!(deploy(&mut game, walker));
        assert!(!game.world().unit(walker).unwrap().deployed);
    }
}

//! Toggleable invisibility.
//!
//! A cloaked unit is hidden from targeting except within the detection
//! radius, and holds fire (its stance is forced to passive) until it
//! decloaks. Detection by a nearby enemy or entering a garrison reveals it
//! immediately and restarts the toggle cooldown.

use tracing::debug;

use super::{cooldown_ready, Behavior, ModuleCtx};
use crate::entity::{Stance, UnitOrder};

/// Cloaking device of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloakModule {
    cooldown_ms: u64,
    last_toggle_ms: Option<u64>,
    cloaked: bool,
    saved_stance: Stance,
}

impl CloakModule {
    /// Create an inactive cloak.
    #[must_use]
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_toggle_ms: None,
            cloaked: false,
            saved_stance: Stance::Aggressive,
        }
    }

    /// Whether the cloak is engaged.
    #[must_use]
    pub fn is_cloaked(&self) -> bool {
        self.cloaked
    }

    /// Flip the cloak if the cooldown allows.
    pub fn toggle(&mut self, ctx: &mut ModuleCtx<'_>) -> bool {
        if !cooldown_ready(self.last_toggle_ms, self.cooldown_ms, ctx.now_ms) {
            return false;
        }
        if ctx.host_unit().map_or(true, |u| !u.is_on_field()) {
            return false;
        }
        if self.cloaked {
            self.reveal(ctx);
        } else {
            let Some(unit) = ctx.host_unit_mut() else {
                return false;
            };
            self.saved_stance = unit.stance;
            unit.stance = Stance::Passive;
            unit.core.cloaked = true;
            unit.core.target = None;
            if matches!(unit.order, Some(UnitOrder::Attack(_))) {
                unit.order = None;
            }
            self.cloaked = true;
            debug!(unit = %ctx.host, "Cloak engaged");
        }
        self.last_toggle_ms = Some(ctx.now_ms);
        true
    }

    fn reveal(&mut self, ctx: &mut ModuleCtx<'_>) {
        if !self.cloaked {
            return;
        }
        self.cloaked = false;
        let stance = self.saved_stance;
        if let Some(unit) = ctx.host_unit_mut() {
            unit.stance = stance;
            unit.core.cloaked = false;
        }
        debug!(unit = %ctx.host, "Cloak disengaged");
    }
}

impl Behavior for CloakModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if self.cloaked && ctx.world.is_cloak_detected(ctx.host) {
            self.reveal(ctx);
            self.last_toggle_ms = Some(ctx.now_ms);
        }
    }

    fn on_garrison(&mut self, ctx: &mut ModuleCtx<'_>) {
        if self.cloaked {
            self.reveal(ctx);
            self.last_toggle_ms = Some(ctx.now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::behavior::Module;
    use crate::command::PlayerCommand;
    use crate::entity::{EntityId, PlayerId, Stance, Team};
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

    fn toggle(game: &mut Match, unit: EntityId) -> bool {
        game.accept_player_command(PlayerId(1), PlayerCommand::ToggleCloak { unit });
        game.tick(10).unwrap().rejected_commands.is_empty()
    }

    fn cloaked(game: &Match, unit: EntityId) -> bool {
        game.world()
            .core(unit)
            .unwrap()
            .module(Module::as_cloak)
            .unwrap()
            .is_cloaked()
    }

    #[test]
    fn test_cloak_forces_passive_and_restores() {
        let mut game = game();
        let shade = game.spawn_unit(PlayerId(1), "shade", Vec2Fixed::ZERO).unwrap();

        assert!(toggle(&mut game, shade));
        let unit = game.world().unit(shade).unwrap();
        assert!(unit.core.cloaked);
        assert_eq!(unit.stance, Stance::Passive);

        // Cooldown is 2000 ms.
        assert!(!toggle(&mut game, shade));
        game.tick(2000).unwrap();
        assert!(toggle(&mut game, shade));
        let unit = game.world().unit(shade).unwrap();
        assert!(!unit.core.cloaked);
        assert_eq!(unit.stance, Stance::Aggressive);
    }

    #[test]
    fn test_cloak_drops_attack_order_and_holds_fire() {
        let mut game = game();
        let shade = game.spawn_unit(PlayerId(1), "shade", Vec2Fixed::ZERO).unwrap();
        let tank = game.spawn_unit(PlayerId(2), "tank", Vec2Fixed::from_ints(7, 0)).unwrap();
        game.accept_player_command(PlayerId(1), PlayerCommand::Attack { units: vec![shade], target: tank });
        game.tick(10).unwrap();
        assert!(toggle(&mut game, shade));
        assert_eq!(game.world().unit(shade).unwrap().order, None);

        game.accept_player_command(PlayerId(1), PlayerCommand::Attack { units: vec![shade], target: tank });
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);

        // Let the round fired before cloaking land.
        for _ in 0..10 {
            game.tick(100).unwrap();
        }
        let hp = game.world().core(tank).unwrap().health.current;
        for _ in 0..20 {
            game.tick(100).unwrap();
            assert!(game.world().projectiles().all(|p| p.source != shade));
        }
        assert!(cloaked(&game, shade));
        assert_eq!(game.world().core(tank).unwrap().health.current, hp);
    }

    #[test]
    fn test_cloaked_unit_hidden_from_distant_enemies() {
        let mut game = game();
        let shade = game.spawn_unit(PlayerId(1), "shade", Vec2Fixed::ZERO).unwrap();
        toggle(&mut game, shade);
        game.spawn_unit(PlayerId(2), "rifle_squad", Vec2Fixed::from_ints(7, 0)).unwrap();

        game.tick(10).unwrap();
        assert!(cloaked(&game, shade));
        assert!(game.world().projectiles().all(|p| p.target != Some(shade)));
    }

    #[test]
    fn test_detection_reveals() {
        let mut game = game();
        let shade = game.spawn_unit(PlayerId(1), "shade", Vec2Fixed::ZERO).unwrap();
        toggle(&mut game, shade);
        game.spawn_unit(PlayerId(2), "rifle_squad", Vec2Fixed::from_ints(3, 0)).unwrap();

        game.tick(10).unwrap();
        assert!(!cloaked(&game, shade));
        assert!(!game.world().core(shade).unwrap().cloaked);
    }

    #[test]
    fn test_garrison_reveals() {
        let mut game = game();
        let bunker = game.spawn_building(PlayerId(1), "bunker", Vec2Fixed::from_ints(-4, 0)).unwrap();
        let shade = game.spawn_unit(PlayerId(1), "shade", Vec2Fixed::ZERO).unwrap();
        toggle(&mut game, shade);
        game.accept_player_command(PlayerId(1), PlayerCommand::Garrison { unit: shade, building: bunker });
        game.tick(10).unwrap();
        assert!(!cloaked(&game, shade));
    }
}

//! Infantry housing.
//!
//! Friendly infantry standing next to the building may enter while slots
//! remain. Occupants leave the field (their bodies are disabled) and fire
//! their own weapons from the building's position. When the building is
//! destroyed every occupant is ejected, never killed.

use tracing::debug;

use super::{dispatch, eject_point, gap_between, Behavior, ModuleCtx};
use crate::combat::{engage, Shooter};
use crate::entity::EntityId;
use crate::math::{Fixed, Vec2Fixed};
use crate::modifier::ResearchModifier;
use crate::physics::BodyId;
use crate::roles::UnitRole;

/// Garrison slots of one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarrisonModule {
    capacity: u32,
    bonus: u32,
    occupants: Vec<EntityId>,
}

impl GarrisonModule {
    /// Create an empty garrison with `capacity` base slots.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            bonus: 0,
            occupants: Vec::new(),
        }
    }

    /// Slots including research bonuses.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity.saturating_add(self.bonus)
    }

    /// Units inside, in entry order.
    #[must_use]
    pub fn occupants(&self) -> &[EntityId] {
        &self.occupants
    }

    /// Whether every slot is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity() as usize
    }

    /// Move a unit into the building.
    ///
    /// The unit must be a living friendly infantry unit on the field within
    /// entry range, and the building must be complete with a free slot.
    pub fn enter(&mut self, ctx: &mut ModuleCtx<'_>, unit: EntityId) -> bool {
        let Some(host) = ctx.host_building() else {
            return false;
        };
        if !host.is_operational() || self.is_full() || self.occupants.contains(&unit) {
            return false;
        }
        let (host_team, center, host_radius) = (host.core.team, host.core.position, host.core.radius);

        let Some(candidate) = ctx.world.unit(unit) else {
            return false;
        };
        if !candidate.is_on_field()
            || candidate.core.team != host_team
            || !candidate.roles.contains(UnitRole::INFANTRY)
        {
            return false;
        }
        if gap_between(ctx.world, unit, ctx.host).map_or(true, |gap| gap > ctx.config.garrison_entry_range) {
            return false;
        }

        let jitter = host_radius / 2;
        let offset = Vec2Fixed::new(
            (ctx.random_fraction() * 2 - Fixed::ONE) * jitter,
            (ctx.random_fraction() * 2 - Fixed::ONE) * jitter,
        );
        if !ctx.world.garrison_unit(unit, ctx.host, center + offset) {
            return false;
        }
        self.occupants.push(unit);
        debug!(building = %ctx.host, unit = %unit, occupants = self.occupants.len(), "Unit garrisoned");
        dispatch(ctx, unit, |m, ctx| m.on_garrison(ctx));
        true
    }

    /// Eject one occupant next to the building.
    pub fn leave(&mut self, ctx: &mut ModuleCtx<'_>, unit: EntityId) -> bool {
        let Some(index) = self.occupants.iter().position(|id| *id == unit) else {
            return false;
        };
        self.occupants.remove(index);

        let Some((center, host_radius)) = ctx.host_core().map(|c| (c.position, c.radius)) else {
            return false;
        };
        let radius = ctx.world.core(unit).map_or(Fixed::ONE, |c| c.radius);
        let at = eject_point(ctx, center, host_radius, radius);
        if !ctx.world.release_unit(unit, at) {
            return false;
        }
        debug!(building = %ctx.host, unit = %unit, "Unit ungarrisoned");
        dispatch(ctx, unit, |m, ctx| m.on_ungarrison(ctx));
        true
    }

    /// Eject everyone. Returns how many left.
    pub fn leave_all(&mut self, ctx: &mut ModuleCtx<'_>) -> usize {
        let occupants = self.occupants.clone();
        occupants
            .into_iter()
            .filter(|unit| self.leave(ctx, *unit))
            .count()
    }

    fn fire_from_inside(&self, ctx: &mut ModuleCtx<'_>) {
        let Some(host) = ctx.host_core() else {
            return;
        };
        let origin = host.position;
        let host_body = BodyId::main(ctx.host);

        for &unit in &self.occupants {
            let Some(core) = ctx.world.core(unit) else {
                continue;
            };
            let shooter = Shooter {
                id: unit,
                owner: core.owner,
                team: core.team,
                origin,
                body: Some(host_body),
            };
            let current = core.target;
            let modifier = ctx.modifier_of(shooter.owner);
            let Some(mut weapon) = ctx.world.core_mut(unit).and_then(|c| c.weapon.take()) else {
                continue;
            };
            let outcome = engage(ctx.world, &mut weapon, &modifier, &shooter, current, ctx.now_ms);
            if let Some(core) = ctx.world.core_mut(unit) {
                core.weapon = Some(weapon);
                if let Ok((target, _)) = &outcome {
                    core.target = *target;
                }
            }
            if let Err(error) = outcome {
                ctx.fail(error);
                return;
            }
        }
    }
}

impl Behavior for GarrisonModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        let host = ctx.host;
        let world = &*ctx.world;
        self.occupants.retain(|id| {
            world
                .unit(*id)
                .is_some_and(|u| u.core.active && u.garrisoned_in == Some(host))
        });
        if ctx.host_operational() {
            self.fire_from_inside(ctx);
        }
    }

    fn on_destroy(&mut self, ctx: &mut ModuleCtx<'_>) {
        let ejected = self.leave_all(ctx);
        if ejected > 0 {
            debug!(building = %ctx.host, ejected, "Garrison evacuated");
        }
    }

    fn apply_research_modifiers(&mut self, modifier: &ResearchModifier) {
        self.bonus = modifier.garrison_capacity;
    }
}

#[cfg(test)]
mod tests {
    use crate::behavior::Module;
    use crate::command::PlayerCommand;
    use crate::entity::{EntityId, PlayerId, Team};
    use crate::factions::FactionId;
    use crate::math::Vec2Fixed;
    use crate::notification::NullSink;
    use crate::physics::CirclePhysics;
    use crate::simulation::{Match, MatchConfig};
    use crate::test_data::sample_data;

    fn game() -> (Match, EntityId) {
        let mut game = Match::new(
            sample_data(),
            MatchConfig::default(),
            Box::new(CirclePhysics::new()),
            Box::new(NullSink),
        );
        let sample = FactionId::new("sample");
        game.add_player(PlayerId(1), Team(1), &sample).unwrap();
        game.add_player(PlayerId(2), Team(2), &sample).unwrap();
        let bunker = game.spawn_building(PlayerId(1), "bunker", Vec2Fixed::ZERO).unwrap();
        (game, bunker)
    }

    fn garrison(game: &mut Match, bunker: EntityId, unit: EntityId) {
        game.accept_player_command(PlayerId(1), PlayerCommand::Garrison { unit, building: bunker });
        game.tick(10).unwrap();
    }

    fn occupants(game: &Match, bunker: EntityId) -> Vec<EntityId> {
        game.world()
            .core(bunker)
            .unwrap()
            .module(Module::as_garrison)
            .unwrap()
            .occupants()
            .to_vec()
    }

    #[test]
    fn test_infantry_enters_and_leaves_field() {
        let (mut game, bunker) = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::from_ints(3, 0)).unwrap();
        garrison(&mut game, bunker, squad);

        assert_eq!(occupants(&game, bunker), vec![squad]);
        let unit = game.world().unit(squad).unwrap();
        assert_eq!(unit.garrisoned_in, Some(bunker));
        assert!(unit.core.active);
    }

    #[test]
    fn test_vehicles_and_distant_units_rejected() {
        let (mut game, bunker) = game();
        let tank = game.spawn_unit(PlayerId(1), "tank", Vec2Fixed::from_ints(4, 0)).unwrap();
        let far = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::from_ints(30, 0)).unwrap();
        garrison(&mut game, bunker, tank);
        garrison(&mut game, bunker, far);
        assert!(occupants(&game, bunker).is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let (mut game, bunker) = game();
        let squads: Vec<EntityId> = (0..5)
            .map(|i| {
                game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::from_ints(3, i - 2))
                    .unwrap()
            })
            .collect();
        for squad in &squads {
            garrison(&mut game, bunker, *squad);
        }
        assert_eq!(occupants(&game, bunker).len(), 4);
    }

    #[test]
    fn test_destroyed_bunker_ejects_occupants() {
        let (mut game, bunker) = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::from_ints(3, 0)).unwrap();
        garrison(&mut game, bunker, squad);

        game.destroy(bunker);
        game.tick(10).unwrap();
        assert!(game.world().building(bunker).is_none());
        let unit = game.world().unit(squad).unwrap();
        assert!(unit.is_on_field());
    }

    #[test]
    fn test_occupants_fire_from_bunker() {
        let (mut game, bunker) = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::from_ints(3, 0)).unwrap();
        garrison(&mut game, bunker, squad);
        game.spawn_unit(PlayerId(2), "tank", Vec2Fixed::from_ints(-8, 0)).unwrap();

        game.tick(10).unwrap();
        let shots: Vec<_> = game.world().projectiles().filter(|p| p.source == squad).collect();
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].origin, game.world().core(bunker).unwrap().position);
    }
}

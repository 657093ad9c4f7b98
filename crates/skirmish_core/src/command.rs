//! Player commands.
//!
//! Commands arrive from the session layer between ticks, are queued by
//! [`Match::accept_player_command`](crate::simulation::Match::accept_player_command),
//! and are applied at the start of the next tick in arrival order.
//!
//! Every command validates ownership first: naming an entity the player
//! does not own rejects the whole command. A rejected command changes
//! nothing; the reason is logged and listed in the tick report.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::behavior::{
    spawn_building, with_modules, Module, ModuleCtx, ProductionError, SupportKind, SupportModule,
};
use crate::entity::{Elevation, EntityId, PlayerId, Stance, UnitOrder};
use crate::math::Vec2Fixed;
use crate::research::ResearchError;

/// An instruction from one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Walk units to a point.
    Move {
        /// Units to move.
        units: Vec<EntityId>,
        /// Destination.
        target: Vec2Fixed,
    },
    /// Order units to close in on and fire at an enemy.
    Attack {
        /// Attackers.
        units: Vec<EntityId>,
        /// Enemy entity.
        target: EntityId,
    },
    /// Change whether units engage on their own.
    SetStance {
        /// Units to change.
        units: Vec<EntityId>,
        /// New stance.
        stance: Stance,
    },
    /// Pay for and queue a unit at a production building.
    QueueUnit {
        /// Producer.
        building: EntityId,
        /// Unit type to build.
        unit_type: String,
    },
    /// Remove a queue entry.
    CancelUnit {
        /// Producer.
        building: EntityId,
        /// Queue position, 0 being the order in progress.
        index: usize,
    },
    /// Set or clear where new units walk to.
    SetRallyPoint {
        /// Producer.
        building: EntityId,
        /// Rally point.
        point: Option<Vec2Fixed>,
    },
    /// Put infantry inside a building.
    Garrison {
        /// Infantry unit.
        unit: EntityId,
        /// Garrison building.
        building: EntityId,
    },
    /// Let one unit out of a building.
    Ungarrison {
        /// Garrison building.
        building: EntityId,
        /// Occupant.
        unit: EntityId,
    },
    /// Empty a building.
    UngarrisonAll {
        /// Garrison building.
        building: EntityId,
    },
    /// Engage or disengage a cloak.
    ToggleCloak {
        /// Cloaked unit.
        unit: EntityId,
    },
    /// Deploy or pack up.
    ToggleDeploy {
        /// Deployable unit.
        unit: EntityId,
    },
    /// Launch a housed aircraft.
    Sortie {
        /// Hangar building.
        hangar: EntityId,
        /// Point to fly to.
        target: Vec2Fixed,
    },
    /// Haul from a deposit.
    Harvest {
        /// Harvester.
        unit: EntityId,
        /// Deposit.
        deposit: EntityId,
    },
    /// Strip a deposit in place.
    Mine {
        /// Miner.
        unit: EntityId,
        /// Deposit.
        deposit: EntityId,
    },
    /// Heal a friendly infantry unit.
    Heal {
        /// Medic.
        unit: EntityId,
        /// Patient.
        target: EntityId,
    },
    /// Repair a friendly machine or building.
    Repair {
        /// Engineer.
        unit: EntityId,
        /// Damaged entity.
        target: EntityId,
    },
    /// Start research on either track.
    StartResearch(String),
    /// Abandon active research.
    CancelResearch(String),
    /// Pay for and lay down a building.
    PlaceBuilding {
        /// Building type.
        building_type: String,
        /// Center of the footprint.
        position: Vec2Fixed,
    },
}

/// Why a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The issuing player is not in the match.
    #[error("player {0} is not in the match")]
    UnknownPlayer(u8),
    /// The named entity does not exist or is already destroyed.
    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityId),
    /// The named entity belongs to someone else.
    #[error("entity {entity} is not owned by player {player}")]
    NotOwner {
        /// Entity named.
        entity: EntityId,
        /// Issuing player.
        player: u8,
    },
    /// The entity lacks the behavior the command needs.
    #[error("entity {entity} has no {module} module")]
    MissingModule {
        /// Entity named.
        entity: EntityId,
        /// Required module.
        module: &'static str,
    },
    /// Production refused the order.
    #[error(transparent)]
    Production(#[from] ProductionError),
    /// Research refused to start.
    #[error(transparent)]
    Research(#[from] ResearchError),
    /// The module refused the action.
    #[error("{0}")]
    Rejected(&'static str),
}

/// Apply one command for `player`.
pub fn apply_command(
    ctx: &mut ModuleCtx<'_>,
    player: PlayerId,
    command: PlayerCommand,
) -> Result<(), CommandError> {
    if ctx.player(player).is_none() {
        return Err(CommandError::UnknownPlayer(player.0));
    }

    match command {
        PlayerCommand::Move { units, target } => {
            owns_all(ctx, player, &units)?;
            let mut moved = 0;
            for id in units {
                if let Some(unit) = ctx.world.unit_mut(id) {
                    if !unit.is_on_field() || unit.deployed {
                        continue;
                    }
                    if unit.core.module(Module::as_sortie).is_some_and(|s| s.is_returning()) {
                        continue;
                    }
                    unit.order = Some(UnitOrder::MoveTo(target));
                    unit.core.target = None;
                    moved += 1;
                }
            }
            accepted(moved > 0, "no selected unit can move")
        }
        PlayerCommand::Attack { units, target } => {
            owns_all(ctx, player, &units)?;
            let team = ctx.team_of(player);
            let hostile = ctx
                .world
                .core(target)
                .is_some_and(|c| c.active && team.is_hostile(c.team));
            if !hostile {
                return Err(CommandError::Rejected("attack target is not a live enemy"));
            }
            let mut ordered = 0;
            for id in units {
                if let Some(unit) = ctx.world.unit_mut(id) {
                    if !unit.is_on_field() || unit.core.weapon.is_none() || unit.core.cloaked {
                        continue;
                    }
                    unit.order = Some(UnitOrder::Attack(target));
                    ordered += 1;
                }
            }
            accepted(ordered > 0, "no selected unit can attack")
        }
        PlayerCommand::SetStance { units, stance } => {
            owns_all(ctx, player, &units)?;
            for id in units {
                if let Some(unit) = ctx.world.unit_mut(id) {
                    if !unit.core.cloaked {
                        unit.stance = stance;
                    }
                }
            }
            Ok(())
        }
        PlayerCommand::QueueUnit {
            building,
            unit_type,
        } => {
            owns(ctx, player, building)?;
            with_module(ctx, building, Module::as_production_mut, "production", |m, ctx| {
                m.enqueue(ctx, &unit_type)
            })??;
            Ok(())
        }
        PlayerCommand::CancelUnit { building, index } => {
            owns(ctx, player, building)?;
            let refund = with_module(ctx, building, Module::as_production_mut, "production", |m, ctx| {
                m.cancel(ctx, index)
            })?;
            accepted(refund.is_some(), "no such queue entry")
        }
        PlayerCommand::SetRallyPoint { building, point } => {
            owns(ctx, player, building)?;
            with_module(ctx, building, Module::as_production_mut, "production", |m, _| {
                m.set_rally_point(point);
            })
        }
        PlayerCommand::Garrison { unit, building } => {
            owns(ctx, player, unit)?;
            owns(ctx, player, building)?;
            let entered = with_module(ctx, building, Module::as_garrison_mut, "garrison", |m, ctx| {
                m.enter(ctx, unit)
            })?;
            accepted(entered, "unit cannot enter this garrison")
        }
        PlayerCommand::Ungarrison { building, unit } => {
            owns(ctx, player, building)?;
            let left = with_module(ctx, building, Module::as_garrison_mut, "garrison", |m, ctx| {
                m.leave(ctx, unit)
            })?;
            accepted(left, "unit is not inside")
        }
        PlayerCommand::UngarrisonAll { building } => {
            owns(ctx, player, building)?;
            with_module(ctx, building, Module::as_garrison_mut, "garrison", |m, ctx| {
                m.leave_all(ctx);
            })
        }
        PlayerCommand::ToggleCloak { unit } => {
            owns(ctx, player, unit)?;
            let toggled = with_module(ctx, unit, Module::as_cloak_mut, "cloak", |m, ctx| m.toggle(ctx))?;
            accepted(toggled, "cloak is recharging")
        }
        PlayerCommand::ToggleDeploy { unit } => {
            owns(ctx, player, unit)?;
            let toggled = with_module(ctx, unit, Module::as_deploy_mut, "deploy", |m, ctx| m.toggle(ctx))?;
            accepted(toggled, "deploy is recharging")
        }
        PlayerCommand::Sortie { hangar, target } => {
            owns(ctx, player, hangar)?;
            let launched = with_module(ctx, hangar, Module::as_hangar_mut, "hangar", |m, ctx| {
                m.launch(ctx, target)
            })?;
            accepted(launched, "no aircraft ready")
        }
        PlayerCommand::Harvest { unit, deposit } => {
            owns(ctx, player, unit)?;
            let assigned = with_module(ctx, unit, Module::as_harvest_mut, "harvest", |m, ctx| {
                m.assign(ctx, deposit)
            })?;
            accepted(assigned, "not a workable deposit")
        }
        PlayerCommand::Mine { unit, deposit } => {
            owns(ctx, player, unit)?;
            let assigned = with_module(ctx, unit, Module::as_mine_mut, "mine", |m, ctx| {
                m.assign(ctx, deposit)
            })?;
            accepted(assigned, "not a workable deposit")
        }
        PlayerCommand::Heal { unit, target } => {
            owns(ctx, player, unit)?;
            support(ctx, unit, target, SupportKind::Heal)
        }
        PlayerCommand::Repair { unit, target } => {
            owns(ctx, player, unit)?;
            support(ctx, unit, target, SupportKind::Repair)
        }
        PlayerCommand::StartResearch(id) => {
            let census = ctx.world.census(player);
            let data = ctx.data;
            let player = ctx
                .player_mut(player)
                .ok_or(CommandError::UnknownPlayer(player.0))?;
            player.start_research(&id, &census, data)?;
            Ok(())
        }
        PlayerCommand::CancelResearch(id) => {
            let cancelled = ctx
                .player_mut(player)
                .is_some_and(|p| p.research.cancel(&id));
            accepted(cancelled, "research is not active")
        }
        PlayerCommand::PlaceBuilding {
            building_type,
            position,
        } => place_building(ctx, player, &building_type, position).map(|_| ()),
    }
}

/// Pay for a building and lay it down under construction.
///
/// The type must belong to the player's faction, every building it
/// requires must be standing, and its footprint must be clear.
pub fn place_building(
    ctx: &mut ModuleCtx<'_>,
    player: PlayerId,
    building_type: &str,
    position: Vec2Fixed,
) -> Result<EntityId, CommandError> {
    let data = ctx.data;
    let faction = ctx
        .player(player)
        .map(|p| p.faction.clone())
        .ok_or(CommandError::UnknownPlayer(player.0))?;
    let template = data
        .faction(&faction)
        .ok()
        .and_then(|f| f.get_building(building_type))
        .ok_or(CommandError::Rejected("building type not available to this faction"))?;

    let census = ctx.world.census(player);
    if !template.requires.iter().all(|r| census.building_types.contains(r)) {
        return Err(CommandError::Rejected("required building missing"));
    }
    if !ctx
        .world
        .physics()
        .is_area_free(position, template.radius, Elevation::Ground.layer())
    {
        return Err(CommandError::Rejected("footprint is blocked"));
    }
    let paid = ctx.player_mut(player).is_some_and(|p| p.spend(template.cost));
    if !paid {
        return Err(CommandError::Rejected("insufficient resources"));
    }

    match spawn_building(ctx, building_type, player, position, false) {
        Ok(id) => {
            debug!(player = player.0, building = %id, kind = building_type, "Building placed");
            Ok(id)
        }
        Err(error) => {
            ctx.fail(error);
            Err(CommandError::Rejected("building could not be created"))
        }
    }
}

fn accepted(ok: bool, reason: &'static str) -> Result<(), CommandError> {
    if ok {
        Ok(())
    } else {
        Err(CommandError::Rejected(reason))
    }
}

fn owns(ctx: &ModuleCtx<'_>, player: PlayerId, entity: EntityId) -> Result<(), CommandError> {
    let core = ctx
        .world
        .core(entity)
        .filter(|c| c.active)
        .ok_or(CommandError::NoSuchEntity(entity))?;
    if core.owner != player {
        return Err(CommandError::NotOwner {
            entity,
            player: player.0,
        });
    }
    Ok(())
}

fn owns_all(ctx: &ModuleCtx<'_>, player: PlayerId, entities: &[EntityId]) -> Result<(), CommandError> {
    if entities.is_empty() {
        return Err(CommandError::Rejected("no units selected"));
    }
    entities.iter().try_for_each(|id| owns(ctx, player, *id))
}

/// Run `f` on the first module of one kind on an entity.
fn with_module<T, R>(
    ctx: &mut ModuleCtx<'_>,
    host: EntityId,
    project: fn(&mut Module) -> Option<&mut T>,
    module: &'static str,
    f: impl FnOnce(&mut T, &mut ModuleCtx<'_>) -> R,
) -> Result<R, CommandError> {
    with_modules(ctx, host, |modules, ctx| {
        modules.iter_mut().find_map(project).map(|m| f(m, ctx))
    })
    .ok_or(CommandError::NoSuchEntity(host))?
    .ok_or(CommandError::MissingModule {
        entity: host,
        module,
    })
}

fn support(
    ctx: &mut ModuleCtx<'_>,
    unit: EntityId,
    target: EntityId,
    kind: SupportKind,
) -> Result<(), CommandError> {
    let name = match kind {
        SupportKind::Heal => "heal",
        SupportKind::Repair => "repair",
    };
    let project: fn(&mut Module) -> Option<&mut SupportModule> = match kind {
        SupportKind::Heal => heal_module,
        SupportKind::Repair => repair_module,
    };
    let assigned = with_module(ctx, unit, project, name, |m, ctx| m.assign(ctx, target))?;
    accepted(assigned, "target cannot be treated")
}

fn heal_module(module: &mut Module) -> Option<&mut SupportModule> {
    module.as_support_mut().filter(|s| s.kind() == SupportKind::Heal)
}

fn repair_module(module: &mut Module) -> Option<&mut SupportModule> {
    module.as_support_mut().filter(|s| s.kind() == SupportKind::Repair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Team;
    use crate::factions::FactionId;
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

    #[test]
    fn test_foreign_units_reject_whole_command() {
        let mut game = game();
        let mine = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        let theirs = game.spawn_unit(PlayerId(2), "rifle_squad", Vec2Fixed::from_ints(30, 0)).unwrap();
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::Move { units: vec![mine, theirs], target: Vec2Fixed::from_ints(5, 5) },
        );
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);
        assert!(report.rejected_commands[0].1.contains("not owned"));
        assert_eq!(game.world().unit(mine).unwrap().order, None);
    }

    #[test]
    fn test_move_sets_order() {
        let mut game = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        let target = Vec2Fixed::from_ints(5, 0);
        game.accept_player_command(PlayerId(1), PlayerCommand::Move { units: vec![squad], target });
        let report = game.tick(10).unwrap();
        assert!(report.rejected_commands.is_empty());
        assert_eq!(game.world().unit(squad).unwrap().order, Some(UnitOrder::MoveTo(target)));
    }

    #[test]
    fn test_attack_requires_enemy_target() {
        let mut game = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        let friend = game.spawn_unit(PlayerId(1), "medic", Vec2Fixed::from_ints(3, 0)).unwrap();
        game.accept_player_command(PlayerId(1), PlayerCommand::Attack { units: vec![squad], target: friend });
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);
    }

    #[test]
    fn test_missing_module_rejected() {
        let mut game = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        game.accept_player_command(PlayerId(1), PlayerCommand::ToggleCloak { unit: squad });
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);
        assert!(report.rejected_commands[0].1.contains("cloak"));
    }

    #[test]
    fn test_set_stance() {
        let mut game = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::SetStance { units: vec![squad], stance: Stance::Passive },
        );
        game.tick(10).unwrap();
        assert_eq!(game.world().unit(squad).unwrap().stance, Stance::Passive);
    }

    #[test]
    fn test_place_building_pays_and_starts_construction() {
        let mut game = game();
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::PlaceBuilding { building_type: "plant".into(), position: Vec2Fixed::from_ints(10, 10) },
        );
        let report = game.tick(10).unwrap();
        assert!(report.rejected_commands.is_empty());
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 920);
        let plant = game.world().buildings().find(|b| b.core.type_id == "plant").unwrap();
        assert!(plant.under_construction);
    }

    #[test]
    fn test_place_building_checks_requirements_and_footprint() {
        let mut game = game();
        // The factory needs a standing hq.
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::PlaceBuilding { building_type: "factory".into(), position: Vec2Fixed::from_ints(10, 10) },
        );
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);

        game.spawn_building(PlayerId(1), "hq", Vec2Fixed::ZERO).unwrap();
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::PlaceBuilding { building_type: "plant".into(), position: Vec2Fixed::from_ints(1, 0) },
        );
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 1000);
    }

    #[test]
    fn test_research_commands() {
        let mut game = game();
        game.spawn_building(PlayerId(1), "plant", Vec2Fixed::from_ints(-10, 0)).unwrap();
        game.spawn_building(PlayerId(1), "lab", Vec2Fixed::ZERO).unwrap();
        game.accept_player_command(PlayerId(1), PlayerCommand::StartResearch("hardened_rounds".into()));
        game.accept_player_command(PlayerId(1), PlayerCommand::StartResearch("hardened_rounds".into()));
        let report = game.tick(10).unwrap();
        assert_eq!(report.rejected_commands.len(), 1);
        assert!(game.player(PlayerId(1)).unwrap().research.is_active("hardened_rounds"));

        game.accept_player_command(PlayerId(1), PlayerCommand::CancelResearch("hardened_rounds".into()));
        let report = game.tick(10).unwrap();
        assert!(report.rejected_commands.is_empty());
        assert!(!game.player(PlayerId(1)).unwrap().research.is_active("hardened_rounds"));
        assert_eq!(game.player(PlayerId(1)).unwrap().resources, 900);
    }
}

//! Per-tick simulation systems.
//!
//! Each system does one thing to the whole world and runs in the fixed
//! order set by [`Match::tick`](crate::simulation::Match::tick). Entities
//! are always visited in id order.

use tracing::{debug, info, trace, warn};

use crate::behavior::{dispatch, with_modules, Module, ModuleCtx};
use crate::entity::{EntityId, UnitOrder};
use crate::math::{ms_to_seconds, Fixed, Vec2Fixed};
use crate::notification::NotificationCategory;

/// Distance at which a move order counts as arrived.
const ARRIVAL_THRESHOLD: Fixed = Fixed::from_bits(1 << 30);

// ========================================
// Research
// ========================================

/// Advance every player's research and push new modifiers to their modules.
///
/// Completions are reported and announced. When a player's effective
/// modifier changes, every module that player owns is told; health and
/// speed of existing units are left as spawned.
pub fn research_system(ctx: &mut ModuleCtx<'_>) {
    let data = ctx.data;
    let ids: Vec<_> = ctx.players.keys().copied().collect();

    for id in ids {
        let Some(player) = ctx.players.get_mut(&id) else {
            continue;
        };
        let before = player.effective_modifier();
        let completed = player.research.advance(ctx.dt_ms, data);
        if completed.is_empty() {
            continue;
        }
        let after = player.effective_modifier();

        for key in completed {
            info!(player = id.0, research = %key, "Research completed");
            ctx.notify(id, NotificationCategory::Research, format!("{} complete", key.id()));
            ctx.report.research_completed.push((id, key));
        }

        if after != before {
            for entity in ctx.world.owned_by(id) {
                with_modules(ctx, entity, |modules, _| {
                    for module in modules.iter_mut() {
                        module.behavior_mut().apply_research_modifiers(&after);
                    }
                });
            }
        }
    }
}

// ========================================
// Construction and power
// ========================================

/// Advance buildings under construction and fire their completion hooks.
pub fn construction_system(ctx: &mut ModuleCtx<'_>) {
    let dt_ms = ctx.dt_ms;
    for id in ctx.world.building_ids() {
        let completed = ctx
            .world
            .building_mut(id)
            .is_some_and(|b| b.core.active && b.advance_construction(dt_ms));
        if completed {
            debug!(building = %id, "Construction complete");
            dispatch(ctx, id, |m, ctx| m.on_construction_complete(ctx));
        }
    }
}

/// Recompute each player's power balance and tech tier from completed buildings.
pub fn power_system(ctx: &mut ModuleCtx<'_>) {
    for (id, player) in ctx.players.iter_mut() {
        let census = ctx.world.census(*id);
        let low_power = census.is_low_power();
        if low_power != player.low_power {
            debug!(
                player = id.0,
                produced = census.power_produced,
                consumed = census.power_consumed,
                low_power,
                "Power state changed"
            );
        }
        player.low_power = low_power;
        player.tier = census.tier;
    }
}

// ========================================
// Modules
// ========================================

/// Run `update` on every module of every live entity, buildings first.
pub fn module_system(ctx: &mut ModuleCtx<'_>) {
    let ids = ctx
        .world
        .building_ids()
        .into_iter()
        .chain(ctx.world.unit_ids());
    for id in ids.collect::<Vec<EntityId>>() {
        if !ctx.world.core(id).is_some_and(|c| c.active) {
            continue;
        }
        with_modules(ctx, id, |modules, ctx| {
            for module in modules.iter_mut() {
                module.behavior_mut().update(ctx);
            }
        });
    }
}

// ========================================
// Movement
// ========================================

/// Turn standing orders into body velocities.
///
/// Move orders end on arrival. Attack orders close to weapon range and end
/// when the target is gone. Returning aircraft head for their hangar.
/// Deployed and idle units stand still.
pub fn movement_system(ctx: &mut ModuleCtx<'_>) {
    let dt = ms_to_seconds(ctx.dt_ms);

    for id in ctx.world.unit_ids() {
        let Some(unit) = ctx.world.unit(id) else {
            continue;
        };
        if !unit.is_on_field() {
            continue;
        }
        let position = unit.core.position;
        let speed = unit.speed;
        let owner = unit.core.owner;

        let goal = match (unit.deployed, unit.order) {
            (true, _) | (false, None) => None,
            (false, Some(UnitOrder::MoveTo(point))) => {
                if position.distance(point) <= ARRIVAL_THRESHOLD {
                    if let Some(u) = ctx.world.unit_mut(id) {
                        u.order = None;
                    }
                    None
                } else {
                    Some(point)
                }
            }
            (false, Some(UnitOrder::Attack(target))) => {
                let range = unit
                    .core
                    .weapon
                    .as_ref()
                    .map(|w| w.effective_range(&ctx.modifier_of(owner)));
                let chase = match (ctx.world.core(target), range) {
                    (Some(core), Some(range)) if core.active && !is_housed(ctx, target) => {
                        let gap = (position.distance(core.position) - core.radius).max(Fixed::ZERO);
                        Some((gap > range).then_some(core.position))
                    }
                    _ => None,
                };
                if chase.is_none() {
                    if let Some(u) = ctx.world.unit_mut(id) {
                        u.order = None;
                    }
                }
                chase.flatten()
            }
            (false, Some(UnitOrder::ReturnToBase(hangar))) => {
                ctx.world.core(hangar).map(|c| c.position)
            }
        };

        let velocity = match goal {
            Some(point) if dt > Fixed::ZERO => {
                let distance = position.distance(point);
                let step = speed.min(distance / dt);
                position.direction_to(point, Vec2Fixed::ZERO).scale(step)
            }
            _ => Vec2Fixed::ZERO,
        };
        ctx.world.set_velocity(id, velocity);
    }
}

fn is_housed(ctx: &ModuleCtx<'_>, id: EntityId) -> bool {
    ctx.world.unit(id).is_some_and(|u| u.is_housed())
}

/// Step the physics collaborator and copy positions back.
pub fn physics_system(ctx: &mut ModuleCtx<'_>) {
    ctx.world.physics_mut().step(ms_to_seconds(ctx.dt_ms));
    ctx.world.sync_from_physics();
}

// ========================================
// Lifecycle
// ========================================

/// Dock returning aircraft that reached their hangar.
///
/// An aircraft whose hangar no longer exists has nowhere to land and is
/// destroyed.
pub fn housing_system(ctx: &mut ModuleCtx<'_>) {
    let dock_radius = ctx.config.hangar_dock_radius;

    for id in ctx.world.unit_ids() {
        let Some(unit) = ctx.world.unit(id) else {
            continue;
        };
        let Some(UnitOrder::ReturnToBase(hangar)) = unit.order else {
            continue;
        };
        if !unit.is_on_field() {
            continue;
        }
        let position = unit.core.position;

        let home = ctx
            .world
            .building(hangar)
            .filter(|b| b.core.active && b.core.module(Module::as_hangar).is_some())
            .map(|b| (b.core.position, b.core.radius));
        let Some((center, radius)) = home else {
            warn!(aircraft = %id, hangar = %hangar, "Hangar lost, aircraft destroyed");
            if let Some(core) = ctx.world.core_mut(id) {
                core.active = false;
            }
            continue;
        };
        if position.distance(center) > radius + dock_radius {
            continue;
        }

        let docked = with_modules(ctx, hangar, |modules, ctx| {
            modules
                .iter_mut()
                .find_map(Module::as_hangar_mut)
                .is_some_and(|h| h.dock(ctx, id))
        })
        .unwrap_or(false);
        if !docked {
            warn!(aircraft = %id, hangar = %hangar, "Hangar refused aircraft, aircraft destroyed");
            if let Some(core) = ctx.world.core_mut(id) {
                core.active = false;
            }
        }
    }
}

/// Remove every entity flagged inactive, after its `on_destroy` hooks.
///
/// Hooks may flag further entities (housed aircraft die with their
/// hangar); the sweep repeats until nothing inactive remains.
pub fn sweep_system(ctx: &mut ModuleCtx<'_>) {
    loop {
        let dead = ctx.world.inactive_entities();
        if dead.is_empty() {
            break;
        }
        for id in dead {
            dispatch(ctx, id, |m, ctx| m.on_destroy(ctx));
            if ctx.world.remove(id) {
                trace!(entity = %id, "Entity removed");
                ctx.report.deaths.push(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::command::PlayerCommand;
    use crate::entity::{EntityId, PlayerId, Team, UnitOrder};
    use crate::factions::FactionId;
    use crate::math::{Fixed, Vec2Fixed};
    use crate::notification::{NotificationCategory, NullSink};
    use crate::physics::CirclePhysics;
    use crate::research::ResearchKey;
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
    fn test_move_order_arrives_and_clears() {
        let mut game = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        let target = Vec2Fixed::from_ints(3, 0);
        game.accept_player_command(PlayerId(1), PlayerCommand::Move { units: vec![squad], target });

        // 3 units per second.
        for _ in 0..12 {
            game.tick(100).unwrap();
        }
        let unit = game.world().unit(squad).unwrap();
        assert_eq!(unit.order, None);
        assert!(unit.core.position.distance(target) <= Fixed::from_num(0.25));
    }

    #[test]
    fn test_attack_order_closes_to_range() {
        let mut game = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        let harvester = game.spawn_unit(PlayerId(2), "harvester", Vec2Fixed::from_ints(20, 0)).unwrap();
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::Attack { units: vec![squad], target: harvester },
        );
        for _ in 0..50 {
            game.tick(100).unwrap();
        }
        let unit = game.world().unit(squad).unwrap();
        let gap = unit.core.position.distance(Vec2Fixed::from_ints(20, 0)) - Fixed::ONE;
        assert!(gap <= Fixed::from_num(8));
        assert!(gap > Fixed::from_num(7));
        assert_eq!(unit.order, Some(UnitOrder::Attack(harvester)));
        assert!(game.world().core(harvester).unwrap().health.current < Fixed::from_num(200));
    }

    #[test]
    fn test_construction_completes_and_powers() {
        let mut game = game();
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::PlaceBuilding { building_type: "tower".into(), position: Vec2Fixed::ZERO },
        );
        game.tick(10).unwrap();
        let tower = game.world().buildings().next().unwrap().core.id;
        assert!(game.world().building(tower).unwrap().under_construction);
        // The tower draws 5 with no plant: low power once complete.
        assert!(!game.player(PlayerId(1)).unwrap().low_power);

        game.tick(2000).unwrap();
        assert!(!game.world().building(tower).unwrap().under_construction);
        assert!(game.player(PlayerId(1)).unwrap().low_power);
    }

    #[test]
    fn test_research_completion_reported_and_applied() {
        let mut game = game();
        game.spawn_building(PlayerId(1), "plant", Vec2Fixed::from_ints(-10, 0)).unwrap();
        game.spawn_building(PlayerId(1), "lab", Vec2Fixed::ZERO).unwrap();
        let barracks = game.spawn_building(PlayerId(1), "barracks", Vec2Fixed::from_ints(10, 0)).unwrap();
        assert!(game.start_research(PlayerId(1), "assembly_lines"));

        let report = game.tick(1000).unwrap();
        assert_eq!(
            report.research_completed,
            vec![(PlayerId(1), ResearchKey::Stat("assembly_lines".into()))]
        );

        // Production speed doubled: a 1000 ms squad takes 500 ms.
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::QueueUnit { building: barracks, unit_type: "rifle_squad".into() },
        );
        let mut spawned = Vec::new();
        for _ in 0..5 {
            spawned.extend(game.tick(100).unwrap().spawned);
        }
        assert_eq!(spawned.len(), 1);
        // Health modifier applied at spawn.
        assert_eq!(
            game.world().core(spawned[0]).unwrap().health.max,
            Fixed::from_num(150)
        );
    }

    #[test]
    fn test_research_notification_sent() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut game = Match::new(sample_data(), MatchConfig::default(), Box::new(CirclePhysics::new()), Box::new(tx));
        game.add_player(PlayerId(1), Team(1), &FactionId::new("sample")).unwrap();
        game.spawn_building(PlayerId(1), "plant", Vec2Fixed::from_ints(-10, 0)).unwrap();
        game.spawn_building(PlayerId(1), "lab", Vec2Fixed::ZERO).unwrap();
        assert!(game.start_research(PlayerId(1), "hardened_rounds"));
        game.tick(1000).unwrap();

        let research: Vec<_> = rx
            .try_iter()
            .filter(|n| n.category == NotificationCategory::Research)
            .collect();
        assert_eq!(research.len(), 1);
        assert_eq!(research[0].player, PlayerId(1));
        assert_eq!(research[0].message, "hardened_rounds complete");
    }

    #[test]
    fn test_sweep_removes_destroyed_entities() {
        let mut game = game();
        let squad = game.spawn_unit(PlayerId(1), "rifle_squad", Vec2Fixed::ZERO).unwrap();
        game.world_mut().apply_damage(squad, Fixed::from_num(1000), EntityId(0));
        let report = game.tick(10).unwrap();
        assert_eq!(report.deaths, vec![squad]);
        assert!(game.world().unit(squad).is_none());
    }

    #[test]
    fn test_stranded_aircraft_destroyed() {
        let mut game = game();
        game.spawn_building(PlayerId(1), "plant", Vec2Fixed::from_ints(-20, 0)).unwrap();
        let airfield = game.spawn_building(PlayerId(1), "airfield", Vec2Fixed::ZERO).unwrap();
        game.accept_player_command(
            PlayerId(1),
            PlayerCommand::Sortie { hangar: airfield, target: Vec2Fixed::from_ints(40, 0) },
        );
        game.tick(100).unwrap();
        let aircraft = game
            .world()
            .units()
            .find(|u| u.is_on_field())
            .map(|u| u.core.id)
            .unwrap();
        game.destroy(airfield);
        game.tick(100).unwrap();
        assert!(game.world().unit(aircraft).is_some());

        // Fuel runs out, the aircraft turns home and finds nothing.
        for _ in 0..210 {
            game.tick(100).unwrap();
        }
        assert!(game.world().unit(aircraft).is_none());
    }
}

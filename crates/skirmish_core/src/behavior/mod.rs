//! Composable behavior modules attached to units and buildings.
//!
//! Every entity carries a list of [`Module`]s created from its type
//! template. Each module implements [`Behavior`]: a required per-tick
//! `update` plus optional lifecycle hooks that default to no-ops.
//!
//! ## Ownership
//!
//! Modules live inside their entity's [`EntityCore`](crate::entity::EntityCore)
//! and are dropped with it. To run a module, [`with_modules`] takes the
//! list out of the entity, hands it the shared [`ModuleCtx`], and puts it
//! back afterwards. A module therefore never holds a reference into the
//! world; it names its host by [`EntityId`] through the context.
//!
//! ## Failure
//!
//! Gameplay operations never fail: an invalid action returns `false` or
//! does nothing. Physics faults raised while a hook mutates the world are
//! recorded on the context with [`ModuleCtx::fail`] and surface from
//! [`Match::tick`](crate::simulation::Match::tick).

mod aura;
mod bank;
mod cloak;
mod deploy;
mod garrison;
mod hangar;
mod harvest;
mod production;
mod shield;
mod support;
mod turret;

use std::collections::BTreeMap;

use rand_chacha::ChaCha8Rng;

pub use aura::AuraModule;
pub use bank::BankModule;
pub use cloak::CloakModule;
pub use deploy::DeployModule;
pub use garrison::GarrisonModule;
pub use hangar::{HangarModule, SortieModule};
pub use harvest::{HarvestModule, MineModule};
pub use production::{ProductionError, ProductionModule};
pub use shield::ShieldModule;
pub use support::{SupportKind, SupportModule};
pub use turret::TurretModule;

use crate::data::{GameData, ModuleData};
use crate::entity::{Building, Elevation, EntityCore, EntityId, PlayerId, Team, Unit};
use crate::error::{GameError, Result};
use crate::math::{Fixed, Vec2Fixed};
use crate::modifier::ResearchModifier;
use crate::notification::{Notification, NotificationCategory, NotificationSink};
use crate::player::Player;
use crate::roles::UnitRole;
use crate::simulation::{MatchConfig, TickReport};
use crate::weapon::Weapon;
use crate::world::EntityWorld;

/// Capability contract of a behavior module.
///
/// Only [`Behavior::update`] is required.
pub trait Behavior {
    /// Called once after the host entity enters the world.
    fn init(&mut self, _ctx: &mut ModuleCtx<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once per tick.
    fn update(&mut self, ctx: &mut ModuleCtx<'_>);

    /// Called when the host building finishes construction.
    fn on_construction_complete(&mut self, _ctx: &mut ModuleCtx<'_>) {}

    /// Called before the host is removed from the world.
    fn on_destroy(&mut self, _ctx: &mut ModuleCtx<'_>) {}

    /// Called whenever the owner's effective modifier changes.
    fn apply_research_modifiers(&mut self, _modifier: &ResearchModifier) {}

    /// Called after the host unit enters a garrison.
    fn on_garrison(&mut self, _ctx: &mut ModuleCtx<'_>) {}

    /// Called after the host unit leaves a garrison.
    fn on_ungarrison(&mut self, _ctx: &mut ModuleCtx<'_>) {}
}

/// One behavior module instance.
#[derive(Debug, Clone)]
pub enum Module {
    /// Unit production queue.
    Production(ProductionModule),
    /// Defensive weapon.
    Turret(TurretModule),
    /// Infantry housing.
    Garrison(GarrisonModule),
    /// Beam and projectile interception.
    Shield(ShieldModule),
    /// Interest on stored resources.
    Bank(BankModule),
    /// Deposit-to-depot resource hauling.
    Harvest(HarvestModule),
    /// Deposit stripping.
    Mine(MineModule),
    /// Healing or repair.
    Support(SupportModule),
    /// Toggleable invisibility.
    Cloak(CloakModule),
    /// Mobile/immobile toggle.
    Deploy(DeployModule),
    /// Aircraft housing.
    Hangar(HangarModule),
    /// Fuel and ammo of an aircraft out on a sortie.
    Sortie(SortieModule),
    /// Area healing.
    Aura(AuraModule),
}

impl Module {
    /// Instantiate a module from its template.
    pub fn from_data(template: &ModuleData, data: &GameData) -> Result<Self> {
        Ok(match template {
            ModuleData::Production { queue_size } => {
                Self::Production(ProductionModule::new(*queue_size))
            }
            ModuleData::Turret { weapon } => {
                Self::Turret(TurretModule::new(Weapon::new(data.require_weapon(weapon)?.clone())))
            }
            ModuleData::Garrison { capacity } => Self::Garrison(GarrisonModule::new(*capacity)),
            ModuleData::Shield { radius } => Self::Shield(ShieldModule::new(*radius)),
            ModuleData::Bank {
                interval_ms,
                rate,
                min_notify,
            } => Self::Bank(BankModule::new(*interval_ms, *rate, *min_notify)),
            ModuleData::Harvest {
                capacity,
                amount_per_cycle,
                cooldown_ms,
                range,
            } => Self::Harvest(HarvestModule::new(
                *capacity,
                *amount_per_cycle,
                *cooldown_ms,
                *range,
            )),
            ModuleData::Mine {
                yield_per_cycle,
                cooldown_ms,
                range,
            } => Self::Mine(MineModule::new(*yield_per_cycle, *cooldown_ms, *range)),
            ModuleData::Heal {
                amount,
                cooldown_ms,
                range,
            } => Self::Support(SupportModule::new(SupportKind::Heal, *amount, *cooldown_ms, *range)),
            ModuleData::Repair {
                amount,
                cooldown_ms,
                range,
            } => Self::Support(SupportModule::new(SupportKind::Repair, *amount, *cooldown_ms, *range)),
            ModuleData::Cloak { cooldown_ms } => Self::Cloak(CloakModule::new(*cooldown_ms)),
            ModuleData::Deploy {
                cooldown_ms,
                turrets,
            } => {
                let weapons = turrets
                    .iter()
                    .map(|id| data.require_weapon(id).map(|w| Weapon::new(w.clone())))
                    .collect::<Result<Vec<_>>>()?;
                Self::Deploy(DeployModule::new(*cooldown_ms, weapons))
            }
            ModuleData::Hangar {
                aircraft,
                capacity,
                fuel_ms,
                ammo,
                repair_per_second,
            } => {
                data.require_unit(aircraft)?;
                Self::Hangar(HangarModule::new(
                    aircraft.clone(),
                    *capacity,
                    *fuel_ms,
                    *ammo,
                    *repair_per_second,
                ))
            }
            ModuleData::Aura {
                radius,
                heal_per_second,
            } => Self::Aura(AuraModule::new(*radius, *heal_per_second)),
        })
    }

    /// Dispatch target for the [`Behavior`] contract.
    pub fn behavior_mut(&mut self) -> &mut dyn Behavior {
        match self {
            Self::Production(m) => m,
            Self::Turret(m) => m,
            Self::Garrison(m) => m,
            Self::Shield(m) => m,
            Self::Bank(m) => m,
            Self::Harvest(m) => m,
            Self::Mine(m) => m,
            Self::Support(m) => m,
            Self::Cloak(m) => m,
            Self::Deploy(m) => m,
            Self::Hangar(m) => m,
            Self::Sortie(m) => m,
            Self::Aura(m) => m,
        }
    }

    /// Short name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Production(_) => "production",
            Self::Turret(_) => "turret",
            Self::Garrison(_) => "garrison",
            Self::Shield(_) => "shield",
            Self::Bank(_) => "bank",
            Self::Harvest(_) => "harvest",
            Self::Mine(_) => "mine",
            Self::Support(_) => "support",
            Self::Cloak(_) => "cloak",
            Self::Deploy(_) => "deploy",
            Self::Hangar(_) => "hangar",
            Self::Sortie(_) => "sortie",
            Self::Aura(_) => "aura",
        }
    }
}

macro_rules! module_accessors {
    ($($variant:ident => $ty:ty, $get:ident, $get_mut:ident;)*) => {
        impl Module {
            $(
                #[doc = concat!("Borrow as a [`", stringify!($ty), "`].")]
                #[must_use]
                pub fn $get(&self) -> Option<&$ty> {
                    match self {
                        Self::$variant(m) => Some(m),
                        _ => None,
                    }
                }

                #[doc = concat!("Mutably borrow as a [`", stringify!($ty), "`].")]
                pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                    match self {
                        Self::$variant(m) => Some(m),
                        _ => None,
                    }
                }
            )*
        }
    };
}

module_accessors! {
    Production => ProductionModule, as_production, as_production_mut;
    Turret => TurretModule, as_turret, as_turret_mut;
    Garrison => GarrisonModule, as_garrison, as_garrison_mut;
    Shield => ShieldModule, as_shield, as_shield_mut;
    Bank => BankModule, as_bank, as_bank_mut;
    Harvest => HarvestModule, as_harvest, as_harvest_mut;
    Mine => MineModule, as_mine, as_mine_mut;
    Support => SupportModule, as_support, as_support_mut;
    Cloak => CloakModule, as_cloak, as_cloak_mut;
    Deploy => DeployModule, as_deploy, as_deploy_mut;
    Hangar => HangarModule, as_hangar, as_hangar_mut;
    Sortie => SortieModule, as_sortie, as_sortie_mut;
    Aura => AuraModule, as_aura, as_aura_mut;
}

// ========================================
// Context
// ========================================

/// Everything a module may touch while it runs.
pub struct ModuleCtx<'a> {
    /// Live entities.
    pub world: &'a mut EntityWorld,
    /// Players of the match.
    pub players: &'a mut BTreeMap<PlayerId, Player>,
    /// Static configuration.
    pub data: &'a GameData,
    /// Match tunables.
    pub config: &'a MatchConfig,
    /// User-visible event sink.
    pub notifications: &'a mut dyn NotificationSink,
    /// Match random stream.
    pub rng: &'a mut ChaCha8Rng,
    /// Events of the current tick.
    pub report: &'a mut TickReport,
    /// Simulation time at the end of this tick.
    pub now_ms: u64,
    /// Length of this tick.
    pub dt_ms: u64,
    /// Entity whose modules are running.
    pub host: EntityId,
    /// The host's owner is short on power.
    pub low_power: bool,
    fault: Option<GameError>,
}

impl<'a> ModuleCtx<'a> {
    /// Assemble a context for one phase of a tick.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world: &'a mut EntityWorld,
        players: &'a mut BTreeMap<PlayerId, Player>,
        data: &'a GameData,
        config: &'a MatchConfig,
        notifications: &'a mut dyn NotificationSink,
        rng: &'a mut ChaCha8Rng,
        report: &'a mut TickReport,
        now_ms: u64,
        dt_ms: u64,
    ) -> Self {
        Self {
            world,
            players,
            data,
            config,
            notifications,
            rng,
            report,
            now_ms,
            dt_ms,
            host: EntityId(0),
            low_power: false,
            fault: None,
        }
    }

    /// Record a fatal fault. The first one wins.
    pub fn fail(&mut self, error: GameError) {
        if self.fault.is_none() {
            self.fault = Some(error);
        }
    }

    /// Take the recorded fault, if any.
    pub fn take_fault(&mut self) -> Option<GameError> {
        self.fault.take()
    }

    /// A player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// A player, mutably.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Effective modifier of a player; identity for neutral or departed owners.
    #[must_use]
    pub fn modifier_of(&self, id: PlayerId) -> ResearchModifier {
        self.players
            .get(&id)
            .map_or(ResearchModifier::IDENTITY, Player::effective_modifier)
    }

    /// Team of a player; neutral for unknown players.
    #[must_use]
    pub fn team_of(&self, id: PlayerId) -> Team {
        self.players.get(&id).map_or(Team::NEUTRAL, |p| p.team)
    }

    /// Shared state of the running host.
    #[must_use]
    pub fn host_core(&self) -> Option<&EntityCore> {
        self.world.core(self.host)
    }

    /// The running host as a unit.
    #[must_use]
    pub fn host_unit(&self) -> Option<&Unit> {
        self.world.unit(self.host)
    }

    /// The running host as a unit, mutably.
    pub fn host_unit_mut(&mut self) -> Option<&mut Unit> {
        self.world.unit_mut(self.host)
    }

    /// The running host as a building.
    #[must_use]
    pub fn host_building(&self) -> Option<&Building> {
        self.world.building(self.host)
    }

    /// Whether the host is a completed, living building (always true for units).
    #[must_use]
    pub fn host_operational(&self) -> bool {
        match self.world.building(self.host) {
            Some(building) => building.is_operational(),
            None => self.world.core(self.host).is_some_and(|c| c.active),
        }
    }

    /// Send a notification.
    pub fn notify(&mut self, player: PlayerId, category: NotificationCategory, message: String) {
        self.notifications.notify(Notification {
            player,
            category,
            message,
        });
    }

    /// A uniformly random fraction in `[0, 1)` from the match stream.
    pub fn random_fraction(&mut self) -> Fixed {
        use rand::Rng;
        Fixed::from_num(self.rng.gen_range(0..1000_u32)) / 1000
    }
}

/// Run `f` on an entity's modules with the context pointed at that entity.
///
/// The modules are taken out of the entity for the duration of the call, so
/// `f` is free to mutate the world. Returns `None` when the entity does
/// not exist.
pub fn with_modules<R>(
    ctx: &mut ModuleCtx<'_>,
    host: EntityId,
    f: impl FnOnce(&mut Vec<Module>, &mut ModuleCtx<'_>) -> R,
) -> Option<R> {
    let core = ctx.world.core_mut(host)?;
    let mut modules = std::mem::take(&mut core.modules);
    let owner = core.owner;

    let previous = (ctx.host, ctx.low_power);
    ctx.host = host;
    ctx.low_power = ctx.players.get(&owner).is_some_and(|p| p.low_power);

    let result = f(&mut modules, ctx);

    (ctx.host, ctx.low_power) = previous;
    if let Some(core) = ctx.world.core_mut(host) {
        // Modules attached while ours were out (sortie state) are kept.
        let added = std::mem::replace(&mut core.modules, modules);
        core.modules.extend(added);
    }
    Some(result)
}

/// Call one hook on every module of an entity.
pub fn dispatch(
    ctx: &mut ModuleCtx<'_>,
    host: EntityId,
    hook: impl Fn(&mut dyn Behavior, &mut ModuleCtx<'_>),
) {
    with_modules(ctx, host, |modules, ctx| {
        for module in modules.iter_mut() {
            hook(module.behavior_mut(), ctx);
        }
    });
}

// ========================================
// Spawning
// ========================================

/// Create a unit of `type_id` for `owner` at `position`.
///
/// The owner's effective modifier scales health and speed, and is handed to
/// every module. Module `init` hooks run before this returns.
pub fn spawn_unit(
    ctx: &mut ModuleCtx<'_>,
    type_id: &str,
    owner: PlayerId,
    position: Vec2Fixed,
) -> Result<EntityId> {
    let data = ctx.data;
    let template = data.require_unit(type_id)?;
    let modifier = ctx.modifier_of(owner);

    let mut core = EntityCore::new(
        type_id,
        owner,
        ctx.team_of(owner),
        position,
        template.health.saturating_mul(modifier.unit_health),
        template.radius,
    );
    core.elevation = template.elevation;
    core.weapon = template
        .weapon
        .as_deref()
        .map(|id| data.require_weapon(id).map(|w| Weapon::new(w.clone())))
        .transpose()?;
    core.modules = template
        .modules
        .iter()
        .map(|m| Module::from_data(m, data))
        .collect::<Result<_>>()?;

    let roles = UnitRole::from_tags(&template.tags, core.weapon.is_some());
    let speed = template.speed.saturating_mul(modifier.unit_speed);
    let id = ctx.world.add_unit(Unit::new(core, roles, speed))?;

    initialize(ctx, id, &modifier)?;
    ctx.report.spawned.push(id);
    Ok(id)
}

/// Create a building of `type_id` for `owner` at `position`.
///
/// Unless `constructed`, the building starts under construction.
/// Pre-constructed buildings get their `on_construction_complete` hooks
/// immediately.
pub fn spawn_building(
    ctx: &mut ModuleCtx<'_>,
    type_id: &str,
    owner: PlayerId,
    position: Vec2Fixed,
    constructed: bool,
) -> Result<EntityId> {
    let data = ctx.data;
    let template = data.require_building(type_id)?;
    let modifier = ctx.modifier_of(owner);

    let mut core = EntityCore::new(
        type_id,
        owner,
        ctx.team_of(owner),
        position,
        template.health.saturating_mul(modifier.building_health),
        template.radius,
    );
    core.elevation = Elevation::Ground;
    core.weapon = template
        .weapon
        .as_deref()
        .map(|id| data.require_weapon(id).map(|w| Weapon::new(w.clone())))
        .transpose()?;
    core.modules = template
        .modules
        .iter()
        .map(|m| Module::from_data(m, data))
        .collect::<Result<_>>()?;

    let mut building = Building::new(core, template.power, template.tier)
        .with_tags(template.tags.clone());
    if !constructed {
        building = building.with_construction(template.build_time_ms);
    }
    if let Some(reserve) = template.reserve {
        building = building.with_reserve(reserve);
    }
    let operational = !building.under_construction;
    let id = ctx.world.add_building(building)?;

    initialize(ctx, id, &modifier)?;
    if operational {
        dispatch(ctx, id, |m, ctx| m.on_construction_complete(ctx));
    }
    if let Some(fault) = ctx.take_fault() {
        return Err(fault);
    }
    Ok(id)
}

fn initialize(ctx: &mut ModuleCtx<'_>, id: EntityId, modifier: &ResearchModifier) -> Result<()> {
    with_modules(ctx, id, |modules, ctx| {
        for module in modules.iter_mut() {
            let behavior = module.behavior_mut();
            behavior.apply_research_modifiers(modifier);
            behavior.init(ctx)?;
        }
        Ok(())
    })
    .unwrap_or(Ok(()))
}

/// Point just outside a host's footprint in a random direction.
pub(crate) fn eject_point(ctx: &mut ModuleCtx<'_>, center: Vec2Fixed, host_radius: Fixed, radius: Fixed) -> Vec2Fixed {
    let angle = ctx.random_fraction() * 360;
    let distance = host_radius + radius + Fixed::from_num(0.5);
    center + Vec2Fixed::UNIT_X.rotate_degrees(angle).scale(distance)
}

/// Set a unit's standing order to move to a point.
pub(crate) fn move_unit_to(ctx: &mut ModuleCtx<'_>, unit: EntityId, point: Vec2Fixed) {
    if let Some(u) = ctx.world.unit_mut(unit) {
        if !u.deployed && !matches!(u.order, Some(crate::entity::UnitOrder::MoveTo(p)) if p == point) {
            u.order = Some(crate::entity::UnitOrder::MoveTo(point));
        }
    }
}

/// Send the running host toward a point.
pub(crate) fn move_host_to(ctx: &mut ModuleCtx<'_>, point: Vec2Fixed) {
    let host = ctx.host;
    move_unit_to(ctx, host, point);
}

/// Stop the running host in place.
pub(crate) fn halt_host(ctx: &mut ModuleCtx<'_>) {
    let host = ctx.host;
    halt_unit(ctx, host);
}

/// Stop a unit in place.
pub(crate) fn halt_unit(ctx: &mut ModuleCtx<'_>, unit: EntityId) {
    if let Some(u) = ctx.world.unit_mut(unit) {
        if matches!(u.order, Some(crate::entity::UnitOrder::MoveTo(_))) {
            u.order = None;
        }
    }
    ctx.world.set_velocity(unit, Vec2Fixed::ZERO);
}

/// Edge-to-edge distance between two entities.
pub(crate) fn gap_between(world: &EntityWorld, a: EntityId, b: EntityId) -> Option<Fixed> {
    let (a, b) = (world.core(a)?, world.core(b)?);
    Some((a.position.distance(b.position) - a.radius - b.radius).max(Fixed::ZERO))
}

/// Whether a cooldown measured from `last_ms` has elapsed.
pub(crate) fn cooldown_ready(last_ms: Option<u64>, cooldown_ms: u64, now_ms: u64) -> bool {
    last_ms.map_or(true, |last| now_ms.saturating_sub(last) >= cooldown_ms)
}

/// Tell a player something happened at one of their entities.
pub(crate) fn notify_owner(ctx: &mut ModuleCtx<'_>, category: NotificationCategory, message: String) {
    if let Some(owner) = ctx.host_core().map(|c| c.owner) {
        if owner != PlayerId::NEUTRAL {
            ctx.notify(owner, category, message);
        }
    }
}

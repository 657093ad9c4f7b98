//! Core simulation entities: units and buildings.
//!
//! Both share an [`EntityCore`] carrying identity, ownership, placement,
//! health, elevation, an optional weapon and the attached behavior
//! modules. Entities are owned exclusively by the
//! [`EntityWorld`](crate::world::EntityWorld); modules live inside the
//! entity they belong to and are dropped with it.

use serde::{Deserialize, Serialize};

use crate::behavior::Module;
use crate::math::{Fixed, Vec2Fixed};
use crate::roles::UnitRole;
use crate::weapon::Weapon;

/// Unique identifier for any live entity in one match.
///
/// Units, buildings, projectiles, beams and area effects draw from a single
/// monotonically increasing counter, so ids are never reused within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Player slot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Owner of neutral map objects (resource deposits).
    pub const NEUTRAL: Self = Self(0);
}

/// Alliance identifier. Entities on different non-neutral teams are hostile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Team(pub u8);

impl Team {
    /// Neutral team; never hostile to anyone.
    pub const NEUTRAL: Self = Self(0);

    /// Whether this team is the neutral team.
    #[must_use]
    pub const fn is_neutral(self) -> bool {
        self.0 == Self::NEUTRAL.0
    }

    /// Whether `other` is an enemy of this team.
    #[must_use]
    pub const fn is_hostile(self, other: Self) -> bool {
        !self.is_neutral() && !other.is_neutral() && self.0 != other.0
    }
}

/// Altitude class used to gate what can target what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Elevation {
    /// On the ground (infantry, vehicles, buildings).
    #[default]
    Ground,
    /// Low-flying (helicopters, drones).
    Low,
    /// High altitude (bombers, fighters).
    High,
}

impl Elevation {
    /// Collision layer used by the physics collaborator.
    #[must_use]
    pub const fn layer(self) -> u8 {
        match self {
            Self::Ground => 0,
            Self::Low => 1,
            Self::High => 2,
        }
    }

    /// Whether this elevation is airborne.
    #[must_use]
    pub const fn is_airborne(self) -> bool {
        !matches!(self, Self::Ground)
    }
}

/// Health with fractional precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Health {
    /// Current health points.
    pub current: Fixed,
    /// Maximum health points.
    pub max: Fixed,
}

impl Health {
    /// Create new health at full.
    #[must_use]
    pub const fn new(max: Fixed) -> Self {
        Self { current: max, max }
    }

    /// Check if the entity is dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current <= Fixed::ZERO
    }

    /// Check if the entity is at full health.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Apply damage, returning the amount actually removed.
    pub fn apply_damage(&mut self, amount: Fixed) -> Fixed {
        if amount <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }

    /// Heal, returning the amount actually restored.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        if amount <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let headroom = (self.max - self.current).max(Fixed::ZERO);
        let actual = amount.min(headroom);
        self.current += actual;
        actual
    }
}

/// Whether a unit engages enemies on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stance {
    /// Acquire and fire at any enemy in range.
    #[default]
    Aggressive,
    /// Only fire on explicit attack orders.
    Passive,
}

/// Standing order of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitOrder {
    /// Move to a point, then stop.
    MoveTo(Vec2Fixed),
    /// Close to weapon range of an entity and fire at it.
    Attack(EntityId),
    /// Fly back to a hangar to be housed.
    ReturnToBase(EntityId),
}

/// State shared by units and buildings.
#[derive(Debug, Clone)]
pub struct EntityCore {
    /// Entity identifier.
    pub id: EntityId,
    /// Static type id (unit or building data id).
    pub type_id: String,
    /// Owning player.
    pub owner: PlayerId,
    /// Owning team.
    pub team: Team,
    /// Logical position (synced from the physics body after each step).
    pub position: Vec2Fixed,
    /// Unit facing vector.
    pub facing: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// False once destroyed; inactive entities are swept at the end of the tick.
    pub active: bool,
    /// Altitude class.
    pub elevation: Elevation,
    /// Collision radius.
    pub radius: Fixed,
    /// Hidden from targeting unless detected.
    pub cloaked: bool,
    /// Weapon carried by the entity itself, if it can fight.
    pub weapon: Option<Weapon>,
    /// Sticky target of [`Self::weapon`].
    pub target: Option<EntityId>,
    /// Attached behavior modules.
    pub modules: Vec<Module>,
}

impl EntityCore {
    /// Create a core at full health, facing +X, with no modules.
    #[must_use]
    pub fn new(
        type_id: impl Into<String>,
        owner: PlayerId,
        team: Team,
        position: Vec2Fixed,
        max_health: Fixed,
        radius: Fixed,
    ) -> Self {
        Self {
            id: EntityId(0),
            type_id: type_id.into(),
            owner,
            team,
            position,
            facing: Vec2Fixed::UNIT_X,
            health: Health::new(max_health),
            active: true,
            elevation: Elevation::Ground,
            radius,
            cloaked: false,
            weapon: None,
            target: None,
            modules: Vec::new(),
        }
    }

    /// Turn to face a point.
    pub fn face(&mut self, point: Vec2Fixed) {
        self.facing = self.position.direction_to(point, self.facing);
    }

    /// First module matching a projection.
    pub fn module<'a, T>(&'a self, project: impl Fn(&'a Module) -> Option<&'a T>) -> Option<&'a T> {
        self.modules.iter().find_map(project)
    }

    /// First module matching a mutable projection.
    pub fn module_mut<'a, T>(
        &'a mut self,
        project: impl Fn(&'a mut Module) -> Option<&'a mut T>,
    ) -> Option<&'a mut T> {
        self.modules.iter_mut().find_map(project)
    }
}

/// A mobile entity.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Shared entity state.
    pub core: EntityCore,
    /// Role flags derived from data tags.
    pub roles: UnitRole,
    /// Movement speed in units per second.
    pub speed: Fixed,
    /// Engagement stance.
    pub stance: Stance,
    /// Standing order.
    pub order: Option<UnitOrder>,
    /// Building this unit is garrisoned in.
    pub garrisoned_in: Option<EntityId>,
    /// Hangar this aircraft is housed in.
    pub hangared_in: Option<EntityId>,
    /// Deployed into immobile mode.
    pub deployed: bool,
}

impl Unit {
    /// Create a unit from its core.
    #[must_use]
    pub fn new(core: EntityCore, roles: UnitRole, speed: Fixed) -> Self {
        Self {
            core,
            roles,
            speed,
            stance: Stance::Aggressive,
            order: None,
            garrisoned_in: None,
            hangared_in: None,
            deployed: false,
        }
    }

    /// Inside a building (garrison or hangar) rather than on the field.
    #[must_use]
    pub fn is_housed(&self) -> bool {
        self.garrisoned_in.is_some() || self.hangared_in.is_some()
    }

    /// Alive and on the field.
    #[must_use]
    pub fn is_on_field(&self) -> bool {
        self.core.active && !self.is_housed()
    }
}

/// A static entity.
#[derive(Debug, Clone)]
pub struct Building {
    /// Shared entity state.
    pub core: EntityCore,
    /// Still being built; most modules are paused.
    pub under_construction: bool,
    /// Construction time accumulated so far.
    pub construction_elapsed_ms: u64,
    /// Construction time required.
    pub build_time_ms: u64,
    /// Signed power: positive produces, negative consumes.
    pub power: i32,
    /// Tech tier contributed to its owner once complete.
    pub tier: u8,
    /// Remaining resources, for neutral deposits.
    pub reserve: Option<u32>,
    /// Data tags (e.g. "depot").
    pub tags: Vec<String>,
}

impl Building {
    /// Create a completed building.
    #[must_use]
    pub fn new(core: EntityCore, power: i32, tier: u8) -> Self {
        Self {
            core,
            under_construction: false,
            construction_elapsed_ms: 0,
            build_time_ms: 0,
            power,
            tier,
            reserve: None,
            tags: Vec::new(),
        }
    }

    /// Start the building under construction.
    #[must_use]
    pub fn with_construction(mut self, build_time_ms: u64) -> Self {
        self.under_construction = build_time_ms > 0;
        self.build_time_ms = build_time_ms;
        self
    }

    /// Give the building a resource reserve.
    #[must_use]
    pub fn with_reserve(mut self, reserve: u32) -> Self {
        self.reserve = Some(reserve);
        self
    }

    /// Attach data tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Check for a data tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Completed and alive.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.core.active && !self.under_construction
    }

    /// Whether this is a neutral resource deposit.
    #[must_use]
    pub fn is_deposit(&self) -> bool {
        self.reserve.is_some()
    }

    /// Advance construction; returns true exactly once, when it completes.
    pub fn advance_construction(&mut self, dt_ms: u64) -> bool {
        if !self.under_construction {
            return false;
        }
        self.construction_elapsed_ms = self.construction_elapsed_ms.saturating_add(dt_ms);
        if self.construction_elapsed_ms >= self.build_time_ms {
            self.under_construction = false;
            return true;
        }
        false
    }
}

//! Role flags for fast unit classification.
//!
//! Roles are derived once from a unit type's data tags and cached on each
//! live unit. Behavior modules use them to validate targets: only infantry
//! may garrison, medics heal infantry, engineers repair vehicles and
//! aircraft, hangars house aircraft.

use serde::{Deserialize, Serialize};

/// Bitflags for unit classification.
///
/// # Example
///
/// ```
/// use skirmish_core::roles::UnitRole;
///
/// let role = UnitRole::INFANTRY.union(UnitRole::HARVESTER);
/// assert!(role.contains(UnitRole::HARVESTER));
/// assert!(role.intersects(UnitRole::INFANTRY));
/// assert!(!role.contains(UnitRole::AIRCRAFT));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UnitRole(u32);

impl UnitRole {
    // ========================================
    // Body class
    // ========================================

    /// Foot soldier; may garrison and be healed.
    pub const INFANTRY: Self = Self(1 << 0);
    /// Wheeled or tracked; may be repaired.
    pub const VEHICLE: Self = Self(1 << 1);
    /// Flying unit; may be housed in a hangar and repaired.
    pub const AIRCRAFT: Self = Self(1 << 2);

    // ========================================
    // Special roles
    // ========================================

    /// Gathers resources.
    pub const HARVESTER: Self = Self(1 << 3);
    /// Heals or repairs others.
    pub const SUPPORT: Self = Self(1 << 4);
    /// Can attack (has a weapon).
    pub const COMBATANT: Self = Self(1 << 5);

    /// Roles whose hulls are repaired rather than healed.
    pub const MECHANICAL: Self = Self(Self::VEHICLE.0 | Self::AIRCRAFT.0);

    /// Empty role (no flags set).
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if all flags in `other` are set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any flags in `other` are set in `self`.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Combine two roles (union of flags).
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Get raw bits for hashing.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Build role flags from data tags.
    ///
    /// Called once per spawned unit. Unknown tags are ignored.
    #[must_use]
    pub fn from_tags(tags: &[String], has_weapon: bool) -> Self {
        let mut role = Self::empty();

        for tag in tags {
            let flag = match tag.as_str() {
                "infantry" => Self::INFANTRY,
                "vehicle" => Self::VEHICLE,
                "aircraft" | "air" => Self::AIRCRAFT,
                "harvester" => Self::HARVESTER,
                "support" | "medic" | "engineer" => Self::SUPPORT,
                _ => Self::empty(),
            };
            role = role.union(flag);
        }

        if has_weapon {
            role = role.union(Self::COMBATANT);
        }

        role
    }
}

impl std::ops::BitOr for UnitRole {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_unit_role_empty() {
        let role = UnitRole::empty();
        assert!(!role.intersects(UnitRole::INFANTRY));
        assert_eq!(role.bits(), 0);
    }

    #[test]
    fn test_unit_role_union_and_operator() {
        let role = UnitRole::INFANTRY | UnitRole::SUPPORT;
        assert!(role.contains(UnitRole::INFANTRY));
        assert!(role.contains(UnitRole::SUPPORT));
        assert!(!role.contains(UnitRole::VEHICLE));
    }

    #[test]
    fn test_mechanical_matches_vehicles_and_aircraft() {
        assert!(UnitRole::VEHICLE.intersects(UnitRole::MECHANICAL));
        assert!(UnitRole::AIRCRAFT.intersects(UnitRole::MECHANICAL));
        assert!(!UnitRole::INFANTRY.intersects(UnitRole::MECHANICAL));
    }

    #[test]
    fn test_from_tags() {
        let role = UnitRole::from_tags(&tags(&["infantry", "medic", "unknown"]), false);
        assert!(role.contains(UnitRole::INFANTRY | UnitRole::SUPPORT));
        assert!(!role.contains(UnitRole::COMBATANT));

        let gunship = UnitRole::from_tags(&tags(&["air"]), true);
        assert!(gunship.contains(UnitRole::AIRCRAFT | UnitRole::COMBATANT));
    }
}

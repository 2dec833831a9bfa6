//! Closed sets of resource, building and unit kinds.
//!
//! Each kind has a lowercase wire name (used by transports and logs) and a
//! `u8` storage code (used by the SpacetimeDB tables). Fixed cost tables hang
//! off the enums so an unsupported kind is a `match` arm, not a map miss.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EconomyError;
use crate::resources::Resources;

// ============================================================================
// RESOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ResourceKind {
    Wood = 0,
    Clay = 1,
    Iron = 2,
}

impl ResourceKind {
    pub fn all() -> &'static [ResourceKind] {
        &[Self::Wood, Self::Clay, Self::Iron]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wood => "wood",
            Self::Clay => "clay",
            Self::Iron => "iron",
        }
    }

    /// The building whose level drives this resource's production.
    pub fn producer(&self) -> BuildingType {
        match self {
            Self::Wood => BuildingType::Lumbermill,
            Self::Clay => BuildingType::Claypit,
            Self::Iron => BuildingType::Ironmine,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BUILDINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BuildingType {
    Townhall = 0,
    Lumbermill = 1,
    Claypit = 2,
    Ironmine = 3,
    Warehouse = 4,
    Barracks = 5,
}

impl BuildingType {
    pub fn all() -> &'static [BuildingType] {
        &[
            Self::Townhall,
            Self::Lumbermill,
            Self::Claypit,
            Self::Ironmine,
            Self::Warehouse,
            Self::Barracks,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Townhall => "townhall",
            Self::Lumbermill => "lumbermill",
            Self::Claypit => "claypit",
            Self::Ironmine => "ironmine",
            Self::Warehouse => "warehouse",
            Self::Barracks => "barracks",
        }
    }

    /// Cost of the level-1 tier; the upgrade curve scales from here.
    /// The townhall has no cost curve.
    pub fn base_cost(&self) -> Option<Resources> {
        match self {
            Self::Townhall => None,
            Self::Lumbermill | Self::Claypit | Self::Ironmine => {
                Some(Resources::new(50, 50, 20))
            }
            Self::Warehouse => Some(Resources::new(100, 60, 40)),
            Self::Barracks => Some(Resources::new(120, 100, 80)),
        }
    }

    /// The resource this building produces, if any.
    pub fn produces(&self) -> Option<ResourceKind> {
        match self {
            Self::Lumbermill => Some(ResourceKind::Wood),
            Self::Claypit => Some(ResourceKind::Clay),
            Self::Ironmine => Some(ResourceKind::Iron),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Option<BuildingType> {
        Self::all().iter().copied().find(|b| b.to_u8() == code)
    }
}

impl fmt::Display for BuildingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingType {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| EconomyError::InvalidBuildingType(s.to_string()))
    }
}

// ============================================================================
// UNITS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum UnitType {
    Spearman = 0,
    Swordsman = 1,
    Archer = 2,
}

impl UnitType {
    pub fn all() -> &'static [UnitType] {
        &[Self::Spearman, Self::Swordsman, Self::Archer]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spearman => "spearman",
            Self::Swordsman => "swordsman",
            Self::Archer => "archer",
        }
    }

    /// Fixed recruitment cost of a single unit.
    pub fn unit_cost(&self) -> Resources {
        match self {
            Self::Spearman => Resources::new(50, 30, 20),
            Self::Swordsman => Resources::new(30, 50, 40),
            Self::Archer => Resources::new(40, 40, 30),
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Option<UnitType> {
        Self::all().iter().copied().find(|u| u.to_u8() == code)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| EconomyError::InvalidUnitType(s.to_string()))
    }
}

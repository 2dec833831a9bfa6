//! Wood/clay/iron bundles used for stock, production and costs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kinds::ResourceKind;

/// A non-negative quantity of each resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    pub wood: u64,
    pub clay: u64,
    pub iron: u64,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        wood: 0,
        clay: 0,
        iron: 0,
    };

    pub const fn new(wood: u64, clay: u64, iron: u64) -> Self {
        Self { wood, clay, iron }
    }

    pub fn get(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Wood => self.wood,
            ResourceKind::Clay => self.clay,
            ResourceKind::Iron => self.iron,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut u64 {
        match kind {
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Clay => &mut self.clay,
            ResourceKind::Iron => &mut self.iron,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Component-wise sum, saturating at `u64::MAX`.
    pub fn saturating_add(&self, other: &Resources) -> Resources {
        Resources {
            wood: self.wood.saturating_add(other.wood),
            clay: self.clay.saturating_add(other.clay),
            iron: self.iron.saturating_add(other.iron),
        }
    }

    /// Every component multiplied by `factor`, saturating.
    pub fn saturating_mul(&self, factor: u64) -> Resources {
        Resources {
            wood: self.wood.saturating_mul(factor),
            clay: self.clay.saturating_mul(factor),
            iron: self.iron.saturating_mul(factor),
        }
    }

    /// How much of `cost` this bundle cannot cover, per kind.
    /// All-zero when `cost` is fully affordable.
    pub fn shortfall(&self, cost: &Resources) -> Resources {
        Resources {
            wood: cost.wood.saturating_sub(self.wood),
            clay: cost.clay.saturating_sub(self.clay),
            iron: cost.iron.saturating_sub(self.iron),
        }
    }

    pub fn covers(&self, cost: &Resources) -> bool {
        self.shortfall(cost).is_zero()
    }

    /// Subtract `cost` from every kind, or nothing at all if any kind is short.
    pub fn checked_sub(&self, cost: &Resources) -> Option<Resources> {
        Some(Resources {
            wood: self.wood.checked_sub(cost.wood)?,
            clay: self.clay.checked_sub(cost.clay)?,
            iron: self.iron.checked_sub(cost.iron)?,
        })
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wood {}, clay {}, iron {}",
            self.wood, self.clay, self.iron
        )
    }
}

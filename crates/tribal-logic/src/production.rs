//! Pure production logic: resources accrued from building levels over time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kinds::{BuildingType, ResourceKind};
use crate::resources::Resources;

/// Units produced per building level per whole minute.
pub const DEFAULT_PRODUCTION_PER_LEVEL: u64 = 5;

/// Building levels of one village. A missing row reads as level 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingLevels(BTreeMap<BuildingType, u32>);

impl BuildingLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every building type at `level`.
    pub fn uniform(level: u32) -> Self {
        BuildingType::all().iter().map(|b| (*b, level)).collect()
    }

    /// Level of `building`, or `None` if the village has no such row.
    pub fn get(&self, building: BuildingType) -> Option<u32> {
        self.0.get(&building).copied()
    }

    pub fn level_or_zero(&self, building: BuildingType) -> u32 {
        self.get(building).unwrap_or(0)
    }

    pub fn set(&mut self, building: BuildingType, level: u32) {
        self.0.insert(building, level);
    }

    pub fn remove(&mut self, building: BuildingType) -> Option<u32> {
        self.0.remove(&building)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildingType, u32)> + '_ {
        self.0.iter().map(|(b, l)| (*b, *l))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(BuildingType, u32)> for BuildingLevels {
    fn from_iter<I: IntoIterator<Item = (BuildingType, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Quantity one production building yields over `elapsed_minutes`.
pub fn accrued_since(elapsed_minutes: u64, building_level: u32, per_level: u64) -> u64 {
    per_level
        .saturating_mul(building_level as u64)
        .saturating_mul(elapsed_minutes)
}

/// Per-minute output of a village, all three resources.
pub fn production_rate(levels: &BuildingLevels, per_level: u64) -> Resources {
    production_over(levels, 1, per_level)
}

/// Resources produced by every production building over `elapsed_minutes`.
/// Buildings without a row contribute nothing.
pub fn production_over(levels: &BuildingLevels, elapsed_minutes: u64, per_level: u64) -> Resources {
    let mut out = Resources::ZERO;
    for kind in ResourceKind::all() {
        let level = levels.level_or_zero(kind.producer());
        *out.get_mut(*kind) = accrued_since(elapsed_minutes, level, per_level);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accrual_arithmetic() {
        assert_eq!(accrued_since(10, 3, DEFAULT_PRODUCTION_PER_LEVEL), 150);
        assert_eq!(accrued_since(0, 3, DEFAULT_PRODUCTION_PER_LEVEL), 0);
        assert_eq!(accrued_since(10, 0, DEFAULT_PRODUCTION_PER_LEVEL), 0);
    }

    #[test]
    fn test_production_per_building() {
        let levels: BuildingLevels = [
            (BuildingType::Lumbermill, 3),
            (BuildingType::Claypit, 1),
            (BuildingType::Ironmine, 2),
            (BuildingType::Townhall, 20),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            production_over(&levels, 10, DEFAULT_PRODUCTION_PER_LEVEL),
            Resources::new(150, 50, 100)
        );
    }

    #[test]
    fn test_missing_building_yields_nothing() {
        let levels: BuildingLevels = [(BuildingType::Lumbermill, 2)].into_iter().collect();
        let out = production_over(&levels, 5, DEFAULT_PRODUCTION_PER_LEVEL);
        assert_eq!(out, Resources::new(50, 0, 0));
    }

    #[test]
    fn test_rate_is_one_minute() {
        let levels = BuildingLevels::uniform(1);
        assert_eq!(
            production_rate(&levels, DEFAULT_PRODUCTION_PER_LEVEL),
            Resources::new(5, 5, 5)
        );
    }

    #[test]
    fn test_huge_elapsed_saturates() {
        assert_eq!(accrued_since(u64::MAX, 10, 5), u64::MAX);
    }
}

//! Pure cost logic: building upgrade curve and unit recruitment.
//!
//! The upgrade curve is `base * 2.5^(n-1)` per resource, truncated toward
//! zero. It is evaluated as `base * 5^(n-1) / 2^(n-1)` in integers so no
//! float rounding creeps in at high levels.

use crate::kinds::{BuildingType, UnitType};
use crate::resources::Resources;

/// Growth ratio of the upgrade curve, as numerator / denominator.
pub const UPGRADE_GROWTH: (u128, u128) = (5, 2);

/// Cost for `building` to reach `target_level`. `None` if the building has
/// no cost curve. Level 1 (and 0) cost exactly the base.
pub fn upgrade_cost(building: BuildingType, target_level: u32) -> Option<Resources> {
    let base = building.base_cost()?;
    let steps = target_level.saturating_sub(1);
    Some(Resources {
        wood: scale(base.wood, steps),
        clay: scale(base.clay, steps),
        iron: scale(base.iron, steps),
    })
}

/// `value * 2.5^steps`, truncated, saturating at `u64::MAX`.
fn scale(value: u64, steps: u32) -> u64 {
    if value == 0 {
        return 0;
    }
    let (num, den) = UPGRADE_GROWTH;
    let mut numerator = value as u128;
    let mut denominator: u128 = 1;
    for _ in 0..steps {
        // Once the numerator leaves u128 the quotient is far beyond u64.
        match (numerator.checked_mul(num), denominator.checked_mul(den)) {
            (Some(n), Some(d)) => {
                numerator = n;
                denominator = d;
            }
            _ => return u64::MAX,
        }
    }
    u64::try_from(numerator / denominator).unwrap_or(u64::MAX)
}

/// Total cost of recruiting `count` units of `unit`. Zero count costs nothing.
pub fn recruitment_cost(unit: UnitType, count: u64) -> Resources {
    unit.unit_cost().saturating_mul(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_one_is_base() {
        for b in BuildingType::all() {
            assert_eq!(upgrade_cost(*b, 1), b.base_cost());
        }
    }

    #[test]
    fn test_known_curve_points() {
        // 50 * 2.5 = 125, 20 * 2.5 = 50
        assert_eq!(
            upgrade_cost(BuildingType::Lumbermill, 2),
            Some(Resources::new(125, 125, 50))
        );
        // 50 * 6.25 = 312.5 -> 312, 20 * 6.25 = 125
        assert_eq!(
            upgrade_cost(BuildingType::Lumbermill, 3),
            Some(Resources::new(312, 312, 125))
        );
        // 120 * 15.625 = 1875, 100 * 15.625 = 1562.5, 80 * 15.625 = 1250
        assert_eq!(
            upgrade_cost(BuildingType::Barracks, 4),
            Some(Resources::new(1875, 1562, 1250))
        );
    }

    #[test]
    fn test_townhall_unsupported() {
        assert_eq!(upgrade_cost(BuildingType::Townhall, 2), None);
    }

    #[test]
    fn test_monotonic_growth() {
        for b in BuildingType::all() {
            if b.base_cost().is_none() {
                continue;
            }
            for n in 1..40 {
                let now = upgrade_cost(*b, n).unwrap();
                let next = upgrade_cost(*b, n + 1).unwrap();
                assert!(next.wood > now.wood, "{b} wood at {n}");
                assert!(next.clay > now.clay, "{b} clay at {n}");
                assert!(next.iron > now.iron, "{b} iron at {n}");
            }
        }
    }

    #[test]
    fn test_extreme_levels_saturate() {
        let cost = upgrade_cost(BuildingType::Barracks, 500).unwrap();
        assert_eq!(cost.wood, u64::MAX);
    }

    #[test]
    fn test_recruitment_is_linear() {
        assert_eq!(
            recruitment_cost(UnitType::Spearman, 100),
            Resources::new(5000, 3000, 2000)
        );
        assert_eq!(recruitment_cost(UnitType::Archer, 0), Resources::ZERO);
    }
}

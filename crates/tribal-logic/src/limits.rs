//! Village cap derived from the owner's best townhall.
//!
//! The cap uses the single highest townhall level across all of the owner's
//! villages, not a per-village rule.

use serde::{Deserialize, Serialize};

use crate::error::EconomyError;

pub const DEFAULT_TOWNHALL_LEVELS_PER_VILLAGE: u32 = 10;

/// Aggregate the cap is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub village_count: u32,
    /// 0 when the owner has no villages.
    pub highest_townhall: u32,
}

/// `floor(highest_townhall / levels_per_village) + 1`.
pub fn max_villages(highest_townhall: u32, levels_per_village: u32) -> u32 {
    (highest_townhall / levels_per_village.max(1)).saturating_add(1)
}

/// Returns the computed limit when one more village is allowed.
pub fn check_village_limit(
    summary: &OwnerSummary,
    levels_per_village: u32,
) -> Result<u32, EconomyError> {
    let limit = max_villages(summary.highest_townhall, levels_per_village);
    if summary.village_count < limit {
        Ok(limit)
    } else {
        Err(EconomyError::VillageLimitExceeded {
            limit,
            current: summary.village_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_villages_steps() {
        assert_eq!(max_villages(0, 10), 1);
        assert_eq!(max_villages(9, 10), 1);
        assert_eq!(max_villages(10, 10), 2);
        assert_eq!(max_villages(17, 10), 2);
        assert_eq!(max_villages(30, 10), 4);
    }

    #[test]
    fn test_townhall_17_caps_at_two() {
        let one = OwnerSummary {
            village_count: 1,
            highest_townhall: 17,
        };
        assert_eq!(check_village_limit(&one, 10), Ok(2));

        let two = OwnerSummary {
            village_count: 2,
            highest_townhall: 17,
        };
        assert_eq!(
            check_village_limit(&two, 10),
            Err(EconomyError::VillageLimitExceeded {
                limit: 2,
                current: 2
            })
        );
    }

    #[test]
    fn test_new_owner_gets_one() {
        assert_eq!(check_village_limit(&OwnerSummary::default(), 10), Ok(1));
    }
}

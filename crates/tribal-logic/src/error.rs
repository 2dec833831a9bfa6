//! Typed failures for every economy action.
//!
//! Validation errors are raised before any repository access. Affordability
//! errors abort the surrounding unit of work with no side effects.

use thiserror::Error;

use crate::kinds::{BuildingType, UnitType};
use crate::repository::VillageId;
use crate::resources::Resources;

/// Failure of a durability-layer operation. Always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("repository lock poisoned")]
    Poisoned,
    #[error("village {0} is outside the current unit of work")]
    OutOfScope(VillageId),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EconomyError {
    #[error("village {0} not found")]
    VillageNotFound(VillageId),
    /// Covers both "no such village" and "not yours" so existence never leaks.
    #[error("village not found or not yours")]
    Forbidden,
    #[error("building {0} not found in village")]
    BuildingNotFound(BuildingType),
    #[error("building {0} has no upgrade cost")]
    UnsupportedBuilding(BuildingType),
    #[error("invalid building type: {0}")]
    InvalidBuildingType(String),
    #[error("invalid unit type: {0}")]
    InvalidUnitType(String),
    #[error("invalid unit count: {0}")]
    InvalidCount(i64),
    #[error("invalid village name: {0}")]
    InvalidName(String),
    #[error("not enough resources (short by {shortfall})")]
    InsufficientResources { shortfall: Resources },
    #[error(
        "you need a higher townhall level to create more villages (current max: {limit}, owned: {current})"
    )]
    VillageLimitExceeded { limit: u32, current: u32 },
    #[error("repository failure: {0}")]
    RepositoryFailure(#[from] RepositoryError),
}

impl EconomyError {
    /// Rejections caused by the caller's input or game state, as opposed to
    /// storage faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::RepositoryFailure(_) | Self::VillageNotFound(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse economy config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("townhall_levels_per_village must be at least 1")]
    ZeroTownhallDivisor,
    #[error("max_village_name_len must be at least 1")]
    ZeroNameLength,
    #[error("starting_village_name is not a valid village name")]
    InvalidStartingName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_convert() {
        let err: EconomyError = RepositoryError::Poisoned.into();
        assert_eq!(err, EconomyError::RepositoryFailure(RepositoryError::Poisoned));
        assert!(!err.is_rejection());
    }

    #[test]
    fn limit_message_carries_limit() {
        let err = EconomyError::VillageLimitExceeded {
            limit: 2,
            current: 2,
        };
        assert!(err.to_string().contains("current max: 2"));
        assert!(err.is_rejection());
    }

    #[test]
    fn shortfall_in_message() {
        let err = EconomyError::InsufficientResources {
            shortfall: Resources::new(0, 0, 1000),
        };
        assert_eq!(
            err.to_string(),
            "not enough resources (short by wood 0, clay 0, iron 1000)"
        );
    }
}

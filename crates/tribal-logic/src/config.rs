//! Tunable economy parameters.
//!
//! Cost tables are fixed on the kind enums; everything a server operator may
//! want to rebalance lives here and can be loaded from JSON.
//!
//! ```
//! use tribal_logic::config::EconomyConfig;
//!
//! let config = EconomyConfig::from_json(r#"{ "production_per_level": 8 }"#).unwrap();
//! assert_eq!(config.production_per_level, 8);
//! assert_eq!(config.townhall_levels_per_village, 10);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::limits::DEFAULT_TOWNHALL_LEVELS_PER_VILLAGE;
use crate::production::DEFAULT_PRODUCTION_PER_LEVEL;
use crate::resources::Resources;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Units per building level per whole minute.
    pub production_per_level: u64,
    /// Stock every new village starts with.
    pub starting_resources: Resources,
    /// Spearmen granted to an owner's very first village.
    pub starter_spearmen: u64,
    /// Townhall levels needed per additional village.
    pub townhall_levels_per_village: u32,
    /// Name of the village founded for a brand-new owner.
    pub starting_village_name: String,
    /// Maximum village name length, in characters.
    pub max_village_name_len: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            production_per_level: DEFAULT_PRODUCTION_PER_LEVEL,
            starting_resources: Resources::new(100, 100, 100),
            starter_spearmen: 5,
            townhall_levels_per_village: DEFAULT_TOWNHALL_LEVELS_PER_VILLAGE,
            starting_village_name: "Starting Village".to_string(),
            max_village_name_len: 64,
        }
    }
}

impl EconomyConfig {
    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EconomyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.townhall_levels_per_village == 0 {
            return Err(ConfigError::ZeroTownhallDivisor);
        }
        if self.max_village_name_len == 0 {
            return Err(ConfigError::ZeroNameLength);
        }
        let name = self.starting_village_name.trim();
        if name.is_empty() || name.chars().count() > self.max_village_name_len {
            return Err(ConfigError::InvalidStartingName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EconomyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EconomyConfig::from_json(
            r#"{ "starting_resources": { "wood": 500, "clay": 400, "iron": 300 } }"#,
        )
        .unwrap();
        assert_eq!(config.starting_resources, Resources::new(500, 400, 300));
        assert_eq!(config.production_per_level, 5);
        assert_eq!(config.starter_spearmen, 5);
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let err = EconomyConfig::from_json(r#"{ "townhall_levels_per_village": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTownhallDivisor));
    }

    #[test]
    fn test_blank_starting_name_rejected() {
        let err = EconomyConfig::from_json(r#"{ "starting_village_name": "  " }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStartingName));
    }

    #[test]
    fn test_malformed_json() {
        let err = EconomyConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

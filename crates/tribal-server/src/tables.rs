//! SpacetimeDB table definitions for the village economy.
//!
//! Building and unit kinds are stored as their `u8` codes from
//! `tribal_logic::kinds`.

use spacetimedb::{table, Timestamp};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Economy tuning singleton (id always 0), stored as `EconomyConfig` JSON.
#[table(name = economy_settings)]
#[derive(Clone)]
pub struct EconomySettings {
    #[primary_key]
    pub id: u32,
    pub config_json: String,
}

// ============================================================================
// VILLAGES
// ============================================================================

#[table(name = village, public)]
#[derive(Clone)]
pub struct Village {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    /// Owner identity, hex encoded.
    pub owner: String,
    pub name: String,
    pub created_at: Timestamp,
}

/// Stored stock of one village, valid as of `last_accrued_at`.
#[table(name = resource_stock, public)]
#[derive(Clone)]
pub struct ResourceStock {
    #[primary_key]
    pub village_id: u64,
    pub wood: u64,
    pub clay: u64,
    pub iron: u64,
    pub last_accrued_at: Timestamp,
}

#[table(name = building, public)]
#[derive(Clone)]
pub struct Building {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub village_id: u64,
    pub building_type: u8, // BuildingType as u8
    pub level: u32,
}

#[table(name = unit_stock, public)]
#[derive(Clone)]
pub struct UnitStock {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub village_id: u64,
    pub unit_type: u8, // UnitType as u8
    pub count: u64,
}

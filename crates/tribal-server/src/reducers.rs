//! Client-facing reducers, one economy action each.
//!
//! A reducer that returns `Err` is rolled back by the host, so a rejected
//! action leaves no partial writes behind.

use crate::repository::{ReducerClock, ReducerRepository};
use crate::tables::*;
use spacetimedb::{reducer, ReducerContext, Table};
use tribal_logic::config::EconomyConfig;
use tribal_logic::kinds::{BuildingType, UnitType};
use tribal_logic::repository::{OwnerId, VillageId};
use tribal_logic::{EconomyError, EconomyService};

type Service<'a> = EconomyService<ReducerRepository<'a>, ReducerClock>;

const SETTINGS_ID: u32 = 0;

fn owner_of(ctx: &ReducerContext) -> OwnerId {
    OwnerId::new(ctx.sender.to_hex().to_string())
}

/// Stored tuning, or the defaults if the row is missing or unreadable.
fn load_config(ctx: &ReducerContext) -> EconomyConfig {
    let Some(row) = ctx.db.economy_settings().id().find(SETTINGS_ID) else {
        return EconomyConfig::default();
    };
    match EconomyConfig::from_json(&row.config_json) {
        Ok(config) => config,
        Err(err) => {
            log::error!("Stored economy config is invalid, using defaults: {err}");
            EconomyConfig::default()
        }
    }
}

fn service(ctx: &ReducerContext) -> Service<'_> {
    EconomyService::new(
        ReducerRepository::new(ctx),
        ReducerClock::of(ctx),
        load_config(ctx),
    )
}

fn reject(err: EconomyError) -> String {
    err.to_string()
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[reducer(init)]
pub fn init(ctx: &ReducerContext) -> Result<(), String> {
    let config = EconomyConfig::default();
    let config_json = serde_json::to_string(&config).map_err(|e| e.to_string())?;
    ctx.db.economy_settings().insert(EconomySettings {
        id: SETTINGS_ID,
        config_json,
    });
    log::info!(
        "Economy initialised: {} per level per minute, one village per {} townhall levels",
        config.production_per_level,
        config.townhall_levels_per_village
    );
    Ok(())
}

/// A first connection founds the owner's starting village.
#[reducer(client_connected)]
pub fn client_connected(ctx: &ReducerContext) -> Result<(), String> {
    let owner = owner_of(ctx);
    log::info!("Client connected: {owner}");
    service(ctx)
        .found_starting_village(&owner)
        .map(|_| ())
        .map_err(reject)
}

// ============================================================================
// VILLAGES
// ============================================================================

#[reducer]
pub fn create_village(ctx: &ReducerContext, name: String) -> Result<(), String> {
    service(ctx)
        .create_village(&owner_of(ctx), &name)
        .map(|_| ())
        .map_err(reject)
}

#[reducer]
pub fn rename_village(ctx: &ReducerContext, village_id: u64, name: String) -> Result<(), String> {
    service(ctx)
        .rename_village(&owner_of(ctx), VillageId(village_id), &name)
        .map(|_| ())
        .map_err(reject)
}

#[reducer]
pub fn delete_village(ctx: &ReducerContext, village_id: u64) -> Result<(), String> {
    service(ctx)
        .delete_village(&owner_of(ctx), VillageId(village_id))
        .map_err(reject)
}

// ============================================================================
// ECONOMY
// ============================================================================

/// Bring the stored stock up to date so subscribers see current amounts.
#[reducer]
pub fn refresh_resources(ctx: &ReducerContext, village_id: u64) -> Result<(), String> {
    service(ctx)
        .get_resources(&owner_of(ctx), VillageId(village_id))
        .map(|_| ())
        .map_err(reject)
}

#[reducer]
pub fn upgrade_building(ctx: &ReducerContext, village_id: u64, building: String) -> Result<(), String> {
    let building: BuildingType = building.parse().map_err(reject)?;
    service(ctx)
        .upgrade_building(&owner_of(ctx), VillageId(village_id), building)
        .map(|_| ())
        .map_err(reject)
}

#[reducer]
pub fn recruit_units(
    ctx: &ReducerContext,
    village_id: u64,
    unit: String,
    count: i64,
) -> Result<(), String> {
    let unit: UnitType = unit.parse().map_err(reject)?;
    service(ctx)
        .recruit_units(&owner_of(ctx), VillageId(village_id), unit, count)
        .map(|_| ())
        .map_err(reject)
}

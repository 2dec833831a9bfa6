//! `tribal_logic` storage contract over the module's tables.
//!
//! A reducer already runs as one serializable transaction and is rolled back
//! when it returns `Err`, so a unit of work here is simply the reducer's view
//! of the database. Scopes need no extra locking.

use spacetimedb::{ReducerContext, Table};
use tribal_logic::clock::{Clock, Timestamp};
use tribal_logic::error::{EconomyError, RepositoryError};
use tribal_logic::kinds::{BuildingType, UnitType};
use tribal_logic::ledger::ResourceStock as Stock;
use tribal_logic::limits::OwnerSummary;
use tribal_logic::production::BuildingLevels;
use tribal_logic::repository::{
    self as logic, NewVillage, OwnerId, Repository, Scope, UnitCounts, UnitOfWork, VillageId,
};
use tribal_logic::resources::Resources;

use crate::tables::*;

fn to_logic_time(ts: spacetimedb::Timestamp) -> Timestamp {
    Timestamp::from_micros(ts.to_micros_since_unix_epoch())
}

fn to_db_time(ts: Timestamp) -> spacetimedb::Timestamp {
    spacetimedb::Timestamp::from_micros_since_unix_epoch(ts.as_micros())
}

/// Time is fixed for the whole reducer call.
pub struct ReducerClock(Timestamp);

impl ReducerClock {
    pub fn of(ctx: &ReducerContext) -> Self {
        Self(to_logic_time(ctx.timestamp))
    }
}

impl Clock for ReducerClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

pub struct ReducerRepository<'a> {
    ctx: &'a ReducerContext,
}

impl<'a> ReducerRepository<'a> {
    pub fn new(ctx: &'a ReducerContext) -> Self {
        Self { ctx }
    }
}

impl Repository for ReducerRepository<'_> {
    fn transaction<T, F>(&self, _scope: Scope<'_>, work: F) -> Result<T, EconomyError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, EconomyError>,
    {
        let mut tx = ReducerTx { ctx: self.ctx };
        work(&mut tx)
    }
}

struct ReducerTx<'a> {
    ctx: &'a ReducerContext,
}

impl ReducerTx<'_> {
    fn owned(&self, owner: &OwnerId) -> Vec<Village> {
        let mut rows: Vec<Village> = self
            .ctx
            .db
            .village()
            .iter()
            .filter(|v| v.owner == owner.as_str())
            .collect();
        rows.sort_by_key(|v| v.id);
        rows
    }

    fn building_row(&self, village: VillageId, building: BuildingType) -> Option<Building> {
        let code = building.to_u8();
        self.ctx
            .db
            .building()
            .village_id()
            .filter(&village.0)
            .find(|b| b.building_type == code)
    }

    fn unit_row(&self, village: VillageId, unit: UnitType) -> Option<UnitStock> {
        let code = unit.to_u8();
        self.ctx
            .db
            .unit_stock()
            .village_id()
            .filter(&village.0)
            .find(|u| u.unit_type == code)
    }
}

fn to_logic_village(row: Village) -> logic::Village {
    logic::Village {
        id: VillageId(row.id),
        owner: OwnerId(row.owner),
        name: row.name,
        created_at: to_logic_time(row.created_at),
    }
}

fn missing(what: &str, village: VillageId) -> RepositoryError {
    RepositoryError::Backend(format!("no {what} row for village {village}"))
}

impl UnitOfWork for ReducerTx<'_> {
    fn owns_village(
        &mut self,
        owner: &OwnerId,
        village: VillageId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .ctx
            .db
            .village()
            .id()
            .find(village.0)
            .is_some_and(|v| v.owner == owner.as_str()))
    }

    fn village(&mut self, village: VillageId) -> Result<Option<logic::Village>, RepositoryError> {
        Ok(self.ctx.db.village().id().find(village.0).map(to_logic_village))
    }

    fn villages_of(&mut self, owner: &OwnerId) -> Result<Vec<logic::Village>, RepositoryError> {
        Ok(self.owned(owner).into_iter().map(to_logic_village).collect())
    }

    fn owner_summary(&mut self, owner: &OwnerId) -> Result<OwnerSummary, RepositoryError> {
        let villages = self.owned(owner);
        let highest_townhall = villages
            .iter()
            .filter_map(|v| self.building_row(VillageId(v.id), BuildingType::Townhall))
            .map(|b| b.level)
            .max()
            .unwrap_or(0);
        Ok(OwnerSummary {
            village_count: villages.len() as u32,
            highest_townhall,
        })
    }

    fn load_stock(&mut self, village: VillageId) -> Result<Option<Stock>, RepositoryError> {
        Ok(self
            .ctx
            .db
            .resource_stock()
            .village_id()
            .find(village.0)
            .map(|row| Stock {
                resources: Resources::new(row.wood, row.clay, row.iron),
                last_accrued_at: to_logic_time(row.last_accrued_at),
            }))
    }

    fn store_stock(&mut self, village: VillageId, stock: &Stock) -> Result<(), RepositoryError> {
        let table = self.ctx.db.resource_stock();
        if table.village_id().find(village.0).is_none() {
            return Err(missing("resource stock", village));
        }
        table.village_id().update(ResourceStock {
            village_id: village.0,
            wood: stock.resources.wood,
            clay: stock.resources.clay,
            iron: stock.resources.iron,
            last_accrued_at: to_db_time(stock.last_accrued_at),
        });
        Ok(())
    }

    fn building_levels(&mut self, village: VillageId) -> Result<BuildingLevels, RepositoryError> {
        Ok(self
            .ctx
            .db
            .building()
            .village_id()
            .filter(&village.0)
            .filter_map(|b| BuildingType::from_u8(b.building_type).map(|t| (t, b.level)))
            .collect())
    }

    fn increment_building(
        &mut self,
        village: VillageId,
        building: BuildingType,
    ) -> Result<Option<u32>, RepositoryError> {
        let Some(mut row) = self.building_row(village, building) else {
            return Ok(None);
        };
        row.level = row.level.saturating_add(1);
        let level = row.level;
        self.ctx.db.building().id().update(row);
        Ok(Some(level))
    }

    fn unit_counts(&mut self, village: VillageId) -> Result<UnitCounts, RepositoryError> {
        Ok(self
            .ctx
            .db
            .unit_stock()
            .village_id()
            .filter(&village.0)
            .filter_map(|u| UnitType::from_u8(u.unit_type).map(|t| (t, u.count)))
            .collect())
    }

    fn add_units(
        &mut self,
        village: VillageId,
        unit: UnitType,
        count: u64,
    ) -> Result<u64, RepositoryError> {
        match self.unit_row(village, unit) {
            Some(mut row) => {
                row.count = row.count.saturating_add(count);
                let total = row.count;
                self.ctx.db.unit_stock().id().update(row);
                Ok(total)
            }
            None => {
                self.ctx.db.unit_stock().insert(UnitStock {
                    id: 0,
                    village_id: village.0,
                    unit_type: unit.to_u8(),
                    count,
                });
                Ok(count)
            }
        }
    }

    fn insert_village(&mut self, new: NewVillage) -> Result<logic::Village, RepositoryError> {
        let row = self.ctx.db.village().insert(Village {
            id: 0,
            owner: new.owner.0,
            name: new.name,
            created_at: to_db_time(new.created_at),
        });
        self.ctx.db.resource_stock().insert(ResourceStock {
            village_id: row.id,
            wood: new.stock.resources.wood,
            clay: new.stock.resources.clay,
            iron: new.stock.resources.iron,
            last_accrued_at: to_db_time(new.stock.last_accrued_at),
        });
        for (building, level) in new.buildings.iter() {
            self.ctx.db.building().insert(Building {
                id: 0,
                village_id: row.id,
                building_type: building.to_u8(),
                level,
            });
        }
        for (unit, count) in new.units.iter() {
            self.ctx.db.unit_stock().insert(UnitStock {
                id: 0,
                village_id: row.id,
                unit_type: unit.to_u8(),
                count,
            });
        }
        Ok(to_logic_village(row))
    }

    fn rename_village(&mut self, village: VillageId, name: &str) -> Result<(), RepositoryError> {
        let Some(mut row) = self.ctx.db.village().id().find(village.0) else {
            return Err(missing("village", village));
        };
        row.name = name.to_string();
        self.ctx.db.village().id().update(row);
        Ok(())
    }

    fn delete_village(&mut self, village: VillageId) -> Result<(), RepositoryError> {
        let buildings: Vec<u64> = self
            .ctx
            .db
            .building()
            .village_id()
            .filter(&village.0)
            .map(|b| b.id)
            .collect();
        for id in buildings {
            self.ctx.db.building().id().delete(id);
        }
        let units: Vec<u64> = self
            .ctx
            .db
            .unit_stock()
            .village_id()
            .filter(&village.0)
            .map(|u| u.id)
            .collect();
        for id in units {
            self.ctx.db.unit_stock().id().delete(id);
        }
        self.ctx.db.resource_stock().village_id().delete(village.0);
        if !self.ctx.db.village().id().delete(village.0) {
            return Err(missing("village", village));
        }
        Ok(())
    }
}

//! Game actions over a [`Repository`].
//!
//! Every action runs as exactly one unit of work. Village actions lock the
//! village; founding and listing lock the owner. Input validation happens
//! before the repository is touched, so a rejected request never opens a
//! transaction.

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock, Timestamp};
use crate::config::EconomyConfig;
use crate::costs::{recruitment_cost, upgrade_cost};
use crate::error::EconomyError;
use crate::kinds::{BuildingType, UnitType};
use crate::ledger::{ResourceLedger, ResourceStock};
use crate::limits::check_village_limit;
use crate::production::{production_rate, BuildingLevels};
use crate::repository::{
    NewVillage, OwnerId, Repository, Scope, UnitCounts, UnitOfWork, Village, VillageId,
};
use crate::resources::Resources;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub village: VillageId,
    pub resources: Resources,
    pub last_accrued_at: Timestamp,
    /// Output per whole minute at current building levels.
    pub production_per_minute: Resources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingEntry {
    pub building: BuildingType,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeQuote {
    pub building: BuildingType,
    pub current_level: u32,
    pub next_level: u32,
    pub cost: Resources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeReceipt {
    pub building: BuildingType,
    pub new_level: u32,
    pub cost_paid: Resources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub unit: UnitType,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruitReceipt {
    pub unit: UnitType,
    pub recruited: u64,
    pub new_count: u64,
    pub cost_paid: Resources,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageCreated {
    pub village: Village,
    /// Village cap at the time of founding.
    pub limit: u32,
    /// Villages owned including the new one.
    pub current: u32,
}

pub struct EconomyService<R, C = SystemClock> {
    repo: R,
    clock: C,
    config: EconomyConfig,
}

impl<R: Repository, C: Clock> EconomyService<R, C> {
    pub fn new(repo: R, clock: C, config: EconomyConfig) -> Self {
        Self {
            repo,
            clock,
            config,
        }
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Accrue and return the current stock. The accrual is persisted.
    pub fn get_resources(
        &self,
        owner: &OwnerId,
        village: VillageId,
    ) -> Result<ResourceReport, EconomyError> {
        let now = self.clock.now();
        let per_level = self.config.production_per_level;
        self.repo.transaction(Scope::Village(village), |tx| {
            authorize(tx, owner, village)?;
            let ledger = ResourceLedger::open(tx, village, now, per_level)?;
            let production_per_minute = production_rate(ledger.levels(), per_level);
            let stock = ledger.commit(tx)?;
            Ok(ResourceReport {
                village,
                resources: stock.resources,
                last_accrued_at: stock.last_accrued_at,
                production_per_minute,
            })
        })
    }

    // ------------------------------------------------------------------
    // Buildings
    // ------------------------------------------------------------------

    pub fn list_buildings(
        &self,
        owner: &OwnerId,
        village: VillageId,
    ) -> Result<Vec<BuildingEntry>, EconomyError> {
        let now = self.clock.now();
        self.village_read(owner, village, now, |_, ledger| {
            Ok(ledger
                .levels()
                .iter()
                .map(|(building, level)| BuildingEntry { building, level })
                .collect())
        })
    }

    pub fn get_upgrade_cost(
        &self,
        owner: &OwnerId,
        village: VillageId,
        building: BuildingType,
    ) -> Result<UpgradeQuote, EconomyError> {
        self.repo.transaction(Scope::Village(village), |tx| {
            authorize(tx, owner, village)?;
            let levels = tx.building_levels(village)?;
            quote(&levels, building)
        })
    }

    /// Pay for and apply one level of `building`.
    pub fn upgrade_building(
        &self,
        owner: &OwnerId,
        village: VillageId,
        building: BuildingType,
    ) -> Result<UpgradeReceipt, EconomyError> {
        let now = self.clock.now();
        let per_level = self.config.production_per_level;
        let result = self.repo.transaction(Scope::Village(village), |tx| {
            authorize(tx, owner, village)?;
            let mut ledger = ResourceLedger::open(tx, village, now, per_level)?;
            let offer = quote(ledger.levels(), building)?;
            ledger.try_debit(&offer.cost)?;
            ledger.commit(tx)?;
            let new_level = tx
                .increment_building(village, building)?
                .ok_or(EconomyError::BuildingNotFound(building))?;
            Ok(UpgradeReceipt {
                building,
                new_level,
                cost_paid: offer.cost,
            })
        });
        match &result {
            Ok(receipt) => log::info!(
                "{owner} upgraded {building} in village {village} to level {}",
                receipt.new_level
            ),
            Err(err) => log_rejection(owner, "upgrade", village, err),
        }
        result
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    pub fn list_units(
        &self,
        owner: &OwnerId,
        village: VillageId,
    ) -> Result<Vec<UnitEntry>, EconomyError> {
        let now = self.clock.now();
        self.village_read(owner, village, now, |tx, _| {
            Ok(tx
                .unit_counts(village)?
                .iter()
                .map(|(unit, count)| UnitEntry { unit, count })
                .collect())
        })
    }

    /// Pay for and add `count` units. `count` must be positive.
    pub fn recruit_units(
        &self,
        owner: &OwnerId,
        village: VillageId,
        unit: UnitType,
        count: i64,
    ) -> Result<RecruitReceipt, EconomyError> {
        if count <= 0 {
            return Err(EconomyError::InvalidCount(count));
        }
        let recruited = count as u64;
        let cost = recruitment_cost(unit, recruited);
        let now = self.clock.now();
        let per_level = self.config.production_per_level;
        let result = self.repo.transaction(Scope::Village(village), |tx| {
            authorize(tx, owner, village)?;
            let mut ledger = ResourceLedger::open(tx, village, now, per_level)?;
            ledger.try_debit(&cost)?;
            ledger.commit(tx)?;
            let new_count = tx.add_units(village, unit, recruited)?;
            Ok(RecruitReceipt {
                unit,
                recruited,
                new_count,
                cost_paid: cost,
            })
        });
        match &result {
            Ok(receipt) => log::info!(
                "{owner} recruited {recruited} {unit} in village {village} (now {})",
                receipt.new_count
            ),
            Err(err) => log_rejection(owner, "recruit", village, err),
        }
        result
    }

    // ------------------------------------------------------------------
    // Villages
    // ------------------------------------------------------------------

    pub fn list_villages(&self, owner: &OwnerId) -> Result<Vec<Village>, EconomyError> {
        self.repo
            .transaction(Scope::Owner(owner), |tx| Ok(tx.villages_of(owner)?))
    }

    /// Found a village if the owner's townhalls allow another one.
    pub fn create_village(
        &self,
        owner: &OwnerId,
        name: &str,
    ) -> Result<VillageCreated, EconomyError> {
        let name = self.validate_name(name)?;
        let now = self.clock.now();
        let levels_per_village = self.config.townhall_levels_per_village;
        let result = self.repo.transaction(Scope::Owner(owner), |tx| {
            let summary = tx.owner_summary(owner)?;
            let limit = check_village_limit(&summary, levels_per_village)?;
            let first = summary.village_count == 0;
            let village = tx.insert_village(self.seed(owner, name, now, first))?;
            Ok(VillageCreated {
                village,
                limit,
                current: summary.village_count + 1,
            })
        });
        match &result {
            Ok(created) => log::info!(
                "{owner} founded village {} ({}/{})",
                created.village.id,
                created.current,
                created.limit
            ),
            Err(err) => log::warn!("{owner} could not found a village: {err}"),
        }
        result
    }

    /// Give a brand-new owner their first village. Does nothing and returns
    /// `None` if the owner already has one.
    pub fn found_starting_village(&self, owner: &OwnerId) -> Result<Option<Village>, EconomyError> {
        let now = self.clock.now();
        let name = self.config.starting_village_name.trim().to_string();
        let village = self.repo.transaction(Scope::Owner(owner), |tx| {
            if tx.owner_summary(owner)?.village_count > 0 {
                return Ok(None);
            }
            Ok(Some(tx.insert_village(self.seed(owner, name, now, true))?))
        })?;
        if let Some(v) = &village {
            log::info!("{owner} received starting village {}", v.id);
        }
        Ok(village)
    }

    pub fn rename_village(
        &self,
        owner: &OwnerId,
        village: VillageId,
        name: &str,
    ) -> Result<Village, EconomyError> {
        let name = self.validate_name(name)?;
        let result = self.repo.transaction(Scope::Village(village), |tx| {
            authorize(tx, owner, village)?;
            tx.rename_village(village, &name)?;
            tx.village(village)?
                .ok_or(EconomyError::VillageNotFound(village))
        });
        match &result {
            Ok(v) => log::info!("{owner} renamed village {village} to {:?}", v.name),
            Err(err) => log_rejection(owner, "rename", village, err),
        }
        result
    }

    /// Delete the village together with its stock, buildings and units.
    pub fn delete_village(&self, owner: &OwnerId, village: VillageId) -> Result<(), EconomyError> {
        let result = self.repo.transaction(Scope::Village(village), |tx| {
            authorize(tx, owner, village)?;
            Ok(tx.delete_village(village)?)
        });
        match &result {
            Ok(()) => log::info!("{owner} deleted village {village}"),
            Err(err) => log_rejection(owner, "delete", village, err),
        }
        result
    }

    // ------------------------------------------------------------------

    /// Ownership check plus a refresh that is written back, for the
    /// read-only village actions.
    fn village_read<T>(
        &self,
        owner: &OwnerId,
        village: VillageId,
        now: Timestamp,
        read: impl FnOnce(&mut dyn UnitOfWork, &ResourceLedger) -> Result<T, EconomyError>,
    ) -> Result<T, EconomyError> {
        let per_level = self.config.production_per_level;
        self.repo.transaction(Scope::Village(village), |tx| {
            authorize(tx, owner, village)?;
            let ledger = ResourceLedger::open(tx, village, now, per_level)?;
            let out = read(tx, &ledger)?;
            ledger.commit(tx)?;
            Ok(out)
        })
    }

    fn validate_name(&self, name: &str) -> Result<String, EconomyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EconomyError::InvalidName("name is empty".into()));
        }
        let max = self.config.max_village_name_len;
        if name.chars().count() > max {
            return Err(EconomyError::InvalidName(format!(
                "name is longer than {max} characters"
            )));
        }
        Ok(name.to_string())
    }

    fn seed(&self, owner: &OwnerId, name: String, now: Timestamp, first: bool) -> NewVillage {
        let mut units = UnitCounts::empty_rows();
        if first {
            units.set(UnitType::Spearman, self.config.starter_spearmen);
        }
        NewVillage {
            owner: owner.clone(),
            name,
            created_at: now,
            stock: ResourceStock::new(self.config.starting_resources, now),
            buildings: BuildingLevels::uniform(1),
            units,
        }
    }
}

fn authorize(
    tx: &mut dyn UnitOfWork,
    owner: &OwnerId,
    village: VillageId,
) -> Result<(), EconomyError> {
    if tx.owns_village(owner, village)? {
        Ok(())
    } else {
        Err(EconomyError::Forbidden)
    }
}

fn quote(levels: &BuildingLevels, building: BuildingType) -> Result<UpgradeQuote, EconomyError> {
    let current_level = levels
        .get(building)
        .ok_or(EconomyError::BuildingNotFound(building))?;
    let next_level = current_level.saturating_add(1);
    let cost =
        upgrade_cost(building, next_level).ok_or(EconomyError::UnsupportedBuilding(building))?;
    Ok(UpgradeQuote {
        building,
        current_level,
        next_level,
        cost,
    })
}

fn log_rejection(owner: &OwnerId, action: &str, village: VillageId, err: &EconomyError) {
    if err.is_rejection() {
        log::warn!("{owner}: {action} in village {village} rejected: {err}");
    } else {
        log::error!("{owner}: {action} in village {village} failed: {err}");
    }
}

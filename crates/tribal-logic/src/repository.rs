//! Storage contract the economy runs against.
//!
//! A [`Repository`] hands out units of work. Everything an action reads and
//! writes goes through one [`UnitOfWork`]; if the action returns an error the
//! whole unit is discarded. Implementations must serialize units of work that
//! share a [`Scope`] and must not serialize units on unrelated villages.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::{EconomyError, RepositoryError};
use crate::kinds::{BuildingType, UnitType};
use crate::ledger::ResourceStock;
use crate::limits::OwnerSummary;
use crate::production::BuildingLevels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VillageId(pub u64);

impl fmt::Display for VillageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated owner identity, resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Village {
    pub id: VillageId,
    pub owner: OwnerId,
    pub name: String,
    pub created_at: Timestamp,
}

/// Unit counts of one village.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCounts(BTreeMap<UnitType, u64>);

impl UnitCounts {
    /// A row for every unit type at zero.
    pub fn empty_rows() -> Self {
        UnitType::all().iter().map(|u| (*u, 0)).collect()
    }

    pub fn get(&self, unit: UnitType) -> Option<u64> {
        self.0.get(&unit).copied()
    }

    pub fn set(&mut self, unit: UnitType, count: u64) {
        self.0.insert(unit, count);
    }

    /// Add `count` to `unit`, creating the row if needed. Returns the new count.
    pub fn add(&mut self, unit: UnitType, count: u64) -> u64 {
        let slot = self.0.entry(unit).or_insert(0);
        *slot = slot.saturating_add(count);
        *slot
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitType, u64)> + '_ {
        self.0.iter().map(|(u, c)| (*u, *c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(UnitType, u64)> for UnitCounts {
    fn from_iter<I: IntoIterator<Item = (UnitType, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything inserted together when a village is founded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVillage {
    pub owner: OwnerId,
    pub name: String,
    pub created_at: Timestamp,
    pub stock: ResourceStock,
    pub buildings: BuildingLevels,
    pub units: UnitCounts,
}

/// What a unit of work locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// One village's aggregate state: stock, buildings, units, metadata.
    Village(VillageId),
    /// An owner's set of villages, for founding and listing.
    Owner(&'a OwnerId),
}

/// Reads and writes available inside one transaction.
pub trait UnitOfWork {
    fn owns_village(&mut self, owner: &OwnerId, village: VillageId)
        -> Result<bool, RepositoryError>;

    fn village(&mut self, village: VillageId) -> Result<Option<Village>, RepositoryError>;

    /// The owner's villages ordered by id.
    fn villages_of(&mut self, owner: &OwnerId) -> Result<Vec<Village>, RepositoryError>;

    /// Village count and highest townhall level across the owner's villages.
    fn owner_summary(&mut self, owner: &OwnerId) -> Result<OwnerSummary, RepositoryError>;

    fn load_stock(&mut self, village: VillageId) -> Result<Option<ResourceStock>, RepositoryError>;

    fn store_stock(&mut self, village: VillageId, stock: &ResourceStock)
        -> Result<(), RepositoryError>;

    fn building_levels(&mut self, village: VillageId) -> Result<BuildingLevels, RepositoryError>;

    /// Raise an existing building row by one. `None` if the row is missing.
    fn increment_building(
        &mut self,
        village: VillageId,
        building: BuildingType,
    ) -> Result<Option<u32>, RepositoryError>;

    fn unit_counts(&mut self, village: VillageId) -> Result<UnitCounts, RepositoryError>;

    /// Add to a unit row, creating it if absent. Returns the new count.
    fn add_units(
        &mut self,
        village: VillageId,
        unit: UnitType,
        count: u64,
    ) -> Result<u64, RepositoryError>;

    /// Insert the village together with its stock, building and unit rows.
    fn insert_village(&mut self, new: NewVillage) -> Result<Village, RepositoryError>;

    fn rename_village(&mut self, village: VillageId, name: &str) -> Result<(), RepositoryError>;

    /// Remove the village and every dependent row.
    fn delete_village(&mut self, village: VillageId) -> Result<(), RepositoryError>;
}

pub trait Repository {
    /// Run `work` as one atomic unit. An `Err` from `work` (or from the
    /// commit) leaves storage exactly as it was before.
    fn transaction<T, F>(&self, scope: Scope<'_>, work: F) -> Result<T, EconomyError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, EconomyError>;
}

impl<R: Repository> Repository for &R {
    fn transaction<T, F>(&self, scope: Scope<'_>, work: F) -> Result<T, EconomyError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, EconomyError>,
    {
        (**self).transaction(scope, work)
    }
}

impl<R: Repository> Repository for Arc<R> {
    fn transaction<T, F>(&self, scope: Scope<'_>, work: F) -> Result<T, EconomyError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, EconomyError>,
    {
        (**self).transaction(scope, work)
    }
}

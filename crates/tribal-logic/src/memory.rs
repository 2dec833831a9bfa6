//! In-process [`Repository`] used by tests, the simtest harness and any
//! single-node embedding.
//!
//! Each village lives behind its own mutex. A village-scoped unit of work
//! holds that mutex for its whole duration and edits a private copy, which is
//! written back only on success. Owner-scoped units take a per-owner lock so
//! two concurrent foundings cannot both slip under the village cap, and only
//! ever touch that owner's villages.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{EconomyError, RepositoryError};
use crate::kinds::{BuildingType, UnitType};
use crate::ledger::ResourceStock;
use crate::limits::OwnerSummary;
use crate::production::BuildingLevels;
use crate::repository::{
    NewVillage, OwnerId, Repository, Scope, UnitCounts, UnitOfWork, Village, VillageId,
};

/// Every row belonging to one village.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VillageRecord {
    pub village: Village,
    pub stock: ResourceStock,
    pub buildings: BuildingLevels,
    pub units: UnitCounts,
}

/// Write operations that can be made to fail once, for rollback tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    StoreStock,
    IncrementBuilding,
    AddUnits,
    InsertVillage,
    RenameVillage,
    DeleteVillage,
}

type VillageCell = Arc<Mutex<Option<VillageRecord>>>;

#[derive(Debug, Default)]
pub struct MemoryRepository {
    last_id: AtomicU64,
    villages: RwLock<HashMap<VillageId, VillageCell>>,
    /// Committed villages per owner. Ownership never changes after founding.
    owned: RwLock<HashMap<OwnerId, BTreeSet<VillageId>>>,
    owner_locks: Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>,
    fault: Mutex<Option<WriteOp>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `op` inside any unit of work fail with a backend error.
    pub fn fail_next(&self, op: WriteOp) {
        if let Ok(mut fault) = self.fault.lock() {
            *fault = Some(op);
        }
    }

    /// Committed state of one village.
    pub fn snapshot(&self, id: VillageId) -> Result<Option<VillageRecord>, RepositoryError> {
        match self.cell(id)? {
            Some(cell) => Ok(cell.lock().map_err(|_| RepositoryError::Poisoned)?.clone()),
            None => Ok(None),
        }
    }

    pub fn village_count(&self) -> Result<usize, RepositoryError> {
        Ok(self
            .villages
            .read()
            .map_err(|_| RepositoryError::Poisoned)?
            .len())
    }

    /// Overwrite committed rows of a village outside any unit of work.
    /// Returns `false` if the village does not exist.
    pub fn edit(
        &self,
        id: VillageId,
        edit: impl FnOnce(&mut VillageRecord),
    ) -> Result<bool, RepositoryError> {
        let Some(cell) = self.cell(id)? else {
            return Ok(false);
        };
        let mut guard = cell.lock().map_err(|_| RepositoryError::Poisoned)?;
        match guard.as_mut() {
            Some(record) => {
                edit(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn cell(&self, id: VillageId) -> Result<Option<VillageCell>, RepositoryError> {
        let map = self.villages.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(map.get(&id).cloned())
    }

    fn village_ids_of(&self, owner: &OwnerId) -> Result<Vec<VillageId>, RepositoryError> {
        let index = self.owned.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(index
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    fn owner_lock(&self, owner: &OwnerId) -> Result<Arc<Mutex<()>>, RepositoryError> {
        let mut locks = self
            .owner_locks
            .lock()
            .map_err(|_| RepositoryError::Poisoned)?;
        Ok(locks.entry(owner.clone()).or_default().clone())
    }

    fn check_fault(&self, op: WriteOp) -> Result<(), RepositoryError> {
        let mut fault = self.fault.lock().map_err(|_| RepositoryError::Poisoned)?;
        if *fault == Some(op) {
            *fault = None;
            return Err(RepositoryError::Backend(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    /// Publish a successful unit of work. `slot` is the locked cell of the
    /// scoped village, if it existed when the unit began.
    fn commit(
        &self,
        tx: MemoryTx<'_>,
        slot: Option<&mut Option<VillageRecord>>,
    ) -> Result<(), RepositoryError> {
        let MemoryTx {
            scope,
            working,
            created,
            ..
        } = tx;

        if let (Some(id), Some(slot)) = (scope, slot) {
            let deleted_owner = match (slot.as_ref(), working.as_ref()) {
                (Some(before), None) => Some(before.village.owner.clone()),
                _ => None,
            };
            *slot = working;
            if let Some(owner) = deleted_owner {
                self.villages
                    .write()
                    .map_err(|_| RepositoryError::Poisoned)?
                    .remove(&id);
                let mut index = self.owned.write().map_err(|_| RepositoryError::Poisoned)?;
                if let Some(ids) = index.get_mut(&owner) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        index.remove(&owner);
                    }
                }
            }
        }

        if !created.is_empty() {
            let mut map = self.villages.write().map_err(|_| RepositoryError::Poisoned)?;
            let mut index = self.owned.write().map_err(|_| RepositoryError::Poisoned)?;
            for record in created {
                index
                    .entry(record.village.owner.clone())
                    .or_default()
                    .insert(record.village.id);
                map.insert(record.village.id, Arc::new(Mutex::new(Some(record))));
            }
        }
        Ok(())
    }
}

impl Repository for MemoryRepository {
    fn transaction<T, F>(&self, scope: Scope<'_>, work: F) -> Result<T, EconomyError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, EconomyError>,
    {
        match scope {
            Scope::Village(id) => {
                let Some(cell) = self.cell(id)? else {
                    let mut tx = MemoryTx::new(self, Some(id), None);
                    let out = work(&mut tx)?;
                    self.commit(tx, None)?;
                    return Ok(out);
                };
                let mut guard = cell.lock().map_err(|_| RepositoryError::Poisoned)?;
                let mut tx = MemoryTx::new(self, Some(id), guard.clone());
                let out = work(&mut tx)?;
                self.commit(tx, Some(&mut *guard))?;
                Ok(out)
            }
            Scope::Owner(owner) => {
                let lock = self.owner_lock(owner)?;
                let _held = lock.lock().map_err(|_| RepositoryError::Poisoned)?;
                let mut tx = MemoryTx::new(self, None, None);
                let out = work(&mut tx)?;
                self.commit(tx, None)?;
                Ok(out)
            }
        }
    }
}

/// Staged view of storage for one unit of work.
struct MemoryTx<'r> {
    repo: &'r MemoryRepository,
    scope: Option<VillageId>,
    /// Private copy of the scoped village; `None` once deleted.
    working: Option<VillageRecord>,
    created: Vec<VillageRecord>,
}

impl<'r> MemoryTx<'r> {
    fn new(
        repo: &'r MemoryRepository,
        scope: Option<VillageId>,
        working: Option<VillageRecord>,
    ) -> Self {
        Self {
            repo,
            scope,
            working,
            created: Vec::new(),
        }
    }

    fn read<T>(
        &self,
        id: VillageId,
        f: impl FnOnce(&VillageRecord) -> T,
    ) -> Result<Option<T>, RepositoryError> {
        if self.scope == Some(id) {
            return Ok(self.working.as_ref().map(f));
        }
        if let Some(record) = self.created.iter().find(|r| r.village.id == id) {
            return Ok(Some(f(record)));
        }
        match self.repo.cell(id)? {
            Some(cell) => {
                let guard = cell.lock().map_err(|_| RepositoryError::Poisoned)?;
                Ok(guard.as_ref().map(f))
            }
            None => Ok(None),
        }
    }

    fn write(&mut self, id: VillageId) -> Result<Option<&mut VillageRecord>, RepositoryError> {
        if self.scope == Some(id) {
            return Ok(self.working.as_mut());
        }
        if let Some(record) = self.created.iter_mut().find(|r| r.village.id == id) {
            return Ok(Some(record));
        }
        Err(RepositoryError::OutOfScope(id))
    }

    /// Visit the owner's villages visible to this unit, committed or staged.
    /// Only that owner's cells are locked.
    fn owned_by<T>(
        &self,
        owner: &OwnerId,
        f: impl Fn(&VillageRecord) -> T,
    ) -> Result<Vec<(VillageId, T)>, RepositoryError> {
        let mut ids = self.repo.village_ids_of(owner)?;
        if let Some(record) = &self.working {
            if record.village.owner == *owner && !ids.contains(&record.village.id) {
                ids.push(record.village.id);
            }
        }
        ids.extend(
            self.created
                .iter()
                .filter(|r| r.village.owner == *owner)
                .map(|r| r.village.id),
        );

        let mut out = Vec::new();
        for id in ids {
            let seen = self.read(id, |r| (r.village.owner == *owner).then(|| f(r)))?;
            if let Some(Some(value)) = seen {
                out.push((id, value));
            }
        }
        out.sort_by_key(|(id, _)| *id);
        Ok(out)
    }
}

impl UnitOfWork for MemoryTx<'_> {
    fn owns_village(
        &mut self,
        owner: &OwnerId,
        village: VillageId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .read(village, |r| r.village.owner == *owner)?
            .unwrap_or(false))
    }

    fn village(&mut self, village: VillageId) -> Result<Option<Village>, RepositoryError> {
        self.read(village, |r| r.village.clone())
    }

    fn villages_of(&mut self, owner: &OwnerId) -> Result<Vec<Village>, RepositoryError> {
        Ok(self
            .owned_by(owner, |r| r.village.clone())?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    fn owner_summary(&mut self, owner: &OwnerId) -> Result<OwnerSummary, RepositoryError> {
        let townhalls = self.owned_by(owner, |r| {
            r.buildings.level_or_zero(BuildingType::Townhall)
        })?;
        Ok(OwnerSummary {
            village_count: townhalls.len() as u32,
            highest_townhall: townhalls.iter().map(|(_, l)| *l).max().unwrap_or(0),
        })
    }

    fn load_stock(&mut self, village: VillageId) -> Result<Option<ResourceStock>, RepositoryError> {
        self.read(village, |r| r.stock)
    }

    fn store_stock(
        &mut self,
        village: VillageId,
        stock: &ResourceStock,
    ) -> Result<(), RepositoryError> {
        self.repo.check_fault(WriteOp::StoreStock)?;
        if let Some(record) = self.write(village)? {
            record.stock = *stock;
        }
        Ok(())
    }

    fn building_levels(&mut self, village: VillageId) -> Result<BuildingLevels, RepositoryError> {
        Ok(self
            .read(village, |r| r.buildings.clone())?
            .unwrap_or_default())
    }

    fn increment_building(
        &mut self,
        village: VillageId,
        building: BuildingType,
    ) -> Result<Option<u32>, RepositoryError> {
        self.repo.check_fault(WriteOp::IncrementBuilding)?;
        let Some(record) = self.write(village)? else {
            return Ok(None);
        };
        let Some(level) = record.buildings.get(building) else {
            return Ok(None);
        };
        let next = level.saturating_add(1);
        record.buildings.set(building, next);
        Ok(Some(next))
    }

    fn unit_counts(&mut self, village: VillageId) -> Result<UnitCounts, RepositoryError> {
        Ok(self.read(village, |r| r.units.clone())?.unwrap_or_default())
    }

    fn add_units(
        &mut self,
        village: VillageId,
        unit: UnitType,
        count: u64,
    ) -> Result<u64, RepositoryError> {
        self.repo.check_fault(WriteOp::AddUnits)?;
        match self.write(village)? {
            Some(record) => Ok(record.units.add(unit, count)),
            None => Err(RepositoryError::Backend(format!(
                "village {village} has no unit rows"
            ))),
        }
    }

    fn insert_village(&mut self, new: NewVillage) -> Result<Village, RepositoryError> {
        self.repo.check_fault(WriteOp::InsertVillage)?;
        let id = VillageId(self.repo.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let village = Village {
            id,
            owner: new.owner,
            name: new.name,
            created_at: new.created_at,
        };
        self.created.push(VillageRecord {
            village: village.clone(),
            stock: new.stock,
            buildings: new.buildings,
            units: new.units,
        });
        Ok(village)
    }

    fn rename_village(&mut self, village: VillageId, name: &str) -> Result<(), RepositoryError> {
        self.repo.check_fault(WriteOp::RenameVillage)?;
        if let Some(record) = self.write(village)? {
            record.village.name = name.to_string();
        }
        Ok(())
    }

    fn delete_village(&mut self, village: VillageId) -> Result<(), RepositoryError> {
        self.repo.check_fault(WriteOp::DeleteVillage)?;
        if self.scope == Some(village) {
            self.working = None;
            return Ok(());
        }
        let before = self.created.len();
        self.created.retain(|r| r.village.id != village);
        if self.created.len() == before {
            return Err(RepositoryError::OutOfScope(village));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Timestamp;
    use crate::resources::Resources;

    fn seed(owner: &str) -> NewVillage {
        NewVillage {
            owner: OwnerId::new(owner),
            name: format!("{owner}'s village"),
            created_at: Timestamp::from_secs(0),
            stock: ResourceStock::new(Resources::new(100, 100, 100), Timestamp::from_secs(0)),
            buildings: BuildingLevels::uniform(1),
            units: UnitCounts::empty_rows(),
        }
    }

    fn found(repo: &MemoryRepository, owner: &str) -> VillageId {
        let who = OwnerId::new(owner);
        repo.transaction(Scope::Owner(&who), |tx| Ok(tx.insert_village(seed(owner))?.id))
            .unwrap()
    }

    #[test]
    fn test_insert_commits_all_rows() {
        let repo = MemoryRepository::new();
        let id = found(&repo, "ala");
        let record = repo.snapshot(id).unwrap().unwrap();
        assert_eq!(record.buildings.len(), BuildingType::all().len());
        assert_eq!(record.units.len(), UnitType::all().len());
        assert_eq!(record.stock.resources, Resources::new(100, 100, 100));
    }

    #[test]
    fn test_failed_work_rolls_back() {
        let repo = MemoryRepository::new();
        let id = found(&repo, "ala");
        let result: Result<(), EconomyError> = repo.transaction(Scope::Village(id), |tx| {
            tx.increment_building(id, BuildingType::Barracks)?;
            Err(EconomyError::Forbidden)
        });
        assert_eq!(result, Err(EconomyError::Forbidden));
        let record = repo.snapshot(id).unwrap().unwrap();
        assert_eq!(record.buildings.get(BuildingType::Barracks), Some(1));
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let repo = MemoryRepository::new();
        let id = found(&repo, "ala");
        repo.fail_next(WriteOp::AddUnits);
        let first = repo.transaction(Scope::Village(id), |tx| {
            Ok(tx.add_units(id, UnitType::Archer, 1)?)
        });
        assert!(matches!(first, Err(EconomyError::RepositoryFailure(_))));
        let second = repo.transaction(Scope::Village(id), |tx| {
            Ok(tx.add_units(id, UnitType::Archer, 1)?)
        });
        assert_eq!(second, Ok(1));
    }

    #[test]
    fn test_delete_removes_everything() {
        let repo = MemoryRepository::new();
        let id = found(&repo, "ala");
        repo.transaction(Scope::Village(id), |tx| Ok(tx.delete_village(id)?))
            .unwrap();
        assert_eq!(repo.snapshot(id).unwrap(), None);
        assert_eq!(repo.village_count().unwrap(), 0);
    }

    #[test]
    fn test_owner_summary_and_listing() {
        let repo = MemoryRepository::new();
        let a = found(&repo, "ala");
        let b = found(&repo, "ala");
        found(&repo, "ola");
        repo.edit(b, |r| r.buildings.set(BuildingType::Townhall, 17))
            .unwrap();

        let ala = OwnerId::new("ala");
        let (summary, listed) = repo
            .transaction(Scope::Owner(&ala), |tx| {
                Ok((tx.owner_summary(&ala)?, tx.villages_of(&ala)?))
            })
            .unwrap();
        assert_eq!(
            summary,
            OwnerSummary {
                village_count: 2,
                highest_townhall: 17
            }
        );
        let ids: Vec<_> = listed.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_owner_index_follows_delete() {
        let repo = MemoryRepository::new();
        let a = found(&repo, "ala");
        let b = found(&repo, "ala");
        repo.transaction(Scope::Village(a), |tx| Ok(tx.delete_village(a)?))
            .unwrap();

        let ala = OwnerId::new("ala");
        let listed = repo
            .transaction(Scope::Owner(&ala), |tx| Ok(tx.villages_of(&ala)?))
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![b]);
        assert_eq!(repo.village_ids_of(&ala).unwrap(), vec![b]);
        assert!(repo.village_ids_of(&OwnerId::new("ola")).unwrap().is_empty());
    }

    #[test]
    fn test_writes_outside_scope_rejected() {
        let repo = MemoryRepository::new();
        let a = found(&repo, "ala");
        let b = found(&repo, "ola");
        let result = repo.transaction(Scope::Village(a), |tx| {
            Ok(tx.rename_village(b, "stolen")?)
        });
        assert_eq!(
            result,
            Err(EconomyError::RepositoryFailure(RepositoryError::OutOfScope(b)))
        );
    }

    #[test]
    fn test_unknown_village_scope_sees_nothing() {
        let repo = MemoryRepository::new();
        let ghost = VillageId(42);
        let owned = repo
            .transaction(Scope::Village(ghost), |tx| {
                Ok(tx.owns_village(&OwnerId::new("ala"), ghost)?)
            })
            .unwrap();
        assert!(!owned);
    }
}

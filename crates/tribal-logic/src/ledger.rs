//! Lazy accrual and all-or-nothing debits for one village's stock.
//!
//! There is no background production tick. Instead every read or debit first
//! credits the whole minutes elapsed since `last_accrued_at` and moves the
//! timestamp to `now`; the sub-minute remainder is dropped, not banked.
//!
//! [`ResourceStock`] holds the pure arithmetic. [`ResourceLedger`] binds it to
//! a [`UnitOfWork`] so the refresh, the debit and the write-back all land in
//! the caller's transaction. Mutual exclusion per village comes from that
//! transaction's scope.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::EconomyError;
use crate::production::{production_over, BuildingLevels};
use crate::repository::{UnitOfWork, VillageId};
use crate::resources::Resources;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStock {
    pub resources: Resources,
    pub last_accrued_at: Timestamp,
}

impl ResourceStock {
    pub fn new(resources: Resources, last_accrued_at: Timestamp) -> Self {
        Self {
            resources,
            last_accrued_at,
        }
    }

    /// Credit production for the whole minutes since the last accrual.
    /// Returns what was credited; a zero-minute refresh changes nothing.
    pub fn refresh(&mut self, levels: &BuildingLevels, now: Timestamp, per_level: u64) -> Resources {
        let elapsed = now.whole_minutes_since(self.last_accrued_at);
        if elapsed == 0 {
            return Resources::ZERO;
        }
        let gained = production_over(levels, elapsed, per_level);
        self.resources = self.resources.saturating_add(&gained);
        self.last_accrued_at = now;
        gained
    }

    /// Refresh, then subtract `cost` from every kind. On a shortfall the
    /// stock is left exactly as it was (refresh included) and the missing
    /// amounts are returned.
    pub fn try_debit(
        &mut self,
        cost: &Resources,
        levels: &BuildingLevels,
        now: Timestamp,
        per_level: u64,
    ) -> Result<(), Resources> {
        let mut next = *self;
        next.refresh(levels, now, per_level);
        match next.resources.checked_sub(cost) {
            Some(remaining) => {
                next.resources = remaining;
                *self = next;
                Ok(())
            }
            None => Err(next.resources.shortfall(cost)),
        }
    }
}

/// A village's stock opened inside a unit of work, already refreshed.
#[derive(Debug)]
pub struct ResourceLedger {
    village: VillageId,
    stock: ResourceStock,
    levels: BuildingLevels,
    now: Timestamp,
    per_level: u64,
    dirty: bool,
}

impl ResourceLedger {
    /// Load the stock and building levels of `village` and accrue up to `now`.
    pub fn open(
        tx: &mut dyn UnitOfWork,
        village: VillageId,
        now: Timestamp,
        per_level: u64,
    ) -> Result<Self, EconomyError> {
        let mut stock = tx
            .load_stock(village)?
            .ok_or(EconomyError::VillageNotFound(village))?;
        let levels = tx.building_levels(village)?;
        let gained = stock.refresh(&levels, now, per_level);
        if !gained.is_zero() {
            log::debug!("village {village}: accrued {gained}");
        }
        Ok(Self {
            village,
            stock,
            levels,
            now,
            per_level,
            dirty: !gained.is_zero(),
        })
    }

    pub fn levels(&self) -> &BuildingLevels {
        &self.levels
    }

    /// Deduct `cost` completely or not at all.
    pub fn try_debit(&mut self, cost: &Resources) -> Result<(), EconomyError> {
        self.stock
            .try_debit(cost, &self.levels, self.now, self.per_level)
            .map_err(|shortfall| EconomyError::InsufficientResources { shortfall })?;
        if !cost.is_zero() {
            self.dirty = true;
        }
        Ok(())
    }

    /// Write the stock back if accrual or a debit changed it.
    pub fn commit(self, tx: &mut dyn UnitOfWork) -> Result<ResourceStock, EconomyError> {
        if self.dirty {
            tx.store_stock(self.village, &self.stock)?;
        }
        Ok(self.stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::BuildingType;

    const RATE: u64 = 5;

    fn t(secs: i64) -> Timestamp {
        Timestamp::from_secs(1_700_000_000 + secs)
    }

    fn levels(lumber: u32, clay: u32, iron: u32) -> BuildingLevels {
        [
            (BuildingType::Lumbermill, lumber),
            (BuildingType::Claypit, clay),
            (BuildingType::Ironmine, iron),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_refresh_ten_minutes() {
        let mut stock = ResourceStock::new(Resources::new(100, 100, 100), t(0));
        let gained = stock.refresh(&levels(3, 1, 2), t(600), RATE);
        assert_eq!(gained, Resources::new(150, 50, 100));
        assert_eq!(stock.resources, Resources::new(250, 150, 200));
        assert_eq!(stock.last_accrued_at, t(600));
    }

    #[test]
    fn test_refresh_under_a_minute_is_noop() {
        let mut stock = ResourceStock::new(Resources::new(100, 100, 100), t(0));
        assert!(stock.refresh(&levels(3, 3, 3), t(59), RATE).is_zero());
        assert_eq!(stock.last_accrued_at, t(0));
    }

    #[test]
    fn test_refresh_twice_same_minute_is_idempotent() {
        let mut stock = ResourceStock::new(Resources::ZERO, t(0));
        stock.refresh(&levels(1, 1, 1), t(125), RATE);
        let first = stock;
        stock.refresh(&levels(1, 1, 1), t(130), RATE);
        assert_eq!(stock, first);
    }

    #[test]
    fn test_remainder_is_discarded() {
        let mut stock = ResourceStock::new(Resources::ZERO, t(0));
        // 90s -> one minute credited, the 30s remainder is lost
        stock.refresh(&levels(1, 0, 0), t(90), RATE);
        assert_eq!(stock.resources.wood, 5);
        // another 40s is only 40s since the reset, so nothing
        stock.refresh(&levels(1, 0, 0), t(130), RATE);
        assert_eq!(stock.resources.wood, 5);
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut stock = ResourceStock::new(Resources::ZERO, t(600));
        assert!(stock.refresh(&levels(5, 5, 5), t(0), RATE).is_zero());
        assert_eq!(stock.last_accrued_at, t(600));
    }

    #[test]
    fn test_debit_includes_fresh_accrual() {
        let mut stock = ResourceStock::new(Resources::new(100, 100, 100), t(0));
        // 2 minutes at level 1 -> +10 each, enough for 110
        stock
            .try_debit(&Resources::new(110, 0, 0), &levels(1, 1, 1), t(120), RATE)
            .unwrap();
        assert_eq!(stock.resources, Resources::new(0, 110, 110));
        assert_eq!(stock.last_accrued_at, t(120));
    }

    #[test]
    fn test_failed_debit_mutates_nothing() {
        let original = ResourceStock::new(Resources::new(100, 100, 100), t(0));
        let mut stock = original;
        let shortfall = stock
            .try_debit(&Resources::new(50, 50, 500), &levels(1, 1, 1), t(600), RATE)
            .unwrap_err();
        assert_eq!(shortfall, Resources::new(0, 0, 350));
        assert_eq!(stock, original);
    }

    #[test]
    fn test_exact_debit_reaches_zero() {
        let mut stock = ResourceStock::new(Resources::new(125, 125, 50), t(0));
        stock
            .try_debit(&Resources::new(125, 125, 50), &BuildingLevels::new(), t(30), RATE)
            .unwrap();
        assert!(stock.resources.is_zero());
    }
}

use std::collections::BTreeMap;
use std::sync::RwLock;

use stockledger_core::{AggregateRoot, ExpectedVersion, SkuCode};
use stockledger_inventory::StockRecord;

use super::r#trait::StockRecordStore;
use crate::error::StoreError;

/// In-memory stock record store.
///
/// Intended for tests/dev. A single lock guards the whole map, so every
/// compare-and-swap is linearizable.
#[derive(Debug, Default)]
pub struct InMemoryStockRecordStore {
    records: RwLock<BTreeMap<SkuCode, StockRecord>>,
}

impl InMemoryStockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn ensure_consistent(record: &StockRecord) -> Result<(), StoreError> {
    record
        .check_invariants()
        .map_err(|e| StoreError::Invariant(format!("{}: {e}", record.sku_code())))
}

impl StockRecordStore for InMemoryStockRecordStore {
    fn insert(&self, record: StockRecord) -> Result<StockRecord, StoreError> {
        if !record.is_created() || record.version() != 0 {
            return Err(StoreError::Invariant(format!(
                "{}: only freshly created records can be inserted",
                record.sku_code()
            )));
        }
        ensure_consistent(&record)?;

        let mut records = self.records.write().map_err(poisoned)?;
        if records.contains_key(record.sku_code()) {
            return Err(StoreError::DuplicateKey(record.sku_code().to_string()));
        }

        let stored = record.committed_at(1);
        records.insert(stored.sku_code().clone(), stored.clone());
        Ok(stored)
    }

    fn load(&self, sku: &SkuCode) -> Result<Option<StockRecord>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(sku).cloned())
    }

    fn compare_and_swap(
        &self,
        candidate: StockRecord,
        expected: ExpectedVersion,
    ) -> Result<StockRecord, StoreError> {
        ensure_consistent(&candidate)?;

        let mut records = self.records.write().map_err(poisoned)?;
        let current = records
            .get(candidate.sku_code())
            .ok_or_else(|| StoreError::NotFound(candidate.sku_code().to_string()))?;

        if !expected.matches(current.version()) {
            return Err(StoreError::Conflict {
                sku: candidate.sku_code().to_string(),
                expected,
                actual: current.version(),
            });
        }
        if current.id() != candidate.id() {
            return Err(StoreError::Invariant(format!(
                "{}: record id cannot change",
                candidate.sku_code()
            )));
        }

        let stored = candidate.committed_at(current.version() + 1);
        records.insert(stored.sku_code().clone(), stored.clone());
        Ok(stored)
    }

    fn scan(&self) -> Result<Vec<StockRecord>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.values().cloned().collect())
    }
}

use std::sync::Arc;

use stockledger_core::{ExpectedVersion, SkuCode};
use stockledger_inventory::StockRecord;

use crate::error::StoreError;

/// Keyed, versioned storage for stock records.
///
/// ## Write Semantics
///
/// - `insert` stores a freshly created record at version 1 and fails with
///   `DuplicateKey` if the SKU is taken.
/// - `compare_and_swap` replaces the stored record only if its version still
///   matches `expected`, then stores the candidate at `current + 1`. A mismatch
///   is reported as `Conflict` and nothing is written.
///
/// Both writes are atomic with respect to each other: a reader never observes a
/// record whose counters and reservations come from different commits.
///
/// ## Implementation Requirements
///
/// - Versions increase by exactly one per committed write.
/// - The SKU and record id of a stored record never change.
/// - Records that fail [`StockRecord::check_invariants`] are rejected with `Invariant`.
pub trait StockRecordStore: Send + Sync {
    /// Persist a new record. Returns it as stored (version 1).
    fn insert(&self, record: StockRecord) -> Result<StockRecord, StoreError>;

    /// Load the current committed record for a SKU.
    fn load(&self, sku: &SkuCode) -> Result<Option<StockRecord>, StoreError>;

    /// Conditionally replace a record. Returns it as stored (with its new version).
    fn compare_and_swap(
        &self,
        candidate: StockRecord,
        expected: ExpectedVersion,
    ) -> Result<StockRecord, StoreError>;

    /// Every stored record, in SKU order.
    fn scan(&self) -> Result<Vec<StockRecord>, StoreError>;
}

impl<S> StockRecordStore for Arc<S>
where
    S: StockRecordStore + ?Sized,
{
    fn insert(&self, record: StockRecord) -> Result<StockRecord, StoreError> {
        (**self).insert(record)
    }

    fn load(&self, sku: &SkuCode) -> Result<Option<StockRecord>, StoreError> {
        (**self).load(sku)
    }

    fn compare_and_swap(
        &self,
        candidate: StockRecord,
        expected: ExpectedVersion,
    ) -> Result<StockRecord, StoreError> {
        (**self).compare_and_swap(candidate, expected)
    }

    fn scan(&self) -> Result<Vec<StockRecord>, StoreError> {
        (**self).scan()
    }
}

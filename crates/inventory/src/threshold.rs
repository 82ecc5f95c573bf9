//! Threshold monitor: stock flags derived on demand from a record.
//!
//! Nothing here is stored. Every flag is computed from the record's committed
//! `available` quantity at the time of the call.

use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateRoot, SkuCode};

use crate::record::StockRecord;

/// Point-in-time stock status of one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockStatus {
    pub sku_code: SkuCode,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
    pub is_low_stock: bool,
    pub needs_restock: bool,
    pub is_active: bool,
    pub version: u64,
}

/// One row of the low-stock listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub sku_code: SkuCode,
    pub available: i64,
    pub threshold: i64,
}

impl StockRecord {
    /// `available ≤ low_stock_threshold` (the boundary counts as low).
    pub fn is_low_stock(&self) -> bool {
        self.available() <= self.low_stock_threshold()
    }

    /// `available ≤ restock_threshold`.
    pub fn needs_restock(&self) -> bool {
        self.available() <= self.restock_threshold()
    }

    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.available() >= quantity
    }

    pub fn status(&self) -> StockStatus {
        StockStatus {
            sku_code: self.sku_code().clone(),
            on_hand: self.on_hand(),
            reserved: self.reserved(),
            available: self.available(),
            is_low_stock: self.is_low_stock(),
            needs_restock: self.needs_restock(),
            is_active: self.is_active(),
            version: self.version(),
        }
    }

    /// Low-stock row for active records that are at or below their threshold.
    pub fn low_stock_entry(&self) -> Option<LowStockEntry> {
        if !self.is_active() || !self.is_low_stock() {
            return None;
        }
        Some(LowStockEntry {
            sku_code: self.sku_code().clone(),
            available: self.available(),
            threshold: self.low_stock_threshold(),
        })
    }
}

/// Filter records down to their low-stock rows, preserving input order.
pub fn low_stock_entries<'a>(records: impl IntoIterator<Item = &'a StockRecord>) -> Vec<LowStockEntry> {
    records
        .into_iter()
        .filter_map(StockRecord::low_stock_entry)
        .collect()
}

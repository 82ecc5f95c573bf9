use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateRoot, ProductId, ReservationId, SkuCode, StockError, StockRecordId};

use crate::reservation::{Reservation, ReservationState};

/// Default `available` level at or below which a SKU counts as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Default `available` level at or below which a SKU should be replenished.
pub const DEFAULT_RESTOCK_THRESHOLD: i64 = 20;

/// Replenishment policy knobs of a stock record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low_stock: i64,
    pub restock: i64,
}

impl Thresholds {
    pub fn new(low_stock: i64, restock: i64) -> Self {
        Self { low_stock, restock }
    }

    pub(crate) fn validate(&self) -> Result<(), StockError> {
        if self.low_stock < 0 || self.restock < 0 {
            return Err(StockError::validation("thresholds cannot be negative"));
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_stock: DEFAULT_LOW_STOCK_THRESHOLD,
            restock: DEFAULT_RESTOCK_THRESHOLD,
        }
    }
}

/// Aggregate root: the stock record of one SKU.
///
/// Counters and reservations live together so a single conditional write commits
/// both. `available` and `total_value` are derived and only ever written by
/// [`StockRecord::recompute_derived`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub(crate) id: StockRecordId,
    pub(crate) product_id: Option<ProductId>,
    pub(crate) sku_code: SkuCode,
    pub(crate) on_hand: i64,
    pub(crate) reserved: i64,
    pub(crate) available: i64,
    pub(crate) thresholds: Thresholds,
    pub(crate) unit_cost: Option<Decimal>,
    pub(crate) total_value: Option<Decimal>,
    pub(crate) location: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) version: u64,
    pub(crate) last_restocked_at: Option<DateTime<Utc>>,
    pub(crate) next_restock_at: Option<DateTime<Utc>>,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) reservations: BTreeMap<ReservationId, Reservation>,
    pub(crate) created: bool,
}

impl StockRecord {
    /// Create an empty, not-yet-created record for a SKU.
    pub fn empty(id: StockRecordId, sku_code: SkuCode) -> Self {
        Self {
            id,
            product_id: None,
            sku_code,
            on_hand: 0,
            reserved: 0,
            available: 0,
            thresholds: Thresholds::default(),
            unit_cost: None,
            total_value: None,
            location: None,
            is_active: true,
            version: 0,
            last_restocked_at: None,
            next_restock_at: None,
            created_at: None,
            updated_at: None,
            reservations: BTreeMap::new(),
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockRecordId {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn sku_code(&self) -> &SkuCode {
        &self.sku_code
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.thresholds.low_stock
    }

    pub fn restock_threshold(&self) -> i64 {
        self.thresholds.restock
    }

    pub fn unit_cost(&self) -> Option<Decimal> {
        self.unit_cost
    }

    pub fn total_value(&self) -> Option<Decimal> {
        self.total_value
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn last_restocked_at(&self) -> Option<DateTime<Utc>> {
        self.last_restocked_at
    }

    pub fn next_restock_at(&self) -> Option<DateTime<Utc>> {
        self.next_restock_at
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn reservations(&self) -> &BTreeMap<ReservationId, Reservation> {
        &self.reservations
    }

    pub fn reservation(&self, reservation_id: &ReservationId) -> Option<&Reservation> {
        self.reservations.get(reservation_id)
    }

    /// Held reservations whose expiry is at or before `now`.
    pub fn expired_holds(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .values()
            .filter(move |r| r.state == ReservationState::Held && r.is_expired_at(now))
    }

    /// Stamp the version assigned by a successful conditional write.
    ///
    /// Only storage implementations should call this.
    pub fn committed_at(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Check the record-level invariants.
    ///
    /// Returns a description of the first violated invariant. Every record produced by
    /// the engine satisfies these; stores may call this before persisting.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.reserved < 0 || self.reserved > self.on_hand {
            return Err(format!(
                "reserved {} outside 0..={} on hand",
                self.reserved, self.on_hand
            ));
        }
        if self.available != (self.on_hand - self.reserved).max(0) {
            return Err(format!("available {} is stale", self.available));
        }
        if self.total_value != stock_value(self.unit_cost, self.on_hand) {
            return Err("total value is stale".to_string());
        }
        let held: i64 = self
            .reservations
            .values()
            .filter(|r| r.state == ReservationState::Held)
            .map(|r| r.quantity)
            .sum();
        if held != self.reserved {
            return Err(format!(
                "held reservations sum to {held}, record reserves {}",
                self.reserved
            ));
        }
        Ok(())
    }

    /// Recompute every derived field from the stored quantities.
    ///
    /// Called once at the end of every `apply`, so derived values are never observed
    /// out of step with `on_hand`/`reserved`.
    pub(crate) fn recompute_derived(&mut self) {
        self.available = (self.on_hand - self.reserved).max(0);
        self.total_value = stock_value(self.unit_cost, self.on_hand);
    }
}

/// `unit_cost × on_hand`, or `None` when there is no cost or the product overflows.
pub(crate) fn stock_value(unit_cost: Option<Decimal>, on_hand: i64) -> Option<Decimal> {
    unit_cost?.checked_mul(Decimal::from(on_hand))
}

impl AggregateRoot for StockRecord {
    type Id = StockRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

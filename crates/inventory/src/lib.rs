//! Inventory domain module: the reservation engine and threshold monitor.
//!
//! This crate contains business rules for stock records, implemented purely as
//! deterministic domain logic (no IO, no storage, no clocks). Every command carries
//! its own `occurred_at`.

pub mod engine;
pub mod record;
pub mod reservation;
pub mod threshold;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{
    AdjustInventory, ConsumeReserved, CreateItem, Deactivate, ExpireReservations,
    InventoryEvent, ItemCreated, ItemDeactivated, Release, Reserve, ReservationConsumed,
    ReservationExpired, ReservationReleased, StockAdjusted, StockCommand, StockReserved, execute,
};
pub use record::{DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_RESTOCK_THRESHOLD, StockRecord, Thresholds};
pub use reservation::{ReleaseReason, Reservation, ReservationState};
pub use threshold::{LowStockEntry, StockStatus, low_stock_entries};

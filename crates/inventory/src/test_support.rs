//! Shared fixtures for the engine and monitor tests.

use chrono::{DateTime, Utc};

use stockledger_core::{ProductId, ReservationId, SkuCode, StockRecordId, StockResult};

use crate::engine::{
    AdjustInventory, ConsumeReserved, CreateItem, Release, Reserve, StockCommand, execute,
};
use crate::record::{StockRecord, Thresholds};

pub fn test_time() -> DateTime<Utc> {
    Utc::now()
}

pub fn rid(id: &str) -> ReservationId {
    ReservationId::parse(id).unwrap()
}

pub fn empty_record() -> StockRecord {
    let id = StockRecordId::new();
    StockRecord::empty(id, SkuCode::parse(format!("SKU-{id}")).unwrap())
}

pub fn create_command(on_hand: i64, thresholds: Thresholds) -> StockCommand {
    StockCommand::CreateItem(CreateItem {
        product_id: ProductId::new(),
        initial_on_hand: on_hand,
        thresholds,
        unit_cost: None,
        location: None,
        next_restock_at: None,
        occurred_at: test_time(),
    })
}

pub fn created_record(on_hand: i64, thresholds: Thresholds) -> StockRecord {
    execute(&empty_record(), &create_command(on_hand, thresholds))
        .unwrap()
        .0
}

pub fn reserve(record: &StockRecord, id: &str, quantity: i64) -> StockResult<StockRecord> {
    let cmd = StockCommand::Reserve(Reserve {
        reservation_id: rid(id),
        quantity,
        notes: None,
        expires_at: None,
        occurred_at: test_time(),
    });
    execute(record, &cmd).map(|(next, _)| next)
}

pub fn release(record: &StockRecord, id: &str, quantity: i64) -> StockResult<StockRecord> {
    let cmd = StockCommand::Release(Release {
        reservation_id: rid(id),
        quantity,
        reason: None,
        occurred_at: test_time(),
    });
    execute(record, &cmd).map(|(next, _)| next)
}

pub fn consume(record: &StockRecord, id: &str, quantity: i64) -> StockResult<StockRecord> {
    let cmd = StockCommand::ConsumeReserved(ConsumeReserved {
        reservation_id: rid(id),
        quantity,
        occurred_at: test_time(),
    });
    execute(record, &cmd).map(|(next, _)| next)
}

pub fn adjust(record: &StockRecord, delta: i64) -> StockResult<StockRecord> {
    let cmd = StockCommand::AdjustInventory(AdjustInventory {
        delta,
        reason: None,
        reference_id: None,
        occurred_at: test_time(),
    });
    execute(record, &cmd).map(|(next, _)| next)
}

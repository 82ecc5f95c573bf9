use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{SkuCode, StockRecordId};

/// Envelope for a committed stock movement, carrying stream metadata.
///
/// Notes:
/// - One stream per stock record, keyed by `record_id` and addressed by `sku_code`.
/// - `sequence_number` is the record version the movement was committed at, so
///   consumers can order and de-duplicate per SKU.
/// - Several events committed together share the same `sequence_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    record_id: StockRecordId,
    sku_code: SkuCode,
    event_type: String,

    /// Record version at which the event was committed.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        record_id: StockRecordId,
        sku_code: SkuCode,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            record_id,
            sku_code,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn record_id(&self) -> StockRecordId {
        self.record_id
    }

    pub fn sku_code(&self) -> &SkuCode {
        &self.sku_code
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

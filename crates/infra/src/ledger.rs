//! Stock ledger: the public surface over the record store.
//!
//! Every mutating operation runs the same pipeline:
//!
//! ```text
//! Operation
//!   ↓
//! 1. Load the committed record for the SKU
//!   ↓
//! 2. Run the command against a copy (pure, produces candidate + events)
//!   ↓
//! 3. Compare-and-swap the candidate against the loaded version
//!   ↓   (conflict → back off, go to 1)
//! 4. Publish the committed events
//! ```
//!
//! Nothing is held across attempts, so a retry always decides against fresh state.
//! Publication happens strictly after the write and never fails the operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockledger_core::{
    AggregateRoot, ExpectedVersion, ProductId, ReservationId, SkuCode, StockError, StockRecordId,
};
use stockledger_events::{Event, EventBus, EventEnvelope};
use stockledger_inventory::{
    AdjustInventory, ConsumeReserved, CreateItem, Deactivate, ExpireReservations, InventoryEvent,
    LowStockEntry, Release, Reservation, Reserve, StockCommand, StockRecord, StockStatus,
    Thresholds, execute, low_stock_entries,
};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::record_store::StockRecordStore;
use crate::retry::{RetryError, retry_with_backoff};

/// Input for [`StockLedger::create_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockItem {
    pub product_id: ProductId,
    pub sku_code: SkuCode,
    pub initial_on_hand: i64,
    /// `None` uses the ledger's configured defaults.
    pub thresholds: Option<Thresholds>,
    pub unit_cost: Option<Decimal>,
    pub location: Option<String>,
    pub next_restock_at: Option<DateTime<Utc>>,
}

impl NewStockItem {
    pub fn new(product_id: ProductId, sku_code: SkuCode, initial_on_hand: i64) -> Self {
        Self {
            product_id,
            sku_code,
            initial_on_hand,
            thresholds: None,
            unit_cost: None,
            location: None,
            next_restock_at: None,
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    #[must_use]
    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_next_restock_at(mut self, at: DateTime<Utc>) -> Self {
        self.next_restock_at = Some(at);
        self
    }
}

/// A committed mutation and the events that produced it.
struct Committed {
    record: StockRecord,
    events: Vec<InventoryEvent>,
}

/// Concurrency-safe stock ledger.
///
/// ## Generic Parameters
///
/// - `S`: record store (e.g. [`InMemoryStockRecordStore`](crate::InMemoryStockRecordStore))
/// - `B`: event bus receiving one JSON envelope per committed event
pub struct StockLedger<S, B> {
    store: S,
    bus: B,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
}

impl<S, B> StockLedger<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self::with_config(store, bus, LedgerConfig::default())
    }

    pub fn with_config(store: S, bus: B, config: LedgerConfig) -> Self {
        Self {
            store,
            bus,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> StockLedger<S, B>
where
    S: StockRecordStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Register a new SKU. The record is committed at version 1 with nothing reserved.
    #[tracing::instrument(skip_all, fields(sku = %item.sku_code))]
    pub fn create_item(&self, item: NewStockItem) -> Result<StockRecord, LedgerError> {
        let empty = StockRecord::empty(StockRecordId::new(), item.sku_code.clone());
        let command = StockCommand::CreateItem(CreateItem {
            product_id: item.product_id,
            initial_on_hand: item.initial_on_hand,
            thresholds: item.thresholds.unwrap_or(self.config.default_thresholds),
            unit_cost: item.unit_cost,
            location: item.location,
            next_restock_at: item.next_restock_at,
            occurred_at: self.clock.now(),
        });

        let (candidate, events) = execute(&empty, &command)?;
        let record = self.store.insert(candidate)?;
        tracing::info!(
            sku = %record.sku_code(),
            version = record.version(),
            on_hand = record.on_hand(),
            "stock record created"
        );

        let committed = Committed { record, events };
        self.publish(&committed);
        Ok(committed.record)
    }

    pub fn get_by_sku_code(&self, sku: &SkuCode) -> Result<StockRecord, LedgerError> {
        self.store
            .load(sku)?
            .ok_or_else(|| StockError::not_found(sku.as_str()).into())
    }

    /// Apply a signed on-hand correction (receipt, write-off, count correction).
    #[tracing::instrument(skip_all, fields(sku = %sku, delta = delta))]
    pub fn adjust_stock(
        &self,
        sku: &SkuCode,
        delta: i64,
        reason: Option<&str>,
        reference_id: Option<&str>,
    ) -> Result<StockRecord, LedgerError> {
        let committed = self.commit(sku, |now| {
            StockCommand::AdjustInventory(AdjustInventory {
                delta,
                reason: reason.map(str::to_owned),
                reference_id: reference_id.map(str::to_owned),
                occurred_at: now,
            })
        })?;
        Ok(committed.record)
    }

    /// Hold `quantity` units for `reservation_id`, expiring after the configured TTL.
    pub fn reserve_stock(
        &self,
        sku: &SkuCode,
        quantity: i64,
        reservation_id: &ReservationId,
        notes: Option<&str>,
    ) -> Result<StockRecord, LedgerError> {
        let ttl = self
            .config
            .reservation_ttl
            .map(chrono::Duration::from_std)
            .transpose()
            .map_err(|_| StockError::validation("reservation ttl out of range"))?;
        self.reserve_with(sku, quantity, reservation_id, notes, |now| match ttl {
            Some(ttl) => now
                .checked_add_signed(ttl)
                .map(Some)
                .ok_or_else(|| StockError::validation("reservation ttl out of range")),
            None => Ok(None),
        })
    }

    /// Hold `quantity` units with an explicit expiry (`None` never expires).
    pub fn reserve_stock_until(
        &self,
        sku: &SkuCode,
        quantity: i64,
        reservation_id: &ReservationId,
        notes: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<StockRecord, LedgerError> {
        self.reserve_with(sku, quantity, reservation_id, notes, |_| Ok(expires_at))
    }

    #[tracing::instrument(
        skip_all,
        fields(sku = %sku, reservation_id = %reservation_id, quantity = quantity)
    )]
    fn reserve_with(
        &self,
        sku: &SkuCode,
        quantity: i64,
        reservation_id: &ReservationId,
        notes: Option<&str>,
        expiry: impl Fn(DateTime<Utc>) -> Result<Option<DateTime<Utc>>, StockError>,
    ) -> Result<StockRecord, LedgerError> {
        let committed = self.try_commit_with(sku, |now| {
            Ok(StockCommand::Reserve(Reserve {
                reservation_id: reservation_id.clone(),
                quantity,
                notes: notes.map(str::to_owned),
                expires_at: expiry(now)?,
                occurred_at: now,
            }))
        })?;
        Ok(committed.record)
    }

    /// Return `quantity` held units to availability. The reservation stays held until
    /// nothing is left on it.
    #[tracing::instrument(
        skip_all,
        fields(sku = %sku, reservation_id = %reservation_id, quantity = quantity)
    )]
    pub fn release_stock(
        &self,
        sku: &SkuCode,
        quantity: i64,
        reservation_id: &ReservationId,
        reason: Option<&str>,
    ) -> Result<StockRecord, LedgerError> {
        let committed = self.commit(sku, |now| {
            StockCommand::Release(Release {
                reservation_id: reservation_id.clone(),
                quantity,
                reason: reason.map(str::to_owned),
                occurred_at: now,
            })
        })?;
        Ok(committed.record)
    }

    /// Ship `quantity` units out of a reservation and close it. Held units beyond
    /// `quantity` return to availability.
    #[tracing::instrument(
        skip_all,
        fields(sku = %sku, reservation_id = %reservation_id, quantity = quantity)
    )]
    pub fn consume_reserved(
        &self,
        sku: &SkuCode,
        quantity: i64,
        reservation_id: &ReservationId,
    ) -> Result<StockRecord, LedgerError> {
        let committed = self.commit(sku, |now| {
            StockCommand::ConsumeReserved(ConsumeReserved {
                reservation_id: reservation_id.clone(),
                quantity,
                occurred_at: now,
            })
        })?;
        Ok(committed.record)
    }

    pub fn check_status(&self, sku: &SkuCode) -> Result<StockStatus, LedgerError> {
        Ok(self.get_by_sku_code(sku)?.status())
    }

    /// Active SKUs whose available stock is at or below their low-stock threshold.
    pub fn list_low_stock(&self) -> Result<Vec<LowStockEntry>, LedgerError> {
        let records = self.store.scan()?;
        Ok(low_stock_entries(&records))
    }

    pub fn get_reservation(
        &self,
        sku: &SkuCode,
        reservation_id: &ReservationId,
    ) -> Result<Reservation, LedgerError> {
        let record = self.get_by_sku_code(sku)?;
        record
            .reservation(reservation_id)
            .cloned()
            .ok_or_else(|| StockError::missing_reservation(reservation_id.as_str()).into())
    }

    /// Release every held reservation on the SKU whose expiry has passed.
    #[tracing::instrument(skip_all, fields(sku = %sku))]
    pub fn expire_reservations(&self, sku: &SkuCode) -> Result<StockRecord, LedgerError> {
        let committed = self.commit(sku, |now| {
            StockCommand::ExpireReservations(ExpireReservations { occurred_at: now })
        })?;
        Ok(committed.record)
    }

    /// Sweep every SKU for expired reservations. Returns how many were released.
    ///
    /// SKUs that stay contended past the retry budget are skipped and picked up by
    /// the next sweep.
    #[tracing::instrument(skip_all)]
    pub fn expire_all_reservations(&self) -> Result<usize, LedgerError> {
        let now = self.clock.now();
        let mut expired = 0;

        for record in self.store.scan()? {
            if record.expired_holds(now).next().is_none() {
                continue;
            }
            let sku = record.sku_code();
            match self.commit(sku, |now| {
                StockCommand::ExpireReservations(ExpireReservations { occurred_at: now })
            }) {
                Ok(committed) => expired += committed.events.len(),
                Err(err @ LedgerError::ConcurrencyConflict { .. }) => {
                    tracing::warn!(sku = %sku, error = %err, "skipping contended sku in expiry sweep");
                }
                Err(err) => return Err(err),
            }
        }

        if expired > 0 {
            tracing::info!(expired, "expired reservations released");
        }
        Ok(expired)
    }

    /// Exclude the SKU from new reservations. Existing reservations can still be
    /// released or consumed. Deactivating twice is a no-op.
    #[tracing::instrument(skip_all, fields(sku = %sku))]
    pub fn deactivate(&self, sku: &SkuCode, reason: Option<&str>) -> Result<StockRecord, LedgerError> {
        let committed = self.commit(sku, |now| {
            StockCommand::Deactivate(Deactivate {
                reason: reason.map(str::to_owned),
                occurred_at: now,
            })
        })?;
        Ok(committed.record)
    }

    /// Run the load/decide/compare-and-swap cycle under the retry policy.
    fn commit(
        &self,
        sku: &SkuCode,
        make_command: impl Fn(DateTime<Utc>) -> StockCommand,
    ) -> Result<Committed, LedgerError> {
        self.try_commit_with(sku, |now| Ok(make_command(now)))
    }

    /// [`Self::commit`] for commands that can be rejected while they are built.
    fn try_commit_with(
        &self,
        sku: &SkuCode,
        make_command: impl Fn(DateTime<Utc>) -> Result<StockCommand, StockError>,
    ) -> Result<Committed, LedgerError> {
        let outcome = retry_with_backoff(
            &self.config.retry,
            |attempt| self.try_commit(sku, &make_command, attempt),
            LedgerError::is_retryable,
        );

        match outcome {
            Ok(committed) => {
                self.publish(&committed);
                Ok(committed)
            }
            Err(RetryError::Fatal(err)) => Err(err),
            Err(RetryError::Exhausted { attempts, .. }) => {
                tracing::warn!(sku = %sku, attempts, "retry budget exhausted on version conflicts");
                Err(LedgerError::ConcurrencyConflict {
                    sku: sku.to_string(),
                    attempts,
                })
            }
        }
    }

    fn try_commit(
        &self,
        sku: &SkuCode,
        make_command: &impl Fn(DateTime<Utc>) -> Result<StockCommand, StockError>,
        attempt: u32,
    ) -> Result<Committed, LedgerError> {
        let current = self
            .store
            .load(sku)?
            .ok_or_else(|| StockError::not_found(sku.as_str()))?;
        let command = make_command(self.clock.now())?;

        let (candidate, events) = execute(&current, &command)?;
        if events.is_empty() {
            return Ok(Committed {
                record: current,
                events,
            });
        }

        let expected = ExpectedVersion::Exact(current.version());
        let record = self
            .store
            .compare_and_swap(candidate, expected)
            .map_err(LedgerError::from)
            .inspect_err(|err| {
                if err.is_retryable() {
                    tracing::debug!(sku = %sku, attempt, loaded_version = current.version(), "lost version race");
                }
            })?;

        tracing::info!(
            sku = %sku,
            operation = command.name(),
            version = record.version(),
            attempt,
            available = record.available(),
            "stock record committed"
        );
        Ok(Committed { record, events })
    }

    /// Publish committed events. Failures are logged; the write already happened.
    fn publish(&self, committed: &Committed) {
        let record = &committed.record;
        for event in &committed.events {
            let payload = match serde_json::to_value(event) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(sku = %record.sku_code(), event_type = event.event_type(), error = %err, "event serialization failed");
                    continue;
                }
            };
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                record.id_typed(),
                record.sku_code().clone(),
                event.event_type(),
                record.version(),
                payload,
            );
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(
                    sku = %record.sku_code(),
                    version = record.version(),
                    event_type = event.event_type(),
                    error = ?err,
                    "event publication failed after commit"
                );
            }
        }
    }
}

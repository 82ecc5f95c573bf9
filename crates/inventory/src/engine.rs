//! Reservation engine: commands, movement events and the `StockRecord` state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, ProductId, ReservationId, SkuCode, StockError, StockRecordId, StockResult,
};
use stockledger_events::Event;

use crate::record::{StockRecord, Thresholds, stock_value};
use crate::reservation::{ReleaseReason, Reservation, ReservationState};

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub product_id: ProductId,
    pub initial_on_hand: i64,
    pub thresholds: Thresholds,
    pub unit_cost: Option<Decimal>,
    pub location: Option<String>,
    pub next_restock_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsumeReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeReserved {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustInventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustInventory {
    pub delta: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireReservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireReservations {
    pub occurred_at: DateTime<Utc>,
}

/// Command: Deactivate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deactivate {
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    CreateItem(CreateItem),
    Reserve(Reserve),
    Release(Release),
    ConsumeReserved(ConsumeReserved),
    AdjustInventory(AdjustInventory),
    ExpireReservations(ExpireReservations),
    Deactivate(Deactivate),
}

impl StockCommand {
    /// Short operation name, used as a log/span field.
    pub fn name(&self) -> &'static str {
        match self {
            StockCommand::CreateItem(_) => "create_item",
            StockCommand::Reserve(_) => "reserve",
            StockCommand::Release(_) => "release",
            StockCommand::ConsumeReserved(_) => "consume_reserved",
            StockCommand::AdjustInventory(_) => "adjust_inventory",
            StockCommand::ExpireReservations(_) => "expire_reservations",
            StockCommand::Deactivate(_) => "deactivate",
        }
    }
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub record_id: StockRecordId,
    pub sku_code: SkuCode,
    pub product_id: ProductId,
    pub on_hand: i64,
    pub thresholds: Thresholds,
    pub unit_cost: Option<Decimal>,
    pub location: Option<String>,
    pub next_restock_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationConsumed.
///
/// `quantity` units left physical stock; `held` is what the reservation held before,
/// so `held - quantity` units returned to availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationConsumed {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub held: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationExpired {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub delta: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeactivated {
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    ReservationConsumed(ReservationConsumed),
    ReservationExpired(ReservationExpired),
    StockAdjusted(StockAdjusted),
    ItemDeactivated(ItemDeactivated),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::StockReserved(_) => "inventory.stock.reserved",
            InventoryEvent::ReservationReleased(_) => "inventory.stock.released",
            InventoryEvent::ReservationConsumed(_) => "inventory.stock.consumed",
            InventoryEvent::ReservationExpired(_) => "inventory.stock.reservation_expired",
            InventoryEvent::StockAdjusted(_) => "inventory.stock.adjusted",
            InventoryEvent::ItemDeactivated(_) => "inventory.item.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreated(e) => e.occurred_at,
            InventoryEvent::StockReserved(e) => e.occurred_at,
            InventoryEvent::ReservationReleased(e) => e.occurred_at,
            InventoryEvent::ReservationConsumed(e) => e.occurred_at,
            InventoryEvent::ReservationExpired(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
            InventoryEvent::ItemDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockRecord {
    type Command = StockCommand;
    type Event = InventoryEvent;
    type Error = StockError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemCreated(e) => {
                self.product_id = Some(e.product_id);
                self.on_hand = e.on_hand;
                self.reserved = 0;
                self.thresholds = e.thresholds;
                self.unit_cost = e.unit_cost;
                self.location = e.location.clone();
                self.next_restock_at = e.next_restock_at;
                self.is_active = true;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            InventoryEvent::StockReserved(e) => {
                self.reserved += e.quantity;
                self.reservations.insert(
                    e.reservation_id.clone(),
                    Reservation::held(
                        e.reservation_id.clone(),
                        e.quantity,
                        e.notes.clone(),
                        e.occurred_at,
                        e.expires_at,
                    ),
                );
            }
            InventoryEvent::ReservationReleased(e) => {
                self.reserved -= e.quantity;
                if let Some(r) = self.reservations.get_mut(&e.reservation_id) {
                    r.quantity -= e.quantity;
                    if r.quantity == 0 {
                        r.close(ReservationState::Released, e.occurred_at);
                        r.release_reason = Some(ReleaseReason::Cancelled {
                            reason: e.reason.clone(),
                        });
                    }
                }
            }
            InventoryEvent::ReservationConsumed(e) => {
                self.on_hand -= e.quantity;
                self.reserved -= e.held;
                if let Some(r) = self.reservations.get_mut(&e.reservation_id) {
                    r.consumed_quantity = e.quantity;
                    r.close(ReservationState::Consumed, e.occurred_at);
                }
            }
            InventoryEvent::ReservationExpired(e) => {
                self.reserved -= e.quantity;
                if let Some(r) = self.reservations.get_mut(&e.reservation_id) {
                    r.close(ReservationState::Released, e.occurred_at);
                    r.release_reason = Some(ReleaseReason::Expired);
                }
            }
            InventoryEvent::StockAdjusted(e) => {
                self.on_hand += e.delta;
                if e.delta > 0 {
                    self.last_restocked_at = Some(e.occurred_at);
                    self.next_restock_at = None;
                }
            }
            InventoryEvent::ItemDeactivated(_) => {
                self.is_active = false;
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.recompute_derived();
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::CreateItem(cmd) => self.handle_create(cmd),
            StockCommand::Reserve(cmd) => self.handle_reserve(cmd),
            StockCommand::Release(cmd) => self.handle_release(cmd),
            StockCommand::ConsumeReserved(cmd) => self.handle_consume(cmd),
            StockCommand::AdjustInventory(cmd) => self.handle_adjust(cmd),
            StockCommand::ExpireReservations(cmd) => self.handle_expire(cmd),
            StockCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
        }
    }
}

/// Run a command against a record without touching it.
///
/// Returns the candidate record (same version as the input; the store assigns the
/// next one on commit) and the events that produced it. An empty event list means
/// the command was a no-op and nothing needs to be written.
pub fn execute(
    record: &StockRecord,
    command: &StockCommand,
) -> StockResult<(StockRecord, Vec<InventoryEvent>)> {
    let events = record.handle(command)?;
    let mut next = record.clone();
    for event in &events {
        next.apply(event);
    }
    Ok((next, events))
}

fn ensure_positive(quantity: i64) -> Result<(), StockError> {
    if quantity <= 0 {
        return Err(StockError::validation("quantity must be positive"));
    }
    Ok(())
}

fn ensure_valuable(unit_cost: Option<Decimal>, on_hand: i64) -> Result<(), StockError> {
    if unit_cost.is_some() && stock_value(unit_cost, on_hand).is_none() {
        return Err(StockError::validation("stock value overflows"));
    }
    Ok(())
}

impl StockRecord {
    fn ensure_created(&self) -> Result<(), StockError> {
        if !self.created {
            return Err(StockError::not_found(self.sku_code.as_str()));
        }
        Ok(())
    }

    fn held_reservation(&self, reservation_id: &ReservationId) -> Result<&Reservation, StockError> {
        let reservation = self
            .reservations
            .get(reservation_id)
            .ok_or_else(|| StockError::missing_reservation(reservation_id.as_str()))?;
        if !reservation.is_held() {
            return Err(StockError::InvalidReservationState {
                reservation_id: reservation_id.to_string(),
                state: reservation.state.to_string(),
            });
        }
        Ok(reservation)
    }

    fn expiry_events(&self, now: DateTime<Utc>) -> Vec<InventoryEvent> {
        self.expired_holds(now)
            .map(|r| {
                InventoryEvent::ReservationExpired(ReservationExpired {
                    reservation_id: r.reservation_id.clone(),
                    quantity: r.quantity,
                    occurred_at: now,
                })
            })
            .collect()
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<InventoryEvent>, StockError> {
        if self.created {
            return Err(StockError::AlreadyExists {
                sku: self.sku_code.to_string(),
            });
        }
        if cmd.initial_on_hand < 0 {
            return Err(StockError::validation("initial on-hand cannot be negative"));
        }
        cmd.thresholds.validate()?;
        if cmd.unit_cost.is_some_and(|c| c.is_sign_negative()) {
            return Err(StockError::validation("unit cost cannot be negative"));
        }
        ensure_valuable(cmd.unit_cost, cmd.initial_on_hand)?;

        Ok(vec![InventoryEvent::ItemCreated(ItemCreated {
            record_id: self.id,
            sku_code: self.sku_code.clone(),
            product_id: cmd.product_id,
            on_hand: cmd.initial_on_hand,
            thresholds: cmd.thresholds,
            unit_cost: cmd.unit_cost,
            location: cmd.location.clone(),
            next_restock_at: cmd.next_restock_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &Reserve) -> Result<Vec<InventoryEvent>, StockError> {
        ensure_positive(cmd.quantity)?;
        self.ensure_created()?;
        if !self.is_active {
            return Err(StockError::Inactive {
                sku: self.sku_code.to_string(),
            });
        }
        if cmd.expires_at.is_some_and(|at| at <= cmd.occurred_at) {
            return Err(StockError::validation("reservation expiry must be in the future"));
        }

        // Stale holds are reclaimed in the same commit as the new reservation.
        let mut events = self.expiry_events(cmd.occurred_at);
        let reclaimed: i64 = events
            .iter()
            .map(|e| match e {
                InventoryEvent::ReservationExpired(x) => x.quantity,
                _ => 0,
            })
            .sum();

        if let Some(existing) = self.reservations.get(&cmd.reservation_id) {
            if existing.is_held() && !existing.is_expired_at(cmd.occurred_at) {
                return Err(StockError::DuplicateReservation {
                    reservation_id: cmd.reservation_id.to_string(),
                });
            }
            // An expired hold that has not been swept yet is still reported as held.
            return Err(StockError::InvalidReservationState {
                reservation_id: cmd.reservation_id.to_string(),
                state: existing.state.to_string(),
            });
        }

        let available = self.available + reclaimed;
        if available < cmd.quantity {
            return Err(StockError::InsufficientStock {
                requested: cmd.quantity,
                available,
            });
        }

        events.push(InventoryEvent::StockReserved(StockReserved {
            reservation_id: cmd.reservation_id.clone(),
            quantity: cmd.quantity,
            notes: cmd.notes.clone(),
            expires_at: cmd.expires_at,
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_release(&self, cmd: &Release) -> Result<Vec<InventoryEvent>, StockError> {
        ensure_positive(cmd.quantity)?;
        self.ensure_created()?;
        let reservation = self.held_reservation(&cmd.reservation_id)?;

        if cmd.quantity > reservation.quantity {
            return Err(StockError::ExcessiveRelease {
                requested: cmd.quantity,
                held: reservation.quantity,
            });
        }
        if cmd.quantity > self.reserved {
            return Err(StockError::ExcessiveRelease {
                requested: cmd.quantity,
                held: self.reserved,
            });
        }

        Ok(vec![InventoryEvent::ReservationReleased(ReservationReleased {
            reservation_id: cmd.reservation_id.clone(),
            quantity: cmd.quantity,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_consume(&self, cmd: &ConsumeReserved) -> Result<Vec<InventoryEvent>, StockError> {
        ensure_positive(cmd.quantity)?;
        self.ensure_created()?;
        let reservation = self.held_reservation(&cmd.reservation_id)?;

        if cmd.quantity > reservation.quantity {
            return Err(StockError::InvalidReservationState {
                reservation_id: cmd.reservation_id.to_string(),
                state: format!("held for {}, cannot consume {}", reservation.quantity, cmd.quantity),
            });
        }

        Ok(vec![InventoryEvent::ReservationConsumed(ReservationConsumed {
            reservation_id: cmd.reservation_id.clone(),
            quantity: cmd.quantity,
            held: reservation.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustInventory) -> Result<Vec<InventoryEvent>, StockError> {
        self.ensure_created()?;
        if cmd.delta == 0 {
            return Err(StockError::validation("delta cannot be zero"));
        }

        let new_on_hand = self
            .on_hand
            .checked_add(cmd.delta)
            .ok_or_else(|| StockError::validation("on-hand quantity overflow"))?;
        // Held units cannot be written off underneath their reservations.
        if new_on_hand < 0 || new_on_hand < self.reserved {
            return Err(StockError::InsufficientQuantity {
                on_hand: self.on_hand,
                delta: cmd.delta,
            });
        }
        ensure_valuable(self.unit_cost, new_on_hand)?;

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            delta: cmd.delta,
            reason: cmd.reason.clone(),
            reference_id: cmd.reference_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireReservations) -> Result<Vec<InventoryEvent>, StockError> {
        self.ensure_created()?;
        Ok(self.expiry_events(cmd.occurred_at))
    }

    fn handle_deactivate(&self, cmd: &Deactivate) -> Result<Vec<InventoryEvent>, StockError> {
        self.ensure_created()?;
        if !self.is_active {
            return Ok(vec![]);
        }
        Ok(vec![InventoryEvent::ItemDeactivated(ItemDeactivated {
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

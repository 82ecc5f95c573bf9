//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockError>;

/// Domain-level stock ledger error.
///
/// Keep this focused on deterministic, business failures (validation, invariants,
/// reservation state). Storage and retry failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A value failed validation (e.g. non-positive quantity, blank key).
    #[error("validation failed: {0}")]
    Validation(String),

    /// No stock record exists for the SKU.
    #[error("stock record not found: {sku}")]
    NotFound { sku: String },

    /// A stock record already exists for the SKU.
    #[error("stock record already exists: {sku}")]
    AlreadyExists { sku: String },

    /// The record is inactive and excluded from fulfillment.
    #[error("stock record is inactive: {sku}")]
    Inactive { sku: String },

    /// A reservation asked for more than is currently available.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A release exceeded what is held.
    #[error("excessive release: requested {requested}, held {held}")]
    ExcessiveRelease { requested: i64, held: i64 },

    /// The reservation is not in a state that allows the transition. Unknown
    /// reservations report the state `missing`.
    #[error("reservation {reservation_id} is {state}")]
    InvalidReservationState { reservation_id: String, state: String },

    /// The reservation identifier is already held on the record.
    #[error("duplicate reservation: {reservation_id}")]
    DuplicateReservation { reservation_id: String },

    /// An adjustment would drive physical stock negative (or below what is held).
    #[error("insufficient quantity: on hand {on_hand}, delta {delta}")]
    InsufficientQuantity { on_hand: i64, delta: i64 },
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(sku: impl Into<String>) -> Self {
        Self::NotFound { sku: sku.into() }
    }

    pub fn missing_reservation(reservation_id: impl Into<String>) -> Self {
        Self::InvalidReservationState {
            reservation_id: reservation_id.into(),
            state: "missing".to_string(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::ReservationId;

/// Reservation lifecycle: `Held` → `Consumed` | `Released`. Both exits are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationState {
    Held,
    Consumed,
    Released,
}

impl ReservationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationState::Held => "held",
            ReservationState::Consumed => "consumed",
            ReservationState::Released => "released",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReservationState::Held)
    }
}

impl core::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a reservation was released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReleaseReason {
    /// Released by the owning workflow (e.g. order cancelled).
    Cancelled { reason: Option<String> },
    /// The hold outlived its expiry and was reclaimed.
    Expired,
}

/// A hold on available stock for one external workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub state: ReservationState,
    /// Units currently held (zero once the reservation is closed).
    pub quantity: i64,
    /// Units held when the reservation was placed.
    pub original_quantity: i64,
    /// Units that left stock through `consume_reserved`.
    pub consumed_quantity: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub release_reason: Option<ReleaseReason>,
}

impl Reservation {
    pub(crate) fn held(
        reservation_id: ReservationId,
        quantity: i64,
        notes: Option<String>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            reservation_id,
            state: ReservationState::Held,
            quantity,
            original_quantity: quantity,
            consumed_quantity: 0,
            notes,
            created_at,
            expires_at,
            closed_at: None,
            release_reason: None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.state == ReservationState::Held
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub(crate) fn close(&mut self, state: ReservationState, at: DateTime<Utc>) {
        self.state = state;
        self.quantity = 0;
        self.closed_at = Some(at);
    }
}

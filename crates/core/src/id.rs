//! Strongly-typed identifiers used across the ledger.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StockError;

/// Surrogate identifier of a stock record (storage key, never reused).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockRecordId(Uuid);

/// Identifier of the product a stock record belongs to (lookup only).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $t {
            type Err = StockError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| StockError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(StockRecordId, "StockRecordId");
impl_uuid_newtype!(ProductId, "ProductId");

/// Stock-keeping unit code: the natural, human-stable key of a stock record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuCode(String);

/// Caller-supplied reservation identifier (typically an order or cart line reference).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(String);

macro_rules! impl_string_key {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse a key, trimming surrounding whitespace. Empty keys are rejected.
            pub fn parse(value: impl AsRef<str>) -> Result<Self, StockError> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(StockError::validation(concat!($name, " cannot be empty")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = StockError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_key!(SkuCode, "sku code");
impl_string_key!(ReservationId, "reservation id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_code_is_trimmed() {
        let sku = SkuCode::parse("  SKU-001 ").unwrap();
        assert_eq!(sku.as_str(), "SKU-001");
        assert_eq!(sku.to_string(), "SKU-001");
    }

    #[test]
    fn blank_keys_are_rejected() {
        assert!(matches!(SkuCode::parse("   "), Err(StockError::Validation(_))));
        assert!(matches!("".parse::<ReservationId>(), Err(StockError::Validation(_))));
    }

    #[test]
    fn uuid_ids_round_trip_through_display() {
        let id = StockRecordId::new();
        let parsed: StockRecordId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ProductId>().is_err());
    }
}

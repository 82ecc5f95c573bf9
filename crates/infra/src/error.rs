use thiserror::Error;

use stockledger_core::{ExpectedVersion, StockError};

/// Record store operation error.
///
/// These are storage-level failures, as opposed to the business-rule failures in
/// [`StockError`]. Only `Conflict` is expected during normal concurrent operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed for {sku}: expected {expected:?}, found {actual}")]
    Conflict {
        sku: String,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("record already exists: {0}")]
    DuplicateKey(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("refusing to persist inconsistent record: {0}")]
    Invariant(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Error returned by every [`StockLedger`](crate::StockLedger) operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A business rule rejected the operation. Deterministic; retrying will not help.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// The record kept changing underneath us until the retry budget ran out.
    #[error("concurrency conflict on {sku} after {attempts} attempt(s)")]
    ConcurrencyConflict { sku: String, attempts: u32 },

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl LedgerError {
    /// Whether the caller may usefully resubmit the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict { .. })
    }

    pub fn as_stock_error(&self) -> Option<&StockError> {
        match self {
            LedgerError::Stock(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { sku, .. } => LedgerError::ConcurrencyConflict { sku, attempts: 1 },
            StoreError::DuplicateKey(sku) => LedgerError::Stock(StockError::AlreadyExists { sku }),
            StoreError::NotFound(sku) => LedgerError::Stock(StockError::NotFound { sku }),
            other => LedgerError::Store(other),
        }
    }
}

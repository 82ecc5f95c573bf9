//! Infrastructure layer: record storage, retry policy, configuration and the stock ledger.

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod record_store;
pub mod retry;


pub use clock::{Clock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, StoreError};
pub use ledger::{NewStockItem, StockLedger};
pub use record_store::{InMemoryStockRecordStore, StockRecordStore};
pub use retry::{RetryError, RetryPolicy, RetryPolicyBuilder, retry_with_backoff};

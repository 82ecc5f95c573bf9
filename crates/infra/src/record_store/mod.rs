//! Versioned stock record storage boundary.
//!
//! One record per SKU. Every mutation is a conditional write against the version the
//! caller loaded; the store assigns the next version on success.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryStockRecordStore;
pub use r#trait::StockRecordStore;

//! Stock movement events and their post-commit distribution.
//!
//! Events here are notifications about committed stock record mutations. The stock
//! record itself is the source of truth; the bus only fans committed facts out.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};

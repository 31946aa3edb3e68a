//! Costing events, post-commit hooks and the event bus.
//!
//! Every mutating costing operation emits a [`CostingEvent`] once its
//! transaction has committed. Events are delivered two ways:
//!
//! - synchronously to registered [`PostCommitHook`]s (the auto-linking policy
//!   lives there, so it is visible and testable on its own), and
//! - as JSON [`EventEnvelope`]s on an [`EventBus`] for any other consumer.

pub mod bus;
pub mod costing;
pub mod envelope;
pub mod event;
pub mod hook;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use costing::{
    CostingEvent, FeeDistributed, LotDeleted, LotReceived, OutboundAllocated, OutboundReversed,
    SaleRecorded,
};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use hook::{HookError, HookRegistry, PostCommitHook};
pub use in_memory_bus::{CostingEventBus, InMemoryBusError, InMemoryEventBus};

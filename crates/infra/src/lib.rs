//! Infrastructure layer: the lot ledger, configuration, and the costing
//! services that run domain logic inside ledger transactions.
//!
//! ```text
//! CostingEngine
//!   ├─ InboundReceiver        ─┐
//!   ├─ OutboundAllocator       │  LotLedger::begin() → LedgerTx → commit()
//!   ├─ WarehouseFeeDistributor │  (optimistic concurrency, retried on conflict)
//!   ├─ CostPropagator         ─┘
//!   ├─ InventoryQueryService     read-only snapshots
//!   └─ CommitNotifier            post-commit hooks + event bus
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod services;
mod transaction;

pub use crate::config::{AutoLinkConfig, ConfigError, EngineConfig};
pub use engine::{CostingEngine, EngineBuilder};
pub use error::{EngineError, EngineResult};
pub use ledger::{InMemoryLotLedger, LedgerTx, LotFilter, LotLedger, RecordFilter, StoreError};
pub use notify::{CommitNotifier, EnvelopeSink};

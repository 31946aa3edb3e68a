//! Lot ledger boundary.
//!
//! Every mutating costing operation runs inside one [`LedgerTx`]: reads come
//! from a consistent snapshot, writes are buffered, and `commit()` applies them
//! atomically or not at all.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLotLedger;
pub use r#trait::{LedgerTx, LotFilter, LotLedger, RecordFilter, StoreError};

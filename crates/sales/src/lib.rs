//! Unified sales/purchase ledger entry.
//!
//! Both directions of trade are recorded as one `SalesRecord` type tagged with
//! `RecordType`. The costing engine writes these entries; it never reads them
//! back to derive costs.

pub mod record;

pub use record::{
    MarginFigures, Provenance, PurchaseDraft, RecordType, SaleDraft, SalesRecord, compute_margin,
};

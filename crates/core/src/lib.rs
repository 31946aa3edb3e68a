//! `tradeerp-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy shared by every costing component, row
//! versioning for optimistic concurrency, and money helpers.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    DistributionId, LotId, MovementId, ProductId, ReceiptId, SalesRecordId, SalespersonId,
    VendorId,
};
pub use money::{ensure_non_negative, ensure_positive_quantity, round_money};
pub use version::ExpectedVersion;

//! Product master data, as far as the costing engine depends on it.
//!
//! Full product management (import, categories, customs codes) lives outside
//! the engine; this crate only models what costing reads: default prices, the
//! default purchase vendor and vendor-specific sales prices.

pub mod product;

pub use product::{AutoPurchase, Product, VendorPrice};

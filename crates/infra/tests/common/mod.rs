//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use tradeerp_core::{ProductId, VendorId};
use tradeerp_infra::{CostingEngine, EngineConfig, InMemoryLotLedger};
use tradeerp_inventory::{InventoryLot, LandedCost, ReceiveLot, StorageLocation};
use tradeerp_products::Product;

pub type Engine = CostingEngine<InMemoryLotLedger>;

pub fn engine() -> Engine {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> Engine {
    CostingEngine::new(Arc::new(InMemoryLotLedger::new()), config)
}

pub fn day(year: i32, month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, d).expect("valid date")
}

/// A product with no purchase vendor, so nothing is auto-linked.
pub fn product(engine: &Engine, code: &str) -> anyhow::Result<ProductId> {
    let product = Product::new(ProductId::new(), code, format!("{code} product"))?;
    let id = product.id_typed();
    engine.upsert_product(product)?;
    Ok(id)
}

/// A product bought from `vendor` at `purchase_price` by default.
pub fn sourced_product(
    engine: &Engine,
    code: &str,
    vendor: VendorId,
    purchase_price: Option<Decimal>,
) -> anyhow::Result<ProductId> {
    let product = Product::new(ProductId::new(), code, format!("{code} product"))?
        .with_default_prices(purchase_price, None)?
        .with_purchase_vendor(vendor);
    let id = product.id_typed();
    engine.upsert_product(product)?;
    Ok(id)
}

pub fn receive(
    engine: &Engine,
    product_id: ProductId,
    received: NaiveDate,
    quantity: i64,
    goods_amount: Decimal,
) -> anyhow::Result<InventoryLot> {
    receive_at(engine, product_id, received, quantity, goods_amount, StorageLocation::Warehouse)
}

pub fn receive_at(
    engine: &Engine,
    product_id: ProductId,
    received: NaiveDate,
    quantity: i64,
    goods_amount: Decimal,
    storage_location: StorageLocation,
) -> anyhow::Result<InventoryLot> {
    Ok(engine.receive_inbound(ReceiveLot {
        product_id,
        receipt_id: None,
        lot_code: None,
        received_date: received,
        quantity,
        costs: LandedCost::goods_only(goods_amount),
        storage_location,
        notes: None,
    })?)
}

pub fn lot(engine: &Engine, lot: &InventoryLot) -> anyhow::Result<InventoryLot> {
    Ok(engine.lot_detail(lot.id_typed())?.lot)
}

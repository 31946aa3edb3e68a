//! Inventory listings, summaries and valuation.

mod common;

use anyhow::Result;
use rust_decimal_macros::dec;

use common::{day, engine, product, receive, receive_at};
use tradeerp_core::{DomainError, ProductId};
use tradeerp_infra::services::{AllocateOutbound, InventoryQuery};
use tradeerp_inventory::StorageLocation;

#[test]
fn products_are_listed_by_code_with_lots_in_fifo_order() -> Result<()> {
    let engine = engine();
    let zeta = product(&engine, "Z-1")?;
    let alpha = product(&engine, "A-1")?;
    let late = receive(&engine, alpha, day(2024, 6, 9), 5, dec!(60))?;
    let early = receive(&engine, alpha, day(2024, 6, 1), 5, dec!(40))?;
    receive(&engine, zeta, day(2024, 6, 1), 3, dec!(30))?;

    let page = engine.query_inventory(InventoryQuery::default())?;

    assert_eq!(page.total_items, 2);
    assert_eq!(page.total_pages, 1);
    let first = &page.items[0];
    assert_eq!(first.product_code, "A-1");
    assert_eq!(first.lots[0].lot_id, early.id_typed());
    assert_eq!(first.lots[1].lot_id, late.id_typed());
    assert_eq!(first.valuation.total_remaining, 10);
    assert_eq!(first.valuation.average_unit_cost, dec!(10));
    assert_eq!(page.items[1].product_id, zeta);
    Ok(())
}

#[test]
fn pages_split_the_product_list() -> Result<()> {
    let engine = engine();
    for code in ["A-1", "B-1", "C-1"] {
        let id = product(&engine, code)?;
        receive(&engine, id, day(2024, 6, 1), 1, dec!(1))?;
    }

    let page = engine.query_inventory(InventoryQuery {
        page: 2,
        page_size: 2,
        ..InventoryQuery::default()
    })?;

    assert_eq!(page.total_items, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].product_code, "C-1");

    let err = engine
        .query_inventory(InventoryQuery {
            page: 0,
            ..InventoryQuery::default()
        })
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::Validation { field: "page", .. })));
    Ok(())
}

#[test]
fn pages_past_the_end_are_empty() -> Result<()> {
    let engine = engine();
    let id = product(&engine, "A-1")?;
    receive(&engine, id, day(2024, 6, 1), 1, dec!(1))?;

    for page in [2, usize::MAX] {
        let result = engine.query_inventory(InventoryQuery {
            page,
            page_size: 500,
            ..InventoryQuery::default()
        })?;
        assert!(result.items.is_empty());
        assert_eq!(result.total_items, 1);
        assert_eq!(result.page, page);
    }
    Ok(())
}

#[test]
fn exhausted_lots_are_hidden_unless_requested() -> Result<()> {
    let engine = engine();
    let product_id = product(&engine, "A-1")?;
    let used_up = receive(&engine, product_id, day(2024, 6, 1), 5, dec!(50))?;
    receive(&engine, product_id, day(2024, 6, 2), 5, dec!(50))?;
    engine.allocate_outbound(AllocateOutbound {
        product_id,
        quantity: 5,
        outbound_date: day(2024, 6, 3),
        storage_location: None,
        sale: None,
        notes: None,
    })?;

    let open = engine.query_inventory(InventoryQuery::default())?;
    assert_eq!(open.items[0].lots.len(), 1);

    let all = engine.query_inventory(InventoryQuery {
        include_exhausted: true,
        ..InventoryQuery::default()
    })?;
    let lots = &all.items[0].lots;
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0].lot_id, used_up.id_typed());
    assert_eq!(lots[0].quantity_remaining, 0);
    // Valuation only counts what is left.
    assert_eq!(all.items[0].valuation.lot_count, 1);
    Ok(())
}

#[test]
fn filters_narrow_to_product_and_location() -> Result<()> {
    let engine = engine();
    let a = product(&engine, "A-1")?;
    let b = product(&engine, "B-1")?;
    receive(&engine, a, day(2024, 6, 1), 5, dec!(50))?;
    receive_at(&engine, a, day(2024, 6, 1), 2, dec!(30), StorageLocation::Office)?;
    receive(&engine, b, day(2024, 6, 1), 5, dec!(50))?;

    let only_a = engine.query_inventory(InventoryQuery {
        product_id: Some(a),
        ..InventoryQuery::default()
    })?;
    assert_eq!(only_a.total_items, 1);
    assert_eq!(only_a.items[0].valuation.total_remaining, 7);

    let office = engine.query_inventory(InventoryQuery {
        storage_location: Some(StorageLocation::Office),
        ..InventoryQuery::default()
    })?;
    assert_eq!(office.total_items, 1);
    assert_eq!(office.items[0].valuation.total_value, dec!(30));
    Ok(())
}

#[test]
fn summary_totals_every_open_lot() -> Result<()> {
    let engine = engine();
    let a = product(&engine, "A-1")?;
    let b = product(&engine, "B-1")?;
    receive(&engine, a, day(2024, 6, 1), 5, dec!(50))?;
    receive_at(&engine, b, day(2024, 6, 1), 2, dec!(30), StorageLocation::Office)?;

    let summary = engine.inventory_summary(None)?;
    assert_eq!(summary.product_count, 2);
    assert_eq!(summary.lot_count, 2);
    assert_eq!(summary.total_remaining, 7);
    assert_eq!(summary.total_value, dec!(80));

    let warehouse = engine.inventory_summary(Some(StorageLocation::Warehouse))?;
    assert_eq!(warehouse.product_count, 1);
    assert_eq!(warehouse.total_value, dec!(50));
    Ok(())
}

#[test]
fn empty_products_value_at_zero() -> Result<()> {
    let engine = engine();
    let product_id = product(&engine, "A-1")?;

    let valuation = engine.valuation(product_id)?;

    assert!(valuation.is_empty());
    assert_eq!(valuation.total_value, dec!(0));
    assert!(engine.product(ProductId::new()).is_err());
    Ok(())
}

#[test]
fn bootstrapped_engine_starts_empty() -> Result<()> {
    let engine = tradeerp_infra::CostingEngine::bootstrap()?;

    let page = engine.query_inventory(InventoryQuery::default())?;

    assert_eq!(page.total_items, 0);
    assert!(page.items.is_empty());
    Ok(())
}

//! Receiving stock, shipments with header costs, and lot deletion.

mod common;

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{day, engine, engine_with, lot, product, receive, sourced_product};
use tradeerp_core::{DomainError, ProductId, ReceiptId, VendorId};
use tradeerp_infra::services::{AllocateOutbound, InventoryQuery, ReceiveShipment, ShipmentItem};
use tradeerp_infra::{EngineConfig, RecordFilter};
use tradeerp_inventory::{
    HeaderCosts, LandedCost, LandedCostPolicy, MovementDirection, ReceiveLot, StorageLocation,
};
use tradeerp_sales::{Provenance, RecordType};

fn lot_input(product_id: ProductId, code: Option<&str>, quantity: i64, costs: LandedCost) -> ReceiveLot {
    ReceiveLot {
        product_id,
        receipt_id: None,
        lot_code: code.map(str::to_string),
        received_date: day(2024, 2, 1),
        quantity,
        costs,
        storage_location: StorageLocation::Warehouse,
        notes: None,
    }
}

fn shipment(items: Vec<ShipmentItem>, vendor_id: Option<VendorId>) -> ReceiveShipment {
    ReceiveShipment {
        receipt_id: ReceiptId::new(),
        received_date: day(2024, 2, 1),
        vendor_id,
        header: HeaderCosts {
            duty_amount: dec!(100),
            domestic_freight: Decimal::ZERO,
            other_cost: Decimal::ZERO,
        },
        items,
    }
}

fn item(product_id: ProductId, quantity: i64, goods_amount: Decimal) -> ShipmentItem {
    ShipmentItem {
        product_id,
        lot_code: None,
        quantity,
        goods_amount,
        storage_location: StorageLocation::Warehouse,
        notes: None,
    }
}

#[test]
fn unit_cost_includes_every_landed_cost_component() -> Result<()> {
    let engine = engine();
    let product_id = product(&engine, "P-300")?;

    let created = engine.receive_inbound(lot_input(
        product_id,
        Some("LOT-A"),
        40,
        LandedCost::new(dec!(800), dec!(120), dec!(50), dec!(30)),
    ))?;

    assert_eq!(created.unit_cost(), dec!(25));
    assert_eq!(created.quantity_remaining(), 40);
    assert_eq!(created.warehouse_fee(), Decimal::ZERO);
    assert_eq!(created.lot_code(), "LOT-A");

    let detail = engine.lot_detail(created.id_typed())?;
    assert_eq!(detail.movements.len(), 1);
    assert_eq!(detail.movements[0].direction(), MovementDirection::In);
    assert_eq!(detail.movements[0].quantity(), 40);
    Ok(())
}

#[test]
fn invalid_receipts_are_rejected_before_any_write() -> Result<()> {
    let engine = engine();
    let product_id = product(&engine, "P-300")?;
    let before = engine.ledger().last_commit()?;

    let zero_quantity = engine
        .receive_inbound(lot_input(product_id, None, 0, LandedCost::goods_only(dec!(10))))
        .unwrap_err();
    assert!(matches!(zero_quantity.domain(), Some(DomainError::Validation { .. })));

    let negative_cost = engine
        .receive_inbound(lot_input(product_id, None, 5, LandedCost::goods_only(dec!(-1))))
        .unwrap_err();
    assert!(matches!(negative_cost.domain(), Some(DomainError::Validation { .. })));

    let unknown = engine
        .receive_inbound(lot_input(ProductId::new(), None, 5, LandedCost::goods_only(dec!(10))))
        .unwrap_err();
    assert!(matches!(
        unknown.domain(),
        Some(DomainError::Validation { field: "product_id", .. })
    ));

    assert_eq!(engine.ledger().last_commit()?, before);
    Ok(())
}

#[test]
fn lot_codes_are_unique() -> Result<()> {
    let engine = engine();
    let product_id = product(&engine, "P-300")?;
    engine.receive_inbound(lot_input(product_id, Some("LOT-A"), 5, LandedCost::goods_only(dec!(50))))?;

    let err = engine
        .receive_inbound(lot_input(product_id, Some("LOT-A"), 5, LandedCost::goods_only(dec!(50))))
        .unwrap_err();

    assert!(matches!(err.domain(), Some(DomainError::Duplicate { .. })));
    assert_eq!(engine.valuation(product_id)?.lot_count, 1);
    Ok(())
}

#[test]
fn untouched_lot_deletion_restores_the_prior_state() -> Result<()> {
    let engine = engine();
    let product_id = product(&engine, "P-300")?;
    let keep = receive(&engine, product_id, day(2024, 2, 1), 10, dec!(100))?;
    let before = engine.valuation(product_id)?;

    let created = engine.receive_inbound(lot_input(product_id, Some("LOT-B"), 5, LandedCost::goods_only(dec!(50))))?;
    engine.delete_lot(created.id_typed())?;

    assert_eq!(engine.valuation(product_id)?, before);
    assert!(engine.lot_detail(created.id_typed()).is_err());
    assert_eq!(lot(&engine, &keep)?.quantity_remaining(), 10);
    // The code is free again.
    engine.receive_inbound(lot_input(product_id, Some("LOT-B"), 5, LandedCost::goods_only(dec!(50))))?;
    Ok(())
}

#[test]
fn consumed_lots_cannot_be_deleted() -> Result<()> {
    let engine = engine();
    let product_id = product(&engine, "P-300")?;
    let a = receive(&engine, product_id, day(2024, 2, 1), 10, dec!(100))?;
    let b = receive(&engine, product_id, day(2024, 2, 2), 10, dec!(100))?;
    engine.allocate_outbound(AllocateOutbound {
        product_id,
        quantity: 4,
        outbound_date: day(2024, 2, 3),
        storage_location: None,
        sale: None,
        notes: None,
    })?;

    let err = engine.delete_lot(a.id_typed()).unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::BusinessRule(_))));

    // Bulk deletion is all-or-nothing.
    let err = engine.delete_lots(&[b.id_typed(), a.id_typed()]).unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::BusinessRule(_))));
    assert_eq!(lot(&engine, &b)?.quantity_remaining(), 10);

    let deleted = engine.delete_lots(&[b.id_typed()])?;
    assert_eq!(deleted.len(), 1);
    assert_eq!(engine.valuation(product_id)?.total_remaining, 6);
    Ok(())
}

#[test]
fn deleting_a_lot_removes_its_purchase_entry() -> Result<()> {
    let engine = engine();
    let product_id = sourced_product(&engine, "P-300", VendorId::new(), None)?;
    let created = receive(&engine, product_id, day(2024, 2, 1), 10, dec!(100))?;
    let by_lot = RecordFilter {
        lot_id: Some(created.id_typed()),
        ..RecordFilter::default()
    };
    assert_eq!(engine.sales_records(by_lot)?.len(), 1);

    engine.delete_lot(created.id_typed())?;

    assert!(engine.sales_records(by_lot)?.is_empty());
    Ok(())
}

#[test]
fn inbound_purchase_is_auto_created_for_sourced_products() -> Result<()> {
    let engine = engine();
    let vendor = VendorId::new();
    let product_id = sourced_product(&engine, "P-300", vendor, Some(dec!(9)))?;

    let created = engine.receive_inbound(lot_input(
        product_id,
        None,
        8,
        LandedCost::new(dec!(60), dec!(10), Decimal::ZERO, Decimal::ZERO),
    ))?;

    let purchases = engine.sales_records(RecordFilter {
        lot_id: Some(created.id_typed()),
        ..RecordFilter::default()
    })?;
    assert_eq!(purchases.len(), 1);
    let purchase = &purchases[0];
    assert_eq!(purchase.record_type(), RecordType::Purchase);
    assert_eq!(purchase.provenance(), Provenance::InboundAuto);
    assert_eq!(purchase.vendor_id(), Some(vendor));
    assert_eq!(purchase.quantity(), 8);
    assert_eq!(purchase.unit_price(), dec!(8.75));
    Ok(())
}

#[test]
fn inbound_auto_link_can_be_disabled() -> Result<()> {
    let mut config = EngineConfig::default();
    config.auto_link.inbound = false;
    let engine = engine_with(config);
    let product_id = sourced_product(&engine, "P-300", VendorId::new(), None)?;

    receive(&engine, product_id, day(2024, 2, 1), 10, dec!(100))?;

    assert!(engine.sales_records(RecordFilter::default())?.is_empty());
    Ok(())
}

#[test]
fn shipment_header_costs_follow_goods_value_by_default() -> Result<()> {
    let engine = engine();
    let p1 = product(&engine, "P-301")?;
    let p2 = product(&engine, "P-302")?;

    let receipt = engine.receive_shipment(shipment(
        vec![item(p1, 10, dec!(600)), item(p2, 40, dec!(400))],
        None,
    ))?;

    assert_eq!(receipt.lots.len(), 2);
    assert_eq!(receipt.lots[0].costs().duty_amount, dec!(60));
    assert_eq!(receipt.lots[1].costs().duty_amount, dec!(40));
    assert_eq!(receipt.lots[0].unit_cost(), dec!(66));
    assert_eq!(receipt.lots[1].unit_cost(), dec!(11));
    assert!(receipt.lots.iter().all(|l| l.receipt_id() == Some(receipt.receipt_id)));
    assert!(receipt.purchase_ids.is_empty());
    Ok(())
}

#[test]
fn shipment_header_costs_can_be_split_evenly() -> Result<()> {
    let mut config = EngineConfig::default();
    config.landed_cost_policy = LandedCostPolicy::EvenSplit;
    let engine = engine_with(config);
    let p1 = product(&engine, "P-301")?;
    let p2 = product(&engine, "P-302")?;

    let receipt = engine.receive_shipment(shipment(
        vec![item(p1, 10, dec!(600)), item(p2, 40, dec!(400))],
        None,
    ))?;

    assert_eq!(receipt.lots[0].unit_cost(), dec!(65));
    assert_eq!(receipt.lots[1].unit_cost(), dec!(11.25));
    Ok(())
}

#[test]
fn shipment_with_vendor_records_one_purchase_per_item() -> Result<()> {
    let engine = engine();
    let vendor = VendorId::new();
    // Sourced products would otherwise get an inbound purchase of their own.
    let p1 = sourced_product(&engine, "P-301", vendor, None)?;
    let p2 = sourced_product(&engine, "P-302", vendor, None)?;

    let receipt = engine.receive_shipment(shipment(
        vec![item(p1, 10, dec!(600)), item(p2, 40, dec!(400))],
        Some(vendor),
    ))?;

    assert_eq!(receipt.purchase_ids.len(), 2);
    let records = engine.sales_records(RecordFilter {
        receipt_id: Some(receipt.receipt_id),
        ..RecordFilter::default()
    })?;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.provenance() == Provenance::Shipment));
    let total: Decimal = records.iter().map(|r| r.amount()).sum();
    assert_eq!(total, dec!(1100));
    Ok(())
}

#[test]
fn a_bad_shipment_item_rejects_the_whole_receipt() -> Result<()> {
    let engine = engine();
    let p1 = product(&engine, "P-301")?;

    let err = engine
        .receive_shipment(shipment(
            vec![item(p1, 10, dec!(600)), item(ProductId::new(), 5, dec!(100))],
            None,
        ))
        .unwrap_err();

    assert!(matches!(err.domain(), Some(DomainError::Validation { .. })));
    let page = engine.query_inventory(InventoryQuery::default())?;
    assert_eq!(page.total_items, 0);
    Ok(())
}

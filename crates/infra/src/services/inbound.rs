//! Inbound receiver: turns goods receipts into cost-bearing lots.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use tradeerp_core::{
    DomainError, LotId, MovementId, ProductId, ReceiptId, SalesRecordId, VendorId,
};
use tradeerp_events::{CostingEvent, LotDeleted};
use tradeerp_inventory::{
    HeaderCosts, InventoryLot, InventoryMovement, ReceiveLot, ShipmentLine, StorageLocation,
    distribute_header_costs,
};
use tradeerp_sales::{Provenance, PurchaseDraft, RecordType, SalesRecord};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::{LedgerTx, LotLedger, RecordFilter};
use crate::notify::CommitNotifier;
use crate::transaction::run_in_tx;

use super::cost_propagation::remove_purchase;
use super::{lot_received, require_product};

/// One product line of a multi-item goods receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub product_id: ProductId,
    pub lot_code: Option<String>,
    pub quantity: i64,
    pub goods_amount: Decimal,
    pub storage_location: StorageLocation,
    pub notes: Option<String>,
}

/// Several products received under one receipt with header-level costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveShipment {
    pub receipt_id: ReceiptId,
    pub received_date: NaiveDate,
    /// When set, one PURCHASE entry per item is recorded with the lots.
    pub vendor_id: Option<VendorId>,
    pub header: HeaderCosts,
    pub items: Vec<ShipmentItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentReceipt {
    pub receipt_id: ReceiptId,
    pub lots: Vec<InventoryLot>,
    pub purchase_ids: Vec<SalesRecordId>,
}

pub struct InboundReceiver<L> {
    ledger: Arc<L>,
    config: Arc<EngineConfig>,
    notifier: Arc<CommitNotifier>,
}

impl<L: LotLedger> InboundReceiver<L> {
    pub fn new(ledger: Arc<L>, config: Arc<EngineConfig>, notifier: Arc<CommitNotifier>) -> Self {
        Self {
            ledger,
            config,
            notifier,
        }
    }

    /// Create one lot and its IN movement.
    #[tracing::instrument(skip(self, input), fields(product_id = %input.product_id, quantity = input.quantity))]
    pub fn receive(&self, input: ReceiveLot) -> EngineResult<InventoryLot> {
        let lot = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "receive_inbound", |tx| {
            let lot = InventoryLot::receive(LotId::new(), input.clone())?;
            require_product(tx, lot.product_id())?;
            stage_lot(tx, lot)
        })?;

        info!(
            lot_id = %lot.id_typed(),
            lot_code = lot.lot_code(),
            unit_cost = %lot.unit_cost(),
            "lot received"
        );
        self.notifier.dispatch(vec![lot_received(&lot)]);
        Ok(lot)
    }

    /// Receive a multi-item shipment in one transaction.
    ///
    /// Header duty / freight / other cost is split across the items with the
    /// configured landed-cost policy before the lots are created.
    #[tracing::instrument(skip(self, input), fields(receipt_id = %input.receipt_id, items = input.items.len()))]
    pub fn receive_shipment(&self, input: ReceiveShipment) -> EngineResult<ShipmentReceipt> {
        let lines: Vec<ShipmentLine> = input
            .items
            .iter()
            .map(|item| ShipmentLine {
                quantity: item.quantity,
                goods_amount: item.goods_amount,
            })
            .collect();
        let scale = self.config.currency_scale;
        let item_costs =
            distribute_header_costs(&lines, &input.header, self.config.landed_cost_policy, scale)?;

        let receipt = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "receive_shipment", |tx| {
            let mut lots = Vec::with_capacity(input.items.len());
            let mut purchase_ids = Vec::new();

            for (item, costs) in input.items.iter().zip(&item_costs) {
                let lot = InventoryLot::receive(
                    LotId::new(),
                    ReceiveLot {
                        product_id: item.product_id,
                        receipt_id: Some(input.receipt_id),
                        lot_code: item.lot_code.clone(),
                        received_date: input.received_date,
                        quantity: item.quantity,
                        costs: costs.clone(),
                        storage_location: item.storage_location,
                        notes: item.notes.clone(),
                    },
                )?;
                require_product(tx, item.product_id)?;
                let lot = stage_lot(tx, lot)?;

                if let Some(vendor_id) = input.vendor_id {
                    let purchase = SalesRecord::purchase(
                        SalesRecordId::new(),
                        PurchaseDraft {
                            product_id: item.product_id,
                            vendor_id,
                            purchase_date: input.received_date,
                            quantity: item.quantity,
                            unit_price: lot.unit_cost(),
                            provenance: Provenance::Shipment,
                            lot_id: Some(lot.id_typed()),
                            receipt_id: Some(input.receipt_id),
                            notes: None,
                        },
                        scale,
                    )?;
                    purchase_ids.push(purchase.id_typed());
                    tx.put_sales_record(purchase)?;
                }
                lots.push(lot);
            }

            Ok(ShipmentReceipt {
                receipt_id: input.receipt_id,
                lots,
                purchase_ids,
            })
        })?;

        info!(
            lots = receipt.lots.len(),
            purchases = receipt.purchase_ids.len(),
            "shipment received"
        );
        self.notifier
            .dispatch(receipt.lots.iter().map(lot_received).collect());
        Ok(receipt)
    }

    /// Delete a lot nothing has been consumed from.
    pub fn delete_lot(&self, lot_id: LotId) -> EngineResult<InventoryLot> {
        let mut deleted = self.delete_lots(&[lot_id])?;
        deleted
            .pop()
            .ok_or_else(|| DomainError::not_found("lot", lot_id).into())
    }

    /// Delete several untouched lots; if any of them cannot be deleted, none is.
    ///
    /// A lot takes its IN movement and the PURCHASE entries recorded for it
    /// along with it. Lots that received a warehouse fee share stay.
    #[tracing::instrument(skip(self, lot_ids), fields(count = lot_ids.len()))]
    pub fn delete_lots(&self, lot_ids: &[LotId]) -> EngineResult<Vec<InventoryLot>> {
        if lot_ids.is_empty() {
            return Err(DomainError::validation("lot_ids", "at least one lot is required").into());
        }

        let deleted = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "delete_lots", |tx| {
            lot_ids.iter().map(|id| remove_lot(tx, *id)).collect::<EngineResult<Vec<_>>>()
        })?;

        for lot in &deleted {
            info!(lot_id = %lot.id_typed(), lot_code = lot.lot_code(), "lot deleted");
        }
        self.notifier.dispatch(
            deleted
                .iter()
                .map(|lot| {
                    CostingEvent::LotDeleted(LotDeleted {
                        lot_id: lot.id_typed(),
                        product_id: lot.product_id(),
                        occurred_at: Utc::now(),
                    })
                })
                .collect(),
        );
        Ok(deleted)
    }
}

/// Write a new lot plus its IN movement, rejecting a lot code already in use.
fn stage_lot(tx: &mut impl LedgerTx, lot: InventoryLot) -> EngineResult<InventoryLot> {
    if tx.lot_by_code(lot.lot_code())?.is_some() {
        return Err(DomainError::duplicate("lot", lot.lot_code()).into());
    }
    tx.put_movement(InventoryMovement::inbound(MovementId::new(), &lot))?;
    tx.put_lot(lot.clone())?;
    Ok(lot)
}

fn remove_lot(tx: &mut impl LedgerTx, lot_id: LotId) -> EngineResult<InventoryLot> {
    let lot = tx
        .lot(lot_id)?
        .ok_or_else(|| DomainError::not_found("lot", lot_id))?;
    lot.ensure_deletable()?;

    // Distribution rows are snapshots that must keep summing to the month's fee.
    if let Some(distribution) = tx.distributions_for_lot(lot_id)?.first() {
        return Err(DomainError::business(format!(
            "lot {} carries the {} warehouse fee distribution and cannot be deleted",
            lot.lot_code(),
            distribution.year_month
        ))
        .into());
    }

    for movement in tx.movements_for_lot(lot_id)? {
        tx.remove_movement(movement.id_typed())?;
    }
    let purchases = tx.sales_records(&RecordFilter {
        lot_id: Some(lot_id),
        ..RecordFilter::default()
    })?;
    for purchase in purchases
        .iter()
        .filter(|r| r.record_type() == RecordType::Purchase)
    {
        remove_purchase(tx, purchase.id_typed())?;
    }
    tx.remove_lot(lot_id)?;
    Ok(lot)
}

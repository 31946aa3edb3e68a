//! Costing services. Each runs its domain logic inside a ledger transaction,
//! commits, then hands the resulting events to the [`CommitNotifier`].
//!
//! [`CommitNotifier`]: crate::notify::CommitNotifier

pub mod cost_propagation;
pub mod inbound;
pub mod outbound;
pub mod query;
pub mod warehouse_fee;

pub use cost_propagation::{AutoLinkHook, CostPropagator, RecordSale};
pub use inbound::{InboundReceiver, ReceiveShipment, ShipmentItem, ShipmentReceipt};
pub use outbound::{AllocateOutbound, OutboundAllocator, OutboundResult, PreviewOutbound, Reversal, SaleContext};
pub use query::{
    InventoryQuery, InventoryQueryService, InventorySummary, LotDetail, LotView, Page,
    ProductInventory,
};
pub use warehouse_fee::WarehouseFeeDistributor;

use chrono::Utc;

use tradeerp_core::{DomainError, ProductId};
use tradeerp_events::{CostingEvent, LotReceived};
use tradeerp_inventory::InventoryLot;
use tradeerp_products::Product;

use crate::error::EngineResult;
use crate::ledger::LedgerTx;

/// Load a product the operation depends on; unknown ids are invalid input.
pub(crate) fn require_product(tx: &mut impl LedgerTx, product_id: ProductId) -> EngineResult<Product> {
    tx.product(product_id)?.ok_or_else(|| {
        DomainError::validation("product_id", format!("unknown product {product_id}")).into()
    })
}

pub(crate) fn lot_received(lot: &InventoryLot) -> CostingEvent {
    CostingEvent::LotReceived(LotReceived {
        lot_id: lot.id_typed(),
        product_id: lot.product_id(),
        receipt_id: lot.receipt_id(),
        lot_code: lot.lot_code().to_string(),
        quantity: lot.quantity_received(),
        unit_cost: lot.unit_cost(),
        received_date: lot.received_date(),
        occurred_at: Utc::now(),
    })
}

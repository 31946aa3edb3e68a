//! Facts emitted by the costing engine after a transaction commits.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{LotId, MovementId, ProductId, ReceiptId, SalesRecordId, VendorId};

use crate::Event;

/// Event: a lot was created by the inbound receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotReceived {
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub receipt_id: Option<ReceiptId>,
    pub lot_code: String,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub received_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: stock was consumed FIFO for an outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundAllocated {
    pub product_id: ProductId,
    pub quantity: i64,
    pub total_cost: Decimal,
    pub movement_ids: Vec<MovementId>,
    pub sale_record_id: Option<SalesRecordId>,
    pub outbound_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: an outbound movement was reversed and its quantity restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReversed {
    pub movement_id: MovementId,
    pub lot_id: LotId,
    pub quantity: i64,
    pub deleted_sale_record_id: Option<SalesRecordId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a month's warehouse fee was spread over open lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDistributed {
    pub year_month: String,
    pub total_fee: Decimal,
    pub lot_count: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a never-consumed lot was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDeleted {
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a SALES ledger entry was recorded outside FIFO outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_record_id: SalesRecordId,
    pub product_id: ProductId,
    pub vendor_id: Option<VendorId>,
    pub quantity: i64,
    pub sale_date: NaiveDate,
    /// Purchase price to use for the auto-generated purchase instead of the
    /// product's default purchase price.
    pub purchase_price_override: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostingEvent {
    LotReceived(LotReceived),
    OutboundAllocated(OutboundAllocated),
    OutboundReversed(OutboundReversed),
    FeeDistributed(FeeDistributed),
    LotDeleted(LotDeleted),
    SaleRecorded(SaleRecorded),
}

impl Event for CostingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CostingEvent::LotReceived(_) => "inventory.lot.received",
            CostingEvent::OutboundAllocated(_) => "inventory.outbound.allocated",
            CostingEvent::OutboundReversed(_) => "inventory.outbound.reversed",
            CostingEvent::FeeDistributed(_) => "inventory.warehouse_fee.distributed",
            CostingEvent::LotDeleted(_) => "inventory.lot.deleted",
            CostingEvent::SaleRecorded(_) => "sales.record.sale_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CostingEvent::LotReceived(e) => e.occurred_at,
            CostingEvent::OutboundAllocated(e) => e.occurred_at,
            CostingEvent::OutboundReversed(e) => e.occurred_at,
            CostingEvent::FeeDistributed(e) => e.occurred_at,
            CostingEvent::LotDeleted(e) => e.occurred_at,
            CostingEvent::SaleRecorded(e) => e.occurred_at,
        }
    }
}

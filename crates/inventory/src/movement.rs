use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{
    DomainError, DomainResult, Entity, LotId, MovementId, ProductId, SalesRecordId, SalespersonId,
    VendorId,
};

use crate::lot::InventoryLot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementDirection {
    In,
    Out,
}

/// Input for an outbound movement against one lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMovement {
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub movement_date: NaiveDate,
    pub sale_record_id: Option<SalesRecordId>,
    pub vendor_id: Option<VendorId>,
    pub salesperson_id: Option<SalespersonId>,
    pub notes: Option<String>,
}

/// Immutable audit row for one inbound or outbound event against one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    id: MovementId,
    lot_id: LotId,
    product_id: ProductId,
    direction: MovementDirection,
    quantity: i64,
    unit_cost: Decimal,
    total_cost: Decimal,
    movement_date: NaiveDate,
    sale_record_id: Option<SalesRecordId>,
    vendor_id: Option<VendorId>,
    salesperson_id: Option<SalespersonId>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// The IN row written together with a freshly received lot.
    pub fn inbound(id: MovementId, lot: &InventoryLot) -> Self {
        Self {
            id,
            lot_id: lot.id_typed(),
            product_id: lot.product_id(),
            direction: MovementDirection::In,
            quantity: lot.quantity_received(),
            unit_cost: lot.unit_cost(),
            total_cost: lot.costs().total(),
            movement_date: lot.received_date(),
            sale_record_id: None,
            vendor_id: None,
            salesperson_id: None,
            notes: lot.notes().map(str::to_string),
            created_at: Utc::now(),
        }
    }

    pub fn outbound(id: MovementId, input: OutboundMovement) -> Self {
        Self {
            id,
            lot_id: input.lot_id,
            product_id: input.product_id,
            direction: MovementDirection::Out,
            quantity: input.quantity,
            unit_cost: input.unit_cost,
            total_cost: input.total_cost,
            movement_date: input.movement_date,
            sale_record_id: input.sale_record_id,
            vendor_id: input.vendor_id,
            salesperson_id: input.salesperson_id,
            notes: input.notes,
            created_at: Utc::now(),
        }
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn direction(&self) -> MovementDirection {
        self.direction
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn movement_date(&self) -> NaiveDate {
        self.movement_date
    }

    pub fn sale_record_id(&self) -> Option<SalesRecordId> {
        self.sale_record_id
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn salesperson_id(&self) -> Option<SalespersonId> {
        self.salesperson_id
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ensure_reversible(&self) -> DomainResult<()> {
        if self.direction != MovementDirection::Out {
            return Err(DomainError::business(format!(
                "movement {} is not an outbound movement and cannot be reversed",
                self.id
            )));
        }
        Ok(())
    }
}

impl Entity for InventoryMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

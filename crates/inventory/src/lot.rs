use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{
    DomainError, DomainResult, Entity, LotId, ProductId, ReceiptId, ensure_non_negative,
    ensure_positive_quantity,
};

use crate::landed_cost::LandedCost;

/// Where a lot is physically held. Only warehouse lots carry storage fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageLocation {
    Warehouse,
    Office,
}

/// Input for receiving one lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveLot {
    pub product_id: ProductId,
    pub receipt_id: Option<ReceiptId>,
    pub lot_code: Option<String>,
    pub received_date: NaiveDate,
    pub quantity: i64,
    pub costs: LandedCost,
    pub storage_location: StorageLocation,
    pub notes: Option<String>,
}

/// A cost-bearing batch of one product received on one date.
///
/// Invariants:
/// - `0 <= quantity_remaining <= quantity_received`
/// - `unit_cost` is fixed at creation from the landed-cost components
/// - `warehouse_fee` only grows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLot {
    id: LotId,
    product_id: ProductId,
    receipt_id: Option<ReceiptId>,
    lot_code: String,
    received_date: NaiveDate,
    quantity_received: i64,
    quantity_remaining: i64,
    storage_location: StorageLocation,
    costs: LandedCost,
    unit_cost: Decimal,
    warehouse_fee: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl InventoryLot {
    /// Create a lot with all of its quantity still on hand.
    pub fn receive(id: LotId, input: ReceiveLot) -> DomainResult<Self> {
        ensure_positive_quantity("quantity_received", input.quantity)?;
        input.costs.validate()?;

        let lot_code = match input.lot_code {
            Some(code) if code.trim().is_empty() => {
                return Err(DomainError::validation("lot_code", "cannot be blank"));
            }
            Some(code) => code.trim().to_string(),
            None => generate_lot_code(id, input.received_date),
        };

        let unit_cost = input.costs.total() / Decimal::from(input.quantity);

        Ok(Self {
            id,
            product_id: input.product_id,
            receipt_id: input.receipt_id,
            lot_code,
            received_date: input.received_date,
            quantity_received: input.quantity,
            quantity_remaining: input.quantity,
            storage_location: input.storage_location,
            costs: input.costs,
            unit_cost,
            warehouse_fee: Decimal::ZERO,
            notes: input.notes,
            created_at: Utc::now(),
        })
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn receipt_id(&self) -> Option<ReceiptId> {
        self.receipt_id
    }

    pub fn lot_code(&self) -> &str {
        &self.lot_code
    }

    pub fn received_date(&self) -> NaiveDate {
        self.received_date
    }

    pub fn quantity_received(&self) -> i64 {
        self.quantity_received
    }

    pub fn quantity_remaining(&self) -> i64 {
        self.quantity_remaining
    }

    pub fn storage_location(&self) -> StorageLocation {
        self.storage_location
    }

    pub fn costs(&self) -> &LandedCost {
        &self.costs
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn warehouse_fee(&self) -> Decimal {
        self.warehouse_fee
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_open(&self) -> bool {
        self.quantity_remaining > 0
    }

    /// Nothing has been consumed yet, so the lot may still be deleted.
    pub fn is_untouched(&self) -> bool {
        self.quantity_remaining == self.quantity_received
    }

    /// Base unit cost plus the accumulated fee spread over what is left now.
    pub fn effective_unit_cost(&self) -> Decimal {
        if self.quantity_remaining <= 0 {
            return self.unit_cost;
        }
        self.unit_cost + self.warehouse_fee / Decimal::from(self.quantity_remaining)
    }

    /// Sort key for FIFO consumption: oldest receipt first, lot id breaks ties.
    pub fn fifo_key(&self) -> (NaiveDate, LotId) {
        (self.received_date, self.id)
    }

    pub fn consume(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive_quantity("quantity", quantity)?;
        if quantity > self.quantity_remaining {
            return Err(DomainError::InsufficientStock {
                available: self.quantity_remaining,
                requested: quantity,
            });
        }
        self.quantity_remaining -= quantity;
        Ok(())
    }

    /// Put back quantity taken by an outbound that is being reversed.
    pub fn restore(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive_quantity("quantity", quantity)?;
        if self.quantity_remaining + quantity > self.quantity_received {
            return Err(DomainError::business(format!(
                "restoring {quantity} to lot {} would exceed its received quantity ({} of {} remaining)",
                self.lot_code, self.quantity_remaining, self.quantity_received
            )));
        }
        self.quantity_remaining += quantity;
        Ok(())
    }

    pub fn accrue_fee(&mut self, amount: Decimal) -> DomainResult<()> {
        ensure_non_negative("warehouse_fee", amount)?;
        self.warehouse_fee += amount;
        Ok(())
    }

    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if !self.is_untouched() {
            return Err(DomainError::business(format!(
                "lot {} has been consumed ({} of {} remaining) and cannot be deleted",
                self.lot_code, self.quantity_remaining, self.quantity_received
            )));
        }
        Ok(())
    }
}

impl Entity for InventoryLot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn generate_lot_code(id: LotId, received_date: NaiveDate) -> String {
    let simple = id.as_uuid().simple().to_string();
    let suffix = &simple[simple.len().saturating_sub(8)..];
    format!("LOT-{}-{}", received_date.format("%Y%m%d"), suffix.to_uppercase())
}

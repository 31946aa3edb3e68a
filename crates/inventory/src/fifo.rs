//! FIFO allocation plan.
//!
//! The plan is computed from a snapshot of candidate lots and applied by the
//! caller inside the same transaction; computing it never mutates anything.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{DomainError, DomainResult, LotId, ensure_positive_quantity, round_money};

use crate::lot::InventoryLot;

/// Quantity taken from one lot and what it costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub lot_id: LotId,
    pub lot_code: String,
    pub received_date: NaiveDate,
    pub quantity: i64,
    /// Lot quantity before this slice was taken.
    pub remaining_before: i64,
    pub base_unit_cost: Decimal,
    pub fee_per_unit: Decimal,
    pub effective_unit_cost: Decimal,
    pub total_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub requested: i64,
    pub available: i64,
    pub slices: Vec<AllocationSlice>,
    pub total_cost: Decimal,
}

impl AllocationPlan {
    pub fn allocated_quantity(&self) -> i64 {
        self.slices.iter().map(|s| s.quantity).sum()
    }
}

/// Plan a FIFO outbound of `requested` units over `candidates`.
///
/// Candidates are expected to be pre-filtered to one product (and location).
/// Closed lots are ignored. Lots are consumed oldest receipt first, ties broken
/// by ascending lot id. Fails with `InsufficientStock` when the open quantity
/// does not cover the request.
pub fn plan_outbound<'a>(
    candidates: impl IntoIterator<Item = &'a InventoryLot>,
    requested: i64,
    scale: u32,
) -> DomainResult<AllocationPlan> {
    ensure_positive_quantity("quantity", requested)?;

    let mut open: Vec<&InventoryLot> = candidates.into_iter().filter(|l| l.is_open()).collect();
    open.sort_by_key(|l| l.fifo_key());

    let available: i64 = open.iter().map(|l| l.quantity_remaining()).sum();
    if available < requested {
        return Err(DomainError::InsufficientStock {
            available,
            requested,
        });
    }

    let mut outstanding = requested;
    let mut slices = Vec::new();
    for lot in open {
        if outstanding == 0 {
            break;
        }
        let take = outstanding.min(lot.quantity_remaining());
        slices.push(slice_of(lot, take, scale));
        outstanding -= take;
    }

    let total_cost = slices.iter().map(|s| s.total_cost).sum();
    Ok(AllocationPlan {
        requested,
        available,
        slices,
        total_cost,
    })
}

fn slice_of(lot: &InventoryLot, quantity: i64, scale: u32) -> AllocationSlice {
    let remaining = Decimal::from(lot.quantity_remaining());
    let qty = Decimal::from(quantity);
    let fee_per_unit = lot.warehouse_fee() / remaining;
    let total_cost = round_money(lot.unit_cost() * qty + lot.warehouse_fee() * qty / remaining, scale);

    AllocationSlice {
        lot_id: lot.id_typed(),
        lot_code: lot.lot_code().to_string(),
        received_date: lot.received_date(),
        quantity,
        remaining_before: lot.quantity_remaining(),
        base_unit_cost: lot.unit_cost(),
        fee_per_unit,
        effective_unit_cost: lot.effective_unit_cost(),
        total_cost,
    }
}

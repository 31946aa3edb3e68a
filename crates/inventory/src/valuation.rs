use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{ProductId, round_money};

use crate::lot::InventoryLot;

/// On-hand position of one product, derived from its open lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotValuation {
    pub product_id: ProductId,
    pub total_remaining: i64,
    pub lot_count: usize,
    /// Quantity-weighted base unit cost.
    pub average_unit_cost: Decimal,
    /// `average_unit_cost` plus outstanding fees spread over what is left.
    pub average_unit_cost_with_fee: Decimal,
    pub total_value: Decimal,
    pub total_value_with_fee: Decimal,
    pub outstanding_fee: Decimal,
}

impl LotValuation {
    /// Aggregate the open lots of `product_id` among `lots`. Lots of other
    /// products and exhausted lots are ignored.
    pub fn from_lots<'a>(
        product_id: ProductId,
        lots: impl IntoIterator<Item = &'a InventoryLot>,
        scale: u32,
    ) -> Self {
        let mut total_remaining = 0i64;
        let mut lot_count = 0usize;
        let mut base_value = Decimal::ZERO;
        let mut outstanding_fee = Decimal::ZERO;

        for lot in lots {
            if lot.product_id() != product_id || !lot.is_open() {
                continue;
            }
            lot_count += 1;
            total_remaining += lot.quantity_remaining();
            base_value += lot.unit_cost() * Decimal::from(lot.quantity_remaining());
            outstanding_fee += lot.warehouse_fee();
        }

        let (average_unit_cost, average_unit_cost_with_fee) = if total_remaining > 0 {
            let qty = Decimal::from(total_remaining);
            let avg = base_value / qty;
            (avg, avg + outstanding_fee / qty)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        Self {
            product_id,
            total_remaining,
            lot_count,
            average_unit_cost: round_money(average_unit_cost, scale),
            average_unit_cost_with_fee: round_money(average_unit_cost_with_fee, scale),
            total_value: round_money(base_value, scale),
            total_value_with_fee: round_money(base_value + outstanding_fee, scale),
            outstanding_fee: round_money(outstanding_fee, scale),
        }
    }

    /// Unrounded average effective cost, used when costing a manual sale.
    pub fn derived_unit_cost<'a>(
        product_id: ProductId,
        lots: impl IntoIterator<Item = &'a InventoryLot>,
    ) -> Option<Decimal> {
        let mut qty = 0i64;
        let mut value = Decimal::ZERO;
        for lot in lots {
            if lot.product_id() == product_id && lot.is_open() {
                qty += lot.quantity_remaining();
                value += lot.unit_cost() * Decimal::from(lot.quantity_remaining()) + lot.warehouse_fee();
            }
        }
        (qty > 0).then(|| value / Decimal::from(qty))
    }

    pub fn is_empty(&self) -> bool {
        self.total_remaining == 0
    }
}

//! Landed-cost components and their distribution over multi-item receipts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{DomainError, DomainResult, ensure_non_negative, ensure_positive_quantity};

use crate::split::split_proportionally;

/// The four cost components that make up a lot's landed cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCost {
    pub goods_amount: Decimal,
    pub duty_amount: Decimal,
    pub domestic_freight: Decimal,
    pub other_cost: Decimal,
}

impl LandedCost {
    pub fn new(
        goods_amount: Decimal,
        duty_amount: Decimal,
        domestic_freight: Decimal,
        other_cost: Decimal,
    ) -> Self {
        Self {
            goods_amount,
            duty_amount,
            domestic_freight,
            other_cost,
        }
    }

    pub fn goods_only(goods_amount: Decimal) -> Self {
        Self::new(goods_amount, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    }

    pub fn total(&self) -> Decimal {
        self.goods_amount + self.duty_amount + self.domestic_freight + self.other_cost
    }

    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_negative("goods_amount", self.goods_amount)?;
        ensure_non_negative("duty_amount", self.duty_amount)?;
        ensure_non_negative("domestic_freight", self.domestic_freight)?;
        ensure_non_negative("other_cost", self.other_cost)?;
        Ok(())
    }
}

/// Shipment-level costs that still have to be spread over the items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCosts {
    pub duty_amount: Decimal,
    pub domestic_freight: Decimal,
    pub other_cost: Decimal,
}

impl HeaderCosts {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_negative("duty_amount", self.duty_amount)?;
        ensure_non_negative("domestic_freight", self.domestic_freight)?;
        ensure_non_negative("other_cost", self.other_cost)?;
        Ok(())
    }
}

/// One item of a multi-item receipt, as far as cost distribution cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipmentLine {
    pub quantity: i64,
    pub goods_amount: Decimal,
}

/// How header costs are spread over the items of a receipt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandedCostPolicy {
    /// Same share for every item regardless of size.
    EvenSplit,
    /// Share of goods value; share of quantity when the receipt has no value.
    #[default]
    Weighted,
}

/// Landed cost per item: its own goods amount plus its share of the header.
///
/// Each header component is rounded to `scale` per item with the residual on
/// the last item, so item sums equal the header totals.
pub fn distribute_header_costs(
    lines: &[ShipmentLine],
    header: &HeaderCosts,
    policy: LandedCostPolicy,
    scale: u32,
) -> DomainResult<Vec<LandedCost>> {
    if lines.is_empty() {
        return Err(DomainError::validation("items", "a receipt needs at least one item"));
    }
    header.validate()?;
    for line in lines {
        ensure_positive_quantity("quantity", line.quantity)?;
        ensure_non_negative("goods_amount", line.goods_amount)?;
    }

    let weights = line_weights(lines, policy);
    let last = lines.len() - 1;
    let duty = split_proportionally(header.duty_amount, &weights, scale, last);
    let freight = split_proportionally(header.domestic_freight, &weights, scale, last);
    let other = split_proportionally(header.other_cost, &weights, scale, last);

    Ok(lines
        .iter()
        .enumerate()
        .map(|(i, line)| LandedCost::new(line.goods_amount, duty[i], freight[i], other[i]))
        .collect())
}

fn line_weights(lines: &[ShipmentLine], policy: LandedCostPolicy) -> Vec<Decimal> {
    match policy {
        LandedCostPolicy::EvenSplit => vec![Decimal::ONE; lines.len()],
        LandedCostPolicy::Weighted => {
            let total_value: Decimal = lines.iter().map(|l| l.goods_amount).sum();
            if total_value.is_zero() {
                lines.iter().map(|l| Decimal::from(l.quantity)).collect()
            } else {
                lines.iter().map(|l| l.goods_amount).collect()
            }
        }
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{
    DomainError, DomainResult, Entity, LotId, ProductId, ReceiptId, SalesRecordId, SalespersonId,
    VendorId, ensure_non_negative, ensure_positive_quantity, round_money,
};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Purchase,
    Sales,
}

/// Which path created a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Entered by a user.
    Manual,
    /// Generated for a lot whose product has a default purchase vendor.
    InboundAuto,
    /// Generated as the purchase counterpart of a manual sale.
    SaleAuto,
    /// Created while posting a multi-item goods receipt.
    Shipment,
    /// Created by a FIFO outbound that was a sale.
    FifoOutbound,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Manual => "manual",
            Provenance::InboundAuto => "inbound-auto",
            Provenance::SaleAuto => "sale-auto",
            Provenance::Shipment => "shipment",
            Provenance::FifoOutbound => "fifo-outbound",
        }
    }
}

/// Margin derived from a sale amount and its recorded cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginFigures {
    pub margin: Decimal,
    /// Percentage of the sale amount; zero when the amount is zero.
    pub margin_rate: Decimal,
}

pub fn compute_margin(amount: Decimal, cost: Decimal, scale: u32) -> MarginFigures {
    let margin = round_money(amount - cost, scale);
    let margin_rate = if amount.is_zero() {
        Decimal::ZERO
    } else {
        round_money(margin / amount * Decimal::ONE_HUNDRED, 2)
    };
    MarginFigures {
        margin,
        margin_rate,
    }
}

/// Input for a SALES entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDraft {
    pub product_id: ProductId,
    pub vendor_id: Option<VendorId>,
    pub salesperson_id: Option<SalespersonId>,
    pub sale_date: NaiveDate,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Total recorded cost for the whole quantity.
    pub cost: Decimal,
    pub provenance: Provenance,
    pub notes: Option<String>,
}

/// Input for a PURCHASE entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDraft {
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub purchase_date: NaiveDate,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub provenance: Provenance,
    pub lot_id: Option<LotId>,
    pub receipt_id: Option<ReceiptId>,
    pub notes: Option<String>,
}

/// Unified PURCHASE/SALES ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    id: SalesRecordId,
    record_type: RecordType,
    product_id: ProductId,
    vendor_id: Option<VendorId>,
    salesperson_id: Option<SalespersonId>,
    record_date: NaiveDate,
    quantity: i64,
    unit_price: Decimal,
    amount: Decimal,
    cost: Decimal,
    margin: Decimal,
    margin_rate: Decimal,
    provenance: Provenance,
    /// On a SALES entry: the PURCHASE entry generated for it. Never set on a
    /// PURCHASE entry; the link only points sale → purchase.
    linked_purchase_id: Option<SalesRecordId>,
    lot_id: Option<LotId>,
    receipt_id: Option<ReceiptId>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl SalesRecord {
    pub fn sale(id: SalesRecordId, draft: SaleDraft, scale: u32) -> DomainResult<Self> {
        ensure_positive_quantity("quantity", draft.quantity)?;
        ensure_non_negative("unit_price", draft.unit_price)?;
        ensure_non_negative("cost", draft.cost)?;

        let amount = round_money(draft.unit_price * Decimal::from(draft.quantity), scale);
        let cost = round_money(draft.cost, scale);
        let MarginFigures {
            margin,
            margin_rate,
        } = compute_margin(amount, cost, scale);

        Ok(Self {
            id,
            record_type: RecordType::Sales,
            product_id: draft.product_id,
            vendor_id: draft.vendor_id,
            salesperson_id: draft.salesperson_id,
            record_date: draft.sale_date,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            amount,
            cost,
            margin,
            margin_rate,
            provenance: draft.provenance,
            linked_purchase_id: None,
            lot_id: None,
            receipt_id: None,
            notes: draft.notes,
            created_at: Utc::now(),
        })
    }

    pub fn purchase(id: SalesRecordId, draft: PurchaseDraft, scale: u32) -> DomainResult<Self> {
        ensure_positive_quantity("quantity", draft.quantity)?;
        ensure_non_negative("unit_price", draft.unit_price)?;

        let amount = round_money(draft.unit_price * Decimal::from(draft.quantity), scale);

        Ok(Self {
            id,
            record_type: RecordType::Purchase,
            product_id: draft.product_id,
            vendor_id: Some(draft.vendor_id),
            salesperson_id: None,
            record_date: draft.purchase_date,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            amount,
            cost: amount,
            margin: Decimal::ZERO,
            margin_rate: Decimal::ZERO,
            provenance: draft.provenance,
            linked_purchase_id: None,
            lot_id: draft.lot_id,
            receipt_id: draft.receipt_id,
            notes: draft.notes,
            created_at: Utc::now(),
        })
    }

    pub fn id_typed(&self) -> SalesRecordId {
        self.id
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn is_sale(&self) -> bool {
        self.record_type == RecordType::Sales
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn salesperson_id(&self) -> Option<SalespersonId> {
        self.salesperson_id
    }

    pub fn record_date(&self) -> NaiveDate {
        self.record_date
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }

    pub fn margin(&self) -> Decimal {
        self.margin
    }

    pub fn margin_rate(&self) -> Decimal {
        self.margin_rate
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn linked_purchase_id(&self) -> Option<SalesRecordId> {
        self.linked_purchase_id
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    pub fn receipt_id(&self) -> Option<ReceiptId> {
        self.receipt_id
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Point this sale at the purchase generated for it.
    pub fn link_purchase(&mut self, purchase_id: SalesRecordId) -> DomainResult<()> {
        if !self.is_sale() {
            return Err(DomainError::business(format!(
                "record {} is a purchase; only sales can link a purchase",
                self.id
            )));
        }
        if let Some(existing) = self.linked_purchase_id {
            return Err(DomainError::business(format!(
                "sale {} is already linked to purchase {existing}",
                self.id
            )));
        }
        self.linked_purchase_id = Some(purchase_id);
        Ok(())
    }

    /// Drop the link after the linked purchase was deleted on its own.
    pub fn clear_purchase_link(&mut self) {
        self.linked_purchase_id = None;
    }
}

impl Entity for SalesRecord {
    type Id = SalesRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

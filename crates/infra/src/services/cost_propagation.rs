//! Cost propagator: recorded cost on sales, auto-linked ledger entries, and
//! cascade deletion along sale → purchase links.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tradeerp_core::{
    DomainError, ProductId, SalesRecordId, SalespersonId, VendorId, ensure_non_negative,
};
use tradeerp_events::{
    CostingEvent, Event, HookError, LotReceived, PostCommitHook, SaleRecorded,
};
use tradeerp_inventory::LotValuation;
use tradeerp_products::Product;
use tradeerp_sales::{Provenance, PurchaseDraft, RecordType, SaleDraft, SalesRecord};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::{LedgerTx, LotFilter, LotLedger, RecordFilter};
use crate::notify::CommitNotifier;
use crate::transaction::{read, run_in_tx};

use super::require_product;

/// A manually entered sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub product_id: ProductId,
    pub vendor_id: Option<VendorId>,
    pub salesperson_id: Option<SalespersonId>,
    pub sale_date: NaiveDate,
    pub quantity: i64,
    /// Defaults to the product's resolved sales price for the vendor and date.
    pub unit_price: Option<Decimal>,
    /// Total cost used only when the product has neither open lots nor a
    /// default purchase price.
    pub manual_cost: Option<Decimal>,
    /// Unit price for the auto-generated purchase instead of the default.
    pub purchase_price_override: Option<Decimal>,
    pub notes: Option<String>,
}

pub struct CostPropagator<L> {
    ledger: Arc<L>,
    config: Arc<EngineConfig>,
    notifier: Arc<CommitNotifier>,
}

impl<L: LotLedger> CostPropagator<L> {
    pub fn new(ledger: Arc<L>, config: Arc<EngineConfig>, notifier: Arc<CommitNotifier>) -> Self {
        Self {
            ledger,
            config,
            notifier,
        }
    }

    /// Record a SALES entry with cost resolved from stock, defaults or input.
    ///
    /// The purchase counterpart is created after commit by [`AutoLinkHook`];
    /// the returned entry reflects the link if one was made.
    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub fn record_sale(&self, request: RecordSale) -> EngineResult<SalesRecord> {
        if let Some(cost) = request.manual_cost {
            ensure_non_negative("manual_cost", cost)?;
        }
        if let Some(price) = request.purchase_price_override {
            ensure_non_negative("purchase_price_override", price)?;
        }
        let scale = self.config.currency_scale;

        let sale = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "record_sale", |tx| {
            let product = require_product(tx, request.product_id)?;
            let unit_price = request
                .unit_price
                .unwrap_or_else(|| product.resolve_sales_price(request.vendor_id, request.sale_date));
            let cost = resolve_sale_cost(tx, &product, request.quantity, request.manual_cost)?;

            let sale = SalesRecord::sale(
                SalesRecordId::new(),
                SaleDraft {
                    product_id: request.product_id,
                    vendor_id: request.vendor_id,
                    salesperson_id: request.salesperson_id,
                    sale_date: request.sale_date,
                    quantity: request.quantity,
                    unit_price,
                    cost,
                    provenance: Provenance::Manual,
                    notes: request.notes.clone(),
                },
                scale,
            )?;
            tx.put_sales_record(sale.clone())?;
            Ok(sale)
        })?;

        info!(sale_record_id = %sale.id_typed(), cost = %sale.cost(), margin = %sale.margin(), "sale recorded");
        self.notifier
            .dispatch(vec![CostingEvent::SaleRecorded(SaleRecorded {
                sale_record_id: sale.id_typed(),
                product_id: sale.product_id(),
                vendor_id: sale.vendor_id(),
                quantity: sale.quantity(),
                sale_date: sale.record_date(),
                purchase_price_override: request.purchase_price_override,
                occurred_at: Utc::now(),
            })]);

        let id = sale.id_typed();
        Ok(read(&*self.ledger, |tx| Ok(tx.sales_record(id)?))?.unwrap_or(sale))
    }

    /// Delete a ledger entry. A sale takes its linked purchase with it; a
    /// purchase only clears the link of the sale pointing at it.
    ///
    /// Sales recorded by a FIFO outbound are removed by reversing the outbound.
    #[tracing::instrument(skip(self))]
    pub fn delete_sales_record(&self, id: SalesRecordId) -> EngineResult<Vec<SalesRecordId>> {
        let deleted = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "delete_sales_record", |tx| {
            let record = tx
                .sales_record(id)?
                .ok_or_else(|| DomainError::not_found("sales record", id))?;
            match record.record_type() {
                RecordType::Sales => {
                    if !tx.movements_for_sale(id)?.is_empty() {
                        return Err(DomainError::business(format!(
                            "sale {id} still has outbound movements; reverse the outbound instead"
                        ))
                        .into());
                    }
                    remove_sale(tx, id)
                }
                RecordType::Purchase => {
                    remove_purchase(tx, id)?;
                    Ok(vec![id])
                }
            }
        })?;

        info!(deleted = deleted.len(), "sales record deleted");
        Ok(deleted)
    }

    /// Point a sale at an existing purchase.
    #[tracing::instrument(skip(self))]
    pub fn link_purchase(&self, sale_id: SalesRecordId, purchase_id: SalesRecordId) -> EngineResult<SalesRecord> {
        run_in_tx(&*self.ledger, self.config.max_conflict_retries, "link_purchase", |tx| {
            let mut sale = tx
                .sales_record(sale_id)?
                .ok_or_else(|| DomainError::not_found("sales record", sale_id))?;
            let purchase = tx
                .sales_record(purchase_id)?
                .ok_or_else(|| DomainError::not_found("sales record", purchase_id))?;
            if purchase.record_type() != RecordType::Purchase {
                return Err(DomainError::business(format!(
                    "record {purchase_id} is a sale and cannot be linked as a purchase"
                ))
                .into());
            }
            sale.link_purchase(purchase_id)?;
            tx.put_sales_record(sale.clone())?;
            Ok(sale)
        })
    }

    /// Cost a sale of `quantity` would be recorded at right now.
    pub fn resolve_cost(
        &self,
        product_id: ProductId,
        quantity: i64,
        manual_cost: Option<Decimal>,
    ) -> EngineResult<Decimal> {
        read(&*self.ledger, |tx| {
            let product = require_product(tx, product_id)?;
            resolve_sale_cost(tx, &product, quantity, manual_cost)
        })
    }
}

/// Recorded cost for a sale, in order of preference: the derived average
/// effective cost of open lots, the default purchase price, the manual cost,
/// zero.
pub(crate) fn resolve_sale_cost(
    tx: &mut impl LedgerTx,
    product: &Product,
    quantity: i64,
    manual_cost: Option<Decimal>,
) -> EngineResult<Decimal> {
    let lots = tx.lots(&LotFilter::product(product.id_typed()).open())?;
    let unit_cost = LotValuation::derived_unit_cost(product.id_typed(), &lots)
        .or(product.default_purchase_price());
    Ok(match unit_cost {
        Some(unit) => unit * Decimal::from(quantity),
        None => manual_cost.unwrap_or(Decimal::ZERO),
    })
}

/// Delete a sale and the purchase it generated. Returns every deleted id.
pub(crate) fn remove_sale(tx: &mut impl LedgerTx, sale_id: SalesRecordId) -> EngineResult<Vec<SalesRecordId>> {
    let sale = tx
        .sales_record(sale_id)?
        .ok_or_else(|| DomainError::not_found("sales record", sale_id))?;
    tx.remove_sales_record(sale_id)?;

    let mut deleted = vec![sale_id];
    if let Some(purchase_id) = sale.linked_purchase_id() {
        if tx.sales_record(purchase_id)?.is_some() {
            remove_purchase(tx, purchase_id)?;
            deleted.push(purchase_id);
        }
    }
    Ok(deleted)
}

/// Delete a purchase and clear any sale link pointing at it.
pub(crate) fn remove_purchase(tx: &mut impl LedgerTx, purchase_id: SalesRecordId) -> EngineResult<()> {
    tx.remove_sales_record(purchase_id)?;
    let linking = tx.sales_records(&RecordFilter {
        linked_purchase_id: Some(purchase_id),
        ..RecordFilter::default()
    })?;
    for mut sale in linking {
        sale.clear_purchase_link();
        tx.put_sales_record(sale)?;
    }
    Ok(())
}

/// Creates the PURCHASE counterparts of received lots and manual sales.
///
/// Runs after the primary commit in its own transaction.
pub struct AutoLinkHook<L> {
    ledger: Arc<L>,
    config: Arc<EngineConfig>,
}

impl<L: LotLedger> AutoLinkHook<L> {
    const NAME: &'static str = "cost_propagation.auto_link";

    pub fn new(ledger: Arc<L>, config: Arc<EngineConfig>) -> Self {
        Self { ledger, config }
    }

    fn link_inbound(&self, event: &LotReceived) -> EngineResult<Option<SalesRecordId>> {
        let scale = self.config.currency_scale;
        run_in_tx(&*self.ledger, self.config.max_conflict_retries, "auto_link_inbound", |tx| {
            let Some(lot) = tx.lot(event.lot_id)? else {
                return Ok(None);
            };
            let Some(product) = tx.product(lot.product_id())? else {
                return Ok(None);
            };
            let Some(vendor_id) = product.purchase_vendor_id() else {
                return Ok(None);
            };

            let mut already_purchased = tx
                .sales_records(&RecordFilter {
                    lot_id: Some(lot.id_typed()),
                    ..RecordFilter::default()
                })?
                .iter()
                .any(|r| r.record_type() == RecordType::Purchase);
            if let Some(receipt_id) = lot.receipt_id() {
                already_purchased |= tx
                    .sales_records(&RecordFilter {
                        receipt_id: Some(receipt_id),
                        ..RecordFilter::default()
                    })?
                    .iter()
                    .any(|r| r.provenance() == Provenance::Shipment);
            }
            if already_purchased {
                debug!(lot_id = %lot.id_typed(), "lot already has purchase entries");
                return Ok(None);
            }

            let purchase = SalesRecord::purchase(
                SalesRecordId::new(),
                PurchaseDraft {
                    product_id: lot.product_id(),
                    vendor_id,
                    purchase_date: lot.received_date(),
                    quantity: lot.quantity_received(),
                    unit_price: lot.unit_cost(),
                    provenance: Provenance::InboundAuto,
                    lot_id: Some(lot.id_typed()),
                    receipt_id: lot.receipt_id(),
                    notes: None,
                },
                scale,
            )?;
            let id = purchase.id_typed();
            tx.put_sales_record(purchase)?;
            Ok(Some(id))
        })
    }

    fn link_sale(&self, event: &SaleRecorded) -> EngineResult<Option<SalesRecordId>> {
        let scale = self.config.currency_scale;
        run_in_tx(&*self.ledger, self.config.max_conflict_retries, "auto_link_sale", |tx| {
            let Some(mut sale) = tx.sales_record(event.sale_record_id)? else {
                return Ok(None);
            };
            if sale.linked_purchase_id().is_some() {
                return Ok(None);
            }
            let Some(product) = tx.product(event.product_id)? else {
                return Ok(None);
            };
            let Some(auto) = product.auto_purchase(event.purchase_price_override) else {
                debug!(product_id = %event.product_id, "product has no purchase vendor or price");
                return Ok(None);
            };

            let purchase = SalesRecord::purchase(
                SalesRecordId::new(),
                PurchaseDraft {
                    product_id: event.product_id,
                    vendor_id: auto.vendor_id,
                    purchase_date: event.sale_date,
                    quantity: event.quantity,
                    unit_price: auto.unit_price,
                    provenance: Provenance::SaleAuto,
                    lot_id: None,
                    receipt_id: None,
                    notes: None,
                },
                scale,
            )?;
            let id = purchase.id_typed();
            sale.link_purchase(id)?;
            tx.put_sales_record(purchase)?;
            tx.put_sales_record(sale)?;
            Ok(Some(id))
        })
    }
}

impl<L: LotLedger> PostCommitHook<CostingEvent> for AutoLinkHook<L> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn after_commit(&self, event: &CostingEvent) -> Result<(), HookError> {
        let created = match event {
            CostingEvent::LotReceived(e) if self.config.auto_link.inbound => self.link_inbound(e),
            CostingEvent::SaleRecorded(e) if self.config.auto_link.sales => self.link_sale(e),
            _ => Ok(None),
        }
        .map_err(|err| HookError::new(Self::NAME, err.to_string()))?;

        if let Some(purchase_id) = created {
            info!(
                purchase_id = %purchase_id,
                trigger = event.event_type(),
                "purchase entry auto-created"
            );
        }
        Ok(())
    }
}

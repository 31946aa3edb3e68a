//! FIFO outbound allocator.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tradeerp_core::{
    DomainError, LotId, MovementId, ProductId, SalesRecordId, SalespersonId, VendorId,
    ensure_positive_quantity,
};
use tradeerp_events::{CostingEvent, OutboundAllocated, OutboundReversed};
use tradeerp_inventory::{
    AllocationPlan, AllocationSlice, InventoryMovement, OutboundMovement, StorageLocation,
    plan_outbound,
};
use tradeerp_sales::{Provenance, SaleDraft, SalesRecord};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::{LedgerTx, LotFilter, LotLedger};
use crate::notify::CommitNotifier;
use crate::transaction::{read, run_in_tx};

use super::cost_propagation::remove_sale;
use super::require_product;

/// Present when the outbound is a sale; both parties are then required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleContext {
    pub vendor_id: Option<VendorId>,
    pub salesperson_id: Option<SalespersonId>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateOutbound {
    pub product_id: ProductId,
    pub quantity: i64,
    pub outbound_date: NaiveDate,
    pub storage_location: Option<StorageLocation>,
    pub sale: Option<SaleContext>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewOutbound {
    pub product_id: ProductId,
    pub quantity: i64,
    pub storage_location: Option<StorageLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundResult {
    pub product_id: ProductId,
    pub quantity: i64,
    pub total_cost: Decimal,
    /// Per-lot breakdown in consumption order.
    pub slices: Vec<AllocationSlice>,
    /// One OUT movement per slice, same order.
    pub movement_ids: Vec<MovementId>,
    pub sale_record_id: Option<SalesRecordId>,
}

/// Outcome of reversing one OUT movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reversal {
    pub movement_id: MovementId,
    pub lot_id: LotId,
    pub quantity: i64,
    /// Lot quantity after the restore.
    pub quantity_remaining: i64,
    pub deleted_sale_record_id: Option<SalesRecordId>,
}

pub struct OutboundAllocator<L> {
    ledger: Arc<L>,
    config: Arc<EngineConfig>,
    notifier: Arc<CommitNotifier>,
}

impl<L: LotLedger> OutboundAllocator<L> {
    pub fn new(ledger: Arc<L>, config: Arc<EngineConfig>, notifier: Arc<CommitNotifier>) -> Self {
        Self {
            ledger,
            config,
            notifier,
        }
    }

    /// Compute the allocation an outbound would make right now, without
    /// touching any lot.
    pub fn preview(&self, request: PreviewOutbound) -> EngineResult<AllocationPlan> {
        read(&*self.ledger, |tx| {
            require_product(tx, request.product_id)?;
            let filter = LotFilter::product(request.product_id)
                .located(request.storage_location)
                .open();
            let candidates = tx.lots(&filter)?;
            Ok(plan_outbound(&candidates, request.quantity, self.config.currency_scale)?)
        })
    }

    /// Consume open lots oldest-first and record one OUT movement per lot.
    ///
    /// Availability is checked and the lots are decremented in one
    /// transaction; a concurrent outbound on the same lots forces a retry, so
    /// stock can never be oversold. When `sale` is set a SALES entry is
    /// recorded for the whole quantity at the summed slice cost.
    #[tracing::instrument(
        skip(self, request),
        fields(product_id = %request.product_id, quantity = request.quantity)
    )]
    pub fn allocate(&self, request: AllocateOutbound) -> EngineResult<OutboundResult> {
        ensure_positive_quantity("quantity", request.quantity)?;
        let parties = match &request.sale {
            Some(sale) => Some(sale_parties(sale)?),
            None => None,
        };
        let scale = self.config.currency_scale;

        let result = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "allocate_outbound", |tx| {
            let product = require_product(tx, request.product_id)?;
            let filter = LotFilter::product(request.product_id)
                .located(request.storage_location)
                .open();
            let candidates = tx.lots(&filter)?;
            let plan = plan_outbound(&candidates, request.quantity, scale)?;

            let (vendor_id, salesperson_id) = match parties {
                Some((vendor, salesperson)) => (Some(vendor), Some(salesperson)),
                None => (None, None),
            };

            let sale_record_id = match &request.sale {
                Some(sale) => {
                    let unit_price = product.resolve_sales_price(vendor_id, request.outbound_date);
                    let record = SalesRecord::sale(
                        SalesRecordId::new(),
                        SaleDraft {
                            product_id: request.product_id,
                            vendor_id,
                            salesperson_id,
                            sale_date: request.outbound_date,
                            quantity: request.quantity,
                            unit_price,
                            cost: plan.total_cost,
                            provenance: Provenance::FifoOutbound,
                            notes: sale.notes.clone(),
                        },
                        scale,
                    )?;
                    let id = record.id_typed();
                    tx.put_sales_record(record)?;
                    Some(id)
                }
                None => None,
            };

            let mut movement_ids = Vec::with_capacity(plan.slices.len());
            for slice in &plan.slices {
                let mut lot = tx
                    .lot(slice.lot_id)?
                    .ok_or_else(|| DomainError::not_found("lot", slice.lot_id))?;
                lot.consume(slice.quantity)?;
                tx.put_lot(lot)?;

                let movement = InventoryMovement::outbound(
                    MovementId::new(),
                    OutboundMovement {
                        lot_id: slice.lot_id,
                        product_id: request.product_id,
                        quantity: slice.quantity,
                        unit_cost: slice.effective_unit_cost,
                        total_cost: slice.total_cost,
                        movement_date: request.outbound_date,
                        sale_record_id,
                        vendor_id,
                        salesperson_id,
                        notes: request.notes.clone(),
                    },
                );
                debug!(
                    lot_id = %slice.lot_id,
                    lot_code = %slice.lot_code,
                    quantity = slice.quantity,
                    unit_cost = %slice.effective_unit_cost,
                    total_cost = %slice.total_cost,
                    "fifo slice"
                );
                movement_ids.push(movement.id_typed());
                tx.put_movement(movement)?;
            }

            Ok(OutboundResult {
                product_id: request.product_id,
                quantity: plan.allocated_quantity(),
                total_cost: plan.total_cost,
                slices: plan.slices,
                movement_ids,
                sale_record_id,
            })
        })?;

        info!(
            lots = result.slices.len(),
            total_cost = %result.total_cost,
            sale_record_id = ?result.sale_record_id,
            "outbound allocated"
        );
        self.notifier
            .dispatch(vec![CostingEvent::OutboundAllocated(OutboundAllocated {
                product_id: result.product_id,
                quantity: result.quantity,
                total_cost: result.total_cost,
                movement_ids: result.movement_ids.clone(),
                sale_record_id: result.sale_record_id,
                outbound_date: request.outbound_date,
                occurred_at: Utc::now(),
            })]);
        Ok(result)
    }

    pub fn reverse(&self, movement_id: MovementId) -> EngineResult<Reversal> {
        let mut reversals = self.reverse_many(&[movement_id])?;
        reversals
            .pop()
            .ok_or_else(|| DomainError::not_found("movement", movement_id).into())
    }

    /// Reverse OUT movements: restore lot quantity and drop the movement.
    ///
    /// A SALES entry goes once no remaining movement references it, together
    /// with the purchase generated for it. All-or-nothing across the batch.
    #[tracing::instrument(skip(self, movement_ids), fields(count = movement_ids.len()))]
    pub fn reverse_many(&self, movement_ids: &[MovementId]) -> EngineResult<Vec<Reversal>> {
        if movement_ids.is_empty() {
            return Err(DomainError::validation("movement_ids", "at least one movement is required").into());
        }

        let reversals = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "reverse_outbound", |tx| {
            movement_ids
                .iter()
                .map(|id| reverse_one(tx, *id))
                .collect::<EngineResult<Vec<_>>>()
        })?;

        for r in &reversals {
            info!(
                movement_id = %r.movement_id,
                lot_id = %r.lot_id,
                quantity = r.quantity,
                deleted_sale_record_id = ?r.deleted_sale_record_id,
                "outbound reversed"
            );
        }
        self.notifier.dispatch(
            reversals
                .iter()
                .map(|r| {
                    CostingEvent::OutboundReversed(OutboundReversed {
                        movement_id: r.movement_id,
                        lot_id: r.lot_id,
                        quantity: r.quantity,
                        deleted_sale_record_id: r.deleted_sale_record_id,
                        occurred_at: Utc::now(),
                    })
                })
                .collect(),
        );
        Ok(reversals)
    }
}

fn sale_parties(sale: &SaleContext) -> EngineResult<(VendorId, SalespersonId)> {
    let vendor = sale
        .vendor_id
        .ok_or_else(|| DomainError::validation("vendor_id", "required when the outbound is a sale"))?;
    let salesperson = sale.salesperson_id.ok_or_else(|| {
        DomainError::validation("salesperson_id", "required when the outbound is a sale")
    })?;
    Ok((vendor, salesperson))
}

fn reverse_one(tx: &mut impl LedgerTx, movement_id: MovementId) -> EngineResult<Reversal> {
    let movement = tx
        .movement(movement_id)?
        .ok_or_else(|| DomainError::not_found("movement", movement_id))?;
    movement.ensure_reversible()?;

    let mut lot = tx
        .lot(movement.lot_id())?
        .ok_or_else(|| DomainError::not_found("lot", movement.lot_id()))?;
    lot.restore(movement.quantity())?;
    let quantity_remaining = lot.quantity_remaining();
    tx.put_lot(lot)?;
    tx.remove_movement(movement_id)?;

    let mut deleted_sale_record_id = None;
    if let Some(sale_id) = movement.sale_record_id() {
        if tx.movements_for_sale(sale_id)?.is_empty() && tx.sales_record(sale_id)?.is_some() {
            remove_sale(tx, sale_id)?;
            deleted_sale_record_id = Some(sale_id);
        }
    }

    Ok(Reversal {
        movement_id,
        lot_id: movement.lot_id(),
        quantity: movement.quantity(),
        quantity_remaining,
        deleted_sale_record_id,
    })
}

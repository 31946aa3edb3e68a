//! Read-side aggregation over the lot ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{DomainError, LotId, ProductId, SalesRecordId};
use tradeerp_inventory::{
    InventoryLot, InventoryMovement, LotValuation, StorageLocation, WarehouseFeeDistribution,
};
use tradeerp_products::Product;
use tradeerp_sales::SalesRecord;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::{LedgerTx, LotFilter, LotLedger, RecordFilter};
use crate::transaction::read;

const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryQuery {
    pub product_id: Option<ProductId>,
    pub storage_location: Option<StorageLocation>,
    /// Also list lots with nothing left.
    pub include_exhausted: bool,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for InventoryQuery {
    fn default() -> Self {
        Self {
            product_id: None,
            storage_location: None,
            include_exhausted: false,
            page: 1,
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Pages past the end come back empty.
    fn slice(all: Vec<T>, page: usize, page_size: usize) -> Self {
        let total_items = all.len();
        let total_pages = total_items.div_ceil(page_size);
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

/// One lot as shown in inventory listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotView {
    pub lot_id: LotId,
    pub lot_code: String,
    pub received_date: NaiveDate,
    pub quantity_received: i64,
    pub quantity_remaining: i64,
    pub storage_location: StorageLocation,
    pub unit_cost: Decimal,
    pub warehouse_fee: Decimal,
    pub effective_unit_cost: Decimal,
}

impl From<&InventoryLot> for LotView {
    fn from(lot: &InventoryLot) -> Self {
        Self {
            lot_id: lot.id_typed(),
            lot_code: lot.lot_code().to_string(),
            received_date: lot.received_date(),
            quantity_received: lot.quantity_received(),
            quantity_remaining: lot.quantity_remaining(),
            storage_location: lot.storage_location(),
            unit_cost: lot.unit_cost(),
            warehouse_fee: lot.warehouse_fee(),
            effective_unit_cost: lot.effective_unit_cost(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInventory {
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    pub valuation: LotValuation,
    /// FIFO order.
    pub lots: Vec<LotView>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub product_count: usize,
    pub lot_count: usize,
    pub total_remaining: i64,
    pub total_value: Decimal,
    pub total_value_with_fee: Decimal,
    pub outstanding_fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDetail {
    pub lot: InventoryLot,
    /// Oldest first.
    pub movements: Vec<InventoryMovement>,
    pub distributions: Vec<WarehouseFeeDistribution>,
}

pub struct InventoryQueryService<L> {
    ledger: Arc<L>,
    config: Arc<EngineConfig>,
}

impl<L: LotLedger> InventoryQueryService<L> {
    pub fn new(ledger: Arc<L>, config: Arc<EngineConfig>) -> Self {
        Self { ledger, config }
    }

    /// Per-product quantities, lots and valuation, ordered by product code.
    pub fn query(&self, query: InventoryQuery) -> EngineResult<Page<ProductInventory>> {
        if query.page == 0 {
            return Err(DomainError::validation("page", "pages start at 1").into());
        }
        if query.page_size == 0 || query.page_size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE} (got {})", query.page_size),
            )
            .into());
        }

        let scale = self.config.currency_scale;
        let mut rows = read(&*self.ledger, |tx| {
            let filter = LotFilter {
                product_id: query.product_id,
                storage_location: query.storage_location,
                open_only: !query.include_exhausted,
            };
            let by_product = group_by_product(tx.lots(&filter)?);

            let mut rows = Vec::with_capacity(by_product.len());
            for (product_id, lots) in by_product {
                let product = tx.product(product_id)?;
                rows.push(product_inventory(product_id, product.as_ref(), &lots, scale));
            }
            Ok(rows)
        })?;

        rows.sort_by(|a, b| {
            a.product_code
                .cmp(&b.product_code)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        Ok(Page::slice(rows, query.page, query.page_size))
    }

    /// Grand totals over open lots, optionally for one storage location.
    pub fn summary(&self, storage_location: Option<StorageLocation>) -> EngineResult<InventorySummary> {
        let scale = self.config.currency_scale;
        read(&*self.ledger, |tx| {
            let lots = tx.lots(&LotFilter::all().located(storage_location).open())?;
            let by_product = group_by_product(lots);

            let mut summary = InventorySummary {
                product_count: by_product.len(),
                ..InventorySummary::default()
            };
            for (product_id, lots) in &by_product {
                let valuation = LotValuation::from_lots(*product_id, lots, scale);
                summary.lot_count += valuation.lot_count;
                summary.total_remaining += valuation.total_remaining;
                summary.total_value += valuation.total_value;
                summary.total_value_with_fee += valuation.total_value_with_fee;
                summary.outstanding_fee += valuation.outstanding_fee;
            }
            Ok(summary)
        })
    }

    pub fn lot_detail(&self, lot_id: LotId) -> EngineResult<LotDetail> {
        read(&*self.ledger, |tx| {
            let lot = tx
                .lot(lot_id)?
                .ok_or_else(|| DomainError::not_found("lot", lot_id))?;
            let mut movements = tx.movements_for_lot(lot_id)?;
            movements.sort_by_key(|m| (m.movement_date(), m.created_at(), m.id_typed()));
            let mut distributions = tx.distributions_for_lot(lot_id)?;
            distributions.sort_by_key(|d| d.year_month);
            Ok(LotDetail {
                lot,
                movements,
                distributions,
            })
        })
    }

    /// Valuation of one product's open lots.
    pub fn valuation(&self, product_id: ProductId) -> EngineResult<LotValuation> {
        let scale = self.config.currency_scale;
        read(&*self.ledger, |tx| {
            let lots = tx.lots(&LotFilter::product(product_id).open())?;
            Ok(LotValuation::from_lots(product_id, &lots, scale))
        })
    }

    pub fn product(&self, product_id: ProductId) -> EngineResult<Product> {
        read(&*self.ledger, |tx| {
            tx.product(product_id)?
                .ok_or_else(|| DomainError::not_found("product", product_id).into())
        })
    }

    pub fn sales_record(&self, id: SalesRecordId) -> EngineResult<SalesRecord> {
        read(&*self.ledger, |tx| {
            tx.sales_record(id)?
                .ok_or_else(|| DomainError::not_found("sales record", id).into())
        })
    }

    /// Ledger entries matching `filter`, oldest first.
    pub fn sales_records(&self, filter: RecordFilter) -> EngineResult<Vec<SalesRecord>> {
        read(&*self.ledger, |tx| {
            let mut records = tx.sales_records(&filter)?;
            records.sort_by_key(|r| (r.record_date(), r.created_at(), r.id_typed()));
            Ok(records)
        })
    }
}

fn group_by_product(lots: Vec<InventoryLot>) -> BTreeMap<ProductId, Vec<InventoryLot>> {
    let mut grouped: BTreeMap<ProductId, Vec<InventoryLot>> = BTreeMap::new();
    for lot in lots {
        grouped.entry(lot.product_id()).or_default().push(lot);
    }
    grouped
}

fn product_inventory(
    product_id: ProductId,
    product: Option<&Product>,
    lots: &[InventoryLot],
    scale: u32,
) -> ProductInventory {
    ProductInventory {
        product_id,
        product_code: product.map_or_else(|| product_id.to_string(), |p| p.code().to_string()),
        product_name: product.map(|p| p.name().to_string()).unwrap_or_default(),
        valuation: LotValuation::from_lots(product_id, lots, scale),
        lots: lots.iter().map(LotView::from).collect(),
    }
}

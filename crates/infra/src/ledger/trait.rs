use std::sync::Arc;

use thiserror::Error;

use tradeerp_core::{LotId, MovementId, ProductId, ReceiptId, SalesRecordId};
use tradeerp_inventory::{
    InventoryLot, InventoryMovement, StorageLocation, WarehouseFee, WarehouseFeeDistribution,
    YearMonth,
};
use tradeerp_products::Product;
use tradeerp_sales::SalesRecord;

/// Ledger operation error.
///
/// These are **infrastructure errors** (concurrency, constraints, availability)
/// as opposed to domain errors (validation, business rules).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A row read or written by the transaction changed before commit.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("unique constraint violated: {entity} `{key}` already exists")]
    UniqueViolation { entity: &'static str, key: String },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Which lots a scan returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LotFilter {
    pub product_id: Option<ProductId>,
    pub storage_location: Option<StorageLocation>,
    /// Only lots with `quantity_remaining > 0`.
    pub open_only: bool,
}

impl LotFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    pub fn located(mut self, location: Option<StorageLocation>) -> Self {
        self.storage_location = location;
        self
    }

    pub fn open(mut self) -> Self {
        self.open_only = true;
        self
    }

    pub fn matches(&self, lot: &InventoryLot) -> bool {
        self.product_id.is_none_or(|p| lot.product_id() == p)
            && self.storage_location.is_none_or(|l| lot.storage_location() == l)
            && (!self.open_only || lot.is_open())
    }
}

/// Which ledger entries a scan returns. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub product_id: Option<ProductId>,
    pub lot_id: Option<LotId>,
    pub receipt_id: Option<ReceiptId>,
    pub linked_purchase_id: Option<SalesRecordId>,
}

impl RecordFilter {
    pub fn matches(&self, record: &SalesRecord) -> bool {
        self.product_id.is_none_or(|p| record.product_id() == p)
            && self.lot_id.is_none_or(|l| record.lot_id() == Some(l))
            && self.receipt_id.is_none_or(|r| record.receipt_id() == Some(r))
            && self
                .linked_purchase_id
                .is_none_or(|p| record.linked_purchase_id() == Some(p))
    }
}

/// A unit of work against the ledger.
///
/// Every row returned by a read, and every row written, is part of the
/// transaction's read set. `commit()` fails with [`StoreError::Conflict`] if any
/// of them changed in between. Dropping the transaction discards it.
pub trait LedgerTx: Send {
    fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;
    fn products(&mut self) -> Result<Vec<Product>, StoreError>;
    fn put_product(&mut self, product: Product) -> Result<(), StoreError>;

    fn lot(&mut self, id: LotId) -> Result<Option<InventoryLot>, StoreError>;
    fn lot_by_code(&mut self, lot_code: &str) -> Result<Option<InventoryLot>, StoreError>;
    /// Lots matching `filter`, in FIFO order.
    fn lots(&mut self, filter: &LotFilter) -> Result<Vec<InventoryLot>, StoreError>;
    fn put_lot(&mut self, lot: InventoryLot) -> Result<(), StoreError>;
    fn remove_lot(&mut self, id: LotId) -> Result<(), StoreError>;

    fn movement(&mut self, id: MovementId) -> Result<Option<InventoryMovement>, StoreError>;
    fn movements_for_lot(&mut self, lot_id: LotId) -> Result<Vec<InventoryMovement>, StoreError>;
    fn movements_for_sale(
        &mut self,
        sale_record_id: SalesRecordId,
    ) -> Result<Vec<InventoryMovement>, StoreError>;
    fn put_movement(&mut self, movement: InventoryMovement) -> Result<(), StoreError>;
    fn remove_movement(&mut self, id: MovementId) -> Result<(), StoreError>;

    fn warehouse_fee(&mut self, year_month: YearMonth) -> Result<Option<WarehouseFee>, StoreError>;
    fn put_warehouse_fee(&mut self, fee: WarehouseFee) -> Result<(), StoreError>;
    fn remove_warehouse_fee(&mut self, year_month: YearMonth) -> Result<(), StoreError>;

    fn distributions_for_month(
        &mut self,
        year_month: YearMonth,
    ) -> Result<Vec<WarehouseFeeDistribution>, StoreError>;
    fn distributions_for_lot(
        &mut self,
        lot_id: LotId,
    ) -> Result<Vec<WarehouseFeeDistribution>, StoreError>;
    fn put_distribution(&mut self, distribution: WarehouseFeeDistribution) -> Result<(), StoreError>;

    fn sales_record(&mut self, id: SalesRecordId) -> Result<Option<SalesRecord>, StoreError>;
    fn sales_records(&mut self, filter: &RecordFilter) -> Result<Vec<SalesRecord>, StoreError>;
    fn put_sales_record(&mut self, record: SalesRecord) -> Result<(), StoreError>;
    fn remove_sales_record(&mut self, id: SalesRecordId) -> Result<(), StoreError>;

    /// Apply every buffered write atomically. Returns the commit sequence number.
    fn commit(self) -> Result<u64, StoreError>
    where
        Self: Sized;
}

/// Source of ledger transactions.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - give each transaction a consistent view of committed state
/// - reject a commit if any row in its read or write set changed (optimistic concurrency)
/// - enforce lot-code uniqueness across all lots
/// - apply all writes of a commit or none of them
pub trait LotLedger: Send + Sync {
    type Tx: LedgerTx;

    fn begin(&self) -> Result<Self::Tx, StoreError>;
}

impl<L> LotLedger for Arc<L>
where
    L: LotLedger + ?Sized,
{
    type Tx = L::Tx;

    fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tradeerp_inventory::{LandedCost, ReceiveLot};

    fn lot(product_id: ProductId, location: StorageLocation) -> InventoryLot {
        InventoryLot::receive(
            LotId::new(),
            ReceiveLot {
                product_id,
                receipt_id: None,
                lot_code: None,
                received_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                quantity: 5,
                costs: LandedCost::goods_only(dec!(50)),
                storage_location: location,
                notes: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn lot_filter_combines_conditions() {
        let product = ProductId::new();
        let mut exhausted = lot(product, StorageLocation::Warehouse);
        exhausted.consume(5).unwrap();
        let office = lot(product, StorageLocation::Office);
        let other = lot(ProductId::new(), StorageLocation::Warehouse);

        let filter = LotFilter::product(product).located(Some(StorageLocation::Warehouse));
        assert!(filter.matches(&exhausted));
        assert!(!filter.open().matches(&exhausted));
        assert!(!filter.matches(&office));
        assert!(!filter.matches(&other));
        assert!(LotFilter::all().matches(&other));
    }
}

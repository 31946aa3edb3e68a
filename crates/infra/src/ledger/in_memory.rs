use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::{Arc, RwLock};

use tradeerp_core::{
    DistributionId, Entity, ExpectedVersion, LotId, MovementId, ProductId, SalesRecordId,
};
use tradeerp_inventory::{
    InventoryLot, InventoryMovement, WarehouseFee, WarehouseFeeDistribution, YearMonth,
};
use tradeerp_products::Product;
use tradeerp_sales::SalesRecord;

use super::r#trait::{LedgerTx, LotFilter, LotLedger, RecordFilter, StoreError};

#[derive(Debug, Clone)]
struct Row<V> {
    /// Commit sequence number that last wrote the row.
    version: u64,
    value: V,
}

type Committed<K, V> = BTreeMap<K, Row<V>>;

#[derive(Debug, Clone, Default)]
struct Tables {
    products: Committed<ProductId, Product>,
    lots: Committed<LotId, InventoryLot>,
    movements: Committed<MovementId, InventoryMovement>,
    fees: Committed<YearMonth, WarehouseFee>,
    distributions: Committed<DistributionId, WarehouseFeeDistribution>,
    records: Committed<SalesRecordId, SalesRecord>,
}

#[derive(Debug, Default)]
struct LedgerState {
    sequence: u64,
    tables: Tables,
    lot_codes: BTreeMap<String, LotId>,
}

/// In-memory lot ledger with optimistic concurrency.
///
/// Intended for tests/dev and as the reference [`LotLedger`]. Each transaction
/// works on a snapshot of the committed tables; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLotLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the last successful commit (0 when empty).
    pub fn last_commit(&self) -> Result<u64, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.sequence)
    }
}

impl LotLedger for InMemoryLotLedger {
    type Tx = InMemoryTx;

    fn begin(&self) -> Result<Self::Tx, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let tables = state.tables.clone();
        Ok(InMemoryTx {
            state: Arc::clone(&self.state),
            products: TxTable::new(tables.products),
            lots: TxTable::new(tables.lots),
            movements: TxTable::new(tables.movements),
            fees: TxTable::new(tables.fees),
            distributions: TxTable::new(tables.distributions),
            records: TxTable::new(tables.records),
        })
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// One table as seen by a transaction: the snapshot, buffered writes
/// (`None` = delete) and the version observed for every touched key.
#[derive(Debug)]
struct TxTable<K, V> {
    snapshot: Committed<K, V>,
    pending: BTreeMap<K, Option<V>>,
    observed: BTreeMap<K, Option<u64>>,
}

impl<K, V> TxTable<K, V>
where
    K: Ord + Copy + Display,
    V: Clone + Entity<Id = K>,
{
    fn new(snapshot: Committed<K, V>) -> Self {
        Self {
            snapshot,
            pending: BTreeMap::new(),
            observed: BTreeMap::new(),
        }
    }

    fn observe(&mut self, key: K) {
        let version = self.snapshot.get(&key).map(|row| row.version);
        self.observed.entry(key).or_insert(version);
    }

    fn get(&mut self, key: K) -> Option<V> {
        self.observe(key);
        match self.pending.get(&key) {
            Some(change) => change.clone(),
            None => self.snapshot.get(&key).map(|row| row.value.clone()),
        }
    }

    fn scan(&mut self, mut predicate: impl FnMut(&V) -> bool) -> Vec<V> {
        let mut hits: BTreeMap<K, V> = BTreeMap::new();
        for (key, row) in &self.snapshot {
            if !self.pending.contains_key(key) && predicate(&row.value) {
                hits.insert(*key, row.value.clone());
            }
        }
        let seen: Vec<K> = hits.keys().copied().collect();
        for key in seen {
            self.observe(key);
        }
        for (key, change) in &self.pending {
            if let Some(value) = change {
                if predicate(value) {
                    hits.insert(*key, value.clone());
                }
            }
        }
        hits.into_values().collect()
    }

    fn put(&mut self, value: V) {
        let key = *value.id();
        self.observe(key);
        self.pending.insert(key, Some(value));
    }

    fn remove(&mut self, key: K) {
        self.observe(key);
        self.pending.insert(key, None);
    }

    fn validate(&self, committed: &Committed<K, V>, table: &str) -> Result<(), StoreError> {
        for (key, seen) in &self.observed {
            let current = committed.get(key).map(|row| row.version);
            if !ExpectedVersion::from_observed(*seen).matches(current) {
                return Err(StoreError::Conflict(format!(
                    "{table} {key} changed since it was read (read version {seen:?}, now {current:?})"
                )));
            }
        }
        Ok(())
    }

    fn apply(self, committed: &mut Committed<K, V>, version: u64) {
        for (key, change) in self.pending {
            match change {
                Some(value) => {
                    committed.insert(key, Row { version, value });
                }
                None => {
                    committed.remove(&key);
                }
            }
        }
    }
}

/// Transaction over an [`InMemoryLotLedger`].
#[derive(Debug)]
pub struct InMemoryTx {
    state: Arc<RwLock<LedgerState>>,
    products: TxTable<ProductId, Product>,
    lots: TxTable<LotId, InventoryLot>,
    movements: TxTable<MovementId, InventoryMovement>,
    fees: TxTable<YearMonth, WarehouseFee>,
    distributions: TxTable<DistributionId, WarehouseFeeDistribution>,
    records: TxTable<SalesRecordId, SalesRecord>,
}

impl InMemoryTx {
    /// Lot codes must stay unique across committed and pending lots.
    fn check_lot_codes(&self, state: &LedgerState) -> Result<(), StoreError> {
        let mut claimed: BTreeSet<&str> = BTreeSet::new();
        for (id, change) in &self.lots.pending {
            let Some(lot) = change else { continue };
            let code = lot.lot_code();
            let taken_elsewhere = state.lot_codes.get(code).is_some_and(|owner| {
                owner != id && !matches!(self.lots.pending.get(owner), Some(None))
            });
            if taken_elsewhere || !claimed.insert(code) {
                return Err(StoreError::UniqueViolation {
                    entity: "lot",
                    key: code.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl LedgerTx for InMemoryTx {
    fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.products.get(id))
    }

    fn products(&mut self) -> Result<Vec<Product>, StoreError> {
        Ok(self.products.scan(|_| true))
    }

    fn put_product(&mut self, product: Product) -> Result<(), StoreError> {
        self.products.put(product);
        Ok(())
    }

    fn lot(&mut self, id: LotId) -> Result<Option<InventoryLot>, StoreError> {
        Ok(self.lots.get(id))
    }

    fn lot_by_code(&mut self, lot_code: &str) -> Result<Option<InventoryLot>, StoreError> {
        Ok(self.lots.scan(|lot| lot.lot_code() == lot_code).into_iter().next())
    }

    fn lots(&mut self, filter: &LotFilter) -> Result<Vec<InventoryLot>, StoreError> {
        let mut lots = self.lots.scan(|lot| filter.matches(lot));
        lots.sort_by_key(|lot| lot.fifo_key());
        Ok(lots)
    }

    fn put_lot(&mut self, lot: InventoryLot) -> Result<(), StoreError> {
        self.lots.put(lot);
        Ok(())
    }

    fn remove_lot(&mut self, id: LotId) -> Result<(), StoreError> {
        self.lots.remove(id);
        Ok(())
    }

    fn movement(&mut self, id: MovementId) -> Result<Option<InventoryMovement>, StoreError> {
        Ok(self.movements.get(id))
    }

    fn movements_for_lot(&mut self, lot_id: LotId) -> Result<Vec<InventoryMovement>, StoreError> {
        Ok(self.movements.scan(|m| m.lot_id() == lot_id))
    }

    fn movements_for_sale(
        &mut self,
        sale_record_id: SalesRecordId,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        Ok(self
            .movements
            .scan(|m| m.sale_record_id() == Some(sale_record_id)))
    }

    fn put_movement(&mut self, movement: InventoryMovement) -> Result<(), StoreError> {
        self.movements.put(movement);
        Ok(())
    }

    fn remove_movement(&mut self, id: MovementId) -> Result<(), StoreError> {
        self.movements.remove(id);
        Ok(())
    }

    fn warehouse_fee(&mut self, year_month: YearMonth) -> Result<Option<WarehouseFee>, StoreError> {
        Ok(self.fees.get(year_month))
    }

    fn put_warehouse_fee(&mut self, fee: WarehouseFee) -> Result<(), StoreError> {
        self.fees.put(fee);
        Ok(())
    }

    fn remove_warehouse_fee(&mut self, year_month: YearMonth) -> Result<(), StoreError> {
        self.fees.remove(year_month);
        Ok(())
    }

    fn distributions_for_month(
        &mut self,
        year_month: YearMonth,
    ) -> Result<Vec<WarehouseFeeDistribution>, StoreError> {
        Ok(self.distributions.scan(|d| d.year_month == year_month))
    }

    fn distributions_for_lot(
        &mut self,
        lot_id: LotId,
    ) -> Result<Vec<WarehouseFeeDistribution>, StoreError> {
        Ok(self.distributions.scan(|d| d.lot_id == lot_id))
    }

    fn put_distribution(&mut self, distribution: WarehouseFeeDistribution) -> Result<(), StoreError> {
        self.distributions.put(distribution);
        Ok(())
    }

    fn sales_record(&mut self, id: SalesRecordId) -> Result<Option<SalesRecord>, StoreError> {
        Ok(self.records.get(id))
    }

    fn sales_records(&mut self, filter: &RecordFilter) -> Result<Vec<SalesRecord>, StoreError> {
        Ok(self.records.scan(|r| filter.matches(r)))
    }

    fn put_sales_record(&mut self, record: SalesRecord) -> Result<(), StoreError> {
        self.records.put(record);
        Ok(())
    }

    fn remove_sales_record(&mut self, id: SalesRecordId) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    fn commit(self) -> Result<u64, StoreError> {
        let mut guard = self.state.write().map_err(|_| poisoned())?;
        let state = &mut *guard;

        self.products.validate(&state.tables.products, "product")?;
        self.lots.validate(&state.tables.lots, "lot")?;
        self.movements.validate(&state.tables.movements, "movement")?;
        self.fees.validate(&state.tables.fees, "warehouse fee")?;
        self.distributions
            .validate(&state.tables.distributions, "fee distribution")?;
        self.records.validate(&state.tables.records, "sales record")?;
        self.check_lot_codes(state)?;

        state.sequence += 1;
        let version = state.sequence;

        for (id, change) in &self.lots.pending {
            if let Some(old) = state.tables.lots.get(id) {
                state.lot_codes.remove(old.value.lot_code());
            }
            if let Some(lot) = change {
                state.lot_codes.insert(lot.lot_code().to_string(), *id);
            }
        }

        self.products.apply(&mut state.tables.products, version);
        self.lots.apply(&mut state.tables.lots, version);
        self.movements.apply(&mut state.tables.movements, version);
        self.fees.apply(&mut state.tables.fees, version);
        self.distributions.apply(&mut state.tables.distributions, version);
        self.records.apply(&mut state.tables.records, version);

        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tradeerp_inventory::{LandedCost, ReceiveLot, StorageLocation};

    fn lot(code: &str) -> InventoryLot {
        InventoryLot::receive(
            LotId::new(),
            ReceiveLot {
                product_id: ProductId::new(),
                receipt_id: None,
                lot_code: Some(code.to_string()),
                received_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                quantity: 10,
                costs: LandedCost::goods_only(dec!(100)),
                storage_location: StorageLocation::Warehouse,
                notes: None,
            },
        )
        .unwrap()
    }

    fn seed(ledger: &InMemoryLotLedger, lot: &InventoryLot) {
        let mut tx = ledger.begin().unwrap();
        tx.put_lot(lot.clone()).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let ledger = InMemoryLotLedger::new();
        let a = lot("LOT-A");

        let mut tx = ledger.begin().unwrap();
        tx.put_lot(a.clone()).unwrap();
        assert_eq!(tx.lot(a.id_typed()).unwrap(), Some(a.clone()));
        drop(tx);

        let mut reader = ledger.begin().unwrap();
        assert_eq!(reader.lot(a.id_typed()).unwrap(), None);
        assert_eq!(ledger.last_commit().unwrap(), 0);
    }

    #[test]
    fn second_writer_of_a_row_conflicts() {
        let ledger = InMemoryLotLedger::new();
        let a = lot("LOT-A");
        seed(&ledger, &a);

        let mut first = ledger.begin().unwrap();
        let mut second = ledger.begin().unwrap();
        let mut via_first = first.lot(a.id_typed()).unwrap().unwrap();
        let mut via_second = second.lot(a.id_typed()).unwrap().unwrap();
        via_first.consume(4).unwrap();
        via_second.consume(8).unwrap();
        first.put_lot(via_first).unwrap();
        second.put_lot(via_second).unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(StoreError::Conflict(_))));

        let mut reader = ledger.begin().unwrap();
        assert_eq!(reader.lot(a.id_typed()).unwrap().unwrap().quantity_remaining(), 6);
    }

    #[test]
    fn stale_scan_conflicts_even_without_writing_that_row() {
        let ledger = InMemoryLotLedger::new();
        let a = lot("LOT-A");
        seed(&ledger, &a);

        let mut scanner = ledger.begin().unwrap();
        assert_eq!(scanner.lots(&LotFilter::all()).unwrap().len(), 1);
        scanner.put_lot(lot("LOT-B")).unwrap();

        let mut writer = ledger.begin().unwrap();
        let mut changed = writer.lot(a.id_typed()).unwrap().unwrap();
        changed.consume(1).unwrap();
        writer.put_lot(changed).unwrap();
        writer.commit().unwrap();

        assert!(matches!(scanner.commit(), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn lot_codes_are_unique() {
        let ledger = InMemoryLotLedger::new();
        seed(&ledger, &lot("LOT-A"));

        let mut tx = ledger.begin().unwrap();
        tx.put_lot(lot("LOT-A")).unwrap();
        assert_eq!(
            tx.commit(),
            Err(StoreError::UniqueViolation {
                entity: "lot",
                key: "LOT-A".to_string()
            })
        );

        let mut tx = ledger.begin().unwrap();
        tx.put_lot(lot("LOT-B")).unwrap();
        tx.put_lot(lot("LOT-B")).unwrap();
        assert!(matches!(tx.commit(), Err(StoreError::UniqueViolation { .. })));
    }

    #[test]
    fn deleted_lot_frees_its_code() {
        let ledger = InMemoryLotLedger::new();
        let a = lot("LOT-A");
        seed(&ledger, &a);

        let mut tx = ledger.begin().unwrap();
        tx.remove_lot(a.id_typed()).unwrap();
        tx.commit().unwrap();

        seed(&ledger, &lot("LOT-A"));
        let mut reader = ledger.begin().unwrap();
        assert!(reader.lot_by_code("LOT-A").unwrap().is_some());
        assert_eq!(reader.lot(a.id_typed()).unwrap(), None);
    }

    #[test]
    fn concurrent_inserts_of_one_fee_month_conflict() {
        let ledger = InMemoryLotLedger::new();
        let month = YearMonth::new(2024, 3).unwrap();

        let mut first = ledger.begin().unwrap();
        let mut second = ledger.begin().unwrap();
        assert!(first.warehouse_fee(month).unwrap().is_none());
        assert!(second.warehouse_fee(month).unwrap().is_none());
        first
            .put_warehouse_fee(WarehouseFee::new(month, dec!(100), None).unwrap())
            .unwrap();
        second
            .put_warehouse_fee(WarehouseFee::new(month, dec!(200), None).unwrap())
            .unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn rows_are_stored_under_their_entity_id() {
        let ledger = InMemoryLotLedger::new();
        let a = lot("LOT-K");
        let fee = WarehouseFee::new(YearMonth::new(2024, 5).unwrap(), dec!(50), None).unwrap();

        let mut tx = ledger.begin().unwrap();
        tx.put_lot(a.clone()).unwrap();
        tx.put_warehouse_fee(fee.clone()).unwrap();
        tx.commit().unwrap();

        let mut reader = ledger.begin().unwrap();
        assert_eq!(reader.lot(*a.id()).unwrap(), Some(a));
        assert_eq!(reader.warehouse_fee(*fee.id()).unwrap(), Some(fee));
    }
}

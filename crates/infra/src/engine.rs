//! Costing engine facade.
//!
//! Composes the ledger, the costing services and the post-commit pipeline:
//!
//! ```text
//! operation
//!   ↓
//! 1. begin transaction (consistent snapshot)
//!   ↓
//! 2. domain logic (validation, FIFO plan, fee weights, cost resolution)
//!   ↓
//! 3. commit (optimistic concurrency check; conflict → retry from 1)
//!   ↓
//! 4. post-commit hooks (auto-linked ledger entries), then event bus
//! ```
//!
//! Hook and bus failures are logged and never undo step 3.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use tradeerp_core::{LotId, MovementId, ProductId, SalesRecordId};
use tradeerp_events::{CostingEvent, PostCommitHook};
use tradeerp_inventory::{
    AllocationPlan, InventoryLot, LotValuation, ReceiveLot, StorageLocation, WarehouseFee,
    WarehouseFeeDistribution, YearMonth,
};
use tradeerp_products::Product;
use tradeerp_sales::SalesRecord;

use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineResult;
use crate::ledger::{InMemoryLotLedger, LedgerTx, LotLedger, RecordFilter};
use crate::notify::{CommitNotifier, EnvelopeSink};
use crate::services::{
    AllocateOutbound, AutoLinkHook, CostPropagator, InboundReceiver, InventoryQuery,
    InventoryQueryService, InventorySummary, LotDetail, OutboundAllocator, OutboundResult, Page,
    PreviewOutbound, ProductInventory, RecordSale, ReceiveShipment, Reversal, ShipmentReceipt,
    WarehouseFeeDistributor,
};
use crate::transaction::run_in_tx;

/// Assembles a [`CostingEngine`].
pub struct EngineBuilder<L> {
    ledger: Arc<L>,
    config: EngineConfig,
    notifier: CommitNotifier,
}

impl<L> EngineBuilder<L>
where
    L: LotLedger + 'static,
{
    /// Publish committed events to `sink` (typically an `EventBus`).
    pub fn event_sink(mut self, sink: Arc<dyn EnvelopeSink>) -> Self {
        self.notifier.add_sink(sink);
        self
    }

    /// Run an extra hook after every commit, after the built-in ones.
    pub fn hook(mut self, hook: Arc<dyn PostCommitHook<CostingEvent>>) -> Self {
        self.notifier.register_hook(hook);
        self
    }

    pub fn build(self) -> CostingEngine<L> {
        let EngineBuilder {
            ledger,
            config,
            notifier,
        } = self;
        let config = Arc::new(config);
        let notifier = Arc::new(notifier);

        CostingEngine {
            inbound: InboundReceiver::new(ledger.clone(), config.clone(), notifier.clone()),
            outbound: OutboundAllocator::new(ledger.clone(), config.clone(), notifier.clone()),
            fees: WarehouseFeeDistributor::new(ledger.clone(), config.clone(), notifier.clone()),
            costs: CostPropagator::new(ledger.clone(), config.clone(), notifier.clone()),
            query: InventoryQueryService::new(ledger.clone(), config.clone()),
            ledger,
            config,
            notifier,
        }
    }
}

/// Entry point for every costing operation.
pub struct CostingEngine<L> {
    ledger: Arc<L>,
    config: Arc<EngineConfig>,
    notifier: Arc<CommitNotifier>,
    inbound: InboundReceiver<L>,
    outbound: OutboundAllocator<L>,
    fees: WarehouseFeeDistributor<L>,
    costs: CostPropagator<L>,
    query: InventoryQueryService<L>,
}

impl CostingEngine<InMemoryLotLedger> {
    /// Load `config/tradeerp` plus `TRADEERP__*` overrides, install tracing
    /// and start an engine over an empty in-memory ledger.
    pub fn bootstrap() -> Result<Self, ConfigError> {
        let config = EngineConfig::load()?;
        tradeerp_observability::init(&config.observability);
        info!(
            currency_scale = config.currency_scale,
            policy = ?config.landed_cost_policy,
            "costing engine starting"
        );
        Ok(Self::new(Arc::new(InMemoryLotLedger::new()), config))
    }
}

impl<L> CostingEngine<L>
where
    L: LotLedger + 'static,
{
    /// Start a builder with the auto-link hook already registered.
    pub fn builder(ledger: Arc<L>, config: EngineConfig) -> EngineBuilder<L> {
        let mut notifier = CommitNotifier::new();
        notifier.register_hook(Arc::new(AutoLinkHook::new(
            ledger.clone(),
            Arc::new(config.clone()),
        )));
        EngineBuilder {
            ledger,
            config,
            notifier,
        }
    }

    pub fn new(ledger: Arc<L>, config: EngineConfig) -> Self {
        Self::builder(ledger, config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn notifier(&self) -> &CommitNotifier {
        &self.notifier
    }

    pub fn inbound(&self) -> &InboundReceiver<L> {
        &self.inbound
    }

    pub fn outbound(&self) -> &OutboundAllocator<L> {
        &self.outbound
    }

    pub fn warehouse_fees(&self) -> &WarehouseFeeDistributor<L> {
        &self.fees
    }

    pub fn cost_propagator(&self) -> &CostPropagator<L> {
        &self.costs
    }

    pub fn queries(&self) -> &InventoryQueryService<L> {
        &self.query
    }

    // -- master data ---------------------------------------------------------

    /// Insert or replace a product the engine costs against.
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id_typed(), code = product.code()))]
    pub fn upsert_product(&self, product: Product) -> EngineResult<()> {
        run_in_tx(&*self.ledger, self.config.max_conflict_retries, "upsert_product", |tx| {
            Ok(tx.put_product(product.clone())?)
        })?;
        info!("product saved");
        Ok(())
    }

    pub fn product(&self, product_id: ProductId) -> EngineResult<Product> {
        self.query.product(product_id)
    }

    // -- inbound -------------------------------------------------------------

    pub fn receive_inbound(&self, input: ReceiveLot) -> EngineResult<InventoryLot> {
        self.inbound.receive(input)
    }

    pub fn receive_shipment(&self, input: ReceiveShipment) -> EngineResult<ShipmentReceipt> {
        self.inbound.receive_shipment(input)
    }

    pub fn delete_lot(&self, lot_id: LotId) -> EngineResult<InventoryLot> {
        self.inbound.delete_lot(lot_id)
    }

    pub fn delete_lots(&self, lot_ids: &[LotId]) -> EngineResult<Vec<InventoryLot>> {
        self.inbound.delete_lots(lot_ids)
    }

    // -- outbound ------------------------------------------------------------

    pub fn allocate_outbound(&self, request: AllocateOutbound) -> EngineResult<OutboundResult> {
        self.outbound.allocate(request)
    }

    pub fn preview_outbound(&self, request: PreviewOutbound) -> EngineResult<AllocationPlan> {
        self.outbound.preview(request)
    }

    pub fn reverse_outbound(&self, movement_id: MovementId) -> EngineResult<Reversal> {
        self.outbound.reverse(movement_id)
    }

    pub fn reverse_outbounds(&self, movement_ids: &[MovementId]) -> EngineResult<Vec<Reversal>> {
        self.outbound.reverse_many(movement_ids)
    }

    // -- warehouse fees ------------------------------------------------------

    pub fn record_warehouse_fee(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
        notes: Option<String>,
    ) -> EngineResult<WarehouseFee> {
        self.fees.record_fee(year_month, total_fee, notes)
    }

    pub fn update_warehouse_fee(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
        notes: Option<String>,
    ) -> EngineResult<WarehouseFee> {
        self.fees.update_fee(year_month, total_fee, notes)
    }

    pub fn delete_warehouse_fee(&self, year_month: YearMonth) -> EngineResult<()> {
        self.fees.delete_fee(year_month)
    }

    pub fn warehouse_fee(&self, year_month: YearMonth) -> EngineResult<WarehouseFee> {
        self.fees.fee(year_month)
    }

    pub fn distribute_warehouse_fee(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
    ) -> EngineResult<Vec<WarehouseFeeDistribution>> {
        self.fees.distribute(year_month, total_fee)
    }

    pub fn distribute_warehouse_fee_as_of(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
        today: NaiveDate,
    ) -> EngineResult<Vec<WarehouseFeeDistribution>> {
        self.fees.distribute_as_of(year_month, total_fee, today)
    }

    pub fn list_distributions(&self, year_month: YearMonth) -> EngineResult<Vec<WarehouseFeeDistribution>> {
        self.fees.list_distributions(year_month)
    }

    // -- sales ledger --------------------------------------------------------

    pub fn record_sale(&self, request: RecordSale) -> EngineResult<SalesRecord> {
        self.costs.record_sale(request)
    }

    pub fn delete_sales_record(&self, id: SalesRecordId) -> EngineResult<Vec<SalesRecordId>> {
        self.costs.delete_sales_record(id)
    }

    pub fn link_purchase(&self, sale_id: SalesRecordId, purchase_id: SalesRecordId) -> EngineResult<SalesRecord> {
        self.costs.link_purchase(sale_id, purchase_id)
    }

    /// Cost a sale of `quantity` would be recorded at right now.
    pub fn resolve_cost(
        &self,
        product_id: ProductId,
        quantity: i64,
        manual_cost: Option<Decimal>,
    ) -> EngineResult<Decimal> {
        self.costs.resolve_cost(product_id, quantity, manual_cost)
    }

    pub fn sales_record(&self, id: SalesRecordId) -> EngineResult<SalesRecord> {
        self.query.sales_record(id)
    }

    pub fn sales_records(&self, filter: RecordFilter) -> EngineResult<Vec<SalesRecord>> {
        self.query.sales_records(filter)
    }

    // -- queries -------------------------------------------------------------

    pub fn query_inventory(&self, query: InventoryQuery) -> EngineResult<Page<ProductInventory>> {
        self.query.query(query)
    }

    pub fn inventory_summary(&self, storage_location: Option<StorageLocation>) -> EngineResult<InventorySummary> {
        self.query.summary(storage_location)
    }

    pub fn lot_detail(&self, lot_id: LotId) -> EngineResult<LotDetail> {
        self.query.lot_detail(lot_id)
    }

    pub fn valuation(&self, product_id: ProductId) -> EngineResult<LotValuation> {
        self.query.valuation(product_id)
    }
}

//! Warehouse fee records and their distribution over open warehouse lots.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use tradeerp_core::{DistributionId, DomainError};
use tradeerp_events::{CostingEvent, FeeDistributed};
use tradeerp_inventory::{
    WarehouseFee, WarehouseFeeDistribution, YearMonth, distribution_base_date,
    plan_fee_distribution,
};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::{LedgerTx, LotFilter, LotLedger};
use crate::notify::CommitNotifier;
use crate::transaction::{read, run_in_tx};

pub struct WarehouseFeeDistributor<L> {
    ledger: Arc<L>,
    config: Arc<EngineConfig>,
    notifier: Arc<CommitNotifier>,
}

impl<L: LotLedger> WarehouseFeeDistributor<L> {
    pub fn new(ledger: Arc<L>, config: Arc<EngineConfig>, notifier: Arc<CommitNotifier>) -> Self {
        Self {
            ledger,
            config,
            notifier,
        }
    }

    #[tracing::instrument(skip(self, notes), fields(year_month = %year_month))]
    pub fn record_fee(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
        notes: Option<String>,
    ) -> EngineResult<WarehouseFee> {
        let fee = WarehouseFee::new(year_month, total_fee, notes)?;
        run_in_tx(&*self.ledger, self.config.max_conflict_retries, "record_warehouse_fee", |tx| {
            if tx.warehouse_fee(year_month)?.is_some() {
                return Err(DomainError::duplicate("warehouse fee", year_month).into());
            }
            tx.put_warehouse_fee(fee.clone())?;
            Ok(fee.clone())
        })
    }

    #[tracing::instrument(skip(self, notes), fields(year_month = %year_month))]
    pub fn update_fee(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
        notes: Option<String>,
    ) -> EngineResult<WarehouseFee> {
        run_in_tx(&*self.ledger, self.config.max_conflict_retries, "update_warehouse_fee", |tx| {
            let mut fee = load_fee(tx, year_month)?;
            fee.update(total_fee, notes.clone())?;
            tx.put_warehouse_fee(fee.clone())?;
            Ok(fee)
        })
    }

    #[tracing::instrument(skip(self), fields(year_month = %year_month))]
    pub fn delete_fee(&self, year_month: YearMonth) -> EngineResult<()> {
        run_in_tx(&*self.ledger, self.config.max_conflict_retries, "delete_warehouse_fee", |tx| {
            let fee = load_fee(tx, year_month)?;
            fee.ensure_not_distributed()?;
            tx.remove_warehouse_fee(year_month)?;
            Ok(())
        })
    }

    pub fn fee(&self, year_month: YearMonth) -> EngineResult<WarehouseFee> {
        read(&*self.ledger, |tx| load_fee(tx, year_month))
    }

    /// Distribute the month's fee as of today.
    pub fn distribute(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
    ) -> EngineResult<Vec<WarehouseFeeDistribution>> {
        self.distribute_as_of(year_month, total_fee, Utc::now().date_naive())
    }

    /// Spread `total_fee` over open warehouse lots by quantity × days held,
    /// measured up to the month's last day (or `today` while it is running).
    ///
    /// Records the fee for the month if it does not exist yet; an existing
    /// record must carry the same amount and must not be distributed. Lots
    /// are read in the same transaction, so a concurrent outbound forces a
    /// retry against the reduced quantities.
    #[tracing::instrument(skip(self), fields(year_month = %year_month, total_fee = %total_fee))]
    pub fn distribute_as_of(
        &self,
        year_month: YearMonth,
        total_fee: Decimal,
        today: NaiveDate,
    ) -> EngineResult<Vec<WarehouseFeeDistribution>> {
        let scale = self.config.currency_scale;
        let base_date = distribution_base_date(year_month, today)?;

        let distributions = run_in_tx(&*self.ledger, self.config.max_conflict_retries, "distribute_warehouse_fee", |tx| {
            let mut fee = match tx.warehouse_fee(year_month)? {
                Some(existing) => {
                    existing.ensure_not_distributed()?;
                    if existing.total_fee() != total_fee {
                        return Err(DomainError::business(format!(
                            "warehouse fee for {year_month} is recorded as {}, not {total_fee}",
                            existing.total_fee()
                        ))
                        .into());
                    }
                    existing
                }
                None => WarehouseFee::new(year_month, total_fee, None)?,
            };

            let lots = tx.lots(&LotFilter::all().open())?;
            let shares = plan_fee_distribution(&lots, fee.total_fee(), base_date, scale)?;

            let now = Utc::now();
            let mut rows = Vec::with_capacity(shares.len());
            for share in shares {
                if let Some(mut lot) = lots.iter().find(|l| l.id_typed() == share.lot_id).cloned() {
                    lot.accrue_fee(share.amount)?;
                    tx.put_lot(lot)?;
                }
                let row = WarehouseFeeDistribution {
                    id: DistributionId::new(),
                    year_month,
                    lot_id: share.lot_id,
                    product_id: share.product_id,
                    distributed_fee: share.amount,
                    quantity_snapshot: share.quantity,
                    storage_days: share.storage_days,
                    weight: share.weight,
                    created_at: now,
                };
                tx.put_distribution(row.clone())?;
                rows.push(row);
            }

            fee.mark_distributed(now)?;
            tx.put_warehouse_fee(fee)?;
            Ok(rows)
        })?;

        info!(
            lots = distributions.len(),
            base_date = %base_date,
            "warehouse fee distributed"
        );
        self.notifier
            .dispatch(vec![CostingEvent::FeeDistributed(FeeDistributed {
                year_month: year_month.to_string(),
                total_fee,
                lot_count: distributions.len(),
                occurred_at: Utc::now(),
            })]);
        Ok(distributions)
    }

    /// Distribution rows of a month, oldest lot first.
    pub fn list_distributions(&self, year_month: YearMonth) -> EngineResult<Vec<WarehouseFeeDistribution>> {
        read(&*self.ledger, |tx| {
            let mut rows = tx.distributions_for_month(year_month)?;
            rows.sort_by(|a, b| {
                b.storage_days
                    .cmp(&a.storage_days)
                    .then_with(|| a.lot_id.cmp(&b.lot_id))
            });
            Ok(rows)
        })
    }
}

fn load_fee(tx: &mut impl LedgerTx, year_month: YearMonth) -> EngineResult<WarehouseFee> {
    tx.warehouse_fee(year_month)?
        .ok_or_else(|| DomainError::not_found("warehouse fee", year_month).into())
}

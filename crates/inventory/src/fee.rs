//! Monthly warehouse fees and their distribution over open warehouse lots.

use core::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{
    DistributionId, DomainError, DomainResult, Entity, LotId, ProductId,
};

use crate::lot::{InventoryLot, StorageLocation};
use crate::split::split_proportionally;

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(DomainError::validation(
                "year_month",
                format!("{year:04}-{month:02} is not a calendar month"),
            ));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl core::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation("year_month", format!("expected YYYY-MM, got `{s}`"));
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year = y.parse::<i32>().map_err(|_| invalid())?;
        let month = m.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// The storage bill for one month. Frozen once distributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseFee {
    year_month: YearMonth,
    total_fee: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    distributed_at: Option<DateTime<Utc>>,
}

impl WarehouseFee {
    pub fn new(year_month: YearMonth, total_fee: Decimal, notes: Option<String>) -> DomainResult<Self> {
        ensure_positive_fee(total_fee)?;
        Ok(Self {
            year_month,
            total_fee,
            notes,
            created_at: Utc::now(),
            distributed_at: None,
        })
    }

    pub fn year_month(&self) -> YearMonth {
        self.year_month
    }

    pub fn total_fee(&self) -> Decimal {
        self.total_fee
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn distributed_at(&self) -> Option<DateTime<Utc>> {
        self.distributed_at
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed_at.is_some()
    }

    pub fn ensure_not_distributed(&self) -> DomainResult<()> {
        match self.distributed_at {
            Some(at) => Err(DomainError::business(format!(
                "warehouse fee for {} was already distributed at {at}",
                self.year_month
            ))),
            None => Ok(()),
        }
    }

    pub fn update(&mut self, total_fee: Decimal, notes: Option<String>) -> DomainResult<()> {
        self.ensure_not_distributed()?;
        ensure_positive_fee(total_fee)?;
        self.total_fee = total_fee;
        self.notes = notes;
        Ok(())
    }

    pub fn mark_distributed(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_distributed()?;
        self.distributed_at = Some(at);
        Ok(())
    }
}

impl Entity for WarehouseFee {
    type Id = YearMonth;

    fn id(&self) -> &Self::Id {
        &self.year_month
    }
}

fn ensure_positive_fee(total_fee: Decimal) -> DomainResult<()> {
    if total_fee <= Decimal::ZERO {
        return Err(DomainError::validation(
            "total_fee",
            format!("must be positive (got {total_fee})"),
        ));
    }
    Ok(())
}

/// One month's fee share allocated onto one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseFeeDistribution {
    pub id: DistributionId,
    pub year_month: YearMonth,
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub distributed_fee: Decimal,
    /// Lot quantity at allocation time.
    pub quantity_snapshot: i64,
    pub storage_days: i64,
    pub weight: i64,
    pub created_at: DateTime<Utc>,
}

impl Entity for WarehouseFeeDistribution {
    type Id = DistributionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Share of a fee computed for one lot (before persisting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeShare {
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub storage_days: i64,
    pub weight: i64,
    pub amount: Decimal,
}

/// Day the holding period is measured up to: the month's last day, or
/// `today` while the month is still running.
pub fn distribution_base_date(month: YearMonth, today: NaiveDate) -> DomainResult<NaiveDate> {
    if today < month.first_day() {
        return Err(DomainError::business(format!(
            "cannot distribute the warehouse fee for {month} before the month has started"
        )));
    }
    Ok(month.last_day().min(today))
}

/// Days a lot has been held at `base_date`; at least one.
pub fn storage_days(base_date: NaiveDate, received_date: NaiveDate) -> i64 {
    (base_date - received_date).num_days().max(1)
}

/// Split `total_fee` over the eligible lots by `quantity × storage days`.
///
/// Eligible lots are warehouse lots with stock left, received on or before
/// `base_date`. Shares are rounded to `scale`; the residual goes to the heaviest
/// lot (earliest in FIFO order on ties), so shares sum exactly to the fee.
pub fn plan_fee_distribution<'a>(
    lots: impl IntoIterator<Item = &'a InventoryLot>,
    total_fee: Decimal,
    base_date: NaiveDate,
    scale: u32,
) -> DomainResult<Vec<FeeShare>> {
    ensure_positive_fee(total_fee)?;

    let mut eligible: Vec<&InventoryLot> = lots
        .into_iter()
        .filter(|l| {
            l.storage_location() == StorageLocation::Warehouse
                && l.is_open()
                && l.received_date() <= base_date
        })
        .collect();
    if eligible.is_empty() {
        return Err(DomainError::business(format!(
            "no open warehouse lots received on or before {base_date} to distribute the fee over"
        )));
    }
    eligible.sort_by_key(|l| l.fifo_key());

    let mut shares: Vec<FeeShare> = eligible
        .iter()
        .map(|l| {
            let days = storage_days(base_date, l.received_date());
            FeeShare {
                lot_id: l.id_typed(),
                product_id: l.product_id(),
                quantity: l.quantity_remaining(),
                storage_days: days,
                weight: l.quantity_remaining() * days,
                amount: Decimal::ZERO,
            }
        })
        .collect();

    let weights: Vec<Decimal> = shares.iter().map(|s| Decimal::from(s.weight)).collect();
    let heaviest = shares
        .iter()
        .enumerate()
        .fold(0, |best, (i, s)| if s.weight > shares[best].weight { i } else { best });
    let amounts = split_proportionally(total_fee, &weights, scale, heaviest);
    for (share, amount) in shares.iter_mut().zip(amounts) {
        share.amount = amount;
    }
    Ok(shares)
}

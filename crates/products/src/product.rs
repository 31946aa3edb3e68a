use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeerp_core::{DomainError, DomainResult, Entity, ProductId, VendorId, ensure_non_negative};

/// A sales price agreed with one vendor, effective from a date onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPrice {
    pub vendor_id: VendorId,
    pub unit_price: Decimal,
    pub effective_from: NaiveDate,
}

/// Vendor + price used to generate an automatic PURCHASE entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoPurchase {
    pub vendor_id: VendorId,
    pub unit_price: Decimal,
}

/// Product master record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    code: String,
    name: String,
    category: Option<String>,
    default_purchase_price: Option<Decimal>,
    default_sales_price: Option<Decimal>,
    purchase_vendor_id: Option<VendorId>,
    vendor_prices: Vec<VendorPrice>,
}

impl Product {
    pub fn new(id: ProductId, code: impl Into<String>, name: impl Into<String>) -> DomainResult<Self> {
        let code = code.into();
        let name = name.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("code", "cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            name,
            category: None,
            default_purchase_price: None,
            default_sales_price: None,
            purchase_vendor_id: None,
            vendor_prices: Vec::new(),
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_default_prices(
        mut self,
        purchase: Option<Decimal>,
        sales: Option<Decimal>,
    ) -> DomainResult<Self> {
        if let Some(p) = purchase {
            ensure_non_negative("default_purchase_price", p)?;
        }
        if let Some(s) = sales {
            ensure_non_negative("default_sales_price", s)?;
        }
        self.default_purchase_price = purchase;
        self.default_sales_price = sales;
        Ok(self)
    }

    pub fn with_purchase_vendor(mut self, vendor_id: VendorId) -> Self {
        self.purchase_vendor_id = Some(vendor_id);
        self
    }

    pub fn add_vendor_price(&mut self, price: VendorPrice) -> DomainResult<()> {
        ensure_non_negative("unit_price", price.unit_price)?;
        if self
            .vendor_prices
            .iter()
            .any(|p| p.vendor_id == price.vendor_id && p.effective_from == price.effective_from)
        {
            return Err(DomainError::duplicate(
                "vendor price",
                format!("{}@{}", price.vendor_id, price.effective_from),
            ));
        }
        self.vendor_prices.push(price);
        Ok(())
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn default_purchase_price(&self) -> Option<Decimal> {
        self.default_purchase_price
    }

    pub fn default_sales_price(&self) -> Option<Decimal> {
        self.default_sales_price
    }

    pub fn purchase_vendor_id(&self) -> Option<VendorId> {
        self.purchase_vendor_id
    }

    pub fn vendor_prices(&self) -> &[VendorPrice] {
        &self.vendor_prices
    }

    /// Sales price for a sale to `vendor_id` on `date`.
    ///
    /// Precedence: the vendor's latest price effective on or before `date`,
    /// then the default sales price, then zero.
    pub fn resolve_sales_price(&self, vendor_id: Option<VendorId>, date: NaiveDate) -> Decimal {
        vendor_id
            .and_then(|vendor| {
                self.vendor_prices
                    .iter()
                    .filter(|p| p.vendor_id == vendor && p.effective_from <= date)
                    .max_by_key(|p| p.effective_from)
                    .map(|p| p.unit_price)
            })
            .or(self.default_sales_price)
            .unwrap_or(Decimal::ZERO)
    }

    /// Vendor and price for an automatic purchase entry, if the product is
    /// configured for one. An explicit override replaces the default price.
    pub fn auto_purchase(&self, price_override: Option<Decimal>) -> Option<AutoPurchase> {
        let vendor_id = self.purchase_vendor_id?;
        let unit_price = price_override.or(self.default_purchase_price)?;
        Some(AutoPurchase {
            vendor_id,
            unit_price,
        })
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn widget() -> Product {
        Product::new(ProductId::new(), "W-001", "Widget")
            .unwrap()
            .with_default_prices(Some(dec!(8)), Some(dec!(15)))
            .unwrap()
    }

    #[test]
    fn rejects_blank_code_and_name() {
        assert!(matches!(
            Product::new(ProductId::new(), "  ", "Widget"),
            Err(DomainError::Validation { field: "code", .. })
        ));
        assert!(matches!(
            Product::new(ProductId::new(), "W-001", ""),
            Err(DomainError::Validation { field: "name", .. })
        ));
    }

    #[test]
    fn vendor_price_effective_on_or_before_date_wins() {
        let vendor = VendorId::new();
        let mut product = widget();
        product
            .add_vendor_price(VendorPrice {
                vendor_id: vendor,
                unit_price: dec!(12),
                effective_from: date(2024, 1, 1),
            })
            .unwrap();
        product
            .add_vendor_price(VendorPrice {
                vendor_id: vendor,
                unit_price: dec!(13),
                effective_from: date(2024, 6, 1),
            })
            .unwrap();

        assert_eq!(product.resolve_sales_price(Some(vendor), date(2024, 5, 31)), dec!(12));
        assert_eq!(product.resolve_sales_price(Some(vendor), date(2024, 6, 1)), dec!(13));
        // Before any vendor price is effective the default applies.
        assert_eq!(product.resolve_sales_price(Some(vendor), date(2023, 12, 31)), dec!(15));
        // Another vendor gets the default.
        assert_eq!(product.resolve_sales_price(Some(VendorId::new()), date(2024, 7, 1)), dec!(15));
    }

    #[test]
    fn price_falls_back_to_zero_without_defaults() {
        let product = Product::new(ProductId::new(), "W-002", "Bare").unwrap();
        assert_eq!(product.resolve_sales_price(None, date(2024, 1, 1)), Decimal::ZERO);
    }

    #[test]
    fn duplicate_vendor_price_is_rejected() {
        let vendor = VendorId::new();
        let mut product = widget();
        let price = VendorPrice {
            vendor_id: vendor,
            unit_price: dec!(12),
            effective_from: date(2024, 1, 1),
        };
        product.add_vendor_price(price.clone()).unwrap();
        assert!(matches!(
            product.add_vendor_price(price),
            Err(DomainError::Duplicate { .. })
        ));
    }

    #[test]
    fn auto_purchase_needs_vendor_and_price() {
        let vendor = VendorId::new();
        assert_eq!(widget().auto_purchase(None), None);

        let configured = widget().with_purchase_vendor(vendor);
        assert_eq!(
            configured.auto_purchase(None),
            Some(AutoPurchase { vendor_id: vendor, unit_price: dec!(8) })
        );
        assert_eq!(
            configured.auto_purchase(Some(dec!(9.5))).map(|p| p.unit_price),
            Some(dec!(9.5))
        );

        let no_price = Product::new(ProductId::new(), "W-003", "No price")
            .unwrap()
            .with_purchase_vendor(vendor);
        assert_eq!(no_price.auto_purchase(None), None);
    }

    proptest! {
        /// The resolved price is always one of the configured prices (or zero).
        #[test]
        fn resolved_price_is_a_configured_price(
            offsets in prop::collection::vec(0i64..365, 0..6),
            probe in 0i64..400,
        ) {
            let vendor = VendorId::new();
            let mut product = widget();
            let base = date(2024, 1, 1);
            let mut seen = std::collections::HashSet::new();
            for (i, off) in offsets.iter().enumerate() {
                if !seen.insert(*off) {
                    continue;
                }
                product.add_vendor_price(VendorPrice {
                    vendor_id: vendor,
                    unit_price: Decimal::from(20 + i as i64),
                    effective_from: base + chrono::Duration::days(*off),
                }).unwrap();
            }

            let price = product.resolve_sales_price(Some(vendor), base + chrono::Duration::days(probe));
            let allowed: Vec<Decimal> = product
                .vendor_prices()
                .iter()
                .map(|p| p.unit_price)
                .chain([dec!(15)])
                .collect();
            prop_assert!(allowed.contains(&price));
        }
    }
}

//! Money and quantity helpers shared by the costing components.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Round a monetary amount to the ledger currency scale (half away from zero).
pub fn round_money(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject negative monetary inputs, naming the offending field.
pub fn ensure_non_negative(field: &'static str, amount: Decimal) -> DomainResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DomainError::validation(field, format!("must not be negative (got {amount})")));
    }
    Ok(())
}

/// Reject zero or negative quantities, naming the offending field.
pub fn ensure_positive_quantity(field: &'static str, quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(field, format!("must be positive (got {quantity})")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(1.005), 2), dec!(1.01));
        assert_eq!(round_money(dec!(-1.005), 2), dec!(-1.01));
        assert_eq!(round_money(dec!(3.3333333), 2), dec!(3.33));
    }

    #[test]
    fn negative_amount_names_field() {
        let err = ensure_non_negative("duty_amount", dec!(-0.01)).unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation {
                field: "duty_amount",
                message: "must not be negative (got -0.01)".to_string(),
            }
        );
        assert!(ensure_non_negative("duty_amount", Decimal::ZERO).is_ok());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(ensure_positive_quantity("quantity", 0).is_err());
        assert!(ensure_positive_quantity("quantity", -3).is_err());
        assert!(ensure_positive_quantity("quantity", 1).is_ok());
    }
}

//! Proportional splitting of a monetary total.

use rust_decimal::{Decimal, RoundingStrategy};

use tradeerp_core::round_money;

/// Split `total` across `weights` proportionally, truncating each share to
/// `scale`. The residual lands on `residual_index` so the shares sum to
/// exactly `round_money(total)` and no share goes negative.
///
/// Callers guarantee `weights` is non-empty, has a positive sum and that
/// `residual_index` is in range.
pub(crate) fn split_proportionally(
    total: Decimal,
    weights: &[Decimal],
    scale: u32,
    residual_index: usize,
) -> Vec<Decimal> {
    let weight_sum: Decimal = weights.iter().copied().sum();
    let total = round_money(total, scale);

    let mut shares: Vec<Decimal> = weights
        .iter()
        .map(|w| (total * *w / weight_sum).round_dp_with_strategy(scale, RoundingStrategy::ToZero))
        .collect();

    let allocated: Decimal = shares.iter().copied().sum();
    if let Some(share) = shares.get_mut(residual_index) {
        *share += total - allocated;
    }
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn thirds_keep_the_total() {
        let shares = split_proportionally(dec!(100), &[dec!(1), dec!(1), dec!(1)], 2, 2);
        assert_eq!(shares, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    }

    #[test]
    fn proportional_weights() {
        let shares = split_proportionally(dec!(10000), &[dec!(1000), dec!(250)], 2, 0);
        assert_eq!(shares, vec![dec!(8000), dec!(2000)]);
    }

    #[test]
    fn tiny_totals_never_go_negative() {
        let shares = split_proportionally(dec!(0.02), &[dec!(1); 4], 2, 0);
        assert_eq!(shares, vec![dec!(0.02), dec!(0), dec!(0), dec!(0)]);
    }
}

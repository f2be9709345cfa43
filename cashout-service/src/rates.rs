//! Regional-to-fiat conversion
//!
//! Given regional amount R, sell ratio S and sell-out fee F:
//! credit C = round2(R * S - F), and the inverse
//! R = round2((C + F) / S). round2 is half-to-even at two decimal
//! places. Fiat currency, ratio and fee are configuration, not
//! constants.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round to two decimals, banker's rounding.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Conversion ratio and fee, captured on every cash-out operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatiosAndFees {
    /// Regional→fiat sell ratio
    pub sell_ratio: Decimal,
    /// Flat sell-out fee, in fiat
    pub sell_fee: Decimal,
}

impl Default for RatiosAndFees {
    fn default() -> Self {
        Self {
            sell_ratio: Decimal::new(95, 2),
            sell_fee: Decimal::ZERO,
        }
    }
}

impl RatiosAndFees {
    /// Fiat credit obtained for a regional debit.
    pub fn credit_from_debit(&self, regional: Decimal) -> Decimal {
        round2(regional * self.sell_ratio - self.sell_fee)
    }

    /// Regional debit required for a fiat credit.
    pub fn debit_from_credit(&self, credit: Decimal) -> Decimal {
        round2((credit + self.sell_fee) / self.sell_ratio)
    }
}

/// Conversion configuration of one sandbox instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Fiat currency cash-outs settle in
    pub fiat_currency: String,
    /// Active ratio and fee
    pub ratios: RatiosAndFees,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            fiat_currency: "CHF".to_string(),
            ratios: RatiosAndFees::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_conversion() {
        // 20 EUR at S=0.95, F=0 gives 19 CHF, and back.
        let ratios = RatiosAndFees::default();
        assert_eq!(
            ratios.credit_from_debit(Decimal::from(20)),
            Decimal::new(1900, 2)
        );
        assert_eq!(
            ratios.debit_from_credit(Decimal::from(19)),
            Decimal::new(2000, 2)
        );
    }

    #[test]
    fn test_fee_is_subtracted_after_ratio() {
        let ratios = RatiosAndFees {
            sell_ratio: Decimal::new(95, 2),
            sell_fee: Decimal::new(50, 2),
        };
        // 100 * 0.95 - 0.50 = 94.50
        assert_eq!(
            ratios.credit_from_debit(Decimal::from(100)),
            Decimal::new(9450, 2)
        );
        // (94.50 + 0.50) / 0.95 = 100.00
        assert_eq!(
            ratios.debit_from_credit(Decimal::new(9450, 2)),
            Decimal::from(100).round_dp(2)
        );
    }

    #[test]
    fn test_round2_is_bankers() {
        assert_eq!(round2(Decimal::new(1005, 3)), Decimal::new(100, 2)); // 1.005 -> 1.00
        assert_eq!(round2(Decimal::new(1015, 3)), Decimal::new(102, 2)); // 1.015 -> 1.02
    }

    proptest! {
        /// Round-tripping debit -> credit -> debit recovers the
        /// original amount up to the cent the ratio projection loses.
        #[test]
        fn prop_conversion_roundtrip_within_one_cent(cents in 1u64..10_000_000u64) {
            let ratios = RatiosAndFees::default();
            let regional = Decimal::new(cents as i64, 2);
            let credit = ratios.credit_from_debit(regional);
            let back = ratios.debit_from_credit(credit);
            let diff = (back - regional).abs();
            prop_assert!(diff <= Decimal::new(1, 2), "{} -> {} -> {}", regional, credit, back);
        }

        /// Credit -> debit -> credit is exact: the inverse direction
        /// expands, so no information is lost.
        #[test]
        fn prop_credit_direction_is_exact(cents in 1u64..10_000_000u64) {
            let ratios = RatiosAndFees::default();
            let credit = Decimal::new(cents as i64, 2);
            let regional = ratios.debit_from_credit(credit);
            let again = ratios.credit_from_debit(regional);
            let diff = (again - credit).abs();
            prop_assert!(diff <= Decimal::new(1, 2), "{} -> {} -> {}", credit, regional, again);
        }
    }
}

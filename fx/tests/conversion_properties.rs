//! Property-based tests for minor-unit conversion.

use proptest::prelude::*;
use rust_decimal::Decimal;

use coinset_fx::convert_minor_units;

// =============================================================================
// Generators
// =============================================================================

/// Positive rates between 0.0001 and 1000 at four decimals.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000).prop_map(|n| Decimal::new(n, 4))
}

fn arb_amount() -> impl Strategy<Value = i64> {
    -1_000_000_000i64..=1_000_000_000
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Converting between the same rate returns the input.
    #[test]
    fn prop_same_rate_is_identity(amount in any::<i64>(), rate in arb_rate()) {
        prop_assert_eq!(convert_minor_units(amount, Some(rate), Some(rate)), amount);
    }

    /// Converting into a coin with a larger or equal rate and back lands
    /// within one minor unit of the start.
    #[test]
    fn prop_round_trip_within_one_unit(
        amount in arb_amount(),
        a in arb_rate(),
        b in arb_rate(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let there = convert_minor_units(amount, Some(low), Some(high));
        let back = convert_minor_units(there, Some(high), Some(low));

        prop_assert!((back - amount).abs() <= 1, "{} -> {} -> {}", amount, there, back);
    }

    /// A missing rate behaves exactly like a rate of 1.
    #[test]
    fn prop_missing_rate_is_one(amount in arb_amount(), rate in arb_rate()) {
        prop_assert_eq!(
            convert_minor_units(amount, None, Some(rate)),
            convert_minor_units(amount, Some(Decimal::ONE), Some(rate))
        );
        prop_assert_eq!(
            convert_minor_units(amount, Some(rate), None),
            convert_minor_units(amount, Some(rate), Some(Decimal::ONE))
        );
    }

    /// Conversion never flips the sign of an amount.
    #[test]
    fn prop_sign_is_preserved(amount in arb_amount(), a in arb_rate(), b in arb_rate()) {
        let converted = convert_minor_units(amount, Some(a), Some(b));
        prop_assert!(converted == 0 || converted.signum() == amount.signum());
    }
}

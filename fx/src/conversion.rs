//! Amount conversion between coins.
//!
//! Rates are units per one unit of the main coin, so converting from `A`
//! to `B` multiplies by `rate(B) / rate(A)`. The product is computed
//! exactly and rounded once, half away from zero.

use rust_decimal::Decimal;
use tracing::warn;

use coinset_common::round_minor_units;

/// Convert a minor-unit amount given the two coins' rates.
///
/// A missing or non-positive rate counts as 1. A result outside the `i64`
/// range saturates.
pub fn convert_minor_units(amount: i64, from_rate: Option<Decimal>, to_rate: Option<Decimal>) -> i64 {
    let from_rate = usable_rate(from_rate);
    let to_rate = usable_rate(to_rate);
    if from_rate == to_rate {
        return amount;
    }

    Decimal::from(amount)
        .checked_mul(to_rate)
        .and_then(|v| v.checked_div(from_rate))
        .and_then(round_minor_units)
        .unwrap_or_else(|| {
            warn!(amount, %from_rate, %to_rate, "Converted amount out of range, saturating");
            if amount < 0 {
                i64::MIN
            } else {
                i64::MAX
            }
        })
}

/// The multiplier applied when converting from `from_rate` to `to_rate`,
/// with the same degradation as [`convert_minor_units`].
pub fn effective_rate(from_rate: Option<Decimal>, to_rate: Option<Decimal>) -> Decimal {
    let from_rate = usable_rate(from_rate);
    let to_rate = usable_rate(to_rate);
    to_rate.checked_div(from_rate).unwrap_or(Decimal::ONE)
}

fn usable_rate(rate: Option<Decimal>) -> Decimal {
    match rate {
        Some(rate) if rate > Decimal::ZERO => rate,
        Some(rate) => {
            warn!(%rate, "Non-positive exchange rate, using 1");
            Decimal::ONE
        }
        None => Decimal::ONE,
    }
}

//! Minor-unit amount helpers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Minor units per major unit (cents per dollar).
pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Round a decimal amount to a whole number of minor units, halves away
/// from zero. Returns `None` if the result does not fit in an `i64`.
pub fn round_minor_units(value: Decimal) -> Option<i64> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Render a minor-unit amount as a major-unit number with exactly two
/// decimals and `,` thousands separators (`150000` → `1,500.00`).
pub fn format_minor_units(amount: i64) -> String {
    let abs = amount.unsigned_abs();
    let whole = abs / MINOR_UNITS_PER_MAJOR;
    let cents = abs % MINOR_UNITS_PER_MAJOR;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped}.{cents:02}")
}

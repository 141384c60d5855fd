//! Amount formatting.

use coinset_common::{format_minor_units, Coin, SymbolPosition};

/// Render an amount with a symbol on the given side (`$1,500.00`,
/// `1,500.00€`).
pub fn format_with_symbol(amount: i64, symbol: &str, position: SymbolPosition) -> String {
    let number = format_minor_units(amount);
    match position {
        SymbolPosition::Front => format!("{symbol}{number}"),
        SymbolPosition::Back => format!("{number}{symbol}"),
    }
}

/// Render an amount in a known coin.
pub fn format_coin(amount: i64, coin: &Coin) -> String {
    format_with_symbol(amount, &coin.symbol, coin.symbol_position)
}

/// Render an amount for a code with no known coin: the raw code, a space,
/// then the number.
pub fn format_unknown(amount: i64, code: &str) -> String {
    format!("{} {}", code.trim(), format_minor_units(amount))
}

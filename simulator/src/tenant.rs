//! Simulated tenant coin set.

use rust_decimal::Decimal;

use coinset_common::{NewCoin, ShortCode, SymbolPosition};

/// Coins a simulated tenant adds after seeding USD as main.
pub struct CoinRoster;

impl CoinRoster {
    /// The first `count` non-main coins, rates relative to USD.
    pub fn coins(count: usize) -> anyhow::Result<Vec<NewCoin>> {
        let known = [
            ("EUR", "Euro", "€", SymbolPosition::Back, 92),
            ("GBP", "Pound Sterling", "£", SymbolPosition::Front, 79),
            ("JPY", "Japanese Yen", "¥", SymbolPosition::Front, 14950),
            ("CHF", "Swiss Franc", "Fr", SymbolPosition::Back, 88),
            ("CAD", "Canadian Dollar", "C$", SymbolPosition::Front, 136),
            ("AUD", "Australian Dollar", "A$", SymbolPosition::Front, 152),
            ("SEK", "Swedish Krona", "kr", SymbolPosition::Back, 1045),
            ("INR", "Indian Rupee", "₹", SymbolPosition::Front, 8330),
        ];

        (0..count)
            .map(|i| {
                let new = match known.get(i) {
                    Some((code, name, symbol, position, cents)) => {
                        NewCoin::new(*name, ShortCode::parse(code)?, *symbol, *position)
                            .rate(Decimal::new(*cents, 2))
                    }
                    None => {
                        // Coins beyond the predefined list
                        let code = format!("X{:02}", i + 1);
                        NewCoin::new(
                            format!("Sim Coin {}", i + 1),
                            ShortCode::parse(&code)?,
                            "¤",
                            SymbolPosition::Front,
                        )
                        .rate(Decimal::new(100 + i as i64 * 10, 2))
                    }
                };
                Ok(new)
            })
            .collect()
    }
}

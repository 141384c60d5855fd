//! The coin entity and the inputs used to create and modify it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoinError, Result};
use crate::identifiers::{CoinId, ShortCode};

/// Maximum length of a coin's display name.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a coin's symbol.
pub const MAX_SYMBOL_LEN: usize = 5;

/// Where the symbol goes relative to the formatted number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPosition {
    /// `$1,500.00`
    Front,
    /// `1,500.00€`
    Back,
}

impl SymbolPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolPosition::Front => "front",
            SymbolPosition::Back => "back",
        }
    }
}

impl fmt::Display for SymbolPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a coin's exchange rate changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateChangeReason {
    /// Re-expressed relative to a newly promoted main coin.
    Rescaled { main: ShortCode },
    /// The coin itself became main and its rate was reset to 1.
    Promoted,
    /// Set explicitly by an administrative update.
    Manual,
}

/// One entry of a coin's rate log: the rate the coin had before a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateHistoryEntry {
    /// Rate in effect before the change.
    pub rate: Decimal,
    /// When the change was committed.
    pub recorded_at: DateTime<Utc>,
    /// What caused the change.
    pub reason: RateChangeReason,
}

/// A currency known to the tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: CoinId,
    pub name: String,
    pub short_code: ShortCode,
    pub symbol: String,
    pub symbol_position: SymbolPosition,
    /// Inactive coins are skipped by currency selection.
    pub active: bool,
    /// At most one coin in a set is main.
    pub is_main: bool,
    /// Units of this coin per one unit of the main coin.
    pub exchange_rate: Decimal,
    /// Write-only rate log; conversion never reads it.
    pub rate_history: Option<Vec<RateHistoryEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coin {
    /// Build a stored record from validated input.
    pub fn from_new(id: CoinId, new: NewCoin, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            short_code: new.short_code,
            symbol: new.symbol,
            symbol_position: new.symbol_position,
            active: new.active,
            is_main: new.is_main,
            exchange_rate: new.exchange_rate.unwrap_or(Decimal::ONE),
            rate_history: new.rate_history,
            created_at: now,
            updated_at: now,
        }
    }

    /// History with the current rate appended as a new entry.
    pub fn history_with_current_rate(
        &self,
        reason: RateChangeReason,
        at: DateTime<Utc>,
    ) -> Vec<RateHistoryEntry> {
        let mut history = self.rate_history.clone().unwrap_or_default();
        history.push(RateHistoryEntry {
            rate: self.exchange_rate,
            recorded_at: at,
            reason,
        });
        history
    }

    /// Display metadata for this coin.
    pub fn summary(&self) -> CoinSummary {
        CoinSummary {
            short_code: self.short_code.clone(),
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            position: self.symbol_position,
            exchange_rate: self.exchange_rate,
        }
    }
}

/// The public face of a coin exposed to display collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinSummary {
    pub short_code: ShortCode,
    pub name: String,
    pub symbol: String,
    pub position: SymbolPosition,
    pub exchange_rate: Decimal,
}

/// Fields for creating a coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCoin {
    pub name: String,
    pub short_code: ShortCode,
    pub symbol: String,
    pub symbol_position: SymbolPosition,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub is_main: bool,
    /// Absent means 1.
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub rate_history: Option<Vec<RateHistoryEntry>>,
}

fn default_active() -> bool {
    true
}

impl NewCoin {
    /// Create an active, non-main coin with rate 1.
    pub fn new(
        name: impl Into<String>,
        short_code: ShortCode,
        symbol: impl Into<String>,
        symbol_position: SymbolPosition,
    ) -> Self {
        Self {
            name: name.into(),
            short_code,
            symbol: symbol.into(),
            symbol_position,
            active: true,
            is_main: false,
            exchange_rate: None,
            rate_history: None,
        }
    }

    /// Mark the coin as main.
    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }

    /// Set the exchange rate.
    pub fn rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = Some(rate);
        self
    }

    /// Mark the coin as inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Rate the coin will be stored with.
    pub fn effective_rate(&self) -> Decimal {
        self.exchange_rate.unwrap_or(Decimal::ONE)
    }

    /// Check field-level rules.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_symbol(&self.symbol)?;
        if let Some(rate) = self.exchange_rate {
            validate_rate(rate)?;
        }
        Ok(())
    }
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_code: Option<ShortCode>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub symbol_position: Option<SymbolPosition>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub is_main: Option<bool>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    /// Replaces the whole rate log.
    #[serde(default)]
    pub rate_history: Option<Vec<RateHistoryEntry>>,
}

impl CoinPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn short_code(mut self, code: ShortCode) -> Self {
        self.short_code = Some(code);
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>, position: SymbolPosition) -> Self {
        self.symbol = Some(symbol.into());
        self.symbol_position = Some(position);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn main(mut self, is_main: bool) -> Self {
        self.is_main = Some(is_main);
        self
    }

    pub fn rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = Some(rate);
        self
    }

    pub fn history(mut self, history: Vec<RateHistoryEntry>) -> Self {
        self.rate_history = Some(history);
        self
    }

    /// True if applying the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check field-level rules for the fields present.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(symbol) = &self.symbol {
            validate_symbol(symbol)?;
        }
        if let Some(rate) = self.exchange_rate {
            validate_rate(rate)?;
        }
        Ok(())
    }

    /// Apply the present fields to a coin.
    pub fn apply(&self, coin: &mut Coin, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            coin.name = name.clone();
        }
        if let Some(code) = &self.short_code {
            coin.short_code = code.clone();
        }
        if let Some(symbol) = &self.symbol {
            coin.symbol = symbol.clone();
        }
        if let Some(position) = self.symbol_position {
            coin.symbol_position = position;
        }
        if let Some(active) = self.active {
            coin.active = active;
        }
        if let Some(is_main) = self.is_main {
            coin.is_main = is_main;
        }
        if let Some(rate) = self.exchange_rate {
            coin.exchange_rate = rate;
        }
        if let Some(history) = &self.rate_history {
            coin.rate_history = Some(history.clone());
        }
        coin.updated_at = now;
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoinError::invalid("name", "name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoinError::invalid(
            "name",
            format!("name must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(CoinError::invalid("symbol", "symbol must not be empty"));
    }
    if symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(CoinError::invalid(
            "symbol",
            format!("symbol must be at most {MAX_SYMBOL_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_rate(rate: Decimal) -> Result<()> {
    if rate <= Decimal::ZERO {
        return Err(CoinError::invalid(
            "exchange_rate",
            format!("exchange rate must be positive, got {rate}"),
        ));
    }
    Ok(())
}

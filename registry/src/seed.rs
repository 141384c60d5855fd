//! Seeding a tenant's first currency.

use serde::{Deserialize, Serialize};
use tracing::info;

use coinset_common::{Coin, NewCoin, Result, ShortCode, SymbolPosition};
use coinset_store::CoinCache;

use crate::engine::CoinRegistry;

/// Currencies offered out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PresetCurrency {
    Usd,
    Eur,
}

impl PresetCurrency {
    /// Look a preset up by its code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "USD" => Some(PresetCurrency::Usd),
            "EUR" => Some(PresetCurrency::Eur),
            _ => None,
        }
    }

    pub fn new_coin(&self) -> NewCoin {
        match self {
            PresetCurrency::Usd => {
                NewCoin::new("US Dollar", ShortCode::usd(), "$", SymbolPosition::Front)
            }
            PresetCurrency::Eur => NewCoin::new("Euro", ShortCode::eur(), "€", SymbolPosition::Back),
        }
    }
}

/// What to seed a tenant with.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantSeed {
    Preset(PresetCurrency),
    Custom(NewCoin),
}

impl TenantSeed {
    fn into_new_coin(self) -> NewCoin {
        match self {
            TenantSeed::Preset(preset) => preset.new_coin(),
            TenantSeed::Custom(new) => new,
        }
    }
}

impl From<PresetCurrency> for TenantSeed {
    fn from(preset: PresetCurrency) -> Self {
        TenantSeed::Preset(preset)
    }
}

/// Create the tenant's main coin at rate 1.
///
/// Refuses with an invariant violation when the tenant already has a main
/// coin. A custom seed's rate, if given, must be 1.
pub async fn seed_main_coin(
    registry: &CoinRegistry,
    cache: &CoinCache,
    seed: impl Into<TenantSeed>,
) -> Result<Coin> {
    let coin = registry
        .create_first_main(cache, seed.into().into_new_coin())
        .await?;
    info!(code = %coin.short_code, "Tenant seeded with main coin");
    Ok(coin)
}

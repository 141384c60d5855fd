//! The currency service: display-side operations for a unit of work.
//!
//! Nothing here fails because of missing or stale coin data. Unknown codes
//! convert at rate 1 and format with the raw code; store errors are logged
//! and treated as missing data.

use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use coinset_common::{Coin, CoinSummary, ShortCode};
use coinset_store::{CoinCache, CoinFilter, CoinStore};

use crate::config::FxConfig;
use crate::context::UnitOfWork;
use crate::conversion::convert_minor_units;
use crate::format::{format_coin, format_unknown};
use crate::resolver::CurrencyResolver;

/// Conversion and formatting over the coins of a unit of work.
pub struct CurrencyService {
    resolver: CurrencyResolver,
    config: FxConfig,
    conversions: AtomicU64,
    degraded_lookups: AtomicU64,
}

impl CurrencyService {
    pub fn new(config: FxConfig) -> Self {
        Self {
            resolver: CurrencyResolver::new(&config),
            config,
            conversions: AtomicU64::new(0),
            degraded_lookups: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &FxConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CurrencyResolver {
        &self.resolver
    }

    /// The currency of this unit of work, resolved once.
    pub async fn current(&self, uow: &UnitOfWork) -> ShortCode {
        uow.currency(&self.resolver).await.code.clone()
    }

    /// Convert a minor-unit amount between two codes.
    #[instrument(skip(self, uow))]
    pub async fn convert(&self, uow: &UnitOfWork, amount: i64, from: &str, to: &str) -> i64 {
        if same_code(from, to) {
            return amount;
        }

        let from_rate = self.rate_of(uow.cache(), from).await;
        let to_rate = self.rate_of(uow.cache(), to).await;
        self.conversions.fetch_add(1, Ordering::Relaxed);

        let converted = convert_minor_units(amount, from_rate, to_rate);
        debug!(converted, "Amount converted");
        converted
    }

    /// Convert with defaults: `to` falls back to the current currency and
    /// `from` to the main coin.
    pub async fn convert_amount(
        &self,
        uow: &UnitOfWork,
        amount: i64,
        from: Option<&str>,
        to: Option<&str>,
    ) -> i64 {
        let to = match to {
            Some(code) => code.to_string(),
            None => self.current(uow).await.to_string(),
        };
        let from = match from {
            Some(code) => code.to_string(),
            None => match self.main_coin(uow.cache()).await {
                Some(main) => main.short_code.to_string(),
                // No main coin: amounts are in the main frame, rate 1.
                None => return self.convert_from_main_frame(uow, amount, &to).await,
            },
        };
        self.convert(uow, amount, &from, &to).await
    }

    /// Format an amount in the given code.
    pub async fn format(&self, uow: &UnitOfWork, amount: i64, code: &str) -> String {
        match self.lookup(uow.cache(), code).await {
            Some(coin) => format_coin(amount, &coin),
            None => format_unknown(amount, code),
        }
    }

    /// Format an amount in the current currency.
    pub async fn format_current(&self, uow: &UnitOfWork, amount: i64) -> String {
        let code = self.current(uow).await;
        self.format(uow, amount, code.as_str()).await
    }

    /// Display metadata for the current currency, or for the main coin if
    /// the resolved code no longer exists.
    pub async fn current_metadata(&self, uow: &UnitOfWork) -> Option<CoinSummary> {
        let code = self.current(uow).await;
        match self.lookup(uow.cache(), code.as_str()).await {
            Some(coin) => Some(coin.summary()),
            None => self.main_coin(uow.cache()).await.map(|c| c.summary()),
        }
    }

    /// Display metadata for the main coin.
    pub async fn main_metadata(&self, uow: &UnitOfWork) -> Option<CoinSummary> {
        self.main_coin(uow.cache()).await.map(|c| c.summary())
    }

    /// Display metadata for every active coin, newest first.
    pub async fn available(&self, uow: &UnitOfWork) -> Vec<CoinSummary> {
        match uow.cache().store().list(&CoinFilter::active()).await {
            Ok(coins) => coins.iter().map(Coin::summary).collect(),
            Err(err) => {
                self.degraded();
                warn!(error = %err, "Listing active coins failed");
                Vec::new()
            }
        }
    }

    /// Get service statistics.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            conversions: self.conversions.load(Ordering::Relaxed),
            degraded_lookups: self.degraded_lookups.load(Ordering::Relaxed),
        }
    }

    async fn convert_from_main_frame(&self, uow: &UnitOfWork, amount: i64, to: &str) -> i64 {
        let to_rate = self.rate_of(uow.cache(), to).await;
        self.conversions.fetch_add(1, Ordering::Relaxed);
        convert_minor_units(amount, None, to_rate)
    }

    async fn rate_of(&self, cache: &CoinCache, code: &str) -> Option<Decimal> {
        self.lookup(cache, code).await.map(|c| c.exchange_rate)
    }

    async fn lookup(&self, cache: &CoinCache, code: &str) -> Option<Coin> {
        let Ok(short_code) = ShortCode::parse(code) else {
            self.degraded();
            warn!(code, "Malformed currency code, degrading");
            return None;
        };

        match cache.by_code(&short_code).await {
            Ok(Some(coin)) => Some(coin),
            Ok(None) => {
                self.degraded();
                warn!(code = %short_code, "Unknown currency code, degrading");
                None
            }
            Err(err) => {
                self.degraded();
                warn!(code = %short_code, error = %err, "Coin lookup failed");
                None
            }
        }
    }

    async fn main_coin(&self, cache: &CoinCache) -> Option<Coin> {
        match cache.main().await {
            Ok(main) => main,
            Err(err) => {
                self.degraded();
                warn!(error = %err, "Main coin lookup failed");
                None
            }
        }
    }

    fn degraded(&self) {
        self.degraded_lookups.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for CurrencyService {
    fn default() -> Self {
        Self::new(FxConfig::default())
    }
}

/// Service statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub conversions: u64,
    /// Lookups that fell back to rate 1 or raw-code display.
    pub degraded_lookups: u64,
}

fn same_code(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

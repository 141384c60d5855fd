//! Display-side configuration.

use coinset_common::ShortCode;

/// Configuration for currency resolution and display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxConfig {
    /// Code used when no candidate validates and the set has no main coin.
    pub fallback_currency: ShortCode,
    /// Request header carrying the caller's currency choice.
    pub currency_header: String,
    /// Request parameter carrying the caller's currency choice.
    pub currency_param: String,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            fallback_currency: ShortCode::usd(),
            currency_header: "X-Currency".to_string(),
            currency_param: "currency".to_string(),
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(code) = std::env::var("COINS_FALLBACK_CURRENCY") {
            if let Ok(code) = code.parse() {
                config.fallback_currency = code;
            }
        }

        if let Ok(header) = std::env::var("COINS_CURRENCY_HEADER") {
            config.currency_header = header;
        }

        if let Ok(param) = std::env::var("COINS_CURRENCY_PARAM") {
            config.currency_param = param;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.currency_header.trim().is_empty() {
            return Err("Currency header name cannot be empty".to_string());
        }

        if self.currency_param.trim().is_empty() {
            return Err("Currency parameter name cannot be empty".to_string());
        }

        Ok(())
    }
}

//! Registry configuration.

/// Largest rate scale a rescale may round to.
pub const MAX_RATE_SCALE: u32 = 12;

/// Coin registry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Decimal places rescaled rates are rounded to.
    pub rate_scale: u32,
    /// Page size used when a listing does not ask for one.
    pub default_page_size: usize,
    /// Upper bound on a requested page size.
    pub max_page_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rate_scale: 4,
            default_page_size: 15,
            max_page_size: 100,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(scale) = std::env::var("COINS_RATE_SCALE") {
            if let Ok(scale) = scale.parse() {
                config.rate_scale = scale;
            }
        }

        if let Ok(size) = std::env::var("COINS_PAGE_SIZE") {
            if let Ok(size) = size.parse() {
                config.default_page_size = size;
            }
        }

        if let Ok(size) = std::env::var("COINS_MAX_PAGE_SIZE") {
            if let Ok(size) = size.parse() {
                config.max_page_size = size;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_scale == 0 || self.rate_scale > MAX_RATE_SCALE {
            return Err(format!("Rate scale must be between 1 and {MAX_RATE_SCALE}"));
        }

        if self.default_page_size == 0 {
            return Err("Page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            return Err("Default page size cannot exceed max page size".to_string());
        }

        Ok(())
    }
}

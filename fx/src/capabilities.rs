//! Named values a host application exposes to its views.
//!
//! Providers are kept in a plain list ordered by priority and resolved on
//! demand for one unit of work into a JSON map.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::UnitOfWork;
use crate::engine::CurrencyService;
use crate::error::{FxError, FxResult};

/// Key of the main coin's metadata.
pub const BASE_COIN: &str = "base_coin";
/// Key of the current currency's metadata.
pub const CURRENT_COIN: &str = "current_coin";
/// Key of the active coins' metadata.
pub const AVAILABLE_COINS: &str = "available_coins";

/// Produces one capability value. `None` leaves the key out.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn provide(
        &self,
        service: &CurrencyService,
        uow: &UnitOfWork,
    ) -> serde_json::Result<Option<Value>>;
}

/// Main coin metadata.
pub struct BaseCoin;

#[async_trait]
impl CapabilityProvider for BaseCoin {
    async fn provide(
        &self,
        service: &CurrencyService,
        uow: &UnitOfWork,
    ) -> serde_json::Result<Option<Value>> {
        service
            .main_metadata(uow)
            .await
            .map(serde_json::to_value)
            .transpose()
    }
}

/// Current currency metadata.
pub struct CurrentCoin;

#[async_trait]
impl CapabilityProvider for CurrentCoin {
    async fn provide(
        &self,
        service: &CurrencyService,
        uow: &UnitOfWork,
    ) -> serde_json::Result<Option<Value>> {
        service
            .current_metadata(uow)
            .await
            .map(serde_json::to_value)
            .transpose()
    }
}

/// Metadata of every active coin.
pub struct AvailableCoins;

#[async_trait]
impl CapabilityProvider for AvailableCoins {
    async fn provide(
        &self,
        service: &CurrencyService,
        uow: &UnitOfWork,
    ) -> serde_json::Result<Option<Value>> {
        serde_json::to_value(service.available(uow).await).map(Some)
    }
}

/// A fixed value.
pub struct StaticValue(pub Value);

#[async_trait]
impl CapabilityProvider for StaticValue {
    async fn provide(
        &self,
        _service: &CurrencyService,
        _uow: &UnitOfWork,
    ) -> serde_json::Result<Option<Value>> {
        Ok(Some(self.0.clone()))
    }
}

struct Registration {
    key: String,
    priority: i32,
    provider: Arc<dyn CapabilityProvider>,
}

/// Priority-ordered capability list.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Vec<Registration>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the coin capabilities registered.
    pub fn with_coin_capabilities() -> FxResult<Self> {
        let mut registry = Self::new();
        registry.register(BASE_COIN, 10, Arc::new(BaseCoin))?;
        registry.register(CURRENT_COIN, 20, Arc::new(CurrentCoin))?;
        registry.register(AVAILABLE_COINS, 30, Arc::new(AvailableCoins))?;
        Ok(registry)
    }

    /// Register a provider. Lower priorities resolve first; equal
    /// priorities keep registration order.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        priority: i32,
        provider: Arc<dyn CapabilityProvider>,
    ) -> FxResult<()> {
        let key = key.into();
        if self.entries.iter().any(|e| e.key == key) {
            return Err(FxError::DuplicateCapability(key));
        }

        let at = self
            .entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            at,
            Registration {
                key,
                priority,
                provider,
            },
        );
        Ok(())
    }

    /// Registered keys in resolution order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every capability for a unit of work.
    pub async fn resolve(
        &self,
        service: &CurrencyService,
        uow: &UnitOfWork,
    ) -> FxResult<Map<String, Value>> {
        let mut values = Map::new();
        for entry in &self.entries {
            let value = entry
                .provider
                .provide(service, uow)
                .await
                .map_err(|source| FxError::Serialization {
                    key: entry.key.clone(),
                    source,
                })?;

            match value {
                Some(value) => {
                    values.insert(entry.key.clone(), value);
                }
                None => debug!(key = %entry.key, "Capability has no value"),
            }
        }
        Ok(values)
    }
}

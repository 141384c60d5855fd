//! Per-unit-of-work currency state.
//!
//! A [`UnitOfWork`] owns its own coin cache and resolves the current
//! currency at most once, so every conversion inside one logical operation
//! sees the same currency even if coins change meanwhile.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use coinset_common::ShortCode;
use coinset_store::{CoinCache, CoinStore};

use crate::config::FxConfig;
use crate::resolver::{CurrencyResolver, Resolution};

/// Where a candidate currency code came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Chosen explicitly by the caller for this operation.
    Override,
    /// Request header.
    Header,
    /// Request parameter.
    Param,
    /// Remembered from an earlier operation of the same client.
    Stored,
    /// The main coin.
    Main,
    /// Configured last resort.
    Fallback,
}

impl CandidateSource {
    /// Whether a choice from this source should be remembered for later
    /// operations of the same client.
    pub fn should_persist(&self) -> bool {
        matches!(self, CandidateSource::Header | CandidateSource::Param)
    }
}

/// Raw candidate codes supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencyContext {
    pub override_code: Option<String>,
    pub header: Option<String>,
    pub param: Option<String>,
    pub stored: Option<String>,
}

impl CurrencyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick candidates out of request headers and parameters using the
    /// configured names. Header names match case-insensitively.
    pub fn from_request(
        config: &FxConfig,
        headers: &HashMap<String, String>,
        params: &HashMap<String, String>,
        stored: Option<String>,
    ) -> Self {
        let header = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&config.currency_header))
            .map(|(_, value)| value.clone());

        Self {
            override_code: None,
            header,
            param: params.get(&config.currency_param).cloned(),
            stored,
        }
    }

    pub fn with_override(mut self, code: impl Into<String>) -> Self {
        self.override_code = Some(code.into());
        self
    }

    pub fn with_header(mut self, code: impl Into<String>) -> Self {
        self.header = Some(code.into());
        self
    }

    pub fn with_param(mut self, code: impl Into<String>) -> Self {
        self.param = Some(code.into());
        self
    }

    pub fn with_stored(mut self, code: impl Into<String>) -> Self {
        self.stored = Some(code.into());
        self
    }

    /// Candidates in priority order.
    pub fn candidates(&self) -> [(CandidateSource, Option<&str>); 4] {
        [
            (CandidateSource::Override, self.override_code.as_deref()),
            (CandidateSource::Header, self.header.as_deref()),
            (CandidateSource::Param, self.param.as_deref()),
            (CandidateSource::Stored, self.stored.as_deref()),
        ]
    }
}

/// One logical operation, such as one inbound request.
pub struct UnitOfWork {
    cache: Arc<CoinCache>,
    context: CurrencyContext,
    resolution: OnceCell<Resolution>,
}

impl UnitOfWork {
    /// Start a unit of work with a fresh cache over `store`.
    pub fn new(store: Arc<dyn CoinStore>, context: CurrencyContext) -> Self {
        Self::with_cache(Arc::new(CoinCache::new(store)), context)
    }

    /// Start a unit of work over an existing cache.
    pub fn with_cache(cache: Arc<CoinCache>, context: CurrencyContext) -> Self {
        Self {
            cache,
            context,
            resolution: OnceCell::new(),
        }
    }

    /// The cache scoped to this unit of work. Writes made through the
    /// registry should be given this cache so it is invalidated.
    pub fn cache(&self) -> &CoinCache {
        &self.cache
    }

    pub fn context(&self) -> &CurrencyContext {
        &self.context
    }

    /// Resolve the current currency, once.
    pub async fn currency(&self, resolver: &CurrencyResolver) -> &Resolution {
        self.resolution
            .get_or_init(|| resolver.resolve(&self.cache, &self.context))
            .await
    }

    /// The resolution, if it already happened.
    pub fn resolved(&self) -> Option<&Resolution> {
        self.resolution.get()
    }

    /// The code the transport layer should remember for this client, if
    /// the resolution accepted a header or parameter candidate.
    pub fn preference_to_persist(&self) -> Option<&ShortCode> {
        self.resolved()
            .filter(|r| r.source.should_persist())
            .map(|r| &r.code)
    }
}

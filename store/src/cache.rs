//! Repository cache in front of a coin store.
//!
//! One cache instance belongs to one unit of work. Each distinct code, and
//! the main coin, is read from the store at most once per cache lifetime,
//! including lookups that found nothing. Entries are stamped with the
//! cache generation they were filled in; [`CoinCache::invalidate`] bumps
//! the generation, so a fill racing an invalidation is never served.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use coinset_common::{Coin, ShortCode};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreResult;
use crate::store::CoinStore;

/// Cached lookup result. `coin == None` records a negative lookup.
#[derive(Debug, Clone)]
struct CacheEntry {
    coin: Option<Coin>,
    generation: u64,
    cached_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(coin: Option<Coin>, generation: u64) -> Self {
        Self {
            coin,
            generation,
            cached_at: Utc::now(),
        }
    }

    fn is_valid(&self, generation: u64, ttl: Option<Duration>) -> bool {
        if self.generation != generation {
            return false;
        }
        match ttl {
            Some(ttl) => Utc::now().signed_duration_since(self.cached_at) < ttl,
            None => true,
        }
    }
}

/// Configuration for the coin cache.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Optional time bound on entries, for caches that outlive a request.
    pub ttl: Option<Duration>,
}

/// Memoizing coin lookups for one unit of work.
pub struct CoinCache {
    store: Arc<dyn CoinStore>,
    by_code: DashMap<ShortCode, CacheEntry>,
    main: RwLock<Option<CacheEntry>>,
    generation: AtomicU64,
    config: CacheConfig,
}

impl CoinCache {
    /// Create a cache with default configuration.
    pub fn new(store: Arc<dyn CoinStore>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Create a cache with custom configuration.
    pub fn with_config(store: Arc<dyn CoinStore>, config: CacheConfig) -> Self {
        Self {
            store,
            by_code: DashMap::new(),
            main: RwLock::new(None),
            generation: AtomicU64::new(0),
            config,
        }
    }

    /// The store this cache reads through.
    pub fn store(&self) -> &Arc<dyn CoinStore> {
        &self.store
    }

    /// Look a coin up by code.
    pub async fn by_code(&self, code: &ShortCode) -> StoreResult<Option<Coin>> {
        let generation = self.generation.load(Ordering::SeqCst);

        let cached = self
            .by_code
            .get(code)
            .filter(|e| e.is_valid(generation, self.config.ttl))
            .map(|e| e.coin.clone());
        if let Some(coin) = cached {
            debug!(code = %code, "Cache hit");
            return Ok(coin);
        }

        debug!(code = %code, "Cache miss");
        let coin = self.store.get_by_code(code).await?;
        self.by_code
            .insert(code.clone(), CacheEntry::new(coin.clone(), generation));
        Ok(coin)
    }

    /// The main coin.
    pub async fn main(&self) -> StoreResult<Option<Coin>> {
        let generation = self.generation.load(Ordering::SeqCst);

        let cached = self
            .main
            .read()
            .as_ref()
            .filter(|e| e.is_valid(generation, self.config.ttl))
            .map(|e| e.coin.clone());
        if let Some(coin) = cached {
            debug!("Main coin cache hit");
            return Ok(coin);
        }

        debug!("Main coin cache miss");
        let coin = self.store.get_main().await?;
        *self.main.write() = Some(CacheEntry::new(coin.clone(), generation));
        Ok(coin)
    }

    /// Load every not-yet-cached code with a single store read.
    pub async fn warm<I>(&self, codes: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = ShortCode>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        let uncached: Vec<ShortCode> = codes
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|code| {
                self.by_code
                    .get(code)
                    .map_or(true, |e| !e.is_valid(generation, self.config.ttl))
            })
            .collect();

        if uncached.is_empty() {
            return Ok(());
        }

        let found = self.store.list_many(&uncached).await?;
        debug!(requested = uncached.len(), found = found.len(), "Cache warmed");

        for code in uncached {
            let coin = found.iter().find(|c| c.short_code == code).cloned();
            self.by_code.insert(code, CacheEntry::new(coin, generation));
        }
        Ok(())
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.by_code.clear();
        *self.main.write() = None;
        debug!("Cache invalidated");
    }

    /// Get the number of cached codes, negative entries included.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty() && self.main.read().is_none()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let generation = self.generation.load(Ordering::SeqCst);
        let negative = self.by_code.iter().filter(|e| e.coin.is_none()).count();

        CacheStats {
            code_entries: self.by_code.len(),
            negative_entries: negative,
            main_loaded: self.main.read().is_some(),
            generation,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub code_entries: usize,
    pub negative_entries: usize,
    pub main_loaded: bool,
    pub generation: u64,
}

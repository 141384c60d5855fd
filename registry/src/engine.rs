//! The coin registry: administrative operations over a tenant's coin set.
//!
//! Every write runs in one store transaction, so the single-main rule and
//! the main-relative rate frame hold at each commit point and a failed
//! write leaves the set as it was. After a successful commit the cache of
//! the calling unit of work is invalidated.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use coinset_common::{
    Coin, CoinError, CoinId, CoinPatch, NewCoin, RateChangeReason, Result, ShortCode,
};
use coinset_store::{CoinCache, CoinStore, CoinTransaction};

use crate::config::RegistryConfig;
use crate::metrics::{RegistryMetrics, SharedMetrics};
use crate::query::{ListQuery, Page};
use crate::rescale::{plan_rescale, promotion_patch};

/// Administrative entry point for coins.
pub struct CoinRegistry {
    store: Arc<dyn CoinStore>,
    config: RegistryConfig,
    metrics: SharedMetrics,
}

impl CoinRegistry {
    /// Create a registry with default configuration.
    pub fn new(store: Arc<dyn CoinStore>) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    /// Create a registry with custom configuration.
    pub fn with_config(store: Arc<dyn CoinStore>, config: RegistryConfig) -> Self {
        Self {
            store,
            config,
            metrics: Arc::new(RegistryMetrics::new()),
        }
    }

    /// Share an existing metrics instance.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<dyn CoinStore> {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Get a coin by id.
    #[instrument(skip(self))]
    pub async fn get(&self, id: CoinId) -> Result<Coin> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoinError::NotFound(id.into()))
    }

    /// Get a coin by code through the unit of work's cache.
    pub async fn get_by_code(&self, cache: &CoinCache, code: &ShortCode) -> Result<Coin> {
        cache
            .by_code(code)
            .await?
            .ok_or_else(|| CoinError::NotFound(code.clone().into()))
    }

    /// List coins, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &ListQuery) -> Result<Page<Coin>> {
        let per_page = query
            .per_page
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size)
            .max(1);

        let coins = self.store.list(&query.filter()).await?;
        Ok(Page::slice(coins, query.page.unwrap_or(1), per_page))
    }

    /// Make a coin main and re-express every other rate relative to it.
    ///
    /// A coin that is already main is returned unchanged.
    #[instrument(skip(self, cache))]
    pub async fn set_main(&self, cache: &CoinCache, id: CoinId) -> Result<Coin> {
        let result = self.try_set_main(cache, id).await;
        self.track(result)
    }

    /// Create a coin. A coin created as main demotes the previous main
    /// without rescaling and must carry rate 1.
    #[instrument(skip(self, cache, new), fields(code = %new.short_code, main = new.is_main))]
    pub async fn create(&self, cache: &CoinCache, new: NewCoin) -> Result<Coin> {
        let result = self.try_create(cache, new, false).await;
        self.track(result)
    }

    /// Create the first main coin of a tenant. Fails if a main exists.
    pub(crate) async fn create_first_main(&self, cache: &CoinCache, new: NewCoin) -> Result<Coin> {
        let result = self.try_create(cache, new.main(), true).await;
        self.track(result)
    }

    /// Update a coin. Requesting `is_main = true` on a non-main coin
    /// promotes it exactly as [`CoinRegistry::set_main`] does.
    #[instrument(skip(self, cache, patch))]
    pub async fn update(&self, cache: &CoinCache, id: CoinId, patch: CoinPatch) -> Result<Coin> {
        let result = self.try_update(cache, id, patch).await;
        self.track(result)
    }

    /// Delete a coin. The main coin is only deleted when forced, which
    /// leaves the set without a main.
    #[instrument(skip(self, cache))]
    pub async fn delete(&self, cache: &CoinCache, id: CoinId, force: bool) -> Result<()> {
        let result = self.try_delete(cache, id, force).await;
        self.track(result)
    }

    async fn try_set_main(&self, cache: &CoinCache, id: CoinId) -> Result<Coin> {
        let mut tx = self.store.begin().await?;
        let target = load(tx.as_mut(), id).await?;

        if target.is_main {
            tx.rollback().await?;
            debug!(code = %target.short_code, "Coin is already main");
            return Ok(target);
        }

        let (promoted, rescaled) = self.promote(tx.as_mut(), target).await?;
        commit(tx, cache).await?;

        self.metrics.main_switched(rescaled);
        info!(code = %promoted.short_code, rescaled, "Main coin switched");
        Ok(promoted)
    }

    async fn try_create(&self, cache: &CoinCache, new: NewCoin, seeding: bool) -> Result<Coin> {
        new.validate()?;
        if new.is_main && new.effective_rate() != Decimal::ONE {
            return Err(CoinError::invariant(format!(
                "a main coin must have exchange rate 1, got {}",
                new.effective_rate()
            )));
        }

        let mut tx = self.store.begin().await?;

        if seeding {
            if let Some(main) = tx.get_main().await? {
                return Err(CoinError::invariant(format!(
                    "tenant already has main coin {}",
                    main.short_code
                )));
            }
        }

        if new.is_main {
            let demoted = tx.clear_main_except(None).await?;
            if demoted > 0 {
                info!("Previous main coin demoted, rates kept as they were");
            }
        } else if tx.list_all().await?.is_empty() {
            return Err(CoinError::invariant("the first coin must be created as main"));
        }

        let coin = tx.insert(new).await?;
        commit(tx, cache).await?;

        self.metrics.coin_created();
        info!(coin_id = %coin.id, "Coin created");
        Ok(coin)
    }

    async fn try_update(&self, cache: &CoinCache, id: CoinId, patch: CoinPatch) -> Result<Coin> {
        patch.validate()?;

        let mut tx = self.store.begin().await?;
        let current = load(tx.as_mut(), id).await?;

        if current.is_main && patch.is_main == Some(false) {
            return Err(CoinError::invariant(
                "cannot unset main on the main coin; set another coin as main instead",
            ));
        }

        let promoting = !current.is_main && patch.is_main == Some(true);
        if current.is_main || promoting {
            if let Some(rate) = patch.exchange_rate.filter(|r| *r != Decimal::ONE) {
                return Err(CoinError::invariant(format!(
                    "the main coin's exchange rate must stay 1, got {rate}"
                )));
            }
        }

        let mut rest = patch;
        let mut coin = current;
        let mut rescaled = None;

        if promoting {
            let journaled = coin.rate_history.as_ref().map_or(0, Vec::len);
            let (promoted, count) = self.promote(tx.as_mut(), coin).await?;
            if let Some(history) = rest.rate_history.as_mut() {
                // The promotion entry goes on top of a caller-supplied log.
                let promoted_log = promoted.rate_history.as_deref().unwrap_or_default();
                history.extend(promoted_log.iter().skip(journaled).cloned());
            }
            coin = promoted;
            rescaled = Some(count);
            rest.is_main = None;
            rest.exchange_rate = None;
        }

        if let Some(rate) = rest.exchange_rate {
            if rate == coin.exchange_rate {
                rest.exchange_rate = None;
            } else if rest.rate_history.is_none() {
                rest.rate_history =
                    Some(coin.history_with_current_rate(RateChangeReason::Manual, Utc::now()));
            }
        }

        let updated = if rest.is_empty() {
            coin
        } else {
            tx.update_fields(id, &rest).await?
        };
        commit(tx, cache).await?;

        self.metrics.coin_updated();
        if let Some(count) = rescaled {
            self.metrics.main_switched(count);
            info!(code = %updated.short_code, rescaled = count, "Main coin switched by update");
        }
        info!(coin_id = %updated.id, "Coin updated");
        Ok(updated)
    }

    async fn try_delete(&self, cache: &CoinCache, id: CoinId, force: bool) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let coin = load(tx.as_mut(), id).await?;

        if coin.is_main && !force {
            return Err(CoinError::invariant(
                "cannot delete the main coin without setting another coin as main first",
            ));
        }

        tx.delete(id).await?;
        commit(tx, cache).await?;

        self.metrics.coin_deleted();
        if coin.is_main {
            warn!(code = %coin.short_code, "Main coin force-deleted, set has no main coin");
        } else {
            info!(code = %coin.short_code, "Coin deleted");
        }
        Ok(())
    }

    /// Promote `target` inside an open transaction: clear the old main,
    /// make the target main at rate 1 and rescale the rest.
    async fn promote(&self, tx: &mut dyn CoinTransaction, target: Coin) -> Result<(Coin, usize)> {
        let now = Utc::now();
        let all = tx.list_all().await?;
        let changes = plan_rescale(&all, &target, self.config.rate_scale, now)?;

        let demoted = tx.clear_main_except(Some(target.id)).await?;
        let promoted = tx
            .update_fields(target.id, &promotion_patch(&target, now))
            .await?;

        for change in &changes {
            debug!(
                code = %change.short_code,
                previous = %change.previous,
                rescaled = %change.rescaled,
                "Rate rescaled"
            );
            tx.update_fields(change.coin_id, change.patch()).await?;
        }

        debug!(demoted, divisor = %target.exchange_rate, "Promotion staged");
        Ok((promoted, changes.len()))
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.metrics.write_failed();
            warn!(error = %err, code = err.error_code(), "Coin write rejected");
        }
        result
    }
}

async fn load(tx: &mut dyn CoinTransaction, id: CoinId) -> Result<Coin> {
    tx.get_by_id(id)
        .await?
        .ok_or_else(|| CoinError::NotFound(id.into()))
}

async fn commit(tx: Box<dyn CoinTransaction>, cache: &CoinCache) -> Result<()> {
    tx.commit().await?;
    cache.invalidate();
    Ok(())
}

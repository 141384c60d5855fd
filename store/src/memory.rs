//! In-memory coin store with snapshot isolation.
//!
//! Writers are serialized by an async mutex and work on a private copy of
//! the committed state; commit swaps the copy in under a write lock, so a
//! reader sees either the whole transaction or none of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use coinset_common::{Coin, CoinId, CoinPatch, NewCoin, ShortCode};
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{CoinFilter, CoinStore, CoinTransaction};

#[derive(Debug, Clone)]
struct StoredCoin {
    /// Insertion order, used for newest-first listing.
    seq: u64,
    coin: Coin,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    coins: HashMap<CoinId, StoredCoin>,
    next_seq: u64,
}

impl StoreState {
    fn find_code(&self, code: &ShortCode) -> Option<&Coin> {
        self.coins
            .values()
            .map(|s| &s.coin)
            .find(|c| &c.short_code == code)
    }

    fn find_main(&self) -> Option<&Coin> {
        self.coins.values().map(|s| &s.coin).find(|c| c.is_main)
    }

    fn sorted(&self, filter: &CoinFilter) -> Vec<Coin> {
        let mut stored: Vec<&StoredCoin> = self
            .coins
            .values()
            .filter(|s| filter.matches(&s.coin))
            .collect();
        stored.sort_by(|a, b| b.seq.cmp(&a.seq));
        stored.into_iter().map(|s| s.coin.clone()).collect()
    }
}

/// Read counters, one per kind of non-transactional read.
#[derive(Debug, Default)]
struct StoreStats {
    reads_by_id: AtomicU64,
    reads_by_code: AtomicU64,
    reads_main: AtomicU64,
    reads_many: AtomicU64,
    reads_list: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatsSnapshot {
    pub reads_by_id: u64,
    pub reads_by_code: u64,
    pub reads_main: u64,
    pub reads_many: u64,
    pub reads_list: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

impl StoreStatsSnapshot {
    /// Reads that a repository cache can absorb.
    pub fn cacheable_reads(&self) -> u64 {
        self.reads_by_code + self.reads_main + self.reads_many
    }
}

/// Coin store kept entirely in memory.
pub struct MemoryCoinStore {
    state: Arc<RwLock<StoreState>>,
    writer: Arc<Mutex<()>>,
    stats: Arc<StoreStats>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryCoinStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            writer: Arc::new(Mutex::new(())),
            stats: Arc::new(StoreStats::default()),
            fail_next_commit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the next commit fail with a conflict.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of committed coins.
    pub fn len(&self) -> usize {
        self.state.read().coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every committed coin, taken from one consistent snapshot.
    pub fn snapshot(&self) -> Vec<Coin> {
        self.state.read().sorted(&CoinFilter::default())
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStatsSnapshot {
        let s = &self.stats;
        StoreStatsSnapshot {
            reads_by_id: s.reads_by_id.load(Ordering::Relaxed),
            reads_by_code: s.reads_by_code.load(Ordering::Relaxed),
            reads_main: s.reads_main.load(Ordering::Relaxed),
            reads_many: s.reads_many.load(Ordering::Relaxed),
            reads_list: s.reads_list.load(Ordering::Relaxed),
            commits: s.commits.load(Ordering::Relaxed),
            rollbacks: s.rollbacks.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryCoinStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoinStore for MemoryCoinStore {
    async fn get_by_id(&self, id: CoinId) -> StoreResult<Option<Coin>> {
        self.stats.reads_by_id.fetch_add(1, Ordering::Relaxed);
        Ok(self.state.read().coins.get(&id).map(|s| s.coin.clone()))
    }

    async fn get_by_code(&self, code: &ShortCode) -> StoreResult<Option<Coin>> {
        self.stats.reads_by_code.fetch_add(1, Ordering::Relaxed);
        Ok(self.state.read().find_code(code).cloned())
    }

    async fn get_main(&self) -> StoreResult<Option<Coin>> {
        self.stats.reads_main.fetch_add(1, Ordering::Relaxed);
        Ok(self.state.read().find_main().cloned())
    }

    async fn list_many(&self, codes: &[ShortCode]) -> StoreResult<Vec<Coin>> {
        self.stats.reads_many.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        Ok(state
            .coins
            .values()
            .filter(|s| codes.contains(&s.coin.short_code))
            .map(|s| s.coin.clone())
            .collect())
    }

    async fn list(&self, filter: &CoinFilter) -> StoreResult<Vec<Coin>> {
        self.stats.reads_list.fetch_add(1, Ordering::Relaxed);
        Ok(self.state.read().sorted(filter))
    }

    async fn begin(&self) -> StoreResult<Box<dyn CoinTransaction>> {
        let guard = self.writer.clone().lock_owned().await;
        let staged = self.state.read().clone();
        debug!(coins = staged.coins.len(), "Transaction started");

        Ok(Box::new(MemoryTransaction {
            staged,
            state: self.state.clone(),
            stats: self.stats.clone(),
            fail_next_commit: self.fail_next_commit.clone(),
            _guard: guard,
        }))
    }
}

/// Transaction over a private copy of the committed state.
struct MemoryTransaction {
    staged: StoreState,
    state: Arc<RwLock<StoreState>>,
    stats: Arc<StoreStats>,
    fail_next_commit: Arc<AtomicBool>,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn ensure_code_free(&self, code: &ShortCode, owner: Option<CoinId>) -> StoreResult<()> {
        match self.staged.find_code(code) {
            Some(existing) if Some(existing.id) != owner => {
                Err(StoreError::DuplicateCode(code.clone()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CoinTransaction for MemoryTransaction {
    async fn get_by_id(&mut self, id: CoinId) -> StoreResult<Option<Coin>> {
        Ok(self.staged.coins.get(&id).map(|s| s.coin.clone()))
    }

    async fn get_main(&mut self) -> StoreResult<Option<Coin>> {
        Ok(self.staged.find_main().cloned())
    }

    async fn list_all(&mut self) -> StoreResult<Vec<Coin>> {
        Ok(self.staged.sorted(&CoinFilter::default()))
    }

    async fn insert(&mut self, new: NewCoin) -> StoreResult<Coin> {
        self.ensure_code_free(&new.short_code, None)?;

        let coin = Coin::from_new(CoinId::new(), new, Utc::now());
        let seq = self.staged.next_seq;
        self.staged.next_seq += 1;
        self.staged.coins.insert(
            coin.id,
            StoredCoin {
                seq,
                coin: coin.clone(),
            },
        );
        Ok(coin)
    }

    async fn update_fields(&mut self, id: CoinId, patch: &CoinPatch) -> StoreResult<Coin> {
        if let Some(code) = &patch.short_code {
            self.ensure_code_free(code, Some(id))?;
        }

        let stored = self
            .staged
            .coins
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(&mut stored.coin, Utc::now());
        Ok(stored.coin.clone())
    }

    async fn clear_main_except(&mut self, keep: Option<CoinId>) -> StoreResult<usize> {
        let now = Utc::now();
        let mut cleared = 0;
        for stored in self.staged.coins.values_mut() {
            if stored.coin.is_main && Some(stored.coin.id) != keep {
                stored.coin.is_main = false;
                stored.coin.updated_at = now;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn delete(&mut self, id: CoinId) -> StoreResult<()> {
        self.staged
            .coins
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            warn!("Injected commit failure");
            self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Conflict("injected commit failure".to_string()));
        }

        let this = *self;
        *this.state.write() = this.staged;
        this.stats.commits.fetch_add(1, Ordering::Relaxed);
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
        debug!("Transaction rolled back");
        Ok(())
    }
}
